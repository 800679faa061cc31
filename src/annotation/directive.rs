//! @acp:module "Leading Directives"
//! @acp:summary "Detects magic comments that must stay above any annotation"
//! @acp:domain annotation
//! @acp:layer utility

use std::sync::LazyLock;

use regex::Regex;

/// Shebangs, `frozen_string_literal`-style magic comments and emacs mode lines
static DIRECTIVE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:#!|#\s*(?:frozen_string_literal|encoding|coding|warn_indent|warn_past_scope|shareable_constant_value|typed)\s*:|#.*-\*-.*-\*-)",
    )
    .unwrap()
});

/// Whether a single line is a leading directive comment
pub fn is_directive(line: &str) -> bool {
    DIRECTIVE_PATTERN.is_match(line.trim_end())
}

/// Number of consecutive directive lines at the top of the file
pub fn header_len(content: &str) -> usize {
    content.lines().take_while(|line| is_directive(line)).count()
}
