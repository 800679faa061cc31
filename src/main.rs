#![forbid(unsafe_code)]
//! rb-annotate command line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

use rb_annotate::commands::{
    execute_inspect, execute_mailers, execute_models, execute_remove, execute_routes,
    InspectOptions, MailersOptions, ModelsOptions, OutputFormat, RemoveOptions, RoutesOptions,
};
use rb_annotate::{BatchResult, Config, MarkerTag, Position};

#[derive(Parser)]
#[command(name = "rb-annotate")]
#[command(about = "Schema, route and mailer comments for Ruby sources")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (default: .annotaterb.yml or .annotate.config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Project root; writes outside it are refused
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Where blocks are placed
    #[arg(long, global = true, value_enum)]
    position: Option<PositionArg>,

    /// Show the diff instead of writing
    #[arg(long, global = true)]
    dry_run: bool,

    /// Allow writing to files outside the project root
    #[arg(long, global = true)]
    allow_outside_root: bool,

    /// Output as JSON (default: human-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Annotate models with their table schema
    Models {
        /// Schema snapshot exported by the application
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        /// Leave out the index section
        #[arg(long)]
        no_indexes: bool,

        /// Leave out the foreign key section
        #[arg(long)]
        no_foreign_keys: bool,

        /// Leave out the check constraint section
        #[arg(long)]
        no_check_constraints: bool,
    },

    /// Annotate the routes file with the route map
    Routes {
        /// Routes snapshot exported by the application
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        /// Routes file to annotate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Annotate mailers with their actions
    Mailers {
        /// Mailer snapshot exported by the application
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
    },

    /// Remove generated blocks
    Remove {
        /// Tags to remove: schema, routes, mailer (default: all)
        tags: Vec<String>,
    },

    /// Show the declarations found in a file
    Inspect {
        /// Ruby source file
        file: PathBuf,
    },
}

/// Block placement relative to the class
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default)]
enum PositionArg {
    /// After leading magic comments, at the top of the file
    #[default]
    Top,
    /// Directly above the class line
    Before,
    /// Directly below the class's closing `end`
    After,
}

impl From<PositionArg> for Position {
    fn from(arg: PositionArg) -> Self {
        match arg {
            PositionArg::Top => Position::Top,
            PositionArg::Before => Position::Before,
            PositionArg::After => Position::After,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::discover(cli.root.as_deref().unwrap_or(std::path::Path::new(".")))?,
    };

    // CLI flags override config values
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    if let Some(position) = cli.position {
        config.position = position.into();
    }
    config.dry_run |= cli.dry_run;
    config.allow_outside_root |= cli.allow_outside_root;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = load_config(&cli)?;
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Summary
    };

    let result: BatchResult = match cli.command {
        Commands::Models { snapshot, no_indexes, no_foreign_keys, no_check_constraints } => {
            config.show_indexes &= !no_indexes;
            config.show_foreign_keys &= !no_foreign_keys;
            config.show_check_constraints &= !no_check_constraints;
            execute_models(ModelsOptions { snapshot, format }, &config)?
        }

        Commands::Routes { snapshot, file } => {
            execute_routes(RoutesOptions { snapshot, file, format }, &config)?
        }

        Commands::Mailers { snapshot } => {
            execute_mailers(MailersOptions { snapshot, format }, &config)?
        }

        Commands::Remove { tags } => {
            let tags: Vec<MarkerTag> = tags
                .iter()
                .map(|t| t.parse::<MarkerTag>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e: String| anyhow::anyhow!(e))?;
            execute_remove(RemoveOptions { tags, format }, &config)?
        }

        Commands::Inspect { file } => {
            execute_inspect(InspectOptions { file, json: cli.json })?;
            return Ok(());
        }
    };

    if result.has_failures() {
        eprintln!(
            "{} {} entities failed",
            style("✗").red(),
            result.failed.len()
        );
        std::process::exit(1);
    }

    Ok(())
}
