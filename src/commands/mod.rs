//! @acp:module "Commands"
//! @acp:summary "CLI command implementations"
//! @acp:domain cli
//! @acp:layer handler
//!
//! Each command is in its own submodule. Commands take an already-merged
//! [`Config`](crate::config::Config); CLI flags are applied before dispatch.

pub mod inspect;
pub mod mailers;
pub mod models;
pub mod output;
pub mod remove;
pub mod routes;

pub use inspect::{execute_inspect, InspectOptions};
pub use mailers::{execute_mailers, MailersOptions};
pub use models::{execute_models, ModelsOptions};
pub use output::{report, spinner, OutputFormat};
pub use remove::{execute_remove, RemoveOptions};
pub use routes::{execute_routes, RoutesOptions};
