//! CLI command handlers, one file per command.

mod check;
mod control;
mod run;

pub use check::run_check;
pub use control::run_control;
pub use run::{run_sync, SyncArgs};
