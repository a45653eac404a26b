mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    // Logging is set up inside, once the config (and its log filter) is loaded.
    if let Err(err) = CliCommand::run_from_args().await {
        eprintln!("hashsync error: {:#}", err);
        std::process::exit(1);
    }
}
