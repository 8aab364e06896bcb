use clap::Parser;

use bucket_monitor::cli::{self, Cli};
use bucket_monitor::logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let guard = match logging::init_logging(cli.debug, cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = cli::dispatch(&cli).await {
        tracing::error!("Fatal: {:#}", e);
        // process::exit skips destructors; flush the file writer first.
        drop(guard);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
