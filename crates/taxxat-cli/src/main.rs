mod cli;
mod command;
mod repl;

use cli::{CliError, CliOptions};
use repl::Repl;
use taxxat_client::{ClientConfig, TaxClient};
use tracing::error;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "taxxat=info,taxxat_client=info".to_string()),
        )
        .init();

    let options = match CliOptions::parse(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(CliError::HelpRequested) => {
            print_usage();
            std::process::exit(0);
        }
        Err(err) => {
            eprintln!("error: {err}");
            eprintln!();
            print_usage();
            std::process::exit(2);
        }
    };

    let config = match ClientConfig::from_env() {
        Ok(config) => options.apply(config),
        Err(err) => {
            error!("failed to read config: {err}");
            std::process::exit(1);
        }
    };

    let client = match TaxClient::new(&config) {
        Ok(client) => client,
        Err(err) => {
            error!("failed to start client: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = Repl::new(client).run().await {
        error!("terminal session ended with an error: {err}");
        std::process::exit(1);
    }
}

fn print_usage() {
    eprintln!(
        "Usage: taxxat [--api-url URL] [--session-dir DIR]\n\
         \n\
         Options:\n\
         - --api-url URL      Backend base url (env TAXXAT_API_URL, default http://localhost:5000/api)\n\
         - --session-dir DIR  Where the signed-in user is remembered (env TAXXAT_SESSION_DIR, default .taxxat)\n\
         - --help             Show this help text\n\
         \n\
         Type `help` once running to list the commands."
    );
}
