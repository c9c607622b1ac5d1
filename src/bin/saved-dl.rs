use std::env;
use std::process::ExitCode;

use saved_dl::cli::{self, CliArgs, USAGE};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match CliArgs::parse(env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {e}\n\n{USAGE}");
            return ExitCode::FAILURE;
        }
    };
    if args.help {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    cli::init_logging();

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    // Job failures are reported in the summary and do not change the exit code.
    match cli::run(&config).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
