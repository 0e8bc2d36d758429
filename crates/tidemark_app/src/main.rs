mod cli;

use std::process::ExitCode;

use clap::Parser;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    match cli::run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            tidemark_logging::ingest_error!("{:#}", err);
            eprintln!("error: {err:#}");
            ExitCode::from(1)
        }
    }
}
