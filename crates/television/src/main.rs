mod cli;
mod commands;
mod config;
mod error;

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use television_core::Session;

use crate::cli::{CallArgs, Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a server connection
        Command::Config(ref args) => commands::config_cmd::handle(args),

        Command::Completions(ref args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "television", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let cfg = television_config::load_config()?;
            let mut session_config = config::build_session_config(&cli.global, &cfg)?;
            if let Command::Call(CallArgs {
                timeout: Some(secs),
                ..
            }) = &cmd
            {
                session_config.call_timeout = Some(Duration::from_secs(*secs));
            }

            let session = Session::connect(session_config)?;
            tracing::debug!(command = ?cmd, "dispatching command");
            let result = commands::dispatch(cmd, &session).await;
            session.shutdown().await;
            result
        }
    }
}
