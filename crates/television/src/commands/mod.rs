//! Command dispatch for commands that need a live session.

pub mod bind;
pub mod call;
pub mod config_cmd;
pub mod listen;

use television_core::Session;

use crate::cli::Command;
use crate::error::CliError;

/// Run a session command. `Config` and `Completions` are handled before a
/// session exists.
pub async fn dispatch(cmd: Command, session: &Session) -> Result<(), CliError> {
    match cmd {
        Command::Call(args) => call::handle(&args, session).await,
        Command::Listen(args) => listen::handle(&args, session).await,
        Command::Bind(args) => bind::handle(args, session).await,
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}

/// Resolve when the user presses Ctrl-C.
pub(crate) async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; never resolve.
        std::future::pending::<()>().await;
    }
}
