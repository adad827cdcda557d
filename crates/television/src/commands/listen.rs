//! `television listen`: print bus events as JSON lines until Ctrl-C.

use std::pin::pin;

use serde_json::json;
use television_core::Session;

use super::interrupted;
use crate::cli::ListenArgs;
use crate::error::CliError;

pub async fn handle(args: &ListenArgs, session: &Session) -> Result<(), CliError> {
    let mut events = session.subscribe(&args.pattern);
    tracing::info!(pattern = %args.pattern, "listening");
    let mut interrupt = pin!(interrupted());

    loop {
        tokio::select! {
            () = &mut interrupt => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                let line = json!({ "channel": event.channel, "payload": event.payload });
                println!("{line}");
            }
        }
    }
    Ok(())
}
