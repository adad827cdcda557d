//! `television bind`: mirror a model channel into a live collection and
//! print it after every change.

use std::pin::pin;

use television_core::{BindOptions, BoundCollection, Session};

use super::interrupted;
use crate::cli::BindArgs;
use crate::error::CliError;

pub async fn handle(args: BindArgs, session: &Session) -> Result<(), CliError> {
    let collection = BoundCollection::new();
    let mut changes = collection.subscribe();

    let binding = session.bind(
        collection.clone(),
        &args.channel,
        BindOptions {
            key_field: args.key,
            fetch_initial: !args.no_fetch,
        },
    );
    let mut finished = pin!(binding.join());
    let mut interrupt = pin!(interrupted());

    loop {
        tokio::select! {
            () = &mut interrupt => break,
            result = &mut finished => return result.map_err(Into::into),
            snapshot = changes.changed() => {
                let Some(snapshot) = snapshot else { break };
                println!("{}", serde_json::to_string(snapshot.as_ref())?);
            }
        }
    }
    Ok(())
}
