//! `television call`: one request, one reply.

use serde_json::Value;
use television_core::Session;

use crate::cli::CallArgs;
use crate::error::CliError;

/// Interpret a shell argument: JSON if it parses, else a plain string.
pub fn parse_arg(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
}

pub async fn handle(args: &CallArgs, session: &Session) -> Result<(), CliError> {
    let params: Vec<Value> = args.args.iter().map(|raw| parse_arg(raw)).collect();
    tracing::debug!(channel = %args.channel, args = params.len(), "calling");

    let reply = session.call(&args.channel, params).await?;

    let rendered = if args.compact {
        serde_json::to_string(&reply)?
    } else {
        serde_json::to_string_pretty(&reply)?
    };
    println!("{rendered}");
    Ok(())
}
