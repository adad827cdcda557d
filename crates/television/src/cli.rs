//! Clap derive structures for the `television` CLI.

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// television -- talk to a television WebSocket server from the shell
#[derive(Debug, Parser)]
#[command(
    name = "television",
    version,
    about = "Call, listen to, and bind channels on a television WebSocket server",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Server profile to use
    #[arg(long, short = 'p', env = "TELEVISION_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Server origin, e.g. https://app.example.com (overrides profile)
    #[arg(long, env = "TELEVISION_ORIGIN", global = true)]
    pub origin: Option<String>,

    /// WebSocket upgrade path (overrides profile)
    #[arg(long, env = "TELEVISION_PATH", global = true)]
    pub path: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Call a server channel and print the reply
    #[command(alias = "c")]
    Call(CallArgs),

    /// Print every event published on a channel pattern
    #[command(alias = "l")]
    Listen(ListenArgs),

    /// Keep a collection in sync with a model channel and print it on change
    #[command(alias = "b")]
    Bind(BindArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Call ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CallArgs {
    /// Channel to call, e.g. widget.list
    pub channel: String,

    /// Positional arguments. Each is parsed as JSON, falling back to a
    /// plain string.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Give up if no reply arrives within this many seconds
    #[arg(long, short = 't')]
    pub timeout: Option<u64>,

    /// Print the reply as single-line JSON
    #[arg(long)]
    pub compact: bool,
}

// ── Listen ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ListenArgs {
    /// Channel pattern; `*` matches one segment, `**` any number
    pub pattern: String,
}

// ── Bind ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct BindArgs {
    /// Model channel, e.g. widget
    pub channel: String,

    /// Unique key field of the bound entities
    #[arg(long, default_value = "pk")]
    pub key: String,

    /// Start empty instead of calling `<channel>.list`
    #[arg(long)]
    pub no_fetch: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Print the effective configuration (file + environment) as TOML
    Show,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}
