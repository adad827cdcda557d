// television-api: WebSocket wire layer (envelopes, endpoint, self-healing connection)

pub mod endpoint;
pub mod envelope;
pub mod error;
pub mod websocket;

pub use endpoint::{DEFAULT_PATH, endpoint_url};
pub use envelope::{DEFAULT_UPDATE_STREAM, Inbound, Outbound};
pub use error::Error;
pub use websocket::{Connection, ConnectionConfig, ConnectionHandle, ConnectionState};
