//! The transport side of the gateway: configuration, the byte-level
//! dispatcher, and the HTTP embedding.

mod config;
mod dispatcher;
mod http;

pub use config::ServerConfig;
pub use dispatcher::{DispatchOutcome, Dispatcher, WireFormat};
pub use http::{HttpServer, REMOTE_USER_HEADER};
