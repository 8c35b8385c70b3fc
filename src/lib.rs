//! A remote database-access gateway.
//!
//! `dbrelay` exposes a fixed set of typed operations over HTTP and maintains
//! the server-side lifecycle of logical connections, prepared statements, and
//! streaming result sets bound to an underlying relational engine.
//!
//! The crate contains both halves of the protocol:
//!
//! * the server side: [`MetaService`] dispatching requests against a
//!   [`SessionStore`], embedded via [`HttpServer`],
//! * the client side: [`RemoteDriver`] and its connection/statement/result-set
//!   companions, speaking the same wire contract.
//!
//! Two interchangeable serializations are provided, a textual JSON form and a
//! compact tagged binary form; see [`WireFormat`].
//!
//! The downstream database is abstracted as an [`Engine`]; the gateway itself
//! keeps no persistent state beyond its in-memory session caches.

#![deny(missing_debug_implementations)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

#[macro_use]
extern crate log;

mod client;
mod engine;
mod protocol;
mod relay_error;
mod server;
mod service;
mod session;

pub use crate::client::{
    RemoteConnection, RemoteDriver, RemoteResultSet, RemoteStatement, DEFAULT_RESPONSE_TIMEOUT,
};
pub use crate::engine::{Engine, EngineConnection, EngineCursor, EngineResult, VecCursor};
pub use crate::protocol::{
    sql_types, BinaryTranslator, ColumnMeta, ConnectionProps, DbValue, ErrorEnvelope, Frame,
    JsonTranslator, MetaOp, ParameterMeta, QueryState, Rep, Request, Response, ResultSetResponse,
    RpcMetadata, Severity, Signature, StatementHandle, QUERY_UPDATE_COUNT,
};
pub use crate::relay_error::{RelayError, RelayResult};
pub use crate::server::{
    DispatchOutcome, Dispatcher, HttpServer, ServerConfig, WireFormat, REMOTE_USER_HEADER,
};
pub use crate::service::{MetaService, RequestContext};
pub use crate::session::{
    ConnectionDiagnostics, ConnectionState, Delegation, SessionLimits, SessionStore,
    StatementState, StoreDiagnostics,
};

/// Version constant reported as the `RELAY_VERSION` database property.
///
/// Clients compare this against their own build to detect skew.
pub const RELAY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Key under which [`RELAY_VERSION`] appears in `DatabaseProperty` responses.
pub const RELAY_VERSION_PROPERTY: &str = "RELAY_VERSION";

/// Default number of rows returned in a single frame.
///
/// Applies whenever a request specifies a frame size `<= 0`.
pub const DEFAULT_FRAME_SIZE: usize = 100;

/// Canonical "unbounded" total-row-count value sent by the bundled driver.
///
/// The server accepts both `0` and `-1` as unbounded.
pub const UNBOUNDED_ROWS: i64 = -1;
