//! The wire contract: typed values, message schema, and the two translators.

mod binary;
mod column_meta;
mod db_value;
mod frame;
mod json;
mod message;
mod type_id;
mod wire;

pub use binary::BinaryTranslator;
pub use column_meta::{sql_types, ColumnMeta, ParameterMeta, Signature};
pub use db_value::DbValue;
pub use frame::Frame;
pub use json::JsonTranslator;
pub use message::{
    ConnectionProps, ErrorEnvelope, MetaOp, QueryState, Request, Response, ResultSetResponse,
    RpcMetadata, Severity, StatementHandle, QUERY_UPDATE_COUNT,
};
pub use type_id::Rep;

/// Sentinel error code for failures without an engine-supplied code.
pub const UNKNOWN_ERROR_CODE: i32 = -1;

/// Sentinel SQLSTATE for failures without an engine-supplied state.
pub const UNKNOWN_SQL_STATE: &str = "00000";
