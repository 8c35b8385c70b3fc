use crate::{
    protocol::{wire, DbValue, Frame, Signature},
    RelayError, RelayResult,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Envelope fields attached to every response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcMetadata {
    /// `<hostname>:<port>` of the answering server, for client affinity.
    pub server_address: String,
}

impl RpcMetadata {
    pub fn new<S: Into<String>>(server_address: S) -> RpcMetadata {
        RpcMetadata {
            server_address: server_address.into(),
        }
    }

    pub(crate) fn emit(&self, w: &mut dyn std::io::Write) -> RelayResult<()> {
        wire::emit_str(&self.server_address, w)
    }

    pub(crate) fn parse(rdr: &mut dyn std::io::Read) -> RelayResult<RpcMetadata> {
        Ok(RpcMetadata {
            server_address: wire::parse_str(rdr)?,
        })
    }
}

/// Severity of a server-reported error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Unset,
    Fatal,
    Error,
    Warning,
}

impl Severity {
    fn type_code(self) -> u8 {
        match self {
            Severity::Unset => 0,
            Severity::Fatal => 1,
            Severity::Error => 2,
            Severity::Warning => 3,
        }
    }

    fn try_new(code: u8) -> RelayResult<Severity> {
        Ok(match code {
            0 => Severity::Unset,
            1 => Severity::Fatal,
            2 => Severity::Error,
            3 => Severity::Warning,
            other => {
                return Err(RelayError::Protocol(format!(
                    "severity field contained an invalid tag: {other}"
                )))
            }
        })
    }
}

/// The wire error envelope.
///
/// `errorCode = -1` and `sqlState = "00000"` are the sentinel unknown values;
/// `stackTraces` preserves the server-side cause chain, outermost first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub error_message: String,
    pub error_code: i32,
    pub sql_state: String,
    pub severity: Severity,
    pub stack_traces: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_metadata: Option<RpcMetadata>,
}

impl ErrorEnvelope {
    /// Builds the envelope for a server-side failure.
    pub fn from_error(error: &RelayError) -> ErrorEnvelope {
        let (error_code, sql_state) = match error {
            RelayError::Engine {
                code, sql_state, ..
            } => (*code, sql_state.clone()),
            _ => (
                super::UNKNOWN_ERROR_CODE,
                super::UNKNOWN_SQL_STATE.to_string(),
            ),
        };
        ErrorEnvelope {
            error_message: error.to_string(),
            error_code,
            sql_state,
            severity: Severity::Error,
            stack_traces: error.diagnostic_chain(),
            rpc_metadata: None,
        }
    }

    /// The user-visible message: the cause chain joined with ` -> `,
    /// falling back to the bare message when no chain was captured.
    pub fn joined_message(&self) -> String {
        if self.stack_traces.is_empty() {
            self.error_message.clone()
        } else {
            self.stack_traces.join(" -> ")
        }
    }

    pub(crate) fn emit(&self, w: &mut dyn std::io::Write) -> RelayResult<()> {
        wire::emit_str(&self.error_message, w)?;
        wire::emit_i32(self.error_code, w)?;
        wire::emit_str(&self.sql_state, w)?;
        w.write_all(&[self.severity.type_code()])?;
        wire::emit_len(self.stack_traces.len(), w)?;
        for trace in &self.stack_traces {
            wire::emit_str(trace, w)?;
        }
        emit_opt_rpc_metadata(self.rpc_metadata.as_ref(), w)
    }

    pub(crate) fn parse(rdr: &mut dyn std::io::Read) -> RelayResult<ErrorEnvelope> {
        let error_message = wire::parse_str(rdr)?;
        let error_code = wire::parse_i32(rdr)?;
        let sql_state = wire::parse_str(rdr)?;
        let severity = Severity::try_new(read_u8(rdr)?)?;
        let trace_count = wire::parse_len(rdr)?;
        let mut stack_traces = Vec::with_capacity(trace_count.min(1024));
        for _ in 0..trace_count {
            stack_traces.push(wire::parse_str(rdr)?);
        }
        Ok(ErrorEnvelope {
            error_message,
            error_code,
            sql_state,
            severity,
            stack_traces,
            rpc_metadata: parse_opt_rpc_metadata(rdr)?,
        })
    }
}

/// Connection property values recognized on `ConnectionSync`.
///
/// `None` fields are "not specified"; `dirty` mirrors the server-side flag so
/// clients can skip no-op flushes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_commit: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_isolation: Option<i32>,
    #[serde(default)]
    pub dirty: bool,
}

impl ConnectionProps {
    /// True iff no property is specified.
    pub fn is_unspecified(&self) -> bool {
        self.auto_commit.is_none()
            && self.read_only.is_none()
            && self.catalog.is_none()
            && self.schema.is_none()
            && self.transaction_isolation.is_none()
    }

    /// Overlays the specified fields of `other` onto `self`.
    pub fn merge(&mut self, other: &ConnectionProps) {
        if let Some(auto_commit) = other.auto_commit {
            self.auto_commit = Some(auto_commit);
        }
        if let Some(read_only) = other.read_only {
            self.read_only = Some(read_only);
        }
        if let Some(ref catalog) = other.catalog {
            self.catalog = Some(catalog.clone());
        }
        if let Some(ref schema) = other.schema {
            self.schema = Some(schema.clone());
        }
        if let Some(transaction_isolation) = other.transaction_isolation {
            self.transaction_isolation = Some(transaction_isolation);
        }
    }

    /// The same properties with the dirty mirror set as given.
    pub fn with_dirty(&self, dirty: bool) -> ConnectionProps {
        let mut props = self.clone();
        props.dirty = dirty;
        props
    }

    pub(crate) fn emit(&self, w: &mut dyn std::io::Write) -> RelayResult<()> {
        emit_opt_bool(self.auto_commit, w)?;
        emit_opt_bool(self.read_only, w)?;
        wire::emit_opt_str(self.catalog.as_deref(), w)?;
        wire::emit_opt_str(self.schema.as_deref(), w)?;
        match self.transaction_isolation {
            Some(level) => {
                wire::emit_bool(true, w)?;
                wire::emit_i32(level, w)?;
            }
            None => wire::emit_bool(false, w)?,
        }
        wire::emit_bool(self.dirty, w)
    }

    pub(crate) fn parse(rdr: &mut dyn std::io::Read) -> RelayResult<ConnectionProps> {
        Ok(ConnectionProps {
            auto_commit: parse_opt_bool(rdr)?,
            read_only: parse_opt_bool(rdr)?,
            catalog: wire::parse_opt_str(rdr)?,
            schema: wire::parse_opt_str(rdr)?,
            transaction_isolation: if wire::parse_bool(rdr)? {
                Some(wire::parse_i32(rdr)?)
            } else {
                None
            },
            dirty: wire::parse_bool(rdr)?,
        })
    }
}

/// Metadata operations whose results are served through a cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetaOp {
    Schemas,
    Tables,
    Columns,
    TypeInfo,
    Catalogs,
    TableTypes,
}

impl MetaOp {
    fn type_code(self) -> u8 {
        match self {
            MetaOp::Schemas => 0,
            MetaOp::Tables => 1,
            MetaOp::Columns => 2,
            MetaOp::TypeInfo => 3,
            MetaOp::Catalogs => 4,
            MetaOp::TableTypes => 5,
        }
    }

    fn try_new(code: u8) -> RelayResult<MetaOp> {
        Ok(match code {
            0 => MetaOp::Schemas,
            1 => MetaOp::Tables,
            2 => MetaOp::Columns,
            3 => MetaOp::TypeInfo,
            4 => MetaOp::Catalogs,
            5 => MetaOp::TableTypes,
            other => {
                return Err(RelayError::Protocol(format!(
                    "metadata operation contained an invalid tag: {other}"
                )))
            }
        })
    }
}

/// How a result set came to be, for cursor reconciliation after restarts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum QueryState {
    /// The result of executing this SQL text.
    #[serde(rename_all = "camelCase")]
    Sql { sql: String },
    /// The result of a catalog query.
    #[serde(rename_all = "camelCase")]
    Metadata { op: MetaOp },
}

impl QueryState {
    pub(crate) fn emit(&self, w: &mut dyn std::io::Write) -> RelayResult<()> {
        match self {
            QueryState::Sql { sql } => {
                wire::emit_bool(false, w)?;
                wire::emit_str(sql, w)
            }
            QueryState::Metadata { op } => {
                wire::emit_bool(true, w)?;
                w.write_all(&[op.type_code()])?;
                Ok(())
            }
        }
    }

    pub(crate) fn parse(rdr: &mut dyn std::io::Read) -> RelayResult<QueryState> {
        if wire::parse_bool(rdr)? {
            Ok(QueryState::Metadata {
                op: MetaOp::try_new(read_u8(rdr)?)?,
            })
        } else {
            Ok(QueryState::Sql {
                sql: wire::parse_str(rdr)?,
            })
        }
    }
}

/// The handle of a (possibly prepared) server-side statement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementHandle {
    pub connection_id: String,
    pub statement_id: u32,
    /// Present after a successful prepare.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
}

impl StatementHandle {
    pub(crate) fn emit(&self, w: &mut dyn std::io::Write) -> RelayResult<()> {
        wire::emit_str(&self.connection_id, w)?;
        wire::emit_u32(self.statement_id, w)?;
        emit_opt_signature(self.signature.as_ref(), w)
    }

    pub(crate) fn parse(rdr: &mut dyn std::io::Read) -> RelayResult<StatementHandle> {
        Ok(StatementHandle {
            connection_id: wire::parse_str(rdr)?,
            statement_id: wire::parse_u32(rdr)?,
            signature: parse_opt_signature(rdr)?,
        })
    }
}

/// Update-count sentinel marking a result set as a row-returning query.
pub const QUERY_UPDATE_COUNT: i64 = -1;

/// One result set of an execute or metadata request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSetResponse {
    pub connection_id: String,
    pub statement_id: u32,
    /// True when the server allocated the statement itself (metadata queries).
    pub own_statement: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_frame: Option<Frame>,
    /// Number of affected rows, or [`QUERY_UPDATE_COUNT`] for queries.
    pub update_count: i64,
}

impl ResultSetResponse {
    pub(crate) fn emit(&self, w: &mut dyn std::io::Write) -> RelayResult<()> {
        wire::emit_str(&self.connection_id, w)?;
        wire::emit_u32(self.statement_id, w)?;
        wire::emit_bool(self.own_statement, w)?;
        emit_opt_signature(self.signature.as_ref(), w)?;
        match self.first_frame {
            Some(ref frame) => {
                wire::emit_bool(true, w)?;
                frame.emit(w)?;
            }
            None => wire::emit_bool(false, w)?,
        }
        wire::emit_i64(self.update_count, w)
    }

    pub(crate) fn parse(rdr: &mut dyn std::io::Read) -> RelayResult<ResultSetResponse> {
        Ok(ResultSetResponse {
            connection_id: wire::parse_str(rdr)?,
            statement_id: wire::parse_u32(rdr)?,
            own_statement: wire::parse_bool(rdr)?,
            signature: parse_opt_signature(rdr)?,
            first_frame: if wire::parse_bool(rdr)? {
                Some(Frame::parse(rdr)?)
            } else {
                None
            },
            update_count: wire::parse_i64(rdr)?,
        })
    }
}

/// The closed set of request variants.
///
/// Each variant pairs with a specific [`Response`] variant; mismatches are
/// protocol errors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "camelCase")]
pub enum Request {
    /// Allocates the connection `connection_id`; idempotent if it already
    /// exists with identical properties.
    #[serde(rename_all = "camelCase")]
    OpenConnection {
        connection_id: String,
        #[serde(default)]
        info: ConnectionProps,
    },
    /// Releases the connection and all owned statements. Idempotent.
    #[serde(rename_all = "camelCase")]
    CloseConnection { connection_id: String },
    /// Pushes client-local property changes; answers the post-merge view.
    #[serde(rename_all = "camelCase")]
    ConnectionSync {
        connection_id: String,
        props: ConnectionProps,
    },
    /// Reports engine metadata (version, supported features).
    #[serde(rename_all = "camelCase")]
    DatabaseProperty {
        connection_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Schemas {
        connection_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        catalog: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        schema_pattern: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Tables {
        connection_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        catalog: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        schema_pattern: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        table_name_pattern: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        type_list: Option<Vec<String>>,
    },
    #[serde(rename_all = "camelCase")]
    Columns {
        connection_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        catalog: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        schema_pattern: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        table_name_pattern: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        column_name_pattern: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    TypeInfo { connection_id: String },
    #[serde(rename_all = "camelCase")]
    Catalogs { connection_id: String },
    #[serde(rename_all = "camelCase")]
    TableTypes { connection_id: String },
    /// Allocates a statement handle.
    #[serde(rename_all = "camelCase")]
    CreateStatement { connection_id: String },
    /// Releases the statement. Idempotent.
    #[serde(rename_all = "camelCase")]
    CloseStatement {
        connection_id: String,
        statement_id: u32,
    },
    /// Parses SQL; answers the parameter and column signatures.
    #[serde(rename_all = "camelCase")]
    Prepare {
        connection_id: String,
        sql: String,
        /// Total row cap; `<= 0` means unbounded.
        max_rows_total: i64,
    },
    /// Executes a prepared statement.
    #[serde(rename_all = "camelCase")]
    Execute {
        connection_id: String,
        statement_id: u32,
        parameter_values: Vec<DbValue>,
        /// Row cap of the first frame; `< 0` selects the server default,
        /// `0` yields a rowless first frame with a valid signature.
        first_frame_max_size: i32,
    },
    /// Fused prepare + execute on an already allocated statement.
    #[serde(rename_all = "camelCase")]
    PrepareAndExecute {
        connection_id: String,
        statement_id: u32,
        sql: String,
        max_rows_total: i64,
        first_frame_max_size: i32,
    },
    /// Executes a prepared statement once per parameter row.
    #[serde(rename_all = "camelCase")]
    ExecuteBatch {
        connection_id: String,
        statement_id: u32,
        parameter_rows: Vec<Vec<DbValue>>,
    },
    /// Prepares and executes a list of SQL commands.
    #[serde(rename_all = "camelCase")]
    PrepareAndExecuteBatch {
        connection_id: String,
        statement_id: u32,
        sql_commands: Vec<String>,
    },
    /// Advances the statement's server-held cursor from `offset`.
    #[serde(rename_all = "camelCase")]
    Fetch {
        connection_id: String,
        statement_id: u32,
        offset: u64,
        /// Row cap of the returned frame; `<= 0` selects the server default.
        frame_max_size: i32,
    },
    /// Reconciles a client cursor, e.g. after a server restart.
    #[serde(rename_all = "camelCase")]
    SyncResults {
        connection_id: String,
        statement_id: u32,
        state: QueryState,
        offset: u64,
    },
    #[serde(rename_all = "camelCase")]
    Commit { connection_id: String },
    #[serde(rename_all = "camelCase")]
    Rollback { connection_id: String },
    /// Out-of-band cancellation of the statement's cursor.
    #[serde(rename_all = "camelCase")]
    Cancel {
        connection_id: String,
        statement_id: u32,
    },
}

impl Request {
    /// The wire discriminator, shared by both serializations.
    pub fn discriminator(&self) -> &'static str {
        match self {
            Request::OpenConnection { .. } => "openConnection",
            Request::CloseConnection { .. } => "closeConnection",
            Request::ConnectionSync { .. } => "connectionSync",
            Request::DatabaseProperty { .. } => "databaseProperty",
            Request::Schemas { .. } => "schemas",
            Request::Tables { .. } => "tables",
            Request::Columns { .. } => "columns",
            Request::TypeInfo { .. } => "typeInfo",
            Request::Catalogs { .. } => "catalogs",
            Request::TableTypes { .. } => "tableTypes",
            Request::CreateStatement { .. } => "createStatement",
            Request::CloseStatement { .. } => "closeStatement",
            Request::Prepare { .. } => "prepare",
            Request::Execute { .. } => "execute",
            Request::PrepareAndExecute { .. } => "prepareAndExecute",
            Request::ExecuteBatch { .. } => "executeBatch",
            Request::PrepareAndExecuteBatch { .. } => "prepareAndExecuteBatch",
            Request::Fetch { .. } => "fetch",
            Request::SyncResults { .. } => "syncResults",
            Request::Commit { .. } => "commit",
            Request::Rollback { .. } => "rollback",
            Request::Cancel { .. } => "cancel",
        }
    }

    /// The connection the request addresses.
    pub fn connection_id(&self) -> &str {
        match self {
            Request::OpenConnection { connection_id, .. }
            | Request::CloseConnection { connection_id }
            | Request::ConnectionSync { connection_id, .. }
            | Request::DatabaseProperty { connection_id, .. }
            | Request::Schemas { connection_id, .. }
            | Request::Tables { connection_id, .. }
            | Request::Columns { connection_id, .. }
            | Request::TypeInfo { connection_id }
            | Request::Catalogs { connection_id }
            | Request::TableTypes { connection_id }
            | Request::CreateStatement { connection_id }
            | Request::CloseStatement { connection_id, .. }
            | Request::Prepare { connection_id, .. }
            | Request::Execute { connection_id, .. }
            | Request::PrepareAndExecute { connection_id, .. }
            | Request::ExecuteBatch { connection_id, .. }
            | Request::PrepareAndExecuteBatch { connection_id, .. }
            | Request::Fetch { connection_id, .. }
            | Request::SyncResults { connection_id, .. }
            | Request::Commit { connection_id }
            | Request::Rollback { connection_id }
            | Request::Cancel { connection_id, .. } => connection_id,
        }
    }
}

/// The closed set of response variants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "response")]
pub enum Response {
    #[serde(rename = "openConnectionResponse", rename_all = "camelCase")]
    OpenConnection { rpc_metadata: RpcMetadata },
    #[serde(rename = "closeConnectionResponse", rename_all = "camelCase")]
    CloseConnection { rpc_metadata: RpcMetadata },
    #[serde(rename = "connectionSyncResponse", rename_all = "camelCase")]
    ConnectionSync {
        props: ConnectionProps,
        rpc_metadata: RpcMetadata,
    },
    #[serde(rename = "databasePropertyResponse", rename_all = "camelCase")]
    DatabaseProperty {
        props: BTreeMap<String, DbValue>,
        rpc_metadata: RpcMetadata,
    },
    /// Answer to metadata queries: a standard cursor-backed result set.
    #[serde(rename = "resultSetResponse")]
    ResultSet(ResultSetResponse),
    #[serde(rename = "createStatementResponse", rename_all = "camelCase")]
    CreateStatement {
        connection_id: String,
        statement_id: u32,
        rpc_metadata: RpcMetadata,
    },
    #[serde(rename = "closeStatementResponse", rename_all = "camelCase")]
    CloseStatement { rpc_metadata: RpcMetadata },
    #[serde(rename = "prepareResponse", rename_all = "camelCase")]
    Prepare {
        statement: StatementHandle,
        rpc_metadata: RpcMetadata,
    },
    /// A single logical execute can answer several result sets.
    #[serde(rename = "executeResponse", rename_all = "camelCase")]
    Execute {
        results: Vec<ResultSetResponse>,
        rpc_metadata: RpcMetadata,
    },
    #[serde(rename = "executeBatchResponse", rename_all = "camelCase")]
    ExecuteBatch {
        update_counts: Vec<u64>,
        rpc_metadata: RpcMetadata,
    },
    #[serde(rename = "fetchResponse", rename_all = "camelCase")]
    Fetch {
        frame: Frame,
        rpc_metadata: RpcMetadata,
    },
    #[serde(rename = "syncResultsResponse", rename_all = "camelCase")]
    SyncResults {
        /// The server lost the cursor; the client must re-execute.
        missed: bool,
        /// The cursor was repositioned to satisfy the requested offset.
        moved: bool,
        rpc_metadata: RpcMetadata,
    },
    #[serde(rename = "commitResponse", rename_all = "camelCase")]
    Commit { rpc_metadata: RpcMetadata },
    #[serde(rename = "rollbackResponse", rename_all = "camelCase")]
    Rollback { rpc_metadata: RpcMetadata },
    #[serde(rename = "cancelResponse", rename_all = "camelCase")]
    Cancel { rpc_metadata: RpcMetadata },
    #[serde(rename = "errorResponse")]
    Error(ErrorEnvelope),
}

impl Response {
    /// The wire discriminator, shared by both serializations.
    pub fn discriminator(&self) -> &'static str {
        match self {
            Response::OpenConnection { .. } => "openConnectionResponse",
            Response::CloseConnection { .. } => "closeConnectionResponse",
            Response::ConnectionSync { .. } => "connectionSyncResponse",
            Response::DatabaseProperty { .. } => "databasePropertyResponse",
            Response::ResultSet(_) => "resultSetResponse",
            Response::CreateStatement { .. } => "createStatementResponse",
            Response::CloseStatement { .. } => "closeStatementResponse",
            Response::Prepare { .. } => "prepareResponse",
            Response::Execute { .. } => "executeResponse",
            Response::ExecuteBatch { .. } => "executeBatchResponse",
            Response::Fetch { .. } => "fetchResponse",
            Response::SyncResults { .. } => "syncResultsResponse",
            Response::Commit { .. } => "commitResponse",
            Response::Rollback { .. } => "rollbackResponse",
            Response::Cancel { .. } => "cancelResponse",
            Response::Error(_) => "errorResponse",
        }
    }
}

pub(crate) fn emit_props_map(
    props: &BTreeMap<String, DbValue>,
    w: &mut dyn std::io::Write,
) -> RelayResult<()> {
    wire::emit_len(props.len(), w)?;
    for (name, value) in props {
        wire::emit_str(name, w)?;
        value.emit(w)?;
    }
    Ok(())
}

pub(crate) fn parse_props_map(
    rdr: &mut dyn std::io::Read,
) -> RelayResult<BTreeMap<String, DbValue>> {
    let len = wire::parse_len(rdr)?;
    let mut props = BTreeMap::new();
    for _ in 0..len {
        let name = wire::parse_str(rdr)?;
        props.insert(name, DbValue::parse(rdr)?);
    }
    Ok(props)
}

fn emit_opt_bool(o_b: Option<bool>, w: &mut dyn std::io::Write) -> RelayResult<()> {
    match o_b {
        Some(b) => {
            wire::emit_bool(true, w)?;
            wire::emit_bool(b, w)
        }
        None => wire::emit_bool(false, w),
    }
}

fn parse_opt_bool(rdr: &mut dyn std::io::Read) -> RelayResult<Option<bool>> {
    if wire::parse_bool(rdr)? {
        Ok(Some(wire::parse_bool(rdr)?))
    } else {
        Ok(None)
    }
}

fn emit_opt_signature(
    o_signature: Option<&Signature>,
    w: &mut dyn std::io::Write,
) -> RelayResult<()> {
    match o_signature {
        Some(signature) => {
            wire::emit_bool(true, w)?;
            signature.emit(w)
        }
        None => wire::emit_bool(false, w),
    }
}

fn parse_opt_signature(rdr: &mut dyn std::io::Read) -> RelayResult<Option<Signature>> {
    if wire::parse_bool(rdr)? {
        Ok(Some(Signature::parse(rdr)?))
    } else {
        Ok(None)
    }
}

pub(crate) fn emit_opt_rpc_metadata(
    o_metadata: Option<&RpcMetadata>,
    w: &mut dyn std::io::Write,
) -> RelayResult<()> {
    match o_metadata {
        Some(metadata) => {
            wire::emit_bool(true, w)?;
            metadata.emit(w)
        }
        None => wire::emit_bool(false, w),
    }
}

pub(crate) fn parse_opt_rpc_metadata(
    rdr: &mut dyn std::io::Read,
) -> RelayResult<Option<RpcMetadata>> {
    if wire::parse_bool(rdr)? {
        Ok(Some(RpcMetadata::parse(rdr)?))
    } else {
        Ok(None)
    }
}

fn read_u8(rdr: &mut dyn std::io::Read) -> RelayResult<u8> {
    let mut buf = [0_u8; 1];
    rdr.read_exact(&mut buf)?;
    Ok(buf[0])
}
