//! The stateful engine façade: dispatches every request variant, enforces the
//! connection and statement state machines, and materializes result frames.

use crate::{
    engine::{EngineConnection, EngineResult},
    protocol::{
        ConnectionProps, DbValue, Frame, Request, Response, ResultSetResponse, RpcMetadata,
        Signature, QUERY_UPDATE_COUNT,
    },
    session::{ConnectionEntry, ConnectionInner, CursorState, SessionStore, StatementState},
    RelayError, RelayResult, DEFAULT_FRAME_SIZE,
};
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

const SKIP_CHUNK: u64 = 1_000;

/// Per-request caller identity, as established by the transport layer.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    /// The authenticated remote user, if any.
    pub remote_user: Option<String>,
    /// The remote network address.
    pub remote_addr: Option<SocketAddr>,
}

impl RequestContext {
    pub fn anonymous() -> RequestContext {
        RequestContext::default()
    }
}

/// Dispatches protocol requests against the session store and the engine.
#[derive(Debug)]
pub struct MetaService {
    store: Arc<SessionStore>,
    rpc_metadata: RpcMetadata,
}

impl MetaService {
    pub fn new(store: Arc<SessionStore>, server_address: String) -> MetaService {
        MetaService {
            store,
            rpc_metadata: RpcMetadata::new(server_address),
        }
    }

    /// `<hostname>:<port>` for the given bind address: the interface when
    /// specific, else the resolved local hostname.
    pub fn server_address_for(bind: &SocketAddr) -> String {
        let host = if bind.ip().is_unspecified() {
            hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "localhost".to_string())
        } else {
            bind.ip().to_string()
        };
        format!("{}:{}", host, bind.port())
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn rpc_metadata(&self) -> &RpcMetadata {
        &self.rpc_metadata
    }

    /// Applies one request; every variant maps to exactly one response
    /// variant. Failures surface as errors and are turned into the wire
    /// error envelope by the transport dispatcher.
    #[allow(clippy::too_many_lines)]
    pub fn apply(&self, ctx: &RequestContext, request: Request) -> RelayResult<Response> {
        trace!("apply: {}", request.discriminator());
        match request {
            Request::OpenConnection {
                connection_id,
                info,
            } => {
                self.store.open_connection(&connection_id, &info)?;
                Ok(Response::OpenConnection {
                    rpc_metadata: self.rpc_metadata.clone(),
                })
            }
            Request::CloseConnection { connection_id } => {
                self.store.close_connection(&connection_id)?;
                Ok(Response::CloseConnection {
                    rpc_metadata: self.rpc_metadata.clone(),
                })
            }
            Request::ConnectionSync {
                connection_id,
                props,
            } => self.connection_sync(&connection_id, &props),
            Request::DatabaseProperty {
                connection_id,
                name,
            } => self.delegated(ctx, || self.database_property(&connection_id, name.as_deref())),
            Request::Schemas {
                connection_id,
                catalog,
                schema_pattern,
            } => self.delegated(ctx, || {
                self.meta_query(&connection_id, |engine| {
                    engine.schemas(catalog.as_deref(), schema_pattern.as_deref())
                })
            }),
            Request::Tables {
                connection_id,
                catalog,
                schema_pattern,
                table_name_pattern,
                type_list,
            } => self.delegated(ctx, || {
                self.meta_query(&connection_id, |engine| {
                    engine.tables(
                        catalog.as_deref(),
                        schema_pattern.as_deref(),
                        table_name_pattern.as_deref(),
                        type_list.as_deref(),
                    )
                })
            }),
            Request::Columns {
                connection_id,
                catalog,
                schema_pattern,
                table_name_pattern,
                column_name_pattern,
            } => self.delegated(ctx, || {
                self.meta_query(&connection_id, |engine| {
                    engine.columns(
                        catalog.as_deref(),
                        schema_pattern.as_deref(),
                        table_name_pattern.as_deref(),
                        column_name_pattern.as_deref(),
                    )
                })
            }),
            Request::TypeInfo { connection_id } => self.delegated(ctx, || {
                self.meta_query(&connection_id, |engine| engine.type_info())
            }),
            Request::Catalogs { connection_id } => self.delegated(ctx, || {
                self.meta_query(&connection_id, |engine| engine.catalogs())
            }),
            Request::TableTypes { connection_id } => self.delegated(ctx, || {
                self.meta_query(&connection_id, |engine| engine.table_types())
            }),
            Request::CreateStatement { connection_id } => self.create_statement(&connection_id),
            Request::CloseStatement {
                connection_id,
                statement_id,
            } => self.close_statement(&connection_id, statement_id),
            Request::Prepare {
                connection_id,
                sql,
                max_rows_total,
            } => self.delegated(ctx, || self.prepare(&connection_id, &sql, max_rows_total)),
            Request::Execute {
                connection_id,
                statement_id,
                parameter_values,
                first_frame_max_size,
            } => self.delegated(ctx, || {
                self.execute(
                    &connection_id,
                    statement_id,
                    &parameter_values,
                    first_frame_max_size,
                )
            }),
            Request::PrepareAndExecute {
                connection_id,
                statement_id,
                sql,
                max_rows_total,
                first_frame_max_size,
            } => self.delegated(ctx, || {
                self.prepare_and_execute(
                    &connection_id,
                    statement_id,
                    &sql,
                    max_rows_total,
                    first_frame_max_size,
                )
            }),
            Request::ExecuteBatch {
                connection_id,
                statement_id,
                parameter_rows,
            } => self.delegated(ctx, || {
                self.execute_batch(&connection_id, statement_id, &parameter_rows)
            }),
            Request::PrepareAndExecuteBatch {
                connection_id,
                statement_id,
                sql_commands,
            } => self.delegated(ctx, || {
                self.prepare_and_execute_batch(&connection_id, statement_id, &sql_commands)
            }),
            Request::Fetch {
                connection_id,
                statement_id,
                offset,
                frame_max_size,
            } => self.delegated(ctx, || {
                self.fetch(&connection_id, statement_id, offset, frame_max_size)
            }),
            Request::SyncResults {
                connection_id,
                statement_id,
                offset,
                ..
            } => self.sync_results(&connection_id, statement_id, offset),
            Request::Commit { connection_id } => {
                self.delegated(ctx, || self.transaction_end(&connection_id, true))
            }
            Request::Rollback { connection_id } => {
                self.delegated(ctx, || self.transaction_end(&connection_id, false))
            }
            Request::Cancel {
                connection_id,
                statement_id,
            } => self.cancel(&connection_id, statement_id),
        }
    }

    fn delegated(
        &self,
        ctx: &RequestContext,
        mut action: impl FnMut() -> RelayResult<Response>,
    ) -> RelayResult<Response> {
        self.store
            .run_delegated(ctx.remote_user.as_deref(), ctx.remote_addr, &mut action)
    }

    fn connection_sync(
        &self,
        connection_id: &str,
        props: &ConnectionProps,
    ) -> RelayResult<Response> {
        let entry = self.store.connection(connection_id)?;
        let mut inner = entry.lock()?;
        inner.assert_open(connection_id)?;
        if !props.is_unspecified() {
            inner.props.merge(props);
            inner.dirty = true;
            debug!("connection {connection_id} properties marked dirty: {props:?}");
        }
        let view = inner.props.with_dirty(inner.dirty);
        Ok(Response::ConnectionSync {
            props: view,
            rpc_metadata: self.rpc_metadata.clone(),
        })
    }

    fn database_property(
        &self,
        connection_id: &str,
        name: Option<&str>,
    ) -> RelayResult<Response> {
        let entry = self.store.connection(connection_id)?;
        let mut inner = entry.lock()?;
        inner.assert_open(connection_id)?;
        inner.flush_props()?;
        let mut props = inner.engine.database_properties()?;
        props.insert(
            crate::RELAY_VERSION_PROPERTY.to_string(),
            DbValue::String(crate::RELAY_VERSION.to_string()),
        );
        if let Some(name) = name {
            props.retain(|key, _| key == name);
        }
        Ok(Response::DatabaseProperty {
            props,
            rpc_metadata: self.rpc_metadata.clone(),
        })
    }

    fn meta_query(
        &self,
        connection_id: &str,
        query: impl FnOnce(&mut dyn EngineConnection) -> RelayResult<EngineResult>,
    ) -> RelayResult<Response> {
        let entry = self.store.connection(connection_id)?;
        let mut inner = entry.lock()?;
        inner.assert_open(connection_id)?;
        inner.flush_props()?;
        let engine_result = query(inner.engine.as_mut())?;
        let statement_id = entry.allocate_statement(&mut inner, None, None, 0)?;
        let mut results = self.attach_results(
            &entry,
            &mut inner,
            connection_id,
            statement_id,
            true,
            vec![engine_result],
            -1,
        )?;
        let result = results
            .pop()
            .ok_or(RelayError::Impl("metadata query produced no result"))?;
        Ok(Response::ResultSet(result))
    }

    fn create_statement(&self, connection_id: &str) -> RelayResult<Response> {
        let entry = self.store.connection(connection_id)?;
        let mut inner = entry.lock()?;
        inner.assert_open(connection_id)?;
        let statement_id = entry.allocate_statement(&mut inner, None, None, 0)?;
        Ok(Response::CreateStatement {
            connection_id: connection_id.to_string(),
            statement_id,
            rpc_metadata: self.rpc_metadata.clone(),
        })
    }

    fn close_statement(&self, connection_id: &str, statement_id: u32) -> RelayResult<Response> {
        let entry = self.store.connection(connection_id)?;
        let mut inner = entry.lock()?;
        inner.close_statement(statement_id);
        entry.remove_cancel_flag(statement_id);
        Ok(Response::CloseStatement {
            rpc_metadata: self.rpc_metadata.clone(),
        })
    }

    fn prepare(
        &self,
        connection_id: &str,
        sql: &str,
        max_rows_total: i64,
    ) -> RelayResult<Response> {
        let entry = self.store.connection(connection_id)?;
        let mut inner = entry.lock()?;
        inner.assert_open(connection_id)?;
        inner.flush_props()?;
        let mut signature = inner
            .engine
            .prepare(sql)
            .map_err(|e| with_sql_context(e, sql))?;
        signature.sql = Some(sql.to_string());
        let statement_id = entry.allocate_statement(
            &mut inner,
            Some(sql.to_string()),
            Some(signature.clone()),
            max_rows_total,
        )?;
        Ok(Response::Prepare {
            statement: crate::protocol::StatementHandle {
                connection_id: connection_id.to_string(),
                statement_id,
                signature: Some(signature),
            },
            rpc_metadata: self.rpc_metadata.clone(),
        })
    }

    fn execute(
        &self,
        connection_id: &str,
        statement_id: u32,
        parameter_values: &[DbValue],
        first_frame_max_size: i32,
    ) -> RelayResult<Response> {
        let entry = self.store.connection(connection_id)?;
        let mut inner = entry.lock()?;
        inner.assert_open(connection_id)?;
        inner.flush_props()?;
        let (sql, max_rows_total) = {
            let statement = inner.statement_mut(connection_id, statement_id)?;
            let signature = statement.signature.as_ref().ok_or_else(|| {
                RelayError::State(format!("statement {statement_id} is not prepared"))
            })?;
            bind_params(signature, parameter_values)?;
            let sql = statement.sql.clone().ok_or_else(|| {
                RelayError::State(format!("statement {statement_id} has no SQL"))
            })?;
            statement.release_cursor();
            statement.state = StatementState::Executing;
            (sql, statement.max_rows_total)
        };
        if let Some(flag) = entry.cancel_flag(statement_id) {
            flag.store(false, Ordering::Release);
        }
        let engine_results = inner
            .engine
            .execute(&sql, parameter_values, max_rows_total);
        let engine_results = match engine_results {
            Ok(engine_results) => engine_results,
            Err(e) => {
                inner.statement_mut(connection_id, statement_id)?.state = StatementState::Idle;
                return Err(with_sql_context(e, &sql));
            }
        };
        let results = self.attach_results(
            &entry,
            &mut inner,
            connection_id,
            statement_id,
            false,
            engine_results,
            first_frame_max_size,
        )?;
        Ok(Response::Execute {
            results,
            rpc_metadata: self.rpc_metadata.clone(),
        })
    }

    fn prepare_and_execute(
        &self,
        connection_id: &str,
        statement_id: u32,
        sql: &str,
        max_rows_total: i64,
        first_frame_max_size: i32,
    ) -> RelayResult<Response> {
        let entry = self.store.connection(connection_id)?;
        let mut inner = entry.lock()?;
        inner.assert_open(connection_id)?;
        inner.flush_props()?;
        {
            let statement = inner.statement_mut(connection_id, statement_id)?;
            statement.release_cursor();
            statement.state = StatementState::Executing;
        }
        let prepared = inner
            .engine
            .prepare(sql)
            .map_err(|e| with_sql_context(e, sql));
        let mut signature = match prepared {
            Ok(signature) => signature,
            Err(e) => {
                inner.statement_mut(connection_id, statement_id)?.state = StatementState::Idle;
                return Err(e);
            }
        };
        signature.sql = Some(sql.to_string());
        {
            let statement = inner.statement_mut(connection_id, statement_id)?;
            statement.sql = Some(sql.to_string());
            statement.signature = Some(signature);
            statement.max_rows_total = max_rows_total;
        }
        if let Some(flag) = entry.cancel_flag(statement_id) {
            flag.store(false, Ordering::Release);
        }
        let engine_results = inner.engine.execute(sql, &[], max_rows_total);
        let engine_results = match engine_results {
            Ok(engine_results) => engine_results,
            Err(e) => {
                inner.statement_mut(connection_id, statement_id)?.state = StatementState::Idle;
                return Err(with_sql_context(e, sql));
            }
        };
        let results = self.attach_results(
            &entry,
            &mut inner,
            connection_id,
            statement_id,
            false,
            engine_results,
            first_frame_max_size,
        )?;
        Ok(Response::Execute {
            results,
            rpc_metadata: self.rpc_metadata.clone(),
        })
    }

    fn execute_batch(
        &self,
        connection_id: &str,
        statement_id: u32,
        parameter_rows: &[Vec<DbValue>],
    ) -> RelayResult<Response> {
        let entry = self.store.connection(connection_id)?;
        let mut inner = entry.lock()?;
        inner.assert_open(connection_id)?;
        inner.flush_props()?;
        let (sql, signature) = {
            let statement = inner.statement_mut(connection_id, statement_id)?;
            let signature = statement.signature.clone().ok_or_else(|| {
                RelayError::State(format!("statement {statement_id} is not prepared"))
            })?;
            let sql = statement.sql.clone().ok_or_else(|| {
                RelayError::State(format!("statement {statement_id} has no SQL"))
            })?;
            (sql, signature)
        };
        let mut update_counts = Vec::with_capacity(parameter_rows.len());
        for (index, row) in parameter_rows.iter().enumerate() {
            bind_params(&signature, row).map_err(|e| {
                RelayError::InvalidParameter(format!("batch entry {index}: {e}"))
            })?;
            let engine_results = inner
                .engine
                .execute(&sql, row, 0)
                .map_err(|e| with_sql_context(e, &sql))?;
            update_counts.push(single_update_count(engine_results)?);
        }
        inner.statement_mut(connection_id, statement_id)?.state = StatementState::Idle;
        Ok(Response::ExecuteBatch {
            update_counts,
            rpc_metadata: self.rpc_metadata.clone(),
        })
    }

    fn prepare_and_execute_batch(
        &self,
        connection_id: &str,
        statement_id: u32,
        sql_commands: &[String],
    ) -> RelayResult<Response> {
        let entry = self.store.connection(connection_id)?;
        let mut inner = entry.lock()?;
        inner.assert_open(connection_id)?;
        inner.flush_props()?;
        inner.statement_mut(connection_id, statement_id)?;
        let mut update_counts = Vec::with_capacity(sql_commands.len());
        for sql in sql_commands {
            let engine_results = inner
                .engine
                .execute(sql, &[], 0)
                .map_err(|e| with_sql_context(e, sql))?;
            update_counts.push(single_update_count(engine_results)?);
        }
        Ok(Response::ExecuteBatch {
            update_counts,
            rpc_metadata: self.rpc_metadata.clone(),
        })
    }

    fn fetch(
        &self,
        connection_id: &str,
        statement_id: u32,
        offset: u64,
        frame_max_size: i32,
    ) -> RelayResult<Response> {
        let entry = self.store.connection(connection_id)?;
        let mut inner = entry.lock()?;
        inner.assert_open(connection_id)?;
        let statement = inner.statement_mut(connection_id, statement_id)?;
        let Some(cursor_state) = statement.cursor.as_mut() else {
            return Err(RelayError::Resource(format!(
                "no open cursor for statement {statement_id} on connection {connection_id}"
            )));
        };
        if cursor_state.is_canceled() {
            statement.release_cursor();
            statement.state = StatementState::Canceled;
            return Err(RelayError::Canceled);
        }
        let position = cursor_state.position;
        if offset < position {
            return Err(RelayError::Resource(format!(
                "fetch offset {offset} is behind the cursor position {position}; \
                 cursors are forward-only"
            )));
        }
        if offset > position && skip_rows(cursor_state, offset - position)? {
            // the cursor ran dry while skipping forward
            statement.release_cursor();
            statement.state = StatementState::Idle;
            return Ok(Response::Fetch {
                frame: Frame::empty(offset, true),
                rpc_metadata: self.rpc_metadata.clone(),
            });
        }
        let frame = read_frame(cursor_state, offset, frame_size(frame_max_size))?;
        if frame.done {
            statement.release_cursor();
            statement.state = StatementState::Idle;
        }
        Ok(Response::Fetch {
            frame,
            rpc_metadata: self.rpc_metadata.clone(),
        })
    }

    fn sync_results(
        &self,
        connection_id: &str,
        statement_id: u32,
        offset: u64,
    ) -> RelayResult<Response> {
        let respond = |missed: bool, moved: bool| {
            Ok(Response::SyncResults {
                missed,
                moved,
                rpc_metadata: self.rpc_metadata.clone(),
            })
        };
        let Ok(entry) = self.store.connection(connection_id) else {
            return respond(true, false);
        };
        let mut inner = entry.lock()?;
        let Ok(statement) = inner.statement_mut(connection_id, statement_id) else {
            return respond(true, false);
        };
        let Some(cursor_state) = statement.cursor.as_mut() else {
            return respond(true, false);
        };
        let position = cursor_state.position;
        if offset < position {
            // forward-only; the client must re-execute
            return respond(true, false);
        }
        if offset == position {
            return respond(false, false);
        }
        let exhausted = skip_rows(cursor_state, offset - position)?;
        if exhausted {
            statement.release_cursor();
            statement.state = StatementState::Idle;
        }
        respond(false, true)
    }

    fn transaction_end(&self, connection_id: &str, commit: bool) -> RelayResult<Response> {
        let entry = self.store.connection(connection_id)?;
        let mut inner = entry.lock()?;
        inner.assert_open(connection_id)?;
        inner.flush_props()?;
        if commit {
            inner.engine.commit()?;
            Ok(Response::Commit {
                rpc_metadata: self.rpc_metadata.clone(),
            })
        } else {
            inner.engine.rollback()?;
            Ok(Response::Rollback {
                rpc_metadata: self.rpc_metadata.clone(),
            })
        }
    }

    // Cancel is out-of-band: it only touches the statement's cancel flag and
    // never waits on the connection mutex.
    fn cancel(&self, connection_id: &str, statement_id: u32) -> RelayResult<Response> {
        let entry = self.store.connection(connection_id)?;
        if let Some(flag) = entry.cancel_flag(statement_id) {
            flag.store(true, Ordering::Release);
            debug!("statement {statement_id} on connection {connection_id} marked canceled");
        }
        Ok(Response::Cancel {
            rpc_metadata: self.rpc_metadata.clone(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn attach_results(
        &self,
        entry: &ConnectionEntry,
        inner: &mut ConnectionInner,
        connection_id: &str,
        statement_id: u32,
        own_statement: bool,
        engine_results: Vec<EngineResult>,
        first_frame_max_size: i32,
    ) -> RelayResult<Vec<ResultSetResponse>> {
        let cap = frame_size(first_frame_max_size);
        let canceled = entry
            .cancel_flag(statement_id)
            .unwrap_or_else(|| Arc::new(AtomicBool::new(false)));
        let mut responses = Vec::with_capacity(engine_results.len());
        let mut retained: Option<CursorState> = None;
        for engine_result in engine_results {
            match engine_result {
                EngineResult::Update(count) => responses.push(ResultSetResponse {
                    connection_id: connection_id.to_string(),
                    statement_id,
                    own_statement,
                    signature: None,
                    first_frame: None,
                    update_count: i64::try_from(count).unwrap_or(i64::MAX),
                }),
                EngineResult::Query { signature, cursor } => {
                    let mut cursor_state = CursorState {
                        cursor,
                        position: 0,
                        canceled: Arc::clone(&canceled),
                    };
                    let mut frame = read_frame(&mut cursor_state, 0, cap)?;
                    if frame.done {
                        release_cursor_state(cursor_state);
                    } else if retained.is_some() {
                        // one retained cursor per statement handle; trailing
                        // unfinished result sets are drained into their frame
                        drain_into_frame(&mut cursor_state, &mut frame)?;
                        release_cursor_state(cursor_state);
                    } else {
                        retained = Some(cursor_state);
                    }
                    responses.push(ResultSetResponse {
                        connection_id: connection_id.to_string(),
                        statement_id,
                        own_statement,
                        signature: Some(signature),
                        first_frame: Some(frame),
                        update_count: QUERY_UPDATE_COUNT,
                    });
                }
            }
        }
        let statement = inner.statement_mut(connection_id, statement_id)?;
        statement.state = if retained.is_some() {
            StatementState::HasCursor
        } else {
            StatementState::Idle
        };
        statement.cursor = retained;
        Ok(responses)
    }
}

/// Rejects arity and representation mismatches against the parameter
/// signature.
fn bind_params(signature: &Signature, values: &[DbValue]) -> RelayResult<()> {
    if signature.parameters.len() != values.len() {
        return Err(RelayError::InvalidParameter(format!(
            "statement expects {} parameters, got {}",
            signature.parameters.len(),
            values.len()
        )));
    }
    for (descriptor, value) in signature.parameters.iter().zip(values.iter()) {
        if !value.is_null() && value.rep() != descriptor.rep {
            return Err(RelayError::InvalidParameter(format!(
                "parameter {} expects {:?}, got {:?}",
                descriptor.name,
                descriptor.rep,
                value.rep()
            )));
        }
    }
    Ok(())
}

fn frame_size(requested: i32) -> usize {
    if requested < 0 {
        DEFAULT_FRAME_SIZE
    } else {
        usize::try_from(requested).unwrap(/* non-negative */)
    }
}

fn read_frame(
    cursor_state: &mut CursorState,
    offset: u64,
    max_size: usize,
) -> RelayResult<Frame> {
    if cursor_state.is_canceled() {
        return Err(RelayError::Canceled);
    }
    let rows = cursor_state.cursor.next_rows(max_size)?;
    let done = rows.len() < max_size;
    cursor_state.position += rows.len() as u64;
    Ok(Frame { offset, done, rows })
}

// Forward-skip by reading and discarding; returns true if the cursor ran dry.
fn skip_rows(cursor_state: &mut CursorState, count: u64) -> RelayResult<bool> {
    let mut remaining = count;
    while remaining > 0 {
        if cursor_state.is_canceled() {
            return Err(RelayError::Canceled);
        }
        let chunk = usize::try_from(remaining.min(SKIP_CHUNK)).unwrap(/* <= 1000 */);
        let rows = cursor_state.cursor.next_rows(chunk)?;
        cursor_state.position += rows.len() as u64;
        remaining -= rows.len() as u64;
        if rows.len() < chunk {
            return Ok(true);
        }
    }
    Ok(false)
}

fn drain_into_frame(cursor_state: &mut CursorState, frame: &mut Frame) -> RelayResult<()> {
    loop {
        if cursor_state.is_canceled() {
            return Err(RelayError::Canceled);
        }
        let rows = cursor_state.cursor.next_rows(DEFAULT_FRAME_SIZE)?;
        let short_read = rows.len() < DEFAULT_FRAME_SIZE;
        cursor_state.position += rows.len() as u64;
        frame.rows.extend(rows);
        if short_read {
            frame.done = true;
            return Ok(());
        }
    }
}

// Batched entries must be row-count results; a stray result set is closed
// and reported as wrong usage.
fn single_update_count(engine_results: Vec<EngineResult>) -> RelayResult<u64> {
    match engine_results.into_iter().next() {
        Some(EngineResult::Update(count)) => Ok(count),
        Some(EngineResult::Query { mut cursor, .. }) => {
            cursor.close().ok();
            Err(RelayError::Usage(
                "a batched statement produced a result set",
            ))
        }
        None => Ok(0),
    }
}

fn release_cursor_state(mut cursor_state: CursorState) {
    if let Err(e) = cursor_state.cursor.close() {
        warn!("Closing a cursor failed with {e}; invalidating it regardless");
    }
}

fn with_sql_context(error: RelayError, sql: &str) -> RelayError {
    match error {
        RelayError::Engine {
            message,
            code,
            sql_state,
            causes,
        } => RelayError::Engine {
            message: format!("Error while executing SQL \"{sql}\": {message}"),
            code,
            sql_state,
            causes,
        },
        other => other,
    }
}
