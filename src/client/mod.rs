//! The blocking client driver: the symmetric side of the wire contract.
//!
//! Property mutations are applied to a client-local view first and flushed
//! lazily through `ConnectionSync` before the next data-plane call, mirroring
//! the server's dirty-property discipline.

use crate::{
    protocol::{
        BinaryTranslator, ConnectionProps, DbValue, Frame, JsonTranslator, Request, Response,
        ResultSetResponse, Signature, QUERY_UPDATE_COUNT,
    },
    server::{WireFormat, REMOTE_USER_HEADER},
    RelayError, RelayResult, UNBOUNDED_ROWS,
};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
    time::Duration,
};

/// Default client-side response read timeout.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(180);

/// Entry point of the client side: knows the endpoint and the serialization.
#[derive(Debug, Clone)]
pub struct RemoteDriver {
    url: String,
    format: WireFormat,
    remote_user: Option<String>,
    http: reqwest::blocking::Client,
}

impl RemoteDriver {
    /// A driver for the given endpoint URL, e.g. `http://gateway:8765/`.
    pub fn new<S: Into<String>>(url: S, format: WireFormat) -> RelayResult<RemoteDriver> {
        Self::with_timeout(url, format, DEFAULT_RESPONSE_TIMEOUT)
    }

    /// Like [`RemoteDriver::new`] with an explicit response read timeout.
    pub fn with_timeout<S: Into<String>>(
        url: S,
        format: WireFormat,
        timeout: Duration,
    ) -> RelayResult<RemoteDriver> {
        Ok(RemoteDriver {
            url: url.into(),
            format,
            remote_user: None,
            http: reqwest::blocking::Client::builder()
                .timeout(timeout)
                .build()?,
        })
    }

    /// Conveys the authenticated principal to the gateway's impersonation
    /// boundary.
    #[must_use]
    pub fn with_remote_user<S: Into<String>>(mut self, remote_user: S) -> RemoteDriver {
        self.remote_user = Some(remote_user.into());
        self
    }

    /// Opens a logical connection under a fresh client-chosen id.
    pub fn connect(&self) -> RelayResult<RemoteConnection> {
        self.connect_with_props(&ConnectionProps::default())
    }

    /// Opens a logical connection with initial properties.
    pub fn connect_with_props(&self, info: &ConnectionProps) -> RelayResult<RemoteConnection> {
        let connection_id = uuid::Uuid::new_v4().to_string();
        let core = ClientCore {
            driver: self.clone(),
            connection_id: connection_id.clone(),
            props: info.clone(),
            dirty: false,
            closed: false,
        };
        let response = core.send(&Request::OpenConnection {
            connection_id,
            info: info.clone(),
        })?;
        let server_address = match response {
            Response::OpenConnection { rpc_metadata } => rpc_metadata.server_address,
            other => return Err(unexpected(&other)),
        };
        debug!("connected to {server_address}");
        Ok(RemoteConnection {
            server_address,
            core: Arc::new(Mutex::new(core)),
        })
    }

    fn roundtrip(&self, request: &Request) -> RelayResult<Response> {
        let body = match self.format {
            WireFormat::Textual => JsonTranslator::serialize_request(request)?,
            WireFormat::Binary => BinaryTranslator::serialize_request(request)?,
        };
        let mut http_request = self
            .http
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, self.format.content_type())
            .body(body);
        if let Some(ref remote_user) = self.remote_user {
            http_request = http_request.header(REMOTE_USER_HEADER, remote_user);
        }
        // errors travel in the body with HTTP 500; the status alone is not
        // meaningful, so the body is parsed either way
        let bytes = http_request.send()?.bytes()?;
        let response = match self.format {
            WireFormat::Textual => JsonTranslator::parse_response(&bytes)?,
            WireFormat::Binary => BinaryTranslator::parse_response(&bytes)?,
        };
        match response {
            Response::Error(envelope) => Err(RelayError::Remote { envelope }),
            response => Ok(response),
        }
    }
}

fn unexpected(response: &Response) -> RelayError {
    RelayError::Protocol(format!(
        "server answered with unexpected variant {}",
        response.discriminator()
    ))
}

// Client-side connection state, shared between the connection handle and its
// statements and result sets.
#[derive(Debug)]
struct ClientCore {
    driver: RemoteDriver,
    connection_id: String,
    props: ConnectionProps,
    dirty: bool,
    closed: bool,
}

impl ClientCore {
    fn send(&self, request: &Request) -> RelayResult<Response> {
        self.driver.roundtrip(request)
    }

    fn assert_open(&self) -> RelayResult<()> {
        if self.closed {
            Err(RelayError::Usage("connection is closed"))
        } else {
            Ok(())
        }
    }

    // Pushes dirty properties before a data-plane call; a no-op otherwise.
    fn flush_props(&mut self) -> RelayResult<()> {
        if !self.dirty {
            return Ok(());
        }
        let response = self.send(&Request::ConnectionSync {
            connection_id: self.connection_id.clone(),
            props: self.props.clone(),
        })?;
        match response {
            Response::ConnectionSync { props, .. } => {
                self.props = props.with_dirty(false);
                self.dirty = false;
                Ok(())
            }
            other => Err(unexpected(&other)),
        }
    }
}

/// A logical connection to the gateway.
#[derive(Debug)]
pub struct RemoteConnection {
    core: Arc<Mutex<ClientCore>>,
    server_address: String,
}

impl RemoteConnection {
    /// The `<hostname>:<port>` the server reported on open.
    pub fn server_address(&self) -> &str {
        &self.server_address
    }

    /// The client-chosen connection id.
    pub fn connection_id(&self) -> RelayResult<String> {
        Ok(self.core.lock()?.connection_id.clone())
    }

    /// The client-local property view; `dirty` tells whether it is ahead of
    /// the server.
    pub fn props(&self) -> RelayResult<ConnectionProps> {
        let core = self.core.lock()?;
        Ok(core.props.with_dirty(core.dirty))
    }

    pub fn set_auto_commit(&self, auto_commit: bool) -> RelayResult<()> {
        self.set_prop(|props| props.auto_commit = Some(auto_commit))
    }

    pub fn set_read_only(&self, read_only: bool) -> RelayResult<()> {
        self.set_prop(|props| props.read_only = Some(read_only))
    }

    pub fn set_catalog<S: Into<String>>(&self, catalog: S) -> RelayResult<()> {
        let catalog = catalog.into();
        self.set_prop(|props| props.catalog = Some(catalog))
    }

    pub fn set_schema<S: Into<String>>(&self, schema: S) -> RelayResult<()> {
        let schema = schema.into();
        self.set_prop(|props| props.schema = Some(schema))
    }

    pub fn set_transaction_isolation(&self, level: i32) -> RelayResult<()> {
        self.set_prop(|props| props.transaction_isolation = Some(level))
    }

    fn set_prop(&self, mutate: impl FnOnce(&mut ConnectionProps)) -> RelayResult<()> {
        let mut core = self.core.lock()?;
        core.assert_open()?;
        mutate(&mut core.props);
        core.dirty = true;
        Ok(())
    }

    /// Allocates a server-side statement.
    pub fn create_statement(&self) -> RelayResult<RemoteStatement> {
        let mut core = self.core.lock()?;
        core.assert_open()?;
        core.flush_props()?;
        let response = core.send(&Request::CreateStatement {
            connection_id: core.connection_id.clone(),
        })?;
        match response {
            Response::CreateStatement { statement_id, .. } => Ok(RemoteStatement {
                core: Arc::clone(&self.core),
                statement_id,
                signature: None,
            }),
            other => Err(unexpected(&other)),
        }
    }

    /// Prepares `sql`; `max_rows_total <= 0` means unbounded.
    pub fn prepare<S: AsRef<str>>(&self, sql: S, max_rows_total: i64) -> RelayResult<RemoteStatement> {
        let mut core = self.core.lock()?;
        core.assert_open()?;
        core.flush_props()?;
        let response = core.send(&Request::Prepare {
            connection_id: core.connection_id.clone(),
            sql: sql.as_ref().to_string(),
            max_rows_total: normalize_max_rows(max_rows_total),
        })?;
        match response {
            Response::Prepare { statement, .. } => Ok(RemoteStatement {
                core: Arc::clone(&self.core),
                statement_id: statement.statement_id,
                signature: statement.signature,
            }),
            other => Err(unexpected(&other)),
        }
    }

    /// Fused path: allocates a statement, prepares and executes `sql`, and
    /// returns its first result set.
    ///
    /// The statement backing the result set is released once the result set
    /// is drained, closed, or dropped.
    pub fn query<S: AsRef<str>>(&self, sql: S) -> RelayResult<RemoteResultSet> {
        let statement = self.create_statement()?;
        match self.prepare_and_execute(&statement, sql.as_ref()) {
            Ok(result) => Ok(result),
            Err(e) => {
                statement.close().ok();
                Err(e)
            }
        }
    }

    fn prepare_and_execute(
        &self,
        statement: &RemoteStatement,
        sql: &str,
    ) -> RelayResult<RemoteResultSet> {
        let core = self.core.lock()?;
        let response = core.send(&Request::PrepareAndExecute {
            connection_id: core.connection_id.clone(),
            statement_id: statement.statement_id,
            sql: sql.to_string(),
            max_rows_total: UNBOUNDED_ROWS,
            first_frame_max_size: -1,
        })?;
        let results = match response {
            Response::Execute { results, .. } => results,
            other => return Err(unexpected(&other)),
        };
        drop(core);
        let mut result = results
            .into_iter()
            .next()
            .map(|result| RemoteResultSet::new(Arc::clone(&self.core), result))
            .ok_or(RelayError::Protocol(
                "execute answered no result set".to_string(),
            ))?;
        // the statement was allocated for this call only; the result set is
        // responsible for releasing it
        result.owns_statement = true;
        Ok(result)
    }

    /// Executes a list of SQL commands, returning per-command update counts.
    pub fn execute_batch<S: AsRef<str>>(&self, sql_commands: &[S]) -> RelayResult<Vec<u64>> {
        let statement = self.create_statement()?;
        let response = {
            let core = self.core.lock()?;
            core.send(&Request::PrepareAndExecuteBatch {
                connection_id: core.connection_id.clone(),
                statement_id: statement.statement_id,
                sql_commands: sql_commands
                    .iter()
                    .map(|sql| sql.as_ref().to_string())
                    .collect(),
            })
        };
        // the statement was allocated for this call only
        let closed = statement.close();
        let response = response?;
        closed?;
        match response {
            Response::ExecuteBatch { update_counts, .. } => Ok(update_counts),
            other => Err(unexpected(&other)),
        }
    }

    pub fn commit(&self) -> RelayResult<()> {
        self.transaction_end(true)
    }

    pub fn rollback(&self) -> RelayResult<()> {
        self.transaction_end(false)
    }

    fn transaction_end(&self, commit: bool) -> RelayResult<()> {
        let mut core = self.core.lock()?;
        core.assert_open()?;
        core.flush_props()?;
        let request = if commit {
            Request::Commit {
                connection_id: core.connection_id.clone(),
            }
        } else {
            Request::Rollback {
                connection_id: core.connection_id.clone(),
            }
        };
        match (commit, core.send(&request)?) {
            (true, Response::Commit { .. }) | (false, Response::Rollback { .. }) => Ok(()),
            (_, other) => Err(unexpected(&other)),
        }
    }

    /// Engine metadata merged with the gateway's own version property.
    pub fn database_properties(&self) -> RelayResult<BTreeMap<String, DbValue>> {
        self.database_property_impl(None)
    }

    /// A single engine metadata property.
    pub fn database_property<S: AsRef<str>>(&self, name: S) -> RelayResult<Option<DbValue>> {
        let name = name.as_ref().to_string();
        let mut props = self.database_property_impl(Some(name.clone()))?;
        Ok(props.remove(&name))
    }

    fn database_property_impl(
        &self,
        name: Option<String>,
    ) -> RelayResult<BTreeMap<String, DbValue>> {
        let mut core = self.core.lock()?;
        core.assert_open()?;
        core.flush_props()?;
        let response = core.send(&Request::DatabaseProperty {
            connection_id: core.connection_id.clone(),
            name,
        })?;
        match response {
            Response::DatabaseProperty { props, .. } => Ok(props),
            other => Err(unexpected(&other)),
        }
    }

    /// Catalog query: schemas.
    pub fn schemas(
        &self,
        catalog: Option<&str>,
        schema_pattern: Option<&str>,
    ) -> RelayResult<RemoteResultSet> {
        self.meta_query(|connection_id| Request::Schemas {
            connection_id,
            catalog: catalog.map(str::to_string),
            schema_pattern: schema_pattern.map(str::to_string),
        })
    }

    /// Catalog query: tables.
    pub fn tables(
        &self,
        catalog: Option<&str>,
        schema_pattern: Option<&str>,
        table_name_pattern: Option<&str>,
        type_list: Option<&[String]>,
    ) -> RelayResult<RemoteResultSet> {
        self.meta_query(|connection_id| Request::Tables {
            connection_id,
            catalog: catalog.map(str::to_string),
            schema_pattern: schema_pattern.map(str::to_string),
            table_name_pattern: table_name_pattern.map(str::to_string),
            type_list: type_list.map(<[String]>::to_vec),
        })
    }

    /// Catalog query: columns.
    pub fn columns(
        &self,
        catalog: Option<&str>,
        schema_pattern: Option<&str>,
        table_name_pattern: Option<&str>,
        column_name_pattern: Option<&str>,
    ) -> RelayResult<RemoteResultSet> {
        self.meta_query(|connection_id| Request::Columns {
            connection_id,
            catalog: catalog.map(str::to_string),
            schema_pattern: schema_pattern.map(str::to_string),
            table_name_pattern: table_name_pattern.map(str::to_string),
            column_name_pattern: column_name_pattern.map(str::to_string),
        })
    }

    /// Catalog query: type info.
    pub fn type_info(&self) -> RelayResult<RemoteResultSet> {
        self.meta_query(|connection_id| Request::TypeInfo { connection_id })
    }

    /// Catalog query: catalogs.
    pub fn catalogs(&self) -> RelayResult<RemoteResultSet> {
        self.meta_query(|connection_id| Request::Catalogs { connection_id })
    }

    /// Catalog query: table types.
    pub fn table_types(&self) -> RelayResult<RemoteResultSet> {
        self.meta_query(|connection_id| Request::TableTypes { connection_id })
    }

    fn meta_query(
        &self,
        build: impl FnOnce(String) -> Request,
    ) -> RelayResult<RemoteResultSet> {
        let mut core = self.core.lock()?;
        core.assert_open()?;
        core.flush_props()?;
        let response = core.send(&build(core.connection_id.clone()))?;
        drop(core);
        match response {
            Response::ResultSet(result) => {
                Ok(RemoteResultSet::new(Arc::clone(&self.core), result))
            }
            other => Err(unexpected(&other)),
        }
    }

    /// Releases the connection and all owned statements. Idempotent.
    pub fn close(&self) -> RelayResult<()> {
        let mut core = self.core.lock()?;
        if core.closed {
            return Ok(());
        }
        let response = core.send(&Request::CloseConnection {
            connection_id: core.connection_id.clone(),
        })?;
        match response {
            Response::CloseConnection { .. } => {
                core.closed = true;
                Ok(())
            }
            other => Err(unexpected(&other)),
        }
    }
}

impl Drop for RemoteConnection {
    // try to close the server-side connection, ignore all errors
    fn drop(&mut self) {
        if Arc::strong_count(&self.core) == 1 {
            self.close().ok();
        }
    }
}

/// A server-side statement handle, possibly prepared.
#[derive(Debug)]
pub struct RemoteStatement {
    core: Arc<Mutex<ClientCore>>,
    statement_id: u32,
    signature: Option<Signature>,
}

impl RemoteStatement {
    pub fn statement_id(&self) -> u32 {
        self.statement_id
    }

    /// The parameter and column signatures reported by prepare.
    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    /// Executes the prepared statement; answers its first result set.
    pub fn execute(&self, parameter_values: &[DbValue]) -> RelayResult<RemoteResultSet> {
        let mut results = self.execute_all(parameter_values)?;
        if results.is_empty() {
            return Err(RelayError::Protocol(
                "execute answered no result set".to_string(),
            ));
        }
        Ok(results.remove(0))
    }

    /// Executes the prepared statement; a stored procedure can answer
    /// several result sets.
    pub fn execute_all(&self, parameter_values: &[DbValue]) -> RelayResult<Vec<RemoteResultSet>> {
        let mut core = self.core.lock()?;
        core.assert_open()?;
        core.flush_props()?;
        let response = core.send(&Request::Execute {
            connection_id: core.connection_id.clone(),
            statement_id: self.statement_id,
            parameter_values: parameter_values.to_vec(),
            first_frame_max_size: -1,
        })?;
        drop(core);
        match response {
            Response::Execute { results, .. } => Ok(results
                .into_iter()
                .map(|result| RemoteResultSet::new(Arc::clone(&self.core), result))
                .collect()),
            other => Err(unexpected(&other)),
        }
    }

    /// Executes the prepared statement once per parameter row.
    pub fn execute_batch(&self, parameter_rows: &[Vec<DbValue>]) -> RelayResult<Vec<u64>> {
        let mut core = self.core.lock()?;
        core.assert_open()?;
        core.flush_props()?;
        let response = core.send(&Request::ExecuteBatch {
            connection_id: core.connection_id.clone(),
            statement_id: self.statement_id,
            parameter_rows: parameter_rows.to_vec(),
        })?;
        match response {
            Response::ExecuteBatch { update_counts, .. } => Ok(update_counts),
            other => Err(unexpected(&other)),
        }
    }

    /// Out-of-band cancel: the server observes it at the next row boundary.
    pub fn cancel(&self) -> RelayResult<()> {
        let core = self.core.lock()?;
        let response = core.send(&Request::Cancel {
            connection_id: core.connection_id.clone(),
            statement_id: self.statement_id,
        })?;
        match response {
            Response::Cancel { .. } => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    /// Releases the server-side statement. Idempotent.
    pub fn close(&self) -> RelayResult<()> {
        let core = self.core.lock()?;
        if core.closed {
            return Ok(());
        }
        let response = core.send(&Request::CloseStatement {
            connection_id: core.connection_id.clone(),
            statement_id: self.statement_id,
        })?;
        match response {
            Response::CloseStatement { .. } => Ok(()),
            other => Err(unexpected(&other)),
        }
    }
}

/// A result set iterating rows across frames; follow-up frames are fetched
/// on demand through the server-held cursor.
///
/// When the backing statement exists only for this result (catalog queries,
/// [`RemoteConnection::query`]), it is released once the rows are drained,
/// on [`RemoteResultSet::close`], or on drop.
#[derive(Debug)]
pub struct RemoteResultSet {
    core: Arc<Mutex<ClientCore>>,
    statement_id: u32,
    owns_statement: bool,
    signature: Option<Signature>,
    update_count: i64,
    frame: Frame,
    row_index: usize,
    next_offset: u64,
}

impl RemoteResultSet {
    fn new(core: Arc<Mutex<ClientCore>>, result: ResultSetResponse) -> RemoteResultSet {
        let frame = result
            .first_frame
            .unwrap_or_else(|| Frame::empty(0, true));
        let next_offset = frame.offset + frame.rows.len() as u64;
        RemoteResultSet {
            core,
            statement_id: result.statement_id,
            owns_statement: result.own_statement,
            signature: result.signature,
            update_count: result.update_count,
            frame,
            row_index: 0,
            next_offset,
        }
    }

    /// The column signature, when the result carries rows.
    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    /// True for row-returning results.
    pub fn is_query(&self) -> bool {
        self.update_count == QUERY_UPDATE_COUNT
    }

    /// Number of affected rows for update results.
    pub fn update_count(&self) -> i64 {
        self.update_count
    }

    /// The next row, fetching follow-up frames as needed.
    pub fn next_row(&mut self) -> RelayResult<Option<Vec<DbValue>>> {
        loop {
            if self.row_index < self.frame.rows.len() {
                let row = std::mem::take(&mut self.frame.rows[self.row_index]);
                self.row_index += 1;
                return Ok(Some(row));
            }
            if self.frame.done {
                self.release_statement()?;
                return Ok(None);
            }
            self.fetch_next_frame()?;
        }
    }

    /// Drains all remaining rows.
    pub fn into_rows(mut self) -> RelayResult<Vec<Vec<DbValue>>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row()? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// The single row of a single-row result.
    pub fn single_row(mut self) -> RelayResult<Vec<DbValue>> {
        let row = self
            .next_row()?
            .ok_or(RelayError::Usage("result set is empty"))?;
        if self.next_row()?.is_some() {
            return Err(RelayError::Usage("result set has more than one row"));
        }
        Ok(row)
    }

    fn fetch_next_frame(&mut self) -> RelayResult<()> {
        let core = self.core.lock()?;
        let response = core.send(&Request::Fetch {
            connection_id: core.connection_id.clone(),
            statement_id: self.statement_id,
            offset: self.next_offset,
            frame_max_size: -1,
        })?;
        drop(core);
        match response {
            Response::Fetch { frame, .. } => {
                self.next_offset = frame.offset + frame.rows.len() as u64;
                self.frame = frame;
                self.row_index = 0;
                Ok(())
            }
            other => Err(unexpected(&other)),
        }
    }

    /// Closes the backing statement when it exists only for this result.
    pub fn close(mut self) -> RelayResult<()> {
        self.release_statement()
    }

    fn release_statement(&mut self) -> RelayResult<()> {
        if !self.owns_statement {
            return Ok(());
        }
        self.owns_statement = false;
        let core = self.core.lock()?;
        if core.closed {
            return Ok(());
        }
        let response = core.send(&Request::CloseStatement {
            connection_id: core.connection_id.clone(),
            statement_id: self.statement_id,
        })?;
        match response {
            Response::CloseStatement { .. } => Ok(()),
            other => Err(unexpected(&other)),
        }
    }
}

impl Drop for RemoteResultSet {
    // release the backing statement if it is still owned, ignore all errors
    fn drop(&mut self) {
        if self.owns_statement {
            self.release_statement().ok();
        }
    }
}

fn normalize_max_rows(max_rows_total: i64) -> i64 {
    if max_rows_total <= 0 {
        UNBOUNDED_ROWS
    } else {
        max_rows_total
    }
}
