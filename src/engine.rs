//! The seam to the downstream relational engine.
//!
//! The gateway treats the engine as a blackbox capability providing
//! connections, statement preparation, execution, cursors, and catalog
//! queries. Implementations adapt a concrete database behind these traits;
//! the gateway owns all session bookkeeping above them.

use crate::{
    protocol::{ConnectionProps, DbValue, Signature},
    RelayResult,
};
use std::collections::BTreeMap;

/// Factory of engine connections.
pub trait Engine: Send + Sync + 'static {
    /// Opens a fresh engine connection with the given initial properties.
    fn connect(&self, props: &ConnectionProps) -> RelayResult<Box<dyn EngineConnection>>;
}

/// One live connection into the engine.
///
/// All calls may block indefinitely; the gateway serializes them per logical
/// connection and never shares one engine connection between handler tasks.
pub trait EngineConnection: Send {
    /// Applies changed connection properties (auto-commit, read-only,
    /// catalog, schema, transaction isolation).
    fn apply_props(&mut self, props: &ConnectionProps) -> RelayResult<()>;

    /// Parses the SQL and reports its parameter and column signatures.
    fn prepare(&mut self, sql: &str) -> RelayResult<Signature>;

    /// Executes a statement. `max_rows_total <= 0` means unbounded.
    ///
    /// A single logical execute can produce several results (stored
    /// procedures); row-returning results carry a live cursor.
    fn execute(
        &mut self,
        sql: &str,
        params: &[DbValue],
        max_rows_total: i64,
    ) -> RelayResult<Vec<EngineResult>>;

    fn commit(&mut self) -> RelayResult<()>;

    fn rollback(&mut self) -> RelayResult<()>;

    /// Engine metadata: version, supported features, limits.
    fn database_properties(&mut self) -> RelayResult<BTreeMap<String, DbValue>>;

    fn schemas(
        &mut self,
        catalog: Option<&str>,
        schema_pattern: Option<&str>,
    ) -> RelayResult<EngineResult>;

    fn tables(
        &mut self,
        catalog: Option<&str>,
        schema_pattern: Option<&str>,
        table_name_pattern: Option<&str>,
        type_list: Option<&[String]>,
    ) -> RelayResult<EngineResult>;

    fn columns(
        &mut self,
        catalog: Option<&str>,
        schema_pattern: Option<&str>,
        table_name_pattern: Option<&str>,
        column_name_pattern: Option<&str>,
    ) -> RelayResult<EngineResult>;

    fn type_info(&mut self) -> RelayResult<EngineResult>;

    fn catalogs(&mut self) -> RelayResult<EngineResult>;

    fn table_types(&mut self) -> RelayResult<EngineResult>;

    /// Releases the connection. Called once, on close or eviction.
    fn close(&mut self) -> RelayResult<()>;
}

/// Outcome of one executed statement.
pub enum EngineResult {
    /// Row-count result of DML/DDL.
    Update(u64),
    /// Row-returning result backed by a live cursor.
    Query {
        signature: Signature,
        cursor: Box<dyn EngineCursor>,
    },
}

impl std::fmt::Debug for EngineResult {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            EngineResult::Update(count) => write!(fmt, "Update({count})"),
            EngineResult::Query { signature, .. } => {
                write!(fmt, "Query({} columns)", signature.columns.len())
            }
        }
    }
}

/// Forward-only iterator over a result set, owned by the gateway until
/// exhausted, closed, or evicted.
pub trait EngineCursor: Send {
    /// Reads up to `n` rows. Returning fewer than `n` rows means the cursor
    /// is exhausted; callers rely on this to set the frame's `done` flag.
    fn next_rows(&mut self, n: usize) -> RelayResult<Vec<Vec<DbValue>>>;

    /// Releases the cursor. Called at most once.
    fn close(&mut self) -> RelayResult<()>;
}

/// A cursor over rows that are already materialized in memory.
///
/// Engine adapters use this for catalog queries whose backing store is not
/// itself cursor-shaped; paging through it still happens frame by frame.
#[derive(Debug, Default)]
pub struct VecCursor {
    rows: std::collections::VecDeque<Vec<DbValue>>,
}

impl VecCursor {
    pub fn new(rows: Vec<Vec<DbValue>>) -> VecCursor {
        VecCursor { rows: rows.into() }
    }
}

impl EngineCursor for VecCursor {
    fn next_rows(&mut self, n: usize) -> RelayResult<Vec<Vec<DbValue>>> {
        let n = n.min(self.rows.len());
        Ok(self.rows.drain(..n).collect())
    }

    fn close(&mut self) -> RelayResult<()> {
        self.rows.clear();
        Ok(())
    }
}
