//! In-memory, capacity-bounded ownership of live connections and statements.
//!
//! The store exclusively owns engine connections and their statements; client
//! drivers only ever hold opaque identifiers. Each connection carries its own
//! mutex; statements inherit their parent connection's mutex and live in the
//! parent's statement table, looked up by `(connection_id, statement_id)`.

mod cache;

use crate::{
    engine::{Engine, EngineConnection, EngineCursor},
    protocol::{ConnectionProps, Response, Signature},
    RelayError, RelayResult,
};
use cache::LruTtlCache;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::{Duration, Instant},
};

/// Per-connection lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Auto-committing; the initial state.
    Open,
    /// Auto-commit disabled; commits and rollbacks are explicit.
    Transactional,
    /// Terminal.
    Closed,
}

/// Per-statement lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatementState {
    Idle,
    Executing,
    HasCursor,
    Canceled,
    Closed,
}

/// Wraps every data-plane engine action into an authorization context
/// established for the authenticated remote user.
pub trait Delegation: Send + Sync {
    fn run(
        &self,
        remote_user: Option<&str>,
        remote_addr: Option<std::net::SocketAddr>,
        action: &mut dyn FnMut() -> RelayResult<Response>,
    ) -> RelayResult<Response>;
}

/// Capacity and idle bounds of the session caches.
#[derive(Clone, Copy, Debug)]
pub struct SessionLimits {
    /// Maximum number of live connections.
    pub connection_capacity: usize,
    /// Idle expiry of connections and statements.
    pub idle_ttl: Duration,
    /// Maximum number of statements per connection.
    pub statement_capacity: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            connection_capacity: 100,
            idle_ttl: Duration::from_secs(600),
            statement_capacity: 1_000,
        }
    }
}

pub(crate) struct CursorState {
    pub cursor: Box<dyn EngineCursor>,
    /// Absolute row index of the next unread row.
    pub position: u64,
    pub canceled: Arc<AtomicBool>,
}

impl CursorState {
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }
}

pub(crate) struct Statement {
    pub sql: Option<String>,
    pub signature: Option<Signature>,
    pub max_rows_total: i64,
    pub state: StatementState,
    pub cursor: Option<CursorState>,
    pub last_used: Instant,
}

impl Statement {
    fn new(sql: Option<String>, signature: Option<Signature>, max_rows_total: i64) -> Statement {
        Statement {
            sql,
            signature,
            max_rows_total,
            state: StatementState::Idle,
            cursor: None,
            last_used: Instant::now(),
        }
    }

    pub fn release_cursor(&mut self) {
        if let Some(mut cursor_state) = self.cursor.take() {
            if let Err(e) = cursor_state.cursor.close() {
                warn!("Closing a cursor failed with {e}; invalidating it regardless");
            }
        }
    }
}

pub(crate) struct ConnectionInner {
    pub engine: Box<dyn EngineConnection>,
    pub props: ConnectionProps,
    pub dirty: bool,
    pub state: ConnectionState,
    statement_capacity: usize,
    next_statement_id: u32,
    pub statements: HashMap<u32, Statement>,
}

impl ConnectionInner {
    pub fn assert_open(&self, connection_id: &str) -> RelayResult<()> {
        if self.state == ConnectionState::Closed {
            Err(RelayError::State(format!(
                "connection {connection_id} is closed"
            )))
        } else {
            Ok(())
        }
    }

    /// Flushes dirty properties to the engine and settles the connection
    /// state; a no-op while the dirty bit is clear.
    pub fn flush_props(&mut self) -> RelayResult<()> {
        if !self.dirty {
            return Ok(());
        }
        trace!("flushing dirty connection properties: {:?}", self.props);
        self.engine.apply_props(&self.props)?;
        self.dirty = false;
        match self.props.auto_commit {
            Some(false) => self.state = ConnectionState::Transactional,
            Some(true) => self.state = ConnectionState::Open,
            None => {}
        }
        Ok(())
    }

    pub fn statement_mut(
        &mut self,
        connection_id: &str,
        statement_id: u32,
    ) -> RelayResult<&mut Statement> {
        let statement = self.statements.get_mut(&statement_id).ok_or_else(|| {
            RelayError::State(format!(
                "unknown statement {statement_id} on connection {connection_id}"
            ))
        })?;
        statement.last_used = Instant::now();
        Ok(statement)
    }

    pub fn close_statement(&mut self, statement_id: u32) {
        if let Some(mut statement) = self.statements.remove(&statement_id) {
            statement.release_cursor();
            statement.state = StatementState::Closed;
        }
    }

    fn evict_lru_statement(&mut self) -> Option<u32> {
        let victim = self
            .statements
            .iter()
            .min_by_key(|(_, statement)| statement.last_used)
            .map(|(id, _)| *id)?;
        debug!("statement capacity reached; evicting statement {victim}");
        self.close_statement(victim);
        Some(victim)
    }
}

/// One live logical connection: the engine resource, the local property view
/// with its dirty bit, and the statement table, all behind one mutex.
pub struct ConnectionEntry {
    id: String,
    initial_props: ConnectionProps,
    inner: Mutex<ConnectionInner>,
    // reachable without the connection mutex, so Cancel never queues behind
    // an in-flight engine call
    cancel_flags: Mutex<HashMap<u32, Arc<AtomicBool>>>,
}

impl std::fmt::Debug for ConnectionEntry {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.debug_struct("ConnectionEntry").field("id", &self.id).finish()
    }
}

impl ConnectionEntry {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn lock(&self) -> RelayResult<MutexGuard<'_, ConnectionInner>> {
        Ok(self.inner.lock()?)
    }

    /// Allocates the next statement id; ids are monotonically increasing and
    /// never reused within the connection's lifetime.
    pub(crate) fn allocate_statement(
        &self,
        inner: &mut ConnectionInner,
        sql: Option<String>,
        signature: Option<Signature>,
        max_rows_total: i64,
    ) -> RelayResult<u32> {
        if inner.statements.len() >= inner.statement_capacity {
            if let Some(victim) = inner.evict_lru_statement() {
                self.remove_cancel_flag(victim);
            }
        }
        let statement_id = inner.next_statement_id;
        inner.next_statement_id += 1;
        inner
            .statements
            .insert(statement_id, Statement::new(sql, signature, max_rows_total));
        self.cancel_flags
            .lock()
            .map_err(|_| RelayError::Poison)?
            .insert(statement_id, Arc::new(AtomicBool::new(false)));
        Ok(statement_id)
    }

    pub(crate) fn cancel_flag(&self, statement_id: u32) -> Option<Arc<AtomicBool>> {
        self.cancel_flags
            .lock()
            .ok()?
            .get(&statement_id)
            .cloned()
    }

    pub(crate) fn remove_cancel_flag(&self, statement_id: u32) {
        if let Ok(mut flags) = self.cancel_flags.lock() {
            flags.remove(&statement_id);
        }
    }

    // Best-effort release of the engine resource; the id is invalidated
    // regardless of engine failures.
    fn close(&self) {
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        if inner.state == ConnectionState::Closed {
            return;
        }
        let statement_ids: Vec<u32> = inner.statements.keys().copied().collect();
        for statement_id in statement_ids {
            inner.close_statement(statement_id);
        }
        if let Err(e) = inner.engine.close() {
            warn!(
                "Closing the engine connection of {} failed with {e}; invalidating it regardless",
                self.id
            );
        }
        inner.state = ConnectionState::Closed;
        if let Ok(mut flags) = self.cancel_flags.lock() {
            flags.clear();
        }
        debug!("connection {} closed", self.id);
    }
}

/// Read-only observation of the store's internal state, for diagnostics and
/// tests.
#[derive(Clone, Debug)]
pub struct StoreDiagnostics {
    pub connections: Vec<ConnectionDiagnostics>,
}

/// Snapshot of one connection's bookkeeping.
#[derive(Clone, Debug)]
pub struct ConnectionDiagnostics {
    pub connection_id: String,
    pub state: ConnectionState,
    pub props: ConnectionProps,
    pub dirty: bool,
    pub statement_count: usize,
    pub open_cursors: usize,
}

/// Owner of all live sessions, with LRU-plus-TTL eviction.
pub struct SessionStore {
    engine: Arc<dyn Engine>,
    limits: SessionLimits,
    connections: Mutex<LruTtlCache<String, Arc<ConnectionEntry>>>,
    delegation: Option<Arc<dyn Delegation>>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.debug_struct("SessionStore")
            .field("limits", &self.limits)
            .finish()
    }
}

impl SessionStore {
    pub fn new(engine: Arc<dyn Engine>, limits: SessionLimits) -> SessionStore {
        SessionStore {
            engine,
            connections: Mutex::new(LruTtlCache::new(
                limits.connection_capacity,
                limits.idle_ttl,
            )),
            limits,
            delegation: None,
        }
    }

    /// Installs the impersonation boundary; see [`Delegation`].
    #[must_use]
    pub fn with_delegation(mut self, delegation: Arc<dyn Delegation>) -> SessionStore {
        self.delegation = Some(delegation);
        self
    }

    /// Opens the connection `connection_id` with the given initial
    /// properties. Opening an existing id is idempotent if the properties
    /// are identical, and fails otherwise.
    pub fn open_connection(
        &self,
        connection_id: &str,
        info: &ConnectionProps,
    ) -> RelayResult<()> {
        let expired = {
            let mut connections = self.connections.lock()?;
            match connections.get(&connection_id.to_string()) {
                Ok(Some(existing)) => {
                    return if existing.initial_props == *info {
                        debug!("open of existing connection {connection_id} is a no-op");
                        Ok(())
                    } else {
                        Err(RelayError::State(format!(
                            "connection {connection_id} already exists with different properties"
                        )))
                    };
                }
                Ok(None) => None,
                Err(expired) => Some(expired),
            }
        };
        if let Some(expired) = expired {
            expired.close();
        }

        let engine_conn = self.engine.connect(info)?;
        let state = if info.auto_commit == Some(false) {
            ConnectionState::Transactional
        } else {
            ConnectionState::Open
        };
        let entry = Arc::new(ConnectionEntry {
            id: connection_id.to_string(),
            initial_props: info.clone(),
            inner: Mutex::new(ConnectionInner {
                engine: engine_conn,
                props: info.clone(),
                dirty: false,
                state,
                statement_capacity: self.limits.statement_capacity,
                next_statement_id: 0,
                statements: HashMap::new(),
            }),
            cancel_flags: Mutex::new(HashMap::new()),
        });
        let evicted = {
            let mut connections = self.connections.lock()?;
            connections.insert(connection_id.to_string(), entry)
        };
        if let Some((evicted_id, evicted_entry)) = evicted {
            info!("connection capacity reached; evicting {evicted_id}");
            evicted_entry.close();
        }
        debug!("connection {connection_id} opened");
        Ok(())
    }

    /// Looks up a live connection, refreshing its recency.
    pub fn connection(&self, connection_id: &str) -> RelayResult<Arc<ConnectionEntry>> {
        let expired = {
            let mut connections = self.connections.lock()?;
            match connections.get(&connection_id.to_string()) {
                Ok(Some(entry)) => return Ok(Arc::clone(entry)),
                Ok(None) => None,
                Err(expired) => Some(expired),
            }
        };
        if let Some(expired) = expired {
            expired.close();
            return Err(RelayError::Resource(format!(
                "connection {connection_id} expired after being idle"
            )));
        }
        Err(RelayError::State(format!(
            "unknown connection {connection_id}"
        )))
    }

    /// Releases the connection and all owned statements. Idempotent.
    pub fn close_connection(&self, connection_id: &str) -> RelayResult<()> {
        let removed = {
            let mut connections = self.connections.lock()?;
            connections.remove(&connection_id.to_string())
        };
        if let Some(entry) = removed {
            entry.close();
        }
        Ok(())
    }

    /// Runs `action` within the authorization context of the remote user, if
    /// an impersonation boundary is installed.
    pub(crate) fn run_delegated(
        &self,
        remote_user: Option<&str>,
        remote_addr: Option<std::net::SocketAddr>,
        action: &mut dyn FnMut() -> RelayResult<Response>,
    ) -> RelayResult<Response> {
        match &self.delegation {
            Some(delegation) => delegation.run(remote_user, remote_addr, action),
            None => action(),
        }
    }

    /// Removes idle-expired connections and statements; called periodically.
    pub fn sweep(&self) {
        let expired = {
            match self.connections.lock() {
                Ok(mut connections) => connections.take_expired(),
                Err(_) => return,
            }
        };
        for (connection_id, entry) in expired {
            info!("connection {connection_id} expired after being idle; closing it");
            entry.close();
        }

        let live: Vec<Arc<ConnectionEntry>> = match self.connections.lock() {
            Ok(connections) => connections.values().cloned().collect(),
            Err(_) => return,
        };
        for entry in live {
            // do not queue behind busy connections; the next sweep catches up
            if let Ok(mut inner) = entry.inner.try_lock() {
                let idle_statements: Vec<u32> = inner
                    .statements
                    .iter()
                    .filter(|(_, statement)| statement.last_used.elapsed() > self.limits.idle_ttl)
                    .map(|(id, _)| *id)
                    .collect();
                for statement_id in idle_statements {
                    debug!(
                        "statement {statement_id} on connection {} expired after being idle",
                        entry.id
                    );
                    inner.close_statement(statement_id);
                    entry.remove_cancel_flag(statement_id);
                }
            }
        }
    }

    /// Spawns the periodic sweep thread; it stops when the store is dropped
    /// by all other holders.
    pub fn start_sweeper(self: &Arc<Self>, interval: Duration) {
        let store = Arc::downgrade(self);
        std::thread::Builder::new()
            .name("dbrelay-sweeper".to_string())
            .spawn(move || loop {
                std::thread::sleep(interval);
                match store.upgrade() {
                    Some(store) => store.sweep(),
                    None => return,
                }
            })
            .ok();
    }

    /// Read-only snapshot of the store's internals.
    pub fn diagnostics(&self) -> RelayResult<StoreDiagnostics> {
        let entries: Vec<Arc<ConnectionEntry>> = {
            let connections = self.connections.lock()?;
            connections.values().cloned().collect()
        };
        let mut connections = Vec::with_capacity(entries.len());
        for entry in entries {
            let inner = entry.lock()?;
            connections.push(ConnectionDiagnostics {
                connection_id: entry.id.clone(),
                state: inner.state,
                props: inner.props.clone(),
                dirty: inner.dirty,
                statement_count: inner.statements.len(),
                open_cursors: inner
                    .statements
                    .values()
                    .filter(|statement| statement.cursor.is_some())
                    .count(),
            });
        }
        Ok(StoreDiagnostics { connections })
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().map(|c| c.len()).unwrap_or(0)
    }
}
