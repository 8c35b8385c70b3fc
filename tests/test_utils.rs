// advisable because not all test modules use all functions of this module:
#![allow(dead_code)]

use dbrelay::{
    ColumnMeta, ConnectionProps, DbValue, Engine, EngineConnection, EngineResult, HttpServer,
    ParameterMeta, RelayError, RelayResult, RemoteDriver, Rep, ServerConfig, Signature, VecCursor,
    WireFormat,
};
use flexi_logger::{opt_format, Logger, LoggerHandle};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// Returns a logger that prints out all info, warn and error messages.
pub fn init_logger() -> LoggerHandle {
    Logger::try_with_env_or_str("info")
        .unwrap()
        .format(opt_format)
        .start()
        .unwrap_or_else(|e| panic!("Logger initialization failed with {e}"))
}

/// Starts a gateway over a fresh [`TinyEngine`] on a free local port.
pub fn start_server() -> HttpServer {
    start_server_with_config(test_config())
}

pub fn start_server_with_config(config: ServerConfig) -> HttpServer {
    HttpServer::start(&config, Arc::new(TinyEngine::default())).unwrap()
}

pub fn test_config() -> ServerConfig {
    ServerConfig::default().with_bind("127.0.0.1:0".parse().unwrap())
}

pub fn driver_for(server: &HttpServer, format: WireFormat) -> RemoteDriver {
    RemoteDriver::new(format!("http://{}/", server.local_addr()), format).unwrap()
}

pub fn both_formats() -> [WireFormat; 2] {
    [WireFormat::Textual, WireFormat::Binary]
}

// ---------------------------------------------------------------------------
// TinyEngine: an in-memory engine understanding just enough literal SQL for
// the end-to-end scenarios. Not a SQL implementation; a test double.
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct Table {
    columns: Vec<(String, Rep)>,
    rows: Vec<Vec<DbValue>>,
}

impl Table {
    fn column_index(&self, name: &str) -> RelayResult<usize> {
        self.columns
            .iter()
            .position(|(n, _)| n == name)
            .ok_or_else(|| RelayError::engine(format!("unknown column {name}")))
    }

    fn signature(&self, projection: Option<&[String]>) -> RelayResult<(Signature, Vec<usize>)> {
        let indices: Vec<usize> = match projection {
            None => (0..self.columns.len()).collect(),
            Some(names) => names
                .iter()
                .map(|name| self.column_index(name))
                .collect::<RelayResult<_>>()?,
        };
        let columns = indices
            .iter()
            .map(|&i| ColumnMeta::new(self.columns[i].0.clone(), self.columns[i].1))
            .collect();
        Ok((Signature::of_columns(columns), indices))
    }
}

#[derive(Default)]
pub struct TinyEngine {
    shared: Arc<Mutex<HashMap<String, Table>>>,
}

impl Engine for TinyEngine {
    fn connect(&self, props: &ConnectionProps) -> RelayResult<Box<dyn EngineConnection>> {
        Ok(Box::new(TinyConnection {
            shared: Arc::clone(&self.shared),
            pending: HashMap::new(),
            dropped: Vec::new(),
            temp: HashMap::new(),
            auto_commit: props.auto_commit.unwrap_or(true),
        }))
    }
}

struct TinyConnection {
    shared: Arc<Mutex<HashMap<String, Table>>>,
    // copy-on-write overlay of uncommitted table changes
    pending: HashMap<String, Table>,
    dropped: Vec<String>,
    // session-local temporary tables, invisible to other connections
    temp: HashMap<String, Table>,
    auto_commit: bool,
}

impl TinyConnection {
    fn commit_pending(&mut self) -> RelayResult<()> {
        let mut shared = self.shared.lock().map_err(|_| RelayError::Poison)?;
        for name in self.dropped.drain(..) {
            shared.remove(&name);
        }
        for (name, table) in self.pending.drain() {
            shared.insert(name, table);
        }
        Ok(())
    }

    fn rollback_pending(&mut self) {
        self.pending.clear();
        self.dropped.clear();
    }

    fn read_table(&self, name: &str) -> RelayResult<Table> {
        if let Some(table) = self.temp.get(name) {
            return Ok(table.clone());
        }
        if self.dropped.iter().any(|dropped| dropped == name) {
            return Err(RelayError::engine(format!("unknown table {name}")));
        }
        if let Some(table) = self.pending.get(name) {
            return Ok(table.clone());
        }
        let shared = self.shared.lock().map_err(|_| RelayError::Poison)?;
        shared
            .get(name)
            .cloned()
            .ok_or_else(|| RelayError::engine(format!("unknown table {name}")))
    }

    fn write_table(&mut self, name: &str, table: Table) -> RelayResult<()> {
        if self.temp.contains_key(name) {
            self.temp.insert(name.to_string(), table);
        } else {
            self.pending.insert(name.to_string(), table);
            if self.auto_commit {
                self.commit_pending()?;
            }
        }
        Ok(())
    }

    fn all_visible_tables(&self) -> RelayResult<Vec<(String, Table)>> {
        let mut tables: Vec<(String, Table)> = Vec::new();
        let shared = self.shared.lock().map_err(|_| RelayError::Poison)?;
        for (name, table) in shared.iter() {
            if !self.dropped.iter().any(|dropped| dropped == name) {
                tables.push((name.clone(), table.clone()));
            }
        }
        drop(shared);
        for (name, table) in &self.pending {
            if !tables.iter().any(|(n, _)| n == name) {
                tables.push((name.clone(), table.clone()));
            }
        }
        for (name, table) in &self.temp {
            tables.push((name.clone(), table.clone()));
        }
        tables.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(tables)
    }

    fn run_sql(&mut self, sql: &str, params: &[DbValue]) -> RelayResult<EngineResult> {
        let trimmed = sql.trim();
        let lower = trimmed.to_lowercase();
        if let Some(rest) = lower.strip_prefix("create local temporary table ") {
            let (name, table) = parse_create(rest)?;
            self.temp.insert(name, table);
            Ok(EngineResult::Update(0))
        } else if let Some(rest) = lower.strip_prefix("create table ") {
            let (name, table) = parse_create(rest)?;
            self.write_table(&name, table)?;
            Ok(EngineResult::Update(0))
        } else if let Some(rest) = lower.strip_prefix("drop table ") {
            let name = rest.trim().trim_end_matches(';').to_string();
            if self.temp.remove(&name).is_none() {
                self.pending.remove(&name);
                self.dropped.push(name);
                if self.auto_commit {
                    self.commit_pending()?;
                }
            }
            Ok(EngineResult::Update(0))
        } else if lower.starts_with("insert into ") {
            let count = self.run_insert(trimmed, params)?;
            Ok(EngineResult::Update(count))
        } else if lower.starts_with("update ") {
            let count = self.run_update(trimmed)?;
            Ok(EngineResult::Update(count))
        } else if lower.starts_with("select ") {
            self.run_select(trimmed)
        } else {
            Err(RelayError::engine(format!("unsupported SQL: {trimmed}")))
        }
    }

    // insert into <table> (<columns>) values (<literals or ?>)
    fn run_insert(&mut self, sql: &str, params: &[DbValue]) -> RelayResult<u64> {
        let (table_name, columns, values) = parse_insert(sql)?;
        let mut table = self.read_table(&table_name)?;
        let mut row: Vec<DbValue> = table
            .columns
            .iter()
            .map(|_| DbValue::Null)
            .collect();
        let mut param_iter = params.iter();
        for (column, value) in columns.iter().zip(values.iter()) {
            let index = table.column_index(column)?;
            let rep = table.columns[index].1;
            row[index] = match value.as_str() {
                "?" => param_iter
                    .next()
                    .cloned()
                    .ok_or(RelayError::engine("too few parameters"))?,
                literal => parse_literal(literal, rep)?,
            };
        }
        table.rows.push(row);
        self.write_table(&table_name, table)?;
        Ok(1)
    }

    // update <table> set <col> = <col> + N | <col> = <col> - N | <col> = N, ...
    fn run_update(&mut self, sql: &str) -> RelayResult<u64> {
        let sql = sql.to_lowercase();
        let rest = &sql["update ".len()..];
        let set_pos = rest
            .find(" set ")
            .ok_or(RelayError::engine("unsupported update"))?;
        let table_name = rest[..set_pos].trim().to_string();
        let mut table = self.read_table(&table_name)?;
        let row_count = table.rows.len() as u64;
        for assignment in rest[set_pos + " set ".len()..].split(',') {
            let (column, expr) = assignment
                .split_once('=')
                .ok_or(RelayError::engine("unsupported update"))?;
            let column = column.trim();
            let index = table.column_index(column)?;
            let expr = expr.trim();
            let delta: i64;
            let absolute: Option<i64>;
            if let Some(add) = expr.strip_prefix(&format!("{column} + ")) {
                delta = add
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| RelayError::engine(format!("bad literal: {e}")))?;
                absolute = None;
            } else if let Some(sub) = expr.strip_prefix(&format!("{column} - ")) {
                delta = -sub
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| RelayError::engine(format!("bad literal: {e}")))?;
                absolute = None;
            } else {
                delta = 0;
                absolute = Some(
                    expr.parse::<i64>()
                        .map_err(|e| RelayError::engine(format!("bad literal: {e}")))?,
                );
            }
            for row in &mut table.rows {
                row[index] = match (&row[index], absolute) {
                    (_, Some(value)) => number_of_rep(table.columns[index].1, value),
                    (DbValue::Int(i), None) => DbValue::Int(i + delta as i32),
                    (DbValue::Long(i), None) => DbValue::Long(i + delta),
                    (DbValue::Null, None) => number_of_rep(table.columns[index].1, delta),
                    (other, None) => {
                        return Err(RelayError::engine(format!(
                            "cannot add to {other:?}"
                        )))
                    }
                };
            }
        }
        self.write_table(&table_name, table)?;
        Ok(row_count)
    }

    // select '<literal>' [as <name>] | select * from <table> | select <cols> from <table>
    fn run_select(&mut self, sql: &str) -> RelayResult<EngineResult> {
        let rest = sql["select ".len()..].trim();
        if rest.starts_with('\'') {
            let end = rest[1..]
                .find('\'')
                .ok_or(RelayError::engine("unterminated string literal"))?;
            let literal = rest[1..=end].to_string();
            let after = rest[end + 2..].trim();
            let name = after
                .strip_prefix("as ")
                .map_or("literal", |alias| {
                    alias.split_whitespace().next().unwrap_or("literal")
                })
                .to_string();
            return Ok(EngineResult::Query {
                signature: Signature::of_columns(vec![ColumnMeta::new(name, Rep::String)]),
                cursor: Box::new(VecCursor::new(vec![vec![DbValue::String(literal)]])),
            });
        }
        let from_pos = rest
            .to_lowercase()
            .find(" from ")
            .ok_or(RelayError::engine("unsupported select"))?;
        let projection = rest[..from_pos].trim();
        let table_name = rest[from_pos + " from ".len()..]
            .split_whitespace()
            .next()
            .ok_or(RelayError::engine("unsupported select"))?
            .to_lowercase();
        let table = self.read_table(&table_name)?;
        let (signature, indices) = if projection == "*" {
            table.signature(None)?
        } else {
            let names: Vec<String> = projection
                .split(',')
                .map(|name| name.trim().to_lowercase())
                .collect();
            table.signature(Some(names.as_slice()))?
        };
        let rows = table
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Ok(EngineResult::Query {
            signature,
            cursor: Box::new(VecCursor::new(rows)),
        })
    }
}

impl EngineConnection for TinyConnection {
    fn apply_props(&mut self, props: &ConnectionProps) -> RelayResult<()> {
        if let Some(auto_commit) = props.auto_commit {
            self.auto_commit = auto_commit;
        }
        Ok(())
    }

    fn prepare(&mut self, sql: &str) -> RelayResult<Signature> {
        let trimmed = sql.trim();
        let lower = trimmed.to_lowercase();
        if lower.starts_with("insert into ") {
            let (table_name, columns, values) = parse_insert(trimmed)?;
            let table = self.read_table(&table_name)?;
            let mut parameters = Vec::new();
            for (column, value) in columns.iter().zip(values.iter()) {
                if value == "?" {
                    let index = table.column_index(column)?;
                    parameters.push(ParameterMeta::new(column.clone(), table.columns[index].1));
                }
            }
            Ok(Signature {
                columns: Vec::new(),
                parameters,
                sql: None,
            })
        } else if lower.starts_with("select ") {
            match self.run_select(trimmed)? {
                EngineResult::Query { signature, mut cursor } => {
                    cursor.close().ok();
                    Ok(signature)
                }
                EngineResult::Update(_) => Err(RelayError::engine("select prepared as update")),
            }
        } else {
            Ok(Signature::default())
        }
    }

    fn execute(
        &mut self,
        sql: &str,
        params: &[DbValue],
        max_rows_total: i64,
    ) -> RelayResult<Vec<EngineResult>> {
        let result = match (self.run_sql(sql, params)?, max_rows_total > 0) {
            (EngineResult::Query { signature, mut cursor }, true) => {
                let cap = usize::try_from(max_rows_total).unwrap_or(usize::MAX);
                let rows = cursor.next_rows(cap)?;
                cursor.close().ok();
                EngineResult::Query {
                    signature,
                    cursor: Box::new(VecCursor::new(rows)),
                }
            }
            (other, _) => other,
        };
        if self.auto_commit {
            self.commit_pending()?;
        }
        Ok(vec![result])
    }

    fn commit(&mut self) -> RelayResult<()> {
        self.commit_pending()
    }

    fn rollback(&mut self) -> RelayResult<()> {
        self.rollback_pending();
        Ok(())
    }

    fn database_properties(&mut self) -> RelayResult<std::collections::BTreeMap<String, DbValue>> {
        let mut props = std::collections::BTreeMap::new();
        props.insert(
            "ENGINE_NAME".to_string(),
            DbValue::String("tiny".to_string()),
        );
        props.insert("MAX_CONNECTIONS".to_string(), DbValue::Int(64));
        Ok(props)
    }

    fn schemas(
        &mut self,
        _catalog: Option<&str>,
        _schema_pattern: Option<&str>,
    ) -> RelayResult<EngineResult> {
        let signature = Signature::of_columns(vec![
            ColumnMeta::new("TABLE_SCHEM", Rep::String),
            ColumnMeta::new("TABLE_CATALOG", Rep::String),
        ]);
        let rows = vec![vec![
            DbValue::String("PUBLIC".to_string()),
            DbValue::String("RELAY".to_string()),
        ]];
        Ok(EngineResult::Query {
            signature,
            cursor: Box::new(VecCursor::new(rows)),
        })
    }

    fn tables(
        &mut self,
        _catalog: Option<&str>,
        _schema_pattern: Option<&str>,
        table_name_pattern: Option<&str>,
        _type_list: Option<&[String]>,
    ) -> RelayResult<EngineResult> {
        let signature = Signature::of_columns(vec![
            ColumnMeta::new("TABLE_CAT", Rep::String),
            ColumnMeta::new("TABLE_SCHEM", Rep::String),
            ColumnMeta::new("TABLE_NAME", Rep::String),
            ColumnMeta::new("TABLE_TYPE", Rep::String),
        ]);
        let rows = self
            .all_visible_tables()?
            .into_iter()
            .filter(|(name, _)| matches_pattern(name, table_name_pattern))
            .map(|(name, _)| {
                vec![
                    DbValue::String("RELAY".to_string()),
                    DbValue::String("PUBLIC".to_string()),
                    DbValue::String(name),
                    DbValue::String("TABLE".to_string()),
                ]
            })
            .collect();
        Ok(EngineResult::Query {
            signature,
            cursor: Box::new(VecCursor::new(rows)),
        })
    }

    fn columns(
        &mut self,
        _catalog: Option<&str>,
        _schema_pattern: Option<&str>,
        table_name_pattern: Option<&str>,
        column_name_pattern: Option<&str>,
    ) -> RelayResult<EngineResult> {
        let signature = Signature::of_columns(vec![
            ColumnMeta::new("TABLE_NAME", Rep::String),
            ColumnMeta::new("COLUMN_NAME", Rep::String),
            ColumnMeta::new("DATA_TYPE", Rep::Int),
            ColumnMeta::new("ORDINAL_POSITION", Rep::Int),
        ]);
        let mut rows = Vec::new();
        for (table_name, table) in self.all_visible_tables()? {
            if !matches_pattern(&table_name, table_name_pattern) {
                continue;
            }
            for (position, (column_name, rep)) in table.columns.iter().enumerate() {
                if !matches_pattern(column_name, column_name_pattern) {
                    continue;
                }
                rows.push(vec![
                    DbValue::String(table_name.clone()),
                    DbValue::String(column_name.clone()),
                    DbValue::Int(rep.default_sql_type()),
                    DbValue::Int(i32::try_from(position).unwrap() + 1),
                ]);
            }
        }
        Ok(EngineResult::Query {
            signature,
            cursor: Box::new(VecCursor::new(rows)),
        })
    }

    fn type_info(&mut self) -> RelayResult<EngineResult> {
        let signature = Signature::of_columns(vec![
            ColumnMeta::new("TYPE_NAME", Rep::String),
            ColumnMeta::new("DATA_TYPE", Rep::Int),
        ]);
        let rows = ["BOOLEAN", "INTEGER", "BIGINT", "VARCHAR", "DECIMAL"]
            .iter()
            .enumerate()
            .map(|(i, name)| {
                vec![
                    DbValue::String((*name).to_string()),
                    DbValue::Int(i32::try_from(i).unwrap()),
                ]
            })
            .collect();
        Ok(EngineResult::Query {
            signature,
            cursor: Box::new(VecCursor::new(rows)),
        })
    }

    fn catalogs(&mut self) -> RelayResult<EngineResult> {
        let signature = Signature::of_columns(vec![ColumnMeta::new("TABLE_CAT", Rep::String)]);
        Ok(EngineResult::Query {
            signature,
            cursor: Box::new(VecCursor::new(vec![vec![DbValue::String(
                "RELAY".to_string(),
            )]])),
        })
    }

    fn table_types(&mut self) -> RelayResult<EngineResult> {
        let signature = Signature::of_columns(vec![ColumnMeta::new("TABLE_TYPE", Rep::String)]);
        let rows = vec![
            vec![DbValue::String("TABLE".to_string())],
            vec![DbValue::String("LOCAL TEMPORARY".to_string())],
        ];
        Ok(EngineResult::Query {
            signature,
            cursor: Box::new(VecCursor::new(rows)),
        })
    }

    fn close(&mut self) -> RelayResult<()> {
        self.rollback_pending();
        self.temp.clear();
        Ok(())
    }
}

fn matches_pattern(name: &str, pattern: Option<&str>) -> bool {
    match pattern {
        None => true,
        Some("%") => true,
        Some(pattern) => name == pattern,
    }
}

fn number_of_rep(rep: Rep, value: i64) -> DbValue {
    match rep {
        Rep::Int => DbValue::Int(i32::try_from(value).unwrap_or(0)),
        _ => DbValue::Long(value),
    }
}

fn rep_of_type(type_name: &str) -> RelayResult<Rep> {
    let base = type_name
        .split('(')
        .next()
        .unwrap_or(type_name)
        .trim()
        .to_lowercase();
    Ok(match base.as_str() {
        "boolean" | "bool" => Rep::Boolean,
        "tinyint" => Rep::Byte,
        "smallint" => Rep::Short,
        "int" | "integer" => Rep::Int,
        "bigint" => Rep::Long,
        "real" => Rep::Float,
        "double" => Rep::Double,
        "decimal" | "numeric" => Rep::Decimal,
        "varchar" | "nvarchar" | "text" => Rep::String,
        "varbinary" | "binary" | "blob" => Rep::Bytes,
        "date" => Rep::Date,
        "time" => Rep::Time,
        "timestamp" => Rep::Timestamp,
        other => return Err(RelayError::engine(format!("unknown type {other}"))),
    })
}

// "<name> (col type, col type, ...)"; DDL carries no string literals, so the
// lowercased tail after the create keyword is parsed directly.
fn parse_create(rest: &str) -> RelayResult<(String, Table)> {
    let paren = rest
        .find('(')
        .ok_or(RelayError::engine("unsupported create table"))?;
    let name = rest[..paren].trim().to_string();
    let cols_text = rest[paren + 1..]
        .trim_end()
        .trim_end_matches(';')
        .trim_end_matches(')');
    let mut columns = Vec::new();
    for definition in split_top_level(cols_text) {
        let mut parts = definition.trim().splitn(2, ' ');
        let column_name = parts
            .next()
            .ok_or(RelayError::engine("unsupported column definition"))?
            .to_lowercase();
        let type_name = parts
            .next()
            .ok_or(RelayError::engine("unsupported column definition"))?;
        columns.push((column_name, rep_of_type(type_name)?));
    }
    Ok((
        name,
        Table {
            columns,
            rows: Vec::new(),
        },
    ))
}

// "insert into <table> (<cols>) values (<values>)"
fn parse_insert(sql: &str) -> RelayResult<(String, Vec<String>, Vec<String>)> {
    let rest = &sql["insert into ".len()..];
    let paren = rest
        .find('(')
        .ok_or(RelayError::engine("unsupported insert"))?;
    let table_name = rest[..paren].trim().to_lowercase();
    let close = rest[paren..]
        .find(')')
        .ok_or(RelayError::engine("unsupported insert"))?
        + paren;
    let columns: Vec<String> = rest[paren + 1..close]
        .split(',')
        .map(|name| name.trim().to_lowercase())
        .collect();
    let values_pos = rest[close..]
        .to_lowercase()
        .find("values")
        .ok_or(RelayError::engine("unsupported insert"))?
        + close;
    let values_text = rest[values_pos + "values".len()..]
        .trim()
        .trim_start_matches('(')
        .trim_end()
        .trim_end_matches(';')
        .trim_end_matches(')');
    let values: Vec<String> = split_top_level(values_text)
        .into_iter()
        .map(|value| value.trim().to_string())
        .collect();
    if columns.len() != values.len() {
        return Err(RelayError::engine("insert arity mismatch"));
    }
    Ok((table_name, columns, values))
}

// splits on commas that are not inside quotes or parentheses
fn split_top_level(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0_i32;
    let mut in_string = false;
    let mut current = String::new();
    for c in text.chars() {
        match c {
            '\'' => {
                in_string = !in_string;
                current.push(c);
            }
            '(' if !in_string => {
                depth += 1;
                current.push(c);
            }
            ')' if !in_string => {
                depth -= 1;
                current.push(c);
            }
            ',' if !in_string && depth == 0 => {
                parts.push(current.trim().to_string());
                current = String::new();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

fn parse_literal(literal: &str, rep: Rep) -> RelayResult<DbValue> {
    if literal.eq_ignore_ascii_case("null") {
        return Ok(DbValue::Null);
    }
    if let Some(stripped) = literal.strip_prefix('\'') {
        let text = stripped.trim_end_matches('\'').to_string();
        return Ok(match rep {
            Rep::Bytes => DbValue::Bytes(text.into_bytes()),
            Rep::Decimal => DbValue::Decimal(
                bigdecimal(&text)
                    .map_err(|e| RelayError::engine(format!("bad decimal literal: {e}")))?,
            ),
            _ => DbValue::String(text),
        });
    }
    let bad = |e: &dyn std::fmt::Display| RelayError::engine(format!("bad literal: {e}"));
    Ok(match rep {
        Rep::Boolean => DbValue::Boolean(literal.parse().map_err(|e| bad(&e))?),
        Rep::Byte => DbValue::Byte(literal.parse().map_err(|e| bad(&e))?),
        Rep::Short => DbValue::Short(literal.parse().map_err(|e| bad(&e))?),
        Rep::Int => DbValue::Int(literal.parse().map_err(|e| bad(&e))?),
        Rep::Long => DbValue::Long(literal.parse().map_err(|e| bad(&e))?),
        Rep::Float => DbValue::Float(literal.parse().map_err(|e| bad(&e))?),
        Rep::Double => DbValue::Double(literal.parse().map_err(|e| bad(&e))?),
        Rep::Decimal => DbValue::Decimal(bigdecimal(literal).map_err(|e| bad(&e))?),
        _ => DbValue::String(literal.to_string()),
    })
}

fn bigdecimal(text: &str) -> Result<bigdecimal::BigDecimal, bigdecimal::ParseBigDecimalError> {
    bigdecimal::BigDecimal::from_str(text)
}
