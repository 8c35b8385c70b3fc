use crate::{
    protocol::{wire, Rep},
    RelayResult,
};
use serde::{Deserialize, Serialize};

/// Nominal SQL type codes carried in [`ColumnMeta`] and [`ParameterMeta`].
///
/// The numbering follows the de-facto cross-driver convention so that engine
/// adapters can pass their catalog codes through unchanged.
pub mod sql_types {
    pub const NULL: i32 = 0;
    pub const DECIMAL: i32 = 3;
    pub const INTEGER: i32 = 4;
    pub const SMALLINT: i32 = 5;
    pub const REAL: i32 = 7;
    pub const DOUBLE: i32 = 8;
    pub const VARCHAR: i32 = 12;
    pub const BOOLEAN: i32 = 16;
    pub const DATE: i32 = 91;
    pub const TIME: i32 = 92;
    pub const TIMESTAMP: i32 = 93;
    pub const BIGINT: i32 = -5;
    pub const TINYINT: i32 = -6;
    pub const VARBINARY: i32 = -3;
    pub const ARRAY: i32 = 2003;
}

/// Metadata for one column of a result signature.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMeta {
    /// Column name as defined in the table.
    pub name: String,
    /// Display label, usually the alias from the query.
    pub label: String,
    /// Nominal SQL type code, see [`sql_types`].
    pub sql_type: i32,
    /// Wire representation of the column's values.
    pub rep: Rep,
    pub precision: i32,
    pub scale: i32,
    pub nullable: bool,
    pub signed: bool,
    /// Component representation for ARRAY columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<Rep>,
}

impl ColumnMeta {
    /// Minimal metadata for a column of the given name and representation.
    pub fn new<S: Into<String>>(name: S, rep: Rep) -> ColumnMeta {
        let name = name.into();
        ColumnMeta {
            label: name.clone(),
            name,
            sql_type: rep.default_sql_type(),
            rep,
            precision: 0,
            scale: 0,
            nullable: true,
            signed: matches!(
                rep,
                Rep::Byte | Rep::Short | Rep::Int | Rep::Long | Rep::Float | Rep::Double | Rep::Decimal
            ),
            component: None,
        }
    }

    pub(crate) fn emit(&self, w: &mut dyn std::io::Write) -> RelayResult<()> {
        wire::emit_str(&self.name, w)?;
        wire::emit_str(&self.label, w)?;
        wire::emit_i32(self.sql_type, w)?;
        w.write_all(&[self.rep.type_code()])?;
        wire::emit_i32(self.precision, w)?;
        wire::emit_i32(self.scale, w)?;
        wire::emit_bool(self.nullable, w)?;
        wire::emit_bool(self.signed, w)?;
        match self.component {
            Some(component) => {
                wire::emit_bool(true, w)?;
                w.write_all(&[component.type_code()])?;
            }
            None => wire::emit_bool(false, w)?,
        }
        Ok(())
    }

    pub(crate) fn parse(rdr: &mut dyn std::io::Read) -> RelayResult<ColumnMeta> {
        let name = wire::parse_str(rdr)?;
        let label = wire::parse_str(rdr)?;
        let sql_type = wire::parse_i32(rdr)?;
        let rep = Rep::try_new(read_u8(rdr)?)?;
        let precision = wire::parse_i32(rdr)?;
        let scale = wire::parse_i32(rdr)?;
        let nullable = wire::parse_bool(rdr)?;
        let signed = wire::parse_bool(rdr)?;
        let component = if wire::parse_bool(rdr)? {
            Some(Rep::try_new(read_u8(rdr)?)?)
        } else {
            None
        };
        Ok(ColumnMeta {
            name,
            label,
            sql_type,
            rep,
            precision,
            scale,
            nullable,
            signed,
            component,
        })
    }
}

/// Metadata for one parameter of a prepared statement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterMeta {
    pub name: String,
    /// Nominal SQL type code, see [`sql_types`].
    pub sql_type: i32,
    /// Wire representation expected for bound values.
    pub rep: Rep,
    pub precision: i32,
    pub scale: i32,
}

impl ParameterMeta {
    pub fn new<S: Into<String>>(name: S, rep: Rep) -> ParameterMeta {
        ParameterMeta {
            name: name.into(),
            sql_type: rep.default_sql_type(),
            rep,
            precision: 0,
            scale: 0,
        }
    }

    pub(crate) fn emit(&self, w: &mut dyn std::io::Write) -> RelayResult<()> {
        wire::emit_str(&self.name, w)?;
        wire::emit_i32(self.sql_type, w)?;
        w.write_all(&[self.rep.type_code()])?;
        wire::emit_i32(self.precision, w)?;
        wire::emit_i32(self.scale, w)?;
        Ok(())
    }

    pub(crate) fn parse(rdr: &mut dyn std::io::Read) -> RelayResult<ParameterMeta> {
        Ok(ParameterMeta {
            name: wire::parse_str(rdr)?,
            sql_type: wire::parse_i32(rdr)?,
            rep: Rep::try_new(read_u8(rdr)?)?,
            precision: wire::parse_i32(rdr)?,
            scale: wire::parse_i32(rdr)?,
        })
    }
}

/// Column and parameter signatures of a prepared or executed statement.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    pub columns: Vec<ColumnMeta>,
    pub parameters: Vec<ParameterMeta>,
    /// SQL text the signature was derived from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
}

impl Signature {
    /// A result-only signature without parameters.
    pub fn of_columns(columns: Vec<ColumnMeta>) -> Signature {
        Signature {
            columns,
            parameters: Vec::new(),
            sql: None,
        }
    }

    pub(crate) fn emit(&self, w: &mut dyn std::io::Write) -> RelayResult<()> {
        wire::emit_len(self.columns.len(), w)?;
        for column in &self.columns {
            column.emit(w)?;
        }
        wire::emit_len(self.parameters.len(), w)?;
        for parameter in &self.parameters {
            parameter.emit(w)?;
        }
        wire::emit_opt_str(self.sql.as_deref(), w)
    }

    pub(crate) fn parse(rdr: &mut dyn std::io::Read) -> RelayResult<Signature> {
        let column_count = wire::parse_len(rdr)?;
        let mut columns = Vec::with_capacity(column_count.min(1024));
        for _ in 0..column_count {
            columns.push(ColumnMeta::parse(rdr)?);
        }
        let parameter_count = wire::parse_len(rdr)?;
        let mut parameters = Vec::with_capacity(parameter_count.min(1024));
        for _ in 0..parameter_count {
            parameters.push(ParameterMeta::parse(rdr)?);
        }
        Ok(Signature {
            columns,
            parameters,
            sql: wire::parse_opt_str(rdr)?,
        })
    }
}

fn read_u8(rdr: &mut dyn std::io::Read) -> RelayResult<u8> {
    let mut buf = [0_u8; 1];
    rdr.read_exact(&mut buf)?;
    Ok(buf[0])
}
