//! The compact binary serializer.
//!
//! The outer envelope carries a class-identifier string plus an opaque byte
//! body; the body is a variant-specific schema in which every field is
//! preceded by its integer tag. Integers are LittleEndian throughout.

use crate::{
    protocol::{
        message::{
            emit_props_map, parse_props_map, QueryState, ResultSetResponse, StatementHandle,
        },
        wire, ConnectionProps, DbValue, ErrorEnvelope, Frame, Request, Response, RpcMetadata,
    },
    RelayError, RelayResult,
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

const MAX_CLASS_ID_LEN: usize = 64;

/// Translates messages to and from their compact binary form.
///
/// Serialize-then-parse yields an equal message for every variant; unknown
/// class identifiers and stray field tags produce a structured error.
#[derive(Clone, Copy, Debug, Default)]
pub struct BinaryTranslator;

impl BinaryTranslator {
    pub fn serialize_request(request: &Request) -> RelayResult<Vec<u8>> {
        let mut body = Vec::new();
        emit_request_body(request, &mut body)?;
        emit_envelope(request.discriminator(), &body)
    }

    pub fn parse_request(bytes: &[u8]) -> RelayResult<Request> {
        let (class_id, mut body) = parse_envelope(bytes)?;
        parse_request_body(&class_id, &mut body)
    }

    pub fn serialize_response(response: &Response) -> RelayResult<Vec<u8>> {
        let mut body = Vec::new();
        emit_response_body(response, &mut body)?;
        emit_envelope(response.discriminator(), &body)
    }

    pub fn parse_response(bytes: &[u8]) -> RelayResult<Response> {
        let (class_id, mut body) = parse_envelope(bytes)?;
        parse_response_body(&class_id, &mut body)
    }
}

fn emit_envelope(class_id: &str, body: &[u8]) -> RelayResult<Vec<u8>> {
    let mut out = Vec::with_capacity(class_id.len() + body.len() + 6);
    #[allow(clippy::cast_possible_truncation)]
    out.write_u16::<LittleEndian>(class_id.len() as u16)?;
    out.extend_from_slice(class_id.as_bytes());
    out.write_u32::<LittleEndian>(
        u32::try_from(body.len())
            .map_err(|_| RelayError::Impl("message body too large to emit"))?,
    )?;
    out.extend_from_slice(body);
    Ok(out)
}

fn parse_envelope(bytes: &[u8]) -> RelayResult<(String, &[u8])> {
    let mut rdr = bytes;
    let class_id_len = rdr
        .read_u16::<LittleEndian>()
        .map_err(|_| invalid_envelope("truncated class-identifier length"))?
        as usize;
    if class_id_len == 0 || class_id_len > MAX_CLASS_ID_LEN || rdr.len() < class_id_len {
        return Err(invalid_envelope("class-identifier length"));
    }
    let class_id = std::str::from_utf8(&rdr[..class_id_len])
        .map_err(|_| invalid_envelope("class identifier"))?
        .to_string();
    rdr = &rdr[class_id_len..];
    let body_len = rdr
        .read_u32::<LittleEndian>()
        .map_err(|_| invalid_envelope("truncated body length"))? as usize;
    if rdr.len() < body_len {
        return Err(invalid_envelope("body length"));
    }
    Ok((class_id, &rdr[..body_len]))
}

fn invalid_envelope(what: &str) -> RelayError {
    RelayError::Protocol(format!("binary envelope contained an invalid tag: {what}"))
}

fn unknown_class_id(class_id: &str) -> RelayError {
    RelayError::Protocol(format!(
        "binary envelope contained an invalid tag: unknown class identifier {class_id:?}"
    ))
}

fn emit_request_body(request: &Request, w: &mut dyn std::io::Write) -> RelayResult<()> {
    match request {
        Request::OpenConnection {
            connection_id,
            info,
        } => {
            emit_str_field(1, connection_id, w)?;
            emit_props_field(2, info, w)
        }
        Request::CloseConnection { connection_id }
        | Request::TypeInfo { connection_id }
        | Request::Catalogs { connection_id }
        | Request::TableTypes { connection_id }
        | Request::CreateStatement { connection_id }
        | Request::Commit { connection_id }
        | Request::Rollback { connection_id } => emit_str_field(1, connection_id, w),
        Request::ConnectionSync {
            connection_id,
            props,
        } => {
            emit_str_field(1, connection_id, w)?;
            emit_props_field(2, props, w)
        }
        Request::DatabaseProperty {
            connection_id,
            name,
        } => {
            emit_str_field(1, connection_id, w)?;
            emit_opt_str_field(2, name.as_deref(), w)
        }
        Request::Schemas {
            connection_id,
            catalog,
            schema_pattern,
        } => {
            emit_str_field(1, connection_id, w)?;
            emit_opt_str_field(2, catalog.as_deref(), w)?;
            emit_opt_str_field(3, schema_pattern.as_deref(), w)
        }
        Request::Tables {
            connection_id,
            catalog,
            schema_pattern,
            table_name_pattern,
            type_list,
        } => {
            emit_str_field(1, connection_id, w)?;
            emit_opt_str_field(2, catalog.as_deref(), w)?;
            emit_opt_str_field(3, schema_pattern.as_deref(), w)?;
            emit_opt_str_field(4, table_name_pattern.as_deref(), w)?;
            wire::emit_field_tag(5, w)?;
            match type_list {
                Some(types) => {
                    wire::emit_bool(true, w)?;
                    emit_strings(types, w)
                }
                None => wire::emit_bool(false, w),
            }
        }
        Request::Columns {
            connection_id,
            catalog,
            schema_pattern,
            table_name_pattern,
            column_name_pattern,
        } => {
            emit_str_field(1, connection_id, w)?;
            emit_opt_str_field(2, catalog.as_deref(), w)?;
            emit_opt_str_field(3, schema_pattern.as_deref(), w)?;
            emit_opt_str_field(4, table_name_pattern.as_deref(), w)?;
            emit_opt_str_field(5, column_name_pattern.as_deref(), w)
        }
        Request::CloseStatement {
            connection_id,
            statement_id,
        }
        | Request::Cancel {
            connection_id,
            statement_id,
        } => {
            emit_str_field(1, connection_id, w)?;
            emit_u32_field(2, *statement_id, w)
        }
        Request::Prepare {
            connection_id,
            sql,
            max_rows_total,
        } => {
            emit_str_field(1, connection_id, w)?;
            emit_str_field(2, sql, w)?;
            emit_i64_field(3, *max_rows_total, w)
        }
        Request::Execute {
            connection_id,
            statement_id,
            parameter_values,
            first_frame_max_size,
        } => {
            emit_str_field(1, connection_id, w)?;
            emit_u32_field(2, *statement_id, w)?;
            wire::emit_field_tag(3, w)?;
            emit_values(parameter_values, w)?;
            emit_i32_field(4, *first_frame_max_size, w)
        }
        Request::PrepareAndExecute {
            connection_id,
            statement_id,
            sql,
            max_rows_total,
            first_frame_max_size,
        } => {
            emit_str_field(1, connection_id, w)?;
            emit_u32_field(2, *statement_id, w)?;
            emit_str_field(3, sql, w)?;
            emit_i64_field(4, *max_rows_total, w)?;
            emit_i32_field(5, *first_frame_max_size, w)
        }
        Request::ExecuteBatch {
            connection_id,
            statement_id,
            parameter_rows,
        } => {
            emit_str_field(1, connection_id, w)?;
            emit_u32_field(2, *statement_id, w)?;
            wire::emit_field_tag(3, w)?;
            wire::emit_len(parameter_rows.len(), w)?;
            for row in parameter_rows {
                emit_values(row, w)?;
            }
            Ok(())
        }
        Request::PrepareAndExecuteBatch {
            connection_id,
            statement_id,
            sql_commands,
        } => {
            emit_str_field(1, connection_id, w)?;
            emit_u32_field(2, *statement_id, w)?;
            wire::emit_field_tag(3, w)?;
            emit_strings(sql_commands, w)
        }
        Request::Fetch {
            connection_id,
            statement_id,
            offset,
            frame_max_size,
        } => {
            emit_str_field(1, connection_id, w)?;
            emit_u32_field(2, *statement_id, w)?;
            emit_u64_field(3, *offset, w)?;
            emit_i32_field(4, *frame_max_size, w)
        }
        Request::SyncResults {
            connection_id,
            statement_id,
            state,
            offset,
        } => {
            emit_str_field(1, connection_id, w)?;
            emit_u32_field(2, *statement_id, w)?;
            wire::emit_field_tag(3, w)?;
            state.emit(w)?;
            emit_u64_field(4, *offset, w)
        }
    }
}

#[allow(clippy::too_many_lines)]
fn parse_request_body(class_id: &str, rdr: &mut &[u8]) -> RelayResult<Request> {
    Ok(match class_id {
        "openConnection" => Request::OpenConnection {
            connection_id: parse_str_field(1, rdr)?,
            info: parse_props_field(2, rdr)?,
        },
        "closeConnection" => Request::CloseConnection {
            connection_id: parse_str_field(1, rdr)?,
        },
        "connectionSync" => Request::ConnectionSync {
            connection_id: parse_str_field(1, rdr)?,
            props: parse_props_field(2, rdr)?,
        },
        "databaseProperty" => Request::DatabaseProperty {
            connection_id: parse_str_field(1, rdr)?,
            name: parse_opt_str_field(2, rdr)?,
        },
        "schemas" => Request::Schemas {
            connection_id: parse_str_field(1, rdr)?,
            catalog: parse_opt_str_field(2, rdr)?,
            schema_pattern: parse_opt_str_field(3, rdr)?,
        },
        "tables" => Request::Tables {
            connection_id: parse_str_field(1, rdr)?,
            catalog: parse_opt_str_field(2, rdr)?,
            schema_pattern: parse_opt_str_field(3, rdr)?,
            table_name_pattern: parse_opt_str_field(4, rdr)?,
            type_list: {
                wire::expect_field_tag(5, rdr)?;
                if wire::parse_bool(rdr)? {
                    Some(parse_strings(rdr)?)
                } else {
                    None
                }
            },
        },
        "columns" => Request::Columns {
            connection_id: parse_str_field(1, rdr)?,
            catalog: parse_opt_str_field(2, rdr)?,
            schema_pattern: parse_opt_str_field(3, rdr)?,
            table_name_pattern: parse_opt_str_field(4, rdr)?,
            column_name_pattern: parse_opt_str_field(5, rdr)?,
        },
        "typeInfo" => Request::TypeInfo {
            connection_id: parse_str_field(1, rdr)?,
        },
        "catalogs" => Request::Catalogs {
            connection_id: parse_str_field(1, rdr)?,
        },
        "tableTypes" => Request::TableTypes {
            connection_id: parse_str_field(1, rdr)?,
        },
        "createStatement" => Request::CreateStatement {
            connection_id: parse_str_field(1, rdr)?,
        },
        "closeStatement" => Request::CloseStatement {
            connection_id: parse_str_field(1, rdr)?,
            statement_id: parse_u32_field(2, rdr)?,
        },
        "prepare" => Request::Prepare {
            connection_id: parse_str_field(1, rdr)?,
            sql: parse_str_field(2, rdr)?,
            max_rows_total: parse_i64_field(3, rdr)?,
        },
        "execute" => Request::Execute {
            connection_id: parse_str_field(1, rdr)?,
            statement_id: parse_u32_field(2, rdr)?,
            parameter_values: {
                wire::expect_field_tag(3, rdr)?;
                parse_values(rdr)?
            },
            first_frame_max_size: parse_i32_field(4, rdr)?,
        },
        "prepareAndExecute" => Request::PrepareAndExecute {
            connection_id: parse_str_field(1, rdr)?,
            statement_id: parse_u32_field(2, rdr)?,
            sql: parse_str_field(3, rdr)?,
            max_rows_total: parse_i64_field(4, rdr)?,
            first_frame_max_size: parse_i32_field(5, rdr)?,
        },
        "executeBatch" => Request::ExecuteBatch {
            connection_id: parse_str_field(1, rdr)?,
            statement_id: parse_u32_field(2, rdr)?,
            parameter_rows: {
                wire::expect_field_tag(3, rdr)?;
                let row_count = wire::parse_len(rdr)?;
                let mut rows = Vec::with_capacity(row_count.min(1024));
                for _ in 0..row_count {
                    rows.push(parse_values(rdr)?);
                }
                rows
            },
        },
        "prepareAndExecuteBatch" => Request::PrepareAndExecuteBatch {
            connection_id: parse_str_field(1, rdr)?,
            statement_id: parse_u32_field(2, rdr)?,
            sql_commands: {
                wire::expect_field_tag(3, rdr)?;
                parse_strings(rdr)?
            },
        },
        "fetch" => Request::Fetch {
            connection_id: parse_str_field(1, rdr)?,
            statement_id: parse_u32_field(2, rdr)?,
            offset: parse_u64_field(3, rdr)?,
            frame_max_size: parse_i32_field(4, rdr)?,
        },
        "syncResults" => Request::SyncResults {
            connection_id: parse_str_field(1, rdr)?,
            statement_id: parse_u32_field(2, rdr)?,
            state: {
                wire::expect_field_tag(3, rdr)?;
                QueryState::parse(rdr)?
            },
            offset: parse_u64_field(4, rdr)?,
        },
        "commit" => Request::Commit {
            connection_id: parse_str_field(1, rdr)?,
        },
        "rollback" => Request::Rollback {
            connection_id: parse_str_field(1, rdr)?,
        },
        "cancel" => Request::Cancel {
            connection_id: parse_str_field(1, rdr)?,
            statement_id: parse_u32_field(2, rdr)?,
        },
        other => return Err(unknown_class_id(other)),
    })
}

fn emit_response_body(response: &Response, w: &mut dyn std::io::Write) -> RelayResult<()> {
    match response {
        Response::OpenConnection { rpc_metadata }
        | Response::CloseConnection { rpc_metadata }
        | Response::CloseStatement { rpc_metadata }
        | Response::Commit { rpc_metadata }
        | Response::Rollback { rpc_metadata }
        | Response::Cancel { rpc_metadata } => emit_rpc_field(1, rpc_metadata, w),
        Response::ConnectionSync {
            props,
            rpc_metadata,
        } => {
            emit_props_field(1, props, w)?;
            emit_rpc_field(2, rpc_metadata, w)
        }
        Response::DatabaseProperty {
            props,
            rpc_metadata,
        } => {
            wire::emit_field_tag(1, w)?;
            emit_props_map(props, w)?;
            emit_rpc_field(2, rpc_metadata, w)
        }
        Response::ResultSet(result_set) => {
            wire::emit_field_tag(1, w)?;
            result_set.emit(w)
        }
        Response::CreateStatement {
            connection_id,
            statement_id,
            rpc_metadata,
        } => {
            emit_str_field(1, connection_id, w)?;
            emit_u32_field(2, *statement_id, w)?;
            emit_rpc_field(3, rpc_metadata, w)
        }
        Response::Prepare {
            statement,
            rpc_metadata,
        } => {
            wire::emit_field_tag(1, w)?;
            statement.emit(w)?;
            emit_rpc_field(2, rpc_metadata, w)
        }
        Response::Execute {
            results,
            rpc_metadata,
        } => {
            wire::emit_field_tag(1, w)?;
            wire::emit_len(results.len(), w)?;
            for result in results {
                result.emit(w)?;
            }
            emit_rpc_field(2, rpc_metadata, w)
        }
        Response::ExecuteBatch {
            update_counts,
            rpc_metadata,
        } => {
            wire::emit_field_tag(1, w)?;
            wire::emit_len(update_counts.len(), w)?;
            for count in update_counts {
                wire::emit_u64(*count, w)?;
            }
            emit_rpc_field(2, rpc_metadata, w)
        }
        Response::Fetch {
            frame,
            rpc_metadata,
        } => {
            wire::emit_field_tag(1, w)?;
            frame.emit(w)?;
            emit_rpc_field(2, rpc_metadata, w)
        }
        Response::SyncResults {
            missed,
            moved,
            rpc_metadata,
        } => {
            wire::emit_field_tag(1, w)?;
            wire::emit_bool(*missed, w)?;
            wire::emit_field_tag(2, w)?;
            wire::emit_bool(*moved, w)?;
            emit_rpc_field(3, rpc_metadata, w)
        }
        Response::Error(envelope) => {
            wire::emit_field_tag(1, w)?;
            envelope.emit(w)
        }
    }
}

fn parse_response_body(class_id: &str, rdr: &mut &[u8]) -> RelayResult<Response> {
    Ok(match class_id {
        "openConnectionResponse" => Response::OpenConnection {
            rpc_metadata: parse_rpc_field(1, rdr)?,
        },
        "closeConnectionResponse" => Response::CloseConnection {
            rpc_metadata: parse_rpc_field(1, rdr)?,
        },
        "connectionSyncResponse" => Response::ConnectionSync {
            props: parse_props_field(1, rdr)?,
            rpc_metadata: parse_rpc_field(2, rdr)?,
        },
        "databasePropertyResponse" => Response::DatabaseProperty {
            props: {
                wire::expect_field_tag(1, rdr)?;
                parse_props_map(rdr)?
            },
            rpc_metadata: parse_rpc_field(2, rdr)?,
        },
        "resultSetResponse" => Response::ResultSet({
            wire::expect_field_tag(1, rdr)?;
            ResultSetResponse::parse(rdr)?
        }),
        "createStatementResponse" => Response::CreateStatement {
            connection_id: parse_str_field(1, rdr)?,
            statement_id: parse_u32_field(2, rdr)?,
            rpc_metadata: parse_rpc_field(3, rdr)?,
        },
        "closeStatementResponse" => Response::CloseStatement {
            rpc_metadata: parse_rpc_field(1, rdr)?,
        },
        "prepareResponse" => Response::Prepare {
            statement: {
                wire::expect_field_tag(1, rdr)?;
                StatementHandle::parse(rdr)?
            },
            rpc_metadata: parse_rpc_field(2, rdr)?,
        },
        "executeResponse" => Response::Execute {
            results: {
                wire::expect_field_tag(1, rdr)?;
                let result_count = wire::parse_len(rdr)?;
                let mut results = Vec::with_capacity(result_count.min(1024));
                for _ in 0..result_count {
                    results.push(ResultSetResponse::parse(rdr)?);
                }
                results
            },
            rpc_metadata: parse_rpc_field(2, rdr)?,
        },
        "executeBatchResponse" => Response::ExecuteBatch {
            update_counts: {
                wire::expect_field_tag(1, rdr)?;
                let count = wire::parse_len(rdr)?;
                let mut update_counts = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    update_counts.push(wire::parse_u64(rdr)?);
                }
                update_counts
            },
            rpc_metadata: parse_rpc_field(2, rdr)?,
        },
        "fetchResponse" => Response::Fetch {
            frame: {
                wire::expect_field_tag(1, rdr)?;
                Frame::parse(rdr)?
            },
            rpc_metadata: parse_rpc_field(2, rdr)?,
        },
        "syncResultsResponse" => Response::SyncResults {
            missed: {
                wire::expect_field_tag(1, rdr)?;
                wire::parse_bool(rdr)?
            },
            moved: {
                wire::expect_field_tag(2, rdr)?;
                wire::parse_bool(rdr)?
            },
            rpc_metadata: parse_rpc_field(3, rdr)?,
        },
        "commitResponse" => Response::Commit {
            rpc_metadata: parse_rpc_field(1, rdr)?,
        },
        "rollbackResponse" => Response::Rollback {
            rpc_metadata: parse_rpc_field(1, rdr)?,
        },
        "cancelResponse" => Response::Cancel {
            rpc_metadata: parse_rpc_field(1, rdr)?,
        },
        "errorResponse" => Response::Error({
            wire::expect_field_tag(1, rdr)?;
            ErrorEnvelope::parse(rdr)?
        }),
        other => return Err(unknown_class_id(other)),
    })
}

fn emit_str_field(tag: u8, s: &str, w: &mut dyn std::io::Write) -> RelayResult<()> {
    wire::emit_field_tag(tag, w)?;
    wire::emit_str(s, w)
}

fn parse_str_field(tag: u8, rdr: &mut dyn std::io::Read) -> RelayResult<String> {
    wire::expect_field_tag(tag, rdr)?;
    wire::parse_str(rdr)
}

fn emit_opt_str_field(tag: u8, o_s: Option<&str>, w: &mut dyn std::io::Write) -> RelayResult<()> {
    wire::emit_field_tag(tag, w)?;
    wire::emit_opt_str(o_s, w)
}

fn parse_opt_str_field(tag: u8, rdr: &mut dyn std::io::Read) -> RelayResult<Option<String>> {
    wire::expect_field_tag(tag, rdr)?;
    wire::parse_opt_str(rdr)
}

fn emit_u32_field(tag: u8, u: u32, w: &mut dyn std::io::Write) -> RelayResult<()> {
    wire::emit_field_tag(tag, w)?;
    wire::emit_u32(u, w)
}

fn parse_u32_field(tag: u8, rdr: &mut dyn std::io::Read) -> RelayResult<u32> {
    wire::expect_field_tag(tag, rdr)?;
    wire::parse_u32(rdr)
}

fn emit_u64_field(tag: u8, u: u64, w: &mut dyn std::io::Write) -> RelayResult<()> {
    wire::emit_field_tag(tag, w)?;
    wire::emit_u64(u, w)
}

fn parse_u64_field(tag: u8, rdr: &mut dyn std::io::Read) -> RelayResult<u64> {
    wire::expect_field_tag(tag, rdr)?;
    wire::parse_u64(rdr)
}

fn emit_i32_field(tag: u8, i: i32, w: &mut dyn std::io::Write) -> RelayResult<()> {
    wire::emit_field_tag(tag, w)?;
    wire::emit_i32(i, w)
}

fn parse_i32_field(tag: u8, rdr: &mut dyn std::io::Read) -> RelayResult<i32> {
    wire::expect_field_tag(tag, rdr)?;
    wire::parse_i32(rdr)
}

fn emit_i64_field(tag: u8, i: i64, w: &mut dyn std::io::Write) -> RelayResult<()> {
    wire::emit_field_tag(tag, w)?;
    wire::emit_i64(i, w)
}

fn parse_i64_field(tag: u8, rdr: &mut dyn std::io::Read) -> RelayResult<i64> {
    wire::expect_field_tag(tag, rdr)?;
    wire::parse_i64(rdr)
}

fn emit_props_field(
    tag: u8,
    props: &ConnectionProps,
    w: &mut dyn std::io::Write,
) -> RelayResult<()> {
    wire::emit_field_tag(tag, w)?;
    props.emit(w)
}

fn parse_props_field(tag: u8, rdr: &mut dyn std::io::Read) -> RelayResult<ConnectionProps> {
    wire::expect_field_tag(tag, rdr)?;
    ConnectionProps::parse(rdr)
}

fn emit_rpc_field(tag: u8, metadata: &RpcMetadata, w: &mut dyn std::io::Write) -> RelayResult<()> {
    wire::emit_field_tag(tag, w)?;
    metadata.emit(w)
}

fn parse_rpc_field(tag: u8, rdr: &mut dyn std::io::Read) -> RelayResult<RpcMetadata> {
    wire::expect_field_tag(tag, rdr)?;
    RpcMetadata::parse(rdr)
}

fn emit_values(values: &[DbValue], w: &mut dyn std::io::Write) -> RelayResult<()> {
    wire::emit_len(values.len(), w)?;
    for value in values {
        value.emit(w)?;
    }
    Ok(())
}

fn parse_values(rdr: &mut dyn std::io::Read) -> RelayResult<Vec<DbValue>> {
    let count = wire::parse_len(rdr)?;
    let mut values = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        values.push(DbValue::parse(rdr)?);
    }
    Ok(values)
}

fn emit_strings(strings: &[String], w: &mut dyn std::io::Write) -> RelayResult<()> {
    wire::emit_len(strings.len(), w)?;
    for s in strings {
        wire::emit_str(s, w)?;
    }
    Ok(())
}

fn parse_strings(rdr: &mut dyn std::io::Read) -> RelayResult<Vec<String>> {
    let count = wire::parse_len(rdr)?;
    let mut strings = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        strings.push(wire::parse_str(rdr)?);
    }
    Ok(strings)
}

#[allow(unused_imports)]
#[cfg(test)]
mod tests {
    use super::BinaryTranslator;
    use crate::protocol::{
        ColumnMeta, ConnectionProps, DbValue, ErrorEnvelope, Frame, MetaOp, ParameterMeta,
        QueryState, Rep, Request, Response, ResultSetResponse, RpcMetadata, Severity, Signature,
        StatementHandle, QUERY_UPDATE_COUNT,
    };
    use bigdecimal::BigDecimal;
    use std::collections::BTreeMap;
    use std::str::FromStr;

    fn rpc() -> RpcMetadata {
        RpcMetadata::new("gateway.example.com:8765")
    }

    fn sample_signature() -> Signature {
        Signature {
            columns: vec![
                ColumnMeta::new("id", Rep::Long),
                ColumnMeta {
                    component: Some(Rep::String),
                    ..ColumnMeta::new("tags", Rep::Array)
                },
            ],
            parameters: vec![ParameterMeta::new("p1", Rep::Decimal)],
            sql: Some("select id, tags from t where amount < ?".to_string()),
        }
    }

    #[test]
    fn all_request_variants_round_trip() {
        let conn = || "1a6d4f67-2f3c-4c8e-9f1a-1b2c3d4e5f60".to_string();
        let requests = vec![
            Request::OpenConnection {
                connection_id: conn(),
                info: ConnectionProps {
                    auto_commit: Some(false),
                    read_only: Some(true),
                    catalog: Some("main".to_string()),
                    schema: None,
                    transaction_isolation: Some(2),
                    dirty: false,
                },
            },
            Request::CloseConnection {
                connection_id: conn(),
            },
            Request::ConnectionSync {
                connection_id: conn(),
                props: ConnectionProps::default(),
            },
            Request::DatabaseProperty {
                connection_id: conn(),
                name: Some("RELAY_VERSION".to_string()),
            },
            Request::Schemas {
                connection_id: conn(),
                catalog: None,
                schema_pattern: Some("app%".to_string()),
            },
            Request::Tables {
                connection_id: conn(),
                catalog: Some("main".to_string()),
                schema_pattern: None,
                table_name_pattern: Some("%".to_string()),
                type_list: Some(vec!["TABLE".to_string(), "VIEW".to_string()]),
            },
            Request::Columns {
                connection_id: conn(),
                catalog: None,
                schema_pattern: None,
                table_name_pattern: Some("products".to_string()),
                column_name_pattern: None,
            },
            Request::TypeInfo {
                connection_id: conn(),
            },
            Request::Catalogs {
                connection_id: conn(),
            },
            Request::TableTypes {
                connection_id: conn(),
            },
            Request::CreateStatement {
                connection_id: conn(),
            },
            Request::CloseStatement {
                connection_id: conn(),
                statement_id: 12,
            },
            Request::Prepare {
                connection_id: conn(),
                sql: "select * from t where id = ?".to_string(),
                max_rows_total: -1,
            },
            Request::Execute {
                connection_id: conn(),
                statement_id: 12,
                parameter_values: vec![
                    DbValue::Decimal(BigDecimal::from_str("12345.67890").unwrap()),
                    DbValue::Bytes(vec![0, 159, 146, 150]),
                ],
                first_frame_max_size: 100,
            },
            Request::PrepareAndExecute {
                connection_id: conn(),
                statement_id: 13,
                sql: "values (1)".to_string(),
                max_rows_total: 0,
                first_frame_max_size: -1,
            },
            Request::ExecuteBatch {
                connection_id: conn(),
                statement_id: 12,
                parameter_rows: vec![vec![DbValue::Int(1)], vec![DbValue::Int(2)]],
            },
            Request::PrepareAndExecuteBatch {
                connection_id: conn(),
                statement_id: 12,
                sql_commands: vec!["insert into t values (1)".to_string()],
            },
            Request::Fetch {
                connection_id: conn(),
                statement_id: 12,
                offset: 100,
                frame_max_size: 100,
            },
            Request::SyncResults {
                connection_id: conn(),
                statement_id: 12,
                state: QueryState::Sql {
                    sql: "select 1".to_string(),
                },
                offset: 0,
            },
            Request::Commit {
                connection_id: conn(),
            },
            Request::Rollback {
                connection_id: conn(),
            },
            Request::Cancel {
                connection_id: conn(),
                statement_id: 12,
            },
        ];
        for request in requests {
            let bytes = BinaryTranslator::serialize_request(&request).unwrap();
            assert_eq!(
                BinaryTranslator::parse_request(&bytes).unwrap(),
                request,
                "{request:?}"
            );
        }
    }

    #[test]
    fn all_response_variants_round_trip() {
        let mut props = BTreeMap::new();
        props.insert("RELAY_VERSION".to_string(), DbValue::String("0.5.0".to_string()));
        props.insert("READ_ONLY".to_string(), DbValue::Boolean(false));
        let result_set = ResultSetResponse {
            connection_id: "c1".to_string(),
            statement_id: 3,
            own_statement: true,
            signature: Some(sample_signature()),
            first_frame: Some(Frame {
                offset: 0,
                done: false,
                rows: vec![
                    vec![
                        DbValue::Long(1),
                        DbValue::Array(Rep::String, vec![DbValue::String("a".to_string())]),
                    ],
                    vec![DbValue::Long(2), DbValue::Null],
                ],
            }),
            update_count: QUERY_UPDATE_COUNT,
        };
        let responses = vec![
            Response::OpenConnection { rpc_metadata: rpc() },
            Response::CloseConnection { rpc_metadata: rpc() },
            Response::ConnectionSync {
                props: ConnectionProps {
                    auto_commit: Some(true),
                    dirty: true,
                    ..ConnectionProps::default()
                },
                rpc_metadata: rpc(),
            },
            Response::DatabaseProperty {
                props,
                rpc_metadata: rpc(),
            },
            Response::ResultSet(result_set.clone()),
            Response::CreateStatement {
                connection_id: "c1".to_string(),
                statement_id: 4,
                rpc_metadata: rpc(),
            },
            Response::CloseStatement { rpc_metadata: rpc() },
            Response::Prepare {
                statement: StatementHandle {
                    connection_id: "c1".to_string(),
                    statement_id: 4,
                    signature: Some(sample_signature()),
                },
                rpc_metadata: rpc(),
            },
            Response::Execute {
                results: vec![result_set],
                rpc_metadata: rpc(),
            },
            Response::ExecuteBatch {
                update_counts: vec![1, 0, 3],
                rpc_metadata: rpc(),
            },
            Response::Fetch {
                frame: Frame::empty(500, true),
                rpc_metadata: rpc(),
            },
            Response::SyncResults {
                missed: false,
                moved: true,
                rpc_metadata: rpc(),
            },
            Response::Commit { rpc_metadata: rpc() },
            Response::Rollback { rpc_metadata: rpc() },
            Response::Cancel { rpc_metadata: rpc() },
            Response::Error(ErrorEnvelope {
                error_message: "Error while executing SQL \"select 1\": nope".to_string(),
                error_code: 1017,
                sql_state: "42000".to_string(),
                severity: Severity::Error,
                stack_traces: vec!["nope".to_string()],
                rpc_metadata: Some(rpc()),
            }),
        ];
        for response in responses {
            let bytes = BinaryTranslator::serialize_response(&response).unwrap();
            assert_eq!(
                BinaryTranslator::parse_response(&bytes).unwrap(),
                response,
                "{response:?}"
            );
        }
    }

    #[test]
    fn garbage_bytes_mention_invalid_tag() {
        let err = BinaryTranslator::parse_request(&[0, 1, 2, 3, 4, 5, 6, 7]).unwrap_err();
        assert!(err.to_string().contains("invalid tag"), "{err}");
    }

    #[test]
    fn unknown_class_identifier_is_rejected() {
        let bytes = {
            let mut out = Vec::new();
            out.extend_from_slice(&4_u16.to_le_bytes());
            out.extend_from_slice(b"nope");
            out.extend_from_slice(&0_u32.to_le_bytes());
            out
        };
        let err = BinaryTranslator::parse_request(&bytes).unwrap_err();
        assert!(err.to_string().contains("invalid tag"), "{err}");
        assert!(err.to_string().contains("nope"), "{err}");
    }
}
