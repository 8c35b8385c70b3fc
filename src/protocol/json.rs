//! The textual serializer: self-describing JSON with a discriminator field.

use crate::{
    protocol::{Request, Response},
    RelayError, RelayResult,
};

/// Translates messages to and from their textual JSON form.
///
/// Serialize-then-parse yields an equal message for every variant; unknown
/// discriminators produce a structured error, never silent discarding.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonTranslator;

impl JsonTranslator {
    pub fn serialize_request(request: &Request) -> RelayResult<Vec<u8>> {
        Ok(serde_json::to_vec(request)?)
    }

    pub fn parse_request(bytes: &[u8]) -> RelayResult<Request> {
        serde_json::from_slice(bytes).map_err(|e| decode_error("request", &e))
    }

    pub fn serialize_response(response: &Response) -> RelayResult<Vec<u8>> {
        Ok(serde_json::to_vec(response)?)
    }

    pub fn parse_response(bytes: &[u8]) -> RelayResult<Response> {
        serde_json::from_slice(bytes).map_err(|e| decode_error("response", &e))
    }
}

fn decode_error(what: &str, e: &serde_json::Error) -> RelayError {
    match e.classify() {
        serde_json::error::Category::Syntax | serde_json::error::Category::Eof => {
            RelayError::Protocol(format!("Illegal character in textual {what}: {e}"))
        }
        _ => RelayError::Protocol(format!("malformed textual {what}: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::JsonTranslator;
    use crate::protocol::{
        ConnectionProps, DbValue, ErrorEnvelope, Frame, MetaOp, QueryState, Rep, Request, Response,
        ResultSetResponse, RpcMetadata, Severity, QUERY_UPDATE_COUNT,
    };
    use std::collections::BTreeMap;

    fn rpc() -> RpcMetadata {
        RpcMetadata::new("gateway.example.com:8765")
    }

    #[test]
    fn requests_round_trip() {
        let requests = vec![
            Request::OpenConnection {
                connection_id: "c1".to_string(),
                info: ConnectionProps {
                    auto_commit: Some(true),
                    schema: Some("app".to_string()),
                    ..ConnectionProps::default()
                },
            },
            Request::ConnectionSync {
                connection_id: "c1".to_string(),
                props: ConnectionProps {
                    read_only: Some(false),
                    transaction_isolation: Some(2),
                    ..ConnectionProps::default()
                },
            },
            Request::Tables {
                connection_id: "c1".to_string(),
                catalog: None,
                schema_pattern: Some("%".to_string()),
                table_name_pattern: None,
                type_list: Some(vec!["TABLE".to_string()]),
            },
            Request::Execute {
                connection_id: "c1".to_string(),
                statement_id: 7,
                parameter_values: vec![
                    DbValue::Long(42),
                    DbValue::Null,
                    DbValue::Array(Rep::Int, vec![DbValue::Int(1)]),
                ],
                first_frame_max_size: -1,
            },
            Request::SyncResults {
                connection_id: "c1".to_string(),
                statement_id: 7,
                state: QueryState::Metadata {
                    op: MetaOp::Columns,
                },
                offset: 300,
            },
            Request::Cancel {
                connection_id: "c1".to_string(),
                statement_id: 7,
            },
        ];
        for request in requests {
            let bytes = JsonTranslator::serialize_request(&request).unwrap();
            assert_eq!(JsonTranslator::parse_request(&bytes).unwrap(), request);
        }
    }

    #[test]
    fn responses_round_trip() {
        let mut props = BTreeMap::new();
        props.insert(
            "RELAY_VERSION".to_string(),
            DbValue::String("0.5.0".to_string()),
        );
        let responses = vec![
            Response::OpenConnection { rpc_metadata: rpc() },
            Response::DatabaseProperty {
                props,
                rpc_metadata: rpc(),
            },
            Response::ResultSet(ResultSetResponse {
                connection_id: "c1".to_string(),
                statement_id: 3,
                own_statement: true,
                signature: None,
                first_frame: Some(Frame {
                    offset: 0,
                    done: true,
                    rows: vec![vec![DbValue::String("s".to_string())]],
                }),
                update_count: QUERY_UPDATE_COUNT,
            }),
            Response::SyncResults {
                missed: true,
                moved: false,
                rpc_metadata: rpc(),
            },
            Response::Error(ErrorEnvelope {
                error_message: "boom".to_string(),
                error_code: -1,
                sql_state: "00000".to_string(),
                severity: Severity::Error,
                stack_traces: vec!["boom".to_string(), "cause".to_string()],
                rpc_metadata: Some(rpc()),
            }),
        ];
        for response in responses {
            let bytes = JsonTranslator::serialize_response(&response).unwrap();
            assert_eq!(JsonTranslator::parse_response(&bytes).unwrap(), response);
        }
    }

    #[test]
    fn unknown_discriminator_is_a_protocol_error() {
        let err =
            JsonTranslator::parse_request(br#"{"request":"makeCoffee","connectionId":"c1"}"#)
                .unwrap_err();
        assert!(err.to_string().contains("makeCoffee"), "{err}");
    }

    #[test]
    fn garbage_bytes_mention_illegal_character() {
        let err = JsonTranslator::parse_request(&[0, 1, 2, 3, 4, 5, 6, 7]).unwrap_err();
        assert!(err.to_string().contains("Illegal character"), "{err}");
    }

    #[test]
    fn discriminator_is_spelled_out() {
        let bytes = JsonTranslator::serialize_request(&Request::Commit {
            connection_id: "c1".to_string(),
        })
        .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains(r#""request":"commit""#), "{text}");
        assert!(text.contains(r#""connectionId":"c1""#), "{text}");
    }
}
