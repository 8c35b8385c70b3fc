//! Byte blob in, byte blob out: serializer selection, dispatch, and the
//! mapping of every failure to the wire error envelope.

use crate::{
    protocol::{BinaryTranslator, ErrorEnvelope, JsonTranslator, Response},
    service::{MetaService, RequestContext},
    RelayResult,
};
use std::sync::Arc;

/// The two interchangeable serializations, selected by content type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireFormat {
    /// Self-describing JSON.
    Textual,
    /// Compact tagged binary.
    Binary,
}

impl WireFormat {
    pub const TEXTUAL_CONTENT_TYPE: &'static str = "application/json";
    pub const BINARY_CONTENT_TYPE: &'static str = "application/octet-stream";

    /// Selects the serializer for a request's content type; unknown content
    /// types fall back to the textual form.
    pub fn from_content_type(content_type: Option<&str>) -> WireFormat {
        match content_type {
            Some(ct) if ct.starts_with(Self::BINARY_CONTENT_TYPE) => WireFormat::Binary,
            _ => WireFormat::Textual,
        }
    }

    /// The symmetric content type for responses.
    pub fn content_type(self) -> &'static str {
        match self {
            WireFormat::Textual => Self::TEXTUAL_CONTENT_TYPE,
            WireFormat::Binary => Self::BINARY_CONTENT_TYPE,
        }
    }
}

/// Outcome of one dispatched request.
#[derive(Clone, Debug)]
pub struct DispatchOutcome {
    /// The serialized response, in the same serialization as the request.
    pub body: Vec<u8>,
    /// True when the body carries an error envelope (HTTP 500).
    pub is_error: bool,
}

/// Parses, dispatches, and serializes; uncaught failures become error
/// envelopes rather than transport failures.
#[derive(Debug)]
pub struct Dispatcher {
    service: Arc<MetaService>,
}

impl Dispatcher {
    pub fn new(service: Arc<MetaService>) -> Dispatcher {
        Dispatcher { service }
    }

    pub fn service(&self) -> &Arc<MetaService> {
        &self.service
    }

    /// Handles one opaque request body.
    pub fn dispatch(
        &self,
        ctx: &RequestContext,
        format: WireFormat,
        body: &[u8],
    ) -> DispatchOutcome {
        let response = self.try_dispatch(ctx, format, body);
        let (response, is_error) = match response {
            Ok(response) => (response, false),
            Err(error) => {
                debug!("request failed: {error}");
                let mut envelope = ErrorEnvelope::from_error(&error);
                envelope.rpc_metadata = Some(self.service.rpc_metadata().clone());
                (Response::Error(envelope), true)
            }
        };
        let body = self.serialize(format, &response);
        DispatchOutcome { body, is_error }
    }

    /// Builds an error outcome for failures that happen before dispatching,
    /// e.g. a request body that could not be read.
    pub fn error_outcome(&self, format: WireFormat, error: &crate::RelayError) -> DispatchOutcome {
        let mut envelope = ErrorEnvelope::from_error(error);
        envelope.rpc_metadata = Some(self.service.rpc_metadata().clone());
        DispatchOutcome {
            body: self.serialize(format, &Response::Error(envelope)),
            is_error: true,
        }
    }

    fn try_dispatch(
        &self,
        ctx: &RequestContext,
        format: WireFormat,
        body: &[u8],
    ) -> RelayResult<Response> {
        let request = match format {
            WireFormat::Textual => JsonTranslator::parse_request(body)?,
            WireFormat::Binary => BinaryTranslator::parse_request(body)?,
        };
        self.service.apply(ctx, request)
    }

    fn serialize(&self, format: WireFormat, response: &Response) -> Vec<u8> {
        let serialized = match format {
            WireFormat::Textual => JsonTranslator::serialize_response(response),
            WireFormat::Binary => BinaryTranslator::serialize_response(response),
        };
        match serialized {
            Ok(body) => body,
            Err(error) => {
                // last resort: an envelope that cannot itself fail to encode
                error!("serializing a response failed: {error}");
                let envelope = Response::Error(ErrorEnvelope::from_error(&error));
                match format {
                    WireFormat::Textual => JsonTranslator::serialize_response(&envelope),
                    WireFormat::Binary => BinaryTranslator::serialize_response(&envelope),
                }
                .unwrap_or_default()
            }
        }
    }
}
