//! JSON-RPC codec
//!
//! Every message is one line of JSON. Decoding is strict about envelope
//! structure and lenient about payloads: `params` and `result` are passed
//! through as untyped JSON.

use super::*;
use crate::{Error, Result};
use serde_json::{Map, Value};

/// Encoder/decoder for JSON-RPC messages
pub struct Codec;

impl Codec {
    /// Serialize a message to a single line of JSON.
    ///
    /// Refuses messages that could not be decoded back, such as a response
    /// carrying both `result` and `error`.
    pub fn encode(message: &JsonRpcMessage) -> Result<String> {
        match message {
            JsonRpcMessage::Request(req) => {
                check_version(&req.jsonrpc)?;
                check_method(&req.method)?;
                Ok(serde_json::to_string(req)?)
            }
            JsonRpcMessage::Response(resp) => {
                check_version(&resp.jsonrpc)?;
                match (&resp.result, &resp.error, &resp.id) {
                    (Some(_), Some(_), _) => {
                        Err(Error::schema("response has both \"result\" and \"error\""))
                    }
                    (None, None, _) => Err(Error::schema(
                        "response has neither \"result\" nor \"error\"",
                    )),
                    (Some(_), None, None) => Err(Error::schema("success response has no \"id\"")),
                    _ => Ok(serde_json::to_string(resp)?),
                }
            }
            JsonRpcMessage::Notification(notif) => {
                check_version(&notif.jsonrpc)?;
                check_method(&notif.method)?;
                Ok(serde_json::to_string(notif)?)
            }
        }
    }

    /// Parse one frame into a message.
    ///
    /// Fails with [`Error::MalformedMessage`] when the frame is not a JSON
    /// object and with [`Error::SchemaViolation`] when the object is not a
    /// well-formed JSON-RPC 2.0 message.
    pub fn decode(frame: &str) -> Result<JsonRpcMessage> {
        let value: Value =
            serde_json::from_str(frame).map_err(|e| Error::malformed(e.to_string()))?;
        let Value::Object(mut fields) = value else {
            return Err(Error::malformed("expected a JSON object"));
        };

        match fields.remove("jsonrpc") {
            Some(Value::String(version)) if version == JSONRPC_VERSION => {}
            Some(other) => {
                return Err(Error::schema(format!(
                    "unsupported \"jsonrpc\" version {other}"
                )));
            }
            None => return Err(Error::schema("missing \"jsonrpc\"")),
        }

        if let Some(method) = fields.remove("method") {
            let Value::String(method) = method else {
                return Err(Error::schema("\"method\" must be a string"));
            };
            check_method(&method)?;
            let params = take_params(&mut fields)?;

            return Ok(match fields.remove("id") {
                Some(id) => JsonRpcMessage::Request(JsonRpcRequest {
                    jsonrpc: JSONRPC_VERSION.to_string(),
                    id: parse_id(id)?,
                    method,
                    params,
                }),
                None => JsonRpcMessage::Notification(JsonRpcNotification {
                    jsonrpc: JSONRPC_VERSION.to_string(),
                    method,
                    params,
                }),
            });
        }

        let result = fields.remove("result");
        let error = fields.remove("error");
        let error = match (result.is_some(), error) {
            (true, Some(_)) => {
                return Err(Error::schema("response has both \"result\" and \"error\""));
            }
            (false, None) => {
                return Err(Error::schema(
                    "message has neither \"method\" nor \"result\"/\"error\"",
                ));
            }
            (_, Some(error)) => Some(
                serde_json::from_value::<JsonRpcError>(error)
                    .map_err(|e| Error::schema(format!("invalid \"error\" object: {e}")))?,
            ),
            (true, None) => None,
        };

        let id = match fields.remove("id") {
            None => return Err(Error::schema("response is missing \"id\"")),
            Some(Value::Null) if error.is_some() => None,
            Some(Value::Null) => return Err(Error::schema("success response has a null \"id\"")),
            Some(id) => Some(parse_id(id)?),
        };

        Ok(JsonRpcMessage::Response(JsonRpcResponse {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result,
            error,
        }))
    }

    /// Best-effort identifier lookup on a frame that failed to decode.
    ///
    /// Lets a decode failure reach the caller waiting on that identifier.
    /// Frames with a `method` are peer requests, whose identifiers live in the
    /// peer's namespace, so they never match.
    pub fn peek_id(frame: &str) -> Option<RequestId> {
        let value: Value = serde_json::from_str(frame).ok()?;
        if value.get("method").is_some() {
            return None;
        }
        serde_json::from_value(value.get("id")?.clone()).ok()
    }

    /// Convert a serializable payload into request parameters.
    ///
    /// `null` becomes no parameters; anything other than an object is a
    /// [`Error::SchemaViolation`].
    pub fn to_params<P: serde::Serialize>(payload: &P) -> Result<Option<Params>> {
        match serde_json::to_value(payload)? {
            Value::Null => Ok(None),
            Value::Object(params) => Ok(Some(params)),
            other => Err(Error::schema(format!(
                "parameters must serialize to an object, got {other}"
            ))),
        }
    }
}

fn check_version(version: &str) -> Result<()> {
    if version == JSONRPC_VERSION {
        Ok(())
    } else {
        Err(Error::schema(format!("unsupported \"jsonrpc\" version {version:?}")))
    }
}

fn check_method(method: &str) -> Result<()> {
    if method.is_empty() {
        Err(Error::schema("\"method\" must not be empty"))
    } else {
        Ok(())
    }
}

fn take_params(fields: &mut Map<String, Value>) -> Result<Option<Params>> {
    match fields.remove("params") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(params)) => Ok(Some(params)),
        Some(_) => Err(Error::schema("\"params\" must be an object")),
    }
}

fn parse_id(id: Value) -> Result<RequestId> {
    serde_json::from_value(id.clone())
        .map_err(|_| Error::schema(format!("\"id\" must be a string or integer, got {id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Params {
        value.as_object().cloned().unwrap()
    }

    fn sample_messages() -> Vec<JsonRpcMessage> {
        vec![
            JsonRpcRequest::new(1, "tools/list", None).into(),
            JsonRpcRequest::new(
                "req-7",
                "tools/call",
                Some(params(json!({
                    "name": "read_file",
                    "arguments": {"path": "test.md", "lines": [1, 2], "raw": null}
                }))),
            )
            .into(),
            JsonRpcRequest::new(2, "ping", Some(Params::new())).into(),
            JsonRpcResponse::success(1, json!({"tools": [{"name": "read_file"}]})).into(),
            JsonRpcResponse::success(3, Value::Null).into(),
            JsonRpcResponse::failure(
                Some(RequestId::Number(4)),
                JsonRpcError {
                    code: -32601,
                    message: "Method not found".to_string(),
                    data: Some(json!({"method": "nope"})),
                },
            )
            .into(),
            JsonRpcResponse::failure(None, JsonRpcError::new(-32700, "Parse error")).into(),
            JsonRpcNotification::new("notifications/initialized", None).into(),
            JsonRpcNotification::new(
                "notifications/message",
                Some(params(json!({"level": "info", "data": "line\nbreak"}))),
            )
            .into(),
        ]
    }

    #[test]
    fn test_encode_decode_round_trip() {
        for message in sample_messages() {
            let frame = Codec::encode(&message).unwrap();
            assert!(!frame.contains('\n'), "frame spans lines: {frame}");
            assert_eq!(Codec::decode(&frame).unwrap(), message);
        }
    }

    #[test]
    fn test_decode_classifies_messages() {
        let request = Codec::decode(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#).unwrap();
        assert!(matches!(request, JsonRpcMessage::Request(_)));

        let notification =
            Codec::decode(r#"{"jsonrpc":"2.0","method":"notifications/progress"}"#).unwrap();
        assert!(matches!(notification, JsonRpcMessage::Notification(_)));

        let response = Codec::decode(r#"{"jsonrpc":"2.0","id":"a","result":{}}"#).unwrap();
        assert_eq!(response.id(), Some(&RequestId::from("a")));
    }

    #[test]
    fn test_malformed_frames() {
        for frame in [
            r#"{"jsonrpc": "2.0", "id": 1, "method": "test""#,
            "not json at all",
            "[1, 2, 3]",
            "42",
        ] {
            let err = Codec::decode(frame).unwrap_err();
            assert!(matches!(err, Error::MalformedMessage(_)), "{frame}: {err}");
        }
    }

    #[test]
    fn test_schema_violations() {
        for frame in [
            r#"{"id": 1, "method": "test"}"#,
            r#"{"jsonrpc": "1.0", "id": 1, "method": "test"}"#,
            r#"{"jsonrpc": "2.0", "id": 1, "method": null}"#,
            r#"{"jsonrpc": "2.0", "id": 1, "method": ""}"#,
            r#"{"jsonrpc": "2.0", "id": 1, "method": "x", "params": [1]}"#,
            r#"{"jsonrpc": "2.0", "id": 1.5, "method": "x"}"#,
            r#"{"jsonrpc": "2.0", "id": 1}"#,
            r#"{"jsonrpc": "2.0", "result": {}}"#,
            r#"{"jsonrpc": "2.0", "id": null, "result": {}}"#,
            r#"{"jsonrpc": "2.0", "id": 1, "result": {}, "error": {"code": 1, "message": "x"}}"#,
            r#"{"jsonrpc": "2.0", "id": 1, "error": "boom"}"#,
        ] {
            let err = Codec::decode(frame).unwrap_err();
            assert!(matches!(err, Error::SchemaViolation(_)), "{frame}: {err}");
        }
    }

    #[test]
    fn test_null_result_is_a_result() {
        let message = Codec::decode(r#"{"jsonrpc":"2.0","id":9,"result":null}"#).unwrap();
        let JsonRpcMessage::Response(response) = message else {
            panic!("expected a response");
        };
        assert_eq!(response.result, Some(Value::Null));
        assert!(response.error.is_none());
    }

    #[test]
    fn test_encode_rejects_ambiguous_response() {
        let mut response = JsonRpcResponse::success(1, json!({}));
        response.error = Some(JsonRpcError::new(-1, "x"));
        assert!(matches!(
            Codec::encode(&response.into()),
            Err(Error::SchemaViolation(_))
        ));

        let empty = JsonRpcResponse {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(RequestId::Number(1)),
            result: None,
            error: None,
        };
        assert!(Codec::encode(&empty.into()).is_err());
    }

    #[test]
    fn test_peek_id() {
        assert_eq!(
            Codec::peek_id(r#"{"jsonrpc":"2.0","id":5,"error":"boom"}"#),
            Some(RequestId::Number(5))
        );
        assert_eq!(Codec::peek_id(r#"{"jsonrpc":"2.0"}"#), None);
        assert_eq!(Codec::peek_id(r#"{"jsonrpc":"1.0","id":5,"method":"x"}"#), None);
        assert_eq!(Codec::peek_id("garbage"), None);
    }

    #[test]
    fn test_to_params() {
        let params = Codec::to_params(&json!({"uri": "file:///a"})).unwrap().unwrap();
        assert_eq!(params["uri"], json!("file:///a"));
        assert!(Codec::to_params(&()).unwrap().is_none());
        assert!(matches!(
            Codec::to_params(&vec![1, 2]),
            Err(Error::SchemaViolation(_))
        ));
    }
}
