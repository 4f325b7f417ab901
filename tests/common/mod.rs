//! Shared helpers for integration tests: an in-process server speaking
//! newline-delimited JSON-RPC over in-memory pipes.

#![allow(dead_code)]

use mcpipe::prelude::*;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, duplex};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Server side of an in-memory connection, driven step by step by the test
pub struct FakePeer {
    lines: Lines<BufReader<DuplexStream>>,
    out: DuplexStream,
}

impl FakePeer {
    /// A client-side transport and the peer on the other end of it
    pub fn pair() -> (Box<dyn Transport>, FakePeer) {
        let (client_out, peer_in) = duplex(64 * 1024);
        let (peer_out, client_in) = duplex(64 * 1024);
        let transport = StdioTransport::from_streams(client_in, client_out);
        let peer = FakePeer {
            lines: BufReader::new(peer_in).lines(),
            out: peer_out,
        };
        (Box::new(transport), peer)
    }

    /// Next message from the client
    pub async fn recv(&mut self) -> Value {
        let line = tokio::time::timeout(RECV_TIMEOUT, self.lines.next_line())
            .await
            .expect("client sent nothing")
            .expect("read failed")
            .expect("client closed the stream");
        serde_json::from_str(&line).expect("client sent invalid JSON")
    }

    /// Next message, which must be a request for `method`
    pub async fn expect_request(&mut self, method: &str) -> Value {
        let message = self.recv().await;
        assert_eq!(message["method"], method, "unexpected message {message}");
        assert!(message.get("id").is_some(), "expected a request, got {message}");
        message
    }

    /// Next message, which must be a notification for `method`
    pub async fn expect_notification(&mut self, method: &str) -> Value {
        let message = self.recv().await;
        assert_eq!(message["method"], method, "unexpected message {message}");
        assert!(message.get("id").is_none(), "expected a notification, got {message}");
        message
    }

    pub async fn respond(&mut self, id: &Value, result: Value) {
        self.send(json!({"jsonrpc": "2.0", "id": id, "result": result}))
            .await;
    }

    pub async fn respond_error(&mut self, id: &Value, code: i32, message: &str) {
        self.send(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": code, "message": message}
        }))
        .await;
    }

    pub async fn send(&mut self, message: Value) {
        self.send_raw(&message.to_string()).await;
    }

    pub async fn send_raw(&mut self, line: &str) {
        self.out.write_all(line.as_bytes()).await.unwrap();
        self.out.write_all(b"\n").await.unwrap();
        self.out.flush().await.unwrap();
    }

    /// Answer `initialize` and consume `notifications/initialized`
    pub async fn handshake(&mut self) {
        let init = self.expect_request("initialize").await;
        self.respond(
            &init["id"],
            json!({
                "protocolVersion": "2025-06-18",
                "capabilities": {"tools": {"listChanged": false}, "prompts": {}, "resources": {}},
                "serverInfo": {"name": "fake-peer", "version": "0.0.1"}
            }),
        )
        .await;
        self.expect_notification("notifications/initialized").await;
    }
}

/// A client connected to a fresh [`FakePeer`]
pub async fn connected(config: ClientConfig) -> (McpClient, FakePeer) {
    let (transport, mut peer) = FakePeer::pair();
    let client = McpClient::new(config);
    let (result, ()) = tokio::join!(client.connect_transport(transport), peer.handshake());
    result.expect("handshake failed");
    (client, peer)
}

/// Arguments object from JSON
pub fn args(value: Value) -> Params {
    value.as_object().cloned().unwrap_or_default()
}

/// `tools/call` result carrying one text item
pub fn text_result(text: &str, is_error: bool) -> Value {
    json!({"content": [{"type": "text", "text": text}], "isError": is_error})
}
