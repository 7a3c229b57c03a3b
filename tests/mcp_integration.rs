//! Integration tests for MCP protocol handling.
//!
//! These tests verify the MCP server's JSON-RPC 2.0 protocol implementation,
//! including request/response handling, error responses, and the kicad_*
//! tool envelope shapes.

use kicad_mcp::mcp::protocol::{parse_message, IncomingMessage, RequestId};

// =============================================================================
// Protocol Parsing Tests
// =============================================================================

#[test]
fn test_parse_initialize_request() {
    let json = r#"{
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {
                "name": "test-client",
                "version": "1.0.0"
            }
        }
    }"#;

    let result = parse_message(json);
    assert!(result.is_ok());

    if let IncomingMessage::Request(req) = result.unwrap() {
        assert_eq!(req.method, "initialize");
        assert_eq!(req.id, RequestId::Number(1));
    } else {
        panic!("Expected Request");
    }
}

#[test]
fn test_parse_tool_call_request() {
    let json = r#"{
        "jsonrpc": "2.0",
        "id": 2,
        "method": "tools/call",
        "params": {
            "name": "kicad_create_project",
            "arguments": { "name": "amp", "path": "/tmp/amp" }
        }
    }"#;

    let result = parse_message(json);
    assert!(result.is_ok());

    if let IncomingMessage::Request(req) = result.unwrap() {
        assert_eq!(req.method, "tools/call");
        assert_eq!(req.id, RequestId::Number(2));
        let params = req.params.unwrap();
        assert_eq!(params["name"], "kicad_create_project");
        assert_eq!(params["arguments"]["name"], "amp");
    } else {
        panic!("Expected Request");
    }
}

#[test]
fn test_parse_notification() {
    let json = r#"{
        "jsonrpc": "2.0",
        "method": "notifications/initialized"
    }"#;

    let result = parse_message(json);
    assert!(result.is_ok());

    if let IncomingMessage::Notification(notif) = result.unwrap() {
        assert_eq!(notif.method, "notifications/initialized");
    } else {
        panic!("Expected Notification");
    }
}

#[test]
fn test_parse_invalid_json() {
    let result = parse_message("not valid json");
    assert!(result.is_err());

    let error = result.unwrap_err();
    assert_eq!(error.error.code, -32700);
    assert!(error.id.is_none());
}

#[test]
fn test_parse_missing_jsonrpc_version() {
    let json = r#"{"id": 1, "method": "tools/list"}"#;

    let result = parse_message(json);
    assert!(result.is_err());
    assert_eq!(result.unwrap_err().error.code, -32600);
}

#[test]
fn test_parse_string_request_id() {
    let json = r#"{"jsonrpc": "2.0", "id": "req-42", "method": "ping"}"#;

    let result = parse_message(json);
    assert!(result.is_ok());

    if let IncomingMessage::Request(req) = result.unwrap() {
        assert_eq!(req.id, RequestId::String("req-42".to_string()));
    } else {
        panic!("Expected Request");
    }
}

#[test]
fn test_request_without_params_is_valid() {
    let json = r#"{"jsonrpc": "2.0", "id": 7, "method": "resources/list"}"#;

    let result = parse_message(json);
    assert!(result.is_ok());

    if let IncomingMessage::Request(req) = result.unwrap() {
        assert!(req.params.is_none());
    } else {
        panic!("Expected Request");
    }
}

// =============================================================================
// Error Response Shape Tests
// =============================================================================

#[test]
fn test_method_not_found_response_shape() {
    use kicad_mcp::mcp::protocol::JsonRpcError;

    let error = JsonRpcError::method_not_found(RequestId::Number(9), "kicad/teleport");
    let json = serde_json::to_value(&error).unwrap();

    assert_eq!(json["jsonrpc"], "2.0");
    assert_eq!(json["id"], 9);
    assert_eq!(json["error"]["code"], -32601);
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("kicad/teleport"));
}

#[test]
fn test_parse_error_has_no_id() {
    use kicad_mcp::mcp::protocol::JsonRpcError;

    let error = JsonRpcError::parse_error();
    let json = serde_json::to_value(&error).unwrap();

    assert_eq!(json["error"]["code"], -32700);
    assert!(json.get("id").is_none());
}
