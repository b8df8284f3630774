// JSON-RPC envelope handling shared by the HTTP and WebSocket endpoints.

use focal_common::protocol::jsonrpc::{
    Request, RequestId, Response, RpcError, INVALID_REQUEST, JSONRPC_VERSION, PARSE_ERROR,
};
use focal_common::protocol::mcp_methods::PROMPTS_GET;
use serde_json::{json, Value};
use tracing::{error, info};

use super::methods::{Dispatcher, McpError};

/// Decode and answer one raw request. Returns `None` for notifications,
/// which never get a response even when they fail.
pub async fn handle_raw_request(raw: &[u8], dispatcher: &Dispatcher) -> Option<Response> {
    match decode_request(raw) {
        Ok(request) => dispatch_request(request, dispatcher).await,
        Err(response) => Some(response),
    }
}

/// Undecodable JSON is a parse error; JSON that is not a 2.0 request
/// envelope is an invalid request.
pub fn decode_request(raw: &[u8]) -> Result<Request, Response> {
    let value = serde_json::from_slice::<Value>(raw).map_err(|error| {
        Response::error(
            RequestId::Null,
            RpcError {
                code: PARSE_ERROR,
                message: "Parse error".to_string(),
                data: Some(json!({ "reason": error.to_string() })),
            },
        )
    })?;

    let request = serde_json::from_value::<Request>(value).map_err(|error| {
        Response::error(
            RequestId::Null,
            RpcError {
                code: INVALID_REQUEST,
                message: "Invalid Request".to_string(),
                data: Some(json!({ "reason": error.to_string() })),
            },
        )
    })?;

    if request.jsonrpc != JSONRPC_VERSION {
        return Err(Response::error(
            request.id.unwrap_or(RequestId::Null),
            RpcError::new(INVALID_REQUEST, "Invalid Request"),
        ));
    }
    Ok(request)
}

pub async fn dispatch_request(request: Request, dispatcher: &Dispatcher) -> Option<Response> {
    let prompt = prompt_name(&request);
    info!(method = %request.method, id = ?request.id, prompt, "mcp request");

    let Request { method, params, id, .. } = request;
    let outcome = run_blocking(dispatcher.clone(), method.clone(), params).await;
    if let Err(error) = &outcome {
        log_failure(&method, error);
    }

    let id = id?;
    Some(match outcome {
        Ok(result) => Response::success(id, result),
        Err(error) => Response::error(id, error.to_rpc_error()),
    })
}

/// Run the dispatcher on the blocking pool; a panic comes back as an
/// internal error instead of tearing down the connection.
async fn run_blocking(
    dispatcher: Dispatcher,
    method: String,
    params: Option<Value>,
) -> Result<Value, McpError> {
    match tokio::task::spawn_blocking(move || dispatcher.handle(&method, params)).await {
        Ok(outcome) => outcome,
        Err(join_error) => Err(McpError::TaskFailed(join_error.to_string())),
    }
}

fn log_failure(method: &str, error: &McpError) {
    if error.is_internal() {
        error!(method, error = ?error, "mcp request failed");
    } else {
        info!(method, code = error.code(), message = %error, "mcp request rejected");
    }
}

fn prompt_name(request: &Request) -> Option<&str> {
    if request.method != PROMPTS_GET {
        return None;
    }
    request.params.as_ref()?.get("name")?.as_str()
}
