use serde::{Deserialize, Serialize};

use crate::RpcError;

/// A JSON-RPC 2.0 request envelope.
#[derive(Clone, Serialize, Debug)]
pub struct JsonRpcRequest<P> {
  jsonrpc: &'static str,
  /// The daemon method name, e.g. `"get_info"`.
  pub method: &'static str,
  /// The method's parameters.
  pub params: P,
  id: u64,
}

impl<P> JsonRpcRequest<P> {
  /// Build a request for `method` with the given parameters.
  pub fn new(method: &'static str, params: P) -> Self {
    Self { jsonrpc: "2.0", method, params, id: 0 }
  }
}

#[derive(Deserialize, Debug)]
struct JsonRpcErrorObject {
  code: i64,
  message: String,
}

#[derive(Deserialize, Debug)]
struct JsonRpcResponseEnvelope<R> {
  result: Option<R>,
  error: Option<JsonRpcErrorObject>,
}

/// Unwrap a JSON-RPC 2.0 response body into its result, or a [`RpcError::DaemonError`].
pub fn parse_response<R: for<'de> Deserialize<'de>>(body: &[u8]) -> Result<R, RpcError> {
  let envelope: JsonRpcResponseEnvelope<R> = serde_json::from_slice(body)
    .map_err(|e| RpcError::InvalidNode(format!("malformed JSON-RPC response: {e}")))?;

  match (envelope.result, envelope.error) {
    (Some(result), _) => Ok(result),
    (None, Some(error)) => Err(RpcError::DaemonError { code: error.code, message: error.message }),
    (None, None) => Err(RpcError::InvalidNode("response had neither result nor error".into())),
  }
}

/// Parameters for `get_block`, by height.
#[derive(Clone, Serialize, Debug)]
pub struct GetBlockParams {
  /// The block height to fetch.
  pub height: usize,
}

/// Response body for `get_info`.
#[derive(Clone, Deserialize, Debug)]
pub struct GetInfoResponse {
  /// The daemon's current chain height.
  pub height: usize,
  /// The top block's hash, hex-encoded.
  pub top_block_hash: String,
  /// Whether the daemon considers itself synchronized.
  pub synchronized: bool,
}

/// Response body for `get_fee_estimate`.
#[derive(Clone, Deserialize, Debug)]
pub struct FeeEstimateResponse {
  /// The per-byte base fee, in atomic units.
  pub fee: u64,
  /// Fee priority multipliers, lowest to highest.
  pub quantization_mask: u64,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_a_successful_result() {
    let body = br#"{"result": {"height": 100, "top_block_hash": "ab", "synchronized": true}}"#;
    let parsed: GetInfoResponse = parse_response(body).unwrap();
    assert_eq!(parsed.height, 100);
  }

  #[test]
  fn surfaces_a_daemon_error() {
    let body = br#"{"error": {"code": -32601, "message": "method not found"}}"#;
    let err = parse_response::<GetInfoResponse>(body).unwrap_err();
    assert_eq!(err, RpcError::DaemonError { code: -32601, message: "method not found".into() });
  }
}
