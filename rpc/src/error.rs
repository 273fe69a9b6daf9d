/// An error from a daemon RPC call, or from the local resilience layer wrapping it.
#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
pub enum RpcError {
  /// The underlying transport failed (connection refused, DNS failure, timeout, ...).
  ///
  /// The transport itself is out of scope here; implementors of [`crate::DaemonRpc`] produce
  /// this variant from whatever HTTP/IPC error their transport layer raised.
  #[error("connection error: {0}")]
  ConnectionError(String),
  /// The daemon returned a well-formed response that was semantically invalid, inconsistent, or
  /// otherwise untrustworthy (e.g. a non-monotonic output distribution).
  #[error("invalid node response: {0}")]
  InvalidNode(String),
  /// The daemon rejected the request outright (bad parameters, unknown method, pruned data).
  #[error("daemon rejected request: {0}")]
  InternalError(String),
  /// The daemon returned a JSON-RPC error object.
  #[error("daemon error {code}: {message}")]
  DaemonError {
    /// The JSON-RPC error code.
    code: i64,
    /// The JSON-RPC error message.
    message: String,
  },
  /// The circuit breaker is open; the call was rejected without being attempted.
  #[error("circuit breaker open, retry after cooldown")]
  CircuitOpen,
  /// All retry attempts were exhausted.
  #[error("retries exhausted: {0}")]
  RetriesExhausted(String),
}
