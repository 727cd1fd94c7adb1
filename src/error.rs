use thiserror::Error;

/// Errors from decoding and validating the `{t, y, ...}` envelope.
///
/// An `EnvelopeError` during decode of a whole packet means the packet is
/// dropped silently (the sender's `t` is untrusted); a validation error
/// raised while parsing a *request*'s arguments instead produces a 203
/// protocol-error reply echoing `t`.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("could not decode bencode: {0}")]
    Decode(String),
    #[error("top-level value is not a dictionary")]
    NotADict,
    #[error("missing key {0:?}")]
    MissingKey(&'static str),
    #[error("key {key:?} has the wrong type, expected {expected}")]
    BadKeyType {
        key: &'static str,
        expected: &'static str,
    },
    #[error("unknown message kind for `y`")]
    UnknownKind,
}

/// Errors from the transaction table. All are programmer errors — the
/// dispatcher is required to consult `by_index` before calling `insert`.
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("a transaction with id {0} is already live")]
    IdAlreadyLive(String),
    #[error("a transaction for {kind:?} to {addr} is already live")]
    IndexAlreadyLive { kind: &'static str, addr: String },
}

/// Errors surfaced by the query dispatcher when enqueuing a query.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("refusing to query self")]
    TargetIsSelf,
    #[error("a query of this kind to this peer is already in flight")]
    Duplicate,
    #[error("pending-query queue is full")]
    QueueFull,
}

/// Errors from sending a packet over the UDP socket.
#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("short write: sent {sent} of {expected} bytes")]
    ShortWrite { sent: usize, expected: usize },
}

/// Top-level engine errors. No protocol-level error reaches this far — these
/// are only raised by `Engine::run` itself (e.g. being started twice) or
/// surfaced from a background task's own panic.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine is already running")]
    AlreadyRunning,
    #[error("background task panicked")]
    TaskJoin(#[from] tokio::task::JoinError),
}
