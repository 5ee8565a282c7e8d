use thiserror::Error;

/// Everything that can go wrong between receiving a gateway notification
/// and durably reconciling it. The gateway only understands ack/no-ack:
/// `StoreUnavailable` is the single variant that withholds the ack.
#[derive(Debug, Error)]
pub enum ReconError {
    /// Payload could not be decoded or lacks a transaction id. Retrying
    /// won't fix a malformed payload, so the caller acknowledges anyway.
    #[error("malformed notification: {0}")]
    MalformedNotification(String),

    /// Persistence store unreachable or timed out. Not acknowledged, so
    /// the gateway retries and the idempotent upsert absorbs the replay later.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}
