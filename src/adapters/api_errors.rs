use {
    crate::domain::error::ReconError,
    axum::{
        http::StatusCode,
        response::{IntoResponse, Response},
    },
};

/// Newtype over the domain error so the HTTP mapping lives in the adapter
/// layer. The gateway ignores response bodies (it only distinguishes the
/// 200 `SUCCESS` ack from everything else), so 5xx responses carry no body
/// contract.
pub struct ApiError(pub ReconError);

impl From<ReconError> for ApiError {
    fn from(err: ReconError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self.0 {
            ReconError::StoreUnavailable(err) => {
                tracing::error!(error = %err, "store unavailable, withholding ack so gateway retries");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
            // Malformed payloads are acknowledged in the handler before this
            // layer; reaching here means a handler missed that path.
            ReconError::MalformedNotification(msg) => {
                tracing::warn!(error = %msg, "malformed notification escaped handler");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
            ReconError::Serialization(err) => {
                tracing::error!(error = %err, "serialization error");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
