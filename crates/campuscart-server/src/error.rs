use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use campuscart_shared::MarketError;
use campuscart_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Market(#[from] MarketError),

    #[error("Missing or invalid x-user-id header")]
    Unauthorized,

    #[error("Image not found: {0}")]
    MediaNotFound(String),

    #[error("Image too large: {size} bytes (max {max})")]
    ImageTooLarge { size: usize, max: usize },

    #[error("Media storage error: {0}")]
    MediaStorage(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        Self::Market(err.into())
    }
}

impl ServerError {
    fn status(&self) -> StatusCode {
        match self {
            ServerError::Market(err) => match err {
                MarketError::Validation(_) => StatusCode::BAD_REQUEST,
                MarketError::Permission(_) | MarketError::Role { .. } => StatusCode::FORBIDDEN,
                MarketError::InvalidTransition { .. } => StatusCode::CONFLICT,
                MarketError::NotFound(_) => StatusCode::NOT_FOUND,
                MarketError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServerError::MediaNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::ImageTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::MediaStorage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ServerError::Market(MarketError::Backend(detail)) => {
                tracing::error!(error = %detail, "backend failure");
                "Internal server error".to_string()
            }
            ServerError::MediaStorage(detail) => {
                tracing::error!(error = %detail, "media storage failure");
                "Media storage error".to_string()
            }
            _ => self.to_string(),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
