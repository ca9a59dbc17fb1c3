use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

/// Errors surfaced by the appointment stores and the booking service.
#[derive(Debug, Error)]
pub enum BookingError {
    /// A required field is missing or blank.
    #[error("{0}")]
    Validation(String),

    /// The requested time is not a bookable slot on that day.
    #[error("{0}")]
    InvalidSlot(String),

    /// The slot is already taken for that employee.
    #[error("{0}")]
    Conflict(String),

    /// Unknown employee or appointment.
    #[error("{0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Storage unavailable: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, BookingError>;

impl BookingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidSlot(_) | Self::Conflict(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(_) | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            error!(error = %self, "request failed");
            "Internal error, please try again".to_string()
        } else {
            self.to_string()
        };
        (status, message).into_response()
    }
}
