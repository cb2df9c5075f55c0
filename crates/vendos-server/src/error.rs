use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use vendos_queue::QueueError;

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// A queue operation refused or failed.
    Queue(QueueError),
    /// The inventory collaborator reports the slot empty.
    OutOfStock { unit_id: String, motor_id: u32 },
    /// Joining a blocking task failed.
    Internal(String),
}

impl AppError {
    /// Wrap a blocking-task join error.
    pub fn join(e: tokio::task::JoinError) -> Self {
        Self::Internal(format!("task join error: {e}"))
    }
}

impl From<QueueError> for AppError {
    fn from(e: QueueError) -> Self {
        Self::Queue(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Queue(QueueError::Conflict { .. }) => {
                (StatusCode::CONFLICT, self.to_message())
            }
            AppError::Queue(QueueError::InvalidState { .. }) => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_message())
            }
            AppError::Queue(QueueError::NotFound(_)) => (StatusCode::NOT_FOUND, self.to_message()),
            AppError::Queue(QueueError::Storage(_)) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_message())
            }
            AppError::OutOfStock { .. } => (StatusCode::UNPROCESSABLE_ENTITY, self.to_message()),
        };
        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl AppError {
    fn to_message(&self) -> String {
        match self {
            AppError::Queue(e) => e.to_string(),
            AppError::OutOfStock { unit_id, motor_id } => {
                format!("slot out of stock: unit {unit_id} motor {motor_id}")
            }
            AppError::Internal(msg) => msg.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vendos_types::CommandState;

    #[test]
    fn conflict_maps_to_409() {
        let err = AppError::Queue(QueueError::Conflict {
            unit_id: "v1".into(),
            motor_id: 1,
        });
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn invalid_state_maps_to_422() {
        let err = AppError::Queue(QueueError::InvalidState {
            id: "c1".into(),
            state: CommandState::Pending,
        });
        assert_eq!(
            err.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn not_found_maps_to_404() {
        let err = AppError::Queue(QueueError::NotFound("c1".into()));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn out_of_stock_maps_to_422() {
        let err = AppError::OutOfStock {
            unit_id: "v1".into(),
            motor_id: 2,
        };
        assert_eq!(
            err.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn internal_maps_to_500() {
        let err = AppError::Internal("boom".into());
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn response_body_contains_error_field() {
        let err = AppError::Queue(QueueError::NotFound("c1".into()));
        let response = err.into_response();
        let ct = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .expect("should have content-type");
        assert!(ct.to_str().unwrap().contains("application/json"));
    }
}
