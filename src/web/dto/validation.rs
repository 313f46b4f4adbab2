//! Request body extraction with field validation.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError};

use crate::web::error::ApiError;

/// JSON body that has passed `validator` checks.
///
/// Bodies that are not valid JSON for `T` are answered with 400; bodies that
/// parse but fail validation are answered with 422 and per-field details.
///
/// ```ignore
/// async fn register(
///     State(state): State<Arc<AppState>>,
///     ValidatedJson(req): ValidatedJson<RegisterRequest>,
/// ) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
///     // ...
/// }
/// ```
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| {
                tracing::debug!(error = %rejection.body_text(), "request body rejected");
                ApiError::bad_request(format!("Invalid JSON: {}", rejection.body_text()))
            })?;

        value.validate().map_err(ApiError::from_validation_errors)?;

        Ok(ValidatedJson(value))
    }
}

/// Reject names containing any control character, including line breaks.
pub fn no_control_chars(value: &str) -> Result<(), ValidationError> {
    if value.chars().any(char::is_control) {
        return Err(ValidationError::new("no_control_chars")
            .with_message("Must not contain control characters".into()));
    }
    Ok(())
}

/// Reject values that are blank once surrounding whitespace is removed.
pub fn not_empty_trimmed(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(
            ValidationError::new("not_empty_trimmed").with_message("Must not be empty".into())
        );
    }
    Ok(())
}
