use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::{AppError, FieldError};

pub const MAX_NAME_CHARS: usize = 100;
pub const MAX_EMAIL_CHARS: usize = 100;
pub const MIN_PASSWORD_CHARS: usize = 8;

/// Request bodies that check (and may normalize) themselves before use.
pub trait Validate {
    fn validate(&mut self) -> Result<(), Vec<FieldError>>;
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn check_name(name: &str, errors: &mut Vec<FieldError>) {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        errors.push(FieldError::new("name", "Name must not be empty"));
    } else if trimmed.chars().count() > MAX_NAME_CHARS {
        errors.push(FieldError::new(
            "name",
            format!("Name must be at most {} characters", MAX_NAME_CHARS),
        ));
    }
}

pub(crate) fn check_email(email: &str, errors: &mut Vec<FieldError>) {
    if email.is_empty() {
        errors.push(FieldError::new("email", "Email must not be empty"));
    } else if email.chars().count() > MAX_EMAIL_CHARS {
        errors.push(FieldError::new(
            "email",
            format!("Email must be at most {} characters", MAX_EMAIL_CHARS),
        ));
    } else if !is_valid_email(email) {
        errors.push(FieldError::new("email", "Invalid email format"));
    }
}

pub(crate) fn check_password(field: &'static str, password: &str, errors: &mut Vec<FieldError>) {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        errors.push(FieldError::new(
            field,
            format!("Password must be at least {} characters", MIN_PASSWORD_CHARS),
        ));
    }
}

pub(crate) fn finish(errors: Vec<FieldError>) -> Result<(), Vec<FieldError>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// JSON body extractor that runs [`Validate`] and reports failures as `400`.
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(mut value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| {
                warn!(error = %rejection.body_text(), "rejected request body");
                AppError::BadRequest(rejection.body_text())
            })?;

        value.validate().map_err(|fields| {
            warn!(?fields, "request validation failed");
            AppError::Validation(fields)
        })?;

        Ok(ValidJson(value))
    }
}
