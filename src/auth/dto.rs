use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::FieldError,
    users::repo_types::{Role, SafeAccount},
    validation::{finish, normalize_email, Validate},
};

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&mut self) -> Result<(), Vec<FieldError>> {
        self.email = normalize_email(&self.email);
        let mut errors = Vec::new();
        if self.email.is_empty() {
            errors.push(FieldError::new("email", "Email must not be empty"));
        }
        if self.password.is_empty() {
            errors.push(FieldError::new("password", "Password must not be empty"));
        }
        finish(errors)
    }
}

/// Response returned after login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub user: PublicUser,
}

/// Public part of the user returned with a token.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<SafeAccount> for PublicUser {
    fn from(a: SafeAccount) -> Self {
        Self {
            id: a.id,
            name: a.name,
            email: a.email,
            role: a.role,
        }
    }
}
