use serde::Deserialize;

use crate::{
    error::{AppResult, FieldError},
    users::repo_types::{ListFilter, Role, SortField, SortOrder},
    validation::{check_email, check_name, check_password, finish, normalize_email, Validate},
};

/// Body for registration and admin creation.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
}

impl Validate for CreateUserRequest {
    fn validate(&mut self) -> Result<(), Vec<FieldError>> {
        self.name = self.name.trim().to_string();
        self.email = normalize_email(&self.email);
        let mut errors = Vec::new();
        check_name(&self.name, &mut errors);
        check_email(&self.email, &mut errors);
        check_password("password", &self.password, &mut errors);
        finish(errors)
    }
}

/// Body for profile and admin updates. Email is not accepted here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub current_password: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

impl Validate for UpdateUserRequest {
    fn validate(&mut self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        if let Some(name) = self.name.as_mut() {
            *name = name.trim().to_string();
            check_name(name, &mut errors);
        }
        if let Some(password) = &self.password {
            check_password("password", password, &mut errors);
        }
        finish(errors)
    }
}

/// Query string for `GET /users`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQuery {
    pub role: Option<Role>,
    pub sort_by: Option<String>,
    pub order: Option<SortOrder>,
}

impl ListUsersQuery {
    pub fn into_filter(self) -> AppResult<ListFilter> {
        let sort_by = match self.sort_by.as_deref() {
            Some(field) => SortField::parse(field)?,
            None => SortField::default(),
        };
        Ok(ListFilter {
            role: self.role,
            sort_by,
            order: self.order.unwrap_or_default(),
        })
    }
}
