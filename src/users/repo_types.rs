use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
pub enum Role {
    #[serde(alias = "admin")]
    Admin,
    #[default]
    #[serde(alias = "user")]
    User,
}

/// Account row as stored, credential included. Never serialized outward.
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub role: Role,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub last_login_at: Option<OffsetDateTime>,
}

/// Account without its credential; the only shape handed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeAccount {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login_at: Option<OffsetDateTime>,
}

impl From<Account> for SafeAccount {
    fn from(a: Account) -> Self {
        Self {
            id: a.id,
            name: a.name,
            email: a.email,
            role: a.role,
            created_at: a.created_at,
            updated_at: a.updated_at,
            last_login_at: a.last_login_at,
        }
    }
}

impl SafeAccount {
    /// Inactive means last seen strictly before `cutoff`, or never seen and
    /// created strictly before it.
    #[cfg(test)]
    pub fn is_inactive(&self, cutoff: OffsetDateTime) -> bool {
        match self.last_login_at {
            Some(last) => last < cutoff,
            None => self.created_at < cutoff,
        }
    }
}

/// Input for the store's create routine; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub role: Role,
}

/// Fields applied by an update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct AccountChanges {
    pub name: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    Name,
    Email,
    Role,
    #[default]
    CreatedAt,
    UpdatedAt,
    LastLoginAt,
}

impl SortField {
    pub fn parse(s: &str) -> AppResult<Self> {
        match s {
            "name" => Ok(Self::Name),
            "email" => Ok(Self::Email),
            "role" => Ok(Self::Role),
            "createdAt" | "created_at" => Ok(Self::CreatedAt),
            "updatedAt" | "updated_at" => Ok(Self::UpdatedAt),
            "lastLoginAt" | "last_login_at" => Ok(Self::LastLoginAt),
            other => Err(AppError::BadRequest(format!(
                "Cannot sort by unknown field \"{}\"",
                other
            ))),
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Role => "role",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::LastLoginAt => "last_login_at",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum SortOrder {
    #[default]
    #[serde(alias = "asc")]
    #[serde(rename = "ASC")]
    Asc,
    #[serde(alias = "desc")]
    #[serde(rename = "DESC")]
    Desc,
}

impl SortOrder {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Filter and ordering for listing accounts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListFilter {
    pub role: Option<Role>,
    pub sort_by: SortField,
    pub order: SortOrder,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn safe(created_days_ago: i64, last_login_days_ago: Option<i64>) -> SafeAccount {
        let now = OffsetDateTime::now_utc();
        SafeAccount {
            id: Uuid::new_v4(),
            name: "A".into(),
            email: "a@x.com".into(),
            role: Role::User,
            created_at: now - Duration::days(created_days_ago),
            updated_at: now,
            last_login_at: last_login_days_ago.map(|d| now - Duration::days(d)),
        }
    }

    #[test]
    fn inactivity_uses_last_login_when_present() {
        let cutoff = OffsetDateTime::now_utc() - Duration::days(30);
        assert!(safe(100, Some(31)).is_inactive(cutoff));
        assert!(!safe(100, Some(29)).is_inactive(cutoff));
    }

    #[test]
    fn inactivity_falls_back_to_creation_time() {
        let cutoff = OffsetDateTime::now_utc() - Duration::days(30);
        assert!(safe(31, None).is_inactive(cutoff));
        assert!(!safe(29, None).is_inactive(cutoff));
    }

    #[test]
    fn exact_cutoff_is_still_active() {
        let now = OffsetDateTime::now_utc();
        let cutoff = now - Duration::days(30);
        let mut a = safe(0, None);
        a.last_login_at = Some(cutoff);
        assert!(!a.is_inactive(cutoff));
    }

    #[test]
    fn safe_projection_has_no_password_field() {
        let json = serde_json::to_value(safe(1, None)).expect("serialize");
        let obj = json.as_object().expect("object");
        assert!(!obj.contains_key("passwordHash"));
        assert!(!obj.contains_key("password_hash"));
        assert!(obj.contains_key("createdAt"));
        assert_eq!(obj["role"], "USER");
    }

    #[test]
    fn role_accepts_lowercase_input() {
        let r: Role = serde_json::from_str("\"admin\"").expect("parse");
        assert_eq!(r, Role::Admin);
        let r: Role = serde_json::from_str("\"USER\"").expect("parse");
        assert_eq!(r, Role::User);
    }

    #[test]
    fn unknown_sort_field_is_bad_request() {
        assert!(matches!(
            SortField::parse("password_hash"),
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(SortField::parse("createdAt").unwrap(), SortField::CreatedAt);
    }
}
