// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique (case-insensitive) email, also the login name.
    pub email: String,

    pub first_name: String,
    pub last_name: String,

    /// Argon2 password hash. `None` for invited participants who have not
    /// accepted yet. Skipped during serialization.
    #[serde(skip)]
    pub password: Option<String>,

    pub is_superuser: bool,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'owners' table: accounts allowed to create quizzes.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Owner {
    pub id: i64,
    pub user_id: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'participants' table: accounts invited to answer quizzes.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Participant {
    pub id: i64,
    pub user_id: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Identity of the current caller with its resolved roles.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: i64,
    pub email: String,
    pub is_superuser: bool,
    pub owner_id: Option<i64>,
    pub participant_id: Option<i64>,
}

/// DTO for registering a new quiz owner.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "A valid email address is required."))]
    pub email: String,
    #[validate(length(
        min = 8,
        max = 128,
        message = "Password length must be between 8 and 128 characters."
    ))]
    pub password: String,
    #[serde(default)]
    #[validate(length(max = 64))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 64))]
    pub last_name: String,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 254))]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// Emails are stored trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  John.Doe@Test.COM "), "john.doe@test.com");
    }

    #[test]
    fn test_register_validation() {
        let ok = RegisterRequest {
            email: "owner1@quiz.com".to_string(),
            password: "password123".to_string(),
            first_name: String::new(),
            last_name: String::new(),
        };
        assert!(ok.validate().is_ok());

        let bad = RegisterRequest {
            email: "not-an-email".to_string(),
            password: "short".to_string(),
            first_name: String::new(),
            last_name: String::new(),
        };
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let user = User {
            id: 1,
            email: "owner1@quiz.com".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            password: Some("$argon2id$secret".to_string()),
            is_superuser: false,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password").is_none());
        assert_eq!(value["email"], "owner1@quiz.com");
    }
}
