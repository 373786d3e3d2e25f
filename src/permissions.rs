// src/permissions.rs

//! Who may see and change what.
//!
//! Superusers pass every check. Otherwise a quiz is visible to its owner and
//! to participants invited to it, and only its owner may change it.

use axum::{extract::FromRequestParts, http::request::Parts};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use crate::{error::AppError, models::quiz::Quiz, state::AppState, utils::jwt::Claims};

/// The authenticated caller together with the roles its account holds.
#[derive(Debug, Clone, FromRow)]
pub struct Principal {
    pub user_id: i64,
    pub email: String,
    pub is_superuser: bool,
    pub owner_id: Option<i64>,
    pub participant_id: Option<i64>,
}

/// Which optional parts of a quiz the caller gets to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visibility {
    /// The `is_correct` flag on answers.
    pub answer_key: bool,
    /// The quiz's submissions with their scores.
    pub submissions: bool,
}

impl Principal {
    /// Loads the account behind `user_id` with its role rows.
    pub async fn load(pool: &PgPool, user_id: i64) -> Result<Option<Self>, AppError> {
        let principal = sqlx::query_as::<_, Principal>(
            r#"
            SELECT
                u.id AS user_id,
                u.email,
                u.is_superuser,
                o.id AS owner_id,
                p.id AS participant_id
            FROM users u
            LEFT JOIN owners o ON o.user_id = u.id
            LEFT JOIN participants p ON p.user_id = u.id
            WHERE u.id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(principal)
    }

    pub fn is_owner(&self) -> bool {
        self.is_superuser || self.owner_id.is_some()
    }

    pub fn is_participant(&self) -> bool {
        self.is_superuser || self.participant_id.is_some()
    }

    pub fn require_owner(&self) -> Result<(), AppError> {
        if self.is_owner() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Only quiz owners can do this".to_string()))
        }
    }

    pub fn owns(&self, quiz: &Quiz) -> bool {
        self.owner_id == Some(quiz.owner_id)
    }

    /// Update, delete, edit questions/answers, invite.
    pub fn can_modify(&self, quiz: &Quiz) -> bool {
        self.is_superuser || self.owns(quiz)
    }

    pub fn require_modify(&self, quiz: &Quiz) -> Result<(), AppError> {
        if self.can_modify(quiz) {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Only the quiz owner can modify this quiz".to_string(),
            ))
        }
    }

    pub fn visibility(&self, quiz: &Quiz) -> Visibility {
        let privileged = self.can_modify(quiz);
        Visibility {
            answer_key: privileged,
            submissions: privileged,
        }
    }

    /// Submissions under `/participants/{participant_id}` belong to that
    /// participant alone.
    pub fn require_participant(&self, participant_id: i64) -> Result<(), AppError> {
        if self.is_superuser || self.participant_id == Some(participant_id) {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "You can only access your own submissions".to_string(),
            ))
        }
    }

    /// Appends the condition restricting `quizzes q` to the rows this caller
    /// may see. The builder must already be inside a `WHERE` clause.
    pub fn push_quiz_scope(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        if self.is_superuser {
            return;
        }
        builder.push(" AND (q.owner_id = ");
        builder.push_bind(self.owner_id);
        builder.push(
            " OR EXISTS (SELECT 1 FROM quiz_submissions vs WHERE vs.quiz_id = q.id AND vs.participant_id = ",
        );
        builder.push_bind(self.participant_id);
        builder.push("))");
    }
}

/// Resolves the caller from the `Claims` left by `auth_middleware`.
/// Tokens for deleted accounts are rejected with 401.
impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = parts
            .extensions
            .get::<Claims>()
            .ok_or_else(|| AppError::AuthError("Missing bearer token".to_string()))?;

        let user_id = claims.user_id()?;

        Principal::load(&state.pool, user_id)
            .await?
            .ok_or_else(|| AppError::AuthError("Account no longer exists".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(owner_id: Option<i64>, participant_id: Option<i64>) -> Principal {
        Principal {
            user_id: 1,
            email: "someone@quiz.com".to_string(),
            is_superuser: false,
            owner_id,
            participant_id,
        }
    }

    fn superuser() -> Principal {
        Principal {
            is_superuser: true,
            ..principal(None, None)
        }
    }

    fn quiz(owner_id: i64) -> Quiz {
        Quiz {
            id: 99,
            owner_id,
            name: "Geography".to_string(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_owner_role() {
        assert!(!principal(None, None).is_owner());
        assert!(principal(Some(1), None).is_owner());
        assert!(superuser().is_owner());
        assert!(principal(None, Some(1)).require_owner().is_err());
    }

    #[test]
    fn test_participant_role() {
        assert!(!principal(None, None).is_participant());
        assert!(principal(None, Some(4)).is_participant());
        assert!(superuser().is_participant());
    }

    #[test]
    fn test_only_owning_owner_modifies() {
        let quiz = quiz(5);
        assert!(principal(Some(5), None).can_modify(&quiz));
        assert!(!principal(Some(6), None).can_modify(&quiz));
        assert!(!principal(None, Some(5)).can_modify(&quiz));
        assert!(superuser().can_modify(&quiz));

        let err = principal(None, Some(5)).require_modify(&quiz).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn test_answer_key_visibility() {
        let quiz = quiz(5);
        let owner = principal(Some(5), None).visibility(&quiz);
        assert!(owner.answer_key && owner.submissions);

        // an owner of other quizzes who was invited to this one
        let invited_owner = principal(Some(6), Some(2)).visibility(&quiz);
        assert!(!invited_owner.answer_key);
        assert!(!invited_owner.submissions);

        assert!(superuser().visibility(&quiz).answer_key);
    }

    #[test]
    fn test_participant_sees_own_submissions_only() {
        let participant = principal(None, Some(3));
        assert!(participant.require_participant(3).is_ok());
        assert!(matches!(
            participant.require_participant(4),
            Err(AppError::Forbidden(_))
        ));
        assert!(principal(Some(3), None).require_participant(3).is_err());
        assert!(superuser().require_participant(4).is_ok());
    }

    #[test]
    fn test_scope_sql() {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT q.id FROM quizzes q WHERE TRUE");
        principal(Some(1), Some(2)).push_quiz_scope(&mut builder);
        let sql = builder.sql();
        assert!(sql.contains("q.owner_id = $1"));
        assert!(sql.contains("vs.participant_id = $2"));

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT q.id FROM quizzes q WHERE TRUE");
        superuser().push_quiz_scope(&mut builder);
        assert_eq!(builder.sql(), "SELECT q.id FROM quizzes q WHERE TRUE");
    }
}
