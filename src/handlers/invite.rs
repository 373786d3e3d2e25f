// src/handlers/invite.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, conflict_on_unique},
    extract::{AppJson, AppPath},
    handlers::quiz::find_visible_quiz,
    mail::{EmailMessage, Mailer},
    models::{
        quiz::Quiz,
        submission::{AcceptInviteRequest, InviteRequest},
        user::{Participant, normalize_email},
    },
    permissions::Principal,
    utils::hash::hash_password,
};

pub const INVITE_SUBJECT: &str = "Quiz Invite!";

/// Text of the invitation mail.
pub fn invite_email(quiz: &Quiz, from: &str, to: &str, code: Uuid) -> EmailMessage {
    EmailMessage {
        subject: INVITE_SUBJECT.to_string(),
        body: format!(
            "You've been invited to {}.\n\nAccept the invite with the code {}.",
            quiz.name, code
        ),
        from: from.to_string(),
        to: vec![to.to_string()],
    }
}

/// Invites someone to a quiz by email.
///
/// * Reuses the account with that email, or creates one without a password.
/// * Gives the account a participant profile if it has none.
/// * Creates the submission linking the quiz owner, participant and quiz.
/// * Mails the invite code. A failed delivery is logged; the invite stays.
///
/// Owner of the quiz only.
pub async fn invite_participant(
    State(pool): State<PgPool>,
    State(mailer): State<Arc<dyn Mailer>>,
    principal: Principal,
    AppPath(quiz_id): AppPath<i64>,
    AppJson(payload): AppJson<InviteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = find_visible_quiz(&pool, &principal, quiz_id).await?;
    principal.require_modify(&quiz)?;
    payload.validate()?;

    let email = normalize_email(&payload.email);

    let mut tx = pool.begin().await?;

    let existing_user = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE LOWER(email) = $1")
        .bind(&email)
        .fetch_optional(&mut *tx)
        .await?;

    let user_id = match existing_user {
        Some(id) => id,
        None => sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users (email, first_name, last_name)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&email)
        .bind(&payload.first_name)
        .bind(&payload.last_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, format!("Email '{}' is already in use", email)))?,
    };

    // The no-op update makes RETURNING yield the existing row as well.
    let participant = sqlx::query_as::<_, Participant>(
        r#"
        INSERT INTO participants (user_id)
        VALUES ($1)
        ON CONFLICT (user_id) DO UPDATE SET updated_at = participants.updated_at
        RETURNING id, user_id, created_at, updated_at
        "#,
    )
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;

    let code = Uuid::new_v4();
    let submission_id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO quiz_submissions (owner_id, participant_id, quiz_id, uuid)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(quiz.owner_id)
    .bind(participant.id)
    .bind(quiz.id)
    .bind(code)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| conflict_on_unique(e, format!("{} is already invited to this quiz", email)))?;

    let owner_email = sqlx::query_scalar::<_, String>(
        r#"
        SELECT u.email
        FROM owners o
        JOIN users u ON u.id = o.user_id
        WHERE o.id = $1
        "#,
    )
    .bind(quiz.owner_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        "Participant {} invited to quiz {} (submission {})",
        participant.id,
        quiz.id,
        submission_id
    );

    let message = invite_email(&quiz, &owner_email, &email, code);
    if let Err(e) = mailer.send(&message).await {
        tracing::error!("Failed to send invite for submission {}: {:?}", submission_id, e);
    }

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "submission_id": submission_id,
            "participant_id": participant.id,
        })),
    ))
}

#[derive(Debug, FromRow)]
struct PendingInvite {
    submission_id: i64,
    participant_id: i64,
    user_id: i64,
    accepted_on: Option<chrono::DateTime<chrono::Utc>>,
    has_password: bool,
}

/// Accepts an invite by its code. No authentication: the code is the secret.
///
/// Accounts created by an invite have no password; one must be chosen here.
pub async fn accept_invite(
    State(pool): State<PgPool>,
    AppPath(code): AppPath<Uuid>,
    AppJson(payload): AppJson<AcceptInviteRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = pool.begin().await?;

    let invite = sqlx::query_as::<_, PendingInvite>(
        r#"
        SELECT
            s.id AS submission_id,
            s.participant_id,
            p.user_id,
            s.accepted_on,
            (u.password IS NOT NULL) AS has_password
        FROM quiz_submissions s
        JOIN participants p ON p.id = s.participant_id
        JOIN users u ON u.id = p.user_id
        WHERE s.uuid = $1
        FOR UPDATE OF s
        "#,
    )
    .bind(code)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Invite not found".to_string()))?;

    if invite.accepted_on.is_some() {
        return Err(AppError::Conflict("Invite already accepted".to_string()));
    }

    if !invite.has_password {
        let password = payload.password.as_deref().ok_or_else(|| {
            AppError::BadRequest("A password is required to activate your account".to_string())
        })?;
        let hashed = hash_password(password)?;

        sqlx::query("UPDATE users SET password = $1, updated_at = NOW() WHERE id = $2")
            .bind(hashed)
            .bind(invite.user_id)
            .execute(&mut *tx)
            .await?;
    }

    let accepted_on = sqlx::query_scalar::<_, chrono::DateTime<chrono::Utc>>(
        r#"
        UPDATE quiz_submissions
        SET accepted_on = NOW(), updated_at = NOW()
        WHERE id = $1
        RETURNING accepted_on
        "#,
    )
    .bind(invite.submission_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!("Invite for submission {} accepted", invite.submission_id);

    Ok(Json(serde_json::json!({
        "submission_id": invite.submission_id,
        "participant_id": invite.participant_id,
        "accepted_on": accepted_on,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invite_email() {
        let quiz = Quiz {
            id: 1,
            owner_id: 1,
            name: "Test Quiz".to_string(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let code = Uuid::new_v4();
        let message = invite_email(&quiz, "owner1@quiz.com", "john.doe@test.com", code);

        assert_eq!(message.subject, "Quiz Invite!");
        assert!(message.body.starts_with("You've been invited to Test Quiz."));
        assert!(message.body.contains(&code.to_string()));
        assert_eq!(message.from, "owner1@quiz.com");
        assert_eq!(message.to, vec!["john.doe@test.com".to_string()]);
    }
}
