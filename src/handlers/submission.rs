// src/handlers/submission.rs

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{FromRow, PgPool};

use crate::{
    aggregation::{SubmissionFilter, load_submissions},
    error::{AppError, conflict_on_unique},
    extract::{AppJson, AppPath, AppQuery},
    models::submission::{CreateUserAnswerRequest, QuizUserAnswer, SubmissionListParams},
    permissions::Principal,
};

/// Lists a participant's submissions with their scores.
///
/// * `?quiz_name=` / `?owner_email=` match exactly, case-insensitively.
/// * `?search=` matches part of the quiz name or the owner's email.
pub async fn list_submissions(
    State(pool): State<PgPool>,
    principal: Principal,
    AppPath(participant_id): AppPath<i64>,
    AppQuery(params): AppQuery<SubmissionListParams>,
) -> Result<impl IntoResponse, AppError> {
    principal.require_participant(participant_id)?;

    let filter = SubmissionFilter {
        participant_id: Some(participant_id),
        params: Some(&params),
        ..Default::default()
    };

    Ok(Json(load_submissions(&pool, &filter).await?))
}

/// Retrieves a participant's submission for one quiz.
pub async fn get_submission(
    State(pool): State<PgPool>,
    principal: Principal,
    AppPath((participant_id, quiz_id)): AppPath<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    principal.require_participant(participant_id)?;

    let filter = SubmissionFilter {
        participant_id: Some(participant_id),
        quiz_id: Some(quiz_id),
        ..Default::default()
    };

    let submission = load_submissions(&pool, &filter)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound("Submission not found".to_string()))?;

    Ok(Json(submission))
}

#[derive(Debug, FromRow)]
struct ChosenAnswer {
    id: i64,
    question_id: i64,
    quiz_id: i64,
}

/// Records the participant's answer to one question of the quiz.
///
/// The answer must belong to the submission's quiz, and each question can be
/// answered once per submission.
pub async fn create_user_answer(
    State(pool): State<PgPool>,
    principal: Principal,
    AppPath((participant_id, quiz_id)): AppPath<(i64, i64)>,
    AppJson(payload): AppJson<CreateUserAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    principal.require_participant(participant_id)?;

    let submission_id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM quiz_submissions WHERE participant_id = $1 AND quiz_id = $2",
    )
    .bind(participant_id)
    .bind(quiz_id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Submission not found".to_string()))?;

    let answer = sqlx::query_as::<_, ChosenAnswer>(
        r#"
        SELECT a.id, a.question_id, qq.quiz_id
        FROM quiz_question_answers a
        JOIN quiz_questions qq ON qq.id = a.question_id
        WHERE a.id = $1
        "#,
    )
    .bind(payload.answer)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::BadRequest(format!("Answer {} does not exist", payload.answer)))?;

    if answer.quiz_id != quiz_id {
        return Err(AppError::BadRequest(
            "Answer does not belong to this quiz".to_string(),
        ));
    }

    if let Some(question_id) = payload.question {
        if question_id != answer.question_id {
            return Err(AppError::BadRequest(
                "Answer does not belong to this question".to_string(),
            ));
        }
    }

    let recorded = sqlx::query_as::<_, QuizUserAnswer>(
        r#"
        INSERT INTO quiz_user_answers (submission_id, question_id, answer_id)
        VALUES ($1, $2, $3)
        RETURNING id, submission_id, question_id, answer_id, created_at, updated_at
        "#,
    )
    .bind(submission_id)
    .bind(answer.question_id)
    .bind(answer.id)
    .fetch_one(&pool)
    .await
    .map_err(|e| conflict_on_unique(e, "This question has already been answered"))?;

    tracing::debug!(
        "Submission {} recorded answer {} for question {}",
        submission_id,
        answer.id,
        answer.question_id
    );

    Ok((StatusCode::CREATED, Json(recorded)))
}
