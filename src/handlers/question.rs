// src/handlers/question.rs

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    extract::{AppJson, AppPath},
    handlers::quiz::find_visible_quiz,
    models::{
        answer::{AnswerResponse, CreateAnswerRequest, QuizQuestionAnswer, UpdateAnswerRequest},
        question::{CreateQuestionRequest, QuestionResponse, QuizQuestion, UpdateQuestionRequest},
    },
    permissions::Principal,
    utils::html::clean_html,
};

/// Translates constraint violations on questions/answers into 409s.
fn map_write_error(err: sqlx::Error) -> AppError {
    let constraint = err
        .as_database_error()
        .filter(|db_err| db_err.is_unique_violation())
        .and_then(|db_err| db_err.constraint().map(str::to_owned));

    match constraint.as_deref() {
        Some("unique_correct_answer_per_question") => {
            AppError::Conflict("This question already has a correct answer".to_string())
        }
        Some("unique_position_per_quiz") | Some("unique_position_per_question") => {
            AppError::Conflict("This position is already taken".to_string())
        }
        Some(other) => AppError::Conflict(format!("Duplicate value violates {}", other)),
        None => {
            tracing::error!("Failed to write question data: {:?}", err);
            AppError::from(err)
        }
    }
}

async fn find_question(
    pool: &PgPool,
    quiz_id: i64,
    question_id: i64,
) -> Result<QuizQuestion, AppError> {
    sqlx::query_as::<_, QuizQuestion>(
        r#"
        SELECT id, quiz_id, text, position, created_at, updated_at
        FROM quiz_questions
        WHERE id = $1 AND quiz_id = $2
        "#,
    )
    .bind(question_id)
    .bind(quiz_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Question not found".to_string()))
}

async fn find_answer(
    pool: &PgPool,
    question_id: i64,
    answer_id: i64,
) -> Result<QuizQuestionAnswer, AppError> {
    sqlx::query_as::<_, QuizQuestionAnswer>(
        r#"
        SELECT id, question_id, text, position, is_correct, created_at, updated_at
        FROM quiz_question_answers
        WHERE id = $1 AND question_id = $2
        "#,
    )
    .bind(answer_id)
    .bind(question_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Answer not found".to_string()))
}

/// Answers of one question, ordered by position, with the answer key.
async fn render_question(
    pool: &PgPool,
    question: QuizQuestion,
) -> Result<QuestionResponse, AppError> {
    let answers = sqlx::query_as::<_, QuizQuestionAnswer>(
        r#"
        SELECT id, question_id, text, position, is_correct, created_at, updated_at
        FROM quiz_question_answers
        WHERE question_id = $1
        ORDER BY position, id
        "#,
    )
    .bind(question.id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|answer| AnswerResponse::render(answer, true))
    .collect();

    Ok(QuestionResponse::new(question, answers))
}

/// Resolves the quiz and checks the caller may edit it.
async fn authorize_edit(
    pool: &PgPool,
    principal: &Principal,
    quiz_id: i64,
) -> Result<(), AppError> {
    let quiz = find_visible_quiz(pool, principal, quiz_id).await?;
    principal.require_modify(&quiz)
}

/// Adds a question to a quiz.
/// Owner of the quiz only.
pub async fn create_question(
    State(pool): State<PgPool>,
    principal: Principal,
    AppPath(quiz_id): AppPath<i64>,
    AppJson(payload): AppJson<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    authorize_edit(&pool, &principal, quiz_id).await?;
    payload.validate()?;

    let question = sqlx::query_as::<_, QuizQuestion>(
        r#"
        INSERT INTO quiz_questions (quiz_id, text, position)
        VALUES ($1, $2, $3)
        RETURNING id, quiz_id, text, position, created_at, updated_at
        "#,
    )
    .bind(quiz_id)
    .bind(clean_html(&payload.text))
    .bind(payload.position)
    .fetch_one(&pool)
    .await
    .map_err(map_write_error)?;

    Ok((
        StatusCode::CREATED,
        Json(QuestionResponse::new(question, Vec::new())),
    ))
}

/// Updates a question's text and/or position.
/// Owner of the quiz only.
pub async fn update_question(
    State(pool): State<PgPool>,
    principal: Principal,
    AppPath((quiz_id, question_id)): AppPath<(i64, i64)>,
    AppJson(payload): AppJson<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    authorize_edit(&pool, &principal, quiz_id).await?;
    payload.validate()?;

    if payload.is_empty() {
        let question = find_question(&pool, quiz_id, question_id).await?;
        return Ok(Json(render_question(&pool, question).await?));
    }

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("UPDATE quiz_questions SET updated_at = NOW()");

    if let Some(text) = payload.text {
        builder.push(", text = ");
        builder.push_bind(clean_html(&text));
    }

    if let Some(position) = payload.position {
        builder.push(", position = ");
        builder.push_bind(position);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(question_id);
    builder.push(" AND quiz_id = ");
    builder.push_bind(quiz_id);
    builder.push(" RETURNING id, quiz_id, text, position, created_at, updated_at");

    let question = builder
        .build_query_as::<QuizQuestion>()
        .fetch_optional(&pool)
        .await
        .map_err(map_write_error)?
        .ok_or_else(|| AppError::NotFound("Question not found".to_string()))?;

    Ok(Json(render_question(&pool, question).await?))
}

/// Deletes a question and its answers.
/// Owner of the quiz only.
pub async fn delete_question(
    State(pool): State<PgPool>,
    principal: Principal,
    AppPath((quiz_id, question_id)): AppPath<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    authorize_edit(&pool, &principal, quiz_id).await?;

    let result = sqlx::query("DELETE FROM quiz_questions WHERE id = $1 AND quiz_id = $2")
        .bind(question_id)
        .bind(quiz_id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Adds an answer to a question.
/// Owner of the quiz only.
pub async fn create_answer(
    State(pool): State<PgPool>,
    principal: Principal,
    AppPath((quiz_id, question_id)): AppPath<(i64, i64)>,
    AppJson(payload): AppJson<CreateAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    authorize_edit(&pool, &principal, quiz_id).await?;
    let question = find_question(&pool, quiz_id, question_id).await?;
    payload.validate()?;

    let answer = sqlx::query_as::<_, QuizQuestionAnswer>(
        r#"
        INSERT INTO quiz_question_answers (question_id, text, position, is_correct)
        VALUES ($1, $2, $3, $4)
        RETURNING id, question_id, text, position, is_correct, created_at, updated_at
        "#,
    )
    .bind(question.id)
    .bind(clean_html(&payload.text))
    .bind(payload.position)
    .bind(payload.is_correct)
    .fetch_one(&pool)
    .await
    .map_err(map_write_error)?;

    Ok((
        StatusCode::CREATED,
        Json(AnswerResponse::render(answer, true)),
    ))
}

/// Updates an answer's text, position and/or correctness.
/// Owner of the quiz only.
pub async fn update_answer(
    State(pool): State<PgPool>,
    principal: Principal,
    AppPath((quiz_id, question_id, answer_id)): AppPath<(i64, i64, i64)>,
    AppJson(payload): AppJson<UpdateAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    authorize_edit(&pool, &principal, quiz_id).await?;
    let question = find_question(&pool, quiz_id, question_id).await?;
    payload.validate()?;

    if payload.is_empty() {
        let answer = find_answer(&pool, question.id, answer_id).await?;
        return Ok(Json(AnswerResponse::render(answer, true)));
    }

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("UPDATE quiz_question_answers SET updated_at = NOW()");

    if let Some(text) = payload.text {
        builder.push(", text = ");
        builder.push_bind(clean_html(&text));
    }

    if let Some(position) = payload.position {
        builder.push(", position = ");
        builder.push_bind(position);
    }

    if let Some(is_correct) = payload.is_correct {
        builder.push(", is_correct = ");
        builder.push_bind(is_correct);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(answer_id);
    builder.push(" AND question_id = ");
    builder.push_bind(question.id);
    builder.push(
        " RETURNING id, question_id, text, position, is_correct, created_at, updated_at",
    );

    let answer = builder
        .build_query_as::<QuizQuestionAnswer>()
        .fetch_optional(&pool)
        .await
        .map_err(map_write_error)?
        .ok_or_else(|| AppError::NotFound("Answer not found".to_string()))?;

    Ok(Json(AnswerResponse::render(answer, true)))
}

/// Deletes an answer. Recorded participant choices of it go with it.
/// Owner of the quiz only.
pub async fn delete_answer(
    State(pool): State<PgPool>,
    principal: Principal,
    AppPath((quiz_id, question_id, answer_id)): AppPath<(i64, i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    authorize_edit(&pool, &principal, quiz_id).await?;
    let question = find_question(&pool, quiz_id, question_id).await?;

    let result = sqlx::query("DELETE FROM quiz_question_answers WHERE id = $1 AND question_id = $2")
        .bind(answer_id)
        .bind(question.id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete answer: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Answer not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
