// src/handlers/quiz.rs

use std::collections::HashMap;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    aggregation::{SubmissionFilter, load_submissions},
    error::{AppError, conflict_on_unique},
    extract::{AppJson, AppPath, AppQuery},
    models::{
        answer::{AnswerResponse, QuizQuestionAnswer},
        question::{QuestionResponse, QuizQuestion},
        quiz::{CreateQuizRequest, Quiz, QuizListParams, QuizResponse, ReplaceQuizRequest, UpdateQuizRequest},
        submission::SubmissionResponse,
    },
    permissions::Principal,
    utils::search::{contains_pattern, non_blank},
};

const QUIZ_SELECT: &str = r#"
    SELECT q.id, q.owner_id, q.name, q.created_at, q.updated_at
    FROM quizzes q
    WHERE TRUE
"#;

/// Fetches a quiz the caller is allowed to see.
/// Quizzes outside the caller's scope are reported as missing.
pub(crate) async fn find_visible_quiz(
    pool: &PgPool,
    principal: &Principal,
    quiz_id: i64,
) -> Result<Quiz, AppError> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(QUIZ_SELECT);
    builder.push(" AND q.id = ");
    builder.push_bind(quiz_id);
    principal.push_quiz_scope(&mut builder);

    builder
        .build_query_as::<Quiz>()
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))
}

/// Nests questions, answers and (where allowed) submissions under each quiz.
/// Preserves the order of `quizzes`.
async fn render_quizzes(
    pool: &PgPool,
    principal: &Principal,
    quizzes: Vec<Quiz>,
) -> Result<Vec<QuizResponse>, AppError> {
    if quizzes.is_empty() {
        return Ok(Vec::new());
    }

    let quiz_ids: Vec<i64> = quizzes.iter().map(|quiz| quiz.id).collect();

    let questions = sqlx::query_as::<_, QuizQuestion>(
        r#"
        SELECT id, quiz_id, text, position, created_at, updated_at
        FROM quiz_questions
        WHERE quiz_id = ANY($1)
        ORDER BY position, id
        "#,
    )
    .bind(&quiz_ids)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch questions: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let answers = sqlx::query_as::<_, QuizQuestionAnswer>(
        r#"
        SELECT a.id, a.question_id, a.text, a.position, a.is_correct, a.created_at, a.updated_at
        FROM quiz_question_answers a
        JOIN quiz_questions qq ON qq.id = a.question_id
        WHERE qq.quiz_id = ANY($1)
        ORDER BY a.position, a.id
        "#,
    )
    .bind(&quiz_ids)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch answers: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let privileged_ids: Vec<i64> = quizzes
        .iter()
        .filter(|quiz| principal.visibility(quiz).submissions)
        .map(|quiz| quiz.id)
        .collect();

    let mut submissions_by_quiz: HashMap<i64, Vec<SubmissionResponse>> = HashMap::new();
    if !privileged_ids.is_empty() {
        let filter = SubmissionFilter {
            quiz_ids: Some(&privileged_ids),
            ..Default::default()
        };
        for submission in load_submissions(pool, &filter).await? {
            submissions_by_quiz
                .entry(submission.quiz_id)
                .or_default()
                .push(submission);
        }
    }

    let mut answers_by_question: HashMap<i64, Vec<QuizQuestionAnswer>> = HashMap::new();
    for answer in answers {
        answers_by_question
            .entry(answer.question_id)
            .or_default()
            .push(answer);
    }

    let mut questions_by_quiz: HashMap<i64, Vec<QuizQuestion>> = HashMap::new();
    for question in questions {
        questions_by_quiz
            .entry(question.quiz_id)
            .or_default()
            .push(question);
    }

    let rendered = quizzes
        .into_iter()
        .map(|quiz| {
            let visibility = principal.visibility(&quiz);

            let questions = questions_by_quiz
                .remove(&quiz.id)
                .unwrap_or_default()
                .into_iter()
                .map(|question| {
                    let answers = answers_by_question
                        .remove(&question.id)
                        .unwrap_or_default()
                        .into_iter()
                        .map(|answer| AnswerResponse::render(answer, visibility.answer_key))
                        .collect();
                    QuestionResponse::new(question, answers)
                })
                .collect();

            let submissions = visibility
                .submissions
                .then(|| submissions_by_quiz.remove(&quiz.id).unwrap_or_default());

            QuizResponse::new(quiz, questions, submissions)
        })
        .collect();

    Ok(rendered)
}

async fn render_quiz(
    pool: &PgPool,
    principal: &Principal,
    quiz: Quiz,
) -> Result<QuizResponse, AppError> {
    render_quizzes(pool, principal, vec![quiz])
        .await?
        .pop()
        .ok_or_else(|| AppError::InternalServerError("Rendered quiz went missing".to_string()))
}

/// Lists the quizzes visible to the caller, ordered by name.
///
/// * `?name=` matches the whole name, case-insensitively.
/// * `?search=` matches part of the name, case-insensitively.
pub async fn list_quizzes(
    State(pool): State<PgPool>,
    principal: Principal,
    AppQuery(params): AppQuery<QuizListParams>,
) -> Result<impl IntoResponse, AppError> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(QUIZ_SELECT);
    principal.push_quiz_scope(&mut builder);

    if let Some(name) = non_blank(&params.name) {
        builder.push(" AND LOWER(q.name) = LOWER(");
        builder.push_bind(name.to_string());
        builder.push(")");
    }

    if let Some(search) = non_blank(&params.search) {
        builder.push(" AND q.name ILIKE ");
        builder.push_bind(contains_pattern(search));
    }

    builder.push(" ORDER BY q.name, q.id");

    let quizzes = builder
        .build_query_as::<Quiz>()
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list quizzes: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(Json(render_quizzes(&pool, &principal, quizzes).await?))
}

/// Creates a quiz owned by the caller.
/// Superusers may create a quiz on behalf of another owner via `owner_id`.
pub async fn create_quiz(
    State(pool): State<PgPool>,
    principal: Principal,
    AppJson(payload): AppJson<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    principal.require_owner()?;
    payload.validate()?;

    let owner_id = match (principal.is_superuser, payload.owner_id) {
        (true, Some(owner_id)) => {
            sqlx::query_scalar::<_, i64>("SELECT id FROM owners WHERE id = $1")
                .bind(owner_id)
                .fetch_optional(&pool)
                .await?
                .ok_or_else(|| AppError::BadRequest(format!("Owner {} does not exist", owner_id)))?
        }
        _ => principal.owner_id.ok_or_else(|| {
            AppError::BadRequest("owner_id is required for accounts without an owner profile".to_string())
        })?,
    };

    let quiz = sqlx::query_as::<_, Quiz>(
        r#"
        INSERT INTO quizzes (owner_id, name)
        VALUES ($1, $2)
        RETURNING id, owner_id, name, created_at, updated_at
        "#,
    )
    .bind(owner_id)
    .bind(&payload.name)
    .fetch_one(&pool)
    .await
    .map_err(|e| conflict_on_unique(e, format!("A quiz named '{}' already exists", payload.name)))?;

    tracing::info!("Quiz {} created by owner {}", quiz.id, owner_id);

    Ok((StatusCode::CREATED, Json(render_quiz(&pool, &principal, quiz).await?)))
}

/// Retrieves one quiz with its questions and answers.
pub async fn get_quiz(
    State(pool): State<PgPool>,
    principal: Principal,
    AppPath(quiz_id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = find_visible_quiz(&pool, &principal, quiz_id).await?;
    Ok(Json(render_quiz(&pool, &principal, quiz).await?))
}

async fn rename_quiz(pool: &PgPool, quiz_id: i64, name: &str) -> Result<Quiz, AppError> {
    sqlx::query_as::<_, Quiz>(
        r#"
        UPDATE quizzes
        SET name = $1, updated_at = NOW()
        WHERE id = $2
        RETURNING id, owner_id, name, created_at, updated_at
        "#,
    )
    .bind(name)
    .bind(quiz_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| conflict_on_unique(e, format!("A quiz named '{}' already exists", name)))?
    .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))
}

/// Full update (PUT). Owner of the quiz only.
pub async fn replace_quiz(
    State(pool): State<PgPool>,
    principal: Principal,
    AppPath(quiz_id): AppPath<i64>,
    AppJson(payload): AppJson<ReplaceQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = find_visible_quiz(&pool, &principal, quiz_id).await?;
    principal.require_modify(&quiz)?;
    payload.validate()?;

    let quiz = rename_quiz(&pool, quiz.id, &payload.name).await?;
    Ok(Json(render_quiz(&pool, &principal, quiz).await?))
}

/// Partial update (PATCH). Owner of the quiz only.
pub async fn update_quiz(
    State(pool): State<PgPool>,
    principal: Principal,
    AppPath(quiz_id): AppPath<i64>,
    AppJson(payload): AppJson<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = find_visible_quiz(&pool, &principal, quiz_id).await?;
    principal.require_modify(&quiz)?;
    payload.validate()?;

    let quiz = match payload.name {
        Some(name) => rename_quiz(&pool, quiz.id, &name).await?,
        None => quiz,
    };
    Ok(Json(render_quiz(&pool, &principal, quiz).await?))
}

/// Deletes a quiz together with its questions, answers and submissions.
pub async fn delete_quiz(
    State(pool): State<PgPool>,
    principal: Principal,
    AppPath(quiz_id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = find_visible_quiz(&pool, &principal, quiz_id).await?;
    principal.require_modify(&quiz)?;

    let result = sqlx::query("DELETE FROM quizzes WHERE id = $1")
        .bind(quiz.id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete quiz: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    tracing::info!("Quiz {} deleted by user {}", quiz.id, principal.user_id);

    Ok(StatusCode::NO_CONTENT)
}
