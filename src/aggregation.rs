// src/aggregation.rs

//! Per-submission answer counts and the queries that compute them.

use std::collections::HashMap;

use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use crate::{
    error::AppError,
    models::submission::{QuizUserAnswer, SubmissionListParams, SubmissionResponse, SubmissionRow},
    utils::search::{contains_pattern, non_blank},
};

/// Answer counts of one submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow, Serialize)]
pub struct SubmissionCounts {
    /// Distinct answers recorded so far.
    pub answers_all_count: i64,
    /// How many of those are flagged correct.
    pub answers_correct_count: i64,
    /// Questions in the submission's quiz.
    pub questions_count: i64,
}

impl SubmissionCounts {
    pub fn score(&self) -> String {
        format!("{} / {}", self.answers_correct_count, self.answers_all_count)
    }

    pub fn progress(&self) -> String {
        format!("{} / {}", self.answers_all_count, self.questions_count)
    }
}

/// Both LATERAL subqueries are plain aggregates, so they yield exactly one
/// row (zeros included) for every submission.
const SUBMISSION_SELECT: &str = r#"
    SELECT
        s.id, s.owner_id, s.participant_id, s.quiz_id,
        q.name AS quiz_name,
        ou.email AS owner_email,
        s.accepted_on, s.created_at, s.updated_at,
        counts.answers_all_count,
        counts.answers_correct_count,
        questions.questions_count
    FROM quiz_submissions s
    JOIN quizzes q ON q.id = s.quiz_id
    JOIN owners o ON o.id = s.owner_id
    JOIN users ou ON ou.id = o.user_id
    CROSS JOIN LATERAL (
        SELECT
            COUNT(DISTINCT ua.id) AS answers_all_count,
            COUNT(DISTINCT ua.id) FILTER (WHERE a.is_correct) AS answers_correct_count
        FROM quiz_user_answers ua
        JOIN quiz_question_answers a ON a.id = ua.answer_id
        WHERE ua.submission_id = s.id
    ) counts
    CROSS JOIN LATERAL (
        SELECT COUNT(*) AS questions_count
        FROM quiz_questions qq
        WHERE qq.quiz_id = s.quiz_id
    ) questions
    WHERE TRUE
"#;

/// Which submissions to load.
#[derive(Debug, Default)]
pub struct SubmissionFilter<'a> {
    pub quiz_ids: Option<&'a [i64]>,
    pub quiz_id: Option<i64>,
    pub participant_id: Option<i64>,
    pub params: Option<&'a SubmissionListParams>,
}

/// Loads annotated submissions, ordered by id.
pub async fn fetch_submissions(
    pool: &PgPool,
    filter: &SubmissionFilter<'_>,
) -> Result<Vec<SubmissionRow>, AppError> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(SUBMISSION_SELECT);

    if let Some(quiz_ids) = filter.quiz_ids {
        builder.push(" AND s.quiz_id = ANY(");
        builder.push_bind(quiz_ids.to_vec());
        builder.push(")");
    }

    if let Some(quiz_id) = filter.quiz_id {
        builder.push(" AND s.quiz_id = ");
        builder.push_bind(quiz_id);
    }

    if let Some(participant_id) = filter.participant_id {
        builder.push(" AND s.participant_id = ");
        builder.push_bind(participant_id);
    }

    if let Some(params) = filter.params {
        if let Some(quiz_name) = non_blank(&params.quiz_name) {
            builder.push(" AND LOWER(q.name) = LOWER(");
            builder.push_bind(quiz_name.to_string());
            builder.push(")");
        }

        if let Some(owner_email) = non_blank(&params.owner_email) {
            builder.push(" AND LOWER(ou.email) = LOWER(");
            builder.push_bind(owner_email.to_string());
            builder.push(")");
        }

        if let Some(search) = non_blank(&params.search) {
            let pattern = contains_pattern(search);
            builder.push(" AND (q.name ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR ou.email ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }
    }

    builder.push(" ORDER BY s.id");

    let rows = builder
        .build_query_as::<SubmissionRow>()
        .fetch_all(pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch submissions: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(rows)
}

/// Loads the recorded answers of the given submissions, grouped by submission.
pub async fn fetch_user_answers(
    pool: &PgPool,
    submission_ids: &[i64],
) -> Result<HashMap<i64, Vec<QuizUserAnswer>>, AppError> {
    if submission_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let answers = sqlx::query_as::<_, QuizUserAnswer>(
        r#"
        SELECT id, submission_id, question_id, answer_id, created_at, updated_at
        FROM quiz_user_answers
        WHERE submission_id = ANY($1)
        ORDER BY id
        "#,
    )
    .bind(submission_ids)
    .fetch_all(pool)
    .await?;

    let mut grouped: HashMap<i64, Vec<QuizUserAnswer>> = HashMap::new();
    for answer in answers {
        grouped.entry(answer.submission_id).or_default().push(answer);
    }
    Ok(grouped)
}

/// Loads submissions together with their recorded answers.
pub async fn load_submissions(
    pool: &PgPool,
    filter: &SubmissionFilter<'_>,
) -> Result<Vec<SubmissionResponse>, AppError> {
    let rows = fetch_submissions(pool, filter).await?;
    let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
    let mut answers = fetch_user_answers(pool, &ids).await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let recorded = answers.remove(&row.id).unwrap_or_default();
            SubmissionResponse::new(row, recorded)
        })
        .collect())
}
