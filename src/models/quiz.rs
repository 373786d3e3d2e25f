// src/models/quiz.rs

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::{question::QuestionResponse, submission::SubmissionResponse};

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl fmt::Display for Quiz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A quiz as returned by the API, with its questions (and answers) nested.
///
/// `submissions` is only present for the quiz's owner and superusers.
#[derive(Debug, Serialize)]
pub struct QuizResponse {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub questions: Vec<QuestionResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submissions: Option<Vec<SubmissionResponse>>,
}

impl QuizResponse {
    pub fn new(
        quiz: Quiz,
        questions: Vec<QuestionResponse>,
        submissions: Option<Vec<SubmissionResponse>>,
    ) -> Self {
        Self {
            id: quiz.id,
            owner_id: quiz.owner_id,
            name: quiz.name,
            created_at: quiz.created_at,
            updated_at: quiz.updated_at,
            questions,
            submissions,
        }
    }
}

/// DTO for creating a quiz.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(
        min = 1,
        max = 32,
        message = "Name length must be between 1 and 32 characters."
    ))]
    pub name: String,

    /// Only honored for superusers; owners always create quizzes for themselves.
    pub owner_id: Option<i64>,
}

/// DTO for a full update (PUT).
#[derive(Debug, Deserialize, Validate)]
pub struct ReplaceQuizRequest {
    #[validate(length(
        min = 1,
        max = 32,
        message = "Name length must be between 1 and 32 characters."
    ))]
    pub name: String,
}

/// DTO for a partial update (PATCH). Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(
        min = 1,
        max = 32,
        message = "Name length must be between 1 and 32 characters."
    ))]
    pub name: Option<String>,
}

/// Query parameters for listing quizzes.
#[derive(Debug, Default, Deserialize)]
pub struct QuizListParams {
    /// Case-insensitive exact match on the name.
    pub name: Option<String>,

    /// Case-insensitive substring match on the name.
    pub search: Option<String>,
}
