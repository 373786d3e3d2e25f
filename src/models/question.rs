// src/models/question.rs

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::answer::AnswerResponse;

/// Represents the 'quiz_questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: i64,
    pub quiz_id: i64,

    /// The text content of the question (sanitized HTML).
    pub text: String,

    /// Display order within the quiz, unique per quiz.
    pub position: i16,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl fmt::Display for QuizQuestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// A question with its answers, ordered by position.
#[derive(Debug, Serialize)]
pub struct QuestionResponse {
    pub id: i64,
    pub quiz_id: i64,
    pub text: String,
    pub position: i16,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub answers: Vec<AnswerResponse>,
}

impl QuestionResponse {
    pub fn new(question: QuizQuestion, answers: Vec<AnswerResponse>) -> Self {
        Self {
            id: question.id,
            quiz_id: question.quiz_id,
            text: question.text,
            position: question.position,
            created_at: question.created_at,
            updated_at: question.updated_at,
            answers,
        }
    }
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 2000))]
    pub text: String,
    #[validate(range(min = 0, message = "Position must not be negative."))]
    pub position: i16,
}

/// DTO for updating a question. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 2000))]
    pub text: Option<String>,
    #[validate(range(min = 0, message = "Position must not be negative."))]
    pub position: Option<i16>,
}

impl UpdateQuestionRequest {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.position.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_position_rejected() {
        let req = CreateQuestionRequest {
            text: "CH capital city?".to_string(),
            position: -1,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_display_is_text() {
        let question = QuizQuestion {
            id: 1,
            quiz_id: 1,
            text: "Test".to_string(),
            position: 0,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        assert_eq!(question.to_string(), "Test");
    }

    #[test]
    fn test_update_is_empty() {
        let req = UpdateQuestionRequest {
            text: None,
            position: None,
        };
        assert!(req.is_empty());
    }
}
