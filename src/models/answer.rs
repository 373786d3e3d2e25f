// src/models/answer.rs

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'quiz_question_answers' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizQuestionAnswer {
    pub id: i64,
    pub question_id: i64,
    pub text: String,
    pub position: i16,

    /// At most one answer per question may be correct.
    pub is_correct: bool,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl fmt::Display for QuizQuestionAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// An answer as shown to a caller. `is_correct` is left out entirely unless
/// the caller may see the answer key.
#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub id: i64,
    pub question_id: i64,
    pub text: String,
    pub position: i16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl AnswerResponse {
    pub fn render(answer: QuizQuestionAnswer, show_answer_key: bool) -> Self {
        Self {
            id: answer.id,
            question_id: answer.question_id,
            text: answer.text,
            position: answer.position,
            is_correct: show_answer_key.then_some(answer.is_correct),
            created_at: answer.created_at,
            updated_at: answer.updated_at,
        }
    }
}

/// DTO for creating a new answer.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateAnswerRequest {
    #[validate(length(min = 1, max = 1000))]
    pub text: String,
    #[validate(range(min = 0, message = "Position must not be negative."))]
    pub position: i16,
    #[serde(default)]
    pub is_correct: bool,
}

/// DTO for updating an answer. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAnswerRequest {
    #[validate(length(min = 1, max = 1000))]
    pub text: Option<String>,
    #[validate(range(min = 0, message = "Position must not be negative."))]
    pub position: Option<i16>,
    pub is_correct: Option<bool>,
}

impl UpdateAnswerRequest {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.position.is_none() && self.is_correct.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(is_correct: bool) -> QuizQuestionAnswer {
        QuizQuestionAnswer {
            id: 10,
            question_id: 2,
            text: "Bern".to_string(),
            position: 1,
            is_correct,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_answer_key_hidden() {
        let value = serde_json::to_value(AnswerResponse::render(answer(true), false)).unwrap();
        assert!(value.get("is_correct").is_none());
        assert_eq!(value["text"], "Bern");
    }

    #[test]
    fn test_answer_key_shown() {
        let value = serde_json::to_value(AnswerResponse::render(answer(false), true)).unwrap();
        assert_eq!(value["is_correct"], false);
    }

    #[test]
    fn test_is_correct_defaults_to_false() {
        let req: CreateAnswerRequest =
            serde_json::from_str(r#"{"text": "Zurich", "position": 1}"#).unwrap();
        assert!(!req.is_correct);
    }
}
