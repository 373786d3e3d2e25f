// src/models/submission.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::aggregation::SubmissionCounts;

/// A row of 'quiz_submissions' joined with its quiz, its owner's email and
/// the aggregated answer counts. The invite code is not selected; it only
/// ever leaves the server by mail.
#[derive(Debug, Clone, FromRow)]
pub struct SubmissionRow {
    pub id: i64,
    pub owner_id: i64,
    pub participant_id: i64,
    pub quiz_id: i64,
    pub quiz_name: String,
    pub owner_email: String,
    pub accepted_on: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    #[sqlx(flatten)]
    pub counts: SubmissionCounts,
}

/// Represents the 'quiz_user_answers' table: one answer picked by a
/// participant within a submission.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizUserAnswer {
    pub id: i64,
    pub submission_id: i64,
    pub question_id: i64,
    pub answer_id: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// A submission as returned by the API.
#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    pub id: i64,
    pub owner_id: i64,
    pub participant_id: i64,
    pub quiz_id: i64,
    pub quiz_name: String,
    pub owner_email: String,
    pub accepted_on: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub answers_all_count: i64,
    pub answers_correct_count: i64,
    /// "correct / answered"
    pub score: String,
    /// "answered / questions in quiz"
    pub progress: String,
    pub answers: Vec<QuizUserAnswer>,
}

impl SubmissionResponse {
    pub fn new(row: SubmissionRow, answers: Vec<QuizUserAnswer>) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            participant_id: row.participant_id,
            quiz_id: row.quiz_id,
            quiz_name: row.quiz_name,
            owner_email: row.owner_email,
            accepted_on: row.accepted_on,
            created_at: row.created_at,
            updated_at: row.updated_at,
            answers_all_count: row.counts.answers_all_count,
            answers_correct_count: row.counts.answers_correct_count,
            score: row.counts.score(),
            progress: row.counts.progress(),
            answers,
        }
    }
}

/// Query parameters for listing a participant's submissions.
#[derive(Debug, Default, Deserialize)]
pub struct SubmissionListParams {
    /// Case-insensitive exact match on the quiz name.
    pub quiz_name: Option<String>,

    /// Case-insensitive exact match on the quiz owner's email.
    pub owner_email: Option<String>,

    /// Case-insensitive substring match on quiz name or owner email.
    pub search: Option<String>,
}

/// DTO for inviting a participant to a quiz.
#[derive(Debug, Deserialize, Validate)]
pub struct InviteRequest {
    #[validate(length(min = 1, max = 64))]
    pub first_name: String,
    #[validate(length(min = 1, max = 64))]
    pub last_name: String,
    #[validate(email(message = "A valid email address is required."))]
    pub email: String,
}

/// DTO for accepting an invite. The password is required only when the
/// participant's account does not have one yet.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct AcceptInviteRequest {
    #[validate(length(
        min = 8,
        max = 128,
        message = "Password length must be between 8 and 128 characters."
    ))]
    pub password: Option<String>,
}

/// DTO for recording a participant's answer.
#[derive(Debug, Deserialize)]
pub struct CreateUserAnswerRequest {
    /// The chosen answer.
    pub answer: i64,

    /// Optional; when given it must be the chosen answer's question.
    pub question: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(all: i64, correct: i64, questions: i64) -> SubmissionRow {
        SubmissionRow {
            id: 1,
            owner_id: 1,
            participant_id: 2,
            quiz_id: 3,
            quiz_name: "Geography".to_string(),
            owner_email: "owner1@quiz.com".to_string(),
            accepted_on: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            counts: SubmissionCounts {
                answers_all_count: all,
                answers_correct_count: correct,
                questions_count: questions,
            },
        }
    }

    #[test]
    fn test_response_renders_score_and_progress() {
        let value = serde_json::to_value(SubmissionResponse::new(row(1, 0, 2), vec![])).unwrap();
        assert_eq!(value["score"], "0 / 1");
        assert_eq!(value["progress"], "1 / 2");
        assert_eq!(value["answers_all_count"], 1);
        assert!(value.get("uuid").is_none());
    }

    #[test]
    fn test_invite_requires_names() {
        let req = InviteRequest {
            first_name: String::new(),
            last_name: "Doe".to_string(),
            email: "john.doe@test.com".to_string(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_accept_without_password_is_valid() {
        let req: AcceptInviteRequest = serde_json::from_str("{}").unwrap();
        assert!(req.validate().is_ok());

        let short = AcceptInviteRequest {
            password: Some("abc".to_string()),
        };
        assert!(short.validate().is_err());
    }
}
