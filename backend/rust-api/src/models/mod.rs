use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::{ErrorKind, QuizError};
use answer_sheet::{AnswerField, SheetState, UserAnswers};
use grading::ScoreBand;
use question::{QuestionSegment, QuestionTypeInfo};

pub const MAX_ANSWER_LENGTH: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Generating,
    Answering,
    Grading,
    Graded,
}

/// Read-only projection of a quiz session, shaped for the browser client.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub selected_type: Option<QuestionTypeInfo>,
    pub status: SessionStatus,
    pub question: Option<QuestionView>,
    pub answer_sheet: Option<AnswerSheetView>,
    pub result: Option<GradingResultView>,
    /// Only present once the submission has been graded.
    pub answer_key: Option<String>,
    pub elapsed_seconds: u64,
    pub elapsed_display: String,
    pub error: Option<SessionErrorView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub question_type: QuestionTypeInfo,
    pub text: String,
    pub segments: Vec<QuestionSegment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerSheetView {
    pub state: SheetState,
    pub locked: bool,
    pub fields: Vec<AnswerField>,
    pub answers: UserAnswers,
}

#[derive(Debug, Clone, Serialize)]
pub struct GradingResultView {
    pub score: f64,
    pub max_score: f64,
    pub band: ScoreBand,
    pub feedback: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionErrorView {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CreateSessionRequest {
    #[validate(length(min = 1, max = 64))]
    pub question_type: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SelectTypeRequest {
    #[validate(length(min = 1, max = 64))]
    pub question_type: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetAnswerRequest {
    #[validate(length(max = 2000, message = "Answer is too long"))]
    pub value: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct SubmitAnswersRequest {
    /// Applied on top of the answers already on the sheet before grading.
    #[serde(default)]
    #[validate(custom(function = "validate_answer_map"))]
    pub answers: UserAnswers,
}

fn validate_answer_map(answers: &UserAnswers) -> Result<(), ValidationError> {
    if answers
        .values()
        .any(|value| value.chars().count() > MAX_ANSWER_LENGTH)
    {
        return Err(ValidationError::new("answer_too_long"));
    }
    Ok(())
}

impl From<validator::ValidationErrors> for QuizError {
    fn from(errors: validator::ValidationErrors) -> Self {
        QuizError::validation(format!("Validation error: {}", errors))
    }
}

pub mod answer_sheet;
pub mod grading;
pub mod question;
pub mod timer;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_request_rejects_oversized_answer() {
        let mut answers = UserAnswers::new();
        answers.insert("1".to_string(), "x".repeat(MAX_ANSWER_LENGTH + 1));
        let req = SubmitAnswersRequest { answers };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_submit_request_defaults_to_no_answers() {
        let req: SubmitAnswersRequest = serde_json::from_str("{}").unwrap();
        assert!(req.answers.is_empty());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_validation_errors_map_to_validation_kind() {
        let req = SetAnswerRequest {
            value: "y".repeat(MAX_ANSWER_LENGTH + 1),
        };
        let err: QuizError = req.validate().unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
