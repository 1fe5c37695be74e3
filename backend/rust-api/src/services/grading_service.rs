use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::error::{QuizError, QuizResult};
use crate::metrics::track_model_call;
use crate::models::answer_sheet::UserAnswers;
use crate::models::grading::{GradingResult, MAX_SCORE, MIN_SCORE};
use crate::services::gemini_client::LanguageModel;

const INVALID_GRADER_RESPONSE: &str =
    "The AI grader returned an invalid response. Please try again.";

/// Exactly the two fields the grader must return; anything else is ignored.
#[derive(Debug, Deserialize)]
struct GradingPayload {
    score: f64,
    feedback: String,
}

pub fn grading_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "score": {
                "type": "NUMBER",
                "description": "A score between 0 and 100."
            },
            "feedback": {
                "type": "STRING",
                "description": "Constructive feedback in Traditional Chinese."
            }
        },
        "required": ["score", "feedback"]
    })
}

pub fn build_grading_prompt(
    question: &str,
    answer_key: &str,
    answers: &UserAnswers,
) -> QuizResult<String> {
    let answers_json = serde_json::to_string_pretty(answers)
        .map_err(|e| QuizError::validation(format!("Failed to encode answers: {}", e)))?;
    Ok(format!(
        r#"You are an AI English test grader. Your task is to evaluate a student's answers based on the provided answer key.

Here is the original test content:
---
{question}
---

Here is the official answer key and analysis:
---
{answer_key}
---

Here are the student's answers:
---
{answers_json}
---

Please perform the following actions:
1. Compare the student's answers to the official answer key.
2. Calculate a score out of 100. Be strict for multiple choice but allow for some variation in wording for short-answer questions, as long as the core meaning is correct. For cloze and paragraph structure, each correct item is worth an equal portion of 100 points.
3. Provide brief, constructive, and encouraging feedback in Traditional Chinese. Focus on the incorrect answers and explain why they were wrong, referencing the analysis if helpful.
"#
    ))
}

/// Parses the grader's JSON. Scores outside 0..=100 are clamped.
pub fn parse_grading_payload(raw: &str) -> QuizResult<GradingResult> {
    let payload: GradingPayload = serde_json::from_str(raw.trim()).map_err(|e| {
        tracing::warn!("Failed to parse grading response: {}", e);
        QuizError::format(INVALID_GRADER_RESPONSE)
    })?;

    if !payload.score.is_finite() {
        return Err(QuizError::format(INVALID_GRADER_RESPONSE));
    }

    let score = payload.score.clamp(MIN_SCORE, MAX_SCORE);
    if score != payload.score {
        tracing::warn!(
            "Grader returned out-of-range score {}, clamped to {}",
            payload.score,
            score
        );
    }

    Ok(GradingResult {
        score,
        feedback: payload.feedback,
    })
}

pub struct GradingService {
    model: Arc<dyn LanguageModel>,
}

impl GradingService {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub async fn grade(
        &self,
        question: &str,
        answer_key: &str,
        answers: &UserAnswers,
    ) -> QuizResult<GradingResult> {
        tracing::info!("Grading submission with {} answers", answers.len());

        let prompt = build_grading_prompt(question, answer_key, answers)?;
        let schema = grading_schema();
        let raw = track_model_call("grade", self.model.generate_json(&prompt, &schema)).await?;

        parse_grading_payload(&raw)
    }
}
