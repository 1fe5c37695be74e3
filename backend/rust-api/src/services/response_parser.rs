use crate::error::{QuizError, QuizResult};
use crate::models::question::GeneratedContent;

/// Literal line the model puts between the English test and the Chinese key.
pub const ANSWER_SEPARATOR: &str = "@@@答案與解析@@@";

const MALFORMED_RESPONSE: &str = "Invalid response format from AI. The response may be incomplete or missing the required separator.";

/// Splits a raw model response at the first separator. Anything after a
/// second separator stays part of the answer side.
pub fn parse_generated(raw: &str) -> QuizResult<GeneratedContent> {
    let (question, answer) = raw
        .split_once(ANSWER_SEPARATOR)
        .ok_or_else(|| QuizError::format(MALFORMED_RESPONSE))?;

    let question = question.trim();
    let answer = answer.trim();
    if question.is_empty() || answer.is_empty() {
        return Err(QuizError::format(MALFORMED_RESPONSE));
    }

    Ok(GeneratedContent {
        question: question.to_string(),
        answer: answer.to_string(),
    })
}
