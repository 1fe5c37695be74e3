use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{QuizError, QuizResult};
use crate::models::question::QuestionType;

/// Question number (as a string) mapped to the value the student entered.
pub type UserAnswers = BTreeMap<String, String>;

pub const CLOZE_BLANKS: usize = 10;
pub const CLOZE_OPTIONS: [&str; 12] = ["A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L"];
pub const PARAGRAPH_SLOTS: usize = 4;
pub const READING_OPTIONS: [&str; 4] = ["A", "B", "C", "D"];
pub const READING_FALLBACK_QUESTIONS: usize = 3;
pub const MIXED_FALLBACK_QUESTIONS: usize = 5;

lazy_static! {
    static ref NUMBERED_LINE_RE: Regex = Regex::new(r"(?m)^[ \t]*(\d+)\.").unwrap();
    static ref NUMBERED_QUESTION_RE: Regex = Regex::new(r"(?m)^[ \t]*(\d+)\.\s").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnswerControl {
    /// Single-select dropdown.
    Select { options: Vec<String> },
    /// One radio button per option.
    Radio { options: Vec<String> },
    /// One-character text box, uppercased on entry.
    Letter { max_length: usize },
    FreeText,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerField {
    pub key: String,
    pub control: AnswerControl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetState {
    Empty,
    Editing,
    Submitted,
}

/// Input controls for one generated test plus the answers entered so far.
#[derive(Debug, Clone)]
pub struct AnswerSheet {
    fields: Vec<AnswerField>,
    answers: UserAnswers,
    state: SheetState,
}

impl AnswerSheet {
    pub fn new(question_type: QuestionType, question_text: &str) -> Self {
        Self {
            fields: layout_for(question_type, question_text),
            answers: UserAnswers::new(),
            state: SheetState::Empty,
        }
    }

    pub fn fields(&self) -> &[AnswerField] {
        &self.fields
    }

    pub fn answers(&self) -> &UserAnswers {
        &self.answers
    }

    pub fn state(&self) -> SheetState {
        self.state
    }

    pub fn is_locked(&self) -> bool {
        self.state == SheetState::Submitted
    }

    /// Updates one key. An empty value clears the key.
    pub fn set_answer(&mut self, key: &str, value: &str) -> QuizResult<()> {
        if self.is_locked() {
            return Err(QuizError::validation(
                "Answers are locked once they have been submitted",
            ));
        }

        let field = self
            .fields
            .iter()
            .find(|field| field.key == key)
            .ok_or_else(|| QuizError::validation(format!("Unknown answer key: {}", key)))?;

        match normalize_value(&field.control, value)? {
            Some(normalized) => {
                self.answers.insert(key.to_string(), normalized);
            }
            None => {
                self.answers.remove(key);
            }
        }

        self.state = if self.answers.is_empty() {
            SheetState::Empty
        } else {
            SheetState::Editing
        };
        Ok(())
    }

    /// Locks the sheet and hands out the answers to grade.
    pub fn lock(&mut self) -> UserAnswers {
        self.state = SheetState::Submitted;
        self.answers.clone()
    }

    /// Unlocks after a failed grading attempt so the student can resubmit.
    pub fn reopen(&mut self) {
        self.state = if self.answers.is_empty() {
            SheetState::Empty
        } else {
            SheetState::Editing
        };
    }
}

fn normalize_value(control: &AnswerControl, value: &str) -> QuizResult<Option<String>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    match control {
        AnswerControl::Select { options } | AnswerControl::Radio { options } => {
            let upper = trimmed.to_uppercase();
            if options.iter().any(|option| *option == upper) {
                Ok(Some(upper))
            } else {
                Err(QuizError::validation(format!(
                    "Answer must be one of {}",
                    options.join(", ")
                )))
            }
        }
        AnswerControl::Letter { max_length } => {
            let upper = trimmed.to_uppercase();
            if upper.chars().count() > *max_length {
                return Err(QuizError::validation(format!(
                    "Answer must be at most {} character(s)",
                    max_length
                )));
            }
            Ok(Some(upper))
        }
        AnswerControl::FreeText => Ok(Some(value.to_string())),
    }
}

/// Builds the answer-sheet layout for a question type. Question counts for
/// reading comprehension and mixed tests are read from the generated text,
/// which is a best-effort heuristic with fixed fallbacks.
pub fn layout_for(question_type: QuestionType, question_text: &str) -> Vec<AnswerField> {
    match question_type {
        QuestionType::Cloze => numbered_fields(
            CLOZE_BLANKS,
            AnswerControl::Select {
                options: option_labels(&CLOZE_OPTIONS),
            },
        ),
        QuestionType::ParagraphStructure => {
            numbered_fields(PARAGRAPH_SLOTS, AnswerControl::Letter { max_length: 1 })
        }
        QuestionType::ReadingComprehension => {
            let control = AnswerControl::Radio {
                options: option_labels(&READING_OPTIONS),
            };
            let numbers = detect_question_numbers(question_text);
            if numbers.is_empty() {
                tracing::warn!(
                    "No numbered questions detected in reading test, using {} fields",
                    READING_FALLBACK_QUESTIONS
                );
                return numbered_fields(READING_FALLBACK_QUESTIONS, control);
            }
            numbers
                .into_iter()
                .map(|key| AnswerField {
                    key,
                    control: control.clone(),
                })
                .collect()
        }
        QuestionType::Mixed => {
            let count = match count_numbered_lines(question_text) {
                0 => MIXED_FALLBACK_QUESTIONS,
                n => n,
            };
            numbered_fields(count, AnswerControl::FreeText)
        }
    }
}

/// Question numbers of lines shaped like `2. Which ...`, deduplicated, in order.
pub fn detect_question_numbers(text: &str) -> Vec<String> {
    let mut numbers: Vec<String> = Vec::new();
    for captures in NUMBERED_QUESTION_RE.captures_iter(text) {
        let number = captures[1].to_string();
        if !numbers.contains(&number) {
            numbers.push(number);
        }
    }
    numbers
}

pub fn count_numbered_lines(text: &str) -> usize {
    NUMBERED_LINE_RE.find_iter(text).count()
}

fn numbered_fields(count: usize, control: AnswerControl) -> Vec<AnswerField> {
    (1..=count)
        .map(|n| AnswerField {
            key: n.to_string(),
            control: control.clone(),
        })
        .collect()
}

fn option_labels(options: &[&str]) -> Vec<String> {
    options.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const READING_TEXT: &str = "Article body.\n\n1. What is the tone?\n(A) calm (B) angry\n2. Why did she leave?\n(A) x (B) y\n3. What can be inferred?\n(A) x (B) y";

    #[test]
    fn test_cloze_has_ten_dropdowns_with_twelve_letters() {
        let sheet = AnswerSheet::new(QuestionType::Cloze, "anything");
        let keys: Vec<&str> = sheet.fields().iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["1", "2", "3", "4", "5", "6", "7", "8", "9", "10"]);
        for field in sheet.fields() {
            match &field.control {
                AnswerControl::Select { options } => assert_eq!(options.len(), 12),
                other => panic!("unexpected control {:?}", other),
            }
        }
    }

    #[test]
    fn test_cloze_set_answer_only_touches_one_key() {
        let mut sheet = AnswerSheet::new(QuestionType::Cloze, "");
        sheet.set_answer("1", "A").unwrap();
        sheet.set_answer("7", "L").unwrap();
        sheet.set_answer("3", "B").unwrap();

        assert_eq!(sheet.answers().len(), 3);
        assert_eq!(sheet.answers()["1"], "A");
        assert_eq!(sheet.answers()["3"], "B");
        assert_eq!(sheet.answers()["7"], "L");
        assert_eq!(sheet.state(), SheetState::Editing);
    }

    #[test]
    fn test_cloze_rejects_letters_outside_pool_and_unknown_keys() {
        let mut sheet = AnswerSheet::new(QuestionType::Cloze, "");
        assert!(sheet.set_answer("1", "M").is_err());
        assert!(sheet.set_answer("11", "A").is_err());
        assert_eq!(sheet.state(), SheetState::Empty);
    }

    #[test]
    fn test_clearing_last_answer_returns_to_empty() {
        let mut sheet = AnswerSheet::new(QuestionType::Cloze, "");
        sheet.set_answer("2", "c").unwrap();
        assert_eq!(sheet.answers()["2"], "C");
        sheet.set_answer("2", "").unwrap();
        assert!(sheet.answers().is_empty());
        assert_eq!(sheet.state(), SheetState::Empty);
    }

    #[test]
    fn test_reading_fields_follow_detected_numbers() {
        let sheet = AnswerSheet::new(QuestionType::ReadingComprehension, READING_TEXT);
        let keys: Vec<&str> = sheet.fields().iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["1", "2", "3"]);
        assert!(matches!(
            &sheet.fields()[0].control,
            AnswerControl::Radio { options } if options.len() == 4
        ));
    }

    #[test]
    fn test_reading_without_numbers_falls_back_to_three() {
        let sheet = AnswerSheet::new(QuestionType::ReadingComprehension, "No numbering here");
        assert_eq!(sheet.fields().len(), READING_FALLBACK_QUESTIONS);
    }

    #[test]
    fn test_paragraph_letters_are_uppercased() {
        let mut sheet = AnswerSheet::new(QuestionType::ParagraphStructure, "");
        assert_eq!(sheet.fields().len(), 4);
        sheet.set_answer("4", "e").unwrap();
        assert_eq!(sheet.answers()["4"], "E");
        assert!(sheet.set_answer("1", "AB").is_err());
    }

    #[test]
    fn test_mixed_counts_numbered_lines() {
        let text = "Story.\n1. Summarize.\n2. Choose (A) or (B).\n3. Fill in the blank.";
        let sheet = AnswerSheet::new(QuestionType::Mixed, text);
        assert_eq!(sheet.fields().len(), 3);
        assert!(sheet
            .fields()
            .iter()
            .all(|f| f.control == AnswerControl::FreeText));
    }

    #[test]
    fn test_mixed_defaults_to_five_fields() {
        let sheet = AnswerSheet::new(QuestionType::Mixed, "Nothing numbered.");
        let keys: Vec<&str> = sheet.fields().iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn test_mixed_free_text_is_kept_verbatim() {
        let mut sheet = AnswerSheet::new(QuestionType::Mixed, "");
        sheet.set_answer("1", "  The author disagrees. ").unwrap();
        assert_eq!(sheet.answers()["1"], "  The author disagrees. ");
    }

    #[test]
    fn test_locked_sheet_rejects_edits_until_reopened() {
        let mut sheet = AnswerSheet::new(QuestionType::Cloze, "");
        sheet.set_answer("1", "A").unwrap();
        let submitted = sheet.lock();
        assert_eq!(submitted.len(), 1);
        assert!(sheet.set_answer("2", "B").is_err());

        sheet.reopen();
        assert_eq!(sheet.state(), SheetState::Editing);
        sheet.set_answer("2", "B").unwrap();
    }
}
