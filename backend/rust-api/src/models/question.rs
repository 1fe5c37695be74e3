use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::QuizError;

/// GSAT English test formats the generator knows how to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Cloze,
    ParagraphStructure,
    ReadingComprehension,
    Mixed,
}

impl QuestionType {
    pub const ALL: [QuestionType; 4] = [
        QuestionType::Cloze,
        QuestionType::ParagraphStructure,
        QuestionType::ReadingComprehension,
        QuestionType::Mixed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Cloze => "cloze",
            QuestionType::ParagraphStructure => "paragraph_structure",
            QuestionType::ReadingComprehension => "reading_comprehension",
            QuestionType::Mixed => "mixed",
        }
    }

    /// Name used on the exam paper itself.
    pub fn label(&self) -> &'static str {
        match self {
            QuestionType::Cloze => "文意選填",
            QuestionType::ParagraphStructure => "篇章結構",
            QuestionType::ReadingComprehension => "閱讀測驗",
            QuestionType::Mixed => "混合題型",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = QuizError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        QuestionType::ALL
            .into_iter()
            .find(|qt| qt.as_str().eq_ignore_ascii_case(trimmed) || qt.label() == trimmed)
            .ok_or_else(|| QuizError::validation(format!("Unsupported question type: {}", value)))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionTypeInfo {
    pub id: QuestionType,
    pub label: &'static str,
}

impl From<QuestionType> for QuestionTypeInfo {
    fn from(question_type: QuestionType) -> Self {
        Self {
            id: question_type,
            label: question_type.label(),
        }
    }
}

/// One generated test: English content and the Chinese answer key/analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub question: String,
    pub answer: String,
}

/// A run of question text, flagged when it is a blank marker like `(3)` or a
/// line-leading question number like `2.`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionSegment {
    pub text: String,
    pub highlight: bool,
}

lazy_static! {
    static ref MARKER_RE: Regex = Regex::new(r"(?m)\(\d+\)|^\d+\.").unwrap();
}

pub fn highlight_segments(text: &str) -> Vec<QuestionSegment> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    for marker in MARKER_RE.find_iter(text) {
        if marker.start() > cursor {
            segments.push(QuestionSegment {
                text: text[cursor..marker.start()].to_string(),
                highlight: false,
            });
        }
        segments.push(QuestionSegment {
            text: marker.as_str().to_string(),
            highlight: true,
        });
        cursor = marker.end();
    }

    if cursor < text.len() {
        segments.push(QuestionSegment {
            text: text[cursor..].to_string(),
            highlight: false,
        });
    }

    segments
}
