use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::{QuizError, QuizResult};
use crate::models::answer_sheet::{AnswerSheet, UserAnswers};
use crate::models::grading::{GradingResult, MAX_SCORE};
use crate::models::question::{highlight_segments, GeneratedContent, QuestionType, QuestionTypeInfo};
use crate::models::{
    AnswerSheetView, GradingResultView, QuestionView, SessionErrorView, SessionStatus, SessionView,
};
use crate::services::elapsed_timer::{format_elapsed, ElapsedTimer};

/// Issued when a generation starts; the result is only applied while the
/// session is still on the same epoch.
#[derive(Debug, Clone)]
pub struct GenerationTicket {
    pub epoch: u64,
    pub question_type: QuestionType,
}

/// Everything the grader needs, captured at submission time.
#[derive(Debug, Clone)]
pub struct GradingTicket {
    pub epoch: u64,
    pub question: String,
    pub answer_key: String,
    pub answers: UserAnswers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Generation,
    Grading,
}

#[derive(Debug)]
struct ActiveQuestion {
    question_type: QuestionType,
    content: GeneratedContent,
    sheet: AnswerSheet,
    result: Option<GradingResult>,
    timer: ElapsedTimer,
}

/// State of one browser session: the selected test format, the active
/// question, the answer sheet, the grading result and the elapsed counter.
#[derive(Debug)]
pub struct QuizSession {
    id: String,
    selected_type: Option<QuestionType>,
    epoch: u64,
    pending: Option<Pending>,
    active: Option<ActiveQuestion>,
    error: Option<QuizError>,
    tick: Duration,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl QuizSession {
    pub fn new(id: String, tick: Duration) -> Self {
        let now = Utc::now();
        Self {
            id,
            selected_type: None,
            epoch: 0,
            pending: None,
            active: None,
            error: None,
            tick,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn selected_type(&self) -> Option<QuestionType> {
        self.selected_type
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn has_content(&self) -> bool {
        self.active.is_some()
    }

    pub fn status(&self) -> SessionStatus {
        match (self.pending, &self.active) {
            (Some(Pending::Generation), _) => SessionStatus::Generating,
            (Some(Pending::Grading), _) => SessionStatus::Grading,
            (None, Some(active)) if active.result.is_some() => SessionStatus::Graded,
            (None, Some(_)) => SessionStatus::Answering,
            (None, None) => SessionStatus::Idle,
        }
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.active
            .as_ref()
            .map(|active| active.timer.elapsed_seconds())
            .unwrap_or(0)
    }

    pub fn timer_running(&self) -> bool {
        self.active
            .as_ref()
            .map(|active| active.timer.is_running())
            .unwrap_or(false)
    }

    /// Chooses the test format. Any active question, result, answers,
    /// error and timer are discarded together, and in-flight requests
    /// become stale.
    pub fn select_type(&mut self, question_type: QuestionType) {
        self.selected_type = Some(question_type);
        if self.active.is_some() || self.pending.is_some() {
            self.reset();
        }
        self.touch();
    }

    /// Clears the question cycle but keeps the selected type.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.pending = None;
        // Dropping the active question aborts its timer task.
        self.active = None;
        self.error = None;
        self.touch();
    }

    pub fn begin_generation(&mut self) -> QuizResult<GenerationTicket> {
        let question_type = self
            .selected_type
            .ok_or_else(|| QuizError::validation("Please select a question type first."))?;

        self.reset();
        self.pending = Some(Pending::Generation);

        Ok(GenerationTicket {
            epoch: self.epoch,
            question_type,
        })
    }

    /// Returns `false` when the ticket is stale and the outcome was dropped.
    pub fn complete_generation(
        &mut self,
        ticket: &GenerationTicket,
        outcome: QuizResult<GeneratedContent>,
    ) -> bool {
        if !self.is_current(ticket.epoch, Pending::Generation) {
            tracing::debug!(
                "Discarding stale generation result for session={} (epoch {} != {})",
                self.id,
                ticket.epoch,
                self.epoch
            );
            return false;
        }

        self.pending = None;
        match outcome {
            Ok(content) => {
                let sheet = AnswerSheet::new(ticket.question_type, &content.question);
                self.active = Some(ActiveQuestion {
                    question_type: ticket.question_type,
                    content,
                    sheet,
                    result: None,
                    timer: ElapsedTimer::start(self.tick),
                });
                self.error = None;
            }
            Err(err) => {
                self.error = Some(err);
            }
        }
        self.touch();
        true
    }

    pub fn set_answer(&mut self, key: &str, value: &str) -> QuizResult<()> {
        let active = self
            .active
            .as_mut()
            .ok_or_else(|| QuizError::validation("There is no active question to answer"))?;
        active.sheet.set_answer(key, value)?;
        self.touch();
        Ok(())
    }

    /// Applies a batch of answers on a copy of the sheet; the sheet only
    /// changes if every entry is accepted.
    pub fn apply_answers(&mut self, answers: &UserAnswers) -> QuizResult<()> {
        if answers.is_empty() {
            return Ok(());
        }
        let active = self
            .active
            .as_mut()
            .ok_or_else(|| QuizError::validation("There is no active question to answer"))?;

        let mut sheet = active.sheet.clone();
        for (key, value) in answers {
            sheet.set_answer(key, value)?;
        }
        active.sheet = sheet;
        self.touch();
        Ok(())
    }

    /// Locks the answer sheet and hands out what needs grading. `Ok(None)`
    /// means there is no active question, which makes submission a no-op.
    pub fn begin_submission(&mut self) -> QuizResult<Option<GradingTicket>> {
        let Some(active) = self.active.as_mut() else {
            return Ok(None);
        };

        if self.pending == Some(Pending::Grading) {
            return Err(QuizError::validation("Answers are already being graded"));
        }
        if active.result.is_some() {
            return Err(QuizError::validation("Answers have already been graded"));
        }

        let answers = active.sheet.lock();
        let ticket = GradingTicket {
            epoch: self.epoch,
            question: active.content.question.clone(),
            answer_key: active.content.answer.clone(),
            answers,
        };

        self.pending = Some(Pending::Grading);
        self.error = None;
        self.touch();
        Ok(Some(ticket))
    }

    /// Returns `false` when the ticket is stale and the outcome was dropped.
    pub fn complete_grading(
        &mut self,
        ticket: &GradingTicket,
        outcome: QuizResult<GradingResult>,
    ) -> bool {
        if !self.is_current(ticket.epoch, Pending::Grading) {
            tracing::debug!(
                "Discarding stale grading result for session={}",
                self.id
            );
            return false;
        }
        let Some(active) = self.active.as_mut() else {
            return false;
        };

        self.pending = None;
        match outcome {
            Ok(result) => {
                let elapsed = active.timer.stop();
                tracing::info!(
                    "Session {} graded: score={} elapsed={}s",
                    self.id,
                    result.score,
                    elapsed
                );
                active.result = Some(result);
            }
            Err(err) => {
                active.sheet.reopen();
                self.error = Some(err);
            }
        }
        self.touch();
        true
    }

    pub fn view(&self) -> SessionView {
        let elapsed_seconds = self.elapsed_seconds();
        let active = self.active.as_ref();

        SessionView {
            session_id: self.id.clone(),
            selected_type: self.selected_type.map(QuestionTypeInfo::from),
            status: self.status(),
            question: active.map(|active| QuestionView {
                question_type: active.question_type.into(),
                text: active.content.question.clone(),
                segments: highlight_segments(&active.content.question),
            }),
            answer_sheet: active.map(|active| AnswerSheetView {
                state: active.sheet.state(),
                locked: active.sheet.is_locked(),
                fields: active.sheet.fields().to_vec(),
                answers: active.sheet.answers().clone(),
            }),
            result: active
                .and_then(|active| active.result.as_ref())
                .map(|result| GradingResultView {
                    score: result.score,
                    max_score: MAX_SCORE,
                    band: result.band(),
                    feedback: result.feedback.clone(),
                }),
            answer_key: active
                .filter(|active| active.result.is_some())
                .map(|active| active.content.answer.clone()),
            elapsed_seconds,
            elapsed_display: format_elapsed(elapsed_seconds),
            error: self.error.as_ref().map(|err| SessionErrorView {
                kind: err.kind(),
                message: self.error_message(err),
            }),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn error_message(&self, err: &QuizError) -> String {
        match err {
            QuizError::Validation(_) | QuizError::SessionNotFound => err.to_string(),
            _ if self.active.is_some() => format!("Failed to grade answers. {}", err),
            _ => format!("Failed to generate question. {}", err),
        }
    }

    fn is_current(&self, epoch: u64, expected: Pending) -> bool {
        self.epoch == epoch && self.pending == Some(expected)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::answer_sheet::SheetState;

    const TICK: Duration = Duration::from_secs(1);

    fn content() -> GeneratedContent {
        GeneratedContent {
            question: "Article\n1. Why?\n2. How?\n3. What?".to_string(),
            answer: "1. A 2. C 3. B".to_string(),
        }
    }

    fn graded() -> GradingResult {
        GradingResult {
            score: 90.0,
            feedback: "很好".to_string(),
        }
    }

    fn answering_session() -> QuizSession {
        let mut session = QuizSession::new("s1".to_string(), TICK);
        session.select_type(QuestionType::ReadingComprehension);
        let ticket = session.begin_generation().unwrap();
        assert!(session.complete_generation(&ticket, Ok(content())));
        session
    }

    #[test]
    fn test_generate_without_type_is_validation_error() {
        let mut session = QuizSession::new("s1".to_string(), TICK);
        let err = session.begin_generation().unwrap_err();
        assert_eq!(err.to_string(), "Please select a question type first.");
        assert_eq!(session.status(), SessionStatus::Idle);
    }

    #[tokio::test]
    async fn test_generation_builds_sheet_and_starts_timer() {
        let session = answering_session();
        assert_eq!(session.status(), SessionStatus::Answering);
        assert!(session.timer_running());

        let view = session.view();
        let keys: Vec<String> = view
            .answer_sheet
            .unwrap()
            .fields
            .into_iter()
            .map(|f| f.key)
            .collect();
        assert_eq!(keys, vec!["1", "2", "3"]);
        assert!(view.answer_key.is_none());
    }

    #[tokio::test]
    async fn test_generation_failure_is_recorded() {
        let mut session = QuizSession::new("s1".to_string(), TICK);
        session.select_type(QuestionType::Cloze);
        let ticket = session.begin_generation().unwrap();
        session.complete_generation(&ticket, Err(QuizError::format("bad separator")));

        let view = session.view();
        assert_eq!(view.status, SessionStatus::Idle);
        let error = view.error.unwrap();
        assert_eq!(error.message, "Failed to generate question. bad separator");
    }

    #[tokio::test]
    async fn test_select_type_resets_everything_together() {
        let mut session = answering_session();
        session.set_answer("1", "A").unwrap();
        let ticket = session.begin_submission().unwrap().unwrap();
        session.complete_grading(&ticket, Ok(graded()));
        assert_eq!(session.status(), SessionStatus::Graded);

        session.select_type(QuestionType::Cloze);
        let view = session.view();
        assert_eq!(view.status, SessionStatus::Idle);
        assert!(view.question.is_none());
        assert!(view.answer_sheet.is_none());
        assert!(view.result.is_none());
        assert!(view.error.is_none());
        assert_eq!(view.elapsed_seconds, 0);
        assert!(!session.timer_running());
        assert_eq!(session.selected_type(), Some(QuestionType::Cloze));
    }

    #[tokio::test]
    async fn test_late_generation_after_type_change_is_discarded() {
        let mut session = QuizSession::new("s1".to_string(), TICK);
        session.select_type(QuestionType::Cloze);
        let ticket = session.begin_generation().unwrap();

        session.select_type(QuestionType::Mixed);
        assert!(!session.complete_generation(&ticket, Ok(content())));
        assert!(!session.has_content());
        assert_eq!(session.status(), SessionStatus::Idle);
    }

    #[tokio::test]
    async fn test_regenerate_supersedes_previous_request() {
        let mut session = QuizSession::new("s1".to_string(), TICK);
        session.select_type(QuestionType::Cloze);
        let first = session.begin_generation().unwrap();
        let second = session.begin_generation().unwrap();

        assert!(!session.complete_generation(&first, Ok(content())));
        assert!(session.complete_generation(&second, Ok(content())));
        assert!(session.has_content());
    }

    #[test]
    fn test_submit_without_content_is_noop() {
        let mut session = QuizSession::new("s1".to_string(), TICK);
        assert!(session.begin_submission().unwrap().is_none());
        assert_eq!(session.status(), SessionStatus::Idle);
    }

    #[tokio::test]
    async fn test_submission_carries_answers_and_locks_sheet() {
        let mut session = answering_session();
        session.set_answer("1", "A").unwrap();
        session.set_answer("2", "C").unwrap();
        session.set_answer("3", "B").unwrap();

        let ticket = session.begin_submission().unwrap().unwrap();
        assert_eq!(ticket.answers.len(), 3);
        assert_eq!(ticket.answers["2"], "C");
        assert_eq!(ticket.answer_key, "1. A 2. C 3. B");
        assert_eq!(session.status(), SessionStatus::Grading);

        assert!(session.set_answer("1", "D").is_err());
        assert!(session.begin_submission().is_err());
    }

    #[tokio::test]
    async fn test_grading_success_stops_timer_and_reveals_key() {
        let mut session = answering_session();
        session.set_answer("1", "A").unwrap();
        let ticket = session.begin_submission().unwrap().unwrap();
        assert!(session.complete_grading(&ticket, Ok(graded())));

        assert!(!session.timer_running());
        let view = session.view();
        assert_eq!(view.status, SessionStatus::Graded);
        assert_eq!(view.answer_key.as_deref(), Some("1. A 2. C 3. B"));
        assert_eq!(view.result.unwrap().score, 90.0);
        assert_eq!(view.answer_sheet.unwrap().state, SheetState::Submitted);
        assert!(session.begin_submission().is_err());
    }

    #[tokio::test]
    async fn test_grading_failure_reopens_sheet() {
        let mut session = answering_session();
        session.set_answer("1", "A").unwrap();
        let ticket = session.begin_submission().unwrap().unwrap();
        session.complete_grading(&ticket, Err(QuizError::format("bad payload")));

        let view = session.view();
        assert_eq!(view.status, SessionStatus::Answering);
        assert_eq!(view.answer_sheet.unwrap().state, SheetState::Editing);
        assert_eq!(
            view.error.unwrap().message,
            "Failed to grade answers. bad payload"
        );
        assert!(session.timer_running());

        session.set_answer("2", "B").unwrap();
        assert!(session.begin_submission().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rejected_batch_leaves_sheet_untouched() {
        let mut session = answering_session();
        session.set_answer("1", "B").unwrap();

        let batch: UserAnswers = [("1", "A"), ("2", "C"), ("9", "B")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert!(session.apply_answers(&batch).is_err());

        let answers = session.view().answer_sheet.unwrap().answers;
        assert_eq!(answers.len(), 1);
        assert_eq!(answers["1"], "B");
    }

    #[tokio::test]
    async fn test_grading_result_after_reset_is_discarded() {
        let mut session = answering_session();
        let ticket = session.begin_submission().unwrap().unwrap();
        session.reset();
        assert!(!session.complete_grading(&ticket, Ok(graded())));
        assert!(session.view().result.is_none());
    }
}
