use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::{QuizError, QuizResult};
use crate::metrics::{
    track_model_call, QUESTIONS_GENERATED_TOTAL, SESSIONS_ACTIVE, SESSIONS_TOTAL,
    STALE_RESULTS_TOTAL,
};
use crate::models::answer_sheet::UserAnswers;
use crate::models::question::QuestionType;
use crate::models::SessionView;
use crate::services::gemini_client::LanguageModel;
use crate::services::grading_service::GradingService;
use crate::services::prompt_builder::build_prompt;
use crate::services::quiz_session::QuizSession;
use crate::services::response_parser::parse_generated;

pub type SharedSession = Arc<Mutex<QuizSession>>;

/// In-memory registry of quiz sessions keyed by id.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SharedSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: QuizSession) -> SharedSession {
        let id = session.id().to_string();
        let shared = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, shared.clone());
        SESSIONS_ACTIVE.inc();
        shared
    }

    pub async fn get(&self, session_id: &str) -> QuizResult<SharedSession> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or(QuizError::SessionNotFound)
    }

    pub async fn remove(&self, session_id: &str) -> QuizResult<()> {
        let removed = self.sessions.write().await.remove(session_id);
        match removed {
            Some(session) => {
                // Drop the active question (and its timer) even if a request still holds the Arc.
                session.lock().await.reset();
                SESSIONS_ACTIVE.dec();
                Ok(())
            }
            None => Err(QuizError::SessionNotFound),
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Removes sessions whose last update is older than `max_idle`.
    pub async fn purge_idle(&self, max_idle: Duration) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(max_idle).unwrap_or(chrono::Duration::MAX);

        let mut expired = Vec::new();
        {
            let sessions = self.sessions.read().await;
            for (id, session) in sessions.iter() {
                // Sessions busy with a request are in use and therefore not idle.
                if let Ok(guard) = session.try_lock() {
                    if guard.updated_at() < cutoff {
                        expired.push(id.clone());
                    }
                }
            }
        }

        let mut purged = 0;
        for id in expired {
            if self.remove(&id).await.is_ok() {
                SESSIONS_TOTAL.with_label_values(&["expired"]).inc();
                purged += 1;
            }
        }
        purged
    }
}

/// Drives quiz sessions: prompt building, generation, parsing, answer
/// collection and grading. Session locks are never held across model calls.
pub struct SessionService {
    store: SessionStore,
    model: Arc<dyn LanguageModel>,
    grading: GradingService,
    tick: Duration,
}

impl SessionService {
    pub fn new(model: Arc<dyn LanguageModel>, tick: Duration) -> Self {
        Self {
            store: SessionStore::new(),
            grading: GradingService::new(model.clone()),
            model,
            tick,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn model_configured(&self) -> bool {
        self.model.is_configured()
    }

    pub async fn create_session(&self, question_type: Option<QuestionType>) -> SessionView {
        let mut session = QuizSession::new(Uuid::new_v4().to_string(), self.tick);
        if let Some(question_type) = question_type {
            session.select_type(question_type);
        }
        let view = session.view();
        self.store.insert(session).await;

        SESSIONS_TOTAL.with_label_values(&["created"]).inc();
        tracing::info!("Quiz session created: {}", view.session_id);
        view
    }

    pub async fn get_view(&self, session_id: &str) -> QuizResult<SessionView> {
        let session = self.store.get(session_id).await?;
        let view = session.lock().await.view();
        Ok(view)
    }

    pub async fn delete_session(&self, session_id: &str) -> QuizResult<()> {
        self.store.remove(session_id).await?;
        SESSIONS_TOTAL.with_label_values(&["deleted"]).inc();
        tracing::info!("Quiz session deleted: {}", session_id);
        Ok(())
    }

    pub async fn select_type(
        &self,
        session_id: &str,
        question_type: QuestionType,
    ) -> QuizResult<SessionView> {
        let session = self.store.get(session_id).await?;
        let mut guard = session.lock().await;
        guard.select_type(question_type);
        tracing::info!("Session {} selected type {}", session_id, question_type);
        Ok(guard.view())
    }

    pub async fn reset(&self, session_id: &str) -> QuizResult<SessionView> {
        let session = self.store.get(session_id).await?;
        let mut guard = session.lock().await;
        guard.reset();
        Ok(guard.view())
    }

    /// Generates a new test for the selected type, replacing whatever the
    /// session held before. Failures are recorded on the session and returned.
    pub async fn generate(&self, session_id: &str) -> QuizResult<SessionView> {
        let session = self.store.get(session_id).await?;
        let ticket = session.lock().await.begin_generation()?;

        let prompt = build_prompt(ticket.question_type, &mut rand::rng());
        tracing::info!(
            "Generating {} test for session={} topic={:?}",
            ticket.question_type,
            session_id,
            prompt.topic
        );

        let outcome = track_model_call("generate", self.model.generate_text(&prompt.text))
            .await
            .and_then(|raw| parse_generated(&raw));

        if let Err(e) = &outcome {
            tracing::error!("Failed to generate question for session={}: {}", session_id, e);
        }

        let mut guard = session.lock().await;
        let applied = guard.complete_generation(&ticket, outcome.clone());
        if !applied {
            STALE_RESULTS_TOTAL.with_label_values(&["generate"]).inc();
            return Ok(guard.view());
        }

        outcome?;
        QUESTIONS_GENERATED_TOTAL
            .with_label_values(&[ticket.question_type.as_str()])
            .inc();
        Ok(guard.view())
    }

    pub async fn set_answer(
        &self,
        session_id: &str,
        key: &str,
        value: &str,
    ) -> QuizResult<SessionView> {
        let session = self.store.get(session_id).await?;
        let mut guard = session.lock().await;
        guard.set_answer(key, value)?;
        Ok(guard.view())
    }

    /// Applies `answers` on top of the sheet, then sends one grading request.
    /// Without an active question nothing happens.
    pub async fn submit_answers(
        &self,
        session_id: &str,
        answers: &UserAnswers,
    ) -> QuizResult<SessionView> {
        let session = self.store.get(session_id).await?;

        let ticket = {
            let mut guard = session.lock().await;
            if !guard.has_content() {
                tracing::debug!("Submit ignored, session {} has no active question", session_id);
                return Ok(guard.view());
            }
            guard.apply_answers(answers)?;
            match guard.begin_submission()? {
                Some(ticket) => ticket,
                None => return Ok(guard.view()),
            }
        };

        tracing::info!(
            "Submitting {} answers for grading, session={}",
            ticket.answers.len(),
            session_id
        );

        let outcome = self
            .grading
            .grade(&ticket.question, &ticket.answer_key, &ticket.answers)
            .await;

        if let Err(e) = &outcome {
            tracing::error!("Failed to grade answers for session={}: {}", session_id, e);
        }

        let mut guard = session.lock().await;
        if !guard.complete_grading(&ticket, outcome.clone()) {
            STALE_RESULTS_TOTAL.with_label_values(&["grade"]).inc();
            return Ok(guard.view());
        }

        outcome?;
        Ok(guard.view())
    }
}
