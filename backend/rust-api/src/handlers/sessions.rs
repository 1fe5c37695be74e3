use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::QuizError,
    extractors::AppJson,
    models::{
        question::{QuestionType, QuestionTypeInfo},
        CreateSessionRequest, SelectTypeRequest, SetAnswerRequest, SubmitAnswersRequest,
    },
    services::AppState,
};

pub async fn list_question_types() -> impl IntoResponse {
    let types: Vec<QuestionTypeInfo> = QuestionType::ALL
        .iter()
        .copied()
        .map(QuestionTypeInfo::from)
        .collect();
    Json(types)
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    body: Option<AppJson<CreateSessionRequest>>,
) -> Result<impl IntoResponse, QuizError> {
    let req = body.map(|AppJson(req)| req).unwrap_or_default();
    req.validate()?;

    let question_type = req
        .question_type
        .as_deref()
        .map(str::parse::<QuestionType>)
        .transpose()?;

    let view = state.sessions.create_session(question_type).await;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, QuizError> {
    tracing::debug!("Getting session: {}", session_id);
    let view = state.sessions.get_view(&session_id).await?;
    Ok(Json(view))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, QuizError> {
    state.sessions.delete_session(&session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn select_type(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    AppJson(req): AppJson<SelectTypeRequest>,
) -> Result<impl IntoResponse, QuizError> {
    req.validate()?;
    let question_type: QuestionType = req.question_type.parse()?;

    let view = state
        .sessions
        .select_type(&session_id, question_type)
        .await?;
    Ok(Json(view))
}

pub async fn generate_question(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, QuizError> {
    tracing::info!("Generating question for session: {}", session_id);
    let view = state.sessions.generate(&session_id).await?;
    Ok(Json(view))
}

pub async fn set_answer(
    State(state): State<Arc<AppState>>,
    Path((session_id, key)): Path<(String, String)>,
    AppJson(req): AppJson<SetAnswerRequest>,
) -> Result<impl IntoResponse, QuizError> {
    req.validate()?;
    let view = state
        .sessions
        .set_answer(&session_id, &key, &req.value)
        .await?;
    Ok(Json(view))
}

pub async fn submit_answers(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    body: Option<AppJson<SubmitAnswersRequest>>,
) -> Result<impl IntoResponse, QuizError> {
    let req = body.map(|AppJson(req)| req).unwrap_or_default();
    req.validate()?;

    tracing::info!("Submitting answers for session: {}", session_id);
    let view = state
        .sessions
        .submit_answers(&session_id, &req.answers)
        .await?;
    Ok(Json(view))
}

pub async fn reset_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, QuizError> {
    tracing::info!("Resetting session: {}", session_id);
    let view = state.sessions.reset(&session_id).await?;
    Ok(Json(view))
}
