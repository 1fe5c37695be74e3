use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use chrono::Utc;
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::{
    error::QuizError,
    metrics::SSE_CONNECTIONS_ACTIVE,
    models::{
        timer::{StopReason, TimerEvent, TimerStopped, TimerTick},
        SessionStatus,
    },
    services::{elapsed_timer::format_elapsed, AppState},
};

/// SSE endpoint for the elapsed-time counter
/// GET /api/v1/sessions/{id}/stream
pub async fn session_stream(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, QuizError> {
    // Verify session exists
    state.sessions.store().get(&session_id).await?;

    let tick = Duration::from_millis(state.config.timer_tick_ms);
    let max_ticks = max_stream_ticks(state.config.sse_max_stream_secs, tick);
    tracing::info!(
        "Starting SSE stream: session={}, max_ticks={}, tick_interval={:?}",
        session_id,
        max_ticks,
        tick
    );

    let stream = create_timer_stream(state, session_id, tick, max_ticks);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Number of ticks that fit in `max_stream_secs`, at least one.
fn max_stream_ticks(max_stream_secs: u64, tick: Duration) -> u64 {
    let tick_ms = tick.as_millis().max(1);
    let ticks = u128::from(max_stream_secs) * 1000 / tick_ms;
    u64::try_from(ticks).unwrap_or(u64::MAX).max(1)
}

/// Keeps the connection gauge accurate however the stream ends.
struct ConnectionGuard;

impl ConnectionGuard {
    fn new() -> Self {
        SSE_CONNECTIONS_ACTIVE.inc();
        Self
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        SSE_CONNECTIONS_ACTIVE.dec();
    }
}

struct StreamState {
    app: Arc<AppState>,
    session_id: String,
    sent: u64,
    max_ticks: u64,
    tick: Duration,
    finished: bool,
    _guard: ConnectionGuard,
}

/// Emits one `timer-tick` per interval while the counter runs, then a single
/// `timer-stopped` and ends.
fn create_timer_stream(
    app: Arc<AppState>,
    session_id: String,
    tick: Duration,
    max_ticks: u64,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let initial = StreamState {
        app,
        session_id,
        sent: 0,
        max_ticks,
        tick,
        finished: false,
        _guard: ConnectionGuard::new(),
    };

    stream::unfold(initial, |mut st| async move {
        if st.finished {
            return None;
        }

        let timer_event = next_event(&st).await;
        let event = Event::default()
            .event(timer_event.event_name())
            .data(timer_event.to_sse_data());

        match timer_event {
            TimerEvent::TimerStopped(stopped) => {
                tracing::info!(
                    "Timer stream closed: session={}, reason={:?}",
                    st.session_id,
                    stopped.reason
                );
                st.finished = true;
            }
            TimerEvent::TimerTick(_) => {
                sleep(st.tick).await;
                st.sent += 1;
            }
        }

        Some((Ok(event), st))
    })
}

async fn next_event(st: &StreamState) -> TimerEvent {
    let snapshot = match st.app.sessions.store().get(&st.session_id).await {
        Ok(session) => {
            let guard = session.lock().await;
            Some((guard.status(), guard.elapsed_seconds()))
        }
        Err(_) => None,
    };

    let stopped = |elapsed_seconds, reason| {
        TimerEvent::TimerStopped(TimerStopped {
            session_id: st.session_id.clone(),
            elapsed_seconds,
            reason,
            timestamp: Utc::now(),
        })
    };

    match snapshot {
        None => stopped(0, StopReason::Inactive),
        Some((SessionStatus::Idle, elapsed)) => stopped(elapsed, StopReason::Inactive),
        Some((SessionStatus::Graded, elapsed)) => stopped(elapsed, StopReason::Graded),
        Some((_, elapsed)) if st.sent >= st.max_ticks => stopped(elapsed, StopReason::StreamLimit),
        Some((_, elapsed)) => TimerEvent::TimerTick(TimerTick {
            session_id: st.session_id.clone(),
            elapsed_seconds: elapsed,
            display: format_elapsed(elapsed),
            timestamp: Utc::now(),
        }),
    }
}
