use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Elapsed-seconds counter backed by a tokio interval task.
///
/// The task lives exactly as long as the handle is running: `stop` or dropping
/// the handle aborts it, so a reset session can never leak a ticking timer.
#[derive(Debug)]
pub struct ElapsedTimer {
    elapsed: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl ElapsedTimer {
    /// Must be called inside a tokio runtime.
    pub fn start(tick: Duration) -> Self {
        let elapsed = Arc::new(AtomicU64::new(0));
        let counter = elapsed.clone();
        let first_tick = Instant::now() + tick;

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(first_tick, tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                counter.fetch_add(1, Ordering::Relaxed);
            }
        });

        Self {
            elapsed,
            task: Some(task),
        }
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Freezes the counter at its current value.
    pub fn stop(&mut self) -> u64 {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.elapsed_seconds()
    }
}

impl Drop for ElapsedTimer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

pub fn format_elapsed(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Sleeps half a tick past the target so the ticker fires first.
    async fn advance_secs(secs: u64) {
        tokio::time::sleep(Duration::from_millis(secs * 1000 + 500)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_counts_one_per_tick() {
        let timer = ElapsedTimer::start(Duration::from_secs(1));
        assert_eq!(timer.elapsed_seconds(), 0);
        advance_secs(3).await;
        assert_eq!(timer.elapsed_seconds(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_freezes_value() {
        let mut timer = ElapsedTimer::start(Duration::from_secs(1));
        advance_secs(2).await;
        assert_eq!(timer.stop(), 2);
        assert!(!timer.is_running());
        advance_secs(5).await;
        assert_eq!(timer.elapsed_seconds(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_task() {
        let timer = ElapsedTimer::start(Duration::from_secs(1));
        let counter = timer.elapsed.clone();
        drop(timer);
        advance_secs(3).await;
        assert_eq!(counter.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "00:00");
        assert_eq!(format_elapsed(65), "01:05");
        assert_eq!(format_elapsed(3600), "60:00");
    }
}
