//! Delayed, cancelable first-use notice
//!
//! Restoring the runtime can take a few seconds on a cold cache. The notice
//! is scheduled when restoration starts and only shows if restoration is
//! still running after the delay, so fast extractions stay silent.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

/// Receives the notice once its delay elapses
pub trait NoticeSink: Send + Sync + 'static {
    /// Show the notice. Called at most once per schedule.
    fn show(&self);

    /// Remove the notice after the work completes. Only called after `show`.
    fn clear(&self) {}
}

/// A notice racing against completion of some work
///
/// Dropping it without [`finish`](Self::finish) also cancels it.
pub struct DelayedNotice {
    done: Option<oneshot::Sender<()>>,
    task: JoinHandle<bool>,
}

impl DelayedNotice {
    /// Schedule `sink` to be shown after `delay` unless finished first
    pub fn schedule(delay: Duration, sink: Arc<dyn NoticeSink>) -> Self {
        let (done, mut rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = &mut rx => false,
                _ = tokio::time::sleep(delay) => {
                    sink.show();
                    // Sender dropped or signalled, either way the work is over
                    let _ = rx.await;
                    sink.clear();
                    true
                }
            }
        });

        Self {
            done: Some(done),
            task,
        }
    }

    /// Mark the work complete; returns whether the notice was shown
    pub async fn finish(mut self) -> bool {
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
        match (&mut self.task).await {
            Ok(shown) => shown,
            Err(e) => {
                debug!("notice task failed: {}", e);
                false
            }
        }
    }
}
