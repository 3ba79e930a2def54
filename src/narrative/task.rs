use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;

use super::client::CompletionService;
use super::prompt::NarrativePrompt;
use crate::error::NarrativeError;

/// Where a narrative request currently stands.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatus {
    Pending,
    Complete(String),
    Failed(NarrativeError),
}

// ---------------------------------------------------------------------------
// Background narrative request
// ---------------------------------------------------------------------------

/// A completion request running on its own thread so the UI keeps drawing.
///
/// The request is bounded by the client's timeout; [`NarrativeTask::cancel`]
/// discards whatever the worker eventually produces.
pub struct NarrativeTask {
    rx: Receiver<Result<String, NarrativeError>>,
    cancelled: Arc<AtomicBool>,
}

impl NarrativeTask {
    pub fn spawn<S>(service: S, prompt: NarrativePrompt) -> Self
    where
        S: CompletionService + 'static,
    {
        let (tx, rx) = channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let worker_tx = tx.clone();

        let spawned = thread::Builder::new()
            .name("narrative".into())
            .spawn(move || {
                let result = service.complete(&prompt);
                if flag.load(Ordering::Acquire) {
                    log::debug!("narrative finished after cancellation, dropping result");
                    return;
                }
                worker_tx.send(result).ok();
            });

        if let Err(e) = spawned {
            log::error!("could not start narrative worker: {e}");
            tx.send(Err(NarrativeError::ServiceUnavailable(format!(
                "could not start worker: {e}"
            ))))
            .ok();
        }

        Self { rx, cancelled }
    }

    /// Non-blocking check. A terminal status is reported exactly once.
    pub fn poll(&self) -> TaskStatus {
        if self.is_cancelled() {
            return TaskStatus::Failed(NarrativeError::Cancelled);
        }
        match self.rx.try_recv() {
            Ok(Ok(text)) => TaskStatus::Complete(text),
            Ok(Err(e)) => TaskStatus::Failed(e),
            Err(TryRecvError::Empty) => TaskStatus::Pending,
            Err(TryRecvError::Disconnected) => TaskStatus::Failed(NarrativeError::ServiceUnavailable(
                "narrative worker stopped without a result".into(),
            )),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
