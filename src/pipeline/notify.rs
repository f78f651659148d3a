//! Result notification.
//!
//! [`ResultBroadcaster`] keeps an explicit list of subscribers, each an
//! unbounded channel.  Publishing is fire-and-forget: no acknowledgment, no
//! backpressure, and subscribers whose receiver was dropped are pruned on the
//! next publish.

use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::classify::ClassificationResult;

/// Topic name results are published under.
pub const EMOTION_RESULT: &str = "emotionResult";

#[derive(Debug, Default)]
pub struct ResultBroadcaster {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<ClassificationResult>>>,
}

impl ResultBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new listener.  Dropping the receiver unsubscribes it.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ClassificationResult> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        rx
    }

    /// Deliver `result` to every live subscriber; returns how many got it.
    pub fn publish(&self, result: &ClassificationResult) -> usize {
        let mut subs = self.lock();
        subs.retain(|tx| tx.send(result.clone()).is_ok());
        log::debug!(
            "notify: {EMOTION_RESULT} {:?} delivered to {} listener(s)",
            result.prediction,
            subs.len()
        );
        subs.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().iter().filter(|tx| !tx.is_closed()).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<ClassificationResult>>> {
        match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
