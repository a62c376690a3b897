//! Run-level cancellation.
//!
//! A [`CancelSource`] is held by whoever decides the run must stop (an
//! interrupt handler, a deadline timer). Every account task holds a
//! [`CancelToken`] and races its work against [`CancelToken::cancelled`],
//! so that in-flight sessions still go through their release path.

use std::time::Duration;

use tokio::sync::watch;

/// The triggering side of a cancellation signal.
#[derive(Debug)]
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

/// The observing side of a cancellation signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelSource {
    /// Creates a new, untriggered source.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Returns a token observing this source.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }

    /// Triggers cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Spawns a timer that triggers cancellation after `deadline`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn cancel_after(&self, deadline: Duration) -> tokio::task::JoinHandle<()> {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            tx.send_replace(true);
        })
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    /// Returns true if cancellation was triggered.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is triggered.
    ///
    /// If the source is dropped without cancelling, this never resolves.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_is_observed_by_all_tokens() {
        let source = CancelSource::new();
        let a = source.token();
        let b = a.clone();

        assert!(!a.is_cancelled());
        source.cancel();

        a.cancelled().await;
        b.cancelled().await;
        assert!(b.is_cancelled());
    }

    #[tokio::test]
    async fn test_dropped_source_never_cancels() {
        let token = {
            let source = CancelSource::new();
            source.token()
        };

        let raced = tokio::time::timeout(Duration::from_millis(20), token.cancelled()).await;
        assert!(raced.is_err());
        assert!(!token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_deadline() {
        let source = CancelSource::new();
        let token = source.token();
        let _timer = source.cancel_after(Duration::from_secs(5));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(token.is_cancelled());
    }
}
