//! Cancellable one-shot timers that deliver a message into a room mailbox.
//!
//! Timers run on the shared tokio timer wheel and do nothing but enqueue the
//! message when they fire; a fired message that raced a cancellation is the
//! receiver's job to ignore (room controllers filter by round).

use std::time::Duration;

use tokio::{sync::mpsc, task::JoinHandle};

/// Handle to a scheduled timer. Cancelling is idempotent and best-effort:
/// a message that already entered the mailbox is not recalled. Dropping the
/// guard cancels the timer.
#[derive(Debug)]
pub struct TimerGuard {
    task: JoinHandle<()>,
}

impl TimerGuard {
    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Deliver `message` into `mailbox` after `delay`, unless cancelled first.
pub fn schedule<M>(delay: Duration, message: M, mailbox: mpsc::UnboundedSender<M>) -> TimerGuard
where
    M: Send + 'static,
{
    let task = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = mailbox.send(message);
    });

    TimerGuard { task }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_after_the_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _guard = schedule(Duration::from_secs(5), 42u32, tx);
        assert_eq!(rx.recv().await, Some(42));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_delivery() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let guard = schedule(Duration::from_secs(5), 42u32, tx);
        guard.cancel();
        guard.cancel();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        drop(schedule(Duration::from_secs(5), 42u32, tx));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
    }
}
