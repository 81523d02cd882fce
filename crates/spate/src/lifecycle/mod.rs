//! Uniform cooperative-task lifecycle: start at most once, stop at most
//! once, observe termination, collect the terminal error. Grounded on the
//! vendored `startstopper` package's `goStartStopper`: the same three
//! one-shot signals (start, stop, done) gated by once-semantics, just
//! expressed with `tokio::sync` primitives instead of channels-of-channels.

mod group;
mod registry;

pub use group::Group;
pub use registry::Registry;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("already started")]
    AlreadyStarted,
    #[error("not started")]
    NotStarted,
}

/// The background work a lifecycle entity runs. Receives a cancellation
/// token that fires on either `stop()` or external context cancellation,
/// and returns the error (if any) that terminated it, mirroring the Go
/// original's `Runner.Run(ctx, stopChan) error`.
pub type Runner = Box<
    dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = Result<(), String>> + Send>>
        + Send,
>;

/// A started-at-most-once, stopped-at-most-once cooperative task.
///
/// Unlike the Go original's hand-rolled `sync.Once` pair, `start`/`stop`
/// here use `AtomicBool::compare_exchange` as the once-gate. Termination is
/// observed through a `Notify`, which unlike a `oneshot::Receiver` supports
/// any number of concurrent waiters in `done()`/`err()`.
pub struct Lifecycle {
    started: AtomicBool,
    stopped: AtomicBool,
    finished: AtomicBool,
    cancel: CancellationToken,
    runner: Mutex<Option<Runner>>,
    done_notify: Notify,
    terminal_err: Mutex<Option<String>>,
}

impl Lifecycle {
    pub fn new(runner: Runner) -> Arc<Self> {
        Arc::new(Self {
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            runner: Mutex::new(Some(runner)),
            done_notify: Notify::new(),
            terminal_err: Mutex::new(None),
        })
    }

    /// Start the background task. Succeeds at most once.
    pub async fn start(self: &Arc<Self>) -> Result<(), Error> {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::AlreadyStarted);
        }

        let runner = self.runner.lock().await.take().expect("runner taken twice");
        let cancel = self.cancel.clone();
        let this = self.clone();

        tokio::spawn(async move {
            if let Err(e) = runner(cancel).await {
                *this.terminal_err.lock().await = Some(e);
            }
            this.finished.store(true, Ordering::SeqCst);
            this.done_notify.notify_waiters();
        });
        Ok(())
    }

    /// Signal cooperative shutdown and wait for the task to return.
    ///
    /// Safe to call more than once: only the first call raises the
    /// cancellation signal, subsequent calls just await `done()`.
    pub async fn stop(self: &Arc<Self>) -> Result<(), Error> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(Error::NotStarted);
        }
        if self
            .stopped
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.cancel.cancel();
        }
        self.done().await;
        Ok(())
    }

    /// Resolve when the background task has returned. May be awaited by any
    /// number of callers, any number of times.
    pub async fn done(self: &Arc<Self>) {
        let notified = self.done_notify.notified();
        if self.finished.load(Ordering::SeqCst) {
            return;
        }
        notified.await;
    }

    /// Blocks until `done()` or `cancel` resolves; returns the error (if
    /// any) that terminated the background work.
    pub async fn err(self: &Arc<Self>, cancel: &CancellationToken) -> Option<String> {
        tokio::select! {
            _ = self.done() => {}
            _ = cancel.cancelled() => {}
        }
        self.terminal_err.lock().await.clone()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn noop_runner() -> Runner {
        Box::new(|cancel| {
            Box::pin(async move {
                cancel.cancelled().await;
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn start_then_start_again_fails() {
        let l = Lifecycle::new(noop_runner());
        assert!(l.start().await.is_ok());
        assert_eq!(l.start().await, Err(Error::AlreadyStarted));
        l.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_before_start_fails() {
        let l = Lifecycle::new(noop_runner());
        assert_eq!(l.stop().await, Err(Error::NotStarted));
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let l = Lifecycle::new(noop_runner());
        l.start().await.unwrap();
        l.stop().await.unwrap();
        l.stop().await.unwrap();
    }

    #[tokio::test]
    async fn runner_observes_cancellation_on_stop() {
        let ran = Arc::new(AtomicU32::new(0));
        let ran2 = ran.clone();
        let l = Lifecycle::new(Box::new(move |cancel| {
            let ran = ran2.clone();
            Box::pin(async move {
                cancel.cancelled().await;
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }));
        l.start().await.unwrap();
        l.stop().await.unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn err_reports_the_terminal_error_after_done() {
        let l = Lifecycle::new(Box::new(|cancel| {
            Box::pin(async move {
                cancel.cancelled().await;
                Err("measurement failed".to_string())
            })
        }));
        l.start().await.unwrap();
        l.stop().await.unwrap();
        let cancel = CancellationToken::new();
        assert_eq!(l.err(&cancel).await, Some("measurement failed".to_string()));
    }

    #[tokio::test]
    async fn err_is_none_on_clean_shutdown() {
        let l = Lifecycle::new(noop_runner());
        l.start().await.unwrap();
        l.stop().await.unwrap();
        let cancel = CancellationToken::new();
        assert_eq!(l.err(&cancel).await, None);
    }
}
