//! Process runner for the router management service.
//!
//! Runs long-lived app processes side by side until one fails or a shutdown
//! signal (SIGINT/SIGTERM) arrives, lets every process finish its own
//! graceful stop, then runs the registered closers under a timeout.
//!
//! # Example
//!
//! ```no_run
//! use routermgt_runner::Runner;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let outcome = Runner::new()
//!         .with_app_process(|ctx| async move {
//!             ctx.cancelled().await;
//!             Ok(())
//!         })
//!         .with_closer(|| async move {
//!             tracing::info!("Releasing resources");
//!             Ok(())
//!         })
//!         .with_closer_timeout(Duration::from_secs(5))
//!         .run()
//!         .await;
//!
//!     std::process::exit(outcome.exit_code());
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type BoxedResultFuture = Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send>>;

/// A long-lived process; it must return soon after the token is cancelled
pub type AppProcess = Box<dyn FnOnce(CancellationToken) -> BoxedResultFuture + Send>;

/// Cleanup run once every app process has stopped
pub type Closer = Box<dyn FnOnce() -> BoxedResultFuture + Send>;

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    /// Stopped by a signal or cancellation, or every process returned Ok
    Clean,
    /// An app process failed or panicked; carries the first failure
    Failed(anyhow::Error),
}

impl RunOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, RunOutcome::Clean)
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Clean => 0,
            RunOutcome::Failed(_) => 1,
        }
    }
}

pub struct Runner {
    app_processes: Vec<AppProcess>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
    drain_timeout: Duration,
    cancellation_token: CancellationToken,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    /// Defaults: 10s closer timeout, 30s for processes to stop after cancellation
    pub fn new() -> Self {
        Self {
            app_processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            drain_timeout: Duration::from_secs(30),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Adds an app process. If any process fails, all are cancelled.
    pub fn with_app_process<F, Fut>(mut self, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.app_processes
            .push(Box::new(|token| Box::pin(process(token))));
        self
    }

    /// Adds a closer. Closers run concurrently after the processes stop,
    /// whatever the reason; one failing does not stop the others.
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.closers.push(Box::new(|| Box::pin(closer())));
        self
    }

    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// How long cancelled processes get to stop before they are aborted
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Use an externally owned token, e.g. to trigger shutdown from a test
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Run until every process has stopped, then run the closers.
    ///
    /// The caller decides what to do with the outcome; the binary maps it to
    /// the process exit code.
    pub async fn run(self) -> RunOutcome {
        let token = self.cancellation_token;
        let mut join_set = JoinSet::new();

        for process in self.app_processes {
            join_set.spawn(process(token.clone()));
        }

        spawn_signal_handlers(token.clone());

        let mut first_error = None;
        let mut draining = false;

        loop {
            let next = if draining {
                match tokio::time::timeout(self.drain_timeout, join_set.join_next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!(
                            remaining = join_set.len(),
                            "App processes did not stop within {:?}, aborting", self.drain_timeout
                        );
                        join_set.shutdown().await;
                        if first_error.is_none() {
                            first_error = Some(anyhow::anyhow!(
                                "app processes aborted after drain timeout of {:?}",
                                self.drain_timeout
                            ));
                        }
                        break;
                    }
                }
            } else {
                tokio::select! {
                    _ = token.cancelled() => {
                        draining = true;
                        continue;
                    }
                    next = join_set.join_next() => next,
                }
            };

            let Some(result) = next else {
                break;
            };

            match result {
                Ok(Ok(())) => debug!("App process completed successfully"),
                Ok(Err(err)) => {
                    error!("App process error: {:#}", err);
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                    token.cancel();
                }
                Err(err) => {
                    error!("App process panicked: {}", err);
                    if first_error.is_none() {
                        first_error = Some(anyhow::anyhow!("app process panicked: {err}"));
                    }
                    token.cancel();
                }
            }
        }

        run_closers(self.closers, self.closer_timeout).await;

        match first_error {
            Some(err) => {
                error!("Application exiting with error: {:#}", err);
                RunOutcome::Failed(err)
            }
            None => {
                info!("Application exiting normally");
                RunOutcome::Clean
            }
        }
    }
}

fn spawn_signal_handlers(token: CancellationToken) {
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => {
                    info!("Received shutdown signal");
                    ctrl_c_token.cancel();
                }
                Err(err) => error!("Error setting up signal handler: {}", err),
            },
            _ = ctrl_c_token.cancelled() => {}
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(err) => {
                error!("Error setting up SIGTERM handler: {}", err);
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM signal");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    });
}

async fn run_closers(closers: Vec<Closer>, timeout: Duration) {
    if closers.is_empty() {
        return;
    }

    info!("Running closers with timeout of {:?}", timeout);

    let mut closer_set = JoinSet::new();
    for closer in closers {
        closer_set.spawn(closer());
    }

    let drained = tokio::time::timeout(timeout, async {
        while let Some(result) = closer_set.join_next().await {
            match result {
                Ok(Ok(())) => debug!("Closer completed successfully"),
                Ok(Err(err)) => error!("Closer error: {:#}", err),
                Err(err) => error!("Closer panicked: {}", err),
            }
        }
    })
    .await;

    match drained {
        Ok(()) => info!("All closers completed"),
        Err(_) => {
            error!("Closers timed out after {:?}", timeout);
            closer_set.shutdown().await;
        }
    }
}
