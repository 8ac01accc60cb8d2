//! Elapsed-time feedback while a backend call is in flight

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tower_lsp::lsp_types::request::WorkDoneProgressCreate;
use tower_lsp::lsp_types::{
    Diagnostic, DiagnosticSeverity, ProgressToken, Range, WorkDoneProgress, WorkDoneProgressBegin,
    WorkDoneProgressCreateParams, WorkDoneProgressEnd, WorkDoneProgressReport,
};
use tracing::{debug, warn};

use crate::config::ProgressStyle;
use crate::lsp::error::HandlerError;
use crate::lsp::session::Session;

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Spinner frame for the `tick`-th update
pub fn spinner_frame(tick: usize) -> &'static str {
    SPINNER_FRAMES[tick % SPINNER_FRAMES.len()]
}

/// `⠙ (1.4s)`
pub fn format_status(tick: usize, elapsed: Duration) -> String {
    format!("{} ({:.1}s)", spinner_frame(tick), elapsed.as_secs_f64())
}

struct Ticker {
    /// Held by the ticker for the whole of each emission; `false` once stopped
    active: Arc<tokio::sync::Mutex<bool>>,
    handle: JoinHandle<()>,
    token: Option<ProgressToken>,
}

/// Periodic "still working" status for one in-flight request.
///
/// `stop` is synchronous with respect to the ticker: an emission already
/// under way finishes first, and nothing is emitted after `stop` returns.
pub struct ProgressSignal {
    session: Arc<Session>,
    style: ProgressStyle,
    interval: Duration,
    title: String,
    anchor: Range,
    lifetime: Duration,
    ticker: Mutex<Option<Ticker>>,
}

impl ProgressSignal {
    /// `anchor` is where diagnostic-style status is shown and `lifetime` how
    /// long each such diagnostic lives if nobody clears it.
    pub fn new(
        session: Arc<Session>,
        style: ProgressStyle,
        interval: Duration,
        title: &str,
        anchor: Range,
        lifetime: Duration,
    ) -> Self {
        Self {
            session,
            style,
            interval,
            title: title.to_string(),
            anchor,
            lifetime,
            ticker: Mutex::new(None),
        }
    }

    /// Starts the ticker. A second call while running does nothing.
    pub async fn start(&self) -> Result<(), HandlerError> {
        if self.is_running() {
            return Ok(());
        }

        let token = match self.style {
            ProgressStyle::WorkDone => Some(self.begin_work_done().await?),
            ProgressStyle::Diagnostic => None,
        };

        let active = Arc::new(tokio::sync::Mutex::new(true));
        let handle = tokio::spawn(tick(
            Arc::clone(&self.session),
            Arc::clone(&active),
            self.interval,
            self.anchor,
            self.lifetime,
            token.clone(),
        ));

        let mut ticker = self.ticker.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = ticker.replace(Ticker {
            active,
            handle,
            token,
        }) {
            // Lost a start race; the newer ticker wins
            previous.handle.abort();
        }

        Ok(())
    }

    /// Stops the ticker and clears the status. Safe to call at any time.
    pub async fn stop(&self) -> Result<(), HandlerError> {
        let Some(ticker) = self
            .ticker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        else {
            return Ok(());
        };

        *ticker.active.lock().await = false;
        ticker.handle.abort();

        match ticker.token {
            Some(token) => {
                self.session
                    .progress(token, WorkDoneProgress::End(WorkDoneProgressEnd::default()))
                    .await
            }
            None => self.session.reset_diagnostics().await,
        }
    }

    pub fn is_running(&self) -> bool {
        self.ticker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    async fn begin_work_done(&self) -> Result<ProgressToken, HandlerError> {
        let token = self.session.next_token();

        self.session
            .request::<WorkDoneProgressCreate>(WorkDoneProgressCreateParams {
                token: token.clone(),
            })
            .await?;
        self.session
            .progress(
                token.clone(),
                WorkDoneProgress::Begin(WorkDoneProgressBegin {
                    title: self.title.clone(),
                    ..Default::default()
                }),
            )
            .await?;

        Ok(token)
    }
}

impl Drop for ProgressSignal {
    fn drop(&mut self) {
        // A handler that bailed out without stop() must not leave a ticker behind
        if let Some(ticker) = self
            .ticker
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            ticker.handle.abort();
        }
    }
}

async fn tick(
    session: Arc<Session>,
    active: Arc<tokio::sync::Mutex<bool>>,
    interval: Duration,
    anchor: Range,
    lifetime: Duration,
    token: Option<ProgressToken>,
) {
    let started = Instant::now();
    let mut count = 0;

    loop {
        tokio::time::sleep(interval).await;

        let active = active.lock().await;
        if !*active {
            return;
        }

        let message = format_status(count, started.elapsed());
        let sent = match &token {
            Some(token) => {
                session
                    .progress(
                        token.clone(),
                        WorkDoneProgress::Report(WorkDoneProgressReport {
                            message: Some(message),
                            ..Default::default()
                        }),
                    )
                    .await
            }
            None => {
                session
                    .publish_diagnostics(
                        vec![Diagnostic {
                            range: anchor,
                            severity: Some(DiagnosticSeverity::INFORMATION),
                            message,
                            ..Default::default()
                        }],
                        lifetime,
                    )
                    .await
            }
        };

        if let Err(e) = sent {
            warn!("Progress update failed, stopping ticker: {}", e);
            return;
        }
        debug!(tick = count, "Progress update sent");
        count += 1;
    }
}
