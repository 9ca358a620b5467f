//! Session orchestration: one session per query, relayed into a sink.

use std::sync::Arc;

use ccbridge_core::Config;
use ccbridge_core::relay::{Accumulator, FragmentSink, RelayReport};
use tracing::{info, warn};

use crate::session::{Connector, QueryMode, Session, SessionError, SessionOptions};

/// Open a session, submit `query`, drain every message into `sink`.
///
/// The session is closed on every exit path that returns here. If the
/// returned future is dropped instead, the session's own drop tears the
/// process down.
pub async fn run_query(
    connector: &dyn Connector,
    options: &SessionOptions,
    query: &str,
    sink: &mut dyn FragmentSink,
) -> Result<RelayReport, SessionError> {
    let mut session = connector.connect(options).await?;
    let outcome = relay(session.as_mut(), query, sink).await;

    if let Err(e) = session.close().await {
        warn!(error = %e, "Failed to close assistant session");
    }

    if let Ok(report) = &outcome {
        info!(
            session_id = ?report.session_id,
            fragments = report.fragments,
            skipped = report.skipped,
            unrecognized = report.unrecognized,
            num_turns = report.num_turns,
            duration_ms = report.duration_ms,
            cost_usd = ?report.cost_usd,
            is_error = report.is_error,
            "Assistant session finished"
        );
    }
    outcome
}

async fn relay(
    session: &mut dyn Session,
    query: &str,
    sink: &mut dyn FragmentSink,
) -> Result<RelayReport, SessionError> {
    session.query(query).await?;
    let mut report = RelayReport::default();
    while let Some(msg) = session.next_message().await? {
        report.observe(&msg, sink);
    }
    Ok(report)
}

/// Runs queries against a connector with options derived from config.
#[derive(Clone)]
pub struct Orchestrator {
    connector: Arc<dyn Connector>,
    config: Arc<Config>,
}

impl Orchestrator {
    pub fn new(connector: Arc<dyn Connector>, config: Arc<Config>) -> Self {
        Self { connector, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Session options for `mode`, built fresh for each query.
    pub fn options(&self, mode: QueryMode) -> Result<SessionOptions, SessionError> {
        SessionOptions::from_config(&self.config, mode)
    }

    /// Run `query` in `mode`, pushing fragments into `sink`.
    pub async fn run(
        &self,
        mode: QueryMode,
        query: &str,
        sink: &mut dyn FragmentSink,
    ) -> Result<RelayReport, SessionError> {
        let options = self.options(mode)?;
        run_query(self.connector.as_ref(), &options, query, sink).await
    }

    /// Run `query` to completion and return the concatenated fragments.
    ///
    /// A failure discards anything accumulated so far.
    pub async fn execute(&self, query: &str) -> Result<String, SessionError> {
        let mut accumulator = Accumulator::new();
        self.run(QueryMode::Sync, query, &mut accumulator).await?;
        Ok(accumulator.finish())
    }
}
