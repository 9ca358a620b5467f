//! Fire-and-forget query execution.
//!
//! The HTTP caller only gets an acknowledgment. The spawned task logs every
//! fragment and its own failure; the returned [`TaskHandle`] is the only way
//! to observe completion.

use ccbridge_core::relay::{LogSink, RelayReport};
use tokio::task::{JoinError, JoinHandle};
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use crate::orchestrator::Orchestrator;
use crate::session::{QueryMode, SessionError};

/// Handle to a detached background query.
///
/// Dropping the handle detaches the task; it keeps running.
#[derive(Debug)]
pub struct TaskHandle {
    id: Uuid,
    handle: JoinHandle<Result<RelayReport, SessionError>>,
}

impl TaskHandle {
    pub const fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Abort the task. The session process is killed when its handle drops.
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Wait for the task and return its outcome.
    pub async fn join(self) -> Result<Result<RelayReport, SessionError>, JoinError> {
        self.handle.await
    }
}

/// Spawn `query` onto the runtime with a logging sink.
pub fn spawn_query(orchestrator: Orchestrator, query: String) -> TaskHandle {
    let id = Uuid::new_v4();
    let span = info_span!("background_query", task_id = %id);
    let handle = tokio::spawn(
        async move {
            info!("Background query started");
            let mut sink = LogSink::new(id.to_string());
            let result = orchestrator
                .run(QueryMode::Background, &query, &mut sink)
                .await;
            match &result {
                Ok(report) => info!(fragments = report.fragments, "Background query completed"),
                Err(e) => error!(error = %e, "Background query failed"),
            }
            result
        }
        .instrument(span),
    );
    TaskHandle { id, handle }
}
