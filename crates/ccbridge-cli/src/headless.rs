//! Headless (non-interactive) mode.
//!
//! Runs one query through the orchestrator and streams each rendered block to
//! the console as it arrives.

use std::io::{self, Write};
use std::path::PathBuf;

use tracing::{info, warn};

use ccbridge_core::Config;
use ccbridge_core::relay::{FragmentSink, RelayReport};
use ccbridge_server::orchestrator::Orchestrator;
use ccbridge_server::session::{QueryMode, SessionError};

/// Command-line overrides applied on top of the loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct HeadlessOverrides {
    /// Working directory for the session.
    pub cwd: Option<PathBuf>,
    /// Turn cap for this run.
    pub max_turns: Option<u32>,
}

impl HeadlessOverrides {
    /// Apply the overrides and re-validate.
    pub fn apply(&self, config: &mut Config) -> Result<(), HeadlessError> {
        if let Some(cwd) = &self.cwd {
            config.session.project_dir = Some(cwd.clone());
        }
        if let Some(max_turns) = self.max_turns {
            config.session.max_turns = max_turns;
        }
        config.validate()?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HeadlessError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error(transparent)]
    Config(#[from] ccbridge_core::Error),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Failed to write output: {0}")]
    Output(#[from] io::Error),
}

/// Writes each fragment to `out` and flushes immediately.
///
/// Write errors cannot propagate through [`FragmentSink::push`]; the first one
/// is kept and reported by [`ConsoleSink::finish`].
#[derive(Debug)]
pub struct ConsoleSink<W: Write + Send> {
    out: W,
    error: Option<io::Error>,
}

impl<W: Write + Send> ConsoleSink<W> {
    pub const fn new(out: W) -> Self {
        Self { out, error: None }
    }

    /// Terminate the output with a newline and surface any write failure.
    pub fn finish(mut self) -> io::Result<W> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(self.out)
    }
}

impl<W: Write + Send> FragmentSink for ConsoleSink<W> {
    fn push(&mut self, fragment: String) {
        if self.error.is_some() {
            return;
        }
        let written = self
            .out
            .write_all(fragment.as_bytes())
            .and_then(|()| self.out.flush());
        if let Err(e) = written {
            warn!(error = %e, "Console write failed; dropping remaining output");
            self.error = Some(e);
        }
    }
}

/// Run `query` and stream its blocks into `out`.
pub async fn run<W: Write + Send>(
    orchestrator: &Orchestrator,
    query: &str,
    out: W,
) -> Result<RelayReport, HeadlessError> {
    if query.trim().is_empty() {
        return Err(HeadlessError::EmptyQuery);
    }

    let mut sink = ConsoleSink::new(out);
    let report = orchestrator.run(QueryMode::Sync, query, &mut sink).await?;
    sink.finish()?;

    info!(
        session_id = report.session_id.as_deref().unwrap_or("-"),
        fragments = report.fragments,
        num_turns = report.num_turns,
        "Headless query finished"
    );
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use ccbridge_core::ndjson::{Message, parse_line};
    use ccbridge_server::session::{Connector, Session, SessionOptions};

    use super::*;

    const LINES: &[&str] = &[
        r##"{"type":"system","subtype":"init","session_id":"cli-1","tools":[]}"##,
        r##"{"type":"assistant","message":{"content":[{"type":"text","text":"Looking."},{"type":"tool_use","id":"t1","name":"Read","input":{"path":"README.md"}}]}}"##,
        r##"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"t1","content":[{"type":"text","text":"# readme"}]}]}}"##,
        r##"{"type":"result","subtype":"success","session_id":"cli-1","num_turns":2}"##,
    ];

    struct Scripted {
        fail: bool,
    }

    struct ScriptedSession(VecDeque<Message>);

    #[async_trait]
    impl Connector for Scripted {
        async fn connect(
            &self,
            _options: &SessionOptions,
        ) -> Result<Box<dyn Session>, SessionError> {
            if self.fail {
                return Err(SessionError::SpawnFailed {
                    reason: "not installed".into(),
                });
            }
            Ok(Box::new(ScriptedSession(
                LINES.iter().map(|l| parse_line(l).unwrap()).collect(),
            )))
        }
    }

    #[async_trait]
    impl Session for ScriptedSession {
        async fn query(&mut self, _prompt: &str) -> Result<(), SessionError> {
            Ok(())
        }

        async fn next_message(&mut self) -> Result<Option<Message>, SessionError> {
            Ok(self.0.pop_front())
        }

        async fn close(self: Box<Self>) -> Result<(), SessionError> {
            Ok(())
        }
    }

    fn orchestrator(fail: bool) -> Orchestrator {
        let mut config = Config::default();
        config.github.token = Some("ghp_test".into());
        Orchestrator::new(Arc::new(Scripted { fail }), Arc::new(config))
    }

    /// Writer that always fails.
    #[derive(Debug)]
    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn console_sink_writes_fragments_in_order() {
        let mut sink = ConsoleSink::new(Vec::new());
        sink.push("a".into());
        sink.push("\n[tool_use] Bash {}\n".into());
        sink.push("b".into());
        let out = sink.finish().unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a\n[tool_use] Bash {}\nb\n");
    }

    #[test]
    fn console_sink_reports_first_write_error() {
        let mut sink = ConsoleSink::new(Broken);
        sink.push("x".into());
        sink.push("y".into());
        let err = sink.finish().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn run_streams_rendered_blocks() {
        let mut out = Vec::new();
        let report = run(&orchestrator(false), "read the readme", &mut out)
            .await
            .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Looking.\n[tool_use] Read {\"path\":\"README.md\"}\n# readme\n"
        );
        assert_eq!(report.fragments, 3);
        assert_eq!(report.session_id.as_deref(), Some("cli-1"));
    }

    #[tokio::test]
    async fn run_rejects_blank_query() {
        let mut out = Vec::new();
        let err = run(&orchestrator(false), "  \n", &mut out).await.unwrap_err();
        assert!(matches!(err, HeadlessError::EmptyQuery));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn run_propagates_session_failure() {
        let mut out = Vec::new();
        let err = run(&orchestrator(true), "q", &mut out).await.unwrap_err();
        assert!(matches!(
            err,
            HeadlessError::Session(SessionError::SpawnFailed { .. })
        ));
    }

    #[test]
    fn overrides_layer_over_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ccbridge.json");
        std::fs::write(
            &path,
            r#"{"session": {"max_turns": 7, "background_max_turns": 20}}"#,
        )
        .unwrap();
        let mut config = ccbridge_core::config::load_config(None, Some(&path)).unwrap();
        assert_eq!(config.session.max_turns, 7);

        HeadlessOverrides {
            cwd: Some(dir.path().to_path_buf()),
            max_turns: None,
        }
        .apply(&mut config)
        .unwrap();
        assert_eq!(config.session.max_turns, 7);
        assert_eq!(config.session.background_max_turns, 20);
        assert_eq!(config.session.working_directory(), dir.path());
    }

    #[test]
    fn overrides_apply_and_validate() {
        let mut config = Config::default();
        HeadlessOverrides {
            cwd: Some(PathBuf::from("/srv/repo")),
            max_turns: Some(12),
        }
        .apply(&mut config)
        .unwrap();
        assert_eq!(config.session.max_turns, 12);
        assert_eq!(config.session.project_dir, Some(PathBuf::from("/srv/repo")));

        let err = HeadlessOverrides {
            max_turns: Some(51),
            ..HeadlessOverrides::default()
        }
        .apply(&mut config)
        .unwrap_err();
        assert!(matches!(err, HeadlessError::Config(_)));
    }
}
