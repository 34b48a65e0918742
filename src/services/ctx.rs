//! Per-call context passed explicitly through the service layer.

use std::sync::Arc;

use serde::Serialize;

/// A progress event emitted by a long-running tool.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressUpdate {
    pub status: String,
    pub message: String,
    pub percent: u8,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_final: bool,
}

/// Progress sink handed to tool handlers.
///
/// Under stdio transport this only logs; a streaming transport can install
/// its own sink. Handlers must emit a final `complete/100` event on
/// success.
#[derive(Clone)]
pub struct Progress {
    sink: Arc<dyn Fn(ProgressUpdate) + Send + Sync>,
}

impl Progress {
    pub fn new(sink: Arc<dyn Fn(ProgressUpdate) + Send + Sync>) -> Self {
        Self { sink }
    }

    /// Sink that writes progress to the log stream only.
    pub fn logging() -> Self {
        Self::new(Arc::new(|update: ProgressUpdate| {
            tracing::info!(
                status = %update.status,
                percent = update.percent,
                is_final = update.is_final,
                "{}",
                update.message
            );
        }))
    }

    pub fn send(&self, status: &str, message: impl Into<String>, percent: u8) {
        (self.sink)(ProgressUpdate {
            status: status.to_string(),
            message: message.into(),
            percent,
            is_final: false,
        });
    }

    /// Terminal success event: `status=complete, percent=100, isFinal`.
    pub fn complete(&self, message: impl Into<String>) {
        (self.sink)(ProgressUpdate {
            status: "complete".to_string(),
            message: message.into(),
            percent: 100,
            is_final: true,
        });
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::logging()
    }
}

/// Context for one tool invocation. Built at dispatch, passed explicitly,
/// never stored beyond the life of the call.
#[derive(Clone)]
pub struct ToolCtx {
    pub tool: String,
    pub request_id: String,
    pub session_id: String,
    pub progress: Progress,
}

impl ToolCtx {
    /// Context with the log-only progress sink. This is what the stdio
    /// transport and the CLI use: progress is a wire no-op but still
    /// logged.
    pub fn new(tool: &str, session_id: &str) -> Self {
        Self::with_progress(tool, session_id, Progress::logging())
    }

    /// Context with a transport-supplied progress sink, for transports
    /// that can stream events back to the client.
    pub fn with_progress(tool: &str, session_id: &str, progress: Progress) -> Self {
        Self {
            tool: tool.to_string(),
            request_id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            progress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_progress_sink_receives_events() {
        let events: Arc<Mutex<Vec<ProgressUpdate>>> = Arc::new(Mutex::new(Vec::new()));
        let sink_events = Arc::clone(&events);
        let progress = Progress::new(Arc::new(move |update| {
            sink_events.lock().unwrap().push(update);
        }));

        progress.send("running", "halfway", 50);
        progress.complete("done");

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].percent, 50);
        assert!(!events[0].is_final);
        assert_eq!(events[1].status, "complete");
        assert_eq!(events[1].percent, 100);
        assert!(events[1].is_final);
    }

    #[test]
    fn test_tool_ctx_carries_installed_sink() {
        let events: Arc<Mutex<Vec<ProgressUpdate>>> = Arc::new(Mutex::new(Vec::new()));
        let sink_events = Arc::clone(&events);
        let ctx = ToolCtx::with_progress(
            "bulk-import",
            "session-1",
            Progress::new(Arc::new(move |update| {
                sink_events.lock().unwrap().push(update);
            })),
        );

        ctx.progress.complete("imported");

        assert_eq!(ctx.tool, "bulk-import");
        assert_eq!(events.lock().unwrap().len(), 1);
    }
}
