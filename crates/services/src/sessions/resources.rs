use std::sync::Arc;

use tracing::{info, warn};

use tutor_core::model::{ExecutionId, ExecutionReport, ResourceHandle};

use crate::backend::{PreviewRequest, TutorBackend};
use crate::error::BackendError;

/// What starting a preview produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewOutcome {
    /// A long-running app is up and must be released later.
    Running(ResourceHandle),
    /// The code ran to completion; nothing to clean up.
    Finished(ExecutionReport),
}

/// Starts and stops preview processes.
///
/// Stopping is best-effort: failures are logged and swallowed. Release takes
/// the handle by value, so callers detach it from the session first and a
/// handle is stopped at most once.
#[derive(Clone)]
pub struct ResourceTracker {
    backend: Arc<dyn TutorBackend>,
}

impl ResourceTracker {
    #[must_use]
    pub fn new(backend: Arc<dyn TutorBackend>) -> Self {
        Self { backend }
    }

    /// Start a run. Callers must have released any previous handle.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::StartupFailed` when the service reports a
    /// startup error, `BackendError::Parse` when a long-running reply lacks an
    /// id or address, and transport errors as-is.
    pub async fn acquire(&self, request: &PreviewRequest) -> Result<PreviewOutcome, BackendError> {
        let reply = self.backend.start_preview(request).await?;

        if let Some(err) = reply.startup_error {
            return Err(BackendError::StartupFailed(err));
        }

        if !reply.is_long_running {
            return Ok(PreviewOutcome::Finished(ExecutionReport {
                stdout: reply.stdout,
                stderr: reply.stderr,
                exit_code: reply.exit_code,
            }));
        }

        match (reply.execution_id, reply.address) {
            (Some(execution_id), Some(address)) => {
                info!(%execution_id, %address, "preview process started");
                Ok(PreviewOutcome::Running(ResourceHandle::new(
                    execution_id,
                    address,
                )))
            }
            // Whatever did start cannot be tracked; try to stop it by id.
            (Some(execution_id), None) => {
                self.stop(&execution_id).await;
                Err(BackendError::Parse(
                    "long-running preview without an address".into(),
                ))
            }
            (None, _) => Err(BackendError::Parse(
                "long-running preview without an execution id".into(),
            )),
        }
    }

    /// Stop a preview process if there is one.
    ///
    /// Returns true when the service acknowledged the stop. An absent handle
    /// is a no-op and returns false.
    pub async fn release(&self, handle: Option<ResourceHandle>) -> bool {
        let Some(handle) = handle else {
            return false;
        };
        self.stop(handle.execution_id()).await
    }

    async fn stop(&self, execution_id: &ExecutionId) -> bool {
        match self.backend.stop_preview(execution_id).await {
            Ok(()) => {
                info!(%execution_id, "preview process stopped");
                true
            }
            Err(err) => {
                warn!(%execution_id, %err, "failed to stop preview process");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, PreviewReply, ScriptedBackend};
    use tutor_core::model::EditorLanguage;
    use url::Url;

    fn request() -> PreviewRequest {
        PreviewRequest::Execute {
            code: "import streamlit as st".into(),
            language: EditorLanguage::Python,
        }
    }

    fn running(id: &str) -> PreviewReply {
        PreviewReply {
            execution_id: Some(ExecutionId::new(id)),
            is_long_running: true,
            address: Some(Url::parse("http://localhost:8501").unwrap()),
            ..PreviewReply::default()
        }
    }

    #[tokio::test]
    async fn long_running_reply_yields_handle() {
        let backend = ScriptedBackend::new();
        backend.push_preview(Ok(running("e1")));
        let tracker = ResourceTracker::new(Arc::new(backend));

        let outcome = tracker.acquire(&request()).await.unwrap();
        let PreviewOutcome::Running(handle) = outcome else {
            panic!("expected a running preview");
        };
        assert_eq!(handle.execution_id().as_str(), "e1");
    }

    #[tokio::test]
    async fn short_run_yields_report() {
        let backend = ScriptedBackend::new();
        backend.push_preview(Ok(PreviewReply {
            stdout: "hello\n".into(),
            exit_code: Some(0),
            ..PreviewReply::default()
        }));
        let tracker = ResourceTracker::new(Arc::new(backend));

        let outcome = tracker.acquire(&request()).await.unwrap();
        assert_eq!(
            outcome,
            PreviewOutcome::Finished(ExecutionReport {
                stdout: "hello\n".into(),
                stderr: String::new(),
                exit_code: Some(0),
            })
        );
    }

    #[tokio::test]
    async fn startup_error_is_a_failure() {
        let backend = ScriptedBackend::new();
        backend.push_preview(Ok(PreviewReply {
            startup_error: Some("ModuleNotFoundError".into()),
            ..PreviewReply::default()
        }));
        let tracker = ResourceTracker::new(Arc::new(backend));

        let err = tracker.acquire(&request()).await.unwrap_err();
        assert!(matches!(err, BackendError::StartupFailed(_)));
    }

    #[tokio::test]
    async fn missing_address_stops_the_orphan() {
        let backend = ScriptedBackend::new();
        backend.push_preview(Ok(PreviewReply {
            address: None,
            ..running("e7")
        }));
        let tracker = ResourceTracker::new(Arc::new(backend.clone()));

        assert!(tracker.acquire(&request()).await.is_err());
        assert_eq!(
            backend.count(|c| *c == BackendCall::StopPreview(ExecutionId::new("e7"))),
            1
        );
    }

    #[tokio::test]
    async fn release_swallows_failures() {
        let backend = ScriptedBackend::new();
        backend.push_stop(Err(BackendError::Service("gone".into())));
        let tracker = ResourceTracker::new(Arc::new(backend.clone()));

        assert!(!tracker.release(Some(handle("e1"))).await);
        assert!(!tracker.release(None).await);
        assert_eq!(
            backend.count(|c| matches!(c, BackendCall::StopPreview(_))),
            1
        );
    }

    #[tokio::test]
    async fn reused_execution_id_is_stopped_every_time() {
        let backend = ScriptedBackend::new();
        let tracker = ResourceTracker::new(Arc::new(backend.clone()));

        assert!(tracker.release(Some(handle("e1"))).await);
        assert!(tracker.release(Some(handle("e1"))).await);
        assert_eq!(
            backend.count(|c| *c == BackendCall::StopPreview(ExecutionId::new("e1"))),
            2
        );
    }

    fn handle(id: &str) -> ResourceHandle {
        ResourceHandle::new(
            ExecutionId::new(id),
            Url::parse("http://localhost:8501").unwrap(),
        )
    }
}
