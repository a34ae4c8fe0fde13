use chatorg_core::{ContainerDraft, GizmoInfo};
use serde::Serialize;
use tokio::time::Instant;

use crate::progress::{CreatePhase, ProgressEvent, ProgressSink, millis};
use crate::remote::RemoteApi;

const NAME_REQUIRED: &str = "Project name is required.";
const MISSING_ID: &str = "Project was created but the response carried no id.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_url: Option<String>,
    pub elapsed_ms: u64,
}

impl CreateOutcome {
    fn failed(status: Option<u16>, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            status,
            error: Some(error.into()),
            container_id: None,
            title: None,
            href: None,
            short_url: None,
            elapsed_ms: 0,
        }
    }
}

/// Creates one project in a single attempt.
///
/// Upserts are not idempotent, so failures are reported rather than
/// retried.
pub struct ContainerCreator<'a, A> {
    api: &'a A,
    sink: &'a dyn ProgressSink,
}

impl<'a, A: RemoteApi> ContainerCreator<'a, A> {
    pub fn new(api: &'a A, sink: &'a dyn ProgressSink) -> Self {
        Self { api, sink }
    }

    /// Emits `starting`, `sending` and `parsing` phases, then a done event on
    /// every path. A blank name fails with status 400 before any request.
    pub async fn run(&self, run_id: &str, draft: &ContainerDraft) -> CreateOutcome {
        let started = Instant::now();
        let name = draft.name.trim();
        tracing::info!(
            run_id,
            name,
            starters = draft.prompt_starters.len(),
            "project creation started"
        );
        self.phase(run_id, CreatePhase::Starting);

        let outcome = if name.is_empty() {
            tracing::warn!(run_id, "project name is blank");
            CreateOutcome::failed(Some(400), NAME_REQUIRED)
        } else {
            self.phase(run_id, CreatePhase::Sending);
            let draft = ContainerDraft {
                name: name.to_string(),
                ..draft.clone()
            };
            let result = self.api.create_container(&draft).await;
            self.phase(run_id, CreatePhase::Parsing);
            match result {
                Ok(gizmo) => self.created(&gizmo, name),
                Err(err) => CreateOutcome::failed(err.status(), err.to_string()),
            }
        };
        let outcome = CreateOutcome {
            elapsed_ms: millis(started.elapsed()),
            ..outcome
        };

        if outcome.ok {
            tracing::info!(
                run_id,
                container_id = outcome.container_id.as_deref().unwrap_or_default(),
                elapsed_ms = outcome.elapsed_ms,
                "project created"
            );
        } else {
            tracing::warn!(
                run_id,
                status = outcome.status,
                error = outcome.error.as_deref().unwrap_or_default(),
                "project creation failed"
            );
        }
        self.sink.emit(ProgressEvent::CreateContainerDone {
            run_id: run_id.to_string(),
            ok: outcome.ok,
            status: outcome.status,
            container_id: outcome.container_id.clone(),
            error: outcome.error.clone(),
            elapsed_ms: outcome.elapsed_ms,
        });
        outcome
    }

    fn phase(&self, run_id: &str, phase: CreatePhase) {
        self.sink.emit(ProgressEvent::CreateContainerProgress {
            run_id: run_id.to_string(),
            phase,
        });
    }

    fn created(&self, gizmo: &GizmoInfo, name: &str) -> CreateOutcome {
        let Some(id) = gizmo.id() else {
            return CreateOutcome::failed(None, MISSING_ID);
        };
        let title = gizmo
            .display
            .as_ref()
            .and_then(|display| display.name.as_deref())
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .unwrap_or(name);
        CreateOutcome {
            ok: true,
            status: None,
            error: None,
            container_id: Some(id.to_string()),
            title: Some(title.to_string()),
            href: Some(self.api.container_href(gizmo.short_url())),
            short_url: gizmo.short_url().map(str::to_string),
            elapsed_ms: 0,
        }
    }
}
