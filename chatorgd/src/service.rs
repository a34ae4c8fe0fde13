use chatorg_core::ContainerDraft;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::command::{Command, container_request, item_request};
use crate::config::EngineConfig;
use crate::guard::{ConcurrentRunRejected, RunGuard};
use crate::harvest::{
    ContainerHarvest, ContainerHarvester, HarvestError, HarvestOptions, ItemHarvest,
    ItemHarvester,
};
use crate::mutate::{
    BulkExecutor, BulkReport, ContainerCreator, CreateOutcome, MutationOp, ValidationError,
};
use crate::progress::{ProgressSink, new_run_id};
use crate::remote::RemoteApi;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reply {
    Pong,
    Items {
        run_id: String,
        #[serde(flatten)]
        harvest: ItemHarvest,
    },
    Containers {
        run_id: String,
        #[serde(flatten)]
        harvest: ContainerHarvest,
    },
    Mutation(BulkReport),
    Created {
        run_id: String,
        #[serde(flatten)]
        outcome: CreateOutcome,
    },
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Rejected(#[from] ConcurrentRunRejected),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Harvest(#[from] HarvestError),
}

impl ServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Rejected(_) => "concurrent_run_rejected",
            ServiceError::Validation(_) => "validation",
            ServiceError::Harvest(_) => "harvest",
        }
    }
}

/// Dispatches commands to the harvesters and the bulk executor, one run
/// per category at a time.
pub struct Service<A, S> {
    api: A,
    sink: S,
    config: EngineConfig,
    guard: RunGuard,
}

impl<A: RemoteApi, S: ProgressSink> Service<A, S> {
    pub fn new(api: A, sink: S, config: EngineConfig) -> Self {
        Self {
            api,
            sink,
            config,
            guard: RunGuard::new(),
        }
    }

    pub fn guard(&self) -> &RunGuard {
        &self.guard
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Parses one JSON command and renders its reply, or an `ERROR` reply
    /// naming what went wrong.
    pub async fn handle_line(&self, line: &str) -> Value {
        let command = match serde_json::from_str::<Command>(line) {
            Ok(command) => command,
            Err(err) => {
                tracing::warn!(%err, "unreadable command");
                return error_reply("invalid_command", &err);
            }
        };
        match self.handle(command).await {
            Ok(reply) => serde_json::to_value(&reply)
                .unwrap_or_else(|err| error_reply("encode", &err)),
            Err(err) => error_reply(err.kind(), &err),
        }
    }

    pub async fn handle(&self, command: Command) -> Result<Reply, ServiceError> {
        command.validate()?;
        let _permit = match command.category() {
            Some(category) => Some(self.guard.try_acquire(category).inspect_err(|err| {
                tracing::warn!(%err, "run rejected");
            })?),
            None => None,
        };

        match command {
            Command::Ping => Ok(Reply::Pong),
            Command::ListItems {
                limit,
                page_size,
                since_updated_ms,
            } => {
                let run_id = new_run_id();
                let request = item_request(&self.config, limit, page_size, since_updated_ms);
                let harvest = ItemHarvester::new(&self.api, &self.sink, self.harvest_options())
                    .harvest(&run_id, request)
                    .await?;
                Ok(Reply::Items { run_id, harvest })
            }
            Command::ListContainers {
                limit,
                items_per_container,
                per_container_limit,
                since_updated_ms,
                stop_after_out_of_scope,
            } => {
                let run_id = new_run_id();
                let request = container_request(
                    &self.config,
                    limit,
                    items_per_container,
                    per_container_limit,
                    since_updated_ms,
                    stop_after_out_of_scope,
                );
                let harvest =
                    ContainerHarvester::new(&self.api, &self.sink, self.harvest_options())
                        .harvest(&run_id, request)
                        .await?;
                Ok(Reply::Containers { run_id, harvest })
            }
            Command::HideItems { ids, throttle_ms } => {
                self.mutate(MutationOp::HideItem, &ids, throttle_ms).await
            }
            Command::MoveItems {
                ids,
                container_id,
                throttle_ms,
            } => {
                self.mutate(MutationOp::MoveItem { container_id }, &ids, throttle_ms)
                    .await
            }
            Command::DeleteContainers { ids, throttle_ms } => {
                self.mutate(MutationOp::DeleteContainer, &ids, throttle_ms)
                    .await
            }
            Command::CreateContainer {
                name,
                description,
                prompt_starters,
            } => {
                let run_id = new_run_id();
                let draft = ContainerDraft {
                    name,
                    description,
                    prompt_starters,
                };
                let outcome = ContainerCreator::new(&self.api, &self.sink)
                    .run(&run_id, &draft)
                    .await;
                Ok(Reply::Created { run_id, outcome })
            }
        }
    }

    fn harvest_options(&self) -> HarvestOptions {
        HarvestOptions {
            strict_ordering: self.config.strict_ordering,
        }
    }

    async fn mutate(
        &self,
        op: MutationOp,
        ids: &[String],
        throttle_ms: Option<u64>,
    ) -> Result<Reply, ServiceError> {
        let throttle = op.kind().throttle(throttle_ms.or(self.config.throttle_ms));
        let run_id = new_run_id();
        let report = BulkExecutor::new(&self.api, &self.sink)
            .run(&run_id, ids, &op, throttle)
            .await?;
        Ok(Reply::Mutation(report))
    }
}

fn error_reply(kind: &str, err: &dyn std::error::Error) -> Value {
    json!({ "type": "ERROR", "kind": kind, "message": err.to_string() })
}
