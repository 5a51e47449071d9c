//! Fetch, normalize and load one road-object collection.

use crate::config::NvdbConfig;
use crate::error::PipelineError;
use crate::loader::{self, ConflictPolicy};
use crate::nvdb::{NvdbClient, QueryParams};
use crate::table;
use sqlx::PgPool;
use std::fmt;

pub const NAMESPACE: &str = "nvdb";
pub const TARGET_TABLE: &str = "vegobjekter_fartsgrense";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Configured,
    Fetching,
    Building,
    Loading,
    Done,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Configured => "configured",
            PipelineState::Fetching => "fetching",
            PipelineState::Building => "building",
            PipelineState::Loading => "loading",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of one pipeline run.
///
/// `error` is set exactly when `state` is [`PipelineState::Failed`].
#[derive(Debug)]
pub struct PipelineOutcome {
    pub state: PipelineState,
    pub records_fetched: usize,
    pub requests: usize,
    pub rows_loaded: usize,
    pub error: Option<PipelineError>,
}

impl PipelineOutcome {
    fn new() -> Self {
        Self {
            state: PipelineState::Configured,
            records_fetched: 0,
            requests: 0,
            rows_loaded: 0,
            error: None,
        }
    }

    fn enter(&mut self, next: PipelineState) {
        log::info!("pipeline: {} -> {}", self.state, next);
        self.state = next;
    }

    fn fail(mut self, error: PipelineError) -> Self {
        log::error!("pipeline: {}", error);
        self.enter(PipelineState::Failed);
        self.error = Some(error);
        self
    }

    /// Split off the failure, if any.
    pub fn into_result(mut self) -> Result<Self, PipelineError> {
        match self.error.take() {
            Some(error) => Err(error),
            None => Ok(self),
        }
    }
}

pub struct Pipeline {
    client: NvdbClient,
    pool: PgPool,
    object_id: String,
    params: QueryParams,
    policy: ConflictPolicy,
}

impl Pipeline {
    pub fn new(nvdb: &NvdbConfig, client: NvdbClient, pool: PgPool) -> Self {
        Self {
            client,
            pool,
            object_id: nvdb.object_id.clone(),
            params: nvdb.params.clone(),
            policy: ConflictPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run fetch, build and load once.
    ///
    /// A partial harvest is still loaded. The run fails only when nothing was
    /// fetched because pagination was interrupted, or when loading fails.
    /// Without records the database is never touched.
    pub async fn run(&self) -> PipelineOutcome {
        let mut outcome = PipelineOutcome::new();

        outcome.enter(PipelineState::Fetching);
        let harvest = self.client.fetch(&self.object_id, &self.params).await;
        outcome.records_fetched = harvest.objects.len();
        outcome.requests = harvest.requests;

        if harvest.objects.is_empty() {
            if let Some(err) = harvest.interrupted {
                return outcome.fail(err.into());
            }
            log::info!("pipeline: no objects for collection {}, nothing to load", self.object_id);
            outcome.enter(PipelineState::Done);
            return outcome;
        }
        if !harvest.is_complete() {
            log::warn!(
                "pipeline: pagination was interrupted, loading partial harvest of {} objects",
                outcome.records_fetched
            );
        }

        outcome.enter(PipelineState::Building);
        let rows = table::build(&harvest.objects);
        if rows.is_empty() {
            outcome.enter(PipelineState::Done);
            return outcome;
        }

        outcome.enter(PipelineState::Loading);
        match loader::load(&self.pool, &rows, TARGET_TABLE, NAMESPACE, self.policy).await {
            Ok(report) => {
                outcome.rows_loaded = report.rows_written;
                outcome.enter(PipelineState::Done);
                outcome
            }
            Err(err) => {
                outcome.rows_loaded = err.rows_committed();
                outcome.fail(err.into())
            }
        }
    }
}
