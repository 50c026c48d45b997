use std::sync::Arc;

use stockflow_core::{EngineError, EngineResult};
use stockflow_inventory::LedgerSnapshot;

use crate::alerts::{AlertReport, classify_alerts};
use crate::config::EngineConfig;
use crate::health::{HealthReport, assess_health};
use crate::recommendations::{RecommendationReport, generate_recommendations};
use crate::report::InventoryReport;
use crate::scope::Scope;

/// A scoped analytics computation over one shared ledger snapshot.
///
/// Jobs only read their snapshot, so any number of them may run concurrently
/// on different threads against the same `Arc<LedgerSnapshot>`.
pub trait AnalyticsJob: Send + Sync + 'static {
    type Output: Send + 'static;

    /// Portion of the ledger this job covers.
    fn scope(&self) -> Scope;

    /// The consistent snapshot the job computes over.
    fn snapshot(&self) -> &LedgerSnapshot;

    /// Execute the computation. Must not mutate ledger state.
    fn run(&self) -> EngineResult<Self::Output>;
}

macro_rules! snapshot_job {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            snapshot: Arc<LedgerSnapshot>,
            scope: Scope,
            config: EngineConfig,
        }

        impl $name {
            pub fn new(snapshot: Arc<LedgerSnapshot>) -> Self {
                Self {
                    snapshot,
                    scope: Scope::All,
                    config: EngineConfig::default(),
                }
            }

            pub fn with_scope(mut self, scope: Scope) -> Self {
                self.scope = scope;
                self
            }

            pub fn with_config(mut self, config: EngineConfig) -> Self {
                self.config = config;
                self
            }

            pub fn config(&self) -> &EngineConfig {
                &self.config
            }
        }
    };
}

snapshot_job!(
    /// Alert scan over a snapshot.
    AlertScanJob
);
snapshot_job!(
    /// Reorder / slow-mover recommendation batch over a snapshot.
    RecommendationJob
);
snapshot_job!(
    /// Health assessment over a snapshot.
    HealthJob
);
snapshot_job!(
    /// Alerts, recommendations and health in one pass.
    InventoryReportJob
);

impl AnalyticsJob for AlertScanJob {
    type Output = AlertReport;

    fn scope(&self) -> Scope {
        self.scope
    }

    fn snapshot(&self) -> &LedgerSnapshot {
        &self.snapshot
    }

    fn run(&self) -> EngineResult<AlertReport> {
        classify_alerts(&self.snapshot, self.scope, &self.config)
    }
}

impl AnalyticsJob for RecommendationJob {
    type Output = RecommendationReport;

    fn scope(&self) -> Scope {
        self.scope
    }

    fn snapshot(&self) -> &LedgerSnapshot {
        &self.snapshot
    }

    fn run(&self) -> EngineResult<RecommendationReport> {
        generate_recommendations(&self.snapshot, self.scope, &self.config)
    }
}

impl AnalyticsJob for HealthJob {
    type Output = HealthReport;

    fn scope(&self) -> Scope {
        self.scope
    }

    fn snapshot(&self) -> &LedgerSnapshot {
        &self.snapshot
    }

    fn run(&self) -> EngineResult<HealthReport> {
        assess_health(&self.snapshot, self.scope, &self.config)
    }
}

impl AnalyticsJob for InventoryReportJob {
    type Output = InventoryReport;

    fn scope(&self) -> Scope {
        self.scope
    }

    fn snapshot(&self) -> &LedgerSnapshot {
        &self.snapshot
    }

    fn run(&self) -> EngineResult<InventoryReport> {
        Ok(InventoryReport {
            generated_at: self.snapshot.as_of(),
            alerts: classify_alerts(&self.snapshot, self.scope, &self.config)?,
            recommendations: generate_recommendations(&self.snapshot, self.scope, &self.config)?,
            health: assess_health(&self.snapshot, self.scope, &self.config)?,
        })
    }
}

/// Runs jobs in-process, refusing jobs outside its own scope.
///
/// - `Scope::All`: accepts every job (shared worker).
/// - `Scope::Warehouse`: only accepts jobs scoped to that warehouse.
#[derive(Debug, Copy, Clone, Default)]
pub struct LocalRunner {
    scope: Scope,
}

impl LocalRunner {
    pub fn new(scope: Scope) -> Self {
        Self { scope }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn run<J: AnalyticsJob>(&self, job: &J) -> EngineResult<J::Output> {
        let allowed = match (self.scope, job.scope()) {
            (Scope::All, _) => true,
            (Scope::Warehouse(mine), Scope::Warehouse(theirs)) => mine == theirs,
            (Scope::Warehouse(_), Scope::All) => false,
        };
        if !allowed {
            return Err(EngineError::validation(
                "scope violation (job scope not allowed by runner)",
            ));
        }
        job.run()
    }
}
