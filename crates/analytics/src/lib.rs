//! `stockflow-analytics`
//!
//! **Responsibility:** derived inventory analytics over a ledger snapshot.
//!
//! - Consumption estimation (daily rate, days to stockout).
//! - Alert classification, reorder / slow-mover recommendations, health score.
//! - Movement and department consumption analysis.
//!
//! Every computation is a pure function of a `LedgerSnapshot` plus an explicit
//! `EngineConfig`. Nothing here mutates the ledger or keeps state between calls.

pub mod alerts;
pub mod config;
pub mod consumption;
pub mod health;
pub mod job;
pub mod movement;
pub mod recommendations;
pub mod report;
pub mod scope;

pub use alerts::{Alert, AlertReport, AlertSummary, Urgency, classify_alerts, classify_item};
pub use config::{EngineConfig, HealthWeights, MAX_WINDOW_DAYS, UrgencyThresholds};
pub use consumption::{ConsumptionEstimate, DaysToStockout, estimate_consumption};
pub use health::{HealthBand, HealthReport, HealthScope, HealthScore, SubScores, assess_health};
pub use job::{
    AlertScanJob, AnalyticsJob, HealthJob, InventoryReportJob, LocalRunner, RecommendationJob,
};
pub use movement::{DepartmentReport, MovementSummary, department_efficiency, summarize_movements};
pub use recommendations::{
    CategorySummary, Recommendation, RecommendationKind, RecommendationReport, generate_recommendations,
};
pub use report::{InventoryReport, ItemFailure};
pub use scope::Scope;
