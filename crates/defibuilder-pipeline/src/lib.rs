//! Pipeline orchestration: configuration, stage seams, run state, and the
//! generate → compile → resolve → audit driver.

mod config;
mod orchestrator;
mod run;
mod stages;

pub use config::{ConfigError, Mode, PipelineConfig, ServiceConfig};
pub use orchestrator::{Pipeline, RunEvent};
pub use run::{
    Attempt, AuditOutcome, InvariantViolation, PipelineRun, Progress, ResolveOutcome, Resolution,
    Stage, StageStatus, Terminal,
};
pub use stages::{BuildResolver, ContractAuditor, ContractCompiler, ContractGenerator, Stages};
