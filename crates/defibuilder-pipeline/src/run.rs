//! State of one pipeline execution.
//!
//! A [`PipelineRun`] records the current stage, per-stage progress, every
//! compile attempt and resolve call, the audit outcome, and the terminal
//! status. Only the orchestrator mutates it; callers get it back finished.

use chrono::{DateTime, Utc};
use defibuilder_core::{BuildArtifact, BuildResult, GenerationRequest, PipelineError, SourceCode, Vulnerability};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Idle,
    Generating,
    Compiling,
    Resolving,
    Auditing,
    Completed,
    Failed,
    Cancelled,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageStatus {
    #[default]
    NotStarted,
    InProgress,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub generation: StageStatus,
    pub compilation: StageStatus,
    pub audit: StageStatus,
}

/// Audit result. `Unavailable` (the auditor failed) is distinct from
/// `Findings(vec![])` (the auditor found nothing).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "kebab-case")]
pub enum AuditOutcome {
    #[default]
    NotRun,
    Unavailable(PipelineError),
    Findings(Vec<Vulnerability>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "kebab-case")]
pub enum Terminal {
    Completed,
    FailedGeneration(PipelineError),
    FailedCompilation(PipelineError),
    FailedAudit(PipelineError),
    Cancelled,
}

impl Terminal {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Completed => Stage::Completed,
            Self::Cancelled => Stage::Cancelled,
            _ => Stage::Failed,
        }
    }

    pub fn error(&self) -> Option<&PipelineError> {
        match self {
            Self::FailedGeneration(e) | Self::FailedCompilation(e) | Self::FailedAudit(e) => Some(e),
            Self::Completed | Self::Cancelled => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::FailedGeneration(_) => "failed-generation",
            Self::FailedCompilation(_) => "failed-compilation",
            Self::FailedAudit(_) => "failed-audit",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for Terminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One compile call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attempt {
    /// 1-based.
    pub number: usize,
    pub result: BuildResult,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "kebab-case")]
pub enum ResolveOutcome {
    Patched(SourceCode),
    Failed(PipelineError),
}

/// One resolver call. Each consumes a unit of the retry budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub diagnostic: String,
    pub outcome: ResolveOutcome,
    pub at: DateTime<Utc>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("run invariant violated: {0}")]
pub struct InvariantViolation(pub String);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineRun {
    pub id: Uuid,
    pub request: GenerationRequest,
    pub max_retries: usize,
    pub stage: Stage,
    pub progress: Progress,
    /// Generator output before any resolve.
    pub generated: Option<SourceCode>,
    pub attempts: Vec<Attempt>,
    pub resolutions: Vec<Resolution>,
    pub audit: AuditOutcome,
    pub terminal: Option<Terminal>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub fn new(request: GenerationRequest, max_retries: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            max_retries,
            stage: Stage::Idle,
            progress: Progress::default(),
            generated: None,
            attempts: Vec::new(),
            resolutions: Vec::new(),
            audit: AuditOutcome::NotRun,
            terminal: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.terminal.is_some()
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.terminal, Some(Terminal::Completed))
    }

    pub fn error(&self) -> Option<&PipelineError> {
        self.terminal.as_ref().and_then(Terminal::error)
    }

    /// Resolve calls made so far, successful or not.
    pub fn retries_used(&self) -> usize {
        self.resolutions.len()
    }

    pub fn last_build(&self) -> Option<&BuildResult> {
        self.attempts.last().map(|a| &a.result)
    }

    /// Artifact of the successful build, if compilation succeeded.
    pub fn artifact(&self) -> Option<&BuildArtifact> {
        self.last_build().and_then(BuildResult::artifact)
    }

    /// Most recent source: the last compiled code, else the generator output.
    pub fn code(&self) -> Option<&SourceCode> {
        self.last_build()
            .map(|b| &b.code)
            .or(self.generated.as_ref())
    }

    pub fn findings(&self) -> Option<&[Vulnerability]> {
        match &self.audit {
            AuditOutcome::Findings(f) => Some(f),
            _ => None,
        }
    }

    pub(crate) fn record_attempt(&mut self, result: BuildResult) -> usize {
        let number = self.attempts.len() + 1;
        self.attempts.push(Attempt {
            number,
            result,
            at: Utc::now(),
        });
        number
    }

    pub(crate) fn record_resolution(&mut self, diagnostic: String, outcome: ResolveOutcome) {
        self.resolutions.push(Resolution {
            diagnostic,
            outcome,
            at: Utc::now(),
        });
    }

    /// Close the run. Any stage still in progress is marked failed.
    pub(crate) fn finish(&mut self, terminal: Terminal) {
        for status in [
            &mut self.progress.generation,
            &mut self.progress.compilation,
            &mut self.progress.audit,
        ] {
            if *status == StageStatus::InProgress {
                *status = StageStatus::Failed;
            }
        }
        self.stage = terminal.stage();
        self.terminal = Some(terminal);
        self.finished_at = Some(Utc::now());
    }

    /// Check the structural invariants of the run.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let fail = |msg: String| -> Result<(), InvariantViolation> { Err(InvariantViolation(msg)) };

        if self.attempts.len() > self.max_retries + 1 {
            return fail(format!(
                "{} compile attempts exceed 1 + {} retries",
                self.attempts.len(),
                self.max_retries
            ));
        }
        if self.resolutions.len() > self.max_retries {
            return fail(format!(
                "{} resolve calls exceed budget {}",
                self.resolutions.len(),
                self.max_retries
            ));
        }
        if self.stage.is_terminal() != self.terminal.is_some() {
            return fail(format!("stage {:?} disagrees with terminal {:?}", self.stage, self.terminal));
        }
        if self.terminal.is_some() != self.finished_at.is_some() {
            return fail("finish time recorded without terminal status".into());
        }
        if self.attempts.iter().take(self.attempts.len().saturating_sub(1)).any(|a| a.result.success) {
            return fail("compilation continued after a successful attempt".into());
        }
        let built = self.last_build().is_some_and(|b| b.success);
        if !matches!(self.audit, AuditOutcome::NotRun) && !built {
            return fail("audit ran without a successful build".into());
        }
        if self.is_completed() && !built {
            return fail("completed without a successful build".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use defibuilder_core::{ContractType, Severity};

    fn request() -> GenerationRequest {
        GenerationRequest::new(ContractType::Token, "add a mint function")
    }

    fn ok_build() -> BuildResult {
        BuildResult::succeeded(
            SourceCode::new("contract A {}"),
            "ok",
            BuildArtifact {
                abi: vec![],
                bytecode: "0x00".into(),
            },
        )
    }

    #[test]
    fn new_run_is_idle() {
        let run = PipelineRun::new(request(), 3);
        assert_eq!(run.stage, Stage::Idle);
        assert_eq!(run.progress, Progress::default());
        assert!(!run.is_finished());
        assert!(run.code().is_none());
        run.check_invariants().unwrap();
    }

    #[test]
    fn finish_closes_in_progress_stages() {
        let mut run = PipelineRun::new(request(), 3);
        run.progress.generation = StageStatus::Succeeded;
        run.progress.compilation = StageStatus::InProgress;
        run.finish(Terminal::Cancelled);
        assert_eq!(run.stage, Stage::Cancelled);
        assert_eq!(run.progress.generation, StageStatus::Succeeded);
        assert_eq!(run.progress.compilation, StageStatus::Failed);
        assert!(run.finished_at.is_some());
        run.check_invariants().unwrap();
    }

    #[test]
    fn too_many_attempts_violates_invariant() {
        let mut run = PipelineRun::new(request(), 1);
        for _ in 0..3 {
            run.record_attempt(BuildResult::failed(SourceCode::new("x"), "err"));
        }
        assert!(run.check_invariants().is_err());
    }

    #[test]
    fn completed_requires_successful_build() {
        let mut run = PipelineRun::new(request(), 3);
        run.record_attempt(BuildResult::failed(SourceCode::new("x"), "err"));
        run.finish(Terminal::Completed);
        assert!(run.check_invariants().is_err());

        let mut run = PipelineRun::new(request(), 3);
        run.record_attempt(ok_build());
        run.audit = AuditOutcome::Findings(vec![]);
        run.finish(Terminal::Completed);
        run.check_invariants().unwrap();
        assert!(run.artifact().is_some());
        assert_eq!(run.code().unwrap().as_str(), "contract A {}");
    }

    #[test]
    fn terminal_reports_error_and_stage() {
        let err = PipelineError::SchemaValidation("bad".into());
        let t = Terminal::FailedAudit(err.clone());
        assert_eq!(t.stage(), Stage::Failed);
        assert_eq!(t.error(), Some(&err));
        assert_eq!(t.to_string(), "failed-audit");
        assert_eq!(Terminal::Completed.error(), None);
    }

    #[test]
    fn run_serializes_tri_state_audit() {
        let mut run = PipelineRun::new(request(), 3);
        run.record_attempt(ok_build());
        run.audit = AuditOutcome::Findings(vec![Vulnerability {
            title: "Vulnerability 1".into(),
            description: "Description of vulnerability 1".into(),
            severity: Severity::Medium,
        }]);
        run.finish(Terminal::Completed);

        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["stage"], "completed");
        assert_eq!(json["terminal"]["status"], "completed");
        assert_eq!(json["audit"]["status"], "findings");
        assert_eq!(json["audit"]["detail"][0]["severity"], "Medium");
        assert_eq!(json["progress"]["generation"], "not-started");

        let unavailable = AuditOutcome::Unavailable(PipelineError::SchemaValidation("x".into()));
        let json = serde_json::to_value(&unavailable).unwrap();
        assert_eq!(json["status"], "unavailable");
        assert_eq!(json["detail"]["kind"], "schema-validation");
    }
}
