//! Drives a [`PipelineRun`] through generate → compile → {resolve ⇄ compile}
//! → audit.
//!
//! Every run is strictly sequential. Cancellation is checked before each
//! transition and raced against each in-flight external call, so a cancelled
//! run makes no further calls.

use std::future::Future;
use std::sync::Arc;

use defibuilder_core::{
    BuildResult, ContractType, GenerationRequest, PipelineError, PromptTemplate, Service, SourceCode,
};
use defibuilder_store::{ReferenceStore, VectorIndex};
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::run::{AuditOutcome, PipelineRun, ResolveOutcome, Stage, StageStatus, Terminal};
use crate::{ConfigError, Mode, PipelineConfig, ServiceConfig, Stages};

/// Progress notification emitted while a run executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum RunEvent {
    StageEntered {
        stage: Stage,
    },
    CompileFailed {
        attempt: usize,
        message: String,
        remaining_retries: usize,
    },
    ResolveFailed {
        error: PipelineError,
        remaining_retries: usize,
    },
    Finished {
        terminal: Terminal,
    },
}

pub struct Pipeline {
    config: PipelineConfig,
    store: Arc<dyn ReferenceStore>,
    stages: Stages,
}

impl Pipeline {
    /// Drive `stages` under `config`. In offline mode the generator, resolver,
    /// and auditor are replaced with canned ones whatever was passed in.
    pub fn new(config: PipelineConfig, store: Arc<dyn ReferenceStore>, stages: Stages) -> Self {
        let stages = match config.mode {
            Mode::Live => stages,
            Mode::Offline => stages.into_offline(),
        };
        Self {
            config,
            store,
            stages,
        }
    }

    /// Wire the stages for `config.mode` from `services`. Live mode needs
    /// `index`.
    pub fn from_config(
        config: PipelineConfig,
        services: &ServiceConfig,
        store: Arc<dyn ReferenceStore>,
        index: Option<Arc<dyn VectorIndex>>,
    ) -> Result<Self, ConfigError> {
        let stages = Stages::for_mode(config.mode, services, index)?;
        info!(mode = ?config.mode, max_retries = config.max_retries, "pipeline configured");
        Ok(Self::new(config, store, stages))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Every predefined prompt in the catalog.
    pub async fn list_prompt_templates(&self) -> Result<Vec<PromptTemplate>, PipelineError> {
        self.store
            .prompt_templates(None)
            .await
            .map_err(|e| e.into_pipeline(Service::ReferenceStore))
    }

    pub async fn prompt_templates(
        &self,
        contract_type: ContractType,
    ) -> Result<Vec<PromptTemplate>, PipelineError> {
        self.store
            .prompt_templates(Some(contract_type))
            .await
            .map_err(|e| e.into_pipeline(Service::ReferenceStore))
    }

    pub async fn run(&self, request: GenerationRequest) -> PipelineRun {
        self.execute(request, None, CancellationToken::new()).await
    }

    pub async fn run_cancellable(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> PipelineRun {
        self.execute(request, None, cancel).await
    }

    /// Run while streaming [`RunEvent`]s. A closed receiver does not stop the run.
    pub async fn run_with_events(
        &self,
        request: GenerationRequest,
        events: UnboundedSender<RunEvent>,
        cancel: CancellationToken,
    ) -> PipelineRun {
        self.execute(request, Some(events), cancel).await
    }

    async fn execute(
        &self,
        request: GenerationRequest,
        events: Option<UnboundedSender<RunEvent>>,
        cancel: CancellationToken,
    ) -> PipelineRun {
        let mut driver = Driver {
            pipeline: self,
            run: PipelineRun::new(request, self.config.max_retries),
            events,
            cancel,
        };
        info!(
            run = %driver.run.id,
            contract_type = %driver.run.request.contract_type,
            max_retries = self.config.max_retries,
            "pipeline run started"
        );

        let terminal = match driver.drive().await {
            Ok(()) => Terminal::Completed,
            Err(terminal) => terminal,
        };
        driver.finish(terminal)
    }
}

struct Driver<'a> {
    pipeline: &'a Pipeline,
    run: PipelineRun,
    events: Option<UnboundedSender<RunEvent>>,
    cancel: CancellationToken,
}

impl Driver<'_> {
    fn id(&self) -> Uuid {
        self.run.id
    }

    fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    fn enter(&mut self, stage: Stage) {
        debug!(run = %self.id(), ?stage, "entering stage");
        self.run.stage = stage;
        self.emit(RunEvent::StageEntered { stage });
    }

    fn checkpoint(&self) -> Result<(), Terminal> {
        if self.cancel.is_cancelled() {
            return Err(Terminal::Cancelled);
        }
        Ok(())
    }

    /// Await `fut` unless the run is cancelled first.
    async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, Terminal> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Terminal::Cancelled),
            out = fut => Ok(out),
        }
    }

    async fn drive(&mut self) -> Result<(), Terminal> {
        let code = self.generate().await?;
        let build = self.compile_until_built(code).await?;
        self.audit(&build.code).await
    }

    async fn generate(&mut self) -> Result<SourceCode, Terminal> {
        self.checkpoint()?;
        self.enter(Stage::Generating);
        self.run.progress.generation = StageStatus::InProgress;

        let pipeline = self.pipeline;
        let request = self.run.request.clone();
        let outcome = match self.guard(pipeline.store.lookup(request.contract_type)).await? {
            Ok(reference) => {
                self.checkpoint()?;
                self.guard(pipeline.stages.generator.generate(&request, &reference))
                    .await?
            }
            Err(e) => Err(e.into_pipeline(Service::ReferenceStore)),
        };

        match outcome {
            Ok(code) => {
                self.run.progress.generation = StageStatus::Succeeded;
                self.run.generated = Some(code.clone());
                info!(run = %self.id(), chars = code.as_str().len(), "generation succeeded");
                Ok(code)
            }
            Err(e) => {
                self.run.progress.generation = StageStatus::Failed;
                warn!(run = %self.id(), error = %e, "generation failed");
                Err(Terminal::FailedGeneration(e))
            }
        }
    }

    async fn compile_until_built(&mut self, mut code: SourceCode) -> Result<BuildResult, Terminal> {
        let pipeline = self.pipeline;
        let budget = pipeline.config.max_retries;
        self.run.progress.compilation = StageStatus::InProgress;

        loop {
            self.checkpoint()?;
            self.enter(Stage::Compiling);
            let result = self.guard(pipeline.stages.compiler.compile(&code)).await?;
            let attempt = self.run.record_attempt(result.clone());
            if result.success {
                self.run.progress.compilation = StageStatus::Succeeded;
                info!(run = %self.id(), attempt, "compilation succeeded");
                return Ok(result);
            }

            let diagnostic = result.message;
            let remaining = budget.saturating_sub(self.run.retries_used());
            warn!(run = %self.id(), attempt, remaining, message = %diagnostic, "compilation failed");
            self.emit(RunEvent::CompileFailed {
                attempt,
                message: diagnostic.clone(),
                remaining_retries: remaining,
            });

            // Resolve until a patch is produced or the budget runs out.
            loop {
                if self.run.retries_used() >= budget {
                    self.run.progress.compilation = StageStatus::Failed;
                    let attempts = self.run.attempts.len();
                    warn!(run = %self.id(), attempts, "retry budget exhausted");
                    return Err(Terminal::FailedCompilation(
                        PipelineError::RetryBudgetExhausted {
                            attempts,
                            last_message: diagnostic,
                        },
                    ));
                }

                self.checkpoint()?;
                self.enter(Stage::Resolving);
                let outcome = self
                    .guard(pipeline.stages.resolver.resolve(&code, &diagnostic))
                    .await?;
                match outcome {
                    Ok(patched) => {
                        self.run
                            .record_resolution(diagnostic.clone(), ResolveOutcome::Patched(patched.clone()));
                        debug!(run = %self.id(), retries_used = self.run.retries_used(), "patch received");
                        code = patched;
                        break;
                    }
                    Err(e) => {
                        self.run
                            .record_resolution(diagnostic.clone(), ResolveOutcome::Failed(e.clone()));
                        let remaining = budget.saturating_sub(self.run.retries_used());
                        warn!(run = %self.id(), remaining, error = %e, "resolve failed");
                        self.emit(RunEvent::ResolveFailed {
                            error: e,
                            remaining_retries: remaining,
                        });
                    }
                }
            }
        }
    }

    async fn audit(&mut self, code: &SourceCode) -> Result<(), Terminal> {
        self.checkpoint()?;
        self.enter(Stage::Auditing);
        self.run.progress.audit = StageStatus::InProgress;

        let pipeline = self.pipeline;
        match self.guard(pipeline.stages.auditor.audit(code)).await? {
            Ok(findings) => {
                self.run.progress.audit = StageStatus::Succeeded;
                info!(run = %self.id(), findings = findings.len(), "audit succeeded");
                self.run.audit = AuditOutcome::Findings(findings);
                Ok(())
            }
            Err(e) => {
                self.run.progress.audit = StageStatus::Failed;
                self.run.audit = AuditOutcome::Unavailable(e.clone());
                if pipeline.config.audit_required {
                    warn!(run = %self.id(), error = %e, "audit failed");
                    Err(Terminal::FailedAudit(e))
                } else {
                    warn!(run = %self.id(), error = %e, "audit unavailable, completing without findings");
                    Ok(())
                }
            }
        }
    }

    fn finish(mut self, terminal: Terminal) -> PipelineRun {
        self.run.finish(terminal.clone());
        if let Err(violation) = self.run.check_invariants() {
            error!(run = %self.id(), %violation, "pipeline run is inconsistent");
        }
        info!(
            run = %self.id(),
            terminal = %terminal,
            attempts = self.run.attempts.len(),
            resolutions = self.run.resolutions.len(),
            "pipeline run finished"
        );
        self.emit(RunEvent::Finished { terminal });
        self.run
    }
}
