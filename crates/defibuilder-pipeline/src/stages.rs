//! Async seams for the four pipeline stages and their wiring to the concrete
//! AI and compiler clients.

use std::sync::Arc;

use async_trait::async_trait;
use defibuilder_ai::{
    Auditor, CannedAuditor, CannedGenerator, CannedResolver, Generator, OpenAiChatClient, Resolver,
};
use defibuilder_compiler::HttpCompiler;
use defibuilder_core::{
    BuildResult, GenerationRequest, PipelineError, ReferenceExample, Service, SourceCode,
    Vulnerability,
};
use defibuilder_store::VectorIndex;

use crate::{ConfigError, Mode, ServiceConfig};

#[async_trait]
pub trait ContractGenerator: Send + Sync {
    async fn generate(
        &self,
        request: &GenerationRequest,
        reference: &ReferenceExample,
    ) -> Result<SourceCode, PipelineError>;
}

/// Compilation never fails as a call; every problem is a failed [`BuildResult`].
#[async_trait]
pub trait ContractCompiler: Send + Sync {
    async fn compile(&self, code: &SourceCode) -> BuildResult;
}

#[async_trait]
pub trait BuildResolver: Send + Sync {
    async fn resolve(&self, code: &SourceCode, diagnostic: &str) -> Result<SourceCode, PipelineError>;
}

#[async_trait]
pub trait ContractAuditor: Send + Sync {
    async fn audit(&self, code: &SourceCode) -> Result<Vec<Vulnerability>, PipelineError>;
}

#[async_trait]
impl ContractGenerator for Generator {
    async fn generate(
        &self,
        request: &GenerationRequest,
        reference: &ReferenceExample,
    ) -> Result<SourceCode, PipelineError> {
        Generator::generate(self, request, reference)
            .await
            .map_err(|e| e.into_pipeline(Service::Model))
    }
}

#[async_trait]
impl ContractGenerator for CannedGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
        reference: &ReferenceExample,
    ) -> Result<SourceCode, PipelineError> {
        Ok(CannedGenerator::generate(self, request, reference).await)
    }
}

#[async_trait]
impl ContractCompiler for HttpCompiler {
    async fn compile(&self, code: &SourceCode) -> BuildResult {
        HttpCompiler::compile(self, code).await
    }
}

#[async_trait]
impl BuildResolver for Resolver {
    async fn resolve(&self, code: &SourceCode, diagnostic: &str) -> Result<SourceCode, PipelineError> {
        Resolver::resolve(self, code, diagnostic)
            .await
            .map_err(|e| e.into_pipeline(Service::Model))
    }
}

#[async_trait]
impl BuildResolver for CannedResolver {
    async fn resolve(&self, code: &SourceCode, diagnostic: &str) -> Result<SourceCode, PipelineError> {
        Ok(CannedResolver::resolve(self, code, diagnostic).await)
    }
}

#[async_trait]
impl ContractAuditor for Auditor {
    async fn audit(&self, code: &SourceCode) -> Result<Vec<Vulnerability>, PipelineError> {
        Auditor::audit(self, code)
            .await
            .map_err(|e| e.into_pipeline(Service::Model))
    }
}

#[async_trait]
impl ContractAuditor for CannedAuditor {
    async fn audit(&self, code: &SourceCode) -> Result<Vec<Vulnerability>, PipelineError> {
        Ok(CannedAuditor::audit(self, code).await)
    }
}

/// The four stage implementations a [`Pipeline`](crate::Pipeline) drives.
#[derive(Clone)]
pub struct Stages {
    pub generator: Arc<dyn ContractGenerator>,
    pub compiler: Arc<dyn ContractCompiler>,
    pub resolver: Arc<dyn BuildResolver>,
    pub auditor: Arc<dyn ContractAuditor>,
}

impl Stages {
    /// Wire stages for `mode`. Live mode retrieves context from `index`;
    /// offline mode ignores it.
    pub fn for_mode(
        mode: Mode,
        services: &ServiceConfig,
        index: Option<Arc<dyn VectorIndex>>,
    ) -> Result<Self, ConfigError> {
        match (mode, index) {
            (Mode::Offline, _) => Self::offline(services),
            (Mode::Live, Some(index)) => Self::live(services, index),
            (Mode::Live, None) => Err(ConfigError::MissingIndex),
        }
    }

    pub fn live(services: &ServiceConfig, index: Arc<dyn VectorIndex>) -> Result<Self, ConfigError> {
        let mut chat = OpenAiChatClient::new(
            &services.openai_base_url,
            services.openai_api_key.clone(),
            &services.chat_model,
        );
        if let Some(timeout) = services.request_timeout() {
            chat = chat
                .with_timeout(timeout)
                .map_err(|e| ConfigError::client(Service::Model, e))?;
        }
        let chat = Arc::new(chat);

        Ok(Self {
            generator: Arc::new(Generator::new(chat.clone(), index)),
            compiler: Arc::new(compiler(services)?),
            resolver: Arc::new(Resolver::new(chat.clone())),
            auditor: Arc::new(Auditor::new(chat)),
        })
    }

    pub fn offline(services: &ServiceConfig) -> Result<Self, ConfigError> {
        Ok(Self::canned_with(Arc::new(compiler(services)?)))
    }

    /// Replace the model-backed stages with canned ones, keeping the compiler.
    pub fn into_offline(self) -> Self {
        Self::canned_with(self.compiler)
    }

    fn canned_with(compiler: Arc<dyn ContractCompiler>) -> Self {
        Self {
            generator: Arc::new(CannedGenerator),
            compiler,
            resolver: Arc::new(CannedResolver),
            auditor: Arc::new(CannedAuditor),
        }
    }
}

fn compiler(services: &ServiceConfig) -> Result<HttpCompiler, ConfigError> {
    let compiler = HttpCompiler::new(&services.compiler_url, services.compiler_api_key.clone());
    match services.request_timeout() {
        Some(timeout) => compiler
            .with_timeout(timeout)
            .map_err(|e| ConfigError::client(Service::Compiler, e)),
        None => Ok(compiler),
    }
}
