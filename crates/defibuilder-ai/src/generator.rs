//! Retrieval-augmented contract generator.
//!
//! Retrieves passages relevant to "reference + customization", then asks the
//! model to apply the customization to the reference example. The reply is
//! passed through [`extract_code`] so a fenced answer yields bare Solidity.

use std::sync::Arc;

use defibuilder_core::{GenerationRequest, ReferenceExample, SourceCode, extract_code};
use defibuilder_store::{Passage, VectorIndex};
use tracing::{debug, info};

use crate::{AiError, ChatModel, Prompt, SamplingOptions};

const SYSTEM_MESSAGE: &str = "Your function is to interpret user requests specifically for smart contract development in Solidity. You must generate FULL code exclusively, without any explanatory or conversational text and placeholder comments. Use openzeppelin libraries if neccessary. Do not use SafeMath library and use pragma 0.8.19 everytime.";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorOptions {
    /// Passages retrieved per request.
    pub k: usize,
    pub diversity: bool,
    pub sampling: SamplingOptions,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            k: 5,
            diversity: true,
            sampling: SamplingOptions {
                temperature: 0.2,
                seed: Some(1337),
                json: false,
            },
        }
    }
}

pub struct Generator {
    model: Arc<dyn ChatModel>,
    index: Arc<dyn VectorIndex>,
    options: GeneratorOptions,
}

impl Generator {
    pub fn new(model: Arc<dyn ChatModel>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            model,
            index,
            options: GeneratorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GeneratorOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn generate(
        &self,
        request: &GenerationRequest,
        reference: &ReferenceExample,
    ) -> Result<SourceCode, AiError> {
        let query = format!("{} {}", reference.as_str(), request.customization);
        let passages = self
            .index
            .search(&query, self.options.k, self.options.diversity)
            .await?;
        debug!(
            contract_type = %request.contract_type,
            passages = passages.len(),
            "retrieved context"
        );

        let prompt = build_prompt(reference, &request.customization, &passages);
        let reply = self.model.invoke(&prompt, &self.options.sampling).await?;
        let code = SourceCode::new(extract_code(&reply));

        info!(
            contract_type = %request.contract_type,
            contract = code.contract_name().unwrap_or("<unnamed>"),
            "generated contract"
        );
        Ok(code)
    }
}

fn build_prompt(reference: &ReferenceExample, customization: &str, passages: &[Passage]) -> Prompt {
    let context = passages
        .iter()
        .map(|p| p.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    Prompt::new()
        .system(SYSTEM_MESSAGE)
        .user(format!("Context: {context}"))
        .user(format!(
            "Template example: {} \n\n Request: Based on the provided example apply the following customization \"{customization}\"",
            reference.as_str()
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use async_trait::async_trait;
    use defibuilder_core::ContractType;
    use defibuilder_store::StoreError;
    use std::sync::Mutex;

    struct RecordingModel {
        reply: String,
        seen: Mutex<Vec<(Prompt, SamplingOptions)>>,
    }

    impl RecordingModel {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.into(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for RecordingModel {
        async fn invoke(&self, prompt: &Prompt, options: &SamplingOptions) -> Result<String, AiError> {
            self.seen.lock().unwrap().push((prompt.clone(), *options));
            Ok(self.reply.clone())
        }
    }

    struct FixedIndex {
        passages: Vec<&'static str>,
        queries: Mutex<Vec<(String, usize, bool)>>,
    }

    #[async_trait]
    impl VectorIndex for FixedIndex {
        async fn search(&self, query: &str, k: usize, diversity: bool) -> Result<Vec<Passage>, StoreError> {
            self.queries
                .lock()
                .unwrap()
                .push((query.to_string(), k, diversity));
            Ok(self
                .passages
                .iter()
                .take(k)
                .map(|p| Passage {
                    content: p.to_string(),
                })
                .collect())
        }
    }

    struct DownIndex;

    #[async_trait]
    impl VectorIndex for DownIndex {
        async fn search(&self, _: &str, _: usize, _: bool) -> Result<Vec<Passage>, StoreError> {
            Err(StoreError::Other("connection refused".into()))
        }
    }

    fn reference() -> ReferenceExample {
        ReferenceExample("contract Base {}".into())
    }

    #[tokio::test]
    async fn retrieves_then_prompts_with_context() {
        let model = Arc::new(RecordingModel::new(
            "Sure:\n```solidity\ncontract Out {}\n```\nDone.",
        ));
        let index = Arc::new(FixedIndex {
            passages: vec!["first passage", "second passage"],
            queries: Mutex::new(Vec::new()),
        });
        let generator = Generator::new(model.clone(), index.clone());
        let request = GenerationRequest::new(ContractType::Token, "add a mint function");

        let code = generator.generate(&request, &reference()).await.unwrap();
        assert_eq!(code.as_str(), "contract Out {}");

        let queries = index.queries.lock().unwrap();
        assert_eq!(
            queries[0],
            ("contract Base {} add a mint function".to_string(), 5, true)
        );

        let seen = model.seen.lock().unwrap();
        let (prompt, options) = &seen[0];
        assert_eq!(options.seed, Some(1337));
        assert!((options.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(prompt.messages.len(), 3);
        assert_eq!(prompt.messages[0].role, Role::System);
        assert!(prompt.messages[0].content.contains("pragma 0.8.19"));
        assert_eq!(prompt.messages[1].content, "Context: first passage\nsecond passage");
        assert!(prompt.messages[2].content.starts_with("Template example: contract Base {}"));
        assert!(prompt.messages[2].content.ends_with("\"add a mint function\""));
    }

    #[tokio::test]
    async fn unfenced_reply_is_kept_verbatim() {
        let model = Arc::new(RecordingModel::new("contract Raw {}"));
        let index = Arc::new(FixedIndex {
            passages: vec![],
            queries: Mutex::new(Vec::new()),
        });
        let generator = Generator::new(model, index);
        let request = GenerationRequest::new(ContractType::Vault, "x");
        let code = generator.generate(&request, &reference()).await.unwrap();
        assert_eq!(code.as_str(), "contract Raw {}");
    }

    #[tokio::test]
    async fn retrieval_failure_skips_model() {
        let model = Arc::new(RecordingModel::new("unused"));
        let generator = Generator::new(model.clone(), Arc::new(DownIndex));
        let request = GenerationRequest::new(ContractType::Nft, "x");
        let err = generator.generate(&request, &reference()).await.unwrap_err();
        assert!(matches!(err, AiError::Retrieval(_)));
        assert!(model.seen.lock().unwrap().is_empty());
    }
}
