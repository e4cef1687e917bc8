//! Build resolver: asks the model to repair a contract given the compiler's
//! diagnostic.

use std::sync::Arc;

use defibuilder_core::{SourceCode, extract_code};
use tracing::info;

use crate::{AiError, ChatModel, Prompt, SamplingOptions};

const SYSTEM_MESSAGE: &str = "You are a Solidity build resolver. You receive a smart contract and the error the compiler reported for it. Fix the error and return the FULL corrected contract exclusively, without any explanatory or conversational text. Keep every existing feature, use openzeppelin libraries if necessary, do not use the SafeMath library and use pragma 0.8.19.";

pub struct Resolver {
    model: Arc<dyn ChatModel>,
    sampling: SamplingOptions,
}

impl Resolver {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            sampling: SamplingOptions {
                temperature: 0.2,
                seed: Some(1337),
                json: false,
            },
        }
    }

    pub async fn resolve(&self, code: &SourceCode, diagnostic: &str) -> Result<SourceCode, AiError> {
        let prompt = Prompt::new().system(SYSTEM_MESSAGE).user(format!(
            "Compiler error: {diagnostic}\n\nCode:\n```solidity\n{}\n```",
            code.as_str()
        ));
        let reply = self.model.invoke(&prompt, &self.sampling).await?;
        let fixed = SourceCode::new(extract_code(&reply));
        info!(
            before = code.as_str().len(),
            after = fixed.as_str().len(),
            "resolved build error"
        );
        Ok(fixed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct EchoFix {
        prompts: Mutex<Vec<Prompt>>,
    }

    #[async_trait]
    impl ChatModel for EchoFix {
        async fn invoke(&self, prompt: &Prompt, _: &SamplingOptions) -> Result<String, AiError> {
            self.prompts.lock().unwrap().push(prompt.clone());
            Ok("```solidity\ncontract Fixed {}\n```".into())
        }
    }

    struct Failing;

    #[async_trait]
    impl ChatModel for Failing {
        async fn invoke(&self, _: &Prompt, _: &SamplingOptions) -> Result<String, AiError> {
            Err(AiError::Server {
                status: 503,
                body: "overloaded".into(),
            })
        }
    }

    #[tokio::test]
    async fn prompt_carries_code_and_diagnostic() {
        let model = Arc::new(EchoFix {
            prompts: Mutex::new(Vec::new()),
        });
        let resolver = Resolver::new(model.clone());
        let fixed = resolver
            .resolve(&SourceCode::new("contract Broken {"), "ParserError: expected '}'")
            .await
            .unwrap();
        assert_eq!(fixed.as_str(), "contract Fixed {}");

        let prompts = model.prompts.lock().unwrap();
        let user = &prompts[0].messages[1].content;
        assert!(user.contains("ParserError: expected '}'"));
        assert!(user.contains("contract Broken {"));
    }

    #[tokio::test]
    async fn model_failure_propagates() {
        let resolver = Resolver::new(Arc::new(Failing));
        let err = resolver
            .resolve(&SourceCode::new("x"), "y")
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Server { status: 503, .. }));
    }
}
