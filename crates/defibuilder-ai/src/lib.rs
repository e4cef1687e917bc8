//! AI layer: OpenAI-compatible chat and embedding clients, and the three
//! model-backed agents of the synthesis pipeline (generator, resolver,
//! auditor) plus their canned offline stand-ins.

mod auditor;
mod canned;
mod chat;
mod embedder;
mod error;
mod generator;
mod resolver;

pub use auditor::Auditor;
pub use canned::{CANNED_BROKEN_SOURCE, CANNED_FIXED_SOURCE, CannedAuditor, CannedGenerator, CannedResolver};
pub use chat::{ChatModel, Message, OpenAiChatClient, Prompt, Role, SamplingOptions};
pub use embedder::{HashingEmbedder, OpenAiEmbedder};
pub use error::AiError;
pub use generator::{Generator, GeneratorOptions};
pub use resolver::Resolver;
