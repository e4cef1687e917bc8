use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use defibuilder_ai::HashingEmbedder;
use defibuilder_compiler::DEFAULT_COMPILER_URL;
use defibuilder_core::{ContractType, Embedder, GenerationRequest};
use defibuilder_pipeline::{Mode, Pipeline, PipelineConfig, ServiceConfig, Terminal};
use defibuilder_store::{Catalog, MemoryIndex, ReferenceStore, VectorIndex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

mod display;
mod export;
mod indexing;

/// Generate, compile, repair, and audit Solidity contracts from templates.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Catalog of reference examples and prompts (defaults to the bundled one)
    #[arg(long, global = true, value_name = "FILE", env = "DEFIBUILDER_CATALOG")]
    catalog: Option<PathBuf>,

    #[command(flatten)]
    services: ServiceArgs,
}

#[derive(Args)]
struct ServiceArgs {
    /// Base URL of an OpenAI-compatible API
    #[arg(long, global = true, env = "DEFIBUILDER_OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    openai_base_url: String,

    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    #[arg(long, global = true, env = "DEFIBUILDER_CHAT_MODEL", default_value = "gpt-4-1106-preview")]
    chat_model: String,

    #[arg(long, global = true, env = "DEFIBUILDER_EMBEDDING_MODEL", default_value = "text-embedding-ada-002")]
    embedding_model: String,

    #[arg(long, global = true, env = "DEFIBUILDER_EMBEDDING_DIM", default_value_t = 1536)]
    embedding_dim: usize,

    /// Embedder used to build and query the vector index
    #[arg(long, global = true, value_enum, env = "DEFIBUILDER_EMBEDDER", default_value_t = EmbedderKind::Openai)]
    embedder: EmbedderKind,

    /// Compilation service endpoint
    #[arg(long, global = true, env = "DEFIBUILDER_COMPILER_URL", default_value = DEFAULT_COMPILER_URL)]
    compiler_url: String,

    #[arg(long, global = true, env = "X_API_KEY", hide_env_values = true)]
    compiler_api_key: Option<String>,

    /// Per-request timeout for every HTTP call, in seconds
    #[arg(long, global = true, env = "DEFIBUILDER_REQUEST_TIMEOUT")]
    timeout_secs: Option<u64>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EmbedderKind {
    /// OpenAI-compatible `/embeddings` endpoint
    Openai,
    /// Local feature hashing, no network
    Hashing,
}

#[derive(Subcommand)]
enum Commands {
    /// List predefined customization prompts
    Templates {
        /// Only prompts for this contract type
        #[arg(long = "type", value_name = "TYPE")]
        contract_type: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Generate a contract, compile it (repairing failures), and audit it
    Run {
        /// Contract type: Token, NFT, Edition, Vault, Marketplace, Exchange
        #[arg(long = "type", value_name = "TYPE")]
        contract_type: String,

        /// Customization to apply to the reference example
        #[arg(long, default_value = "")]
        customization: String,

        /// Use canned generator, resolver, and auditor output
        #[arg(long, env = "DEFIBUILDER_OFFLINE")]
        offline: bool,

        /// Resolve-and-recompile cycles after the first failed compile
        #[arg(long, env = "DEFIBUILDER_MAX_RETRIES", default_value_t = 3)]
        max_retries: usize,

        /// Fail the run when the audit cannot be produced
        #[arg(long)]
        audit_required: bool,

        /// Vector index built by `index` (a .json file, or a Lance directory)
        #[arg(long, value_name = "PATH", env = "DEFIBUILDER_INDEX", default_value = "defibuilder-index.json")]
        index: PathBuf,

        /// Write the contract, ABI, bytecode, audit, and run record here
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// Print the full run as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Embed a passage corpus and write a vector index
    Index {
        /// JSON array of passages (strings or `{"content": ...}` objects)
        #[arg(long, value_name = "FILE")]
        corpus: PathBuf,

        /// Output index path (.json file, or a Lance directory with --lance)
        #[arg(long, value_name = "PATH", default_value = "defibuilder-index.json")]
        out: PathBuf,

        /// Write a LanceDB table instead of a JSON index
        #[arg(long)]
        lance: bool,
    },
}

impl ServiceArgs {
    fn config(&self) -> ServiceConfig {
        ServiceConfig {
            openai_base_url: self.openai_base_url.clone(),
            openai_api_key: self.openai_api_key.clone(),
            chat_model: self.chat_model.clone(),
            embedding_model: self.embedding_model.clone(),
            embedding_dim: self.embedding_dim,
            compiler_url: self.compiler_url.clone(),
            compiler_api_key: self.compiler_api_key.clone(),
            request_timeout_ms: self.timeout_secs.map(|secs| secs.saturating_mul(1000)),
        }
    }

    fn embedder(&self) -> anyhow::Result<Arc<dyn Embedder>> {
        match self.embedder {
            EmbedderKind::Hashing => Ok(Arc::new(HashingEmbedder::default())),
            EmbedderKind::Openai => Ok(self.config().embedder()?),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,lance=warn,lancedb=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("defibuilder v{}", env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Commands::Templates {
            contract_type,
            json,
        } => {
            let catalog = load_catalog(cli.catalog.as_deref())?;
            let filter = contract_type
                .as_deref()
                .map(str::parse::<ContractType>)
                .transpose()?;
            let prompts = catalog
                .prompt_templates(filter)
                .await
                .context("listing prompt templates")?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&prompts)?);
            } else {
                print!("{}", display::render_templates(&prompts));
            }
        }

        Commands::Run {
            contract_type,
            customization,
            offline,
            max_retries,
            audit_required,
            index,
            out,
            json,
        } => {
            // Unknown types are rejected here, before any service is contacted.
            let request = GenerationRequest::parse(contract_type, customization.clone())?;
            let mode = if *offline { Mode::Offline } else { Mode::Live };
            let config = PipelineConfig::default()
                .with_max_retries(*max_retries)
                .with_audit_required(*audit_required)
                .with_mode(mode);

            let catalog = load_catalog(cli.catalog.as_deref())?;
            let vector_index = match mode {
                Mode::Offline => None,
                Mode::Live => Some(open_index(index, cli.services.embedder()?).await?),
            };
            let pipeline = Pipeline::from_config(
                config,
                &cli.services.config(),
                Arc::new(catalog),
                vector_index,
            )?;

            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_ctrl_c.cancel();
                }
            });

            let (tx, mut rx) = mpsc::unbounded_channel();
            let quiet = *json;
            let printer = tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    if !quiet {
                        eprintln!("{}", display::render_event(&event));
                    }
                }
            });

            let run = pipeline.run_with_events(request, tx, cancel).await;
            printer.await.context("event printer task")?;

            if *json {
                println!("{}", serde_json::to_string_pretty(&run)?);
            } else {
                print!("{}", display::render_run(&run));
            }

            if let Some(dir) = out {
                let written = export::write_artifacts(&run, dir)?;
                eprintln!("Wrote {} files to {}", written.len(), dir.display());
            }

            if !run.is_completed() {
                let status = run.terminal.as_ref().map_or("unfinished", Terminal::as_str);
                match run.error() {
                    Some(e) => bail!("run {status}: {e}"),
                    None => bail!("run {status}"),
                }
            }
        }

        Commands::Index { corpus, out, lance } => {
            let passages = indexing::read_corpus(corpus)?;
            let embedder = cli.services.embedder()?;
            let count = if *lance {
                indexing::write_lance(out, embedder, &passages).await?
            } else {
                indexing::write_json(out, embedder, passages).await?
            };
            eprintln!("Indexed {count} passages into {}", out.display());
        }
    }

    Ok(())
}

fn load_catalog(path: Option<&Path>) -> anyhow::Result<Catalog> {
    match path {
        Some(path) => {
            Catalog::open(path).with_context(|| format!("loading catalog {}", path.display()))
        }
        None => Catalog::bundled().context("loading bundled catalog"),
    }
}

async fn open_index(path: &Path, embedder: Arc<dyn Embedder>) -> anyhow::Result<Arc<dyn VectorIndex>> {
    if path.is_dir() {
        return indexing::open_lance(path, embedder).await;
    }
    let index = MemoryIndex::load(path, embedder)
        .with_context(|| format!("loading vector index {} (build one with `defibuilder index`)", path.display()))?;
    Ok(Arc::new(index))
}
