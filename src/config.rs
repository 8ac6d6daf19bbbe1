//! Process configuration for the review server.
//!
//! Values come from flags, then environment variables (a `.env` file is
//! loaded by the binary before parsing).

use crate::backend::BackoffConfig;
use crate::error::{Result, ReviewError};
use crate::invoker::{ModelInvoker, DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::prompt::PromptVariant;
use crate::service::ReviewService;
use crate::store::{CsvStore, MemoryStore, SubmissionStore};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Where submissions and evaluations are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// Flat CSV files under the data directory.
    Csv,
    /// Process memory; lost on restart.
    Memory,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "review-server", about = "Review analysis API backed by an LLM")]
pub struct Config {
    /// API key for the OpenAI-compatible provider.
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    pub api_key: String,

    #[arg(long, env = "LLM_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(long, env = "LLM_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Directory for the CSV store.
    #[arg(long, env = "DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    #[arg(long, env = "STORE", value_enum, default_value_t = StoreKind::Csv)]
    pub store: StoreKind,

    /// Upper bound on a single model call.
    #[arg(long, env = "ATTEMPT_TIMEOUT_SECS", default_value_t = 30)]
    pub attempt_timeout_secs: u64,

    #[arg(long, env = "MAX_ATTEMPTS", default_value_t = 3)]
    pub max_attempts: u32,

    /// Rating prompt used for submissions (baseline, criteria-based, chain-of-thought or v1-v3).
    #[arg(long, env = "SUBMIT_VARIANT", default_value = "chain-of-thought")]
    pub submit_variant: PromptVariant,
}

impl Config {
    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ReviewError::InvalidConfig(format!("invalid listen address: {}", e)))
    }

    pub fn backoff(&self) -> BackoffConfig {
        BackoffConfig::standard()
            .with_max_attempts(self.max_attempts)
            .with_attempt_timeout(Duration::from_secs(self.attempt_timeout_secs))
    }

    pub fn build_invoker(&self) -> Result<ModelInvoker> {
        if self.api_key.trim().is_empty() {
            return Err(ReviewError::InvalidConfig("GROQ_API_KEY is empty".into()));
        }
        ModelInvoker::builder(self.base_url.clone())
            .model(self.model.clone())
            .openai_with_key(self.api_key.clone())
            .backoff(self.backoff())
            .build()
    }

    pub fn build_store(&self) -> Result<Arc<dyn SubmissionStore>> {
        Ok(match self.store {
            StoreKind::Csv => Arc::new(CsvStore::open(&self.data_dir)?),
            StoreKind::Memory => Arc::new(MemoryStore::new()),
        })
    }

    /// Wire the invoker and store into a service.
    pub fn build_service(&self) -> Result<ReviewService> {
        let invoker = self.build_invoker()?;
        let store = self.build_store()?;
        info!(
            model = %invoker.model(),
            store = store.name(),
            variant = %self.submit_variant,
            "review service configured"
        );
        Ok(ReviewService::new(invoker, store).with_variant(self.submit_variant))
    }
}
