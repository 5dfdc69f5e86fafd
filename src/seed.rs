/*!
 * First-run seeding.
 *
 * On the very first run the bootstrapper imports a word list from an
 * external seed document plus the compiled-in quiz questions, then sets
 * the initialized flag so seeding never repeats. A seed document that
 * cannot be fetched is not fatal: seeding carries on with no words.
 */

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::database::models::{Category, QuizQuestion, QuizQuestionInput};
use crate::database::Repository;
use crate::errors::StoreError;
use crate::records;
use crate::sidecar::Sidecar;

/// Default seed fetch timeout in seconds
pub const DEFAULT_SEED_TIMEOUT_SECS: u64 = 10;

/// Where the seed document comes from
///
/// Implementations report every failure as `StoreError::TransientFetchFailure`.
#[async_trait]
pub trait SeedSource: Send + Sync + Debug {
    /// Fetch the raw seed document, shaped `{ "words": [...] }`
    async fn fetch(&self) -> Result<Value, StoreError>;

    /// Human-readable location for logs
    fn describe(&self) -> String;
}

/// Seed document served over HTTP
#[derive(Debug, Clone)]
pub struct HttpSeedSource {
    url: Url,
    client: Client,
}

impl HttpSeedSource {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let url = Url::parse(url).with_context(|| format!("Invalid seed URL: {}", url))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { url, client })
    }
}

#[async_trait]
impl SeedSource for HttpSeedSource {
    async fn fetch(&self) -> Result<Value, StoreError> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| StoreError::TransientFetchFailure(format!("{}: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::TransientFetchFailure(format!(
                "{} returned HTTP {}",
                self.url, status
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| StoreError::TransientFetchFailure(format!("{}: {}", self.url, e)))
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }
}

/// Seed document read from the local filesystem
#[derive(Debug, Clone)]
pub struct FileSeedSource {
    path: PathBuf,
}

impl FileSeedSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SeedSource for FileSeedSource {
    async fn fetch(&self) -> Result<Value, StoreError> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            StoreError::TransientFetchFailure(format!("{}: {}", self.path.display(), e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            StoreError::TransientFetchFailure(format!("{}: {}", self.path.display(), e))
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Quiz questions compiled into the application, per category
pub fn builtin_questions() -> BTreeMap<Category, Vec<QuizQuestionInput>> {
    Category::ALL.iter().map(|c| (*c, Vec::new())).collect()
}

/// Outcome of a bootstrap attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// False when the store had already been initialized
    pub performed: bool,
    pub words_added: usize,
    pub questions_added: usize,
    /// Set when the seed document could not be fetched
    pub fetch_failure: Option<String>,
}

/// Runs first-time seeding exactly once per store
#[derive(Debug)]
pub struct Bootstrapper {
    source: Option<Box<dyn SeedSource>>,
    questions: BTreeMap<Category, Vec<QuizQuestionInput>>,
}

impl Bootstrapper {
    /// Create a bootstrapper with the compiled-in questions
    pub fn new(source: Option<Box<dyn SeedSource>>) -> Self {
        Self {
            source,
            questions: builtin_questions(),
        }
    }

    /// Replace the compiled-in questions
    pub fn with_builtin_questions(
        mut self,
        questions: BTreeMap<Category, Vec<QuizQuestionInput>>,
    ) -> Self {
        self.questions = questions;
        self
    }

    /// Seed the store unless the initialized flag is already set
    ///
    /// Fetch failures are logged and reported but never returned as errors.
    /// Store failures are returned and leave the flag unset so the next run
    /// tries again.
    pub async fn run(&self, repository: &Repository, sidecar: &Sidecar) -> Result<SeedReport> {
        if sidecar.is_initialized() {
            debug!("Store already initialized, skipping seed");
            return Ok(SeedReport::default());
        }

        info!("Performing first-time setup");
        let mut report = SeedReport {
            performed: true,
            ..SeedReport::default()
        };

        match self.fetch_document().await {
            Ok(Some(document)) => {
                let source = self.describe_source();
                let words = records::decode_words(document.get("words"), &source);
                if !words.is_empty() {
                    info!("Adding {} seed words from {}", words.len(), source);
                    repository.bulk_add_words(&words).await?;
                    report.words_added = words.len();
                }
            }
            Ok(None) => debug!("No seed source configured, starting with empty word data"),
            Err(e) => {
                warn!("Seed document unavailable, starting with empty word data: {}", e);
                report.fetch_failure = Some(e.to_string());
            }
        }

        let questions = self.numbered_questions(repository)?;
        if !questions.is_empty() {
            info!("Adding {} built-in quiz questions", questions.len());
            repository.bulk_add_quiz_questions(&questions).await?;
            report.questions_added = questions.len();
        }

        sidecar.mark_initialized()?;
        info!("First-time setup complete");
        Ok(report)
    }

    async fn fetch_document(&self) -> Result<Option<Value>, StoreError> {
        match &self.source {
            Some(source) => source.fetch().await.map(Some),
            None => Ok(None),
        }
    }

    fn describe_source(&self) -> String {
        self.source
            .as_ref()
            .map(|s| s.describe())
            .unwrap_or_else(|| "seed".to_string())
    }

    /// Give each built-in question the id `base + index` and its bucket's category
    fn numbered_questions(&self, repository: &Repository) -> Result<Vec<QuizQuestion>> {
        let total: usize = self.questions.values().map(Vec::len).sum();
        if total == 0 {
            return Ok(Vec::new());
        }

        let base = repository.ids().next_block(total)?;
        let questions = self
            .questions
            .iter()
            .flat_map(|(category, inputs)| {
                inputs.iter().map(move |input| {
                    let mut input = input.clone();
                    input.category = *category;
                    input
                })
            })
            .enumerate()
            .map(|(index, input)| QuizQuestion::from_input(base + index as i64, input))
            .collect();
        Ok(questions)
    }
}
