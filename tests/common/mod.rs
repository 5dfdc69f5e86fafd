/*!
 * Common test utilities for the minasbate test suite
 */

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use minasbate::app_config::Config;
use minasbate::database::models::{Category, QuizQuestionInput, Word};
use minasbate::errors::StoreError;
use minasbate::seed::SeedSource;

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Config whose store and sidecar live in `dir`
pub fn config_in(dir: &Path) -> Config {
    Config {
        data_dir: Some(dir.to_path_buf()),
        backup_dir: Some(dir.join("backups")),
        ..Config::default()
    }
}

pub fn sample_word(id: i64, word: &str, meaning: &str, category: Category) -> Word {
    Word {
        id,
        word: word.to_string(),
        meaning: meaning.to_string(),
        audio_path: String::new(),
        image_path: String::new(),
        category,
    }
}

pub fn sample_question(category: Category, prompt: &str, answer: &str) -> QuizQuestionInput {
    QuizQuestionInput {
        question: prompt.to_string(),
        question_english: format!("{} (English)", prompt),
        image: String::new(),
        audio: None,
        options: vec![
            answer.to_string(),
            "Wala".to_string(),
            "Siguro".to_string(),
            "Ambot".to_string(),
        ],
        correct_answer: answer.to_string(),
        category,
    }
}

/// A seed document in the shape served by the word-list endpoint
pub fn seed_document() -> Value {
    json!({
        "words": [
            { "id": 1, "word": "Maayo", "meaning": "Good", "audio_path": "", "image_path": "", "category": "Greetings" },
            { "id": "2", "word": "Iro", "meaning": "Dog", "audio_path": "", "image_path": "", "category": "Animals" },
            { "id": 3, "word": "Kaon", "meaning": "Eat", "category": "Actions" },
            { "id": 4, "word": "Broken", "meaning": "No category" }
        ]
    })
}

/// Seed source that serves a fixed document and counts fetches
#[derive(Debug, Clone)]
pub struct FakeSeedSource {
    document: Option<Value>,
    calls: Arc<AtomicUsize>,
}

impl FakeSeedSource {
    pub fn serving(document: Value) -> Self {
        Self {
            document: Some(document),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            document: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SeedSource for FakeSeedSource {
    async fn fetch(&self) -> Result<Value, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.document
            .clone()
            .ok_or_else(|| StoreError::TransientFetchFailure("connection refused".to_string()))
    }

    fn describe(&self) -> String {
        "fake".to_string()
    }
}

/// Route library logs to the test harness; safe to call from every test
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
