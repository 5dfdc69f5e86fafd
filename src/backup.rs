/*!
 * Backup document format.
 *
 * A backup captures every collection plus activity progress in one
 * versioned JSON document. Restoring validates the whole document before
 * anything is touched; a document without a `data` object is rejected
 * with `StoreError::CorruptBackup` and the store is left as it was.
 */

use anyhow::{Context, Result};
use chrono::{NaiveDate, SecondsFormat, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::activities::{self, Progress};
use crate::database::models::{QuizQuestion, StoreSnapshot, UserProfile, Word};
use crate::database::Repository;
use crate::errors::StoreError;
use crate::records;
use crate::sidecar::Sidecar;

/// Version written into new backups
pub const BACKUP_VERSION: u32 = 1;

/// Prefix of backup file names
pub const BACKUP_FILE_PREFIX: &str = "minasbate-backup";

/// Complete backup of the store and its sidecar progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub version: u32,
    /// ISO-8601 UTC timestamp
    pub created_at: String,
    pub data: BackupData,
}

/// Payload of a backup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupData {
    pub profile: Option<UserProfile>,
    pub words: Vec<Word>,
    pub archived_words: Vec<Word>,
    pub quiz_questions: Vec<QuizQuestion>,
    pub progress: Progress,
}

impl BackupDocument {
    /// Wrap a snapshot and progress map with the current version and time
    pub fn new(snapshot: StoreSnapshot, progress: Progress) -> Self {
        Self {
            version: BACKUP_VERSION,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            data: BackupData {
                profile: snapshot.profile,
                words: snapshot.words,
                archived_words: snapshot.archived_words,
                quiz_questions: snapshot.quiz_questions,
                progress,
            },
        }
    }

    /// Parse and validate a backup file's content
    ///
    /// Structural problems (not JSON, no `data` object) fail with
    /// `CorruptBackup`. Individual malformed records are skipped.
    pub fn parse(content: &str) -> Result<Self, StoreError> {
        let root: Value = serde_json::from_str(content)
            .map_err(|e| StoreError::CorruptBackup(format!("not valid JSON: {}", e)))?;

        let data = root
            .get("data")
            .and_then(Value::as_object)
            .ok_or_else(|| StoreError::CorruptBackup("missing 'data' object".to_string()))?;

        let version = root
            .get("version")
            .and_then(Value::as_u64)
            .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
            .unwrap_or(BACKUP_VERSION);
        if version > BACKUP_VERSION {
            warn!(
                "Backup version {} is newer than supported version {}, reading known fields",
                version, BACKUP_VERSION
            );
        }

        let created_at = root
            .get("createdAt")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let source = "backup";
        let words = records::decode_words(data.get("words"), source);
        let active: HashSet<i64> = words.iter().map(|w| w.id).collect();
        let archived_words = records::decode_words(data.get("archivedWords"), source)
            .into_iter()
            .filter(|w| {
                let keep = !active.contains(&w.id);
                if !keep {
                    warn!("Dropping archived word {} that is also active", w.id);
                }
                keep
            })
            .collect();

        Ok(Self {
            version,
            created_at,
            data: BackupData {
                profile: records::decode_profile(data.get("profile"), source),
                words,
                archived_words,
                quiz_questions: records::decode_questions(data.get("quizQuestions"), source),
                progress: data
                    .get("progress")
                    .map(activities::progress_from_value)
                    .unwrap_or_default(),
            },
        })
    }

    /// Pretty-printed JSON
    pub fn to_pretty_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to encode backup")
    }

    /// Split into the store contents and the progress map
    pub fn into_parts(self) -> (StoreSnapshot, Progress) {
        let data = self.data;
        (
            StoreSnapshot {
                profile: data.profile,
                words: data.words,
                archived_words: data.archived_words,
                quiz_questions: data.quiz_questions,
            },
            data.progress,
        )
    }
}

/// Backup file name for a given day: `minasbate-backup-YYYY-MM-DD.json`
pub fn backup_file_name(date: NaiveDate) -> String {
    format!("{}-{}.json", BACKUP_FILE_PREFIX, date.format("%Y-%m-%d"))
}

/// Read a consistent snapshot of the store plus stored progress
pub async fn create_backup(repository: &Repository, sidecar: &Sidecar) -> Result<BackupDocument> {
    let snapshot = repository.snapshot().await?;
    let document = BackupDocument::new(snapshot, sidecar.progress());

    info!(
        "Created backup with {} words, {} archived words, {} quiz questions",
        document.data.words.len(),
        document.data.archived_words.len(),
        document.data.quiz_questions.len()
    );
    Ok(document)
}

/// Replace the store and stored progress with a backup's contents
///
/// The structured store is replaced in one transaction. Progress is written
/// only after that succeeds.
pub async fn restore_backup(
    repository: &Repository,
    sidecar: &Sidecar,
    document: BackupDocument,
) -> Result<()> {
    let (snapshot, progress) = document.into_parts();

    repository.restore_snapshot(snapshot).await?;
    sidecar
        .set_progress(&progress)
        .context("Store restored but progress could not be written")?;

    info!("Restored backup ({} activities with progress)", progress.len());
    Ok(())
}

/// Write a backup into `dir` under today's file name and return its path
pub fn write_backup_file<P: AsRef<Path>>(document: &BackupDocument, dir: P) -> Result<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).with_context(|| format!("Failed to create backup directory: {:?}", dir))?;

    let path = dir.join(backup_file_name(Utc::now().date_naive()));
    fs::write(&path, document.to_pretty_json()?)
        .with_context(|| format!("Failed to write backup: {:?}", path))?;

    info!("Backup written to {:?}", path);
    Ok(path)
}
