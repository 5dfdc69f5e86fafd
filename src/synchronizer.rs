/*!
 * Application state synchronizer.
 *
 * This module keeps an in-memory mirror of the store for presentation:
 * - Full reloads on start, after a restore and after a clear
 * - Minimal patches after every other mutation, built from the records the
 *   repository returns
 * - Activity progress, persisted to the sidecar whenever it changes
 */

use anyhow::Result;
use log::{debug, error, info, warn};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::activities::{self, Activity};
use crate::backup::{self, BackupDocument};
use crate::database::models::{
    Category, Collection, QuizQuestion, QuizQuestionInput, StoreSnapshot, UserProfile, Word,
    WordInput,
};
use crate::database::Repository;
use crate::errors::StoreError;
use crate::seed::{Bootstrapper, SeedReport};
use crate::sidecar::Sidecar;

/// In-memory mirror of the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub profile: UserProfile,
    pub words: Vec<Word>,
    pub archived_words: Vec<Word>,
    /// Every category has a bucket, possibly empty
    pub quiz_questions: BTreeMap<Category, Vec<QuizQuestion>>,
    pub activities: Vec<Activity>,
}

impl AppState {
    fn empty(profile: UserProfile) -> Self {
        Self {
            profile,
            words: Vec::new(),
            archived_words: Vec::new(),
            quiz_questions: Category::ALL.iter().map(|c| (*c, Vec::new())).collect(),
            activities: activities::catalogue(),
        }
    }

    /// Questions of one category
    pub fn questions_in(&self, category: Category) -> &[QuizQuestion] {
        self.quiz_questions
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Activity of one category
    pub fn activity(&self, category: Category) -> Option<&Activity> {
        self.activities.iter().find(|a| a.id == category)
    }

    /// Active words of one category
    pub fn words_in(&self, category: Category) -> Vec<&Word> {
        self.words.iter().filter(|w| w.category == category).collect()
    }
}

/// Dictionary search hits
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    pub words: Vec<Word>,
    pub quiz_questions: Vec<QuizQuestion>,
}

/// Keeps the mirror aligned with the repository
pub struct Synchronizer {
    /// Repository for database operations
    repo: Repository,
    sidecar: Sidecar,
    bootstrapper: Bootstrapper,
    /// Profile shown when none has been saved
    default_profile: UserProfile,
    state: AppState,
}

impl Synchronizer {
    /// Create a synchronizer with an empty mirror; call `load_app_data` next
    pub fn new(repo: Repository, sidecar: Sidecar, bootstrapper: Bootstrapper) -> Self {
        let default_profile = UserProfile::default();
        Self {
            repo,
            sidecar,
            bootstrapper,
            state: AppState::empty(default_profile.clone()),
            default_profile,
        }
    }

    /// Create a synchronizer over an in-memory store with no seed source (for testing)
    pub fn new_in_memory() -> Result<Self> {
        Ok(Self::new(
            Repository::new_in_memory()?,
            Sidecar::in_memory(),
            Bootstrapper::new(None),
        ))
    }

    /// Use a different default profile for stores without one
    pub fn with_default_profile(mut self, profile: UserProfile) -> Self {
        if self.state.profile == self.default_profile {
            self.state.profile = profile.clone();
        }
        self.default_profile = profile;
        self
    }

    /// Current mirror
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get the underlying repository
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn sidecar(&self) -> &Sidecar {
        &self.sidecar
    }

    /// Close the store; the mirror stays readable
    pub fn close(&self) -> Result<()> {
        self.repo.close()
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Seed on first run, then load everything into the mirror
    pub async fn load_app_data(&mut self) -> Result<SeedReport> {
        info!("Loading app data");
        let report = self.bootstrapper.run(&self.repo, &self.sidecar).await?;
        self.reload().await?;
        Ok(report)
    }

    /// Replace the whole mirror with fresh store contents
    pub async fn reload(&mut self) -> Result<()> {
        let snapshot = self.repo.snapshot().await?;
        self.state = self.mirror_of(snapshot);

        info!(
            "Loaded {} words, {} archived words, {} quiz questions",
            self.state.words.len(),
            self.state.archived_words.len(),
            self.state.quiz_questions.values().map(Vec::len).sum::<usize>()
        );
        Ok(())
    }

    fn mirror_of(&self, snapshot: StoreSnapshot) -> AppState {
        let mut state = AppState::empty(
            snapshot
                .profile
                .unwrap_or_else(|| self.default_profile.clone()),
        );
        state.words = snapshot.words;
        state.archived_words = snapshot.archived_words;
        for question in snapshot.quiz_questions {
            state
                .quiz_questions
                .entry(question.category)
                .or_default()
                .push(question);
        }
        activities::apply_progress(&mut state.activities, &self.sidecar.progress());
        state
    }

    // =========================================================================
    // Words
    // =========================================================================

    pub async fn add_word(&mut self, input: WordInput) -> Result<Word> {
        let word = self.repo.add_word(input).await?;
        splice(&mut self.state.words, word.clone(), |w| w.id);
        Ok(word)
    }

    pub async fn update_word(&mut self, word: Word) -> Result<()> {
        self.repo.update_word(&word).await?;
        splice(&mut self.state.words, word, |w| w.id);
        Ok(())
    }

    /// Archive words; returns the records that actually moved
    pub async fn archive_words(&mut self, ids: &[i64]) -> Result<Vec<Word>> {
        let moved = self.repo.archive_words(ids).await?;
        let moved_ids: HashSet<i64> = moved.iter().map(|w| w.id).collect();

        self.state.words.retain(|w| !moved_ids.contains(&w.id));
        self.state.archived_words.extend(moved.iter().cloned());
        Ok(moved)
    }

    /// Unarchive words; returns the records that actually moved
    pub async fn unarchive_words(&mut self, ids: &[i64]) -> Result<Vec<Word>> {
        let moved = self.repo.unarchive_words(ids).await?;
        let moved_ids: HashSet<i64> = moved.iter().map(|w| w.id).collect();

        self.state.archived_words.retain(|w| !moved_ids.contains(&w.id));
        self.state.words.extend(moved.iter().cloned());
        Ok(moved)
    }

    /// Permanently delete active words; callers confirm first
    pub async fn delete_words(&mut self, ids: &[i64]) -> Result<()> {
        self.repo.delete_words(ids).await?;
        let ids: HashSet<i64> = ids.iter().copied().collect();
        self.state.words.retain(|w| !ids.contains(&w.id));
        Ok(())
    }

    /// Active words of one category
    pub fn words_in_category(&self, category: Category) -> Vec<&Word> {
        self.state.words_in(category)
    }

    // =========================================================================
    // Quiz Questions
    // =========================================================================

    /// Add a question to a category's bucket; the bucket's category wins
    pub async fn add_quiz_question(
        &mut self,
        category: Category,
        mut input: QuizQuestionInput,
    ) -> Result<QuizQuestion> {
        input.category = category;
        let question = self.repo.add_quiz_question(input).await?;

        self.state
            .quiz_questions
            .entry(category)
            .or_default()
            .push(question.clone());
        Ok(question)
    }

    /// Update a question in a category's bucket; the bucket's category wins
    pub async fn update_quiz_question(
        &mut self,
        category: Category,
        mut question: QuizQuestion,
    ) -> Result<()> {
        question.category = category;
        self.repo.update_quiz_question(&question).await?;

        for (bucket, questions) in self.state.quiz_questions.iter_mut() {
            if *bucket != category {
                questions.retain(|q| q.id != question.id);
            }
        }
        splice(
            self.state.quiz_questions.entry(category).or_default(),
            question,
            |q| q.id,
        );
        Ok(())
    }

    /// Delete questions from every category; callers confirm first
    pub async fn delete_quiz_questions(&mut self, ids: &[i64]) -> Result<()> {
        self.repo.delete_quiz_questions(ids).await?;
        let ids: HashSet<i64> = ids.iter().copied().collect();
        for questions in self.state.quiz_questions.values_mut() {
            questions.retain(|q| !ids.contains(&q.id));
        }
        Ok(())
    }

    // =========================================================================
    // Profile
    // =========================================================================

    pub async fn save_profile(&mut self, profile: UserProfile) -> Result<()> {
        self.repo.save_profile(&profile).await?;
        self.state.profile = profile;
        Ok(())
    }

    // =========================================================================
    // Progress
    // =========================================================================

    /// Credit one correct answer; returns the category's new progress
    pub fn record_correct_answer(&mut self, category: Category) -> Result<u8> {
        let count = self.state.questions_in(category).len();
        let current = self.state.activity(category).map(|a| a.progress).unwrap_or(0);
        if count == 0 {
            debug!("No questions in {}, progress unchanged", category);
            return Ok(current);
        }

        let next = activities::advance(current, count);
        self.set_progress(&[category], next)?;
        Ok(next)
    }

    /// Check an answer and credit the category when it is correct
    pub fn answer_question(
        &mut self,
        category: Category,
        question_id: i64,
        answer: &str,
    ) -> Result<bool> {
        let correct = self
            .state
            .questions_in(category)
            .iter()
            .find(|q| q.id == question_id)
            .map(|q| q.is_correct(answer))
            .ok_or_else(|| StoreError::NotFound {
                collection: Collection::QuizQuestions,
                id: question_id,
            })?;

        if correct {
            self.record_correct_answer(category)?;
        }
        Ok(correct)
    }

    /// Set the listed activities back to zero
    pub fn reset_progress(&mut self, categories: &[Category]) -> Result<()> {
        warn!("Resetting progress for {:?}", categories);
        self.set_progress(categories, 0)
    }

    fn set_progress(&mut self, categories: &[Category], value: u8) -> Result<()> {
        let mut changed = false;
        for activity in self.state.activities.iter_mut() {
            if categories.contains(&activity.id) && activity.progress != value {
                activity.progress = value;
                changed = true;
            }
        }

        if changed {
            self.sidecar
                .set_progress(&activities::progress_of(&self.state.activities))?;
        }
        Ok(())
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Case-insensitive search over active words and all quiz questions
    pub fn search(&self, term: &str) -> SearchResults {
        let term = term.trim();
        if term.is_empty() {
            return SearchResults::default();
        }

        SearchResults {
            words: self
                .state
                .words
                .iter()
                .filter(|w| w.matches(term))
                .cloned()
                .collect(),
            quiz_questions: self
                .state
                .quiz_questions
                .values()
                .flatten()
                .filter(|q| q.matches(term))
                .cloned()
                .collect(),
        }
    }

    // =========================================================================
    // Backup, Restore and Clear
    // =========================================================================

    /// Build a backup from one consistent snapshot; read-only
    pub async fn create_backup(&self) -> Result<BackupDocument> {
        backup::create_backup(&self.repo, &self.sidecar).await
    }

    /// Build a backup and write it into `dir`
    pub async fn write_backup_file<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let document = self.create_backup().await?;
        backup::write_backup_file(&document, dir)
    }

    /// Replace all data with a backup file's content, then reload
    ///
    /// Destructive: callers confirm first. A document without `data` fails
    /// with `CorruptBackup` before anything is modified. The initialized
    /// flag is left alone.
    ///
    /// The mirror is reloaded even when the restore fails part way, so it
    /// always matches whatever the store and sidecar now hold.
    pub async fn restore_backup(&mut self, content: &str) -> Result<()> {
        warn!("Restoring backup");
        let document = BackupDocument::parse(content).map_err(|e| {
            error!("Rejected backup: {}", e);
            e
        })?;

        let restored = backup::restore_backup(&self.repo, &self.sidecar, document).await;
        let reloaded = self.reload().await;

        match (restored, reloaded) {
            (Ok(()), reloaded) => reloaded?,
            (Err(e), Ok(())) => {
                error!("Restore failed: {:#}", e);
                return Err(e);
            }
            (Err(e), Err(reload_err)) => {
                error!("Restore failed: {:#}; reload also failed: {:#}", e, reload_err);
                return Err(e);
            }
        }

        info!("Restore complete");
        Ok(())
    }

    /// Remove every record and all progress; callers confirm first
    ///
    /// Progress goes first. If the store then fails to clear, the error is
    /// `PartialClearFailure` and the store may still hold data.
    pub async fn clear_all_data(&mut self) -> Result<()> {
        warn!("Clearing all app data");
        self.sidecar.clear_progress()?;

        if let Err(e) = self.repo.clear_all().await {
            error!("Store clear failed after progress was cleared: {:#}", e);
            activities::apply_progress(&mut self.state.activities, &activities::Progress::new());
            return Err(StoreError::PartialClearFailure(format!(
                "progress was cleared but the store was not: {:#}",
                e
            ))
            .into());
        }

        self.state = AppState::empty(self.default_profile.clone());
        warn!("All app data has been cleared");
        Ok(())
    }
}

/// Replace the element with the same key, or append it
fn splice<T, F>(items: &mut Vec<T>, item: T, key: F)
where
    F: Fn(&T) -> i64,
{
    let id = key(&item);
    match items.iter().position(|existing| key(existing) == id) {
        Some(index) => items[index] = item,
        None => items.push(item),
    }
}
