/*!
 * Repository layer for database operations.
 *
 * This module provides a high-level API for every collection, abstracting
 * away the SQL details. Mutations return the records they produced or moved
 * so callers can patch their own state without a follow-up read.
 */

use anyhow::{Context, Result};
use log::{debug, info};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Arc;

use super::connection::{DatabaseConnection, DatabaseStats};
use super::ids::IdGenerator;
use super::models::{
    Category, Collection, QuizQuestion, QuizQuestionInput, StoreSnapshot, UserProfile, Word,
    WordInput,
};
use crate::errors::StoreError;

/// Fixed key of the singleton profile row
pub const PROFILE_KEY: &str = "profile";

const WORD_COLUMNS: &str = "id, word, meaning, audio_path, image_path, category";

const QUESTION_COLUMNS: &str =
    "id, question, question_english, image, audio, options, correct_answer, category";

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
    /// Shared id source
    ids: Arc<IdGenerator>,
}

impl Repository {
    /// Create a new repository with the given database connection
    ///
    /// The id generator is seeded with the largest id already stored.
    pub fn new(db: DatabaseConnection) -> Result<Self> {
        let floor = db.execute(|conn| max_stored_id(conn))?;
        debug!("Repository id floor: {}", floor);

        Ok(Self {
            db,
            ids: Arc::new(IdGenerator::new(floor)),
        })
    }

    /// Create a repository with the default database location
    pub fn new_default() -> Result<Self> {
        Self::new(DatabaseConnection::new_default()?)
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        Self::new(DatabaseConnection::new_in_memory()?)
    }

    /// Underlying connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Id source shared with bulk producers such as the seed loader
    pub fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    /// Close the store; every later call fails with `StoreUnavailable`
    pub fn close(&self) -> Result<()> {
        self.db.close()
    }

    /// Record counts and file size
    pub fn stats(&self) -> Result<DatabaseStats> {
        self.db.stats()
    }

    // =========================================================================
    // Word Operations
    // =========================================================================

    /// Insert a new word with a freshly generated id
    pub async fn add_word(&self, input: WordInput) -> Result<Word> {
        let word = Word::from_input(self.ids.next()?, input);
        let record = word.clone();

        self.db
            .execute_async(move |conn| put_word(conn, Collection::Words, &record))
            .await
            .context("Failed to add word")?;

        debug!("Added word {} ({})", word.id, word.category);
        Ok(word)
    }

    /// Replace the word stored under `word.id`
    pub async fn update_word(&self, word: &Word) -> Result<()> {
        let word = word.clone();

        self.db
            .execute_async(move |conn| {
                let changed = conn.execute(
                    r#"
                    UPDATE words
                    SET word = ?2, meaning = ?3, audio_path = ?4, image_path = ?5, category = ?6
                    WHERE id = ?1
                    "#,
                    params![
                        word.id,
                        word.word,
                        word.meaning,
                        word.audio_path,
                        word.image_path,
                        word.category.as_str(),
                    ],
                )?;

                if changed == 0 {
                    return Err(StoreError::NotFound {
                        collection: Collection::Words,
                        id: word.id,
                    }
                    .into());
                }

                debug!("Updated word {}", word.id);
                Ok(())
            })
            .await
    }

    /// Get every active word, ordered by id
    pub async fn get_all_words(&self) -> Result<Vec<Word>> {
        self.db
            .execute_async(|conn| read_words(conn, Collection::Words, None))
            .await
    }

    /// Get the active words of one category
    pub async fn get_words_by_category(&self, category: Category) -> Result<Vec<Word>> {
        self.db
            .execute_async(move |conn| read_words(conn, Collection::Words, Some(category)))
            .await
    }

    /// Insert or overwrite words in one transaction
    ///
    /// Ids written here are removed from the archive so a word never lives
    /// in both collections.
    pub async fn bulk_add_words(&self, words: &[Word]) -> Result<()> {
        self.bulk_put_words(Collection::Words, words).await
    }

    /// Move words into the archive; returns exactly the records moved
    pub async fn archive_words(&self, ids: &[i64]) -> Result<Vec<Word>> {
        self.move_words(Collection::Words, Collection::ArchivedWords, ids)
            .await
    }

    /// Move words back out of the archive; returns exactly the records moved
    pub async fn unarchive_words(&self, ids: &[i64]) -> Result<Vec<Word>> {
        self.move_words(Collection::ArchivedWords, Collection::Words, ids)
            .await
    }

    /// Delete active words; missing ids are ignored
    pub async fn delete_words(&self, ids: &[i64]) -> Result<()> {
        let ids = ids.to_vec();

        self.db
            .transaction_async(move |tx| {
                let removed = delete_ids(tx, Collection::Words, &ids)?;
                debug!("Deleted {} of {} requested words", removed, ids.len());
                Ok(())
            })
            .await
    }

    // =========================================================================
    // Archived Word Operations
    // =========================================================================

    /// Get every archived word, ordered by id
    pub async fn get_all_archived_words(&self) -> Result<Vec<Word>> {
        self.db
            .execute_async(|conn| read_words(conn, Collection::ArchivedWords, None))
            .await
    }

    /// Insert or overwrite archived words in one transaction
    pub async fn bulk_add_archived_words(&self, words: &[Word]) -> Result<()> {
        self.bulk_put_words(Collection::ArchivedWords, words).await
    }

    async fn bulk_put_words(&self, collection: Collection, words: &[Word]) -> Result<()> {
        if words.is_empty() {
            return Ok(());
        }

        let words = words.to_vec();
        let count = words.len();
        let max_id = words.iter().map(|w| w.id).max();

        self.db
            .transaction_async(move |tx| {
                for word in &words {
                    put_word(tx, collection, word)?;
                    delete_ids(tx, sibling(collection), &[word.id])?;
                }
                Ok(())
            })
            .await
            .with_context(|| format!("Bulk insert into {} failed", collection))?;

        if let Some(id) = max_id {
            self.ids.observe(id);
        }
        info!("Bulk inserted {} records into {}", count, collection);
        Ok(())
    }

    async fn move_words(&self, from: Collection, to: Collection, ids: &[i64]) -> Result<Vec<Word>> {
        let ids = ids.to_vec();

        let moved = self
            .db
            .transaction_async(move |tx| {
                let mut moved = Vec::new();
                for id in &ids {
                    let found = tx
                        .query_row(
                            &format!("SELECT {} FROM {} WHERE id = ?1", WORD_COLUMNS, from.table()),
                            [id],
                            word_from_row,
                        )
                        .optional()?;

                    if let Some(word) = found {
                        put_word(tx, to, &word)?;
                        delete_ids(tx, from, &[word.id])?;
                        moved.push(word);
                    }
                }
                Ok(moved)
            })
            .await
            .with_context(|| format!("Failed to move words from {} to {}", from, to))?;

        info!("Moved {} words from {} to {}", moved.len(), from, to);
        Ok(moved)
    }

    // =========================================================================
    // Quiz Question Operations
    // =========================================================================

    /// Insert a new quiz question with a freshly generated id
    pub async fn add_quiz_question(&self, input: QuizQuestionInput) -> Result<QuizQuestion> {
        input.validate()?;
        let question = QuizQuestion::from_input(self.ids.next()?, input);
        let record = question.clone();

        self.db
            .execute_async(move |conn| put_question(conn, &record))
            .await
            .context("Failed to add quiz question")?;

        debug!("Added quiz question {} ({})", question.id, question.category);
        Ok(question)
    }

    /// Replace the quiz question stored under `question.id`
    pub async fn update_quiz_question(&self, question: &QuizQuestion) -> Result<()> {
        question.validate()?;
        let question = question.clone();

        self.db
            .execute_async(move |conn| {
                let changed = conn.execute(
                    r#"
                    UPDATE quiz_questions
                    SET question = ?2, question_english = ?3, image = ?4, audio = ?5,
                        options = ?6, correct_answer = ?7, category = ?8
                    WHERE id = ?1
                    "#,
                    params![
                        question.id,
                        question.question,
                        question.question_english,
                        question.image,
                        question.audio,
                        serde_json::to_string(&question.options)?,
                        question.correct_answer,
                        question.category.as_str(),
                    ],
                )?;

                if changed == 0 {
                    return Err(StoreError::NotFound {
                        collection: Collection::QuizQuestions,
                        id: question.id,
                    }
                    .into());
                }

                debug!("Updated quiz question {}", question.id);
                Ok(())
            })
            .await
    }

    /// Get every quiz question, ordered by id
    pub async fn get_all_quiz_questions(&self) -> Result<Vec<QuizQuestion>> {
        self.db
            .execute_async(|conn| read_questions(conn, None))
            .await
    }

    /// Get the quiz questions of one category
    pub async fn get_quiz_questions_by_category(
        &self,
        category: Category,
    ) -> Result<Vec<QuizQuestion>> {
        self.db
            .execute_async(move |conn| read_questions(conn, Some(category)))
            .await
    }

    /// Insert or overwrite quiz questions in one transaction
    ///
    /// Every question is validated before the transaction starts, so a bad
    /// record leaves the collection untouched.
    pub async fn bulk_add_quiz_questions(&self, questions: &[QuizQuestion]) -> Result<()> {
        if questions.is_empty() {
            return Ok(());
        }
        for question in questions {
            question.validate()?;
        }

        let questions = questions.to_vec();
        let count = questions.len();
        let max_id = questions.iter().map(|q| q.id).max();

        self.db
            .transaction_async(move |tx| {
                for question in &questions {
                    put_question(tx, question)?;
                }
                Ok(())
            })
            .await
            .context("Bulk insert into quiz-questions failed")?;

        if let Some(id) = max_id {
            self.ids.observe(id);
        }
        info!("Bulk inserted {} quiz questions", count);
        Ok(())
    }

    /// Delete quiz questions; missing ids are ignored
    pub async fn delete_quiz_questions(&self, ids: &[i64]) -> Result<()> {
        let ids = ids.to_vec();

        self.db
            .transaction_async(move |tx| {
                let removed = delete_ids(tx, Collection::QuizQuestions, &ids)?;
                debug!("Deleted {} of {} requested quiz questions", removed, ids.len());
                Ok(())
            })
            .await
    }

    // =========================================================================
    // Profile Operations
    // =========================================================================

    /// Overwrite the singleton profile
    pub async fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        let profile = profile.clone();

        self.db
            .execute_async(move |conn| put_profile(conn, &profile))
            .await
    }

    /// Get the singleton profile, if one was saved
    pub async fn get_profile(&self) -> Result<Option<UserProfile>> {
        self.db.execute_async(|conn| read_profile(conn)).await
    }

    // =========================================================================
    // Whole-Store Operations
    // =========================================================================

    /// Empty every collection in a single transaction
    pub async fn clear_all(&self) -> Result<()> {
        self.db
            .transaction_async(|tx| clear_collections(tx))
            .await
            .context("Failed to clear store")?;

        info!("Cleared all collections");
        Ok(())
    }

    /// Read every collection inside one transaction
    pub async fn snapshot(&self) -> Result<StoreSnapshot> {
        self.db
            .transaction_async(|tx| {
                Ok(StoreSnapshot {
                    profile: read_profile(tx)?,
                    words: read_words(tx, Collection::Words, None)?,
                    archived_words: read_words(tx, Collection::ArchivedWords, None)?,
                    quiz_questions: read_questions(tx, None)?,
                })
            })
            .await
    }

    /// Replace the contents of every collection in one transaction
    ///
    /// Either the whole snapshot is stored or the previous contents remain.
    pub async fn restore_snapshot(&self, snapshot: StoreSnapshot) -> Result<()> {
        for question in &snapshot.quiz_questions {
            question.validate()?;
        }
        let max_id = snapshot.max_id();
        let counts = (
            snapshot.words.len(),
            snapshot.archived_words.len(),
            snapshot.quiz_questions.len(),
        );

        self.db
            .transaction_async(move |tx| {
                clear_collections(tx)?;

                if let Some(profile) = &snapshot.profile {
                    put_profile(tx, profile)?;
                }
                for word in &snapshot.words {
                    put_word(tx, Collection::Words, word)?;
                }
                for word in &snapshot.archived_words {
                    put_word(tx, Collection::ArchivedWords, word)?;
                    delete_ids(tx, Collection::Words, &[word.id])?;
                }
                for question in &snapshot.quiz_questions {
                    put_question(tx, question)?;
                }
                Ok(())
            })
            .await
            .context("Failed to restore store contents")?;

        if let Some(id) = max_id {
            self.ids.observe(id);
        }
        info!(
            "Restored {} words, {} archived words, {} quiz questions",
            counts.0, counts.1, counts.2
        );
        Ok(())
    }
}

// =============================================================================
// Row helpers
// =============================================================================

fn sibling(collection: Collection) -> Collection {
    match collection {
        Collection::Words => Collection::ArchivedWords,
        _ => Collection::Words,
    }
}

fn category_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Category> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e: anyhow::Error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn word_from_row(row: &Row<'_>) -> rusqlite::Result<Word> {
    Ok(Word {
        id: row.get(0)?,
        word: row.get(1)?,
        meaning: row.get(2)?,
        audio_path: row.get(3)?,
        image_path: row.get(4)?,
        category: category_at(row, 5)?,
    })
}

fn question_from_row(row: &Row<'_>) -> rusqlite::Result<QuizQuestion> {
    let options: String = row.get(5)?;
    let options: Vec<String> = serde_json::from_str(&options)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

    Ok(QuizQuestion {
        id: row.get(0)?,
        question: row.get(1)?,
        question_english: row.get(2)?,
        image: row.get(3)?,
        audio: row.get(4)?,
        options,
        correct_answer: row.get(6)?,
        category: category_at(row, 7)?,
    })
}

fn read_words(conn: &Connection, collection: Collection, category: Option<Category>) -> Result<Vec<Word>> {
    let table = collection.table();
    let words = match category {
        Some(category) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM {} WHERE category = ?1 ORDER BY id",
                WORD_COLUMNS, table
            ))?;
            let rows = stmt.query_map([category.as_str()], word_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
        None => {
            let mut stmt =
                conn.prepare(&format!("SELECT {} FROM {} ORDER BY id", WORD_COLUMNS, table))?;
            let rows = stmt.query_map([], word_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
    };
    Ok(words)
}

fn read_questions(conn: &Connection, category: Option<Category>) -> Result<Vec<QuizQuestion>> {
    let questions = match category {
        Some(category) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM quiz_questions WHERE category = ?1 ORDER BY id",
                QUESTION_COLUMNS
            ))?;
            let rows = stmt.query_map([category.as_str()], question_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM quiz_questions ORDER BY id",
                QUESTION_COLUMNS
            ))?;
            let rows = stmt.query_map([], question_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
    };
    Ok(questions)
}

fn read_profile(conn: &Connection) -> Result<Option<UserProfile>> {
    let profile = conn
        .query_row(
            "SELECT nickname, photo FROM user_profile WHERE key = ?1",
            [PROFILE_KEY],
            |row| {
                Ok(UserProfile {
                    nickname: row.get(0)?,
                    photo: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(profile)
}

fn put_word(conn: &Connection, collection: Collection, word: &Word) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            collection.table(),
            WORD_COLUMNS
        ),
        params![
            word.id,
            word.word,
            word.meaning,
            word.audio_path,
            word.image_path,
            word.category.as_str(),
        ],
    )?;
    Ok(())
}

fn put_question(conn: &Connection, question: &QuizQuestion) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO quiz_questions ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            QUESTION_COLUMNS
        ),
        params![
            question.id,
            question.question,
            question.question_english,
            question.image,
            question.audio,
            serde_json::to_string(&question.options)?,
            question.correct_answer,
            question.category.as_str(),
        ],
    )?;
    Ok(())
}

fn put_profile(conn: &Connection, profile: &UserProfile) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO user_profile (key, nickname, photo) VALUES (?1, ?2, ?3)",
        params![PROFILE_KEY, profile.nickname, profile.photo],
    )?;
    debug!("Saved profile for '{}'", profile.nickname);
    Ok(())
}

fn delete_ids(conn: &Connection, collection: Collection, ids: &[i64]) -> Result<usize> {
    let mut stmt = conn.prepare(&format!("DELETE FROM {} WHERE id = ?1", collection.table()))?;
    let mut removed = 0;
    for id in ids {
        removed += stmt.execute([id])?;
    }
    Ok(removed)
}

fn clear_collections(conn: &Connection) -> Result<()> {
    for collection in [
        Collection::Words,
        Collection::ArchivedWords,
        Collection::QuizQuestions,
        Collection::UserProfile,
    ] {
        conn.execute(&format!("DELETE FROM {}", collection.table()), [])?;
    }
    Ok(())
}

fn max_stored_id(conn: &Connection) -> Result<i64> {
    let max: Option<i64> = conn.query_row(
        r#"
        SELECT MAX(id) FROM (
            SELECT id FROM words
            UNION ALL SELECT id FROM archived_words
            UNION ALL SELECT id FROM quiz_questions
        )
        "#,
        [],
        |row| row.get(0),
    )?;
    Ok(max.unwrap_or(0))
}
