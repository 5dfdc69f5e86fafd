/*!
 * Database entity models and DTOs.
 *
 * These structures map directly to the store's collections and double as
 * the JSON shapes used by seed documents and backup files.
 */

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::errors::StoreError;

/// Topic tag shared by words and quiz questions
///
/// Serialized by its capitalized name; any casing is accepted when reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Category {
    Actions,
    Animals,
    Values,
    Greetings,
    Phrases,
    Food,
}

impl Category {
    /// All categories in display order
    pub const ALL: [Category; 6] = [
        Category::Actions,
        Category::Animals,
        Category::Values,
        Category::Greetings,
        Category::Phrases,
        Category::Food,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Actions => "Actions",
            Category::Animals => "Animals",
            Category::Values => "Values",
            Category::Greetings => "Greetings",
            Category::Phrases => "Phrases",
            Category::Food => "Food",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "actions" => Ok(Category::Actions),
            "animals" => Ok(Category::Animals),
            "values" => Ok(Category::Values),
            "greetings" => Ok(Category::Greetings),
            "phrases" => Ok(Category::Phrases),
            "food" => Ok(Category::Food),
            _ => Err(anyhow::anyhow!("Invalid category: {}", s)),
        }
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Named record collections owned by the repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Collection {
    Words,
    ArchivedWords,
    QuizQuestions,
    UserProfile,
}

impl Collection {
    /// Backing table name
    pub fn table(&self) -> &'static str {
        match self {
            Collection::Words => "words",
            Collection::ArchivedWords => "archived_words",
            Collection::QuizQuestions => "quiz_questions",
            Collection::UserProfile => "user_profile",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collection::Words => write!(f, "words"),
            Collection::ArchivedWords => write!(f, "archived-words"),
            Collection::QuizQuestions => write!(f, "quiz-questions"),
            Collection::UserProfile => write!(f, "user-profile"),
        }
    }
}

/// Dictionary entry, active or archived
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    /// Unique id, timestamp-derived
    pub id: i64,
    /// Word in the learned language
    pub word: String,
    /// English meaning
    pub meaning: String,
    /// Pronunciation audio URI, empty when absent
    #[serde(default)]
    pub audio_path: String,
    /// Illustration URI, empty when absent
    #[serde(default)]
    pub image_path: String,
    pub category: Category,
}

impl Word {
    /// Attach an id to new word data
    pub fn from_input(id: i64, input: WordInput) -> Self {
        Self {
            id,
            word: input.word,
            meaning: input.meaning,
            audio_path: input.audio_path,
            image_path: input.image_path,
            category: input.category,
        }
    }

    /// Case-insensitive substring match on the word or its meaning
    pub fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.word.to_lowercase().contains(&term) || self.meaning.to_lowercase().contains(&term)
    }
}

/// Word data before an id is assigned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordInput {
    pub word: String,
    pub meaning: String,
    #[serde(default)]
    pub audio_path: String,
    #[serde(default)]
    pub image_path: String,
    pub category: Category,
}

impl WordInput {
    /// Create word data without media
    pub fn new(word: &str, meaning: &str, category: Category) -> Self {
        Self {
            word: word.to_string(),
            meaning: meaning.to_string(),
            audio_path: String::new(),
            image_path: String::new(),
            category,
        }
    }
}

/// Multiple-choice quiz question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub id: i64,
    /// Prompt in the learned language
    pub question: String,
    /// English translation of the prompt
    pub question_english: String,
    /// Illustration URI
    #[serde(default)]
    pub image: String,
    /// Optional audio cue URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    /// Answer choices, four by convention
    pub options: Vec<String>,
    /// Must equal one of `options`
    pub correct_answer: String,
    pub category: Category,
}

impl QuizQuestion {
    /// Attach an id to new question data
    pub fn from_input(id: i64, input: QuizQuestionInput) -> Self {
        Self {
            id,
            question: input.question,
            question_english: input.question_english,
            image: input.image,
            audio: input.audio,
            options: input.options,
            correct_answer: input.correct_answer,
            category: input.category,
        }
    }

    /// Check that the correct answer is one of the options
    pub fn validate(&self) -> Result<(), StoreError> {
        validate_answer(&self.options, &self.correct_answer)
    }

    pub fn is_correct(&self, answer: &str) -> bool {
        self.correct_answer == answer
    }

    /// Case-insensitive substring match on the prompt, its translation or any option
    pub fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.question.to_lowercase().contains(&term)
            || self.question_english.to_lowercase().contains(&term)
            || self.options.iter().any(|o| o.to_lowercase().contains(&term))
    }
}

/// Quiz question data before an id is assigned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestionInput {
    pub question: String,
    pub question_english: String,
    #[serde(default)]
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub category: Category,
}

impl QuizQuestionInput {
    pub fn validate(&self) -> Result<(), StoreError> {
        validate_answer(&self.options, &self.correct_answer)
    }
}

fn validate_answer(options: &[String], correct_answer: &str) -> Result<(), StoreError> {
    if options.iter().any(|o| o == correct_answer) {
        Ok(())
    } else {
        Err(StoreError::InvalidRecord(format!(
            "correct answer '{}' is not one of the options",
            correct_answer
        )))
    }
}

/// Default nickname for a fresh profile
pub const DEFAULT_NICKNAME: &str = "Juan";

/// Singleton user profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub nickname: String,
    /// Data URI of the profile photo
    pub photo: Option<String>,
}

impl UserProfile {
    pub fn new(nickname: &str) -> Self {
        Self {
            nickname: nickname.to_string(),
            photo: None,
        }
    }
}

impl Default for UserProfile {
    fn default() -> Self {
        Self::new(DEFAULT_NICKNAME)
    }
}

/// Contents of every collection, read or written as one unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub profile: Option<UserProfile>,
    pub words: Vec<Word>,
    pub archived_words: Vec<Word>,
    pub quiz_questions: Vec<QuizQuestion>,
}

impl StoreSnapshot {
    /// Largest id held by any collection
    pub fn max_id(&self) -> Option<i64> {
        self.words
            .iter()
            .chain(self.archived_words.iter())
            .map(|w| w.id)
            .chain(self.quiz_questions.iter().map(|q| q.id))
            .max()
    }
}
