/*!
 * Learning activities and their progress.
 *
 * There is one activity per category. Quiz activities earn progress from
 * correct answers; word-list activities are browsed only. Progress is a
 * percentage kept outside the structured store.
 */

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::database::models::Category;

/// Progress percentage per category
pub type Progress = BTreeMap<Category, u8>;

/// Upper bound of an activity's progress
pub const MAX_PROGRESS: u8 = 100;

/// How an activity is practised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Quiz,
    WordList,
}

/// Activity shown on the home screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: Category,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub kind: ActivityKind,
    /// Percentage, 0..=100
    pub progress: u8,
}

impl Activity {
    fn new(id: Category, description: &str, icon: &str, kind: ActivityKind) -> Self {
        Self {
            id,
            title: id.to_string(),
            description: description.to_string(),
            icon: icon.to_string(),
            kind,
            progress: 0,
        }
    }
}

/// The fixed activity catalogue with zero progress
pub fn catalogue() -> Vec<Activity> {
    vec![
        Activity::new(Category::Actions, "Words for things we do everyday.", "🏃", ActivityKind::Quiz),
        Activity::new(Category::Animals, "Names of animals in Masbate.", "🐘", ActivityKind::Quiz),
        Activity::new(Category::Values, "Words for good manners and actions.", "❤️", ActivityKind::Quiz),
        Activity::new(Category::Greetings, "Learn common greetings.", "👋", ActivityKind::WordList),
        Activity::new(Category::Phrases, "Useful phrases for conversations.", "🗣️", ActivityKind::WordList),
        Activity::new(Category::Food, "Learn words related to food.", "🍔", ActivityKind::WordList),
    ]
}

/// Collect the progress of every activity
pub fn progress_of(activities: &[Activity]) -> Progress {
    activities.iter().map(|a| (a.id, a.progress)).collect()
}

/// Overwrite activity progress from a stored map; absent categories become 0
pub fn apply_progress(activities: &mut [Activity], progress: &Progress) {
    for activity in activities.iter_mut() {
        activity.progress = progress.get(&activity.id).copied().unwrap_or(0);
    }
}

/// Progress after one more correct answer in a category with `question_count` questions
///
/// Each correct answer is worth `100 / question_count` percent; the result
/// is rounded and capped at 100. A category without questions never moves.
pub fn advance(current: u8, question_count: usize) -> u8 {
    if question_count == 0 {
        return current;
    }
    let increment = f64::from(MAX_PROGRESS) / question_count as f64;
    let next = (f64::from(current) + increment).min(f64::from(MAX_PROGRESS));
    next.round() as u8
}

/// Decode a progress map from untrusted JSON
///
/// Unknown categories are dropped. Values may be numbers or numeric strings
/// and are clamped to 0..=100. Anything that is not an object yields an
/// empty map.
pub fn progress_from_value(value: &Value) -> Progress {
    let Some(map) = value.as_object() else {
        return Progress::new();
    };

    map.iter()
        .filter_map(|(key, raw)| {
            let category = key.parse::<Category>().ok()?;
            let number = match raw {
                Value::Number(n) => n.as_f64()?,
                Value::String(s) => s.trim().parse::<f64>().ok()?,
                _ => return None,
            };
            let clamped = number.round().clamp(0.0, f64::from(MAX_PROGRESS)) as u8;
            Some((category, clamped))
        })
        .collect()
}
