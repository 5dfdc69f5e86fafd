/*!
 * Record-by-record decoding of untrusted JSON.
 *
 * Seed documents and backup files are decoded one record at a time. A
 * record that cannot be decoded is logged and skipped; it never takes the
 * rest of its batch down with it.
 */

use log::warn;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::database::models::{QuizQuestion, UserProfile, Word};

/// Coerce a JSON id to an integer
///
/// Accepts integers, floats without a fractional part and numeric strings.
pub fn coerce_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}

/// Decode a JSON array of words, skipping malformed entries
pub fn decode_words(value: Option<&Value>, source: &str) -> Vec<Word> {
    decode_array(value, source, "word", |_| Ok(()))
}

/// Decode a JSON array of quiz questions, skipping malformed or inconsistent entries
pub fn decode_questions(value: Option<&Value>, source: &str) -> Vec<QuizQuestion> {
    decode_array(value, source, "quiz question", |q: &QuizQuestion| {
        q.validate().map_err(|e| e.to_string())
    })
}

/// Decode a profile object; `null` or a missing value decodes to `None`
pub fn decode_profile(value: Option<&Value>, source: &str) -> Option<UserProfile> {
    match value {
        None | Some(Value::Null) => None,
        Some(raw) => match serde_json::from_value::<UserProfile>(raw.clone()) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!("Skipping malformed profile in {}: {}", source, e);
                None
            }
        },
    }
}

fn decode_array<T, F>(value: Option<&Value>, source: &str, kind: &str, check: F) -> Vec<T>
where
    T: DeserializeOwned,
    F: Fn(&T) -> Result<(), String>,
{
    let items = match value {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items,
        Some(_) => {
            warn!("Expected a list of {} records in {}, ignoring", kind, source);
            return Vec::new();
        }
    };

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match decode_record(item).and_then(|record| check(&record).map(|_| record)) {
            Ok(record) => records.push(record),
            Err(reason) => warn!("Skipping {} #{} in {}: {}", kind, index, source, reason),
        }
    }

    if records.len() < items.len() {
        warn!(
            "Decoded {} of {} {} records from {}",
            records.len(),
            items.len(),
            kind,
            source
        );
    }
    records
}

fn decode_record<T: DeserializeOwned>(item: &Value) -> Result<T, String> {
    let mut object = item
        .as_object()
        .cloned()
        .ok_or_else(|| "not an object".to_string())?;

    let id = object
        .get("id")
        .and_then(coerce_id)
        .ok_or_else(|| "missing or non-numeric id".to_string())?;
    object.insert("id".to_string(), Value::from(id));

    serde_json::from_value(Value::Object(object)).map_err(|e| e.to_string())
}
