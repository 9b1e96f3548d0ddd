use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Mood categories a user can record.
///
/// `Unknown` only appears when a stored entry carries a category this build
/// doesn't recognise; it can never be parsed from user input.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Mood {
    Happy,
    Sad,
    Stressed,
    Calm,
    #[default]
    #[serde(other)]
    #[strum(disabled)]
    Unknown,
}

impl Mood {
    /// Numeric scale used for the mood chart.
    pub fn ordinal(self) -> u8 {
        match self {
            Mood::Happy => 4,
            Mood::Calm => 3,
            Mood::Sad => 2,
            Mood::Stressed => 1,
            Mood::Unknown => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub mood: Mood,
    #[serde(default)]
    pub note: String,
    #[serde(default, with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GratitudeEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub entry: String,
    #[serde(default, with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Community {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub member_count: u32,
    #[serde(default)]
    pub created_by: String,
    #[serde(default, with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    /// Last membership change; epoch for communities nobody joined or left.
    #[serde(default, with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl Community {
    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m == user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(default)]
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default, with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReflectionPost {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub community_id: String,
    /// Community name at the time of posting.
    #[serde(default)]
    pub community_name: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    #[serde(default)]
    pub text: String,
    /// emoji -> count
    #[serde(default)]
    pub reactions: BTreeMap<String, u64>,
    /// Oldest first, in append order.
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default, with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl ReflectionPost {
    pub fn reaction_count(&self, emoji: &str) -> u64 {
        self.reactions.get(emoji).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mood_parses_known_categories_only() {
        assert_eq!("calm".parse::<Mood>().unwrap(), Mood::Calm);
        assert!("unknown".parse::<Mood>().is_err());
        assert!("angry".parse::<Mood>().is_err());
    }

    #[test]
    fn unrecognised_stored_mood_decodes_as_unknown() {
        let entry: MoodEntry =
            serde_json::from_value(serde_json::json!({ "mood": "elated", "timestamp": 0 })).unwrap();
        assert_eq!(entry.mood, Mood::Unknown);
        assert_eq!(entry.mood.ordinal(), 0);
    }

    #[test]
    fn post_with_missing_fields_gets_defaults() {
        let post: ReflectionPost = serde_json::from_value(serde_json::json!({
            "id": "p1",
            "text": "hello",
        }))
        .unwrap();
        assert!(post.reactions.is_empty());
        assert!(post.comments.is_empty());
        assert_eq!(post.reaction_count("👍"), 0);
    }
}
