use serde::{Deserialize, Serialize};

use crate::models::{ChatMessage, Community, GratitudeEntry, MoodEntry, ReflectionPost};

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms the session is ready
    Ready {
        user_id: String,
        display_name: String,
        /// Reaction palette to offer next to each post
        reactions: Vec<String>,
    },

    /// Latest snapshot of every known community
    Communities {
        communities: Vec<Community>,
        /// Ids of the communities the session user belongs to
        mine: Vec<String>,
    },

    /// Latest feed snapshot for the selected group, newest first
    Feed {
        group_id: String,
        posts: Vec<ReflectionPost>,
    },

    /// Latest chat log for the selected group, oldest first
    Chat {
        group_id: String,
        messages: Vec<ChatMessage>,
    },

    /// Breathing session state after a tick or a control command
    Breathing {
        mode: String,
        step_label: String,
        step_index: usize,
        seconds_remaining: u32,
        progress: f64,
        running: bool,
    },

    /// Mood entries inside the requested window, oldest first
    MoodHistory {
        entries: Vec<MoodEntry>,
        /// Chart ordinals, parallel to `entries`
        chart: Vec<u8>,
    },

    /// Gratitude entries, newest first
    Gratitude { entries: Vec<GratitudeEntry> },

    /// An operation failed; `message` is meant for display
    Error { message: String },
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    CreateCommunity { name: String },
    JoinCommunity { community_id: String },
    LeaveCommunity { community_id: String },

    /// Point both the reflection feed and the group chat at a group.
    /// Any previous group subscription is torn down first.
    SelectGroup { group_id: String },

    /// Drop the feed and chat subscriptions.
    LeaveGroup,

    Post { text: String },
    React {
        post_id: String,
        emoji: String,
        /// Use the server-side increment instead of read-then-write
        #[serde(default)]
        atomic: bool,
    },
    Comment { post_id: String, text: String },
    SendChat { text: String },

    RecordMood {
        mood: String,
        #[serde(default)]
        note: String,
    },
    LoadMoodHistory {
        #[serde(default = "default_window_days")]
        window_days: u32,
    },
    RecordGratitude { entry: String },
    LoadGratitude,

    BreathingSelect { mode: String },
    BreathingStart,
    BreathingReset,
}

fn default_window_days() -> u32 {
    7
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_use_adjacent_tagging() {
        let cmd: GatewayCommand = serde_json::from_str(
            r#"{"type":"React","data":{"post_id":"p1","emoji":"👍"}}"#,
        )
        .unwrap();
        match cmd {
            GatewayCommand::React { post_id, emoji, atomic } => {
                assert_eq!(post_id, "p1");
                assert_eq!(emoji, "👍");
                assert!(!atomic);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn mood_history_window_defaults_to_a_week() {
        let cmd: GatewayCommand =
            serde_json::from_str(r#"{"type":"LoadMoodHistory","data":{}}"#).unwrap();
        assert!(matches!(cmd, GatewayCommand::LoadMoodHistory { window_days: 7 }));
    }

    #[test]
    fn error_event_serializes_message() {
        let json = serde_json::to_value(GatewayEvent::Error {
            message: "Text must not be blank".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "Error");
        assert_eq!(json["data"]["message"], "Text must not be blank");
    }
}
