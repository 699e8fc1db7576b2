//! Chat prompt assembly for single-shot completions.

use serde::{Deserialize, Serialize};

/// One prior turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

fn default_role() -> String {
    "user".to_string()
}

impl ChatTurn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Flatten `history` and a new `prompt` into one completion prompt that
/// ends with an open `Assistant: ` line.
pub fn build_chat_prompt(history: &[ChatTurn], prompt: &str) -> String {
    let mut out = String::new();
    for turn in history {
        let speaker = match turn.role.as_str() {
            "user" => "User".to_string(),
            "assistant" => "Assistant".to_string(),
            other => capitalize(other),
        };
        out.push_str(&speaker);
        out.push_str(": ");
        out.push_str(&turn.content);
        out.push('\n');
    }
    out.push_str("User: ");
    out.push_str(prompt);
    out.push_str("\nAssistant: ");
    out
}

/// First character upper-cased, the rest lower-cased.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
