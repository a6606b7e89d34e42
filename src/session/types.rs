//! Conversation types for KubePilot
//!
//! A conversation is an append-only list of [`Turn`]s. Each turn carries an
//! ordered list of [`Part`]s; the whole list is resent to the generation
//! backend on every round, so order is significant everywhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Who contributed a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Message typed by the user
    User,
    /// Output of the generation backend
    Model,
    /// A batch of tool results fed back to the model
    ToolResult,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Model => write!(f, "model"),
            Role::ToolResult => write!(f, "tool-result"),
        }
    }
}

/// One element of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    /// Plain text
    Text { text: String },
    /// The model asked for a tool to be invoked
    ToolCallRequest {
        name: String,
        arguments: Map<String, Value>,
        /// Backend signature echoed back on later rounds
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    /// Result text of a tool invocation (error text on failure)
    ToolCallResult { name: String, result: String },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn tool_call_request(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Part::ToolCallRequest {
            name: name.into(),
            arguments,
            signature: None,
        }
    }

    pub fn tool_call_result(name: impl Into<String>, result: impl Into<String>) -> Self {
        Part::ToolCallResult {
            name: name.into(),
            result: result.into(),
        }
    }
}

/// One logical contribution to a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Turn {
    /// A user turn holding one text part.
    ///
    /// # Example
    /// ```
    /// use kubepilot::session::{Part, Role, Turn};
    ///
    /// let turn = Turn::user("list pods");
    /// assert_eq!(turn.role, Role::User);
    /// assert_eq!(turn.parts, vec![Part::text("list pods")]);
    /// ```
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::text(text)],
        }
    }

    /// A model turn holding one text part.
    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::text(text)],
        }
    }

    /// A model turn holding the given parts, in order.
    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Model,
            parts,
        }
    }

    /// A tool-result turn holding the given parts, in order.
    pub fn tool_results(parts: Vec<Part>) -> Self {
        Self {
            role: Role::ToolResult,
            parts,
        }
    }

    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// An ordered, append-only sequence of turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            turns: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a turn and bump `updated_at`.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
        self.updated_at = Utc::now();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
