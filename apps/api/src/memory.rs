//! Session memory store: durable, session-keyed append log of turns.
//!
//! Append order is the only ordering guarantee. Turns are never edited or removed.
//! Two in-flight turns for the same session are not serialized against each other.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::AppError;
use crate::llm_client::ChatMessage;

const KEY_PREFIX: &str = "chat_history";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

/// One human or assistant utterance. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub sender: Sender,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Assistant,
            text: text.into(),
        }
    }

    pub fn to_message(&self) -> ChatMessage {
        match self.sender {
            Sender::User => ChatMessage::user(self.text.clone()),
            Sender::Assistant => ChatMessage::assistant(self.text.clone()),
        }
    }
}

#[async_trait]
pub trait SessionMemory: Send + Sync {
    /// Durably appends one turn. Storage failures propagate; the turn is never dropped silently.
    async fn append(&self, session_key: &str, turn: &Turn) -> Result<(), AppError>;

    /// Returns the ordered turns of a session, empty if none exist yet.
    async fn load_history(&self, session_key: &str) -> Result<Vec<Turn>, AppError>;

    /// Appends a human input followed by the assistant output.
    async fn append_pair(
        &self,
        session_key: &str,
        human: &str,
        assistant: &str,
    ) -> Result<(), AppError> {
        self.append(session_key, &Turn::user(human)).await?;
        self.append(session_key, &Turn::assistant(assistant)).await
    }
}

/// Redis list per session: `RPUSH` to append, `LRANGE 0 -1` to load.
#[derive(Clone)]
pub struct RedisSessionMemory {
    connection: MultiplexedConnection,
}

impl RedisSessionMemory {
    pub fn new(connection: MultiplexedConnection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl SessionMemory for RedisSessionMemory {
    async fn append(&self, session_key: &str, turn: &Turn) -> Result<(), AppError> {
        let mut conn = self.connection.clone();
        let _: () = conn
            .rpush(history_key(session_key), encode_turn(turn)?)
            .await?;
        Ok(())
    }

    async fn load_history(&self, session_key: &str) -> Result<Vec<Turn>, AppError> {
        let mut conn = self.connection.clone();
        let raw: Vec<String> = conn.lrange(history_key(session_key), 0, -1).await?;
        debug!("Loaded {} turns for session {session_key}", raw.len());
        raw.iter().map(|entry| decode_turn(entry)).collect()
    }

    async fn append_pair(
        &self,
        session_key: &str,
        human: &str,
        assistant: &str,
    ) -> Result<(), AppError> {
        // Single RPUSH keeps the pair adjacent even if another writer interleaves.
        let entries = vec![
            encode_turn(&Turn::user(human))?,
            encode_turn(&Turn::assistant(assistant))?,
        ];
        let mut conn = self.connection.clone();
        let _: () = conn.rpush(history_key(session_key), entries).await?;
        Ok(())
    }
}

fn history_key(session_key: &str) -> String {
    format!("{KEY_PREFIX}:{session_key}")
}

fn encode_turn(turn: &Turn) -> Result<String, AppError> {
    serde_json::to_string(turn)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode turn: {e}")))
}

fn decode_turn(raw: &str) -> Result<Turn, AppError> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Corrupt turn in session history: {e}")))
}
