use anyhow::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::engine::chat::ChatEngine;
use crate::feedback::record::Record;
use crate::feedback::recorder::Recorder;
use crate::models::Message;
use crate::render::{render_message, RenderedMessage};

/// One user's conversation: transcript, private chat engine and a handle to
/// the shared recorder.
pub struct SessionContext {
    pub id: Uuid,
    messages: RwLock<Vec<Message>>,
    chat_engine: ChatEngine,
    recorder: Arc<Recorder>,
    refresh_interval_ms: u64,
    /// Serializes turns so each answer follows its own prompt
    turn: tokio::sync::Mutex<()>,
}

impl SessionContext {
    pub fn new(chat_engine: ChatEngine, recorder: Arc<Recorder>, refresh_interval_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            messages: RwLock::new(Vec::new()),
            chat_engine,
            recorder,
            refresh_interval_ms,
            turn: tokio::sync::Mutex::new(()),
        }
    }

    /// Seed an empty transcript with the greeting. No-op otherwise.
    pub fn initialize(&self, greeting: &str) {
        let mut messages = self.messages.write();
        if messages.is_empty() {
            messages.push(Message::assistant(greeting));
        }
    }

    pub fn append(&self, message: Message) {
        self.messages.write().push(message);
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.read().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }

    pub fn find_record(&self, record_id: &str) -> Option<Arc<Record>> {
        self.messages
            .read()
            .iter()
            .filter_map(|m| m.record.as_ref())
            .find(|r| r.record_id == record_id)
            .cloned()
    }

    /// Every message in order, with a feedback panel for those carrying a record.
    pub fn render_all(&self) -> Vec<RenderedMessage> {
        self.messages
            .read()
            .iter()
            .map(|m| render_message(m, self.refresh_interval_ms))
            .collect()
    }

    /// Run one turn. The user message is appended first and stays even if
    /// the call fails; the assistant message is appended only on success.
    pub async fn submit(&self, prompt: &str) -> Result<Message> {
        let _turn = self.turn.lock().await;
        self.append(Message::user(prompt));

        let (response, record) = self
            .recorder
            .record(prompt, || self.chat_engine.chat(prompt))
            .await
            .inspect_err(|e| tracing::warn!("Chat turn failed in session {}: {e:#}", self.id))?;

        let message = Message::assistant(response.response).with_record(record);
        self.append(message.clone());
        Ok(message)
    }

    pub fn refresh_interval_ms(&self) -> u64 {
        self.refresh_interval_ms
    }
}

/// All live sessions, keyed by id. Sessions are never evicted.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<SessionContext>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: SessionContext) -> Arc<SessionContext> {
        let session = Arc::new(session);
        self.sessions.write().insert(session.id, session.clone());
        session
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<SessionContext>> {
        self.sessions.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
