use std::sync::{Arc, Mutex};

use healthpulse_common::{ChatMessage, HealthRecord, Result, User};
use healthpulse_db::{ChatStore, HealthStore};
use tracing::{debug, info};

use crate::providers::{GenerateRequest, LlmProvider};

/// How many of the newest measurements are fed into the prompt.
pub const RECENT_RECORD_LIMIT: usize = 10;
/// How many of the newest conversation turns are fed into the prompt.
pub const RECENT_TURN_LIMIT: usize = 6;

const PERSONA_INSTRUCTION: &str = "You are HealthPulse AI, a personal health assistant.";
const NO_DATA_MARKER: &str = "no data";
const UNKNOWN_NAME: &str = "a HealthPulse user";
const UNKNOWN_EMAIL: &str = "unknown";

/// The context-aware conversational pipeline.
///
/// On each turn: gather the user's identity, newest measurements, and recent
/// conversation window; render one prompt; call the provider; persist the
/// user/assistant pair atomically.
pub struct ChatPipeline {
    health: Arc<Mutex<HealthStore>>,
    chat: Arc<Mutex<ChatStore>>,
    provider: Arc<dyn LlmProvider>,
    model: String,
}

/// Everything the prompt renderer needs, gathered before any await point.
struct TurnContext {
    user: Option<User>,
    records: Vec<HealthRecord>,
    /// Recent turns in chronological order.
    history: Vec<ChatMessage>,
}

impl ChatPipeline {
    pub fn new(
        health: Arc<Mutex<HealthStore>>,
        chat: Arc<Mutex<ChatStore>>,
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            health,
            chat,
            provider,
            model: model.into(),
        }
    }

    /// Run one full turn for an authenticated user. Returns the persisted
    /// user/assistant pair; on any failure before the commit, nothing is
    /// written.
    pub async fn process_turn(
        &self,
        user_id: i64,
        content: &str,
    ) -> Result<(ChatMessage, ChatMessage)> {
        let context = self.assemble_context(user_id)?;
        let prompt = build_prompt(&context, content);
        debug!(user_id, prompt_len = prompt.len(), "assembled chat prompt");

        let request = GenerateRequest {
            model: self.model.clone(),
            prompt,
        };
        let answer = self.provider.generate(&request).await?;

        let pair = self
            .chat
            .lock()
            .unwrap()
            .append_turn(user_id, content, &answer)?;
        info!(user_id, "persisted chat turn");
        Ok(pair)
    }

    /// Gather identity, measurements, and the recent conversation window.
    /// An identity miss is recovered with a placeholder downstream; health
    /// data and chat history stay independently queryable.
    fn assemble_context(&self, user_id: i64) -> Result<TurnContext> {
        let (user, records) = {
            let health = self.health.lock().unwrap();
            (
                health.user_by_id(user_id)?,
                health.recent_records(user_id, RECENT_RECORD_LIMIT)?,
            )
        };

        let history = {
            let chat = self.chat.lock().unwrap();
            let mut recent = chat.recent_messages(user_id, RECENT_TURN_LIMIT)?;
            // Window is fetched newest-first; restore chronological order.
            recent.reverse();
            recent
        };

        Ok(TurnContext {
            user,
            records,
            history,
        })
    }
}

fn build_prompt(context: &TurnContext, question: &str) -> String {
    let (name, email) = match &context.user {
        Some(user) => (
            user.name.as_deref().unwrap_or(UNKNOWN_NAME).to_string(),
            user.email.clone(),
        ),
        None => (UNKNOWN_NAME.to_string(), UNKNOWN_EMAIL.to_string()),
    };

    let measurements = if context.records.is_empty() {
        NO_DATA_MARKER.to_string()
    } else {
        context
            .records
            .iter()
            .map(HealthRecord::summary)
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut prompt = String::new();
    prompt.push_str(PERSONA_INSTRUCTION);
    prompt.push('\n');
    prompt.push_str(&format!("You are talking to {name} ({email}).\n"));
    prompt.push_str(&format!("Recent measurements: [{measurements}].\n"));

    if !context.history.is_empty() {
        prompt.push_str("Conversation so far:\n");
        for message in &context.history {
            prompt.push_str(&format!("{}: {}\n", message.role, message.content));
        }
    }

    prompt.push_str(&format!("Question: \"{question}\"\n"));
    prompt.push_str("Answer in at most 3 sentences, in a warm and encouraging tone.");
    prompt
}
