//! End-to-end generation of one character reply.
//!
//! A cycle loads the chat and character, decides whether there is anything
//! to answer, shows a typing placeholder, asks the configured provider,
//! falls back to a local reply when the provider cannot answer, and commits
//! the cleaned result. The placeholder is gone when the cycle returns,
//! whichever way it went.

use std::collections::HashSet;
use std::error::Error;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::api::ChatMessage;
use crate::character::card::DEFAULT_MODEL_SENTINEL;
use crate::character::Character;
use crate::core::adapters::{
    adapter_for, GenerationOptions, ProviderError, ProviderErrorKind, DEFAULT_FREQUENCY_PENALTY,
    DEFAULT_MAX_TOKENS, DEFAULT_PRESENCE_PENALTY, DEFAULT_TEMPERATURE, DEFAULT_TOP_P,
};
use crate::core::builtin_providers::ProviderKind;
use crate::core::entropy::{Clock, Entropy, SystemClock, SystemEntropy};
use crate::core::fallback;
use crate::core::message::{Chat, Message, Sender};
use crate::core::postprocess;
use crate::core::prompt::build_prompt;
use crate::core::providers::ProviderRegistry;
use crate::core::storage::{ChatUpdate, Storage, StorageError, UserSettings};

/// Model used when neither the character nor the settings name one.
pub const DEFAULT_MODEL: &str = "hf/GPT-2";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// `openrouter/<this>` routes to the configured OpenRouter model.
const OPENROUTER_ANY: &str = "any";
const EVENT_CAPACITY: usize = 64;

pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(timeout).build()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPhase {
    Idle,
    AwaitingGreetingCheck,
    BuildingPrompt,
    Dispatching,
    PostProcessing,
    Committing,
    Error,
}

impl GenerationPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationPhase::Idle => "idle",
            GenerationPhase::AwaitingGreetingCheck => "awaiting_greeting_check",
            GenerationPhase::BuildingPrompt => "building_prompt",
            GenerationPhase::Dispatching => "dispatching",
            GenerationPhase::PostProcessing => "post_processing",
            GenerationPhase::Committing => "committing",
            GenerationPhase::Error => "error",
        }
    }
}

impl fmt::Display for GenerationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the committed text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    Greeting,
    Remote,
    Fallback(ProviderErrorKind),
    /// Nothing to answer; the chat was left untouched.
    Nothing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub source: ReplySource,
}

#[derive(Debug, Clone)]
pub struct GenerationReport {
    /// The chat as stored when the cycle finished.
    pub chat: Chat,
    /// `None` when nothing was committed.
    pub reply: Option<Reply>,
}

impl GenerationReport {
    pub fn source(&self) -> ReplySource {
        self.reply
            .as_ref()
            .map(|reply| reply.source)
            .unwrap_or(ReplySource::Nothing)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Updated { chat_id: String },
}

#[derive(Debug)]
pub enum OrchestratorError {
    ChatNotFound(String),
    CharacterNotFound(String),
    /// Another cycle for this chat has not finished yet.
    GenerationInProgress(String),
    Storage(StorageError),
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestratorError::ChatNotFound(id) => write!(f, "Chat '{id}' not found"),
            OrchestratorError::CharacterNotFound(id) => write!(f, "Character '{id}' not found"),
            OrchestratorError::GenerationInProgress(id) => {
                write!(f, "A reply is already being generated for chat '{id}'")
            }
            OrchestratorError::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for OrchestratorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            OrchestratorError::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StorageError> for OrchestratorError {
    fn from(err: StorageError) -> Self {
        OrchestratorError::Storage(err)
    }
}

/// Marks a chat as busy for as long as it is alive.
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    chat_id: String,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(in_flight: &'a Mutex<HashSet<String>>, chat_id: &str) -> Option<Self> {
        let mut busy = match in_flight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !busy.insert(chat_id.to_string()) {
            return None;
        }
        Some(Self {
            in_flight,
            chat_id: chat_id.to_string(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut busy = match self.in_flight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        busy.remove(&self.chat_id);
    }
}

pub struct ResponseOrchestrator {
    storage: Arc<dyn Storage>,
    registry: Arc<ProviderRegistry>,
    client: reqwest::Client,
    clock: Arc<dyn Clock>,
    entropy: Arc<dyn Entropy>,
    in_flight: Mutex<HashSet<String>>,
    events: broadcast::Sender<ChatEvent>,
}

impl ResponseOrchestrator {
    pub fn new(
        storage: Arc<dyn Storage>,
        registry: Arc<ProviderRegistry>,
        client: reqwest::Client,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            storage,
            registry,
            client,
            clock: Arc::new(SystemClock),
            entropy: Arc::new(SystemEntropy),
            in_flight: Mutex::new(HashSet::new()),
            events,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_entropy(mut self, entropy: Arc<dyn Entropy>) -> Self {
        self.entropy = entropy;
        self
    }

    /// Notifications sent after each committed write.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    /// Run one generation cycle for `chat_id`.
    ///
    /// Call after the user's message has been stored. Provider failures are
    /// absorbed into a local reply; only storage problems, missing records
    /// and a concurrent cycle for the same chat are returned as errors.
    pub async fn generate_response(
        &self,
        chat_id: &str,
    ) -> Result<GenerationReport, OrchestratorError> {
        let _guard = InFlightGuard::acquire(&self.in_flight, chat_id)
            .ok_or_else(|| OrchestratorError::GenerationInProgress(chat_id.to_string()))?;

        self.enter(chat_id, GenerationPhase::AwaitingGreetingCheck);
        let chat = self
            .storage
            .get_chat(chat_id)
            .await?
            .ok_or_else(|| OrchestratorError::ChatNotFound(chat_id.to_string()))?;
        let character = self
            .storage
            .get_character(&chat.character_id)
            .await?
            .ok_or_else(|| OrchestratorError::CharacterNotFound(chat.character_id.clone()))?;

        if chat.messages.is_empty() {
            let report = self.commit_greeting(&chat, &character).await;
            self.enter(chat_id, GenerationPhase::Idle);
            return report;
        }

        let Some(user_message) = chat.last_user_message() else {
            debug!(chat_id, "No user message to answer");
            self.enter(chat_id, GenerationPhase::Idle);
            return Ok(GenerationReport { chat, reply: None });
        };
        let user_text = user_message.content.clone();
        if chat
            .last_conversational_message()
            .is_some_and(Message::is_character)
        {
            debug!(chat_id, "Latest user message already answered");
            self.enter(chat_id, GenerationPhase::Idle);
            return Ok(GenerationReport { chat, reply: None });
        }

        let settings = self.storage.get_user_settings().await?;
        let typing = Message::typing(self.entropy.new_id("msg"), &character.name, self.clock.now());
        self.storage.add_message(chat_id, typing).await?;
        self.notify(chat_id);

        let (raw, source) = self
            .produce_reply(&chat, &character, &settings, &user_text)
            .await;

        self.enter(chat_id, GenerationPhase::PostProcessing);
        let text = postprocess::process(Some(&raw), &character);

        let report = self.commit_reply(chat_id, text, source).await;
        self.enter(chat_id, GenerationPhase::Idle);
        report
    }

    async fn commit_greeting(
        &self,
        chat: &Chat,
        character: &Character,
    ) -> Result<GenerationReport, OrchestratorError> {
        let text = character.greeting_or_default();
        let greeting = Message::new(
            self.entropy.new_id("msg"),
            Sender::Character,
            text.clone(),
            self.clock.now(),
        );
        let chat = self.storage.add_message(&chat.id, greeting).await?;
        self.notify(&chat.id);
        info!(chat_id = %chat.id, character = %character.id, "Greeting committed");
        Ok(GenerationReport {
            chat,
            reply: Some(Reply {
                text,
                source: ReplySource::Greeting,
            }),
        })
    }

    /// Remote text when the provider answers, otherwise the local fallback.
    /// Never fails.
    async fn produce_reply(
        &self,
        chat: &Chat,
        character: &Character,
        settings: &UserSettings,
        user_text: &str,
    ) -> (String, ReplySource) {
        self.enter(&chat.id, GenerationPhase::BuildingPrompt);
        let prompt = build_prompt(character, &chat.messages);
        let mut options = resolve_options(character, settings);

        self.enter(&chat.id, GenerationPhase::Dispatching);
        match self.dispatch(&prompt, &mut options, settings).await {
            Ok(text) => (text, ReplySource::Remote),
            Err(err) => {
                self.enter(&chat.id, GenerationPhase::Error);
                if err.kind.is_configuration() {
                    warn!(
                        chat_id = %chat.id,
                        model = %options.model,
                        kind = %err.kind,
                        "Provider is not configured for this model; using local reply: {}",
                        err.message
                    );
                } else {
                    warn!(
                        chat_id = %chat.id,
                        model = %options.model,
                        kind = %err.kind,
                        "Provider call failed; using local reply: {}",
                        err.message
                    );
                }
                let text = fallback::local_reply(character, user_text, self.entropy.as_ref());
                (text, ReplySource::Fallback(err.kind))
            }
        }
    }

    async fn dispatch(
        &self,
        prompt: &[ChatMessage],
        options: &mut GenerationOptions,
        settings: &UserSettings,
    ) -> Result<String, ProviderError> {
        let resolved = self.registry.resolve(&options.model)?;

        for (slot, secret) in settings.credentials() {
            self.registry.set_credential(slot, secret);
        }
        let credential = self.registry.credential(&resolved.credential_slot);

        if resolved.kind == ProviderKind::OpenRouter {
            options.specific_model = if resolved.model == OPENROUTER_ANY {
                settings.openrouter_model.clone()
            } else {
                Some(resolved.model.clone())
            };
        }

        let adapter = adapter_for(&resolved, self.client.clone(), credential);
        debug!(
            provider = adapter.name(),
            model = %resolved.id,
            endpoint = %resolved.endpoint,
            "Dispatching generation request"
        );
        adapter.generate(prompt, options).await
    }

    async fn commit_reply(
        &self,
        chat_id: &str,
        text: String,
        source: ReplySource,
    ) -> Result<GenerationReport, OrchestratorError> {
        self.enter(chat_id, GenerationPhase::Committing);
        let reply = Message::new(
            self.entropy.new_id("msg"),
            Sender::Character,
            text.clone(),
            self.clock.now(),
        );
        let reply_id = reply.id.clone();
        let committed = self
            .storage
            .update_chat(chat_id, ChatUpdate::commit_reply(reply))
            .await;
        self.notify(chat_id);
        let chat = committed?;

        if !chat.messages.last().is_some_and(|last| last.id == reply_id) {
            info!(chat_id, "Turn was answered by another session; reply dropped");
            return Ok(GenerationReport { chat, reply: None });
        }
        info!(chat_id, source = ?source, "Reply committed");

        Ok(GenerationReport {
            chat,
            reply: Some(Reply { text, source }),
        })
    }

    fn notify(&self, chat_id: &str) {
        // No subscribers is fine.
        let _ = self.events.send(ChatEvent::Updated {
            chat_id: chat_id.to_string(),
        });
    }

    fn enter(&self, chat_id: &str, phase: GenerationPhase) {
        debug!(chat_id, phase = %phase, "Generation phase");
    }
}

/// Character values first, then settings, then built-in defaults.
pub fn resolve_options(character: &Character, settings: &UserSettings) -> GenerationOptions {
    let model = character
        .model_override()
        .map(str::to_string)
        .or_else(|| {
            settings
                .default_model
                .as_deref()
                .map(str::trim)
                .filter(|model| !model.is_empty() && *model != DEFAULT_MODEL_SENTINEL)
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    GenerationOptions {
        model,
        temperature: character
            .temperature
            .or(settings.temperature)
            .unwrap_or(DEFAULT_TEMPERATURE),
        max_tokens: character
            .max_tokens
            .or(settings.max_tokens)
            .filter(|tokens| *tokens > 0)
            .unwrap_or(DEFAULT_MAX_TOKENS),
        top_p: character.top_p.unwrap_or(DEFAULT_TOP_P),
        presence_penalty: character
            .presence_penalty
            .unwrap_or(DEFAULT_PRESENCE_PENALTY),
        frequency_penalty: character
            .frequency_penalty
            .unwrap_or(DEFAULT_FREQUENCY_PENALTY),
        specific_model: None,
    }
}
