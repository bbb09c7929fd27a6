//! Local key-value store backing chats and user characters.
//!
//! Every mutation takes an exclusive lock on `<store>.lock`, re-reads the
//! document, applies the change and rewrites the file atomically, so
//! concurrent `charchat` processes never lose each other's writes. Within a
//! process one async mutex serializes access as well.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use directories::ProjectDirs;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::debug;

use crate::character::card::{SYSTEM_ID_PREFIX, USER_ID_PREFIX};
use crate::character::catalog::load_builtin_characters;
use crate::character::Character;
use crate::core::entropy::{Clock, Entropy, SystemClock, SystemEntropy};
use crate::core::message::{Chat, Message};
use crate::core::storage::{ChatUpdate, Storage, StorageError, UserSettings};

const STORE_FILE_NAME: &str = "store.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    characters: Vec<Character>,
    #[serde(default)]
    chats: Vec<Chat>,
}

impl StoreDocument {
    fn chat_mut(&mut self, id: &str) -> Result<&mut Chat, StorageError> {
        self.chats
            .iter_mut()
            .find(|chat| chat.id == id)
            .ok_or_else(|| StorageError::ChatNotFound(id.to_string()))
    }

    /// A missing or blank file is an empty store.
    fn read(path: &Path) -> Result<Self, StorageError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn write(&self, path: &Path) -> Result<(), StorageError> {
        let parent = path.parent().filter(|dir| !dir.as_os_str().is_empty());
        if let Some(dir) = parent {
            fs::create_dir_all(dir)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir)?,
            None => NamedTempFile::new()?,
        };
        temp_file.write_all(contents.as_bytes())?;
        temp_file.as_file_mut().sync_all()?;
        temp_file.persist(path).map_err(|err| StorageError::Io(err.error))?;
        Ok(())
    }
}

/// Exclusive advisory lock on the file next to the store, released when
/// dropped. The lock file itself stays on disk: unlinking it would let a
/// waiter and a newcomer lock two different files.
struct StoreLock {
    _file: File,
}

impl StoreLock {
    fn acquire(store_path: &Path) -> Result<Self, StorageError> {
        let lock_path = store_path.with_extension("lock");
        if let Some(dir) = lock_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        file.lock_exclusive()?;
        Ok(Self { _file: file })
    }
}

pub struct LocalStore {
    path: Option<PathBuf>,
    /// The whole store in memory mode; the last document read otherwise.
    state: Mutex<StoreDocument>,
    catalog: Vec<Character>,
    settings: UserSettings,
    clock: Arc<dyn Clock>,
    entropy: Arc<dyn Entropy>,
}

impl LocalStore {
    /// A store that never touches disk.
    pub fn in_memory(settings: UserSettings) -> Self {
        Self::with_document(None, StoreDocument::default(), settings)
    }

    /// Open (or start) the store document at `path`. The file is read here
    /// only to report a corrupt store early; every call re-reads it.
    pub fn open(path: PathBuf, settings: UserSettings) -> Result<Self, StorageError> {
        let document = StoreDocument::read(&path)?;
        debug!(path = %path.display(), "Opened local store");
        Ok(Self::with_document(Some(path), document, settings))
    }

    pub fn open_default(settings: UserSettings) -> Result<Self, StorageError> {
        Self::open(Self::default_path()?, settings)
    }

    /// `$CHARCHAT_DATA_DIR/store.json`, else the platform data directory.
    pub fn default_path() -> Result<PathBuf, StorageError> {
        if let Some(dir) = std::env::var_os("CHARCHAT_DATA_DIR") {
            return Ok(PathBuf::from(dir).join(STORE_FILE_NAME));
        }
        let dirs = ProjectDirs::from("org", "charchat", "charchat").ok_or_else(|| {
            StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not determine a data directory",
            ))
        })?;
        Ok(dirs.data_dir().join(STORE_FILE_NAME))
    }

    fn with_document(path: Option<PathBuf>, document: StoreDocument, settings: UserSettings) -> Self {
        Self {
            path,
            state: Mutex::new(document),
            catalog: load_builtin_characters(),
            settings,
            clock: Arc::new(SystemClock),
            entropy: Arc::new(SystemEntropy),
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

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `view` against the current document.
    async fn read<R>(&self, view: impl FnOnce(&StoreDocument) -> R) -> Result<R, StorageError> {
        let mut state = self.state.lock().await;
        if let Some(path) = &self.path {
            *state = StoreDocument::read(path)?;
        }
        Ok(view(&*state))
    }

    /// Lock, re-read, apply `change` and write back. Nothing is written
    /// when `change` fails.
    async fn update<R>(
        &self,
        change: impl FnOnce(&mut StoreDocument) -> Result<R, StorageError>,
    ) -> Result<R, StorageError> {
        let mut state = self.state.lock().await;
        let Some(path) = &self.path else {
            return change(&mut *state);
        };

        let _lock = StoreLock::acquire(path)?;
        *state = StoreDocument::read(path)?;
        let result = change(&mut *state)?;
        state.write(path)?;
        Ok(result)
    }

    pub async fn create_chat(&self, character_id: &str) -> Result<Chat, StorageError> {
        if self.get_character(character_id).await?.is_none() {
            return Err(StorageError::CharacterNotFound(character_id.to_string()));
        }

        let chat = Chat::new(self.entropy.new_id("chat"), character_id, self.clock.now());
        self.update(move |document| {
            document.chats.push(chat.clone());
            Ok(chat)
        })
        .await
    }

    /// All chats, most recently updated first.
    pub async fn list_chats(&self) -> Result<Vec<Chat>, StorageError> {
        let mut chats = self.read(|document| document.chats.clone()).await?;
        chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(chats)
    }

    pub async fn delete_chat(&self, id: &str) -> Result<(), StorageError> {
        self.update(|document| {
            let before = document.chats.len();
            document.chats.retain(|chat| chat.id != id);
            if document.chats.len() == before {
                return Err(StorageError::ChatNotFound(id.to_string()));
            }
            Ok(())
        })
        .await
    }

    pub async fn mark_chat_read(&self, id: &str) -> Result<Chat, StorageError> {
        self.update_chat(id, ChatUpdate::mark_read()).await
    }

    /// Catalog characters followed by user characters.
    pub async fn list_characters(&self) -> Result<Vec<Character>, StorageError> {
        let user_characters = self.read(|document| document.characters.clone()).await?;
        Ok(self
            .catalog
            .iter()
            .cloned()
            .chain(user_characters)
            .collect())
    }

    /// Insert or replace a user character. Characters without a user id
    /// are given a fresh one; catalog ids are refused.
    pub async fn save_character(&self, mut character: Character) -> Result<Character, StorageError> {
        if character.id.starts_with(SYSTEM_ID_PREFIX) {
            return Err(StorageError::ReadOnlyCharacter(character.id));
        }
        if !character.id.starts_with(USER_ID_PREFIX) {
            character.id = self.entropy.new_id(USER_ID_PREFIX.trim_end_matches('-'));
        }

        self.update(move |document| {
            match document
                .characters
                .iter_mut()
                .find(|existing| existing.id == character.id)
            {
                Some(existing) => *existing = character.clone(),
                None => document.characters.push(character.clone()),
            }
            Ok(character)
        })
        .await
    }
}

#[async_trait]
impl Storage for LocalStore {
    async fn get_chat(&self, id: &str) -> Result<Option<Chat>, StorageError> {
        self.read(|document| document.chats.iter().find(|chat| chat.id == id).cloned())
            .await
    }

    async fn update_chat(&self, id: &str, update: ChatUpdate) -> Result<Chat, StorageError> {
        let now = self.clock.now();
        self.update(move |document| {
            let chat = document.chat_mut(id)?;
            update.apply(chat);
            chat.updated_at = now;
            Ok(chat.clone())
        })
        .await
    }

    async fn get_character(&self, id: &str) -> Result<Option<Character>, StorageError> {
        if let Some(character) = self.catalog.iter().find(|character| character.id == id) {
            return Ok(Some(character.clone()));
        }
        self.read(|document| {
            document
                .characters
                .iter()
                .find(|character| character.id == id)
                .cloned()
        })
        .await
    }

    async fn add_message(&self, chat_id: &str, message: Message) -> Result<Chat, StorageError> {
        let now = self.clock.now();
        self.update(move |document| {
            let chat = document.chat_mut(chat_id)?;
            if message.is_character() {
                chat.unread = true;
            }
            chat.messages.push(message);
            chat.updated_at = now;
            Ok(chat.clone())
        })
        .await
    }

    async fn get_user_settings(&self) -> Result<UserSettings, StorageError> {
        Ok(self.settings.clone())
    }
}
