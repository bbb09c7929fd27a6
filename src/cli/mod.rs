//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod character_list;
pub mod chat;
pub mod model_list;
pub mod settings;


use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::core::config::Config;
use crate::core::keyring::SecretVault;
use crate::core::orchestrator::{build_http_client, ResponseOrchestrator};
use crate::core::providers::ProviderRegistry;
use crate::core::storage::Storage;
use crate::core::store::LocalStore;
use crate::logging::init_tracing;

#[derive(Parser)]
#[command(name = "charchat")]
#[command(about = "Chat with characters backed by hosted language models")]
#[command(
    long_about = "charchat keeps conversations with characters in a local store and answers \
each message through a hosted model (OpenAI, OpenRouter or a small-model inference \
endpoint). When the provider cannot answer, the character replies from its own \
dialogue examples instead.\n\n\
Authentication:\n\
  Use 'charchat auth <provider>' to store API keys in your system keyring.\n\n\
Environment Variables (used when no key is configured):\n\
  OPENAI_API_KEY        OpenAI key\n\
  OPENROUTER_API_KEY    OpenRouter key\n\
  HUGGINGFACE_API_KEY   Inference endpoint token (optional)\n\
  CHARCHAT_CONFIG       Config file location\n\
  CHARCHAT_DATA_DIR     Chat store directory\n\
  RUST_LOG              Log filter (overrides --verbose)"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Print debug logs to stderr
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// List available models
    Models,
    /// List built-in and imported characters
    Characters,
    /// Import a character from a JSON file
    Import {
        file: PathBuf,
    },
    /// Start a chat with a character
    New {
        character_id: String,
    },
    /// Send a message and print the reply
    Say {
        chat_id: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        message: Vec<String>,
    },
    /// Print a chat transcript
    History {
        chat_id: String,
    },
    /// List chats
    Chats,
    /// Delete a chat
    Delete {
        chat_id: String,
    },
    /// Set a configuration value, or show the configuration with no key
    Set {
        key: Option<String>,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Unset a configuration value
    Unset {
        key: String,
    },
    /// Store a provider API key in the system keyring
    Auth {
        provider: String,
        /// Remove the stored key instead
        #[arg(long)]
        remove: bool,
    },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(err) = run(args.command).await {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: Commands) -> Result<(), Box<dyn Error>> {
    match command {
        Commands::Models => model_list::list_models(&Config::load()?),
        Commands::Set { key: None, .. } => settings::print_config(),
        Commands::Set {
            key: Some(key),
            value,
        } => {
            if value.is_empty() {
                return Err(format!("Usage: charchat set {key} <value>").into());
            }
            settings::set_value(&key, value)
        }
        Commands::Unset { key } => settings::unset_value(&key),
        Commands::Auth { provider, remove } => settings::run_auth(&provider, remove),
        command => {
            let session = Session::open()?;
            session.run(command).await
        }
    }
}

/// Store and orchestrator wired from the user's configuration.
struct Session {
    store: Arc<LocalStore>,
    orchestrator: ResponseOrchestrator,
}

impl Session {
    fn open() -> Result<Self, Box<dyn Error>> {
        let config = Config::load()?;
        let settings = config.user_settings(&SecretVault::system());
        let store = Arc::new(LocalStore::open_default(settings)?);

        let mut registry = ProviderRegistry::new();
        config.apply_base_urls(&mut registry);
        let client = build_http_client(config.request_timeout())?;

        let storage: Arc<dyn Storage> = store.clone();
        let orchestrator = ResponseOrchestrator::new(storage, Arc::new(registry), client);
        Ok(Self {
            store,
            orchestrator,
        })
    }

    async fn run(&self, command: Commands) -> Result<(), Box<dyn Error>> {
        let store = self.store.as_ref();
        match command {
            Commands::Characters => character_list::list_characters(store).await,
            Commands::Import { file } => character_list::import_character(store, &file).await,
            Commands::New { character_id } => {
                chat::new_chat(store, &self.orchestrator, &character_id).await
            }
            Commands::Say { chat_id, message } => {
                chat::run_say(store, &self.orchestrator, &chat_id, message).await
            }
            Commands::History { chat_id } => chat::show_history(store, &chat_id).await,
            Commands::Chats => chat::list_chats(store).await,
            Commands::Delete { chat_id } => chat::delete_chat(store, &chat_id).await,
            Commands::Models
            | Commands::Set { .. }
            | Commands::Unset { .. }
            | Commands::Auth { .. } => Ok(()),
        }
    }
}
