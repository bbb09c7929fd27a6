//! Chat commands: start, talk, read back, list and delete.

use std::error::Error;

use chrono::Utc;

use crate::character::Character;
use crate::core::entropy::{Entropy, SystemEntropy};
use crate::core::message::{Chat, Message, Sender};
use crate::core::orchestrator::{GenerationReport, ReplySource, ResponseOrchestrator};
use crate::core::storage::Storage;
use crate::core::store::LocalStore;

pub async fn new_chat(
    store: &LocalStore,
    orchestrator: &ResponseOrchestrator,
    character_id: &str,
) -> Result<(), Box<dyn Error>> {
    let chat = store.create_chat(character_id).await?;
    let report = orchestrator.generate_response(&chat.id).await?;
    let name = character_name(store, &chat.character_id).await?;

    println!("💬 Started chat {}", chat.id);
    if let Some(reply) = &report.reply {
        println!("{name}: {}", reply.text);
    }
    store.mark_chat_read(&chat.id).await?;
    Ok(())
}

pub async fn run_say(
    store: &LocalStore,
    orchestrator: &ResponseOrchestrator,
    chat_id: &str,
    words: Vec<String>,
) -> Result<(), Box<dyn Error>> {
    let text = words.join(" ");
    if text.trim().is_empty() {
        return Err("Usage: charchat say <chat-id> <message>".into());
    }

    let message = Message::new(SystemEntropy.new_id("msg"), Sender::User, text, Utc::now());
    store.add_message(chat_id, message).await?;

    let report = orchestrator.generate_response(chat_id).await?;
    let name = character_name(store, &report.chat.character_id).await?;
    print_reply(&report, &name);
    store.mark_chat_read(chat_id).await?;
    Ok(())
}

fn print_reply(report: &GenerationReport, name: &str) {
    let Some(reply) = &report.reply else {
        println!("(nothing to reply to)");
        return;
    };
    println!("{name}: {}", reply.text);
    if let ReplySource::Fallback(kind) = reply.source {
        if kind.is_configuration() {
            eprintln!("⚠️  Provider not configured ({kind}); replied locally. See 'charchat auth'.");
        } else {
            eprintln!("⚠️  Provider unavailable ({kind}); replied locally.");
        }
    }
}

pub async fn show_history(store: &LocalStore, chat_id: &str) -> Result<(), Box<dyn Error>> {
    let chat = store
        .get_chat(chat_id)
        .await?
        .ok_or_else(|| format!("Chat '{chat_id}' not found"))?;
    let name = character_name(store, &chat.character_id).await?;

    print!("{}", render_transcript(&chat, &name));
    store.mark_chat_read(chat_id).await?;
    Ok(())
}

pub fn render_transcript(chat: &Chat, character_name: &str) -> String {
    let mut output = String::new();
    for message in chat.messages.iter().filter(|message| !message.is_typing) {
        let speaker = match message.sender {
            Sender::User => "You",
            Sender::Character => character_name,
            Sender::System => "*",
        };
        output.push_str(&format!(
            "[{}] {speaker}: {}\n",
            message.timestamp.format("%Y-%m-%d %H:%M"),
            message.content
        ));
    }
    output
}

pub async fn list_chats(store: &LocalStore) -> Result<(), Box<dyn Error>> {
    let chats = store.list_chats().await?;
    if chats.is_empty() {
        println!("No chats yet.");
        println!("\n💡 Start one with:");
        println!("   charchat new <character-id>");
        return Ok(());
    }
    for chat in &chats {
        let name = character_name(store, &chat.character_id).await?;
        println!("{}", render_chat_line(chat, &name));
    }
    Ok(())
}

pub fn render_chat_line(chat: &Chat, character_name: &str) -> String {
    let unread = if chat.unread { "● " } else { "  " };
    format!(
        "{unread}{} with {character_name} ({} messages, updated {})",
        chat.id,
        chat.messages.len(),
        chat.updated_at.format("%Y-%m-%d %H:%M")
    )
}

pub async fn delete_chat(store: &LocalStore, chat_id: &str) -> Result<(), Box<dyn Error>> {
    store.delete_chat(chat_id).await?;
    println!("✅ Deleted chat {chat_id}");
    Ok(())
}

/// Display name for a character id; deleted characters show their id.
async fn character_name(store: &LocalStore, character_id: &str) -> Result<String, Box<dyn Error>> {
    Ok(store
        .get_character(character_id)
        .await?
        .map(|character: Character| character.name)
        .unwrap_or_else(|| character_id.to_string()))
}
