pub mod card;
pub mod catalog;

// Re-exports for internal module use
pub use card::{Character, DialogueExample};
