//! Application core for Verdant
//!
//! Owns everything between the completion engine and the view layer: the
//! chat orchestrator (the only component allowed to mutate conversation
//! state), the conversation manager, the persisted settings and model
//! stores, and the transient notification channel.

mod conversations;
mod error;
mod models;
mod notify;
mod session;
mod settings;

pub use conversations::ConversationManager;
pub use error::{AppError, Result};
pub use models::ModelStore;
pub use notify::{Notice, NoticeLevel, Notifier, NOTICE_TTL};
pub use session::{ChatSession, VISION_FALLBACK_PROMPT};
pub use settings::{apply_theme, Preset, Settings, SettingsStore, Theme};
