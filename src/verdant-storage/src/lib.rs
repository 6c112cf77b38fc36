//! Verdant Storage - conversation persistence
//!
//! Stores each conversation as one JSON document in an OS-appropriate data
//! directory, and offers recency/substring queries plus file export.
//!
//! - **Windows**: `%APPDATA%\Verdant\`
//! - **macOS**: `~/Library/Application Support/Verdant/`
//! - **Linux**: `~/.local/share/Verdant/`
//!
//! # Usage
//!
//! ```rust,no_run
//! use verdant_storage::{Conversation, ConversationStorage, Message};
//! use verdant_engine::MessageContent;
//!
//! #[tokio::main]
//! async fn main() -> verdant_storage::Result<()> {
//!     let storage = ConversationStorage::new()?;
//!     storage.init().await?;
//!
//!     let mut conversation = Conversation::new();
//!     conversation.push_message(Message::user(MessageContent::Text("Hello!".into())));
//!     storage.save(&conversation).await?;
//!
//!     let all = storage.list().await?;
//!     println!("{} conversations", all.len());
//!     Ok(())
//! }
//! ```

pub mod conversations;
pub mod error;
pub mod paths;

pub use conversations::{
    export_filename, message_preview, Conversation, ConversationQuery, ConversationSort,
    ConversationStorage, Message, DEFAULT_TITLE, TITLE_PREVIEW_LEN,
};
pub use error::{Result, StorageError};
pub use paths::{verdant_config_dir, verdant_data_dir, VerdantPaths, CONFIG_FILE};
