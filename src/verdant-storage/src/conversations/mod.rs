//! Conversation persistence.
//!
//! Split into focused submodules:
//! - `types` - `Conversation` and `Message` records
//! - `storage` - CRUD, search and export over the data directory
//! - `query` - filter/sort builder

mod query;
mod storage;
mod types;

pub use query::{ConversationQuery, ConversationSort};
pub use storage::{export_filename, ConversationStorage};
pub use types::{message_preview, Conversation, Message, DEFAULT_TITLE, TITLE_PREVIEW_LEN};
