pub mod conversation_store;
pub mod views;

pub use conversation_store::ConversationStore;
pub use views::{ConversationQuery, SortDirection, SortField};
