pub mod chat_history;
pub mod task_store;

pub use chat_history::{ChatHistoryProvider, ChatMessage, SqliteChatHistoryProvider};
pub use task_store::TaskStore;
