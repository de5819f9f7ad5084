//! Document indexing and hybrid retrieval-augmented generation.

pub mod chunker;
pub mod extract;
pub mod generate;
pub mod indexer;
pub mod retriever;
pub mod session;

use serde::{Deserialize, Serialize};

/// One completed exchange in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub human_message: String,
    pub ai_response: String,
}

/// Uploaded-file metadata as recorded by the file registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub file_id: String,
    pub file_name: String,
    pub file_type: String,
    pub file_path: String,
}
