pub mod core;
pub mod embedding;
pub mod history;
pub mod llm;
pub mod rag;
pub mod server;
pub mod state;
pub mod vector;
