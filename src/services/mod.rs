pub mod dialogue;
pub mod library;
pub mod llm;
pub mod openbd;
