//! QA prompt template

use super::{ChatMessage, Role};

/// System instruction for every answer
pub const QA_SYSTEM_PROMPT: &str = "You are an assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer the question. \
If you don't know the answer, just say that you don't know. \
Use three sentences maximum and keep the answer concise.";

/// Separator placed between chunk texts
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Human turn carrying the question and the joined context
pub fn human_prompt(question: &str, context: &str) -> String {
    format!("Question: {question}\n\nContext: {context}\n\nAnswer:")
}

/// Fill the two-role template
pub fn build_messages(question: &str, context: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage {
            role: Role::System,
            content: QA_SYSTEM_PROMPT.to_string(),
        },
        ChatMessage {
            role: Role::User,
            content: human_prompt(question, context),
        },
    ]
}
