//! Prompt and memory text assembly.

/// Join recalled memories into the context block (empty when none).
pub fn build_context(memories: &[String]) -> String {
    memories.join("\n")
}

/// Ground the user's message in recalled context.
pub fn compose_prompt(context: &str, message: &str) -> String {
    format!("Context from previous interactions:\n{context}\n\nUser: {message}\nAI:")
}

/// Text remembered from one completed exchange.
pub fn memory_text(user_message: &str, reply: &str) -> String {
    format!("{user_message} {reply}")
}
