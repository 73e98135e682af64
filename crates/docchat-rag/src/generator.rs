//! Answer generation from a question and retrieved context

use std::sync::Arc;

use docchat_core::{ChatMessage, LlmClient, Result};

/// Assistant persona used when the config does not override it
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a virtual assistant for the document \
provided as context. Help the user understand its content, explaining clearly and \
objectively in the language of the question. Use only the provided context. If the \
context does not contain enough information, say that you do not know instead of \
making something up.";

// ============================================================================
// Prompt Builder
// ============================================================================

/// Builder for the two-message completion prompt
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system_instruction: String,
    question: String,
    context: String,
}

impl PromptBuilder {
    /// Create a new prompt builder with the default system prompt
    pub fn new() -> Self {
        Self {
            system_instruction: DEFAULT_SYSTEM_PROMPT.to_string(),
            question: String::new(),
            context: String::new(),
        }
    }

    /// Set system instruction
    pub fn system(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    /// Set the question
    pub fn question(mut self, q: impl Into<String>) -> Self {
        self.question = q.into();
        self
    }

    /// Set the retrieved context, forwarded as is (may be empty)
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Build the system and user messages
    pub fn build(self) -> Vec<ChatMessage> {
        let user = format!(
            "Question:\n{}\n\nContext (document content):\n{}",
            self.question, self.context
        );
        vec![
            ChatMessage::system(self.system_instruction),
            ChatMessage::user(user),
        ]
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Answer Generator
// ============================================================================

/// Sends question and context to the completion model
pub struct AnswerGenerator {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl AnswerGenerator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Replace the system prompt
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Generate an answer; the model reply is returned trimmed
    pub async fn answer(&self, question: &str, context: &str) -> Result<String> {
        let messages = PromptBuilder::new()
            .system(self.system_prompt.as_str())
            .question(question)
            .context(context)
            .build();

        tracing::info!(
            "Calling {} with {} chars of context",
            self.llm.name(),
            context.len()
        );
        let answer = self.llm.complete(&messages).await?;
        let answer = answer.trim().to_string();
        tracing::info!("LLM response received: {} chars", answer.len());

        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docchat_core::Role;

    #[test]
    fn test_prompt_builder() {
        let messages = PromptBuilder::new()
            .system("You are a helpful assistant.")
            .question("What is the answer?")
            .context("alpha\n\n---\n\nbeta")
            .build();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, "You are a helpful assistant.");
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(
            messages[1].content,
            "Question:\nWhat is the answer?\n\nContext (document content):\nalpha\n\n---\n\nbeta"
        );
    }

    #[test]
    fn test_default_system_prompt() {
        let messages = PromptBuilder::default().question("q").build();
        assert_eq!(messages[0].content, DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn test_empty_context_kept() {
        let messages = PromptBuilder::new().question("q").build();
        assert!(messages[1].content.ends_with("Context (document content):\n"));
    }
}
