//! services/api/src/adapters/reflection_llm.rs
//!
//! This module contains the adapter for the reflection-generating LLM.
//! It implements the `ReflectionService` port from the `core` crate.

const SYSTEM_INSTRUCTIONS: &str = r#"You are a spiritual assistant for a devotional application.

You will be given one Bible verse and its reference.

Task:
1. Write a deep, comforting theological explanation of the verse (2 sentences).
2. Write a short prayer based on the verse (2 sentences).

Output strictly valid JSON in exactly this shape, with no surrounding prose:
{
  "explanation": "...",
  "prayer": "..."
}"#;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use devotional_core::domain::Reflection;
use devotional_core::ports::{PortError, PortResult, ReflectionService};
use regex::Regex;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ReflectionService` using an OpenAI-compatible
/// LLM.
#[derive(Clone)]
pub struct OpenAiReflectionAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiReflectionAdapter {
    /// Creates a new `OpenAiReflectionAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// Pulls the JSON object out of a model reply that may wrap it in code
    /// fences or stray prose.
    fn parse_reflection(raw: &str) -> PortResult<Reflection> {
        let object_regex = Regex::new(r"(?s)\{.*\}")
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let json = object_regex
            .find(raw)
            .map(|m| m.as_str())
            .ok_or_else(|| {
                PortError::Unexpected("Reflection LLM reply contained no JSON object.".to_string())
            })?;
        let reflection: Reflection = serde_json::from_str(json)
            .map_err(|e| PortError::Unexpected(format!("Malformed reflection JSON: {}", e)))?;
        if reflection.explanation.trim().is_empty() || reflection.prayer.trim().is_empty() {
            return Err(PortError::Unexpected(
                "Reflection LLM returned empty fields.".to_string(),
            ));
        }
        Ok(reflection)
    }
}

//=========================================================================================
// `ReflectionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ReflectionService for OpenAiReflectionAdapter {
    /// Generates the explanation/prayer pair for one verse.
    async fn generate_reflection(
        &self,
        verse_text: &str,
        reference: &str,
    ) -> PortResult<Reflection> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(format!("Verse: \"{}\" ({})", verse_text, reference))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which
        // respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Network(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected(
                    "Reflection LLM returned no choices in its response.".to_string(),
                )
            })?;

        Self::parse_reflection(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_bare_json_reply() {
        let raw = r#"{"explanation": "God's love is unconditional.", "prayer": "Lord, thank you."}"#;
        let reflection = OpenAiReflectionAdapter::parse_reflection(raw).unwrap();
        assert_eq!(reflection.explanation, "God's love is unconditional.");
        assert_eq!(reflection.prayer, "Lord, thank you.");
    }

    #[test]
    fn parses_a_fenced_json_reply() {
        let raw = "Here you go:\n```json\n{\"explanation\": \"E.\", \"prayer\": \"P.\"}\n```";
        let reflection = OpenAiReflectionAdapter::parse_reflection(raw).unwrap();
        assert_eq!(reflection.explanation, "E.");
        assert_eq!(reflection.prayer, "P.");
    }

    #[test]
    fn rejects_replies_without_json_or_with_empty_fields() {
        assert!(OpenAiReflectionAdapter::parse_reflection("no json here").is_err());
        assert!(OpenAiReflectionAdapter::parse_reflection(
            r#"{"explanation": "", "prayer": "P."}"#
        )
        .is_err());
        assert!(OpenAiReflectionAdapter::parse_reflection(r#"{"explanation": "E."}"#).is_err());
    }
}
