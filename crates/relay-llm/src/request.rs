//! Validation of inbound chat requests

use relay_config::RelayConfig;
use relay_core::ChatRequest;

use crate::error::RelayError;

/// Validated request with every default applied
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// User prompt, never blank
    pub prompt: String,
    /// System prompt, if any
    pub system_prompt: Option<String>,
    /// Sampling temperature in `[0, 1]`
    pub temperature: f64,
    /// Positive token ceiling, at most the configured limit
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Validate `request` and fill omitted fields from `config`
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Validation` when the prompt is blank or a
    /// numeric field is out of range
    pub fn from_chat(request: ChatRequest, config: &RelayConfig) -> Result<Self, RelayError> {
        if request.message.trim().is_empty() {
            return Err(RelayError::Validation("message must not be empty".to_owned()));
        }

        let temperature = request.temperature.unwrap_or(config.default_temperature);
        if !temperature.is_finite() || !(0.0..=1.0).contains(&temperature) {
            return Err(RelayError::Validation(format!(
                "temperature must be within [0, 1], got {temperature}"
            )));
        }

        let max_tokens = request.max_tokens.unwrap_or(config.default_max_tokens);
        if max_tokens == 0 || max_tokens > config.max_tokens_limit {
            return Err(RelayError::Validation(format!(
                "maxTokens must be between 1 and {}, got {max_tokens}",
                config.max_tokens_limit
            )));
        }

        let system_prompt = request
            .system_prompt
            .filter(|prompt| !prompt.trim().is_empty())
            .or_else(|| config.default_system_prompt.clone());

        Ok(Self {
            prompt: request.message,
            system_prompt,
            temperature,
            max_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_defaults() {
        let config = RelayConfig {
            default_system_prompt: Some("be helpful".into()),
            ..RelayConfig::default()
        };

        let request = CompletionRequest::from_chat(ChatRequest::new("ping"), &config).unwrap();
        assert_eq!(request.prompt, "ping");
        assert_eq!(request.system_prompt.as_deref(), Some("be helpful"));
        assert!((request.temperature - 0.7).abs() < f64::EPSILON);
        assert_eq!(request.max_tokens, 1000);
    }

    #[test]
    fn explicit_values_win() {
        let chat = ChatRequest::new("ping")
            .with_system_prompt("terse")
            .with_temperature(0.0)
            .with_max_tokens(10);

        let request = CompletionRequest::from_chat(chat, &RelayConfig::default()).unwrap();
        assert_eq!(request.system_prompt.as_deref(), Some("terse"));
        assert!(request.temperature.abs() < f64::EPSILON);
        assert_eq!(request.max_tokens, 10);
    }

    #[test]
    fn blank_system_prompt_falls_back_to_default() {
        let chat = ChatRequest::new("ping").with_system_prompt("   ");
        let request = CompletionRequest::from_chat(chat, &RelayConfig::default()).unwrap();
        assert!(request.system_prompt.is_none());
    }

    #[test]
    fn rejects_blank_message() {
        let err = CompletionRequest::from_chat(ChatRequest::new(" \n\t"), &RelayConfig::default()).unwrap_err();
        assert!(matches!(err, RelayError::Validation(msg) if msg.contains("message")));
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        for temperature in [-0.1, 1.01, f64::NAN] {
            let chat = ChatRequest::new("ping").with_temperature(temperature);
            let err = CompletionRequest::from_chat(chat, &RelayConfig::default()).unwrap_err();
            assert!(matches!(err, RelayError::Validation(msg) if msg.contains("temperature")));
        }
    }

    #[test]
    fn rejects_out_of_range_max_tokens() {
        let config = RelayConfig {
            max_tokens_limit: 100,
            default_max_tokens: 50,
            ..RelayConfig::default()
        };

        for max_tokens in [0, 101] {
            let chat = ChatRequest::new("ping").with_max_tokens(max_tokens);
            let err = CompletionRequest::from_chat(chat, &config).unwrap_err();
            assert!(matches!(err, RelayError::Validation(msg) if msg.contains("maxTokens")));
        }

        let chat = ChatRequest::new("ping").with_max_tokens(100);
        assert!(CompletionRequest::from_chat(chat, &config).is_ok());
    }
}
