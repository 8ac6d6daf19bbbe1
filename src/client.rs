//! Sampling configuration for model calls.
//!
//! Temperature and output length are call configuration, not extraction
//! logic: rating prediction runs deterministically, insights and replies are
//! allowed progressively more variation.

/// Configuration for LLM requests.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    /// Temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: f64,

    /// Maximum tokens to generate.
    pub max_tokens: u32,

    /// Request JSON format output from the model.
    pub json_mode: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2048,
            json_mode: false,
        }
    }
}

impl LlmConfig {
    /// Star-rating prediction: deterministic, short.
    pub fn rating() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 500,
            json_mode: false,
        }
    }

    /// Summary, actions and sentiment.
    pub fn insights() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 400,
            json_mode: false,
        }
    }

    /// Free-text reply to the customer.
    pub fn reply() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 150,
            json_mode: false,
        }
    }

    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn with_json_mode(mut self, enabled: bool) -> Self {
        self.json_mode = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(LlmConfig::rating().temperature, 0.0);
        assert_eq!(LlmConfig::rating().max_tokens, 500);
        assert_eq!(LlmConfig::insights().temperature, 0.3);
        assert_eq!(LlmConfig::reply().max_tokens, 150);
    }

    #[test]
    fn test_builders() {
        let config = LlmConfig::default()
            .with_temperature(0.1)
            .with_max_tokens(64)
            .with_json_mode(true);
        assert_eq!(config.temperature, 0.1);
        assert_eq!(config.max_tokens, 64);
        assert!(config.json_mode);
    }
}
