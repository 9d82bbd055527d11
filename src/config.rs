//! Pipeline configuration.

/// Configuration for an analysis run.
///
/// Passed into the orchestrator at construction; there is no ambient module
/// state.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// The generation model to use (e.g., "gpt-4o-mini")
    pub model: String,
    /// Opinions per generation call in the batched stages
    pub batch_size: usize,
    /// Hard cap on simultaneously in-flight generation calls
    pub concurrency: usize,
    /// Temperature for generation sampling
    pub temperature: Option<f32>,
    /// Maximum tokens per generation response
    pub max_tokens: Option<u32>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            batch_size: 100,
            concurrency: 5,
            temperature: Some(0.4),
            max_tokens: Some(8192),
        }
    }
}

impl AnalysisConfig {
    /// Create a new config with the specified model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Set the opinion batch size.
    pub fn batch_size(mut self, n: usize) -> Self {
        self.batch_size = n.max(1);
        self
    }

    /// Set the concurrency cap.
    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Set the temperature.
    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    /// Set the max tokens.
    pub fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    /// Remove the max tokens limit (let the model use its default).
    pub fn no_max_tokens(mut self) -> Self {
        self.max_tokens = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.concurrency, 5);
    }

    #[test]
    fn test_builder() {
        let config = AnalysisConfig::new("test-model").batch_size(10).concurrency(2);
        assert_eq!(config.model, "test-model");
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.concurrency, 2);
    }

    #[test]
    fn test_zero_values_clamped() {
        let config = AnalysisConfig::default().batch_size(0).concurrency(0);
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.concurrency, 1);
    }
}
