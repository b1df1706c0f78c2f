use async_trait::async_trait;

use crate::error::AiError;
use crate::provider::{AiProvider, ProviderKind};

pub const MOCK_ANSWER: &str = "This is a simulated answer for testing purposes. A configured \
model would answer the question here.";

/// Offline provider with a fixed answer.
#[derive(Debug, Default)]
pub struct MockProvider;

#[async_trait]
impl AiProvider for MockProvider {
    async fn ask(&self, _prompt: &str, _context: &str) -> Result<String, AiError> {
        Ok(MOCK_ANSWER.to_string())
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Mock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_is_deterministic() {
        let provider = MockProvider;
        let a = provider.ask("Is my glucose high?", "ctx").await.unwrap();
        let b = provider.ask("Something else", "").await.unwrap();
        assert_eq!(a, MOCK_ANSWER);
        assert_eq!(a, b);
        assert_eq!(provider.kind(), ProviderKind::Mock);
    }
}
