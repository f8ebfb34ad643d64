use async_trait::async_trait;

use crate::error::Result;

/// A completion provider: one prompt in, raw completion text out.
///
/// The credential is passed per call rather than held by the client so a
/// caller can rotate through a pool of keys on transient failures. Local
/// providers ignore it; pass an empty string.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str, api_key: &str) -> Result<String>;

    fn name(&self) -> &'static str;
}
