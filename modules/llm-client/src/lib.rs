//! Provider-agnostic completion clients.
//!
//! Every provider exposes the same capability: send a prompt with one
//! credential, get the raw completion text back. Failures are classified
//! into [`CompletionError`] variants so callers can decide which ones are
//! worth retrying with a different credential.

pub mod error;
mod gemini;
mod ollama;
mod openai_compat;
pub mod provider;
mod traits;
pub mod util;

pub use error::{CompletionError, Result};
pub use gemini::GeminiClient;
pub use ollama::OllamaClient;
pub use openai_compat::OpenAiCompatClient;
pub use provider::{build_client, probe_local, Provider};
pub use traits::CompletionClient;
