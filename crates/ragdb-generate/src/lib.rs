//! ragdb-generate
//!
//! Answer generators behind the `AnswerGenerator` seam: an OpenAI-compatible
//! chat-completions client and a deterministic extractive fallback used when
//! no API key is configured.
pub mod remote;
pub mod sse;
pub mod template;

use tracing::info;

use ragdb_core::config::GeneratorSettings;
use ragdb_core::error::Result;
use ragdb_core::traits::AnswerGenerator;

pub use remote::RemoteGenerator;
pub use template::TemplateGenerator;

/// Remote generator when an API key is configured, template otherwise.
pub fn default_generator(settings: &GeneratorSettings) -> Result<Box<dyn AnswerGenerator>> {
    if settings.has_api_key() {
        info!(model = %settings.model, base_url = %settings.base_url, "using remote answer generator");
        return Ok(Box::new(RemoteGenerator::new(settings)?));
    }
    info!("no API key configured; using template answer generator");
    Ok(Box::new(TemplateGenerator::new()))
}
