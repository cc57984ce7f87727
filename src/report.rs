use std::path::Path;

use rand::Rng;

use crate::config::Config;
use crate::error::TracksideError;
use crate::generate::consumer::StreamConsumer;
use crate::generate::http::HttpGenerator;
use crate::generate::{GenerationRequest, GenerationResult};
use crate::prompt::{OUTLINE_MAX_TOKENS, OUTLINE_PROMPT, PromptBuilder, PromptStrategy};

/// End-to-end report generation: outline resolution, prompt assembly, and
/// streaming generation. One instance per process; each run is stateless.
pub struct ReportPipeline {
    config: Config,
    generator: HttpGenerator,
    consumer: StreamConsumer,
    builder: PromptBuilder,
}

impl ReportPipeline {
    pub fn new(config: Config) -> Self {
        let generator = HttpGenerator::new(&config.base_url, &config.api_key);
        let consumer = StreamConsumer::new(config.first_chunk_timeout);
        let builder = PromptBuilder::new(&config.examples_dir);
        Self {
            config,
            generator,
            consumer,
            builder,
        }
    }

    /// Generate a report for `data` using the selected strategy.
    /// Fails without side effects; nothing is persisted here.
    pub async fn run<R: Rng + ?Sized>(
        &self,
        data: &str,
        strategy: PromptStrategy,
        rng: &mut R,
    ) -> Result<GenerationResult, TracksideError> {
        let outline = match strategy {
            PromptStrategy::AutoChainOfThought => Some(self.generate_outline().await?),
            _ => None,
        };

        let prompt = self.builder.build(data, strategy, outline.as_deref(), rng)?;

        tracing::info!(model = %self.config.model, %strategy, "generating report");
        self.generate(prompt, self.config.max_tokens).await
    }

    /// Ask the model for a numbered outline to steer the report.
    async fn generate_outline(&self) -> Result<String, TracksideError> {
        tracing::info!(model = %self.config.model, "generating chain of thought outline");
        let outline = self
            .generate(OUTLINE_PROMPT.to_string(), OUTLINE_MAX_TOKENS)
            .await?;

        // The estimate counts chunks, so hitting the cap means truncation
        // is likely. Non-fatal: a clipped outline still steers the report.
        if outline.token_estimate >= OUTLINE_MAX_TOKENS {
            tracing::warn!(
                token_estimate = outline.token_estimate,
                cap = OUTLINE_MAX_TOKENS,
                "outline hit the token cap and may be incomplete"
            );
        }

        tracing::debug!(outline = %outline.text, "generated outline");
        Ok(outline.text)
    }

    async fn generate(
        &self,
        prompt: String,
        max_tokens: u64,
    ) -> Result<GenerationResult, TracksideError> {
        let request = GenerationRequest {
            model: self.config.model.clone(),
            prompt,
            max_tokens,
        };
        let mut stream = self.generator.open_stream(&request).await?;
        self.consumer.consume(&mut stream).await
    }
}

/// Write the finished report, creating parent directories as needed.
/// Temp-file + rename keeps readers from ever seeing a partial report.
pub async fn persist_report(path: &Path, text: &str) -> Result<(), TracksideError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, text.as_bytes()).await?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e.into());
    }

    Ok(())
}
