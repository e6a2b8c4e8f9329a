use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cli::{Engine, EngineArgs};
use crate::command::CommandGenerator;
use crate::error::Error;
use crate::formats::{ChapterRecord, SourceLanguage};
use crate::gemini::GeminiGenerator;

pub const DEFAULT_MODELS: [&str; 4] = [
    "gemini-2.0-flash-exp",
    "gemini-1.5-pro",
    "gemini-1.5-flash",
    "gemini-1.0-pro",
];

pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(120);

pub fn default_models() -> Vec<String> {
    DEFAULT_MODELS.iter().map(|m| (*m).to_owned()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            top_p: 0.8,
            top_k: 40,
            max_output_tokens: 8192,
        }
    }
}

/// A text generation backend addressed by model identifier.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> anyhow::Result<String>;
}

/// A model that was tried and failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationAttempt {
    pub model: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub text: String,
    pub model: String,
    /// True when the chapter already carried a translation and no model was called.
    pub cached: bool,
}

pub struct Translator {
    generator: Arc<dyn Generator>,
    models: Vec<String>,
    params: GenerationParams,
    attempt_timeout: Duration,
}

impl Translator {
    pub fn new(generator: Arc<dyn Generator>, models: Vec<String>) -> anyhow::Result<Self> {
        let models = models
            .into_iter()
            .map(|m| m.trim().to_owned())
            .filter(|m| !m.is_empty())
            .collect::<Vec<_>>();
        if models.is_empty() {
            anyhow::bail!("at least one translation model is required");
        }
        Ok(Self {
            generator,
            models,
            params: GenerationParams::default(),
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        })
    }

    pub fn from_engine_args(args: &EngineArgs) -> anyhow::Result<Self> {
        let attempt_timeout = Duration::from_secs(args.attempt_timeout_secs.max(1));
        let generator: Arc<dyn Generator> = match args.engine {
            Engine::Gemini => Arc::new(
                GeminiGenerator::from_env(&args.gemini_base_url, attempt_timeout)
                    .context("configure gemini engine")?,
            ),
            Engine::Command => {
                let Some(program) = args.command.as_deref() else {
                    anyhow::bail!("missing --command (required when --engine=command)");
                };
                Arc::new(CommandGenerator::new(program, args.command_args.clone()))
            }
        };

        tracing::info!(
            engine = ?args.engine,
            models = ?args.models,
            attempt_timeout_secs = attempt_timeout.as_secs(),
            "translation engine configured"
        );

        Ok(Self::new(generator, args.models.clone())?
            .with_params(GenerationParams {
                temperature: args.temperature,
                top_p: args.top_p,
                top_k: args.top_k,
                max_output_tokens: args.max_output_tokens,
            })
            .with_attempt_timeout(attempt_timeout))
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Upper bound on one `translate` call: every model timing out in turn,
    /// plus slack for prompt building and commit.
    pub fn time_budget(&self) -> Duration {
        let models = u32::try_from(self.models.len()).unwrap_or(u32::MAX);
        self.attempt_timeout
            .saturating_mul(models)
            .saturating_add(Duration::from_secs(30))
    }

    /// Translates a chapter, or returns its stored translation untouched.
    ///
    /// Models are tried one at a time in priority order; a failure or timeout
    /// moves on to the next model. Nothing is persisted here.
    pub async fn translate(
        &self,
        chapter: &ChapterRecord,
        source_language: &str,
    ) -> Result<Translation, Error> {
        if let Some(text) = chapter.translated_content.as_ref() {
            tracing::debug!(
                novel_id = %chapter.novel_id,
                chapter_number = chapter.chapter_number,
                "chapter already translated; returning stored text"
            );
            return Ok(Translation {
                text: text.clone(),
                // Records committed before provenance was stored carry no model.
                model: chapter.translation_model.clone().unwrap_or_default(),
                cached: true,
            });
        }

        let language = prompt_language(source_language);
        let prompt = build_prompt(language, &chapter.title, &chapter.original_content);

        let mut attempts = Vec::with_capacity(self.models.len());
        for (idx, model) in self.models.iter().enumerate() {
            tracing::info!(
                novel_id = %chapter.novel_id,
                chapter_number = chapter.chapter_number,
                model = %model,
                attempt = idx + 1,
                attempts = self.models.len(),
                "translate chapter"
            );

            match self.attempt(model, &prompt).await {
                Ok(text) => {
                    tracing::info!(
                        novel_id = %chapter.novel_id,
                        chapter_number = chapter.chapter_number,
                        model = %model,
                        chars = text.chars().count(),
                        "chapter translated"
                    );
                    return Ok(Translation {
                        text,
                        model: model.clone(),
                        cached: false,
                    });
                }
                Err(err) => {
                    let error = format!("{err:#}");
                    tracing::warn!(
                        novel_id = %chapter.novel_id,
                        chapter_number = chapter.chapter_number,
                        model = %model,
                        error = %error,
                        "translation model failed; trying next model"
                    );
                    attempts.push(TranslationAttempt {
                        model: model.clone(),
                        error,
                    });
                }
            }
        }

        tracing::error!(
            novel_id = %chapter.novel_id,
            chapter_number = chapter.chapter_number,
            attempts = attempts.len(),
            "all translation models failed"
        );
        Err(Error::AllModelsExhausted { attempts })
    }

    async fn attempt(&self, model: &str, prompt: &str) -> anyhow::Result<String> {
        let text = tokio::time::timeout(
            self.attempt_timeout,
            self.generator.generate(model, prompt, &self.params),
        )
        .await
        .map_err(|_| anyhow::anyhow!("timed out after {:?}", self.attempt_timeout))??;

        if text.trim().is_empty() {
            anyhow::bail!("model returned empty output");
        }
        Ok(text)
    }
}

/// Display name used in the prompt for a stored source language.
///
/// Unrecognized stored values fall back to [`SourceLanguage::DEFAULT`]
/// (Chinese) with a warning.
pub fn prompt_language(stored: &str) -> &'static str {
    match stored.parse::<SourceLanguage>() {
        Ok(language) => language.display_name(),
        Err(_) => {
            tracing::warn!(
                source_language = %stored,
                fallback = SourceLanguage::DEFAULT.as_str(),
                "unrecognized source language; using default"
            );
            SourceLanguage::DEFAULT.display_name()
        }
    }
}

pub fn build_prompt(language: &str, title: &str, content: &str) -> String {
    format!(
        "You are a professional literary translator working from {language} into English.\n\
\n\
Translate the following {language} novel chapter into English.\n\
\n\
Guidelines:\n\
1. Literary quality: keep the original style, tone, and narrative voice.\n\
2. Cultural context: preserve cultural nuance while keeping it readable for English readers.\n\
3. Character names: keep original names and use them consistently.\n\
4. Terminology: use fitting English equivalents for titles, places, and cultural concepts.\n\
5. Flow: write natural English without changing the meaning.\n\
6. Formatting: keep paragraph breaks and dialogue structure.\n\
7. Completeness: translate the entire text; do not summarize or omit anything.\n\
\n\
Chapter title: {title}\n\
\n\
Text to translate:\n\
{content}\n\
\n\
Output only the complete English translation.\n"
    )
}
