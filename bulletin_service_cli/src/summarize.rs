use std::sync::Arc;

use tracing::{info, warn};

use crate::ai::{GeminiCaller, ModelCaller};
use crate::config::SummaryConfig;
use crate::error::ServiceError;
use crate::retry::{summarize_unit, RetryPolicy, SummaryResult};
use crate::segment::{segment, Chunk};

/// Extracted plain text of one bulletin entry.
#[derive(Debug, Clone)]
pub struct Document {
    pub text: String,
    pub source_url: String,
}

impl Document {
    pub fn new(text: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source_url: source_url.into(),
        }
    }
}

/// Budgets for one map-reduce run.
#[derive(Debug, Clone, Copy)]
pub struct Budgets {
    pub chunk_chars: usize,
    pub per_chunk_tokens: u32,
    pub merge_tokens: u32,
    pub max_summary_words: usize,
}

impl Budgets {
    pub fn from_config(config: &SummaryConfig) -> Self {
        Self {
            chunk_chars: config.chunk_char_budget,
            per_chunk_tokens: config.per_chunk_token_budget,
            merge_tokens: config.merge_token_budget,
            max_summary_words: config.max_summary_words,
        }
    }
}

pub const EMPTY_DOCUMENT_NOTICE: &str = "⚠️ El documento no contiene texto que resumir.";

/// Map-reduce summarizer: one call per chunk, then one merge call.
pub struct Summarizer {
    caller: Arc<dyn ModelCaller>,
    policy: RetryPolicy,
    budgets: Budgets,
}

impl Summarizer {
    pub fn new(caller: Arc<dyn ModelCaller>, policy: RetryPolicy, budgets: Budgets) -> Self {
        Self {
            caller,
            policy,
            budgets,
        }
    }

    /// Summarizer backed by the Gemini REST API.
    pub fn gemini(config: &SummaryConfig) -> Result<Self, ServiceError> {
        let caller = GeminiCaller::new(
            config.require_api_key()?,
            &config.api_base_url,
            config.request_timeout,
        )?;
        Ok(Self::new(
            Arc::new(caller),
            RetryPolicy::from_config(config),
            Budgets::from_config(config),
        ))
    }

    /// Never returns an empty string.
    pub async fn summarize_document(&self, document: &Document) -> String {
        let chunks = segment(&document.text, self.budgets.chunk_chars);
        if chunks.is_empty() {
            return EMPTY_DOCUMENT_NOTICE.to_string();
        }
        info!(source = %document.source_url, chunks = chunks.len(), "summarizing document");

        let total = chunks.len();
        let mut partials = Vec::with_capacity(total);
        let mut any_ok = false;
        for chunk in &chunks {
            let prompt = chunk_prompt(chunk, total);
            let result = summarize_unit(
                self.caller.as_ref(),
                &self.policy,
                &prompt,
                self.budgets.per_chunk_tokens,
            )
            .await;
            any_ok |= result.is_ok();
            partials.push(render_partial(chunk.index, total, &result));
        }

        if !any_ok {
            warn!(source = %document.source_url, "every chunk failed, skipping merge");
            return degraded(&partials, "ningún bloque pudo resumirse");
        }

        let prompt = merge_prompt(&partials, &document.source_url, self.budgets.max_summary_words);
        let merged = summarize_unit(
            self.caller.as_ref(),
            &self.policy,
            &prompt,
            self.budgets.merge_tokens,
        )
        .await;

        match merged.annotated_text() {
            Some(text) => text,
            None => {
                let reason = match &merged {
                    SummaryResult::Failed(reason) => reason.as_str(),
                    SummaryResult::Ok { .. } => "",
                };
                warn!(source = %document.source_url, %reason, "merge failed, returning partial summaries");
                degraded(&partials, reason)
            }
        }
    }
}

fn render_partial(index: usize, total: usize, result: &SummaryResult) -> String {
    match result {
        SummaryResult::Ok { text, .. } => format!("### Bloque {index}/{total}\n{text}"),
        SummaryResult::Failed(reason) => {
            warn!(chunk = index, %reason, "chunk summary failed");
            format!("### Bloque {index}/{total}\n⚠️ Bloque {index} falló: {reason}")
        }
    }
}

fn degraded(partials: &[String], reason: &str) -> String {
    format!(
        "⚠️ No se pudo generar el resumen unificado ({reason}). Resúmenes parciales:\n\n{}",
        partials.join("\n\n")
    )
}

pub fn chunk_prompt(chunk: &Chunk, total: usize) -> String {
    format!(
        "Resume de forma clara, directa y en español el siguiente fragmento ({}/{}) de un \
         documento legal publicado en un boletín oficial. Usa viñetas e incluye, si aparecen:\n\
         - Motivo u objeto\n\
         - Objetivos\n\
         - Medidas clave\n\
         - Vigencia y plazos\n\
         - Efectos\n\
         No copies texto literal.\n\n{}",
        chunk.index, total, chunk.text
    )
}

pub fn merge_prompt(partials: &[String], source_url: &str, max_words: usize) -> String {
    format!(
        "A partir de los siguientes resúmenes parciales de un mismo documento legal ({source_url}), \
         redacta un único resumen ejecutivo en español, sin redundancias y de como máximo \
         {max_words} palabras, con estas secciones:\n\
         **Objeto**\n\
         **Ámbito**\n\
         **Medidas**\n\
         **Plazos**\n\
         **Obligaciones**\n\
         **Ayudas/Subvenciones** (solo si procede)\n\
         Si algún bloque indica que falló, menciónalo brevemente.\n\n{}",
        partials.join("\n\n")
    )
}
