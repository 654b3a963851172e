//! Test doubles for code that drives a [`ModelCaller`].
//!
//! Compiled for this crate's own tests and, behind the `test-util` feature,
//! for dependents that need a summarizer without network access.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::ai::{ModelCallOutcome, ModelCaller};
use crate::retry::RetryPolicy;

/// Replays canned outcomes and records every call.
///
/// Once the script runs out the `always` outcome is repeated; without one
/// every further call is a permanent error.
#[derive(Default)]
pub struct ScriptedCaller {
    script: Mutex<VecDeque<ModelCallOutcome>>,
    default: Option<ModelCallOutcome>,
    calls: Mutex<Vec<(String, u32)>>,
}

impl ScriptedCaller {
    pub fn new(script: Vec<ModelCallOutcome>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        }
    }

    pub fn always(outcome: ModelCallOutcome) -> Self {
        Self {
            default: Some(outcome),
            ..Default::default()
        }
    }

    /// `(model_id, max_output_tokens)` of every call so far.
    pub fn calls(&self) -> Vec<(String, u32)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ModelCaller for ScriptedCaller {
    async fn call(&self, _prompt: &str, model_id: &str, max_output_tokens: u32) -> ModelCallOutcome {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((model_id.to_string(), max_output_tokens));
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .or_else(|| self.default.clone())
            .unwrap_or_else(|| ModelCallOutcome::PermanentError("script exhausted".into()))
    }
}

/// `pro` primary, `flash` fallback, ceiling 2048 and no transient delay.
pub fn policy() -> RetryPolicy {
    RetryPolicy {
        primary_model: "pro".into(),
        fallback_model: "flash".into(),
        budget_ceiling: 2048,
        transient_delay: Duration::ZERO,
    }
}
