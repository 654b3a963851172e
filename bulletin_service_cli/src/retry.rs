use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::ai::{ModelCallOutcome, ModelCaller};
use crate::config::SummaryConfig;

/// Which model tier produced a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Primary,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SummaryResult {
    Ok {
        text: String,
        tier: ModelTier,
        model: String,
    },
    Failed(String),
}

impl SummaryResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, SummaryResult::Ok { .. })
    }

    /// Text with a trailing note when the fallback model produced it.
    pub fn annotated_text(&self) -> Option<String> {
        match self {
            SummaryResult::Ok {
                text,
                tier: ModelTier::Fallback,
                model,
            } => Some(format!("{text}\n\n_(Generado con modelo de respaldo: {model})_")),
            SummaryResult::Ok { text, .. } => Some(text.clone()),
            SummaryResult::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub primary_model: String,
    pub fallback_model: String,
    /// Hard cap for any escalated token budget.
    pub budget_ceiling: u32,
    pub transient_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &SummaryConfig) -> Self {
        Self {
            primary_model: config.primary_model_id.clone(),
            fallback_model: config.fallback_model_id.clone(),
            budget_ceiling: config.token_budget_ceiling,
            transient_delay: config.transient_retry_delay,
        }
    }

    fn escalated_budget(&self, budget: u32) -> u32 {
        budget.saturating_mul(2).min(self.budget_ceiling)
    }

    /// A quarter more than requested, never above the ceiling unless the
    /// request itself already was.
    fn fallback_budget(&self, budget: u32) -> u32 {
        budget
            .saturating_add(budget / 4)
            .min(self.budget_ceiling)
            .max(budget)
    }
}

/// Runs one summarization prompt through the primary model, escalating to
/// a larger budget, a single transient retry and finally the fallback model.
///
/// Worst case is four model calls.
pub async fn summarize_unit(
    caller: &dyn ModelCaller,
    policy: &RetryPolicy,
    prompt: &str,
    max_output_tokens: u32,
) -> SummaryResult {
    let primary = policy.primary_model.as_str();

    let mut last = caller.call(prompt, primary, max_output_tokens).await;
    debug!(model = primary, outcome = last.kind(), "primary attempt");
    if let ModelCallOutcome::Success(text) = last {
        return ok(text, ModelTier::Primary, primary);
    }

    if let ModelCallOutcome::BudgetExceeded(_) = last {
        let escalated = policy.escalated_budget(max_output_tokens);
        if escalated > max_output_tokens {
            warn!(model = primary, escalated, "output truncated, retrying with larger budget");
            last = caller.call(prompt, primary, escalated).await;
            if let ModelCallOutcome::Success(text) = last {
                return ok(text, ModelTier::Primary, primary);
            }
        }
    }

    if let ModelCallOutcome::TransientError(ref detail) = last {
        warn!(model = primary, %detail, "transient error, retrying once");
        tokio::time::sleep(policy.transient_delay).await;
        last = caller.call(prompt, primary, max_output_tokens).await;
        if let ModelCallOutcome::Success(text) = last {
            return ok(text, ModelTier::Primary, primary);
        }
    }

    let fallback = policy.fallback_model.as_str();
    warn!(primary, fallback, reason = %last, "primary model failed, using fallback");
    let outcome = caller
        .call(prompt, fallback, policy.fallback_budget(max_output_tokens))
        .await;
    match outcome {
        ModelCallOutcome::Success(text) => ok(text, ModelTier::Fallback, fallback),
        failed => SummaryResult::Failed(format!(
            "{fallback}: {failed}; {primary}: {last}"
        )),
    }
}

fn ok(text: String, tier: ModelTier, model: &str) -> SummaryResult {
    SummaryResult::Ok {
        text,
        tier,
        model: model.to_string(),
    }
}
