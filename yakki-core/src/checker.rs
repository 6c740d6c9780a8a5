//! The compliance check service

use crate::cache::{fingerprint_request, Fingerprint, InvalidationEvent, Partition};
use crate::error::{Result, YakkiError};
use crate::manager::{CacheManager, CacheStatus};
use crate::prompt::{system_prompt, user_prompt};
use crate::recovery::{fallback, recover_with_trace, Strategy};
use crate::schema::{
    Category, CheckRequest, Rewrites, RiskLevel, StructuredResult, TextType,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

const UPSTREAM_FAILURE_FRAGMENT: &str = "API呼び出しエラー";
const UPSTREAM_FAILURE_REASON: &str =
    "AIサービスへの問い合わせに失敗したため、自動判定を完了できませんでした。";
const PRESCREEN_EXPLANATION: &str =
    "AIサービスを利用できないため、NG表現リストによる簡易判定の結果です。リライト案は提供されません。";
const UNAVAILABLE_EXPLANATION: &str =
    "AIサービスを利用できないため、詳細な判定とリライト案は提供されません。";

/// Generation parameters passed through to the collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub model: String,
    /// Tried once when the primary model fails with a non-timeout error
    #[serde(default)]
    pub fallback_model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            model: "sonnet".to_string(),
            fallback_model: None,
            max_tokens: 4000,
            temperature: 0.3,
        }
    }
}

/// Text-generation collaborator. Transport, authentication and timeouts
/// belong to the implementation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Whether the collaborator is configured and reachable at all
    fn is_available(&self) -> bool {
        true
    }

    async fn invoke(&self, system: &str, user: &str, params: &ModelParams) -> Result<String>;
}

/// Where a check result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    Cache,
    /// Model output, recovered at the given stage
    Model(Strategy),
    /// Generator unavailable; literal expression screen only
    PreScreen,
    /// Generator unavailable and the screen found nothing
    Unavailable,
    /// The generator call failed or timed out
    UpstreamFailure,
}

impl ResultSource {
    /// Only verdicts derived from model output are worth caching
    pub fn is_cacheable(&self) -> bool {
        matches!(self, ResultSource::Model(strategy) if *strategy != Strategy::Fallback)
    }
}

/// A check result with its provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    pub result: StructuredResult,
    pub source: ResultSource,
    pub fingerprint: Fingerprint,
}

/// Compliance check service: fingerprint, cache lookup, prompt assembly,
/// generation and recovery.
pub struct Checker {
    caches: Arc<CacheManager>,
    generator: Arc<dyn TextGenerator>,
    params: ModelParams,
}

impl Checker {
    pub fn new(caches: Arc<CacheManager>, generator: Arc<dyn TextGenerator>, params: ModelParams) -> Self {
        Self {
            caches,
            generator,
            params,
        }
    }

    pub fn caches(&self) -> &CacheManager {
        &self.caches
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    /// Check one piece of copy. Never fails; upstream problems produce a
    /// marked fallback result.
    pub async fn check_text(
        &self,
        text: &str,
        text_type: TextType,
        category: Category,
        special_points: &str,
        approved: bool,
    ) -> StructuredResult {
        let request = CheckRequest::new(text, text_type, category)
            .with_special_points(special_points)
            .with_approval(approved);
        self.check(&request).await.result
    }

    /// [`check_text`](Self::check_text) with provenance
    pub async fn check(&self, request: &CheckRequest) -> CheckResponse {
        let fingerprint = fingerprint_request(request);
        let key_prefix = fingerprint.get(..8).unwrap_or(&fingerprint).to_string();

        if let Some(result) = self.caches.get_result(&fingerprint).await {
            debug!("Serving cached result for {}", key_prefix);
            return CheckResponse {
                result,
                source: ResultSource::Cache,
                fingerprint,
            };
        }

        let snapshot = self.caches.data_snapshot().await;

        if !self.generator.is_available() {
            let (result, source) = screen_only(request, &snapshot.ng.screen(&request.text));
            info!(
                "Generator unavailable; answered {} from pre-screen ({} issues)",
                key_prefix, result.issues.len()
            );
            return CheckResponse {
                result,
                source,
                fingerprint,
            };
        }

        let rules = self.caches.rule_content(request.text_type).await;
        let user = user_prompt(request, &snapshot.content, &rules);
        debug!(
            "Invoking generator for {} (text {} chars, prompt {} chars)",
            key_prefix,
            request.text.chars().count(),
            user.chars().count()
        );

        let raw = match self.generate(&user).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Generation failed for {}: {}", key_prefix, e);
                return CheckResponse {
                    result: fallback(&request.text, UPSTREAM_FAILURE_FRAGMENT, UPSTREAM_FAILURE_REASON),
                    source: ResultSource::UpstreamFailure,
                    fingerprint,
                };
            }
        };

        let outcome = recover_with_trace(&raw, &request.text);
        let source = ResultSource::Model(outcome.strategy);
        if source.is_cacheable() {
            self.caches
                .set_result(fingerprint.clone(), outcome.result.clone())
                .await;
        } else {
            warn!("Not caching unrecovered result for {}", key_prefix);
        }

        info!(
            "Checked {}: risk {}, {} issues (stage {})",
            key_prefix,
            outcome.result.overall_risk,
            outcome.result.issues.len(),
            outcome.strategy
        );
        CheckResponse {
            result: outcome.result,
            source,
            fingerprint,
        }
    }

    /// Drop the named cache partition
    pub async fn invalidate(&self, partition: Partition) -> Vec<InvalidationEvent> {
        self.caches.invalidate(partition).await
    }

    pub async fn cache_status(&self) -> CacheStatus {
        self.caches.status().await
    }

    async fn generate(&self, user: &str) -> Result<String> {
        match self.generator.invoke(system_prompt(), user, &self.params).await {
            Ok(raw) => Ok(raw),
            Err(e @ YakkiError::Timeout { .. }) => Err(e),
            Err(e) => match &self.params.fallback_model {
                Some(model) if *model != self.params.model => {
                    warn!("Primary model failed ({}); retrying with {}", e, model);
                    let params = ModelParams {
                        model: model.clone(),
                        fallback_model: None,
                        ..self.params.clone()
                    };
                    self.generator.invoke(system_prompt(), user, &params).await
                }
                _ => Err(e),
            },
        }
    }
}

/// Result built from the literal expression screen alone
fn screen_only(request: &CheckRequest, issues: &[crate::schema::Issue]) -> (StructuredResult, ResultSource) {
    if issues.is_empty() {
        let rewrites = Rewrites::echo_with_explanation(&request.text, UNAVAILABLE_EXPLANATION);
        return (
            StructuredResult::new(RiskLevel::Low, Vec::new(), rewrites),
            ResultSource::Unavailable,
        );
    }
    let rewrites = Rewrites::echo_with_explanation(&request.text, PRESCREEN_EXPLANATION);
    let mut result = StructuredResult::new(RiskLevel::Low, issues.to_vec(), rewrites);
    result.overall_risk = result.max_issue_level().unwrap_or(RiskLevel::Low);
    (result, ResultSource::PreScreen)
}
