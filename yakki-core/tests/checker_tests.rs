//! Integration tests for the check service
//!
//! A scripted generator stands in for the model so that invocation counts,
//! cache behavior and degraded paths can be observed.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use yakki_core::{
    CacheManager, Category, CheckRequest, Checker, ModelParams, Partition, ReferenceConfig,
    ResultCacheConfig, ResultSource, RiskLevel, Strategy, TextGenerator, TextType, YakkiError,
};

const VERDICT: &str = r#"{
  "overall_risk": "中",
  "risk_counts": {"total": 1, "high": 0, "medium": 1, "low": 0},
  "issues": [
    {"fragment": "シミが消える", "reason": "効能の逸脱", "risk_level": "中", "suggestions": ["透明感"]}
  ],
  "rewritten_texts": {"conservative": "保守", "balanced": "中庸", "appealing": "訴求"}
}"#;

enum Script {
    Reply(&'static str),
    Fail,
    Timeout,
    /// Fails for every model except the named one
    OnlyModel(&'static str),
}

struct ScriptedGenerator {
    script: Script,
    available: bool,
    calls: AtomicUsize,
    models: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            available: true,
            calls: AtomicUsize::new(0),
            models: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            script: Script::Fail,
            available: false,
            calls: AtomicUsize::new(0),
            models: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn invoke(
        &self,
        _system: &str,
        user: &str,
        params: &ModelParams,
    ) -> yakki_core::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.models.lock().unwrap().push(params.model.clone());
        self.prompts.lock().unwrap().push(user.to_string());

        match &self.script {
            Script::Reply(raw) => Ok(raw.to_string()),
            Script::Fail => Err(YakkiError::Generation("authentication failed".to_string())),
            Script::Timeout => Err(YakkiError::Timeout {
                timeout_seconds: 1,
                context: "test".to_string(),
            }),
            Script::OnlyModel(model) if params.model == *model => Ok(VERDICT.to_string()),
            Script::OnlyModel(_) => Err(YakkiError::Generation("model not found".to_string())),
        }
    }
}

struct Fixture {
    _root: TempDir,
    reference: ReferenceConfig,
}

fn fixture() -> Fixture {
    let root = TempDir::new().unwrap();
    let data = root.path().join("data");
    let rule = root.path().join("rule");
    fs::create_dir(&data).unwrap();
    fs::create_dir(&rule).unwrap();
    fs::write(data.join("law1.md"), "第66条 誇大広告の禁止").unwrap();
    fs::write(rule.join(TextType::Catchphrase.rule_file()), "- 効果を断定しない").unwrap();
    Fixture {
        reference: ReferenceConfig::new(data, rule),
        _root: root,
    }
}

fn checker(fixture: &Fixture, generator: Arc<ScriptedGenerator>, params: ModelParams) -> Checker {
    let caches = Arc::new(CacheManager::new(
        fixture.reference.clone(),
        ResultCacheConfig::default(),
    ));
    Checker::new(caches, generator, params)
}

fn request(text: &str) -> CheckRequest {
    CheckRequest::new(text, TextType::Catchphrase, Category::Cosmetics)
}

#[tokio::test]
async fn test_repeat_check_is_served_from_cache() {
    let fixture = fixture();
    let generator = ScriptedGenerator::new(Script::Reply(VERDICT));
    let checker = checker(&fixture, generator.clone(), ModelParams::default());

    let first = checker.check(&request("シミが消える")).await;
    let second = checker.check(&request("シミが消える")).await;

    assert_eq!(first.source, ResultSource::Model(Strategy::DirectParse));
    assert_eq!(second.source, ResultSource::Cache);
    assert_eq!(first.result, second.result);
    assert_eq!(first.fingerprint, second.fingerprint);
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn test_prompt_carries_reference_and_rules() {
    let fixture = fixture();
    let generator = ScriptedGenerator::new(Script::Reply(VERDICT));
    let checker = checker(&fixture, generator.clone(), ModelParams::default());

    checker
        .check(&request("シミが消える").with_special_points("保湿").with_approval(true))
        .await;

    let prompts = generator.prompts.lock().unwrap();
    let prompt = &prompts[0];
    assert!(prompt.contains("シミが消える"));
    assert!(prompt.contains("第66条 誇大広告の禁止"));
    assert!(prompt.contains("効果を断定しない"));
    assert!(prompt.contains("保湿"));
}

#[tokio::test]
async fn test_any_field_change_is_a_distinct_check() {
    let fixture = fixture();
    let generator = ScriptedGenerator::new(Script::Reply(VERDICT));
    let checker = checker(&fixture, generator.clone(), ModelParams::default());

    checker.check(&request("シミが消える")).await;
    checker.check(&request("シミが消える").with_approval(true)).await;
    checker.check(&request("シミが消える").with_special_points("美白")).await;
    checker
        .check(&CheckRequest::new("シミが消える", TextType::Headline, Category::Cosmetics))
        .await;
    checker
        .check(&CheckRequest::new("シミが消える", TextType::Catchphrase, Category::QuasiDrug))
        .await;

    assert_eq!(generator.calls(), 5);
    assert_eq!(checker.cache_status().await.result_entries, 5);
}

#[tokio::test]
async fn test_upstream_failure_is_not_cached() {
    let fixture = fixture();
    let generator = ScriptedGenerator::new(Script::Fail);
    let checker = checker(&fixture, generator.clone(), ModelParams::default());

    let response = checker.check(&request("即効性あり")).await;
    assert_eq!(response.source, ResultSource::UpstreamFailure);
    assert_eq!(response.result.overall_risk, RiskLevel::Medium);
    assert_eq!(response.result.rewrites.texts(), ["即効性あり"; 3]);

    checker.check(&request("即効性あり")).await;
    assert_eq!(generator.calls(), 2);
    assert_eq!(checker.cache_status().await.result_entries, 0);
}

#[tokio::test]
async fn test_unrecoverable_output_is_not_cached() {
    let fixture = fixture();
    let generator = ScriptedGenerator::new(Script::Reply("申し訳ありませんが判定できません。"));
    let checker = checker(&fixture, generator.clone(), ModelParams::default());

    let response = checker.check(&request("即効性あり")).await;
    assert_eq!(response.source, ResultSource::Model(Strategy::Fallback));

    checker.check(&request("即効性あり")).await;
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn test_fallback_model_is_tried_after_failure() {
    let fixture = fixture();
    let generator = ScriptedGenerator::new(Script::OnlyModel("haiku"));
    let params = ModelParams {
        fallback_model: Some("haiku".to_string()),
        ..ModelParams::default()
    };
    let checker = checker(&fixture, generator.clone(), params);

    let response = checker.check(&request("シミが消える")).await;

    assert_eq!(response.source, ResultSource::Model(Strategy::DirectParse));
    assert_eq!(*generator.models.lock().unwrap(), vec!["sonnet", "haiku"]);
}

#[tokio::test]
async fn test_timeout_skips_fallback_model() {
    let fixture = fixture();
    let generator = ScriptedGenerator::new(Script::Timeout);
    let params = ModelParams {
        fallback_model: Some("haiku".to_string()),
        ..ModelParams::default()
    };
    let checker = checker(&fixture, generator.clone(), params);

    let response = checker.check(&request("シミが消える")).await;

    assert_eq!(response.source, ResultSource::UpstreamFailure);
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn test_unavailable_generator_uses_prescreen() {
    let fixture = fixture();
    let generator = ScriptedGenerator::unavailable();
    let checker = checker(&fixture, generator.clone(), ModelParams::default());

    let flagged = checker.check(&request("即効性と美白を実感")).await;
    assert_eq!(flagged.source, ResultSource::PreScreen);
    assert_eq!(flagged.result.overall_risk, RiskLevel::High);
    assert_eq!(flagged.result.issues.len(), 2);

    let clean = checker.check(&request("毎日のうるおい習慣")).await;
    assert_eq!(clean.source, ResultSource::Unavailable);
    assert_eq!(clean.result.overall_risk, RiskLevel::Low);

    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_result_invalidation_forces_new_generation() {
    let fixture = fixture();
    let generator = ScriptedGenerator::new(Script::Reply(VERDICT));
    let checker = checker(&fixture, generator.clone(), ModelParams::default());

    checker.check(&request("シミが消える")).await;
    let events = checker.invalidate(Partition::Result).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].removed, 1);

    let again = checker.check(&request("シミが消える")).await;
    assert_ne!(again.source, ResultSource::Cache);
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn test_invalidate_all_covers_every_partition() {
    let fixture = fixture();
    let generator = ScriptedGenerator::new(Script::Reply(VERDICT));
    let checker = checker(&fixture, generator, ModelParams::default());
    checker.check(&request("シミが消える")).await;

    let events = checker.invalidate(Partition::All).await;
    let partitions: Vec<_> = events.iter().map(|e| e.partition).collect();
    assert_eq!(partitions, vec![Partition::Data, Partition::Rule, Partition::Result]);

    let status = checker.cache_status().await;
    assert!(!status.data.cached);
    assert!(!status.rules.cached);
    assert_eq!(status.result_entries, 0);
}

#[tokio::test]
async fn test_data_invalidation_keeps_results() {
    let fixture = fixture();
    let generator = ScriptedGenerator::new(Script::Reply(VERDICT));
    let checker = checker(&fixture, generator.clone(), ModelParams::default());
    checker.check(&request("シミが消える")).await;

    checker.invalidate(Partition::Data).await;

    let again = checker.check(&request("シミが消える")).await;
    assert_eq!(again.source, ResultSource::Cache);
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn test_cache_status_reports_activity() {
    let fixture = fixture();
    let generator = ScriptedGenerator::new(Script::Reply(VERDICT));
    let checker = checker(&fixture, generator, ModelParams::default());

    checker.check(&request("シミが消える")).await;
    checker.check(&request("シミが消える")).await;

    let status = checker.cache_status().await;
    assert_eq!(status.result_entries, 1);
    assert_eq!(status.result_capacity, 100);
    assert_eq!(status.result_stats.hits, 1);
    assert_eq!(status.result_stats.misses, 1);
    assert_eq!(status.hit_rate, 50.0);
    assert!(status.data.cached);
    assert_eq!(status.data.tracked_files, 1);
    assert_eq!(status.rules.entries, 1);
    assert!(status.notifier.is_none());
}

#[tokio::test]
async fn test_concurrent_identical_checks_agree() {
    let fixture = fixture();
    let generator = ScriptedGenerator::new(Script::Reply(VERDICT));
    let checker = Arc::new(checker(&fixture, generator, ModelParams::default()));

    let checks = (0..8).map(|_| {
        let checker = checker.clone();
        async move { checker.check_text("シミが消える", TextType::Catchphrase, Category::Cosmetics, "", false).await }
    });
    let results = futures::future::join_all(checks).await;

    assert!(results.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(checker.cache_status().await.result_entries, 1);
}

#[tokio::test]
async fn test_poll_watching_invalidates_changed_sources() {
    let fixture = fixture();
    let generator = ScriptedGenerator::new(Script::Reply(VERDICT));
    let checker = checker(&fixture, generator, ModelParams::default());
    let caches = checker.caches();

    let config = yakki_core::WatchConfig {
        mode: yakki_core::WatchMode::Poll,
        debounce: Duration::from_millis(10),
        poll_interval: Duration::from_millis(25),
    };
    assert_eq!(caches.start_watching(&config), Some(yakki_core::WatchMode::Poll));
    caches.data_snapshot().await;

    // Let the first tick record its baseline
    tokio::time::sleep(Duration::from_millis(60)).await;
    fs::write(fixture.reference.data_dir.join("law2.md"), "第67条").unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    let status = caches.status().await;
    let notifier = status.notifier.expect("notifier running");
    assert!(notifier.signals >= 1);
    assert!(!status.data.notifier_backed);
    assert!(caches.data_snapshot().await.content.contains("第67条"));

    caches.stop_watching();
    assert!(!caches.status().await.notifier.map(|n| n.running).unwrap_or(false));
}
