//! Integration tests for the reference content caches
//!
//! Covers freshness by modification time, directory add/remove, the NG
//! list refresh, I/O degradation and concurrent rebuilds.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tempfile::TempDir;
use yakki_core::reference::{DataCache, LocalFs, ReferenceConfig, RuleCache, SourceFs};
use yakki_core::{InvalidationReason, RiskLevel, TextType, YakkiError};

fn setup() -> (TempDir, ReferenceConfig) {
    let root = TempDir::new().unwrap();
    let data = root.path().join("data");
    let rule = root.path().join("rule");
    fs::create_dir(&data).unwrap();
    fs::create_dir(&rule).unwrap();
    fs::write(data.join("law1.md"), "第66条 誇大広告の禁止").unwrap();
    fs::write(data.join("ng.md"), "「治る」は使用不可").unwrap();
    let config = ReferenceConfig::new(data, rule);
    (root, config)
}

/// Rewrite a file and push its modification time forward
fn touch_with(path: &Path, content: &str, offset_secs: u64) {
    fs::write(path, content).unwrap();
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(offset_secs))
        .unwrap();
}

/// Counts reads so rebuilds are observable
struct CountingFs {
    reads: AtomicUsize,
}

#[async_trait]
impl SourceFs for CountingFs {
    async fn list(&self, dir: &Path) -> yakki_core::Result<Vec<PathBuf>> {
        LocalFs.list(dir).await
    }

    async fn read_all(&self, path: &Path) -> yakki_core::Result<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        // Widen the rebuild window for the concurrency test
        tokio::time::sleep(Duration::from_millis(5)).await;
        LocalFs.read_all(path).await
    }

    async fn modified(&self, path: &Path) -> yakki_core::Result<SystemTime> {
        LocalFs.modified(path).await
    }
}

/// Fails reads of the listed files until they are cleared
#[derive(Default)]
struct FlakyFs {
    failing: Mutex<Vec<PathBuf>>,
}

impl FlakyFs {
    fn fail(&self, path: PathBuf) {
        self.failing.lock().unwrap().push(path);
    }

    fn recover(&self) {
        self.failing.lock().unwrap().clear();
    }
}

#[async_trait]
impl SourceFs for FlakyFs {
    async fn list(&self, dir: &Path) -> yakki_core::Result<Vec<PathBuf>> {
        LocalFs.list(dir).await
    }

    async fn read_all(&self, path: &Path) -> yakki_core::Result<String> {
        if self.failing.lock().unwrap().iter().any(|p| p == path) {
            return Err(YakkiError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked"),
            ));
        }
        LocalFs.read_all(path).await
    }

    async fn modified(&self, path: &Path) -> yakki_core::Result<SystemTime> {
        LocalFs.modified(path).await
    }
}

#[tokio::test]
async fn test_aggregate_contains_every_source() {
    let (_root, config) = setup();
    let cache = DataCache::new(Arc::new(LocalFs), &config);

    let content = cache.get_content().await;

    assert!(content.contains("### law1.md"));
    assert!(content.contains("第66条 誇大広告の禁止"));
    assert!(content.contains("### ng.md"));
    assert!(content.find("law1.md").unwrap() < content.find("ng.md").unwrap());
}

#[tokio::test]
async fn test_unchanged_sources_are_not_reread() {
    let (_root, config) = setup();
    let fs_impl = Arc::new(CountingFs {
        reads: AtomicUsize::new(0),
    });
    let cache = DataCache::new(fs_impl.clone(), &config);

    let first = cache.get_content().await;
    let reads_after_build = fs_impl.reads.load(Ordering::SeqCst);
    let second = cache.get_content().await;

    assert_eq!(first, second);
    assert_eq!(reads_after_build, 2);
    assert_eq!(fs_impl.reads.load(Ordering::SeqCst), reads_after_build);
    assert_eq!(cache.state().await.rebuilds, 1);
}

#[tokio::test]
async fn test_touched_file_triggers_rebuild() {
    let (_root, config) = setup();
    let cache = DataCache::new(Arc::new(LocalFs), &config);

    let before = cache.get_content().await;
    assert!(!before.contains("改正"));

    touch_with(&config.data_dir.join("law1.md"), "第66条 改正版", 5);

    let after = cache.get_content().await;
    assert!(after.contains("第66条 改正版"));
    assert_eq!(cache.state().await.rebuilds, 2);
}

#[tokio::test]
async fn test_added_and_removed_files_are_picked_up() {
    let (_root, config) = setup();
    let cache = DataCache::new(Arc::new(LocalFs), &config);
    cache.get_content().await;

    fs::write(config.data_dir.join("guideline.txt"), "適正広告基準").unwrap();
    // Ignored extension
    fs::write(config.data_dir.join("notes.docx"), "binary").unwrap();
    let with_added = cache.get_content().await;
    assert!(with_added.contains("### guideline.txt"));
    assert!(!with_added.contains("notes.docx"));

    fs::remove_file(config.data_dir.join("ng.md")).unwrap();
    let with_removed = cache.get_content().await;
    assert!(!with_removed.contains("### ng.md"));
    assert_eq!(cache.state().await.tracked_files, 2);
}

#[tokio::test]
async fn test_ng_list_refreshes_with_data() {
    let (_root, config) = setup();
    let cache = DataCache::new(Arc::new(LocalFs), &config);

    // Built-in list without a file
    assert!(cache.ng_list().await.expressions().any(|e| e.expression == "完治"));

    let csv = config.data_dir.join("ng_expressions.csv");
    fs::write(&csv, "表現,理由,リスクレベル,代替表現\n若返る,老化防止の暗示,高,ハリを与える\n").unwrap();
    let list = cache.ng_list().await;
    assert_eq!(list.len(), 1);
    let issues = list.screen("飲むたびに若返る");
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].risk_level, RiskLevel::High);

    // The CSV is part of the aggregate as well
    assert!(cache.get_content().await.contains("### ng_expressions.csv"));
}

#[tokio::test]
async fn test_missing_directory_degrades_to_previous_content() {
    let (root, config) = setup();
    let cache = DataCache::new(Arc::new(LocalFs), &config);
    let built = cache.get_content().await;

    fs::remove_dir_all(root.path().join("data")).unwrap();
    assert_eq!(cache.get_content().await, built);

    let cold = DataCache::new(Arc::new(LocalFs), &config);
    assert_eq!(cold.get_content().await, "");
}

#[tokio::test]
async fn test_unreadable_file_keeps_previous_aggregate() {
    let (_root, config) = setup();
    let law1 = config.data_dir.join("law1.md");
    let fs_impl = Arc::new(FlakyFs::default());
    let cache = DataCache::new(fs_impl.clone(), &config);
    let built = cache.get_content().await;

    fs_impl.fail(law1.clone());
    touch_with(&config.data_dir.join("ng.md"), "「即効」は使用不可", 5);
    assert_eq!(cache.get_content().await, built);
    assert_eq!(cache.state().await.rebuilds, 1);

    // Nothing else changes; the pending rebuild is retried once reads succeed
    fs_impl.recover();
    let content = cache.get_content().await;
    assert!(content.contains("第66条 誇大広告の禁止"));
    assert!(content.contains("「即効」は使用不可"));
    assert_eq!(cache.state().await.rebuilds, 2);
}

#[tokio::test]
async fn test_unreadable_file_is_retried_after_cold_build() {
    let (_root, config) = setup();
    let fs_impl = Arc::new(FlakyFs::default());
    fs_impl.fail(config.data_dir.join("law1.md"));
    let cache = DataCache::new(fs_impl.clone(), &config);

    let partial = cache.get_content().await;
    assert!(!partial.contains("law1.md"));
    assert!(partial.contains("### ng.md"));
    assert_eq!(cache.state().await.tracked_files, 1);

    // Still failing: retried, still partial
    assert_eq!(cache.get_content().await, partial);

    fs_impl.recover();
    assert!(cache.get_content().await.contains("第66条 誇大広告の禁止"));
    assert_eq!(cache.state().await.tracked_files, 2);
}

#[tokio::test]
async fn test_partial_build_is_not_pinned_by_notifier() {
    let (_root, config) = setup();
    let fs_impl = Arc::new(FlakyFs::default());
    fs_impl.fail(config.data_dir.join("law1.md"));
    let cache = DataCache::new(fs_impl.clone(), &config);
    cache.set_notifier_backed(true);

    assert!(!cache.get_content().await.contains("law1.md"));

    fs_impl.recover();
    assert!(cache.get_content().await.contains("第66条 誇大広告の禁止"));
}

#[tokio::test]
async fn test_invalidate_forces_rebuild() {
    let (_root, config) = setup();
    let cache = DataCache::new(Arc::new(LocalFs), &config);
    cache.get_content().await;

    let event = cache.invalidate(InvalidationReason::Manual).await;
    assert_eq!(event.removed, 1);
    assert!(!cache.state().await.cached);

    cache.get_content().await;
    assert_eq!(cache.state().await.rebuilds, 2);
}

#[tokio::test]
async fn test_notifier_backed_cache_skips_scan_until_invalidated() {
    let (_root, config) = setup();
    let cache = DataCache::new(Arc::new(LocalFs), &config);
    cache.get_content().await;
    cache.set_notifier_backed(true);

    touch_with(&config.data_dir.join("law1.md"), "差し替え", 5);
    // Served from memory; the notifier has not signalled yet
    assert!(!cache.get_content().await.contains("差し替え"));

    cache
        .invalidate(InvalidationReason::SourceChanged {
            path: config.data_dir.join("law1.md"),
        })
        .await;
    assert!(cache.get_content().await.contains("差し替え"));
}

#[tokio::test]
async fn test_concurrent_callers_share_one_rebuild() {
    let (_root, config) = setup();
    let fs_impl = Arc::new(CountingFs {
        reads: AtomicUsize::new(0),
    });
    let cache = Arc::new(DataCache::new(fs_impl.clone(), &config));

    let callers = (0..16).map(|_| {
        let cache = cache.clone();
        async move { cache.get_content().await }
    });
    let results = futures::future::join_all(callers).await;

    assert!(results.windows(2).all(|w| w[0] == w[1]));
    assert!(results[0].contains("### law1.md"));
    assert_eq!(fs_impl.reads.load(Ordering::SeqCst), 2);
    assert_eq!(cache.state().await.rebuilds, 1);
}

#[tokio::test]
async fn test_rule_content_per_text_type() {
    let (_root, config) = setup();
    fs::write(
        config.rule_dir.join(TextType::Catchphrase.rule_file()),
        "- 効果を断定しない",
    )
    .unwrap();
    let cache = RuleCache::new(Arc::new(LocalFs), &config);

    let catchphrase = cache.get_rule_content(TextType::Catchphrase).await;
    assert!(catchphrase.contains("効果を断定しない"));
    assert!(catchphrase.contains(TextType::Catchphrase.label()));

    // Missing rule file yields empty content
    assert_eq!(cache.get_rule_content(TextType::Testimonial).await, "");
    assert_eq!(cache.state().await.entries, 2);
}

#[tokio::test]
async fn test_rule_content_freshness() {
    let (_root, config) = setup();
    let path = config.rule_dir.join(TextType::Headline.rule_file());
    let cache = RuleCache::new(Arc::new(LocalFs), &config);

    assert_eq!(cache.get_rule_content(TextType::Headline).await, "");

    fs::write(&path, "- 見出しで最上級表現を使わない").unwrap();
    assert!(cache
        .get_rule_content(TextType::Headline)
        .await
        .contains("最上級表現"));

    touch_with(&path, "- 改訂ルール", 5);
    let updated = cache.get_rule_content(TextType::Headline).await;
    assert!(updated.contains("改訂ルール"));
    assert!(!updated.contains("最上級表現"));

    fs::remove_file(&path).unwrap();
    assert_eq!(cache.get_rule_content(TextType::Headline).await, "");
}
