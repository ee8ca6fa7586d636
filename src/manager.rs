//! Model Manager (C11): owns the current compiled model behind an
//! `arc-swap` pointer so evaluators always read a consistent snapshot
//! without locking, and hot-swaps it atomically when a recompile
//! succeeds. A background task polls the rule source file on
//! `watch_interval_seconds` and triggers a recompile when its contents
//! change.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::cache::{build_cache, Cache};
use crate::config::{CacheConfig, ModelConfig};
use crate::error::{CompileError, ModelLoadError};
use crate::model::{compile_model, EngineModel};

/// A callback invoked with every newly-published model, e.g. to pre-warm
/// the result cache by running representative events through it before
/// traffic sees the swap. Returning `Err` only logs a warning — a failed
/// warmup never undoes the swap, since the model is already live by the
/// time the hook runs.
pub type WarmupHook = Arc<dyn Fn(&EngineModel) -> Result<(), String> + Send + Sync>;

/// Shared, hot-swappable engine state: the current model plus the result
/// cache built for it. The cache is rebuilt alongside the model on every
/// successful recompile since base-condition hashes from the old model
/// are meaningless against the new one.
pub struct ModelManager {
    current: ArcSwap<(EngineModel, Arc<dyn Cache>)>,
    rule_source_path: PathBuf,
    cache_config: CacheConfig,
    last_source_hash: std::sync::atomic::AtomicU64,
    warmup_hook: Option<WarmupHook>,
}

impl ModelManager {
    /// Performs the initial compile. The process must not start with no
    /// model, so this is the one place a compile failure is fatal.
    pub fn bootstrap(model_config: &ModelConfig, cache_config: &CacheConfig) -> Result<Self, ModelLoadError> {
        Self::bootstrap_with_warmup(model_config, cache_config, None)
    }

    /// Same as [`Self::bootstrap`], but additionally registers a warmup
    /// hook that runs once after the initial model is published and again
    /// after every subsequent [`Self::reload`].
    pub fn bootstrap_with_warmup(
        model_config: &ModelConfig,
        cache_config: &CacheConfig,
        warmup_hook: Option<WarmupHook>,
    ) -> Result<Self, ModelLoadError> {
        let source = std::fs::read_to_string(&model_config.rule_source_path).map_err(|e| ModelLoadError::Io(e.to_string()))?;
        let (model, _warnings) = compile_model(&source).map_err(|errors| {
            ModelLoadError::Compile(errors.into_iter().next().unwrap_or(CompileError::Parse("empty compile error list".to_string())))
        })?;
        let cache = build_cache(cache_config);
        let source_hash = crate::hashing::canonical_hash(source.as_bytes());

        let manager = Self {
            current: ArcSwap::new(Arc::new((model, cache))),
            rule_source_path: model_config.rule_source_path.clone(),
            cache_config: cache_config.clone(),
            last_source_hash: std::sync::atomic::AtomicU64::new(source_hash),
            warmup_hook,
        };
        manager.run_warmup();

        Ok(manager)
    }

    /// Registers or replaces the warmup hook after construction.
    pub fn set_warmup_hook(&mut self, hook: WarmupHook) {
        self.warmup_hook = Some(hook);
    }

    fn run_warmup(&self) {
        if let Some(hook) = &self.warmup_hook {
            if let Err(message) = hook(&self.current.load().0) {
                tracing::warn!(error = %message, "model warmup hook failed; new model remains live");
            }
        }
    }

    pub fn model(&self) -> arc_swap::Guard<Arc<(EngineModel, Arc<dyn Cache>)>> {
        self.current.load()
    }

    /// Attempts to recompile from the current contents of the rule
    /// source file. On success, atomically swaps in the new model and a
    /// fresh cache. On failure, the previous model remains live and the
    /// errors are returned to the caller (e.g. for logging) without
    /// affecting in-flight evaluations.
    pub fn reload(&self) -> Result<(), Vec<CompileError>> {
        let source = std::fs::read_to_string(&self.rule_source_path).map_err(|e| vec![CompileError::Io(e.to_string())])?;
        let (model, _warnings) = compile_model(&source)?;
        let cache = build_cache(&self.cache_config);
        let source_hash = crate::hashing::canonical_hash(source.as_bytes());
        self.last_source_hash.store(source_hash, std::sync::atomic::Ordering::Relaxed);
        self.current.store(Arc::new((model, cache)));
        tracing::info!(path = %self.rule_source_path.display(), "model manager swapped in new model");
        self.run_warmup();
        Ok(())
    }

    /// Recompiles only if the rule source's contents changed since the
    /// last successful compile. Returns `true` if a swap happened.
    pub fn reload_if_changed(&self) -> Result<bool, Vec<CompileError>> {
        let source = match std::fs::read_to_string(&self.rule_source_path) {
            Ok(s) => s,
            Err(e) => return Err(vec![CompileError::Io(e.to_string())]),
        };
        let candidate_hash = crate::hashing::canonical_hash(source.as_bytes());
        if candidate_hash == self.last_source_hash.load(std::sync::atomic::Ordering::Relaxed) {
            return Ok(false);
        }
        self.reload().map(|()| true)
    }

    /// Spawns the background watcher task. The returned handle can be
    /// aborted on shutdown.
    pub fn spawn_watcher(manager: Arc<Self>, watch_interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(watch_interval);
            loop {
                ticker.tick().await;
                if let Err(errors) = manager.reload_if_changed() {
                    for error in errors {
                        tracing::warn!(error = %error, "rule source recompile failed, retaining previous model");
                    }
                }
            }
        })
    }

    pub fn rule_source_path(&self) -> &Path {
        &self.rule_source_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_source(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("rules.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_bootstrap_fails_fast_on_invalid_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(&dir, "not json");
        let model_config = ModelConfig {
            rule_source_path: path,
            watch_interval_seconds: 10,
        };
        let result = ModelManager::bootstrap(&model_config, &CacheConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_reload_replaces_model_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(&dir, r#"[{"rule_code":"R1","conditions":[{"field":"a","operator":"EQUAL_TO","value":1}]}]"#);
        let model_config = ModelConfig {
            rule_source_path: path.clone(),
            watch_interval_seconds: 10,
        };
        let manager = ModelManager::bootstrap(&model_config, &CacheConfig::default()).unwrap();
        assert_eq!(manager.model().0.stats.logical_rules, 1);

        std::fs::write(
            &path,
            r#"[{"rule_code":"R1","conditions":[{"field":"a","operator":"EQUAL_TO","value":1}]},
               {"rule_code":"R2","conditions":[{"field":"b","operator":"EQUAL_TO","value":2}]}]"#,
        )
        .unwrap();
        manager.reload().unwrap();
        assert_eq!(manager.model().0.stats.logical_rules, 2);
    }

    #[test]
    fn test_reload_failure_retains_previous_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(&dir, r#"[{"rule_code":"R1","conditions":[{"field":"a","operator":"EQUAL_TO","value":1}]}]"#);
        let model_config = ModelConfig {
            rule_source_path: path.clone(),
            watch_interval_seconds: 10,
        };
        let manager = ModelManager::bootstrap(&model_config, &CacheConfig::default()).unwrap();

        std::fs::write(&path, "garbage").unwrap();
        assert!(manager.reload().is_err());
        assert_eq!(manager.model().0.stats.logical_rules, 1);
    }

    #[test]
    fn test_warmup_hook_runs_on_bootstrap_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(&dir, r#"[{"rule_code":"R1","conditions":[{"field":"a","operator":"EQUAL_TO","value":1}]}]"#);
        let model_config = ModelConfig {
            rule_source_path: path.clone(),
            watch_interval_seconds: 10,
        };
        let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let calls_clone = calls.clone();
        let hook: WarmupHook = Arc::new(move |_model| {
            calls_clone.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            Ok(())
        });

        let manager = ModelManager::bootstrap_with_warmup(&model_config, &CacheConfig::default(), Some(hook)).unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::Relaxed), 1);

        std::fs::write(
            &path,
            r#"[{"rule_code":"R1","conditions":[{"field":"a","operator":"EQUAL_TO","value":1}]},
               {"rule_code":"R2","conditions":[{"field":"b","operator":"EQUAL_TO","value":2}]}]"#,
        )
        .unwrap();
        manager.reload().unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::Relaxed), 2);
    }

    #[test]
    fn test_warmup_hook_failure_does_not_undo_swap() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(&dir, r#"[{"rule_code":"R1","conditions":[{"field":"a","operator":"EQUAL_TO","value":1}]}]"#);
        let model_config = ModelConfig {
            rule_source_path: path,
            watch_interval_seconds: 10,
        };
        let hook: WarmupHook = Arc::new(|_model| Err("warmup backend unreachable".to_string()));

        let manager = ModelManager::bootstrap_with_warmup(&model_config, &CacheConfig::default(), Some(hook)).unwrap();
        assert_eq!(manager.model().0.stats.logical_rules, 1);
    }

    #[test]
    fn test_reload_if_changed_skips_identical_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(&dir, r#"[{"rule_code":"R1","conditions":[{"field":"a","operator":"EQUAL_TO","value":1}]}]"#);
        let model_config = ModelConfig {
            rule_source_path: path,
            watch_interval_seconds: 10,
        };
        let manager = ModelManager::bootstrap(&model_config, &CacheConfig::default()).unwrap();
        assert_eq!(manager.reload_if_changed().unwrap(), false);
    }
}
