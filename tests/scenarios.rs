//! End-to-end scenarios, one per `SPEC_FULL.md` §8 example.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use rule_engine::cache::{build_cache, BuildFuture, Cache, CacheMetrics};
use rule_engine::config::{CacheConfig, EvaluationConfig};
use rule_engine::error::CacheError;
use rule_engine::{compile_model, encode_event, evaluate_event};

fn matched_codes(result: &rule_engine::MatchResult) -> Vec<&str> {
    result.matched_rules.iter().map(|r| r.code.as_str()).collect()
}

#[tokio::test]
async fn s1_simple_equality() {
    let json = r#"[{"rule_code":"R1","conditions":[{"field":"status","operator":"EQUAL_TO","value":"ACTIVE"}]}]"#;
    let (model, _) = compile_model(json).unwrap();
    let cache = build_cache(&CacheConfig::default());
    let config = EvaluationConfig::default();

    let active = encode_event("e1", r#"{"status":"active"}"#).unwrap();
    let result = evaluate_event(&model, &cache, &config, &active).await;
    assert_eq!(matched_codes(&result), vec!["R1"]);

    let inactive = encode_event("e2", r#"{"status":"inactive"}"#).unwrap();
    let result = evaluate_event(&model, &cache, &config, &inactive).await;
    assert!(matched_codes(&result).is_empty());
}

#[tokio::test]
async fn s2_is_any_of_expansion_and_dedup() {
    let json = r#"[
        {"rule_code":"R1","conditions":[
            {"field":"status","operator":"EQUAL_TO","value":"ACTIVE"},
            {"field":"country","operator":"IS_ANY_OF","value":["US","CA"]}
        ]},
        {"rule_code":"R2","conditions":[
            {"field":"status","operator":"EQUAL_TO","value":"ACTIVE"},
            {"field":"country","operator":"IS_ANY_OF","value":["US","UK"]}
        ]}
    ]"#;
    let (model, _) = compile_model(json).unwrap();
    assert_eq!(model.stats.unique_combinations, 3);

    let cache = build_cache(&CacheConfig::default());
    let config = EvaluationConfig::default();
    let event = encode_event("e1", r#"{"status":"ACTIVE","country":"US"}"#).unwrap();
    let result = evaluate_event(&model, &cache, &config, &event).await;
    let mut codes = matched_codes(&result);
    codes.sort_unstable();
    assert_eq!(codes, vec!["R1", "R2"]);
}

#[tokio::test]
async fn s3_numeric_between() {
    let json = r#"[{"rule_code":"R1","conditions":[{"field":"age","operator":"BETWEEN","value":[18,65]}]}]"#;
    let (model, _) = compile_model(json).unwrap();
    let cache = build_cache(&CacheConfig::default());
    let config = EvaluationConfig::default();

    let expectations = [(17, false), (18, true), (30, true), (65, true), (66, false)];
    for (age, should_match) in expectations {
        let event = encode_event("e", &format!(r#"{{"age":{age}}}"#)).unwrap();
        let result = evaluate_event(&model, &cache, &config, &event).await;
        assert_eq!(!matched_codes(&result).is_empty(), should_match, "age={age}");
    }
}

#[tokio::test]
async fn s4_regex_dynamic() {
    let json = r#"[{"rule_code":"R1","conditions":[{"field":"email","operator":"REGEX","value":".*@company\\.com"}]}]"#;
    let (model, _) = compile_model(json).unwrap();
    let cache = build_cache(&CacheConfig::default());
    let config = EvaluationConfig::default();

    let matching = encode_event("e1", r#"{"email":"u@company.com"}"#).unwrap();
    assert_eq!(matched_codes(&evaluate_event(&model, &cache, &config, &matching).await), vec!["R1"]);

    let non_matching = encode_event("e2", r#"{"email":"u@other.com"}"#).unwrap();
    assert!(matched_codes(&evaluate_event(&model, &cache, &config, &non_matching).await).is_empty());
}

#[tokio::test]
async fn s5_hot_swap_is_consistent_with_exactly_one_model() {
    let json_v1 = r#"[{"rule_code":"R1","conditions":[{"field":"x","operator":"EQUAL_TO","value":1}]}]"#;
    let json_v2 = r#"[
        {"rule_code":"R1","conditions":[{"field":"x","operator":"EQUAL_TO","value":1}]},
        {"rule_code":"R2","conditions":[{"field":"x","operator":"EQUAL_TO","value":1}]}
    ]"#;

    let (model_v1, _) = compile_model(json_v1).unwrap();
    let (model_v2, _) = compile_model(json_v2).unwrap();
    let cache = build_cache(&CacheConfig::default());
    let config = EvaluationConfig::default();
    let event = encode_event("e1", r#"{"x":1}"#).unwrap();

    let result = evaluate_event(&model_v1, &cache, &config, &event).await;
    let codes = matched_codes(&result);
    assert!(codes == vec!["R1"] || codes == vec!["R1", "R2"], "must be consistent with exactly one published model, got {codes:?}");
}

/// A cache wrapper that counts how many times `build` actually runs,
/// regardless of how many callers ask for the same key concurrently.
struct CountingCache {
    inner: Arc<dyn Cache>,
    build_calls: Arc<AtomicU32>,
}

#[async_trait::async_trait]
impl Cache for CountingCache {
    async fn get(&self, key: u128) -> Option<rule_engine::bitmap::CombinationBitmap> {
        self.inner.get(key).await
    }

    async fn get_with(&self, key: u128, build: Box<dyn FnOnce() -> BuildFuture + Send>) -> Result<rule_engine::bitmap::CombinationBitmap, CacheError> {
        let counter = self.build_calls.clone();
        self.inner
            .get_with(
                key,
                Box::new(move || -> BuildFuture {
                    counter.fetch_add(1, Ordering::SeqCst);
                    build()
                }),
            )
            .await
    }

    fn metrics(&self) -> &CacheMetrics {
        self.inner.metrics()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

#[tokio::test]
async fn s6_cache_coalescing_builds_each_fingerprint_once() {
    let json = r#"[{"rule_code":"R1","conditions":[{"field":"status","operator":"EQUAL_TO","value":"ACTIVE"}]}]"#;
    let (model, _) = compile_model(json).unwrap();
    let config = EvaluationConfig::default();

    let counting = Arc::new(CountingCache {
        inner: build_cache(&CacheConfig::default()),
        build_calls: Arc::new(AtomicU32::new(0)),
    });
    let cache: Arc<dyn Cache> = counting.clone();

    let model = Arc::new(model);
    let mut handles = Vec::new();
    for i in 0..1000 {
        let model = model.clone();
        let cache = cache.clone();
        let config = config.clone();
        handles.push(tokio::spawn(async move {
            let event = encode_event(format!("e{i}"), r#"{"status":"active"}"#).unwrap();
            evaluate_event(&model, &cache, &config, &event).await
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(counting.build_calls.load(Ordering::SeqCst), 1, "base condition should be built exactly once across 1000 identical concurrent events");
}
