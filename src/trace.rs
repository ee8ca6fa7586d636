//! Trace Collector (C14): records per-event evaluation detail at one of
//! four verbosity levels. Below [`TraceLevel::RuleOnly`] the collector's
//! methods are no-ops that short-circuit before touching `tracing`, so
//! production traffic pays nothing for trace plumbing beyond one integer
//! comparison.

use crate::config::TraceLevel;

/// One predicate evaluation recorded at [`TraceLevel::Full`].
#[derive(Debug, Clone)]
pub struct PredicateTrace {
    pub predicate_id: u32,
    pub field: String,
    pub result: bool,
}

/// One matched rule recorded at [`TraceLevel::RuleOnly`] and above.
#[derive(Debug, Clone)]
pub struct RuleTrace {
    pub rule_code: String,
    pub priority: i32,
}

/// Accumulates trace detail for a single event evaluation. Constructed
/// once per event by the evaluator (C10) and discarded (or emitted via
/// `tracing`) once evaluation completes.
#[derive(Debug, Clone, Default)]
pub struct EventTrace {
    level: Option<TraceLevel>,
    pub matched_rules: Vec<RuleTrace>,
    pub predicate_results: Vec<PredicateTrace>,
    pub base_sets_evaluated: u32,
    pub combinations_considered: u32,
}

impl EventTrace {
    pub fn new(level: TraceLevel) -> Self {
        Self {
            level: (level > TraceLevel::None).then_some(level),
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.level.is_some()
    }

    fn at_least(&self, level: TraceLevel) -> bool {
        self.level.is_some_and(|l| l >= level)
    }

    pub fn record_matched_rule(&mut self, rule_code: &str, priority: i32) {
        if self.at_least(TraceLevel::RuleOnly) {
            self.matched_rules.push(RuleTrace {
                rule_code: rule_code.to_string(),
                priority,
            });
        }
    }

    pub fn record_predicate(&mut self, predicate_id: u32, field: &str, result: bool) {
        if self.at_least(TraceLevel::Full) {
            self.predicate_results.push(PredicateTrace {
                predicate_id,
                field: field.to_string(),
                result,
            });
        }
    }

    pub fn record_base_set_evaluated(&mut self) {
        if self.at_least(TraceLevel::Standard) {
            self.base_sets_evaluated += 1;
        }
    }

    pub fn record_combinations_considered(&mut self, count: u32) {
        if self.at_least(TraceLevel::Standard) {
            self.combinations_considered += count;
        }
    }

    /// Emits the accumulated trace as a structured `tracing` event, if
    /// enabled. Called once at the end of evaluation.
    pub fn emit(&self, event_id: &str) {
        if !self.is_enabled() {
            return;
        }
        tracing::debug!(
            event_id,
            matched_rules = self.matched_rules.len(),
            predicates_recorded = self.predicate_results.len(),
            base_sets_evaluated = self.base_sets_evaluated,
            combinations_considered = self.combinations_considered,
            "event trace"
        );
    }
}
