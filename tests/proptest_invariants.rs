//! Property-based tests for planner invariants.
//!
//! These tests use proptest to check that the structural guarantees of
//! patterns, feasibility, filters, selection, and the sequence store hold
//! across randomly generated opportunity sets.

use holistic_planner::calculators::{Opportunities, category};
use holistic_planner::candidate::{ActionSequence, has_duplicate_symbols, mean_priority};
use holistic_planner::evaluation::{SequenceEvaluation, select_best};
use holistic_planner::feasibility::{check, filter_feasible, is_cash_feasible};
use holistic_planner::filters;
use holistic_planner::generators::{PartialExecutionGenerator, SequenceGenerator};
use holistic_planner::params::params;
use holistic_planner::patterns;
use holistic_planner::portfolio::PortfolioContext;
use holistic_planner::store::sequence_hash;
use holistic_planner::{
    ActionCandidate, InMemorySequenceStore, OpportunityContext, SequenceStore, TradeSide,
};
use proptest::prelude::*;
use rustc_hash::FxHashMap;

const BUY_CATEGORIES: [&str; 3] = [
    category::AVERAGING_DOWN,
    category::REBALANCE_BUYS,
    category::OPPORTUNITY_BUYS,
];
const SELL_CATEGORIES: [&str; 2] = [category::PROFIT_TAKING, category::REBALANCE_SELLS];

/// Generate (value, priority) pairs for a list of candidates
fn candidate_specs(max: usize) -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((1.0f64..2_000.0, 0.0f64..=1.0), 0..max)
}

fn candidate(side: TradeSide, symbol: String, value: f64, priority: f64) -> ActionCandidate {
    ActionCandidate::new(side, &symbol, &symbol, 1, value)
        .with_value(value)
        .with_priority(priority)
}

/// Spread generated buys and sells over the categories patterns draw from.
/// Symbols are unique per candidate.
fn opportunities(buys: &[(f64, f64)], sells: &[(f64, f64)]) -> Opportunities {
    let mut grouped: FxHashMap<&str, Vec<ActionCandidate>> = FxHashMap::default();
    for (i, (value, priority)) in buys.iter().enumerate() {
        let cat = BUY_CATEGORIES[i % BUY_CATEGORIES.len()];
        grouped
            .entry(cat)
            .or_default()
            .push(candidate(TradeSide::Buy, format!("B{i}"), *value, *priority));
    }
    for (i, (value, priority)) in sells.iter().enumerate() {
        let cat = SELL_CATEGORIES[i % SELL_CATEGORIES.len()];
        grouped
            .entry(cat)
            .or_default()
            .push(candidate(TradeSide::Sell, format!("S{i}"), *value, *priority));
    }

    let mut opps = Opportunities::new();
    for cat in SELL_CATEGORIES.iter().chain(BUY_CATEGORIES.iter()) {
        if let Some(list) = grouped.remove(cat) {
            opps.insert(cat, list);
        }
    }
    opps
}

fn context(cash: f64) -> OpportunityContext {
    OpportunityContext::new(
        PortfolioContext::from_values(Vec::new(), &[], cash),
        Vec::new(),
        Vec::new(),
        cash,
        FxHashMap::default(),
    )
}

/// Random sequences over a small symbol alphabet so duplicates occur.
fn sequences_strategy() -> impl Strategy<Value = Vec<ActionSequence>> {
    let action = (any::<bool>(), 0usize..6, 1.0f64..1_000.0, 0.0f64..=1.0).prop_map(
        |(is_buy, sym, value, priority)| {
            let side = if is_buy { TradeSide::Buy } else { TradeSide::Sell };
            candidate(side, format!("X{sym}"), value, priority)
        },
    );
    prop::collection::vec(prop::collection::vec(action, 0..5), 0..20)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // ========================================================================
    // PATTERN INVARIANTS
    // ========================================================================

    /// Every pattern respects depth, symbol uniqueness, and running cash
    #[test]
    fn patterns_emit_well_formed_sequences(
        buys in candidate_specs(8),
        sells in candidate_specs(6),
        cash in 0.0f64..5_000.0,
        depth in 1i64..=6,
    ) {
        let opps = opportunities(&buys, &sells);
        let ctx = context(cash);
        let p = params([("max_depth", depth)]);

        for pattern in patterns::builtin() {
            let out = pattern.generate(&opps, cash, &ctx, &p).unwrap();
            for seq in &out {
                prop_assert!(!seq.is_empty(), "{} emitted an empty sequence", pattern.name());
                prop_assert!(seq.len() <= depth as usize,
                    "{} exceeded depth {}: {}", pattern.name(), depth, seq.len());
                prop_assert!(!has_duplicate_symbols(seq), "{} repeated a symbol", pattern.name());
                prop_assert!(is_cash_feasible(seq, cash),
                    "{} overspent starting from {}", pattern.name(), cash);
            }
        }
    }

    /// Without any opportunities no pattern produces anything
    #[test]
    fn patterns_are_silent_without_opportunities(cash in 0.0f64..5_000.0) {
        let opps = Opportunities::new();
        let ctx = context(cash);
        for pattern in patterns::builtin() {
            let out = pattern.generate(&opps, cash, &ctx, &pattern.default_params()).unwrap();
            prop_assert!(out.is_empty(), "{} produced output from nothing", pattern.name());
        }
    }

    // ========================================================================
    // FEASIBILITY
    // ========================================================================

    /// Kept sequences pass every check; counts add up; order is preserved
    #[test]
    fn feasibility_keeps_only_valid(
        sequences in sequences_strategy(),
        threshold in 0.0f64..=1.0,
        cash in 0.0f64..2_000.0,
    ) {
        let total = sequences.len();
        let expected: Vec<ActionSequence> = sequences
            .iter()
            .filter(|s| check(s, threshold, cash).is_none())
            .cloned()
            .collect();

        let (kept, stats) = filter_feasible(sequences, threshold, cash);

        prop_assert_eq!(stats.kept + stats.rejected(), total);
        prop_assert_eq!(&kept, &expected);
        for seq in &kept {
            prop_assert!(!has_duplicate_symbols(seq));
            prop_assert!(mean_priority(seq) >= threshold);
            prop_assert!(is_cash_feasible(seq, cash));
        }
    }

    // ========================================================================
    // PARTIAL EXECUTION
    // ========================================================================

    /// Full fill is the input unchanged; partial fills floor the quantity and
    /// vanish below min_shares
    #[test]
    fn partial_execution_quantities(
        qty in 0u64..500,
        pct in 0.05f64..0.99,
        min_shares in 1i64..20,
    ) {
        let mut action = candidate(TradeSide::Buy, "P".into(), 1_000.0, 0.5);
        action.quantity = qty;
        let ctx = context(0.0);

        let mut p = params([("min_shares", min_shares)]);
        p.insert(
            "fill_percentages".into(),
            toml::Value::Array(vec![toml::Value::Float(pct), toml::Value::Float(1.0)]),
        );
        let out = PartialExecutionGenerator
            .generate(std::slice::from_ref(&action), &ctx, &p)
            .unwrap();

        let expected_qty = (qty as f64 * pct).floor() as u64;
        let full = out.last().unwrap();
        prop_assert_eq!(full, &vec![action.clone()]);
        if expected_qty < min_shares as u64 {
            prop_assert_eq!(out.len(), 1);
        } else {
            prop_assert_eq!(out.len(), 2);
            prop_assert_eq!(out[0][0].quantity, expected_qty);
            prop_assert!((out[0][0].value_eur - 1_000.0 * pct).abs() < 1e-9);
        }
    }

    // ========================================================================
    // FILTERS
    // ========================================================================

    /// Filters only remove sequences; they never invent or alter one
    #[test]
    fn filters_return_a_subset(sequences in sequences_strategy()) {
        let ctx = context(1_000.0);
        for filter in filters::builtin(None) {
            let out = filter.filter(&sequences, &ctx, &filter.default_params()).unwrap();
            prop_assert!(out.len() <= sequences.len(), "{} grew the set", filter.name());
            for seq in &out {
                prop_assert!(sequences.contains(seq), "{} invented a sequence", filter.name());
            }
        }
    }

    // ========================================================================
    // SELECTION
    // ========================================================================

    /// The selected result is feasible, positive, and no feasible result beats it
    #[test]
    fn select_best_is_max_feasible(
        results in prop::collection::vec((0.0f64..=1.0, any::<bool>()), 0..30),
    ) {
        let evaluations: Vec<SequenceEvaluation> = results
            .iter()
            .enumerate()
            .map(|(i, (score, feasible))| SequenceEvaluation {
                sequence: vec![candidate(TradeSide::Buy, format!("E{i}"), 10.0, 0.5)],
                score: *score,
                feasible: *feasible,
                end_cash_eur: 0.0,
                transaction_costs: 0.0,
                breakdown: Default::default(),
            })
            .collect();

        match select_best(&evaluations) {
            Some(best) => {
                prop_assert!(best.feasible);
                prop_assert!(best.score > 0.0);
                for r in evaluations.iter().filter(|r| r.feasible) {
                    prop_assert!(r.score <= best.score);
                }
            }
            None => {
                prop_assert!(evaluations.iter().all(|r| !r.feasible || r.score <= 0.0));
            }
        }
    }

    // ========================================================================
    // SEQUENCE STORE
    // ========================================================================

    /// Re-inserting the same sequences adds nothing; hashes are stable
    #[test]
    fn store_deduplicates(sequences in sequences_strategy(), portfolio in any::<u64>()) {
        let non_empty: Vec<ActionSequence> =
            sequences.into_iter().filter(|s| !s.is_empty()).collect();
        let store = InMemorySequenceStore::new();

        store.insert(portfolio, non_empty.clone()).unwrap();
        let count = store.count(portfolio).unwrap();
        let added_again = store.insert(portfolio, non_empty.clone()).unwrap();

        prop_assert_eq!(added_again, 0);
        prop_assert_eq!(store.count(portfolio).unwrap(), count);
        prop_assert_eq!(store.pending(portfolio).unwrap(), count);
        for seq in &non_empty {
            prop_assert_eq!(sequence_hash(seq), sequence_hash(&seq.clone()));
        }
    }

    /// Batches come out highest mean priority first
    #[test]
    fn store_batches_by_priority(sequences in sequences_strategy()) {
        let non_empty: Vec<ActionSequence> =
            sequences.into_iter().filter(|s| !s.is_empty()).collect();
        let store = InMemorySequenceStore::new();
        store.insert(7, non_empty).unwrap();

        let batch = store.next_unevaluated(7, 100).unwrap();
        for pair in batch.windows(2) {
            prop_assert!(mean_priority(&pair[0].1) >= mean_priority(&pair[1].1));
        }
    }
}
