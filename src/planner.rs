//! The planning pipeline: context, opportunities, sequences, filtering,
//! evaluation, and plan assembly.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use rustc_hash::{FxHashMap, FxHashSet, FxHasher};

use crate::calculators::{Opportunities, OpportunityCalculator, identify_opportunities};
use crate::candidate::ActionSequence;
use crate::config::PlannerConfiguration;
use crate::context::{MarketRegime, OpportunityContext};
use crate::eligibility::{EligibilityRules, check_sell_eligibility};
use crate::error::Result;
use crate::evaluation::{
    DefaultPortfolioScorer, EvaluationEngine, LocalEvaluator, SequenceEvaluator, select_best,
};
use crate::feasibility::filter_feasible;
use crate::filters::{SequenceFilter, apply_filters};
use crate::generators::SequenceGenerator;
use crate::params::Params;
use crate::patterns::PatternGenerator;
use crate::plan::HolisticPlan;
use crate::portfolio::{PortfolioContext, Position, Security, TransactionCosts};
use crate::ports::memory::{MemorySettings, MemoryTradeHistory};
use crate::ports::{
    ExchangeRateService, PortfolioScorer, SettingsRepository, TradeRepository, setting_or,
};
use crate::store::SequenceStore;

/// Inputs for one planning call.
#[derive(Clone)]
pub struct PlanRequest {
    pub portfolio: PortfolioContext,
    pub positions: Vec<Position>,
    pub securities: Vec<Security>,
    pub available_cash: f64,
    pub current_prices: FxHashMap<String, f64>,
    pub target_weights: Option<FxHashMap<String, f64>>,
    pub exchange_rates: Option<Arc<dyn ExchangeRateService>>,
    pub market_regime: MarketRegime,
    /// Reference time for cooldown and holding-period checks
    pub as_of: DateTime<Utc>,
}

impl PlanRequest {
    pub fn new(
        portfolio: PortfolioContext,
        positions: Vec<Position>,
        securities: Vec<Security>,
        available_cash: f64,
        current_prices: FxHashMap<String, f64>,
    ) -> Self {
        Self {
            portfolio,
            positions,
            securities,
            available_cash,
            current_prices,
            target_weights: None,
            exchange_rates: None,
            market_regime: MarketRegime::default(),
            as_of: Utc::now(),
        }
    }

    pub fn with_target_weights(mut self, weights: FxHashMap<String, f64>) -> Self {
        self.target_weights = Some(weights);
        self
    }

    pub fn with_exchange_rates(mut self, rates: Arc<dyn ExchangeRateService>) -> Self {
        self.exchange_rates = Some(rates);
        self
    }

    pub fn with_market_regime(mut self, regime: MarketRegime) -> Self {
        self.market_regime = regime;
        self
    }

    pub fn as_of(mut self, at: DateTime<Utc>) -> Self {
        self.as_of = at;
        self
    }

    /// Identity of the portfolio state: sorted positions and cash, rounded.
    pub fn portfolio_hash(&self) -> u64 {
        let mut positions: Vec<(&str, i64)> = self
            .positions
            .iter()
            .map(|p| (p.symbol.as_str(), (p.quantity * 10_000.0).round() as i64))
            .collect();
        positions.sort();
        let mut hasher = FxHasher::default();
        positions.hash(&mut hasher);
        ((self.available_cash * 100.0).round() as i64).hash(&mut hasher);
        hasher.finish()
    }
}

/// Collaborators the planner reads from.
#[derive(Clone)]
pub struct Repositories {
    pub settings: Arc<dyn SettingsRepository>,
    pub trades: Arc<dyn TradeRepository>,
    pub scorer: Arc<dyn PortfolioScorer>,
}

impl Repositories {
    /// Empty settings and trade history with the built-in scorer.
    pub fn in_memory() -> Self {
        Self {
            settings: Arc::new(MemorySettings::new()),
            trades: Arc::new(MemoryTradeHistory::default()),
            scorer: Arc::new(DefaultPortfolioScorer),
        }
    }
}

/// Enabled modules with their merged parameters, in execution order.
#[derive(Clone, Default)]
pub struct ModuleSet {
    pub calculators: Vec<(Arc<dyn OpportunityCalculator>, Params)>,
    pub patterns: Vec<(Arc<dyn PatternGenerator>, Params)>,
    pub generators: Vec<(Arc<dyn SequenceGenerator>, Params)>,
    pub filters: Vec<(Arc<dyn SequenceFilter>, Params)>,
}

/// Context and opportunities shared by the later stages.
struct Prepared {
    ctx: OpportunityContext,
    opportunities: Opportunities,
}

/// A configured planning pipeline. Immutable once built; share it behind an
/// `Arc`.
pub struct Planner {
    config: PlannerConfiguration,
    modules: ModuleSet,
    repositories: Repositories,
    remote: Option<Arc<dyn SequenceEvaluator>>,
}

impl Planner {
    pub fn new(config: PlannerConfiguration, modules: ModuleSet, repositories: Repositories) -> Self {
        Self {
            config,
            modules,
            repositories,
            remote: None,
        }
    }

    /// Try this backend before evaluating locally.
    pub fn with_remote(mut self, remote: Arc<dyn SequenceEvaluator>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn config(&self) -> &PlannerConfiguration {
        &self.config
    }

    pub fn modules(&self) -> &ModuleSet {
        &self.modules
    }

    /// Opportunities the enabled calculators find for this request.
    pub fn opportunities(&self, request: &PlanRequest) -> Result<Opportunities> {
        Ok(self.prepare(request)?.opportunities)
    }

    /// Run the full pipeline and return the best plan found.
    pub fn create_plan(&self, request: &PlanRequest) -> Result<HolisticPlan> {
        let prepared = self.prepare(request)?;
        let current_score = self.current_score(&prepared.ctx)?;

        let sequences = self.candidate_sequences(&prepared);
        if sequences.is_empty() {
            info!("no feasible sequences, returning empty plan");
            return Ok(HolisticPlan::empty(current_score));
        }

        let engine = self.engine()?;
        let eval_ctx = prepared
            .ctx
            .evaluation_context(self.config.planner.cost_penalty_factor);
        match engine.evaluate_best(&sequences, &eval_ctx)? {
            Some(best) => {
                let plan = HolisticPlan::assemble(&best, current_score, &prepared.ctx, &prepared.opportunities);
                info!(
                    "plan '{}': {} steps, score {:.3} -> {:.3}",
                    self.config.planner.name,
                    plan.steps.len(),
                    plan.current_score,
                    plan.end_state_score
                );
                Ok(plan)
            }
            None => {
                info!("no sequence scored above zero, returning empty plan");
                Ok(HolisticPlan::empty(current_score))
            }
        }
    }

    /// Evaluate the next `batch_size` stored sequences for this portfolio
    /// and return the plan of the best one seen so far.
    ///
    /// The first call for a portfolio state generates and stores every
    /// candidate sequence, even when there are none; later calls only
    /// evaluate. Returns `None` until a
    /// feasible sequence has been scored.
    pub fn create_plan_incremental(
        &self,
        request: &PlanRequest,
        batch_size: usize,
        store: &dyn SequenceStore,
    ) -> Result<Option<HolisticPlan>> {
        let hash = request.portfolio_hash();
        let purged = store.purge_except(hash)?;
        if purged > 0 {
            debug!("purged {purged} sequences from earlier portfolio states");
        }

        let prepared = self.prepare(request)?;
        if !store.is_seeded(hash)? {
            let sequences = self.candidate_sequences(&prepared);
            let stored = store.insert(hash, sequences)?;
            info!("stored {stored} sequences for portfolio {hash:016x}");
        }

        let batch = store.next_unevaluated(hash, batch_size.max(1))?;
        if !batch.is_empty() {
            let (hashes, sequences): (Vec<u64>, Vec<ActionSequence>) = batch.into_iter().unzip();
            let eval_ctx = prepared
                .ctx
                .evaluation_context(self.config.planner.cost_penalty_factor);
            let results = self.engine()?.evaluate(&sequences, &eval_ctx)?;

            if let Some(candidate) = select_best(&results) {
                let improves = store
                    .best(hash)?
                    .is_none_or(|current| candidate.score > current.score);
                if improves {
                    store.set_best(hash, candidate.clone())?;
                }
            }
            for (seq_hash, result) in hashes.into_iter().zip(results) {
                store.record_evaluation(hash, seq_hash, result)?;
            }
            info!(
                "incremental batch: {} evaluated, {} pending",
                sequences.len(),
                store.pending(hash)?
            );
        }

        let Some(best) = store.best(hash)? else {
            return Ok(None);
        };
        let current_score = self.current_score(&prepared.ctx)?;
        Ok(Some(HolisticPlan::assemble(
            &best,
            current_score,
            &prepared.ctx,
            &prepared.opportunities,
        )))
    }

    /// Stages 1 and 2: build the context and identify opportunities.
    fn prepare(&self, request: &PlanRequest) -> Result<Prepared> {
        let ctx = self.build_context(request)?;
        let opportunities = identify_opportunities(
            &self.modules.calculators,
            &ctx,
            self.config.planner.max_opportunities_per_category,
        );
        Ok(Prepared { ctx, opportunities })
    }

    /// Stages 3 to 6: patterns, generators, filters, feasibility.
    fn candidate_sequences(&self, prepared: &Prepared) -> Vec<ActionSequence> {
        let Prepared { ctx, opportunities } = prepared;
        if opportunities.is_empty() {
            return Vec::new();
        }

        let mut sequences: Vec<ActionSequence> = Vec::new();
        for (pattern, params) in &self.modules.patterns {
            match pattern.generate(opportunities, ctx.available_cash, ctx, params) {
                Ok(generated) => sequences.extend(generated),
                Err(e) => warn!("pattern {} failed, skipping: {e}", pattern.name()),
            }
        }
        let from_patterns = sequences.len();

        let flat = opportunities.flatten();
        for (generator, params) in &self.modules.generators {
            match generator.generate(&flat, ctx, params) {
                Ok(generated) => sequences.extend(generated),
                Err(e) => warn!("generator {} failed, skipping: {e}", generator.name()),
            }
        }
        info!(
            "generated {} sequences ({from_patterns} from patterns, {} from generators)",
            sequences.len(),
            sequences.len() - from_patterns
        );

        let filtered = apply_filters(&self.modules.filters, sequences, ctx);
        let (feasible, _) = filter_feasible(
            filtered,
            self.config.planner.priority_threshold,
            ctx.available_cash,
        );
        feasible
    }

    /// Stage 1: the read-only snapshot every module works from.
    fn build_context(&self, request: &PlanRequest) -> Result<OpportunityContext> {
        let settings = self.repositories.settings.as_ref();
        let trades = self.repositories.trades.as_ref();
        let rules = EligibilityRules::from_settings(settings)?;

        let mut portfolio = request.portfolio.clone();
        for position in &request.positions {
            if portfolio.positions.contains_key(&position.symbol) {
                continue;
            }
            let value = match position.market_value_eur {
                Some(v) => v,
                None => convert(request, position.market_value(), &position.currency),
            };
            portfolio.positions.insert(position.symbol.clone(), value);
            portfolio.total_value += value;
        }
        for security in &request.securities {
            portfolio.record_security(security);
        }

        let sold_since = request.as_of - Duration::days(rules.sell_cooldown_days);
        let bought_since = request.as_of - Duration::days(rules.buy_cooldown_days);
        let recently_sold = trades.recently_sold_symbols(sold_since)?;
        let recently_bought = trades.recently_bought_symbols(bought_since)?;

        let mut ineligible = FxHashSet::default();
        for position in &request.positions {
            let allow_sell = request
                .securities
                .iter()
                .find(|s| s.symbol == position.symbol)
                .is_none_or(|s| s.allow_sell);
            let last = trades.last_transaction(&position.symbol)?;
            if let Err(block) = check_sell_eligibility(
                allow_sell,
                position.profit_pct(),
                last.as_ref(),
                &rules,
                request.as_of,
            ) {
                debug!("{} not sellable: {block}", position.symbol);
                ineligible.insert(position.symbol.clone());
            }
        }

        let global = &self.config.planner;
        let mut ctx = OpportunityContext::new(
            portfolio,
            request.positions.clone(),
            request.securities.clone(),
            request.available_cash,
            request.current_prices.clone(),
        );
        ctx.target_weights = request.target_weights.clone();
        ctx.ineligible_symbols = ineligible;
        ctx.recently_sold = recently_sold;
        ctx.recently_bought = recently_bought;
        ctx.costs = TransactionCosts {
            fixed: global.transaction_cost_fixed,
            percent: global.transaction_cost_percent,
        };
        ctx.allow_buy = global.allow_buy;
        ctx.allow_sell = global.allow_sell;
        ctx.market_regime = request.market_regime;
        ctx.exchange_rates = request.exchange_rates.clone();

        debug!(
            "context: {} positions, {} securities, cash {:.2}, {} ineligible, {} recently sold",
            ctx.positions.len(),
            ctx.securities.len(),
            ctx.available_cash,
            ctx.ineligible_symbols.len(),
            ctx.recently_sold.len()
        );
        Ok(ctx)
    }

    fn current_score(&self, ctx: &OpportunityContext) -> Result<f64> {
        Ok(self.repositories.scorer.score(&ctx.portfolio)?.total / 100.0)
    }

    /// Evaluation engine for one call. Multi-timeframe blending follows the
    /// current settings.
    fn engine(&self) -> Result<EvaluationEngine> {
        let multi_timeframe =
            setting_or(self.repositories.settings.as_ref(), "enable_multi_timeframe", 0.0)? == 1.0;
        let local = LocalEvaluator::new(self.repositories.scorer.clone())
            .with_multi_timeframe(multi_timeframe);
        Ok(EvaluationEngine::new(local, self.remote.clone()))
    }
}

fn convert(request: &PlanRequest, amount: f64, currency: &str) -> f64 {
    match &request.exchange_rates {
        Some(fx) if currency != "EUR" => fx.to_eur(amount, currency).unwrap_or_else(|e| {
            warn!("currency conversion failed for {currency}: {e}");
            amount
        }),
        _ => amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PlannerConfiguration, PlannerFactory};
    use crate::ports::TradeRecord;
    use crate::registry::ModuleRegistry;
    use crate::side::TradeSide;
    use crate::evaluation::SequenceEvaluation;
    use crate::store::InMemorySequenceStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts candidate inserts on top of the in-memory store.
    #[derive(Default)]
    struct CountingStore {
        inner: InMemorySequenceStore,
        inserts: AtomicUsize,
    }

    impl SequenceStore for CountingStore {
        fn purge_except(&self, portfolio_hash: u64) -> Result<usize> {
            self.inner.purge_except(portfolio_hash)
        }

        fn count(&self, portfolio_hash: u64) -> Result<usize> {
            self.inner.count(portfolio_hash)
        }

        fn is_seeded(&self, portfolio_hash: u64) -> Result<bool> {
            self.inner.is_seeded(portfolio_hash)
        }

        fn insert(&self, portfolio_hash: u64, sequences: Vec<ActionSequence>) -> Result<usize> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            self.inner.insert(portfolio_hash, sequences)
        }

        fn next_unevaluated(&self, portfolio_hash: u64, limit: usize) -> Result<Vec<(u64, ActionSequence)>> {
            self.inner.next_unevaluated(portfolio_hash, limit)
        }

        fn record_evaluation(
            &self,
            portfolio_hash: u64,
            sequence_hash: u64,
            evaluation: SequenceEvaluation,
        ) -> Result<()> {
            self.inner.record_evaluation(portfolio_hash, sequence_hash, evaluation)
        }

        fn pending(&self, portfolio_hash: u64) -> Result<usize> {
            self.inner.pending(portfolio_hash)
        }

        fn best(&self, portfolio_hash: u64) -> Result<Option<SequenceEvaluation>> {
            self.inner.best(portfolio_hash)
        }

        fn set_best(&self, portfolio_hash: u64, evaluation: SequenceEvaluation) -> Result<()> {
            self.inner.set_best(portfolio_hash, evaluation)
        }
    }

    fn request(cash: f64) -> PlanRequest {
        let securities = vec![
            Security::new("AAPL", "Apple").with_country("US").with_quality(0.8),
            Security::new("SAP", "SAP").with_country("DE").with_quality(0.9),
            Security::new("ASML", "ASML").with_country("NL").with_quality(0.85),
        ];
        let positions = vec![
            Position::new("AAPL", 20.0, 100.0).with_price(150.0),
            Position::new("SAP", 10.0, 120.0).with_price(100.0),
        ];
        let mut portfolio = PortfolioContext::from_values(
            vec![("AAPL".to_string(), 3000.0), ("SAP".to_string(), 1000.0)],
            &securities,
            cash,
        );
        portfolio.country_weights.insert("US".into(), 0.4);
        portfolio.country_weights.insert("DE".into(), 0.3);
        portfolio.country_weights.insert("NL".into(), 0.3);
        let mut prices = FxHashMap::default();
        prices.insert("AAPL".into(), 150.0);
        prices.insert("SAP".into(), 100.0);
        prices.insert("ASML".into(), 50.0);
        PlanRequest::new(portfolio, positions, securities, cash, prices)
    }

    fn planner(repos: Repositories) -> Planner {
        let registry = Arc::new(ModuleRegistry::builtin(None).unwrap());
        PlannerFactory::new(registry, repos)
            .build(&PlannerConfiguration::default())
            .unwrap()
    }

    #[test]
    fn plan_is_deterministic() {
        let p = planner(Repositories::in_memory());
        let req = request(1000.0);
        let a = p.create_plan(&req).unwrap();
        let b = p.create_plan(&req).unwrap();
        assert_eq!(a.steps, b.steps);
        assert_eq!(a.end_state_score, b.end_state_score);
    }

    #[test]
    fn recently_bought_position_is_not_sellable() {
        let now = Utc::now();
        let trades = MemoryTradeHistory::new(vec![TradeRecord {
            symbol: "AAPL".into(),
            side: TradeSide::Buy,
            executed_at: now - Duration::days(5),
        }]);
        let repos = Repositories {
            trades: Arc::new(trades),
            ..Repositories::in_memory()
        };
        let p = planner(repos);
        let ctx = p.build_context(&request(0.0).as_of(now)).unwrap();
        assert!(ctx.ineligible_symbols.contains("AAPL"));
        assert!(ctx.recently_bought.contains("AAPL"));
        assert!(!ctx.ineligible_symbols.contains("SAP"));
    }

    #[test]
    fn missing_position_values_are_filled() {
        let mut req = request(0.0);
        req.portfolio.positions.remove("SAP");
        req.portfolio.total_value -= 1000.0;
        let ctx = planner(Repositories::in_memory()).build_context(&req).unwrap();
        assert_eq!(ctx.portfolio.value_of("SAP"), 1000.0);
        assert_eq!(ctx.total_value, 4000.0);
    }

    #[test]
    fn portfolio_hash_tracks_state() {
        let a = request(100.0);
        let b = request(100.0);
        assert_eq!(a.portfolio_hash(), b.portfolio_hash());
        assert_ne!(a.portfolio_hash(), request(200.0).portfolio_hash());
    }

    #[test]
    fn incremental_matches_full_once_exhausted() {
        let p = planner(Repositories::in_memory());
        let req = request(1000.0);
        let store = InMemorySequenceStore::new();
        let mut last = None;
        for _ in 0..1000 {
            last = p.create_plan_incremental(&req, 7, &store).unwrap();
            if store.pending(req.portfolio_hash()).unwrap() == 0 {
                break;
            }
        }
        let full = p.create_plan(&req).unwrap();
        match last {
            Some(plan) => assert_eq!(plan.end_state_score, full.end_state_score),
            None => assert!(full.is_empty()),
        }
    }

    #[test]
    fn incremental_generates_once_even_without_candidates() {
        let config = PlannerConfiguration::from_toml_str("[planner]\nname = \"idle\"\n").unwrap();
        let registry = Arc::new(ModuleRegistry::builtin(None).unwrap());
        let p = PlannerFactory::new(registry, Repositories::in_memory())
            .build(&config)
            .unwrap();
        let req = request(1000.0);
        let store = CountingStore::default();

        for _ in 0..3 {
            assert!(p.create_plan_incremental(&req, 5, &store).unwrap().is_none());
        }
        assert_eq!(store.inserts.load(Ordering::SeqCst), 1);
        assert!(store.is_seeded(req.portfolio_hash()).unwrap());
        assert_eq!(store.count(req.portfolio_hash()).unwrap(), 0);
    }
}
