use crate::candidate::ActionCandidate;
use crate::portfolio::{PortfolioContext, Security};

/// End state after replaying a sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Simulation {
    pub end: PortfolioContext,
    pub end_cash: f64,
    /// Buys that were skipped for lack of cash
    pub skipped: usize,
}

/// Apply `sequence` in order to a copy of `start`.
///
/// Sells reduce the position (dropping it at zero) and add to cash. Buys
/// that cash cannot cover are skipped; the rest add to the position and
/// record the security's country and industry. Total value is unchanged.
pub fn simulate_sequence(
    sequence: &[ActionCandidate],
    start: &PortfolioContext,
    cash: f64,
    securities: &[Security],
) -> Simulation {
    let mut end = start.clone();
    let mut cash = cash;
    let mut skipped = 0;

    for action in sequence {
        if action.is_sell() {
            let current = end.value_of(&action.symbol);
            let remaining = (current - action.value_eur).max(0.0);
            if remaining <= 0.0 {
                end.positions.remove(&action.symbol);
            } else {
                end.positions.insert(action.symbol.clone(), remaining);
            }
            cash += action.value_eur;
        } else {
            if action.value_eur > cash {
                skipped += 1;
                continue;
            }
            *end.positions.entry(action.symbol.clone()).or_insert(0.0) += action.value_eur;
            if let Some(sec) = securities.iter().find(|s| s.symbol == action.symbol) {
                if let Some(country) = &sec.country {
                    end.security_countries
                        .entry(sec.symbol.clone())
                        .or_insert_with(|| country.clone());
                }
                if let Some(industry) = &sec.industry {
                    end.security_industries
                        .entry(sec.symbol.clone())
                        .or_insert_with(|| industry.clone());
                }
            }
            cash -= action.value_eur;
        }
    }

    Simulation {
        end,
        end_cash: cash,
        skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::side::TradeSide;

    fn start() -> PortfolioContext {
        let mut p = PortfolioContext {
            total_value: 1000.0,
            ..PortfolioContext::default()
        };
        p.positions.insert("A".into(), 600.0);
        p
    }

    #[test]
    fn sell_then_buy() {
        let securities = vec![Security::new("B", "B").with_country("DE")];
        let seq = vec![
            ActionCandidate::new(TradeSide::Sell, "A", "A", 1, 600.0),
            ActionCandidate::new(TradeSide::Buy, "B", "B", 1, 700.0),
        ];
        let sim = simulate_sequence(&seq, &start(), 400.0, &securities);
        assert!(!sim.end.positions.contains_key("A"));
        assert_eq!(sim.end.value_of("B"), 700.0);
        assert_eq!(sim.end_cash, 300.0);
        assert_eq!(sim.end.security_countries["B"], "DE");
        assert_eq!(sim.end.total_value, 1000.0);
        assert_eq!(sim.skipped, 0);
    }

    #[test]
    fn unaffordable_buy_is_skipped() {
        let seq = vec![ActionCandidate::new(TradeSide::Buy, "B", "B", 1, 500.0)];
        let sim = simulate_sequence(&seq, &start(), 100.0, &[]);
        assert_eq!(sim.skipped, 1);
        assert_eq!(sim.end_cash, 100.0);
        assert_eq!(sim.end, start());
    }

    #[test]
    fn partial_sell_keeps_remainder() {
        let seq = vec![ActionCandidate::new(TradeSide::Sell, "A", "A", 1, 200.0)];
        let original = start();
        let sim = simulate_sequence(&seq, &original, 0.0, &[]);
        assert_eq!(sim.end.value_of("A"), 400.0);
        // Start state is untouched
        assert_eq!(original.value_of("A"), 600.0);
    }
}
