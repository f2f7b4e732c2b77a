use std::cmp::Ordering;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::candidate::{ActionCandidate, ActionSequence, mean_priority};
use crate::context::OpportunityContext;
use crate::error::Result;
use crate::params::{Params, param_f64, param_usize, params};

use super::SequenceFilter;

/// Caps the sequence count while spreading the survivors across
/// countries and industries.
///
/// Sequences are clustered by their lead action's security: country first,
/// then industry, then the first three characters of the symbol. Each
/// cluster gets an equal quota, the rest is filled by priority, and the
/// result is ordered by a blend of priority and cluster rarity.
pub struct DiversityFilter;

impl DiversityFilter {
    fn lead(seq: &ActionSequence) -> Option<&ActionCandidate> {
        seq.iter().find(|a| a.is_buy()).or_else(|| seq.first())
    }

    fn cluster_key(seq: &ActionSequence, ctx: &OpportunityContext) -> String {
        let Some(lead) = Self::lead(seq) else {
            return "EMPTY".to_string();
        };
        if let Some(sec) = ctx.security(&lead.symbol) {
            if let Some(country) = &sec.country {
                return format!("COUNTRY:{country}");
            }
            if let Some(industry) = &sec.industry {
                return format!("INDUSTRY:{industry}");
            }
        }
        let prefix: String = lead.symbol.chars().take(3).collect();
        format!("SYMBOL:{prefix}")
    }
}

impl SequenceFilter for DiversityFilter {
    fn name(&self) -> &'static str {
        "diversity"
    }

    fn default_params(&self) -> Params {
        let mut p = params([("diversity_weight", 0.3)]);
        p.insert("max_sequences".into(), toml::Value::Integer(100));
        p
    }

    fn filter(
        &self,
        sequences: &[ActionSequence],
        ctx: &OpportunityContext,
        p: &Params,
    ) -> Result<Vec<ActionSequence>> {
        let max = param_usize(p, "max_sequences", 100);
        let weight = param_f64(p, "diversity_weight", 0.3).clamp(0.0, 1.0);
        if sequences.len() <= max {
            return Ok(sequences.to_vec());
        }
        if max == 0 {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = sequences.iter().map(|s| Self::cluster_key(s, ctx)).collect();
        let priorities: Vec<f64> = sequences.iter().map(|s| mean_priority(s)).collect();
        let by_priority = |a: &usize, b: &usize| {
            priorities[*b]
                .partial_cmp(&priorities[*a])
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.cmp(b))
        };

        // Clusters in first-seen order, members by priority
        let mut clusters: Vec<(&str, Vec<usize>)> = Vec::new();
        let mut index: FxHashMap<&str, usize> = FxHashMap::default();
        for (i, key) in keys.iter().enumerate() {
            let slot = *index.entry(key.as_str()).or_insert_with(|| {
                clusters.push((key.as_str(), Vec::new()));
                clusters.len() - 1
            });
            clusters[slot].1.push(i);
        }
        for (_, members) in &mut clusters {
            members.sort_by(by_priority);
        }
        let total = |members: &[usize]| members.iter().map(|&i| priorities[i]).sum::<f64>();
        clusters.sort_by(|a, b| {
            total(b.1.as_slice())
                .partial_cmp(&total(a.1.as_slice()))
                .unwrap_or(Ordering::Equal)
        });

        let quota = (max / clusters.len()).max(1);
        let mut selected: Vec<usize> = Vec::with_capacity(max);
        for (_, members) in &clusters {
            selected.extend(members.iter().take(quota));
            if selected.len() >= max {
                break;
            }
        }
        if selected.len() < max {
            let taken: FxHashSet<usize> = selected.iter().copied().collect();
            let mut rest: Vec<usize> = (0..sequences.len()).filter(|i| !taken.contains(i)).collect();
            rest.sort_by(by_priority);
            rest.truncate(max - selected.len());
            selected.extend(rest);
        }

        let mut same: FxHashMap<&str, usize> = FxHashMap::default();
        for &i in &selected {
            *same.entry(keys[i].as_str()).or_insert(0) += 1;
        }
        let score = |i: usize| {
            let others = same[keys[i].as_str()] - 1;
            let bonus = 1.0 / (1.0 + others as f64 * 0.5);
            (1.0 - weight) * priorities[i] + weight * bonus
        };
        selected.sort_by(|&a, &b| {
            score(b)
                .partial_cmp(&score(a))
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.cmp(&b))
        });
        selected.truncate(max);

        Ok(selected.into_iter().map(|i| sequences[i].clone()).collect())
    }
}
