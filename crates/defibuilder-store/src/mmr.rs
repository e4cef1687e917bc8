//! Maximal marginal relevance re-ranking.
//!
//! Given nearest-neighbour candidates for a query, greedily picks the
//! candidate that maximises `λ·sim(query, c) − (1−λ)·max sim(c, picked)`,
//! so later picks are pushed away from passages already chosen. With λ = 1
//! this degenerates to plain similarity order.

use defibuilder_core::cosine_sim;

/// Re-ranking parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MmrParams {
    /// Nearest neighbours fetched before re-ranking.
    pub fetch_k: usize,
    /// Relevance/diversity trade-off in `[0, 1]`; 1 is pure relevance.
    pub lambda: f32,
}

impl Default for MmrParams {
    fn default() -> Self {
        Self {
            fetch_k: 20,
            lambda: 0.5,
        }
    }
}

/// Select up to `k` candidate indices in MMR order.
///
/// Ties go to the lower candidate index, so the result is deterministic for
/// a given candidate order.
pub fn select(query: &[f32], candidates: &[Vec<f32>], k: usize, lambda: f32) -> Vec<usize> {
    let k = k.min(candidates.len());
    if k == 0 {
        return Vec::new();
    }
    let lambda = lambda.clamp(0.0, 1.0);

    let relevance: Vec<f32> = candidates.iter().map(|c| cosine_sim(query, c)).collect();
    // Max similarity of each candidate to anything selected so far.
    let mut redundancy = vec![f32::NEG_INFINITY; candidates.len()];
    let mut picked = vec![false; candidates.len()];
    let mut selected = Vec::with_capacity(k);

    while selected.len() < k {
        let mut best: Option<(usize, f32)> = None;
        for (i, rel) in relevance.iter().enumerate() {
            if picked[i] {
                continue;
            }
            let score = if selected.is_empty() {
                *rel
            } else {
                lambda * rel - (1.0 - lambda) * redundancy[i]
            };
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((i, score));
            }
        }

        let Some((chosen, _)) = best else { break };
        picked[chosen] = true;
        selected.push(chosen);

        for (i, cand) in candidates.iter().enumerate() {
            if !picked[i] {
                redundancy[i] = redundancy[i].max(cosine_sim(cand, &candidates[chosen]));
            }
        }
    }

    selected
}

/// Indices of the `k` most similar candidates, most similar first.
pub fn nearest(query: &[f32], candidates: &[Vec<f32>], k: usize) -> Vec<usize> {
    let mut scored: Vec<(usize, f32)> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (i, cosine_sim(query, c)))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored.into_iter().take(k).map(|(i, _)| i).collect()
}
