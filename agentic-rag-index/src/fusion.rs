//! Reciprocal Rank Fusion.

use std::collections::HashMap;

/// Fuse ranked candidate lists.
///
/// Each candidate scores `Σ 1 / (rank + k)` over the lists it appears in, with
/// 1-based ranks. Candidates present in only one list still qualify. The output
/// is sorted by fused score descending, ties broken by first appearance
/// (earlier lists first), and truncated to `limit`.
pub fn reciprocal_rank_fusion<T>(lists: Vec<Vec<T>>, k: f32, limit: usize) -> Vec<(T, f32)>
where
    T: Clone + Eq + std::hash::Hash,
{
    let mut scores: HashMap<T, (f32, usize)> = HashMap::new();
    let mut seen = 0usize;

    for list in lists {
        for (rank, item) in list.into_iter().enumerate() {
            let contribution = 1.0 / (rank as f32 + 1.0 + k);
            let entry = scores.entry(item).or_insert_with(|| {
                seen += 1;
                (0.0, seen)
            });
            entry.0 += contribution;
        }
    }

    let mut fused: Vec<(T, f32, usize)> =
        scores.into_iter().map(|(item, (score, order))| (item, score, order)).collect();
    fused.sort_by(|a, b| {
        b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.2.cmp(&b.2))
    });
    fused.truncate(limit);
    fused.into_iter().map(|(item, score, _)| (item, score)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_in_both_lists_outranks_single_list_candidates() {
        let dense = vec!["a", "b", "c"];
        let sparse = vec!["c", "d"];
        let fused = reciprocal_rank_fusion(vec![dense, sparse], 60.0, 10);

        assert_eq!(fused[0].0, "c");
        let c = fused[0].1;
        assert!((c - (1.0 / 63.0 + 1.0 / 61.0)).abs() < 1e-6);
        assert_eq!(fused.len(), 4);
    }

    #[test]
    fn ties_keep_first_appearance_order() {
        let fused = reciprocal_rank_fusion(vec![vec!["x", "y"], vec!["y", "x"]], 60.0, 10);
        assert_eq!(fused[0].0, "x");
        assert_eq!(fused[1].0, "y");
        assert!((fused[0].1 - fused[1].1).abs() < 1e-9);
    }

    #[test]
    fn output_is_truncated_and_descending() {
        let fused = reciprocal_rank_fusion(vec![(0..20).collect::<Vec<_>>()], 60.0, 5);
        assert_eq!(fused.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
        assert!(fused.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn empty_input_yields_nothing() {
        let fused = reciprocal_rank_fusion::<u32>(vec![vec![], vec![]], 60.0, 5);
        assert!(fused.is_empty());
    }
}
