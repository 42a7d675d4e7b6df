use proptest::prelude::*;

use rfpmatch_core::ScoreBoard;

fn fold(contributions: &[(u8, u32)]) -> Vec<(String, f32)> {
    let mut board = ScoreBoard::new();
    for (doc, raw) in contributions {
        // map to a score in [-1, 1]
        let score = (*raw as f32 / u32::MAX as f32) * 2.0 - 1.0;
        board.merge(format!("doc-{doc}"), score);
    }
    board.iter().map(|(key, score)| (key.to_string(), score)).collect()
}

proptest! {
    #[test]
    fn merge_is_order_independent(
        contributions in prop::collection::vec((0u8..16, any::<u32>()), 0..64),
        seed in any::<u64>(),
    ) {
        let mut shuffled = contributions.clone();
        // deterministic Fisher-Yates driven by the seed
        let mut state = seed | 1;
        for i in (1..shuffled.len()).rev() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let j = (state % (i as u64 + 1)) as usize;
            shuffled.swap(i, j);
        }
        prop_assert_eq!(fold(&contributions), fold(&shuffled));
    }

    #[test]
    fn merged_score_is_the_maximum_contribution(
        scores in prop::collection::vec(-1.0f32..1.0, 1..32),
    ) {
        let mut board = ScoreBoard::new();
        for score in &scores {
            board.merge("doc", *score);
        }
        let expected = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        prop_assert_eq!(board.get("doc"), Some(expected));
    }
}
