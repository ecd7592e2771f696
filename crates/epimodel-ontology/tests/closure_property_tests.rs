use epimodel_ontology::{CachedOracle, ClosureOracle, RefinementOracle};
use proptest::prelude::*;

fn term(idx: u8) -> String {
    format!("ido:{idx:07}")
}

/// Reference reachability over direct edges (Floyd-Warshall style).
fn reachable(edges: &[(u8, u8)], n: u8) -> Vec<Vec<bool>> {
    let n = n as usize;
    let mut reach = vec![vec![false; n]; n];
    for &(child, parent) in edges {
        reach[child as usize][parent as usize] = true;
    }
    for k in 0..n {
        for i in 0..n {
            for j in 0..n {
                if reach[i][k] && reach[k][j] {
                    reach[i][j] = true;
                }
            }
        }
    }
    reach
}

fn edges_strategy() -> impl Strategy<Value = Vec<(u8, u8)>> {
    prop::collection::vec((0u8..8, 0u8..8), 0..16)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn closure_matches_reachability(edges in edges_strategy()) {
        let oracle = ClosureOracle::from_direct_edges(
            edges.iter().map(|&(c, p)| (term(c), term(p))),
        );
        let reach = reachable(&edges, 8);
        for child in 0u8..8 {
            for parent in 0u8..8 {
                let expected = child != parent && reach[child as usize][parent as usize];
                prop_assert_eq!(
                    oracle.is_ontological_child(&term(child), &term(parent)).unwrap(),
                    expected
                );
            }
        }
    }

    #[test]
    fn pairs_reload_to_the_same_closure(edges in edges_strategy()) {
        let oracle = ClosureOracle::from_direct_edges(
            edges.iter().map(|&(c, p)| (term(c), term(p))),
        );
        let json = serde_json::to_string(&oracle.to_pairs()).unwrap();
        let reloaded = ClosureOracle::from_json(&json).unwrap();
        prop_assert_eq!(reloaded.len(), oracle.len());
        prop_assert_eq!(reloaded.to_pairs(), oracle.to_pairs());
    }

    #[test]
    fn cache_agrees_with_inner_oracle(
        edges in edges_strategy(),
        queries in prop::collection::vec((0u8..8, 0u8..8), 1..32),
    ) {
        let oracle = ClosureOracle::from_direct_edges(
            edges.iter().map(|&(c, p)| (term(c), term(p))),
        );
        let cached = CachedOracle::new(&oracle);
        for &(c, p) in &queries {
            prop_assert_eq!(
                cached.is_ontological_child(&term(c), &term(p)).unwrap(),
                oracle.contains(&term(c), &term(p))
            );
        }
        prop_assert_eq!(cached.hits() + cached.misses(), queries.len());
    }
}
