//! Property-based tests for anti-unification, cluster membership and
//! subsumption.

mod common;

use common::*;
use proptest::prelude::*;
use spacer_engine::anti_unify::are_neighbours;
use spacer_engine::cluster::LemmaCluster;
use spacer_engine::cluster_finder::LemmaClusterFinder;
use spacer_engine::lemma::{LemmaRef, Level};
use spacer_engine::normalize::normalize_cube;
use spacer_engine::subsume::cube_implies;
use spacer_smt::sorts::SmtSort;
use spacer_smt::terms::SmtTerm;

fn engine_proptest_config() -> ProptestConfig {
    ProptestConfig::with_cases(64)
}

/// One literal drawn from a few shapes over `x` and `y`.
fn literal() -> impl Strategy<Value = SmtTerm> {
    (0..4u8, -20i64..20).prop_map(|(shape, k)| match shape {
        0 => x().le(int(k)),
        1 => y().eq(int(k)),
        2 => x().add(y()).ge(int(k)),
        _ => int(2).mul(x()).le(int(k)),
    })
}

fn cube() -> impl Strategy<Value = Vec<SmtTerm>> {
    prop::collection::vec(literal(), 1..4)
}

fn steps() -> impl Strategy<Value = Vec<(i64, i64)>> {
    prop::collection::vec((-15i64..15, -15i64..15), 1..10)
}

proptest! {
    #![proptest_config(engine_proptest_config())]

    /// Being neighbours does not depend on argument order.
    #[test]
    fn neighbourhood_is_symmetric(a in cube(), b in cube()) {
        let (na, nb) = (normalize_cube(&a), normalize_cube(&b));
        let ab = are_neighbours(&na, &nb).expect("neighbours");
        let ba = are_neighbours(&nb, &na).expect("neighbours");
        prop_assert_eq!(ab, ba);
    }

    /// Every member of every cluster instantiates the pattern with numerals,
    /// and no lemma is a member twice.
    #[test]
    fn clusters_hold_numeral_instances_once(points in steps()) {
        let mut node = node_with_reach(x().ge(int(100)));
        let pob = pob();
        let mut finder = LemmaClusterFinder::new();
        for (a, b) in points {
            let lemma = node.add_lemma(step(a, b), Level(1), &pob);
            finder.cluster(&mut node, &lemma).expect("cluster");
        }
        for cluster in node.clusters() {
            for (i, info) in cluster.lemmas().iter().enumerate() {
                let sub = cluster.match_cube(&info.lemma().cube());
                prop_assert!(sub.is_some(), "{} does not match {}", info.lemma(), cluster.pattern());
                prop_assert!(sub.is_some_and(|s| s.all_numerals()));
                for other in &cluster.lemmas()[i + 1..] {
                    prop_assert!(!info.lemma().ptr_eq(other.lemma()));
                }
            }
        }
    }

    /// Removing subsumed members never grows a cluster and leaves no member
    /// implying another.
    #[test]
    fn subsumption_leaves_an_antichain(points in steps()) {
        let pattern = SmtTerm::and(vec![
            y().eq(SmtTerm::var(0, SmtSort::Int)),
            x().le(SmtTerm::var(1, SmtSort::Int)),
        ]);
        let mut cluster = LemmaCluster::new(pattern);
        let pob = pob();
        let lemmas: Vec<LemmaRef> = points
            .iter()
            .enumerate()
            .map(|(id, (a, b))| LemmaRef::new(id as u64, step(*a, *b), Level(1), pob.clone()))
            .collect();
        for l in &lemmas {
            cluster.add_lemma(l, false);
        }
        let before = cluster.size();
        let removed = cluster.rm_subsumed();
        prop_assert!(cluster.size() <= before);
        prop_assert_eq!(cluster.size() + removed.len(), before);
        let cubes: Vec<Vec<SmtTerm>> = cluster.lemmas().iter().map(|li| li.lemma().cube()).collect();
        for (i, a) in cubes.iter().enumerate() {
            for (j, b) in cubes.iter().enumerate() {
                if i != j {
                    prop_assert!(!cube_implies(a, b));
                }
            }
        }
    }
}
