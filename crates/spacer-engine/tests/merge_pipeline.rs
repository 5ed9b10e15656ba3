mod common;

use common::*;
use spacer_engine::config::{GeneralizerConfig, GeneralizerKind};
use spacer_engine::error::EngineError;
use spacer_engine::generalizers::{GenEnv, GeneralizerPipeline, PipelineReport};
use spacer_engine::lemma::{LemmaRef, Level};
use spacer_engine::node::PredicateNode;
use spacer_engine::oracle::{SatAnswer, SatOracle};
use spacer_engine::stats::Statistics;
use spacer_smt::context::TermContext;
use spacer_smt::mbp::LraProjector;
use spacer_smt::terms::SmtTerm;

fn run(
    pipeline: &mut GeneralizerPipeline,
    cfg: &GeneralizerConfig,
    node: &mut PredicateNode,
    lemma: &LemmaRef,
) -> Result<PipelineReport, EngineError> {
    let mut terms = TermContext::new();
    let mut sat = sat_oracle();
    let mut projector = LraProjector::new(cfg.fm_pair_limit);
    let mut env = GenEnv {
        terms: &mut terms,
        node,
        sat: &mut sat,
        projector: &mut projector,
    };
    pipeline.run(&mut env, lemma)
}

#[test]
fn cluster_then_merge_covers_every_member() {
    let cfg = GeneralizerConfig {
        pipeline: vec![
            GeneralizerKind::Cluster,
            GeneralizerKind::ClusterMerge,
            GeneralizerKind::SanityCheck,
        ],
        ..GeneralizerConfig::default()
    };
    let mut pipeline = GeneralizerPipeline::from_config(&cfg).expect("pipeline");
    let mut node = node_with_reach(x().ge(int(10)));
    let pob = pob();

    let a = node.add_lemma(step(1, 2), Level(1), &pob);
    let report = run(&mut pipeline, &cfg, &mut node, &a).expect("run");
    assert!(report.updated_by.is_empty());

    let b = node.add_lemma(step(3, 4), Level(1), &pob);
    let report = run(&mut pipeline, &cfg, &mut node, &b).expect("run");
    assert_eq!(report.updated_by, vec!["cluster_merge"]);
    assert_eq!(b.level(), Level::INFINITY);

    let c = node.add_lemma(step(5, 6), Level(1), &pob);
    let report = run(&mut pipeline, &cfg, &mut node, &c).expect("run");
    assert_eq!(report.updated_by, vec!["cluster_merge"]);

    let cube = c.cube_term();
    for (xv, yv) in [(1, 2), (3, 4), (5, 6), (4, 6), (2, 3)] {
        assert!(
            point(&[("x", xv), ("y", yv)]).is_true(&cube),
            "({xv}, {yv}) is not covered by {cube}"
        );
    }
    assert!(!point(&[("x", 6), ("y", 6)]).is_true(&cube));
    assert!(!point(&[("x", 0), ("y", 7)]).is_true(&cube));

    let mut st = Statistics::new();
    pipeline.collect_statistics(&mut st);
    assert_eq!(st.get("SPACER merge gen"), Some(2.0));
}

#[test]
fn literal_dropping_passes_compose() {
    let cfg = GeneralizerConfig::from_json(r#"{ "pipeline": ["bool_inductive", "unsat_core"] }"#)
        .expect("config");
    let mut pipeline = GeneralizerPipeline::from_config(&cfg).expect("pipeline");
    assert_eq!(
        pipeline.passes().collect::<Vec<_>>(),
        vec!["bool_inductive", "unsat_core"]
    );
    let mut node = node_with_reach(x().le(int(10)));
    let lemma = node.add_lemma(vec![y().eq(int(3)), x().ge(int(12))], Level(2), &pob());
    let report = run(&mut pipeline, &cfg, &mut node, &lemma).expect("run");
    assert_eq!(report.updated_by, vec!["bool_inductive"]);
    assert_eq!(lemma.cube(), vec![x().ge(int(12))]);
}

#[test]
fn sanity_check_rejects_reachable_lemma() {
    let cfg = GeneralizerConfig {
        pipeline: vec![GeneralizerKind::SanityCheck],
        ..GeneralizerConfig::default()
    };
    let mut pipeline = GeneralizerPipeline::from_config(&cfg).expect("pipeline");
    let mut node = node_with_reach(x().le(int(10)));
    let lemma = node.add_lemma(vec![x().ge(int(3))], Level(1), &pob());
    assert!(matches!(
        run(&mut pipeline, &cfg, &mut node, &lemma),
        Err(EngineError::Invariant(_))
    ));
}

#[test]
fn lattice_stride_without_modular_support_leaves_lemma() {
    // The projector cannot eliminate a constant under `mod`, so the merge
    // gives up and the lemma is kept as is.
    let cfg = GeneralizerConfig {
        pipeline: vec![GeneralizerKind::Cluster, GeneralizerKind::ClusterMerge],
        lattice_stride: true,
        ..GeneralizerConfig::default()
    };
    let mut pipeline = GeneralizerPipeline::from_config(&cfg).expect("pipeline");
    let mut node = node_with_reach(x().ge(int(100)));
    let pob = pob();
    let a = node.add_lemma(vec![x().eq(int(0))], Level(1), &pob);
    let b = node.add_lemma(vec![x().eq(int(4))], Level(1), &pob);
    run(&mut pipeline, &cfg, &mut node, &a).expect("run");
    let report = run(&mut pipeline, &cfg, &mut node, &b).expect("run");
    assert!(report.updated_by.is_empty());
    assert_eq!(b.cube(), vec![x().eq(int(4))]);
    assert_eq!(node.clusters().len(), 1);
}

#[test]
fn integer_queries_get_a_verdict() {
    // 2x = 1 has only a rational solution.
    let two_x = int(2).mul(x());
    let mut sat = sat_oracle();
    let answer = sat
        .is_satisfiable(&[two_x.clone().ge(int(1)), two_x.clone().le(int(1))])
        .expect("check");
    assert_eq!(answer, SatAnswer::Unsat);

    let reach = SmtTerm::or(vec![two_x.eq(int(1)), x().ge(int(10))]);
    let mut node = node_with_reach(reach);
    let res = node
        .check_inductive(Level(1), &[x().le(int(5))], 0)
        .expect("inductive");
    assert!(res.inductive);
}
