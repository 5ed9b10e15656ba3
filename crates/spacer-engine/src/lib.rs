#![doc = include_str!("../README.md")]

//! Lemma clustering and merge generalization.
//!
//! Lemmas learned for a predicate are grouped into clusters that share a
//! pattern up to numeric constants. The generalizers in [`generalizers`]
//! strengthen new lemmas, most notably by replacing a clustered lemma with
//! the convex closure of its cluster. Solving is delegated to the oracles in
//! [`oracle`] and to the term layer in `spacer-smt`.

pub mod anti_unify;
pub mod arith_norm;
pub mod cluster;
pub mod cluster_finder;
pub mod config;
pub mod convex_closure;
pub mod error;
pub mod generalizers;
pub mod lemma;
pub mod matcher;
pub mod matrix;
pub mod node;
pub mod normalize;
pub mod oracle;
pub mod stats;
pub mod subsume;
