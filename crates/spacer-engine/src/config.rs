//! Generalizer configuration.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// One pass of the generalizer pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneralizerKind {
    BoolInductive,
    UnsatCore,
    ArrayEq,
    EqClass,
    Cluster,
    Merge,
    ClusterMerge,
    SanityCheck,
}

/// Tunables for the lemma generalizers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralizerConfig {
    /// Passes applied to every new lemma, in order.
    pub pipeline: Vec<GeneralizerKind>,
    /// Consecutive failures after which the Boolean generalizer gives up.
    /// Zero means no limit.
    pub bool_failure_limit: u32,
    /// Smallest number of array constants the array-equality pass handles.
    pub array_eq_min_consts: usize,
    /// Largest number of array constants the array-equality pass handles.
    pub array_eq_max_consts: usize,
    /// Canonical constants tried when widening a bound, in order.
    pub widen_constants: Vec<i64>,
    /// Add `(x - min) mod s = 0` to one-dimensional integral closures.
    pub lattice_stride: bool,
    /// Failed merge attempts on an obligation before a merge conjecture is
    /// recorded on it.
    pub merge_conjecture_threshold: u32,
    /// Bound-pair budget before projection switches to model-guided
    /// elimination.
    pub fm_pair_limit: usize,
}

impl Default for GeneralizerConfig {
    fn default() -> Self {
        Self {
            pipeline: vec![
                GeneralizerKind::BoolInductive,
                GeneralizerKind::Cluster,
                GeneralizerKind::ClusterMerge,
            ],
            bool_failure_limit: 0,
            array_eq_min_consts: 2,
            array_eq_max_consts: 7,
            widen_constants: vec![1, 0, -1, 100, 49, 102, 103, 104, 51, 52, 53],
            lattice_stride: false,
            merge_conjecture_threshold: 1,
            fm_pair_limit: 16,
        }
    }
}

impl GeneralizerConfig {
    pub fn from_json(src: &str) -> Result<Self> {
        let cfg: Self =
            serde_json::from_str(src).map_err(|e| EngineError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.array_eq_min_consts < 2 {
            return Err(EngineError::Config(
                "array_eq_min_consts must be at least 2".into(),
            ));
        }
        if self.array_eq_max_consts < self.array_eq_min_consts {
            return Err(EngineError::Config(format!(
                "array_eq_max_consts ({}) is below array_eq_min_consts ({})",
                self.array_eq_max_consts, self.array_eq_min_consts
            )));
        }
        if self.fm_pair_limit == 0 {
            return Err(EngineError::Config("fm_pair_limit must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_widening_constants() {
        let cfg = GeneralizerConfig::default();
        assert_eq!(cfg.widen_constants.len(), 11);
        assert_eq!(cfg.merge_conjecture_threshold, 1);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg = GeneralizerConfig::from_json(
            r#"{ "pipeline": ["cluster", "cluster_merge"], "lattice_stride": true }"#,
        )
        .expect("valid config");
        assert_eq!(
            cfg.pipeline,
            vec![GeneralizerKind::Cluster, GeneralizerKind::ClusterMerge]
        );
        assert!(cfg.lattice_stride);
        assert_eq!(cfg.array_eq_max_consts, 7);
    }

    #[test]
    fn rejects_bad_array_window() {
        let err = GeneralizerConfig::from_json(r#"{ "array_eq_min_consts": 5, "array_eq_max_consts": 3 }"#)
            .expect_err("window is inverted");
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn json_round_trip_preserves_pipeline() {
        let cfg = GeneralizerConfig::default();
        let back = GeneralizerConfig::from_json(&cfg.to_json().expect("serializes")).expect("parses");
        assert_eq!(back, cfg);
    }
}
