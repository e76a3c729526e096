//! In-process configuration surface for the unifier and genotyper.
//!
//! spec.md §6 lists these as "recognized options" a future, out-of-scope
//! CLI/config-file layer would populate. This crate only consumes the
//! already-parsed struct, so both are plain `serde`-deserializable data
//! (the teacher's `karyotype.rs` plays the analogous role for a JSON-backed
//! config object; here the shape is small enough to derive directly).

use serde::Deserialize;

/// Configuration for [`crate::unify::unify`] (spec.md §6 `unifier_config`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UnifierConfig {
    /// Candidate ALT alleles with `copy_number` below this are dropped
    /// before clustering (spec.md §4.4 step 1).
    pub min_allele_copy_number: f32,
}

impl Default for UnifierConfig {
    fn default() -> Self {
        Self {
            min_allele_copy_number: 0.0,
        }
    }
}

/// Configuration for [`crate::genotype::JointGenotyper`] (spec.md §6
/// `genotyper_config`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenotyperConfig {
    /// Minimum per-sample total depth over a site; samples below this are
    /// called missing (spec.md §4.5 step 3).
    pub required_dp: u32,
    /// Whether to additionally emit a residual log of input alleles that
    /// did not map cleanly into any site (spec.md §4.5 step 7, §6).
    pub output_residuals: bool,
    /// Path for the residual log. `None` lets the caller derive one from
    /// the output path, per spec.md §6's documented default.
    pub residuals_path: Option<String>,
}

impl Default for GenotyperConfig {
    fn default() -> Self {
        Self {
            required_dp: 0,
            output_residuals: false,
            residuals_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unifier_config_defaults_match_spec() {
        let cfg: UnifierConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg.min_allele_copy_number, 0.0);
    }

    #[test]
    fn genotyper_config_defaults_match_spec() {
        let cfg: GenotyperConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg.required_dp, 0);
        assert!(!cfg.output_residuals);
        assert_eq!(cfg.residuals_path, None);
    }

    #[test]
    fn genotyper_config_parses_overrides() {
        let cfg: GenotyperConfig = serde_yaml::from_str(
            "required_dp: 10\noutput_residuals: true\nresiduals_path: out.residuals.yaml\n",
        )
        .unwrap();
        assert_eq!(cfg.required_dp, 10);
        assert!(cfg.output_residuals);
        assert_eq!(cfg.residuals_path.as_deref(), Some("out.residuals.yaml"));
    }
}
