//! Per-(sample, allele) depth extraction (component B).

use crate::error::{Error, Result};
use crate::record::Record;

/// Reusable accessor for per-(sample, allele) supporting depth.
///
/// One instance is meant to live for the duration of a whole scan and be
/// re-[`fill`](Self::fill)ed once per record, amortizing the backing
/// buffer's allocation across millions of records (spec.md §9's "raw
/// buffer reuse" note).
#[derive(Debug, Default)]
pub struct AlleleDepthExtractor {
    buf: Vec<u32>,
    is_ref_block: bool,
    n_alleles: usize,
}

impl AlleleDepthExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate the extractor from `record`, which came from a sample
    /// whose header declares `n_samples` genotype columns.
    pub fn fill(&mut self, sample: &str, record: &Record, n_samples: usize) -> Result<()> {
        self.buf.clear();
        self.n_alleles = record.n_alleles();

        if record.is_reference_confidence() {
            self.is_ref_block = true;
            let min_dp = record.min_dp.as_ref().ok_or_else(|| {
                Error::Invalid(format!(
                    "sample {sample} record {:?}: reference block missing MIN_DP",
                    record.range
                ))
            })?;
            if min_dp.len() != n_samples {
                return Err(Error::Invalid(format!(
                    "sample {sample} record {:?}: MIN_DP has {} values, expected {n_samples}",
                    record.range,
                    min_dp.len()
                )));
            }
            self.buf.extend_from_slice(min_dp);
            return Ok(());
        }

        self.is_ref_block = false;
        match &record.ad {
            Some(ad) => {
                let expected = n_samples * self.n_alleles;
                if ad.len() != expected {
                    return Err(Error::Invalid(format!(
                        "sample {sample} record {:?}: AD has {} values, expected {expected}",
                        record.range,
                        ad.len()
                    )));
                }
                self.buf.extend_from_slice(ad);
            }
            None => {
                // Legacy tolerance (spec.md §4.2, §9): a missing AD is only
                // acceptable when INFO/DP says there was no coverage at all.
                if record.info_dp != 0 {
                    return Err(Error::Invalid(format!(
                        "sample {sample} record {:?}: AD absent but INFO/DP={} (only tolerated at DP=0)",
                        record.range, record.info_dp
                    )));
                }
                self.buf.resize(n_samples * self.n_alleles, 0);
            }
        }
        Ok(())
    }

    /// Supporting depth for `(sample_idx, allele_idx)` in the record last
    /// passed to [`Self::fill`].
    pub fn depth(&self, sample_idx: usize, allele_idx: usize) -> u32 {
        if self.is_ref_block {
            if allele_idx == 0 {
                self.buf[sample_idx]
            } else {
                0
            }
        } else {
            self.buf[sample_idx * self.n_alleles + allele_idx]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::Range;
    use crate::record::{Genotype, GenotypeAllele};

    fn ref_block(min_dp: Vec<u32>) -> Record {
        Record {
            range: Range::new(0, 10009462, 10009469),
            alleles: vec!["A".into(), "<NON_REF>".into()],
            genotypes: vec![Genotype::hom_ref()],
            ad: None,
            min_dp: Some(min_dp),
            qual: 0.0,
            info_dp: 0,
        }
    }

    fn regular(ad: Option<Vec<u32>>, info_dp: u32) -> Record {
        Record {
            range: Range::new(0, 1000, 1001),
            alleles: vec!["A".into(), "G".into()],
            genotypes: vec![Genotype(GenotypeAllele::Call(0), GenotypeAllele::Call(1))],
            ad,
            min_dp: None,
            qual: 50.0,
            info_dp,
        }
    }

    #[test]
    fn reference_block_depth_goes_to_allele_zero() {
        let rec = ref_block(vec![20]);
        let mut ex = AlleleDepthExtractor::new();
        ex.fill("s1", &rec, 1).unwrap();
        assert_eq!(ex.depth(0, 0), 20);
    }

    #[test]
    fn reference_block_wrong_length_min_dp_is_invalid() {
        let rec = ref_block(vec![20, 5]);
        let mut ex = AlleleDepthExtractor::new();
        assert!(matches!(ex.fill("s1", &rec, 1), Err(Error::Invalid(_))));
    }

    #[test]
    fn regular_record_reads_ad() {
        let rec = regular(Some(vec![4, 6]), 10);
        let mut ex = AlleleDepthExtractor::new();
        ex.fill("s1", &rec, 1).unwrap();
        assert_eq!(ex.depth(0, 0), 4);
        assert_eq!(ex.depth(0, 1), 6);
    }

    #[test]
    fn missing_ad_tolerated_only_at_dp_zero() {
        let rec = regular(None, 0);
        let mut ex = AlleleDepthExtractor::new();
        ex.fill("s1", &rec, 1).unwrap();
        assert_eq!(ex.depth(0, 0), 0);
        assert_eq!(ex.depth(0, 1), 0);

        let rec_nonzero = regular(None, 3);
        let mut ex2 = AlleleDepthExtractor::new();
        assert!(matches!(ex2.fill("s1", &rec_nonzero, 1), Err(Error::Invalid(_))));
    }

    #[test]
    fn wrong_length_ad_is_invalid() {
        let rec = regular(Some(vec![4]), 4);
        let mut ex = AlleleDepthExtractor::new();
        assert!(matches!(ex.fill("s1", &rec, 1), Err(Error::Invalid(_))));
    }
}
