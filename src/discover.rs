//! Candidate ALT allele discovery across a cohort (component C).

use std::collections::BTreeMap;

use log::{debug, trace};
use rayon::prelude::*;

use crate::allele::{is_non_ref_sentinel, Allele};
use crate::error::Result;
use crate::range::Range;
use crate::record::Record;
use crate::store::RecordStore;

/// Which samples a discovery or genotyping request should consider.
#[derive(Debug, Clone)]
pub enum SampleSelection {
    All,
    Explicit(Vec<String>),
}

impl SampleSelection {
    pub(crate) fn resolve(&self, store: &dyn RecordStore) -> Vec<String> {
        match self {
            SampleSelection::All => store.sample_names(),
            SampleSelection::Explicit(names) => names.clone(),
        }
    }
}

/// Observed support for one ALT allele, matching spec.md §3's
/// `{ copy_number, is_ref }` record shape. `is_ref` is always `false` here:
/// the discovered allele map excludes the reference allele by definition,
/// the field is kept only for fidelity with the documented shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlleleObservation {
    pub copy_number: f32,
    pub is_ref: bool,
}

/// Candidate ALT alleles discovered over one or more ranges, plus the
/// bookkeeping the unifier needs to compute reference copy number and to
/// pad candidates out to a site's full range.
///
/// `evidence` tracks, per distinct record range seen, twice the number of
/// samples with a determinable (non-missing) genotype call there — the
/// diploid haplotype count behind spec.md §4.4's `2 * n_samples_with_evidence`.
/// `ref_seqs` remembers each regular record's own reference allele,
/// keyed by the record's range, so the unifier can reconstruct a site's
/// full reference sequence without a separate reference-genome lookup
/// (spec.md's abstract store interface has no such operation — the
/// reference bases for any site are always recoverable from whichever
/// candidate's own record spans the full site, which in practice is the
/// longest record in the cluster).
#[derive(Debug, Clone, Default)]
pub struct DiscoveredAlleles {
    alleles: BTreeMap<Allele, AlleleObservation>,
    evidence: BTreeMap<Range, f32>,
    ref_seqs: BTreeMap<Range, String>,
}

impl DiscoveredAlleles {
    pub fn is_empty(&self) -> bool {
        self.alleles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.alleles.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Allele, &AlleleObservation)> {
        self.alleles.iter()
    }

    pub fn get(&self, allele: &Allele) -> Option<&AlleleObservation> {
        self.alleles.get(allele)
    }

    /// Evidence (diploid units) observed at ranges overlapping `range`.
    pub(crate) fn evidence_over(&self, range: &Range) -> f32 {
        self.evidence
            .iter()
            .filter(|(r, _)| r.overlaps(range))
            .map(|(_, n)| *n)
            .sum()
    }

    /// The widest reference sequence recorded for a range matching
    /// `site_range` exactly, if any. Falls back to the widest overlapping
    /// reference sequence otherwise.
    pub(crate) fn reference_over(&self, site_range: &Range) -> Option<&str> {
        if let Some(seq) = self.ref_seqs.get(site_range) {
            return Some(seq.as_str());
        }
        self.ref_seqs
            .iter()
            .filter(|(r, _)| r.overlaps(site_range))
            .max_by_key(|(r, _)| r.len())
            .map(|(_, seq)| seq.as_str())
    }

    pub(crate) fn add_allele(&mut self, allele: Allele, contribution: f32) {
        let entry = self.alleles.entry(allele).or_insert(AlleleObservation {
            copy_number: 0.0,
            is_ref: false,
        });
        entry.copy_number += contribution;
    }

    pub(crate) fn add_evidence(&mut self, range: Range, contribution: f32) {
        *self.evidence.entry(range).or_insert(0.0) += contribution;
    }

    pub(crate) fn add_ref_seq(&mut self, range: Range, seq: String) {
        self.ref_seqs
            .entry(range)
            .and_modify(|existing| {
                if seq.len() > existing.len() {
                    *existing = seq.clone();
                }
            })
            .or_insert(seq);
    }

    /// Merge `other` into `self`. Commutative and associative: discovery
    /// over disjoint ranges can run independently (in parallel, or in any
    /// order) and be combined afterwards (spec.md §8 invariant 4).
    pub fn merge(mut self, other: DiscoveredAlleles) -> Self {
        for (allele, obs) in other.alleles {
            let entry = self.alleles.entry(allele).or_insert(AlleleObservation {
                copy_number: 0.0,
                is_ref: obs.is_ref,
            });
            entry.copy_number += obs.copy_number;
        }
        for (range, n) in other.evidence {
            *self.evidence.entry(range).or_insert(0.0) += n;
        }
        for (range, seq) in other.ref_seqs {
            self.add_ref_seq(range, seq);
        }
        self
    }
}

/// The genomic footprint of an allele: its record's own range, shared by
/// every allele the record carries. Per spec.md §3, an allele's sequence
/// length may differ from `end-beg` (insertions/deletions against the
/// reference span); the footprint is the record's reference span, not
/// something sized off the ALT sequence's own length.
pub(crate) fn allele_footprint(record_range: Range, _seq: &str) -> Range {
    record_range
}

/// Scans per-sample records across ranges for a cohort and enumerates
/// candidate ALT alleles with their summed observed copy number.
pub struct AlleleDiscoverer<'s> {
    store: &'s dyn RecordStore,
}

impl<'s> AlleleDiscoverer<'s> {
    pub fn new(store: &'s dyn RecordStore) -> Self {
        Self { store }
    }

    /// Discover candidates for each range in `ranges` independently,
    /// returning one map per input range, in input order.
    pub fn discover(&self, selection: &SampleSelection, ranges: &[Range]) -> Result<Vec<DiscoveredAlleles>> {
        let samples = selection.resolve(self.store);
        ranges.iter().map(|range| self.discover_one(&samples, *range)).collect()
    }

    /// Discover over `ranges`, merging every range's result into one map.
    /// Useful when the unifier should see candidates across the whole
    /// request at once (spec.md §4.4's "merged discovered allele map").
    pub fn discover_merged(&self, selection: &SampleSelection, ranges: &[Range]) -> Result<DiscoveredAlleles> {
        Ok(self
            .discover(selection, ranges)?
            .into_iter()
            .fold(DiscoveredAlleles::default(), DiscoveredAlleles::merge))
    }

    fn discover_one(&self, samples: &[String], range: Range) -> Result<DiscoveredAlleles> {
        // Per-sample reads are independent and the result is an associative
        // merge, so they fan out with rayon (spec.md §5) and reduce here;
        // any IOError/Invalid from a leaf read short-circuits the whole
        // request via `?` inside the parallel closure below.
        let per_sample: Result<Vec<DiscoveredAlleles>> = samples
            .par_iter()
            .map(|sample| self.discover_sample(sample, range))
            .collect();

        Ok(per_sample?.into_iter().fold(DiscoveredAlleles::default(), DiscoveredAlleles::merge))
    }

    fn discover_sample(&self, sample: &str, range: Range) -> Result<DiscoveredAlleles> {
        let mut found = DiscoveredAlleles::default();

        let header = self.store.header(sample)?;
        let records = self.store.range(sample, &header, range, None)?;
        trace!("discover: sample {sample} range {range:?}: {} records", records.len());

        for rec in &records {
            accumulate_record(sample, &range, rec, &mut found);
        }

        Ok(found)
    }
}

fn accumulate_record(sample: &str, range: &Range, rec: &Record, found: &mut DiscoveredAlleles) {
    let is_ref_conf = rec.is_reference_confidence();

    let haplotypes_with_call: f32 = rec
        .genotypes
        .iter()
        .flat_map(|gt| gt.calls())
        .filter(|call| call.index().is_some())
        .count() as f32;
    if haplotypes_with_call > 0.0 {
        // Contributes to reference-copy tracking regardless of whether the
        // record crosses R's boundary (spec.md §4.3 "Refinements").
        found.add_evidence(rec.range, haplotypes_with_call);
    }

    if !is_ref_conf {
        found.add_ref_seq(rec.range, rec.alleles[0].clone());
    }

    if is_ref_conf {
        debug!("discover: sample {sample} skips ALT enumeration on reference block {:?}", rec.range);
        return;
    }

    for (j, seq) in rec.alleles.iter().enumerate().skip(1) {
        if is_non_ref_sentinel(seq) {
            continue;
        }
        let allele_range = allele_footprint(rec.range, seq);
        if !range.contains_range(&allele_range) {
            // Either strictly outside R, or a partial overlap at R's
            // boundary: only reference-copy tracking (above) applies.
            continue;
        }

        let contribution: f32 = rec
            .genotypes
            .iter()
            .flat_map(|gt| gt.calls())
            .filter(|call| call.index() == Some(j as u32))
            .count() as f32;
        if contribution > 0.0 {
            found.add_allele(Allele::new(allele_range, seq.clone()), contribution);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeRecordStore;
    use crate::record::{Genotype, GenotypeAllele};

    fn het(j: u32) -> Genotype {
        Genotype(GenotypeAllele::Call(0), GenotypeAllele::Call(j))
    }

    #[test]
    fn biallelic_snp_discovery() {
        let mut store = FakeRecordStore::new();
        for s in ["s1", "s2"] {
            store.add_sample(s, vec!["0".into()]);
            for _ in 0..3 {
                store.push_record(
                    s,
                    Record {
                        range: Range::new(0, 1000, 1001),
                        alleles: vec!["A".into(), "G".into()],
                        genotypes: vec![het(1)],
                        ad: Some(vec![0, 2]),
                        min_dp: None,
                        qual: 50.0,
                        info_dp: 2,
                    },
                );
            }
        }

        let discoverer = AlleleDiscoverer::new(&store);
        let selection = SampleSelection::Explicit(vec!["s1".into(), "s2".into()]);
        let maps = discoverer
            .discover(&selection, &[Range::new(0, 1000, 1001)])
            .unwrap();

        let found = &maps[0];
        let alt = Allele::new(Range::new(0, 1000, 1001), "G");
        assert_eq!(found.get(&alt).unwrap().copy_number, 6.0);
        assert_eq!(found.evidence_over(&Range::new(0, 1000, 1001)), 12.0);
    }

    #[test]
    fn discovery_is_commutative_over_split_ranges() {
        let mut store = FakeRecordStore::new();
        store.add_sample("s1", vec!["0".into()]);
        store.push_record(
            "s1",
            Record {
                range: Range::new(0, 1000, 1001),
                alleles: vec!["A".into(), "G".into()],
                genotypes: vec![het(1)],
                ad: Some(vec![0, 2]),
                min_dp: None,
                qual: 50.0,
                info_dp: 2,
            },
        );
        store.push_record(
            "s1",
            Record {
                range: Range::new(0, 2000, 2001),
                alleles: vec!["C".into(), "T".into()],
                genotypes: vec![het(1)],
                ad: Some(vec![0, 2]),
                min_dp: None,
                qual: 50.0,
                info_dp: 2,
            },
        );

        let discoverer = AlleleDiscoverer::new(&store);
        let selection = SampleSelection::Explicit(vec!["s1".into()]);

        let whole = discoverer
            .discover_merged(&selection, &[Range::new(0, 0, 5000)])
            .unwrap();
        let split = discoverer
            .discover(&selection, &[Range::new(0, 0, 1500), Range::new(0, 1500, 5000)])
            .unwrap();
        let merged_split = split.into_iter().fold(DiscoveredAlleles::default(), DiscoveredAlleles::merge);

        assert_eq!(whole.len(), merged_split.len());
        for (allele, obs) in whole.iter() {
            assert_eq!(merged_split.get(allele).unwrap().copy_number, obs.copy_number);
        }
    }
}
