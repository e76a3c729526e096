//! Ties the three stages together for one request: discover candidate
//! alleles, unify them into sites, then genotype every sample against
//! those sites (spec.md §2 "Pipeline").

use std::fs::File;

use log::info;

use crate::config::{GenotyperConfig, UnifierConfig};
use crate::discover::{AlleleDiscoverer, SampleSelection};
use crate::error::{Error, Result};
use crate::genotype::{JointGenotyper, JointRecordWriter};
use crate::range::Range;
use crate::residuals::{write_residuals, ResidualEntry};
use crate::store::RecordStore;
use crate::unify::{unify, UnifiedSite, UnifyReport};

/// One joint-calling request over a cohort: which samples, which ranges,
/// and how the unifier/genotyper should behave.
#[derive(Debug, Clone)]
pub struct Request {
    pub selection: SampleSelection,
    pub ranges: Vec<Range>,
    pub unifier_config: UnifierConfig,
    pub genotyper_config: GenotyperConfig,
}

/// Everything a request produced, beyond what was written to `writer`:
/// the unified sites themselves, the unifier's report on what it dropped,
/// and (if configured) the residual log from genotyping.
pub struct RequestOutcome {
    pub sites: Vec<UnifiedSite>,
    pub unify_report: UnifyReport,
    pub residuals: Vec<ResidualEntry>,
}

/// Orchestrates discovery, unification and joint genotyping over a single
/// [`RecordStore`], the way the teacher's top-level `run`/`run_vcf`
/// functions drive per-region work over a single alignment file.
pub struct Service<'s> {
    store: &'s dyn RecordStore,
}

impl<'s> Service<'s> {
    pub fn new(store: &'s dyn RecordStore) -> Self {
        Self { store }
    }

    /// Run discovery, unification and genotyping in sequence, writing one
    /// joint record per site to `writer`.
    pub fn run(&self, request: &Request, writer: &mut dyn JointRecordWriter) -> Result<RequestOutcome> {
        let sites = self.unify_sites(request)?;
        let mut residuals = Vec::new();

        let genotyper = JointGenotyper::new(self.store);
        genotyper.genotype(
            &request.selection,
            &sites.0,
            &request.genotyper_config,
            writer,
            request.genotyper_config.output_residuals.then_some(&mut residuals),
        )?;

        info!(
            "service: genotyped {} site(s) over {} range(s)",
            sites.0.len(),
            request.ranges.len()
        );

        // spec.md §6: `genotyper_config.residuals_path` names where the
        // residual log is persisted. A missing path (the "derive from
        // output path" default) can't be resolved here since `Service`
        // only knows an abstract `JointRecordWriter`, not an output file
        // path — such requests still get `residuals` back in
        // `RequestOutcome` for the caller to persist itself.
        if request.genotyper_config.output_residuals {
            if let Some(path) = &request.genotyper_config.residuals_path {
                let mut file = File::create(path)
                    .map_err(|e| Error::IOError(format!("creating residuals file {path}: {e}")))?;
                write_residuals(&mut file, &residuals)?;
                info!("service: wrote {} residual entr(ies) to {path}", residuals.len());
            }
        }

        Ok(RequestOutcome {
            sites: sites.0,
            unify_report: sites.1,
            residuals,
        })
    }

    /// Run discovery and unification alone, without genotyping — useful
    /// for callers that want to inspect or cache the unified site list
    /// before committing to a (potentially expensive) genotyping pass.
    pub fn unify_sites(&self, request: &Request) -> Result<(Vec<UnifiedSite>, UnifyReport)> {
        let discoverer = AlleleDiscoverer::new(self.store);
        let discovered = discoverer.discover_merged(&request.selection, &request.ranges)?;
        Ok(unify(&discovered, &request.unifier_config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeRecordStore;
    use crate::genotype::VecJointRecordWriter;
    use crate::record::{Genotype, GenotypeAllele, Record};

    #[test]
    fn end_to_end_biallelic_site() {
        let mut store = FakeRecordStore::new();
        for s in ["s1", "s2"] {
            store.add_sample(s, vec![s.to_string()]);
            store.push_record(
                s,
                Record {
                    range: Range::new(0, 1000, 1001),
                    alleles: vec!["A".into(), "G".into()],
                    genotypes: vec![Genotype(GenotypeAllele::Call(0), GenotypeAllele::Call(1))],
                    ad: Some(vec![2, 2]),
                    min_dp: None,
                    qual: 50.0,
                    info_dp: 4,
                },
            );
        }

        let request = Request {
            selection: SampleSelection::All,
            ranges: vec![Range::new(0, 0, 5000)],
            unifier_config: UnifierConfig::default(),
            genotyper_config: GenotyperConfig::default(),
        };

        let service = Service::new(&store);
        let mut writer = VecJointRecordWriter::default();
        let outcome = service.run(&request, &mut writer).unwrap();

        assert_eq!(outcome.sites.len(), 1);
        assert_eq!(writer.0.len(), 1);
        assert_eq!(writer.0[0].alleles, vec!["A".to_string(), "G".to_string()]);
        for call in &writer.0[0].calls {
            assert_eq!(call.genotype, crate::genotype::JointGenotype(Some(0), Some(1)));
        }
    }

    #[test]
    fn residuals_path_is_written_to_disk_when_configured() {
        let mut store = FakeRecordStore::new();
        store.add_sample("s1", vec!["s1".into()]);
        // Two ALT records at adjacent bases, same as the cross-record
        // refusal scenario (spec.md §8 scenario 6): genotyping refuses
        // and, with `output_residuals` set, records a dropped allele.
        store.push_record(
            "s1",
            Record {
                range: Range::new(0, 2000, 2002),
                alleles: vec!["AC".into(), "G".into()],
                genotypes: vec![Genotype(GenotypeAllele::Call(0), GenotypeAllele::Call(1))],
                ad: Some(vec![0, 4]),
                min_dp: None,
                qual: 60.0,
                info_dp: 4,
            },
        );
        store.push_record(
            "s1",
            Record {
                range: Range::new(0, 2000, 2001),
                alleles: vec!["A".into(), "T".into()],
                genotypes: vec![Genotype(GenotypeAllele::Call(0), GenotypeAllele::Call(1))],
                ad: Some(vec![0, 4]),
                min_dp: None,
                qual: 60.0,
                info_dp: 4,
            },
        );

        let dir = tempfile::tempdir().unwrap();
        let residuals_path = dir.path().join("residuals.yaml");

        let request = Request {
            selection: SampleSelection::All,
            ranges: vec![Range::new(0, 0, 5000)],
            unifier_config: UnifierConfig::default(),
            genotyper_config: GenotyperConfig {
                output_residuals: true,
                residuals_path: Some(residuals_path.to_str().unwrap().to_string()),
                ..GenotyperConfig::default()
            },
        };

        let service = Service::new(&store);
        let mut writer = VecJointRecordWriter::default();
        let outcome = service.run(&request, &mut writer).unwrap();

        assert!(!outcome.residuals.is_empty());
        let on_disk = std::fs::read_to_string(&residuals_path).unwrap();
        assert!(on_disk.starts_with("---\n"));
        assert!(on_disk.contains("sample: s1"));
    }

    #[test]
    fn fault_propagates_through_the_whole_request() {
        let mut store = FakeRecordStore::new().fail_on_call(1);
        store.add_sample("s1", vec!["s1".into()]);

        let request = Request {
            selection: SampleSelection::All,
            ranges: vec![Range::new(0, 0, 5000)],
            unifier_config: UnifierConfig::default(),
            genotyper_config: GenotyperConfig::default(),
        };

        let service = Service::new(&store);
        let mut writer = VecJointRecordWriter::default();
        assert!(service.run(&request, &mut writer).is_err());
        assert!(writer.0.is_empty());
    }
}
