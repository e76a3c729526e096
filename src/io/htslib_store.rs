//! A [`RecordStore`] backed by per-sample gVCF/BCF files read through
//! `rust_htslib`'s indexed reader.

use std::collections::HashMap;
use std::path::PathBuf;

use rust_htslib::bcf::{self, Read as BcfRead};

use crate::error::{Error, Result};
use crate::header::Header;
use crate::range::{Contig, Range};
use crate::record::{Genotype, GenotypeAllele, Record};
use crate::store::{RecordPredicate, RecordStore};

/// Maps sample names to the gVCF/BCF file that holds that sample's
/// records. Each call re-opens and re-indexes its file, the same tradeoff
/// the teacher's alignment-file code makes (see [`crate::header`]'s doc
/// comment): every thread gets its own handle, at the cost of repeating
/// the index load on every call.
pub struct HtslibRecordStore {
    samples: Vec<String>,
    paths: HashMap<String, PathBuf>,
}

impl HtslibRecordStore {
    pub fn new() -> Self {
        Self {
            samples: Vec::new(),
            paths: HashMap::new(),
        }
    }

    pub fn add_sample(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> &mut Self {
        let name = name.into();
        self.samples.push(name.clone());
        self.paths.insert(name, path.into());
        self
    }

    fn path_for(&self, sample: &str) -> Result<&PathBuf> {
        self.paths
            .get(sample)
            .ok_or_else(|| Error::NotFound(format!("sample '{sample}' not known to store")))
    }

    fn open(&self, sample: &str) -> Result<bcf::IndexedReader> {
        let path = self.path_for(sample)?;
        bcf::IndexedReader::from_path(path)
            .map_err(|e| Error::IOError(format!("opening {} for sample {sample}: {e}", path.display())))
    }
}

impl Default for HtslibRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for HtslibRecordStore {
    fn header(&self, sample: &str) -> Result<Header> {
        let reader = self.open(sample)?;
        let hv = reader.header();

        let samples = hv.samples().iter().map(|s| String::from_utf8_lossy(s).into_owned()).collect();
        let contigs = hv
            .target_names()
            .iter()
            .map(|name| {
                let name = String::from_utf8_lossy(name).into_owned();
                let rid = hv.name2rid(name.as_bytes()).ok();
                let length = rid.and_then(|r| hv.target_len(r)).unwrap_or(0);
                Contig { name, length }
            })
            .collect();

        Ok(Header::new(samples, contigs))
    }

    fn range(
        &self,
        sample: &str,
        header: &Header,
        range: Range,
        predicate: Option<RecordPredicate<'_>>,
    ) -> Result<Vec<Record>> {
        let mut reader = self.open(sample)?;

        let contig = header
            .contigs()
            .get(range.rid as usize)
            .ok_or_else(|| Error::Invalid(format!("rid {} out of range for sample {sample}'s header", range.rid)))?;
        let rid = reader
            .header()
            .name2rid(contig.name.as_bytes())
            .map_err(|e| Error::Invalid(format!("contig {} not found for sample {sample}: {e}", contig.name)))?;
        reader
            .fetch(rid, range.beg, Some(range.end))
            .map_err(|e| Error::IOError(format!("fetching {:?} for sample {sample}: {e}", range)))?;

        let n_samples = header.n_samples();
        let mut out = Vec::new();
        for rec in reader.records() {
            let rec = rec.map_err(|e| Error::IOError(format!("reading record for sample {sample}: {e}")))?;
            let decoded = decode_record(&rec, n_samples)?;
            if predicate.map(|p| p(&decoded)).unwrap_or(true) {
                out.push(decoded);
            }
        }
        out.sort_by_key(|r| (r.range.beg, r.range.end));
        Ok(out)
    }

    fn sample_names(&self) -> Vec<String> {
        self.samples.clone()
    }
}

fn decode_record(rec: &bcf::Record, n_samples: usize) -> Result<Record> {
    let rid = rec.rid().ok_or_else(|| Error::Invalid("record has no rid".to_string()))?;
    let beg = rec.pos() as u64;
    let alleles: Vec<String> = rec.alleles().iter().map(|a| String::from_utf8_lossy(a).into_owned()).collect();
    if alleles.is_empty() {
        return Err(Error::Invalid(format!("record at rid {rid} pos {beg} has no alleles")));
    }
    let end = beg + alleles[0].len() as u64;
    let range = Range::new(rid, beg, end);

    let genotypes = decode_genotypes(rec, n_samples)?;

    let ad = rec
        .format(b"AD")
        .integer()
        .ok()
        .map(|buf| buf.iter().flat_map(|row| row.iter().map(|&v| v.max(0) as u32)).collect());

    let min_dp = rec
        .format(b"MIN_DP")
        .integer()
        .ok()
        .map(|buf| buf.iter().map(|row| row.first().copied().unwrap_or(0).max(0) as u32).collect());

    let qual = rec.qual();
    let info_dp = rec
        .info(b"DP".as_ref())
        .integer()
        .ok()
        .flatten()
        .and_then(|v| v.first().copied())
        .map(|v| v.max(0) as u32)
        .unwrap_or(0);

    Ok(Record {
        range,
        alleles,
        genotypes,
        ad,
        min_dp,
        qual,
        info_dp,
    })
}

fn decode_genotypes(rec: &bcf::Record, n_samples: usize) -> Result<Vec<Genotype>> {
    let gts = rec
        .genotypes()
        .map_err(|e| Error::Invalid(format!("reading genotypes: {e}")))?;

    let mut out = Vec::with_capacity(n_samples);
    for i in 0..n_samples {
        let gt = gts.get(i);
        let a0 = translate_allele(gt.get(0).copied());
        let a1 = translate_allele(gt.get(1).copied());
        out.push(Genotype(a0, a1));
    }
    Ok(out)
}

fn translate_allele(a: Option<rust_htslib::bcf::record::GenotypeAllele>) -> GenotypeAllele {
    use rust_htslib::bcf::record::GenotypeAllele as H;
    match a {
        Some(H::Unphased(i)) | Some(H::Phased(i)) => GenotypeAllele::Call(i as u32),
        Some(H::UnphasedMissing) | Some(H::PhasedMissing) | None => GenotypeAllele::Missing,
    }
}
