//! An in-memory [`RecordStore`] test double, the Rust analogue of the
//! original test suite's `VCFData`/`SimFailBCFData` fixtures (spec.md §8).
//!
//! Kept as part of the library (not `#[cfg(test)]`-gated) so the
//! integration tests under `tests/` and any downstream user exercising
//! this crate without a real gVCF reader can build one directly.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::header::Header;
use crate::range::{Contig, Range};
use crate::record::Record;
use crate::store::{RecordPredicate, RecordStore};

/// Where, if anywhere, [`FakeRecordStore`] should fail a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// `range()` returns `IOError` for the given sample, as though its
    /// backing file had gone missing mid-read.
    OnRangeOf(usize),
}

/// A cohort of in-memory records, addressable by sample name.
pub struct FakeRecordStore {
    samples: Vec<String>,
    contigs: Vec<Contig>,
    records: HashMap<String, Vec<Record>>,
    /// Counts every `range()` call across all samples, in call order, so
    /// tests can inject an `IOError` on the k-th store call
    /// (spec.md §8 "fault propagation").
    call_count: Mutex<usize>,
    fault_at_call: Option<usize>,
}

impl FakeRecordStore {
    pub fn new() -> Self {
        Self {
            samples: Vec::new(),
            contigs: vec![Contig {
                name: "chr1".to_string(),
                length: 250_000_000,
            }],
            records: HashMap::new(),
            call_count: Mutex::new(0),
            fault_at_call: None,
        }
    }

    pub fn with_contigs(mut self, contigs: Vec<Contig>) -> Self {
        self.contigs = contigs;
        self
    }

    /// Register a sample with its header sample-column names (almost
    /// always a single-element list; see [`crate::record::Record`]'s
    /// doc comment on the one-key-one-column convention this crate uses).
    pub fn add_sample(&mut self, name: &str, columns: Vec<String>) {
        self.samples.push(name.to_string());
        self.records.entry(name.to_string()).or_default();
        let _ = columns; // header always reuses `name` as the sole column; kept for call-site clarity
    }

    pub fn push_record(&mut self, sample: &str, record: Record) {
        self.records.entry(sample.to_string()).or_default().push(record);
    }

    /// Fail the `n`-th `range()` call (1-indexed across the whole store's
    /// lifetime) with `IOError`, to exercise spec.md §8's fault-propagation
    /// property: the request must abort immediately, verbatim, with no
    /// partial output.
    pub fn fail_on_call(mut self, n: usize) -> Self {
        self.fault_at_call = Some(n);
        self
    }
}

impl Default for FakeRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for FakeRecordStore {
    fn header(&self, sample: &str) -> Result<Header> {
        if !self.records.contains_key(sample) {
            return Err(Error::NotFound(format!("sample '{sample}' not known to store")));
        }
        Ok(Header::new(vec![sample.to_string()], self.contigs.clone()))
    }

    fn range(
        &self,
        sample: &str,
        _header: &Header,
        range: Range,
        predicate: Option<RecordPredicate<'_>>,
    ) -> Result<Vec<Record>> {
        {
            let mut count = self.call_count.lock().unwrap();
            *count += 1;
            if self.fault_at_call == Some(*count) {
                return Err(Error::IOError(format!("simulated read failure on call {count} (sample {sample})")));
            }
        }

        let records = self
            .records
            .get(sample)
            .ok_or_else(|| Error::NotFound(format!("sample '{sample}' not known to store")))?;

        let mut out: Vec<Record> = records
            .iter()
            .filter(|r| r.range.overlaps(&range))
            .filter(|r| predicate.map(|p| p(r)).unwrap_or(true))
            .cloned()
            .collect();
        out.sort_by_key(|r| (r.range.beg, r.range.end));
        Ok(out)
    }

    fn sample_names(&self) -> Vec<String> {
        self.samples.clone()
    }
}
