//! Owned, cheaply-cloneable header shared across a request.
//!
//! The teacher's BAM code threads a borrowed `HeaderView` through each
//! worker thread's own re-opened file handle. We can't borrow a header
//! across the samples a [`crate::store::RecordStore`] may serve
//! concurrently from independent connections, so `Header` is owned and
//! `Arc`-shared instead of borrowed, per spec's "implicit global, threaded
//! explicitly" design note.

use std::sync::Arc;

use crate::range::Contig;

/// The sample names and contig list for one dataset (one input file, which
/// may itself hold more than one genotyped sample column, as is common for
/// trio gVCFs).
#[derive(Debug, Clone)]
pub struct Header {
    samples: Arc<Vec<String>>,
    contigs: Arc<Vec<Contig>>,
}

impl Header {
    pub fn new(samples: Vec<String>, contigs: Vec<Contig>) -> Self {
        Self {
            samples: Arc::new(samples),
            contigs: Arc::new(contigs),
        }
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn contigs(&self) -> &[Contig] {
        &self.contigs
    }

    pub fn sample_index(&self, name: &str) -> Option<usize> {
        self.samples.iter().position(|s| s == name)
    }

    pub fn contig_index(&self, name: &str) -> Option<u32> {
        self.contigs.iter().position(|c| c.name == name).map(|i| i as u32)
    }

    pub fn contig_length(&self, rid: u32) -> Option<u64> {
        self.contigs.get(rid as usize).map(|c| c.length)
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }
}
