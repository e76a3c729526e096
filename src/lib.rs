//! # nexus-joint-core
//!
//! Joint variant calling over a cohort of per-sample gVCF records: allele
//! discovery, multi-allelic site unification, and joint genotyping.
//!
//! The pipeline is three independent stages (see [`service::Service`] for
//! the one that drives all three):
//!
//! 1. [`discover::AlleleDiscoverer`] scans each sample's records over a set
//!    of ranges and accumulates candidate ALT alleles with their observed
//!    copy number.
//! 2. [`unify::unify`] collapses overlapping candidates into ordered,
//!    pairwise non-overlapping multi-allelic sites.
//! 3. [`genotype::JointGenotyper`] re-scans every sample against each site
//!    and emits one joint output record per site.
//!
//! [`store::RecordStore`] is the abstract source of per-sample records;
//! [`io::HtslibRecordStore`] and [`fake::FakeRecordStore`] are its two
//! concrete implementations.

pub mod allele;
pub mod config;
pub mod depth;
pub mod discover;
pub mod error;
pub mod fake;
pub mod genotype;
pub mod header;
pub mod io;
pub mod range;
pub mod record;
pub mod residuals;
pub mod service;
pub mod store;
pub mod unify;

pub use error::{Error, Result};
