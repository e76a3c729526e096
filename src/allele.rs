//! Alleles: the atomic unit discovery and unification operate over.

use crate::range::Range;

/// Sentinel ALT sequences that mark a reference-confidence ("gVCF block")
/// record rather than a real variant call. Both spellings show up in the
/// wild depending on which caller produced the file.
pub const NON_REF_SENTINELS: [&str; 2] = ["<NON_REF>", "<*>"];

pub fn is_non_ref_sentinel(seq: &str) -> bool {
    NON_REF_SENTINELS.contains(&seq)
}

/// A candidate or called allele: a genomic footprint plus the sequence
/// observed there.
///
/// The footprint's length need not equal `sequence.len()`: for an
/// insertion or deletion, `range` is the record's own reference span
/// (shared by every allele the record carries — see
/// [`crate::discover::allele_footprint`]) while `sequence` is the ALT
/// bases actually observed there, which may be shorter or longer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Allele {
    pub range: Range,
    pub sequence: String,
}

impl Allele {
    pub fn new(range: Range, sequence: impl Into<String>) -> Self {
        Self {
            range,
            sequence: sequence.into(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        is_non_ref_sentinel(&self.sequence)
    }
}
