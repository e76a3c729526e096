//! The per-sample record: one gVCF line, already decoded into the shape
//! the discoverer, unifier and genotyper all share. §6 keeps the wire
//! format (binary BCF/VCF) out of this module; [`crate::io`] is where a
//! concrete [`crate::store::RecordStore`] translates into this shape.

use crate::allele::is_non_ref_sentinel;
use crate::range::Range;

/// One haplotype's call: either a concrete allele index or a missing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenotypeAllele {
    Call(u32),
    Missing,
}

impl GenotypeAllele {
    pub fn index(&self) -> Option<u32> {
        match self {
            GenotypeAllele::Call(i) => Some(*i),
            GenotypeAllele::Missing => None,
        }
    }
}

/// A diploid genotype call for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Genotype(pub GenotypeAllele, pub GenotypeAllele);

impl Genotype {
    pub fn missing() -> Self {
        Genotype(GenotypeAllele::Missing, GenotypeAllele::Missing)
    }

    pub fn hom_ref() -> Self {
        Genotype(GenotypeAllele::Call(0), GenotypeAllele::Call(0))
    }

    /// Homozygous reference with no missing haplotype — the condition a
    /// pseudo-reference record requires of *every* sample.
    pub fn is_hom_ref(&self) -> bool {
        matches!(
            (self.0, self.1),
            (GenotypeAllele::Call(0), GenotypeAllele::Call(0))
        )
    }

    pub fn calls(&self) -> [GenotypeAllele; 2] {
        [self.0, self.1]
    }
}

/// One per-sample record, decoded from whatever wire format a
/// [`crate::store::RecordStore`] speaks.
///
/// `genotypes`, and the per-sample slices of `ad`/`min_dp`, are indexed by
/// the sample columns declared in the [`crate::header::Header`] this
/// record was fetched with. The crate's own [`crate::io::HtslibRecordStore`]
/// and [`crate::fake::FakeRecordStore`] both key one `sample` name to
/// exactly one genotype column, so in practice `genotypes.len() == 1`.
#[derive(Debug, Clone)]
pub struct Record {
    pub range: Range,
    /// Allele sequences; index 0 is always the reference.
    pub alleles: Vec<String>,
    /// One genotype per header sample column.
    pub genotypes: Vec<Genotype>,
    /// `AD`, length `n_samples * n_alleles`, when present.
    pub ad: Option<Vec<u32>>,
    /// `MIN_DP`, length `n_samples`, present on reference blocks.
    pub min_dp: Option<Vec<u32>>,
    pub qual: f32,
    pub info_dp: u32,
}

impl Record {
    pub fn n_alleles(&self) -> usize {
        self.alleles.len()
    }

    /// A reference confidence record: exactly two alleles, the second a
    /// non-ref sentinel (spec.md §3).
    pub fn is_reference_block(&self) -> bool {
        self.alleles.len() == 2 && is_non_ref_sentinel(&self.alleles[1])
    }

    /// `QUAL == 0` and every sample called homozygous reference, no
    /// missing haplotypes — treated identically to a reference block.
    pub fn is_pseudo_reference(&self) -> bool {
        self.qual == 0.0 && !self.genotypes.is_empty() && self.genotypes.iter().all(Genotype::is_hom_ref)
    }

    pub fn is_reference_confidence(&self) -> bool {
        self.is_reference_block() || self.is_pseudo_reference()
    }
}
