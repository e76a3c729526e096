//! Abstract read-only access to per-sample records (component A).

use crate::error::Result;
use crate::header::Header;
use crate::range::Range;
use crate::record::Record;

/// A predicate applied while filtering records for a `range` query, e.g.
/// to skip a band of low-quality records before they ever reach the core.
pub type RecordPredicate<'a> = &'a dyn Fn(&Record) -> bool;

/// Read-only access to per-sample records, keyed by sample name.
///
/// Implementations must be safe to call concurrently for distinct sample
/// names — spec.md §4.1's "thread-safe for concurrent reads across
/// distinct samples" — since [`crate::discover::AlleleDiscoverer`] and
/// [`crate::genotype::JointGenotyper`] both fan out per-sample reads with
/// `rayon` (see spec.md §5).
pub trait RecordStore: Send + Sync {
    /// Metadata (sample columns + contig list) declared for `sample`.
    ///
    /// Returns [`crate::error::Error::NotFound`] if `sample` is unknown to
    /// the store.
    fn header(&self, sample: &str) -> Result<Header>;

    /// All records for `sample` whose range overlaps `range`, sorted by
    /// `(beg, end)`, after applying `predicate` if one is given.
    fn range(
        &self,
        sample: &str,
        header: &Header,
        range: Range,
        predicate: Option<RecordPredicate<'_>>,
    ) -> Result<Vec<Record>>;

    /// The full set of sample names this store can serve, in a stable
    /// order. Resolves [`crate::discover::SampleSelection::All`] — spec.md
    /// §4.1 defines only `header`/`range`, but §4.3's "sample selection
    /// (explicit list or 'all')" input requires the store to be able to
    /// enumerate its own cohort, so this is the minimal necessary addition.
    fn sample_names(&self) -> Vec<String>;
}
