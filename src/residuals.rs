//! The residual log: structured record of input alleles the joint
//! genotyper could not place cleanly into a unified site (spec.md §6
//! "Residuals", §4.5 step 7).

use std::io::Write;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::range::Range;

/// One dropped-evidence event for one sample at one site.
#[derive(Debug, Clone, Serialize)]
pub struct ResidualEntry {
    pub range: Range,
    pub sample: String,
    /// The ALT sequences that could not be assigned to the site.
    pub alleles: Vec<String>,
    pub reason: String,
}

/// Write `entries` as a multi-document YAML stream, one document per
/// entry, matching the original format described in spec.md §6 and
/// verified against `original_source/test/service.cc`'s
/// `"genotype residuals"` test — the whole stream also parses as a
/// sequence if read back in one pass, since each document is itself one
/// map.
pub fn write_residuals<W: Write>(writer: &mut W, entries: &[ResidualEntry]) -> Result<()> {
    for entry in entries {
        writer
            .write_all(b"---\n")
            .map_err(|e| Error::IOError(format!("writing residual document: {e}")))?;
        let doc = serde_yaml::to_string(entry)
            .map_err(|e| Error::Invalid(format!("serializing residual entry: {e}")))?;
        writer
            .write_all(doc.as_bytes())
            .map_err(|e| Error::IOError(format!("writing residual document: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_document_per_entry() {
        let entries = vec![
            ResidualEntry {
                range: Range::new(0, 1000, 1001),
                sample: "s1".into(),
                alleles: vec!["G".into()],
                reason: "site spans multiple ALT records".into(),
            },
            ResidualEntry {
                range: Range::new(0, 2000, 2001),
                sample: "s2".into(),
                alleles: vec!["T".into()],
                reason: "site spans multiple ALT records".into(),
            },
        ];

        let mut buf = Vec::new();
        write_residuals(&mut buf, &entries).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.matches("---\n").count(), 2);
        assert!(text.contains("sample: s1"));
        assert!(text.contains("sample: s2"));
    }

    #[test]
    fn empty_entries_writes_nothing() {
        let mut buf = Vec::new();
        write_residuals(&mut buf, &[]).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn writes_to_a_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("residuals.yaml");
        let mut file = std::fs::File::create(&path).unwrap();

        write_residuals(
            &mut file,
            &[ResidualEntry {
                range: Range::new(0, 1000, 1001),
                sample: "s1".into(),
                alleles: vec!["G".into()],
                reason: "site spans multiple ALT records".into(),
            }],
        )
        .unwrap();
        drop(file);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("---\n"));
        assert!(text.contains("sample: s1"));
    }
}
