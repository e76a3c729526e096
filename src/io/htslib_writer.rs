//! Writes joint output records back out as VCF, the way the teacher's
//! `io::vcf::write` builds a header once and streams one record per call
//! (spec.md §6).

use rust_htslib::bcf;

use crate::error::{Error, Result};
use crate::genotype::{JointRecord, JointRecordWriter};
use crate::range::Contig;

const JOINT_FORMAT_LINES: &[&[u8]] = &[
    br#"##FORMAT=<ID=GT,Number=1,Type=String,Description="Joint genotype">"#,
    br#"##FORMAT=<ID=DP,Number=1,Type=Integer,Description="Total depth used for the genotyping depth gate">"#,
    br#"##FORMAT=<ID=AD,Number=R,Type=Integer,Description="Per-allele supporting depth over the unified site">"#,
];

/// A [`JointRecordWriter`] that streams records into a VCF/BCF file via
/// `rust_htslib`, reusing one header built from the cohort's contigs and
/// sample names for the whole request.
pub struct HtslibJointWriter {
    writer: bcf::Writer,
    contigs: Vec<Contig>,
}

impl HtslibJointWriter {
    pub fn create(path: &str, contigs: Vec<Contig>, samples: &[String], uncompressed: bool) -> Result<Self> {
        let mut header = bcf::Header::new();
        for contig in &contigs {
            header.push_record(format!("##contig=<ID={},length={}>", contig.name, contig.length).as_bytes());
        }
        for line in JOINT_FORMAT_LINES {
            header.push_record(line);
        }
        for sample in samples {
            header.push_sample(sample.as_bytes());
        }

        let writer = bcf::Writer::from_path(path, &header, uncompressed, bcf::Format::Vcf)
            .map_err(|e| Error::IOError(format!("creating output VCF {path}: {e}")))?;

        Ok(Self { writer, contigs })
    }
}

impl JointRecordWriter for HtslibJointWriter {
    fn write(&mut self, record: &JointRecord) -> Result<()> {
        let contig = self
            .contigs
            .get(record.range.rid as usize)
            .ok_or_else(|| Error::Invalid(format!("unknown contig rid {}", record.range.rid)))?;
        let rid = self
            .writer
            .header()
            .name2rid(contig.name.as_bytes())
            .map_err(|e| Error::Invalid(format!("contig {} not in output header: {e}", contig.name)))?;

        let mut rec = self.writer.empty_record();
        rec.set_rid(Some(rid));
        rec.set_pos(record.range.beg as i64);

        let alleles: Vec<&[u8]> = record.alleles.iter().map(|a| a.as_bytes()).collect();
        rec.set_alleles(&alleles)
            .map_err(|e| Error::Invalid(format!("setting alleles at {:?}: {e}", record.range)))?;

        let gt_buf: Vec<rust_htslib::bcf::record::GenotypeAllele> = record
            .calls
            .iter()
            .flat_map(|call| [to_htslib_allele(call.genotype.0), to_htslib_allele(call.genotype.1)])
            .collect();
        rec.push_genotypes(&gt_buf)
            .map_err(|e| Error::Invalid(format!("setting genotypes at {:?}: {e}", record.range)))?;

        let dp: Vec<i32> = record.calls.iter().map(|c| c.depth as i32).collect();
        rec.push_format_integer(b"DP", &dp)
            .map_err(|e| Error::Invalid(format!("setting DP at {:?}: {e}", record.range)))?;

        let ad: Vec<i32> = record
            .calls
            .iter()
            .flat_map(|c| c.allele_depth.iter().map(|&d| d as i32))
            .collect();
        rec.push_format_integer(b"AD", &ad)
            .map_err(|e| Error::Invalid(format!("setting AD at {:?}: {e}", record.range)))?;

        self.writer
            .write(&rec)
            .map_err(|e| Error::IOError(format!("writing joint record at {:?}: {e}", record.range)))
    }
}

fn to_htslib_allele(a: Option<u32>) -> rust_htslib::bcf::record::GenotypeAllele {
    match a {
        Some(i) => rust_htslib::bcf::record::GenotypeAllele::Unphased(i as i32),
        None => rust_htslib::bcf::record::GenotypeAllele::UnphasedMissing,
    }
}
