//! crates/cli/src/report.rs
//! `--stats` rendering.

use std::fmt::Write as _;

use engine::{InstructionSummary, ReceiveSummary, SyncReport};
use signature::ChecksumSet;

pub(crate) fn checksums(set: &ChecksumSet) -> String {
    let layout = set.layout();
    format!(
        "baseline: {} bytes in {} blocks of {}\nstrong hash: {}\n",
        layout.total_len(),
        layout.block_count(),
        layout.block_len(),
        set.algorithm()
    )
}

pub(crate) fn delta(summary: &InstructionSummary) -> String {
    let stats = summary.stats;
    let mut out = format!(
        "target: {} bytes\nmatched: {} bytes in {} copies\nliteral: {} bytes in {} literals\n",
        summary.target_len, stats.copied_bytes, stats.copies, stats.literal_bytes, stats.literals
    );
    if let Some(target) = &summary.target_digest {
        let _ = writeln!(out, "target {}: {}", target.algorithm, target.digest);
    }
    out
}

pub(crate) fn patch(summary: &ReceiveSummary) -> String {
    let stats = summary.stats;
    let mut out = format!(
        "output: {} bytes\ncopied: {} bytes in {} copies ({} reads)\nliteral: {} bytes in {} literals\n",
        summary.output_len,
        stats.copied_bytes,
        stats.copies,
        stats.copy_runs,
        stats.literal_bytes,
        stats.literals
    );
    if let Some(digest) = &summary.digest {
        let _ = writeln!(out, "verified: {digest}");
    }
    out
}

pub(crate) fn sync(report: &SyncReport) -> String {
    let mut out = format!(
        "baseline: {} bytes in {} blocks\ntarget: {} bytes\noutput: {} bytes\n",
        report.baseline_len, report.block_count, report.target_len, report.output_len
    );
    let _ = writeln!(
        out,
        "copied: {} bytes in {} copies ({} reads)\nliteral: {} bytes in {} literals",
        report.receiver.copied_bytes,
        report.receiver.copies,
        report.receiver.copy_runs,
        report.receiver.literal_bytes,
        report.receiver.literals
    );
    let _ = writeln!(
        out,
        "baseline streams: {} opened, {} bytes skipped",
        report.source.opens, report.source.bytes_skipped
    );
    if let Some(target) = &report.digest {
        let _ = writeln!(out, "verified {}: {}", target.algorithm, target.digest);
    }
    out
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::num::NonZeroU32;

    use checksums::StrongHashAlgorithm;
    use signature::ChecksumGenerator;

    use super::*;

    #[test]
    fn checksum_report_lists_layout() {
        let set = ChecksumGenerator::new(NonZeroU32::new(4).unwrap(), StrongHashAlgorithm::Md5)
            .unwrap()
            .generate_set(Cursor::new(b"0123456789"), 10)
            .unwrap();
        assert_eq!(
            checksums(&set),
            "baseline: 10 bytes in 3 blocks of 4\nstrong hash: md5\n"
        );
    }
}
