//! Checksum set wire format.
//!
//! ## Layout
//!
//! **Header:**
//! - Magic `DBCS` (4 bytes)
//! - Format version (1 byte)
//! - Strong hash id (1 byte, see [`StrongHashAlgorithm::wire_id`])
//! - Block size (varint)
//! - Baseline length (varint)
//!
//! **For each block, in ascending index order:**
//! - Tag `0x01`
//! - Weak checksum (4 bytes LE)
//! - Block length (varint)
//! - Strong digest (width fixed by the algorithm)
//!
//! **Trailer:** tag `0x00`.
//!
//! Block indices are implicit: the n-th record describes block n. The reader
//! checks every record against the layout announced in the header, so a
//! corrupted or truncated stream never yields a set that silently covers
//! less than the baseline.

use std::io::{Read, Write};
use std::num::NonZeroU32;

use checksums::{MAX_DIGEST_LEN, StrongDigest, StrongHashAlgorithm};
use logging::trace_checksum;
use signature::{BlockLayout, ChecksumRecord, ChecksumSet, SignatureError};

use crate::error::WireError;
use crate::varint::{read_varint, write_varint};

/// Magic bytes opening a checksum stream.
pub const CHECKSUM_MAGIC: [u8; 4] = *b"DBCS";
/// Current checksum stream version.
pub const CHECKSUM_VERSION: u8 = 1;

const TAG_END: u8 = 0x00;
const TAG_RECORD: u8 = 0x01;

/// Streams checksum records to a writer.
#[derive(Debug)]
pub struct ChecksumWriter<W> {
    writer: W,
    layout: BlockLayout,
    algorithm: StrongHashAlgorithm,
    written: u32,
}

impl<W: Write> ChecksumWriter<W> {
    /// Writes the header for a set with the given layout and algorithm.
    pub fn new(
        mut writer: W,
        layout: BlockLayout,
        algorithm: StrongHashAlgorithm,
    ) -> Result<Self, WireError> {
        writer.write_all(&CHECKSUM_MAGIC)?;
        writer.write_all(&[CHECKSUM_VERSION, algorithm.wire_id()])?;
        write_varint(&mut writer, u64::from(layout.block_len().get()))?;
        write_varint(&mut writer, layout.total_len())?;
        Ok(Self {
            writer,
            layout,
            algorithm,
            written: 0,
        })
    }

    /// Appends the next record.
    ///
    /// # Errors
    ///
    /// Rejects records that are out of order, past the layout or carry a
    /// digest of the wrong width, as [`WireError::Signature`].
    pub fn write_record(&mut self, record: &ChecksumRecord) -> Result<(), WireError> {
        if record.block_index() != self.written {
            return Err(SignatureError::UnexpectedBlock {
                expected: self.written,
                found: record.block_index(),
            }
            .into());
        }
        if self.written >= self.layout.block_count() {
            return Err(SignatureError::TrailingData {
                bytes: u64::from(record.len()),
            }
            .into());
        }
        let width = self.algorithm.digest_len();
        if record.strong().len() != width {
            return Err(SignatureError::DigestWidth {
                algorithm: self.algorithm,
                expected: width,
                found: record.strong().len(),
            }
            .into());
        }
        self.writer.write_all(&[TAG_RECORD])?;
        self.writer.write_all(&record.weak().to_le_bytes())?;
        write_varint(&mut self.writer, u64::from(record.len()))?;
        self.writer.write_all(record.strong().as_bytes())?;
        self.written += 1;
        Ok(())
    }

    /// Writes the trailer and returns the underlying writer.
    pub fn finish(mut self) -> Result<W, WireError> {
        if self.written != self.layout.block_count() {
            return Err(SignatureError::Incomplete {
                expected: self.layout.block_count(),
                found: self.written,
            }
            .into());
        }
        self.writer.write_all(&[TAG_END])?;
        self.writer.flush()?;
        trace_checksum!(records = self.written, "wrote checksum stream");
        Ok(self.writer)
    }
}

/// Writes a complete set, header to trailer.
pub fn write_checksum_set<W: Write>(writer: W, set: &ChecksumSet) -> Result<W, WireError> {
    let mut out = ChecksumWriter::new(writer, set.layout(), set.algorithm())?;
    for record in set {
        out.write_record(record)?;
    }
    out.finish()
}

/// Reads checksum records from a stream written by [`ChecksumWriter`].
#[derive(Debug)]
pub struct ChecksumReader<R> {
    reader: R,
    layout: BlockLayout,
    algorithm: StrongHashAlgorithm,
    read: u32,
    finished: bool,
}

impl<R: Read> ChecksumReader<R> {
    /// Reads and validates the header.
    pub fn new(mut reader: R) -> Result<Self, WireError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != CHECKSUM_MAGIC {
            return Err(WireError::BadMagic {
                expected: CHECKSUM_MAGIC,
                found: magic,
            });
        }
        let mut fixed = [0u8; 2];
        reader.read_exact(&mut fixed)?;
        let [version, algorithm_id] = fixed;
        if version != CHECKSUM_VERSION {
            return Err(WireError::UnsupportedVersion(version));
        }
        let algorithm = StrongHashAlgorithm::from_wire_id(algorithm_id)
            .ok_or(WireError::UnknownAlgorithm(algorithm_id))?;
        let raw_block = read_varint(&mut reader)?;
        let block_len = u32::try_from(raw_block)
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or(WireError::OutOfRange {
                field: "block size",
                value: raw_block,
            })?;
        let total_len = read_varint(&mut reader)?;
        let layout = BlockLayout::new(block_len, total_len)?;
        Ok(Self {
            reader,
            layout,
            algorithm,
            read: 0,
            finished: false,
        })
    }

    /// Layout announced by the header.
    #[must_use]
    pub const fn layout(&self) -> BlockLayout {
        self.layout
    }

    /// Strong hash algorithm announced by the header.
    #[must_use]
    pub const fn algorithm(&self) -> StrongHashAlgorithm {
        self.algorithm
    }

    /// Returns the next record, or `None` after the trailer.
    ///
    /// # Errors
    ///
    /// Truncation surfaces as [`WireError::Io`] with `UnexpectedEof`; records
    /// disagreeing with the layout as [`WireError::Signature`].
    pub fn next_record(&mut self) -> Result<Option<ChecksumRecord>, WireError> {
        if self.finished {
            return Ok(None);
        }
        let mut tag = [0u8; 1];
        self.reader.read_exact(&mut tag)?;
        match tag[0] {
            TAG_END => {
                if self.read != self.layout.block_count() {
                    return Err(SignatureError::Incomplete {
                        expected: self.layout.block_count(),
                        found: self.read,
                    }
                    .into());
                }
                self.finished = true;
                Ok(None)
            }
            TAG_RECORD => self.read_record().map(Some),
            other => Err(WireError::UnknownTag(other)),
        }
    }

    fn read_record(&mut self) -> Result<ChecksumRecord, WireError> {
        let index = self.read;
        let mut weak = [0u8; 4];
        self.reader.read_exact(&mut weak)?;
        let raw_len = read_varint(&mut self.reader)?;
        let block = self.layout.block(index).ok_or(SignatureError::TrailingData {
            bytes: raw_len,
        })?;
        if raw_len != u64::from(block.len) {
            return Err(SignatureError::BlockLength {
                index,
                expected: block.len,
                found: u32::try_from(raw_len).unwrap_or(u32::MAX),
            }
            .into());
        }
        let mut digest = [0u8; MAX_DIGEST_LEN];
        let width = self.algorithm.digest_len();
        self.reader.read_exact(&mut digest[..width])?;
        self.read += 1;
        Ok(ChecksumRecord::new(
            index,
            u32::from_le_bytes(weak),
            StrongDigest::from_slice(&digest[..width]),
            block.len,
        ))
    }

    /// Reads every remaining record into a validated set.
    pub fn read_set(mut self) -> Result<ChecksumSet, WireError> {
        let mut set = ChecksumSet::new(self.layout, self.algorithm);
        while let Some(record) = self.next_record()? {
            set.push(record)?;
        }
        set.ensure_complete()?;
        trace_checksum!(records = set.len(), "read checksum stream");
        Ok(set)
    }
}

impl<R: Read> Iterator for ChecksumReader<R> {
    type Item = Result<ChecksumRecord, WireError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(error) => {
                self.finished = true;
                Some(Err(error))
            }
        }
    }
}

/// Reads a complete set written by [`write_checksum_set`].
pub fn read_checksum_set<R: Read>(reader: R) -> Result<ChecksumSet, WireError> {
    ChecksumReader::new(reader)?.read_set()
}

#[cfg(test)]
mod tests {
    use super::*;
    use signature::ChecksumGenerator;
    use std::io::{self, Cursor};

    fn sample_set(data: &[u8], block: u32, algorithm: StrongHashAlgorithm) -> ChecksumSet {
        ChecksumGenerator::new(NonZeroU32::new(block).unwrap(), algorithm)
            .unwrap()
            .generate_set(Cursor::new(data), data.len() as u64)
            .unwrap()
    }

    fn encode(set: &ChecksumSet) -> Vec<u8> {
        write_checksum_set(Vec::new(), set).unwrap()
    }

    #[test]
    fn set_survives_the_wire() {
        for algorithm in StrongHashAlgorithm::ALL {
            let set = sample_set(b"the quick brown fox jumps", 4, algorithm);
            let decoded = read_checksum_set(Cursor::new(encode(&set))).unwrap();
            assert_eq!(decoded.layout(), set.layout());
            assert_eq!(decoded.algorithm(), algorithm);
            assert_eq!(decoded.records(), set.records());
        }
    }

    #[test]
    fn header_layout() {
        let set = sample_set(b"", 4096, StrongHashAlgorithm::Md5);
        let bytes = encode(&set);
        assert_eq!(&bytes[..4], b"DBCS");
        assert_eq!(bytes[4], CHECKSUM_VERSION);
        assert_eq!(bytes[5], StrongHashAlgorithm::Md5.wire_id());
        assert_eq!(&bytes[6..], &[0x80, 0x20, 0x00, TAG_END]);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let err = ChecksumReader::new(Cursor::new(b"DBIN\x01\x01".to_vec())).unwrap_err();
        assert!(matches!(err, WireError::BadMagic { .. }));
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let err = ChecksumReader::new(Cursor::new(b"DBCS\x01\x7f\x04\x00".to_vec())).unwrap_err();
        assert!(matches!(err, WireError::UnknownAlgorithm(0x7f)));
    }

    #[test]
    fn zero_block_size_is_rejected() {
        let err = ChecksumReader::new(Cursor::new(b"DBCS\x01\x01\x00\x00".to_vec())).unwrap_err();
        assert!(matches!(
            err,
            WireError::OutOfRange {
                field: "block size",
                ..
            }
        ));
    }

    #[test]
    fn truncated_stream_is_an_io_error() {
        let set = sample_set(&[9u8; 100], 16, StrongHashAlgorithm::Sha256);
        let mut bytes = encode(&set);
        bytes.truncate(bytes.len() - 10);
        let err = read_checksum_set(Cursor::new(bytes)).unwrap_err();
        assert!(err.is_truncated());
        assert_eq!(io::Error::from(err).kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn early_trailer_is_incomplete() {
        let set = sample_set(&[1u8; 32], 8, StrongHashAlgorithm::Xxh3_128);
        let full = encode(&set);
        let header_len = 4 + 2 + 1 + 1;
        let mut bytes = full[..header_len].to_vec();
        bytes.push(TAG_END);
        let err = read_checksum_set(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(
            err,
            WireError::Signature(SignatureError::Incomplete {
                expected: 4,
                found: 0
            })
        ));
    }

    #[test]
    fn writer_rejects_wrong_digest_width() {
        let layout = BlockLayout::new(NonZeroU32::new(4).unwrap(), 4).unwrap();
        let mut writer =
            ChecksumWriter::new(Vec::new(), layout, StrongHashAlgorithm::Sha256).unwrap();
        let record = ChecksumRecord::new(0, 1, StrongHashAlgorithm::Md5.digest(b"abcd"), 4);
        assert!(matches!(
            writer.write_record(&record),
            Err(WireError::Signature(SignatureError::DigestWidth { .. }))
        ));
    }

    #[test]
    fn iterator_yields_records_in_order() {
        let set = sample_set(b"0123456789", 3, StrongHashAlgorithm::Sha1);
        let reader = ChecksumReader::new(Cursor::new(encode(&set))).unwrap();
        let indices: Vec<u32> = reader.map(|r| r.unwrap().block_index()).collect();
        assert_eq!(indices, [0, 1, 2, 3]);
    }
}
