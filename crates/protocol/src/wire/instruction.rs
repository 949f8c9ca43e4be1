//! Instruction stream wire format.
//!
//! ## Layout
//!
//! - Magic `DBIN` (4 bytes), format version (1 byte), block size (varint),
//!   strong hash id of the target digest (1 byte, `0` for none)
//! - Tokens, each a 4-byte signed little-endian integer:
//!   - `n > 0`: a literal of `n` raw bytes follows (at most [`CHUNK_SIZE`])
//!   - `n < 0`: copy baseline block `-(n + 1)`
//!   - `0`: end of stream
//! - Trailer: the header's strong hash id again, followed by the digest
//!   bytes when it is not `0`
//!
//! Announcing the digest algorithm up front lets a receiver hash its output
//! while it is being written.
//!
//! The token encoding is the one rsync uses for its delta stream. Literals
//! longer than [`CHUNK_SIZE`] are split into several tokens, so a reader may
//! return more literal instructions than were written; replaying them yields
//! the same bytes. A stream that ends without the `0` token is truncated and
//! is reported as an I/O error, never as a short but valid script.

use std::io::{self, Read, Write};
use std::num::NonZeroU32;

use checksums::{MAX_DIGEST_LEN, StrongDigest, StrongHashAlgorithm};
use logging::trace_delta;
use matching::{Instruction, InstructionStats};

use crate::error::WireError;
use crate::varint::{read_varint, write_varint};

/// Magic bytes opening an instruction stream.
pub const INSTRUCTION_MAGIC: [u8; 4] = *b"DBIN";
/// Current instruction stream version.
pub const INSTRUCTION_VERSION: u8 = 2;
/// Largest literal carried by a single token.
pub const CHUNK_SIZE: usize = 32 * 1024;

/// Largest block index representable as a negative `i32` token.
const MAX_BLOCK_INDEX: u32 = i32::MAX as u32;

const NO_DIGEST: u8 = 0;

/// Digest of the complete target, carried in the stream trailer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TargetDigest {
    /// Algorithm that produced the digest.
    pub algorithm: StrongHashAlgorithm,
    /// Digest of the target bytes.
    pub digest: StrongDigest,
}

#[inline]
fn write_int<W: Write + ?Sized>(writer: &mut W, value: i32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

#[inline]
fn read_int<R: Read + ?Sized>(reader: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

/// Streams instructions to a writer.
#[derive(Debug)]
pub struct InstructionWriter<W> {
    writer: W,
    digest: Option<StrongHashAlgorithm>,
    stats: InstructionStats,
}

impl<W: Write> InstructionWriter<W> {
    /// Writes the stream header for instructions built against `block_len`
    /// byte blocks, without a target digest.
    pub fn new(writer: W, block_len: NonZeroU32) -> Result<Self, WireError> {
        Self::with_digest(writer, block_len, None)
    }

    /// Writes the stream header, announcing that the trailer carries a target
    /// digest made with `digest`.
    pub fn with_digest(
        mut writer: W,
        block_len: NonZeroU32,
        digest: Option<StrongHashAlgorithm>,
    ) -> Result<Self, WireError> {
        writer.write_all(&INSTRUCTION_MAGIC)?;
        writer.write_all(&[INSTRUCTION_VERSION])?;
        write_varint(&mut writer, u64::from(block_len.get()))?;
        writer.write_all(&[digest_id(digest)])?;
        Ok(Self {
            writer,
            digest,
            stats: InstructionStats::default(),
        })
    }

    /// Appends one instruction. Empty literals are skipped.
    pub fn write(&mut self, instruction: &Instruction) -> Result<(), WireError> {
        match instruction {
            Instruction::Copy { block_index } => {
                if *block_index > MAX_BLOCK_INDEX {
                    return Err(WireError::OutOfRange {
                        field: "block index",
                        value: u64::from(*block_index),
                    });
                }
                write_int(&mut self.writer, -(*block_index as i32) - 1)?;
                self.stats.copies += 1;
            }
            Instruction::Literal(bytes) => {
                for chunk in bytes.chunks(CHUNK_SIZE) {
                    write_int(&mut self.writer, chunk.len() as i32)?;
                    self.writer.write_all(chunk)?;
                    self.stats.literals += 1;
                    self.stats.literal_bytes += chunk.len() as u64;
                }
            }
        }
        Ok(())
    }

    /// Tokens written so far; copied bytes are not known to the writer.
    #[must_use]
    pub const fn stats(&self) -> InstructionStats {
        self.stats
    }

    /// Writes the end token and trailer and returns the underlying writer.
    ///
    /// `target` must use the algorithm announced in the header, and must be
    /// present exactly when one was announced.
    pub fn finish(mut self, target: Option<&TargetDigest>) -> Result<W, WireError> {
        let found = digest_id(target.map(|target| target.algorithm));
        let announced = digest_id(self.digest);
        if found != announced {
            return Err(WireError::DigestMismatch { announced, found });
        }
        write_int(&mut self.writer, 0)?;
        match target {
            Some(target) => {
                let width = target.algorithm.digest_len();
                if target.digest.len() != width {
                    return Err(WireError::OutOfRange {
                        field: "target digest width",
                        value: target.digest.len() as u64,
                    });
                }
                self.writer.write_all(&[target.algorithm.wire_id()])?;
                self.writer.write_all(target.digest.as_bytes())?;
            }
            None => self.writer.write_all(&[NO_DIGEST])?,
        }
        self.writer.flush()?;
        trace_delta!(
            copies = self.stats.copies,
            literals = self.stats.literals,
            "wrote instruction stream"
        );
        Ok(self.writer)
    }
}

fn digest_id(algorithm: Option<StrongHashAlgorithm>) -> u8 {
    algorithm.map_or(NO_DIGEST, StrongHashAlgorithm::wire_id)
}

/// Writes every instruction followed by the end token and an empty trailer.
pub fn write_instructions<'a, W, I>(
    writer: W,
    block_len: NonZeroU32,
    instructions: I,
) -> Result<W, WireError>
where
    W: Write,
    I: IntoIterator<Item = &'a Instruction>,
{
    let mut out = InstructionWriter::new(writer, block_len)?;
    for instruction in instructions {
        out.write(instruction)?;
    }
    out.finish(None)
}

/// Reads instructions from a stream written by [`InstructionWriter`].
#[derive(Debug)]
pub struct InstructionReader<R> {
    reader: R,
    block_len: NonZeroU32,
    digest: Option<StrongHashAlgorithm>,
    finished: bool,
    target: Option<TargetDigest>,
}

impl<R: Read> InstructionReader<R> {
    /// Reads and validates the header.
    pub fn new(mut reader: R) -> Result<Self, WireError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != INSTRUCTION_MAGIC {
            return Err(WireError::BadMagic {
                expected: INSTRUCTION_MAGIC,
                found: magic,
            });
        }
        let mut version = [0u8; 1];
        reader.read_exact(&mut version)?;
        if version[0] != INSTRUCTION_VERSION {
            return Err(WireError::UnsupportedVersion(version[0]));
        }
        let raw_block = read_varint(&mut reader)?;
        let block_len = u32::try_from(raw_block)
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or(WireError::OutOfRange {
                field: "block size",
                value: raw_block,
            })?;
        let digest = read_algorithm(&mut reader)?;
        Ok(Self {
            reader,
            block_len,
            digest,
            finished: false,
            target: None,
        })
    }

    /// Block size the instructions were generated against.
    #[must_use]
    pub const fn block_len(&self) -> NonZeroU32 {
        self.block_len
    }

    /// Algorithm of the trailer digest announced in the header.
    #[must_use]
    pub const fn digest_algorithm(&self) -> Option<StrongHashAlgorithm> {
        self.digest
    }

    /// Target digest from the trailer; `None` until the end token was read or
    /// when the writer recorded none.
    #[must_use]
    pub const fn target_digest(&self) -> Option<&TargetDigest> {
        self.target.as_ref()
    }

    fn read_trailer(&mut self) -> Result<(), WireError> {
        let found = read_algorithm(&mut self.reader)?;
        if found != self.digest {
            return Err(WireError::DigestMismatch {
                announced: digest_id(self.digest),
                found: digest_id(found),
            });
        }
        let Some(algorithm) = found else {
            return Ok(());
        };
        let mut digest = [0u8; MAX_DIGEST_LEN];
        let width = algorithm.digest_len();
        self.reader.read_exact(&mut digest[..width])?;
        self.target = Some(TargetDigest {
            algorithm,
            digest: StrongDigest::from_slice(&digest[..width]),
        });
        Ok(())
    }

    /// Returns the next instruction, or `None` after the end token.
    pub fn next_instruction(&mut self) -> Result<Option<Instruction>, WireError> {
        if self.finished {
            return Ok(None);
        }
        let token = read_int(&mut self.reader)?;
        if token == 0 {
            self.read_trailer()?;
            self.finished = true;
            return Ok(None);
        }
        if token < 0 {
            let block_index = (-(i64::from(token)) - 1) as u32;
            return Ok(Some(Instruction::Copy { block_index }));
        }
        let len = token as usize;
        if len > CHUNK_SIZE {
            return Err(WireError::LiteralTooLarge {
                len: len as u64,
                max: CHUNK_SIZE,
            });
        }
        let mut bytes = vec![0u8; len];
        self.reader.read_exact(&mut bytes)?;
        Ok(Some(Instruction::Literal(bytes)))
    }

    /// Reports whether the end token has been read.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }
}

impl<R: Read> Iterator for InstructionReader<R> {
    type Item = Result<Instruction, WireError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_instruction() {
            Ok(Some(instruction)) => Some(Ok(instruction)),
            Ok(None) => None,
            Err(error) => {
                self.finished = true;
                Some(Err(error))
            }
        }
    }
}

fn read_algorithm<R: Read + ?Sized>(reader: &mut R) -> Result<Option<StrongHashAlgorithm>, WireError> {
    let mut id = [0u8; 1];
    reader.read_exact(&mut id)?;
    if id[0] == NO_DIGEST {
        return Ok(None);
    }
    StrongHashAlgorithm::from_wire_id(id[0])
        .map(Some)
        .ok_or(WireError::UnknownAlgorithm(id[0]))
}

/// Reads a whole instruction stream into memory.
pub fn read_instructions<R: Read>(reader: R) -> Result<Vec<Instruction>, WireError> {
    InstructionReader::new(reader)?.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const BLOCK: NonZeroU32 = match NonZeroU32::new(16) {
        Some(len) => len,
        None => unreachable!(),
    };

    fn encode(instructions: &[Instruction]) -> Vec<u8> {
        write_instructions(Vec::new(), BLOCK, instructions).unwrap()
    }

    fn header() -> Vec<u8> {
        b"DBIN\x02\x10\x00".to_vec()
    }

    #[test]
    fn tokens_follow_rsync_encoding() {
        let bytes = encode(&[
            Instruction::Copy { block_index: 0 },
            Instruction::Literal(b"hi".to_vec()),
            Instruction::Copy { block_index: 1 },
        ]);
        let mut expected = header();
        expected.extend_from_slice(&(-1i32).to_le_bytes());
        expected.extend_from_slice(&2i32.to_le_bytes());
        expected.extend_from_slice(b"hi");
        expected.extend_from_slice(&(-2i32).to_le_bytes());
        expected.extend_from_slice(&0i32.to_le_bytes());
        expected.push(NO_DIGEST);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn long_literal_is_chunked() {
        let literal = vec![0xabu8; CHUNK_SIZE * 2 + 5];
        let decoded =
            read_instructions(Cursor::new(encode(&[Instruction::Literal(literal.clone())])))
                .unwrap();
        let lens: Vec<usize> = decoded.iter().map(Instruction::literal_len).collect();
        assert_eq!(lens, [CHUNK_SIZE, CHUNK_SIZE, 5]);
        let joined: Vec<u8> = decoded
            .into_iter()
            .flat_map(|i| match i {
                Instruction::Literal(bytes) => bytes,
                Instruction::Copy { .. } => Vec::new(),
            })
            .collect();
        assert_eq!(joined, literal);
    }

    #[test]
    fn empty_literal_writes_nothing() {
        let bytes = encode(&[Instruction::Literal(Vec::new())]);
        assert_eq!(bytes.len(), header().len() + 4 + 1);
        assert!(read_instructions(Cursor::new(bytes)).unwrap().is_empty());
    }

    #[test]
    fn header_carries_block_size() {
        let reader = InstructionReader::new(Cursor::new(encode(&[]))).unwrap();
        assert_eq!(reader.block_len(), BLOCK);
        assert!(reader.target_digest().is_none());
    }

    #[test]
    fn trailer_carries_target_digest() {
        let target = TargetDigest {
            algorithm: StrongHashAlgorithm::Sha256,
            digest: StrongHashAlgorithm::Sha256.digest(b"target"),
        };
        let mut writer =
            InstructionWriter::with_digest(Vec::new(), BLOCK, Some(StrongHashAlgorithm::Sha256)).unwrap();
        writer.write(&Instruction::Literal(b"target".to_vec())).unwrap();
        let bytes = writer.finish(Some(&target)).unwrap();

        let mut reader = InstructionReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.digest_algorithm(), Some(StrongHashAlgorithm::Sha256));
        assert!(reader.next_instruction().unwrap().is_some());
        assert!(reader.target_digest().is_none());
        assert!(reader.next_instruction().unwrap().is_none());
        assert!(reader.is_finished());
        assert_eq!(reader.target_digest(), Some(&target));
    }

    #[test]
    fn writer_rejects_digest_other_than_announced() {
        let target = TargetDigest {
            algorithm: StrongHashAlgorithm::Md5,
            digest: StrongHashAlgorithm::Md5.digest(b"x"),
        };
        let writer =
            InstructionWriter::with_digest(Vec::new(), BLOCK, Some(StrongHashAlgorithm::Sha1)).unwrap();
        assert!(matches!(
            writer.finish(Some(&target)),
            Err(WireError::DigestMismatch { .. })
        ));
        let writer = InstructionWriter::new(Vec::new(), BLOCK).unwrap();
        assert!(matches!(
            writer.finish(Some(&target)),
            Err(WireError::DigestMismatch { announced: 0, .. })
        ));
    }

    #[test]
    fn reader_rejects_trailer_other_than_announced() {
        let mut bytes = header();
        bytes.extend_from_slice(&0i32.to_le_bytes());
        bytes.push(StrongHashAlgorithm::Md5.wire_id());
        bytes.extend_from_slice(StrongHashAlgorithm::Md5.digest(b"").as_bytes());
        assert!(matches!(
            read_instructions(Cursor::new(bytes)),
            Err(WireError::DigestMismatch { announced: 0, .. })
        ));
    }

    #[test]
    fn missing_end_token_is_truncation() {
        let mut bytes = encode(&[Instruction::Copy { block_index: 3 }]);
        bytes.truncate(bytes.len() - 5);
        let err = read_instructions(Cursor::new(bytes)).unwrap_err();
        assert!(err.is_truncated());
    }

    #[test]
    fn missing_trailer_is_truncation() {
        let mut bytes = encode(&[Instruction::Copy { block_index: 3 }]);
        bytes.pop();
        assert!(read_instructions(Cursor::new(bytes)).unwrap_err().is_truncated());
    }

    #[test]
    fn short_literal_payload_is_truncation() {
        let mut bytes = header();
        bytes.extend_from_slice(&10i32.to_le_bytes());
        bytes.extend_from_slice(b"abc");
        assert!(read_instructions(Cursor::new(bytes)).unwrap_err().is_truncated());
    }

    #[test]
    fn oversized_literal_token_is_rejected() {
        let mut bytes = header();
        bytes.extend_from_slice(&(CHUNK_SIZE as i32 + 1).to_le_bytes());
        assert!(matches!(
            read_instructions(Cursor::new(bytes)),
            Err(WireError::LiteralTooLarge { .. })
        ));
    }

    #[test]
    fn largest_block_index_round_trips() {
        let instructions = [Instruction::Copy {
            block_index: MAX_BLOCK_INDEX,
        }];
        let decoded = read_instructions(Cursor::new(encode(&instructions))).unwrap();
        assert_eq!(decoded, instructions);

        let mut writer = InstructionWriter::new(Vec::new(), BLOCK).unwrap();
        assert!(
            writer
                .write(&Instruction::Copy {
                    block_index: MAX_BLOCK_INDEX + 1
                })
                .is_err()
        );
    }

    #[test]
    fn wrong_version_is_rejected() {
        let err = InstructionReader::new(Cursor::new(b"DBIN\x09".to_vec())).unwrap_err();
        assert!(matches!(err, WireError::UnsupportedVersion(9)));
    }

    #[test]
    fn zero_block_size_is_rejected() {
        let err = InstructionReader::new(Cursor::new(b"DBIN\x02\x00\x00".to_vec())).unwrap_err();
        assert!(matches!(err, WireError::OutOfRange { .. }));
    }
}
