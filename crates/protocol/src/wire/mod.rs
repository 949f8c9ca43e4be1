//! Wire serialization for checksum sets and instruction streams.
//!
//! Both formats are self-describing (magic + version) so a stream handed to
//! the wrong reader fails on the first bytes instead of decoding garbage.

pub mod checksum;
pub mod instruction;

pub use self::checksum::{
    CHECKSUM_MAGIC, CHECKSUM_VERSION, ChecksumReader, ChecksumWriter, read_checksum_set,
    write_checksum_set,
};
pub use self::instruction::{
    CHUNK_SIZE, INSTRUCTION_MAGIC, INSTRUCTION_VERSION, InstructionReader, InstructionWriter,
    TargetDigest, read_instructions, write_instructions,
};
