//! Reconstruction instructions and the materialised script.

/// One step of the reconstruction plan.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Instruction {
    /// Append the bytes of baseline block `block_index`.
    Copy {
        /// Zero-based index of the baseline block.
        block_index: u32,
    },
    /// Append these bytes verbatim.
    Literal(Vec<u8>),
}

impl Instruction {
    /// Returns `true` for [`Instruction::Copy`].
    #[must_use]
    pub const fn is_copy(&self) -> bool {
        matches!(self, Self::Copy { .. })
    }

    /// Returns `true` for [`Instruction::Literal`].
    #[must_use]
    pub const fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    /// Number of literal bytes carried, zero for copies.
    #[must_use]
    pub fn literal_len(&self) -> usize {
        match self {
            Self::Literal(bytes) => bytes.len(),
            Self::Copy { .. } => 0,
        }
    }
}

/// Counters describing a generated instruction stream.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct InstructionStats {
    /// Number of copy instructions.
    pub copies: u64,
    /// Number of literal instructions.
    pub literals: u64,
    /// Bytes reproduced from the baseline.
    pub copied_bytes: u64,
    /// Bytes carried verbatim.
    pub literal_bytes: u64,
}

impl InstructionStats {
    /// Total number of instructions.
    #[must_use]
    pub const fn instructions(&self) -> u64 {
        self.copies + self.literals
    }

    /// Total bytes the instructions reconstruct.
    #[must_use]
    pub const fn total_bytes(&self) -> u64 {
        self.copied_bytes + self.literal_bytes
    }

    pub(crate) fn record_copy(&mut self, len: u32) {
        self.copies += 1;
        self.copied_bytes += u64::from(len);
    }

    pub(crate) fn record_literal(&mut self, len: usize) {
        self.literals += 1;
        self.literal_bytes += len as u64;
    }
}

/// Ordered instruction list plus its counters.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct InstructionScript {
    instructions: Vec<Instruction>,
    stats: InstructionStats,
}

impl InstructionScript {
    /// Creates a script from its parts.
    #[must_use]
    pub const fn new(instructions: Vec<Instruction>, stats: InstructionStats) -> Self {
        Self {
            instructions,
            stats,
        }
    }

    /// Instructions in replay order.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Consumes the script and returns its instructions.
    #[must_use]
    pub fn into_instructions(self) -> Vec<Instruction> {
        self.instructions
    }

    /// Counters for the script.
    #[must_use]
    pub const fn stats(&self) -> InstructionStats {
        self.stats
    }

    /// Returns `true` when the script holds no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl IntoIterator for InstructionScript {
    type Item = Instruction;
    type IntoIter = std::vec::IntoIter<Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.instructions.into_iter()
    }
}
