//! Decoder configuration
//!
//! Controls which optional work the instruction decoder performs on top of the plain
//! byte-to-instruction translation.

/// Configuration for [`crate::disassembler::InstructionDecoder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Ask the attached resolver about token operands (no effect without a resolver)
    pub resolve_tokens: bool,

    /// Fill [`crate::disassembler::Instruction::branch_targets`] with absolute offsets
    pub compute_branch_targets: bool,

    /// Largest accepted `switch` target count. Larger tables fail with
    /// [`crate::Error::SwitchTooLarge`] even if the stream would contain them. `None` only bounds
    /// the count by the stream length.
    pub max_switch_targets: Option<usize>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            resolve_tokens: true,
            compute_branch_targets: true,
            max_switch_targets: None,
        }
    }
}

impl DecoderConfig {
    /// Plain decoding only: no resolution, no branch targets
    ///
    /// Suitable for bulk scanning where only opcodes and raw operands matter.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            resolve_tokens: false,
            compute_branch_targets: false,
            max_switch_targets: None,
        }
    }

    /// Everything enabled, no artificial limits
    #[must_use]
    pub fn comprehensive() -> Self {
        Self::default()
    }

    /// Everything enabled, with a cap on jump-table sizes for untrusted input
    ///
    /// Compilers never emit switches anywhere near 65536 targets.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            resolve_tokens: true,
            compute_branch_targets: true,
            max_switch_targets: Some(0x1_0000),
        }
    }

    /// Returns a copy with the given switch target cap
    #[must_use]
    pub fn with_max_switch_targets(mut self, max: usize) -> Self {
        self.max_switch_targets = Some(max);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_config_presets() {
        let minimal = DecoderConfig::minimal();
        assert!(!minimal.resolve_tokens);
        assert!(!minimal.compute_branch_targets);
        assert_eq!(minimal.max_switch_targets, None);

        let strict = DecoderConfig::strict();
        assert!(strict.resolve_tokens);
        assert!(strict.compute_branch_targets);
        assert_eq!(strict.max_switch_targets, Some(65536));

        let capped = DecoderConfig::minimal().with_max_switch_targets(4);
        assert_eq!(capped.max_switch_targets, Some(4));
        assert!(!capped.resolve_tokens);
    }

    #[test]
    fn test_default_config() {
        assert_eq!(DecoderConfig::default(), DecoderConfig::comprehensive());
    }
}
