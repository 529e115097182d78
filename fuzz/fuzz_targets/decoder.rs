#![no_main]

use libfuzzer_sys::fuzz_target;
use cilstream::disassembler::{encode_instruction, DecoderConfig, InstructionDecoder};

fuzz_target!(|data: &[u8]| {
    for config in [DecoderConfig::default(), DecoderConfig::strict().with_max_switch_targets(16)] {
        let mut decoder = InstructionDecoder::new(data).with_config(config);
        let mut encoded = Vec::new();
        let mut expected_start = 0;

        loop {
            match decoder.next() {
                Some(Ok(instruction)) => {
                    assert_eq!(instruction.offset, expected_start);
                    assert!(instruction.next_offset() <= data.len());
                    expected_start = instruction.next_offset();

                    encoded.clear();
                    encode_instruction(&instruction, &mut encoded).unwrap();
                    assert_eq!(encoded, &data[instruction.offset..instruction.next_offset()]);
                }
                Some(Err(error)) => {
                    assert_eq!(error.offset(), Some(expected_start));
                    if !decoder.resync() {
                        break;
                    }
                    expected_start += 1;
                }
                None => break,
            }
        }
    }
});
