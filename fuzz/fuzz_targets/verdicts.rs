#![no_main]
use libfuzzer_sys::fuzz_target;
use lz4_cascade::{PipelineConfig, MINMATCH};

// Structural invariants that hold for every input, whatever the verdict:
// candidate causality and the literal/match byte accounting.
fuzz_target!(|data: &[u8]| {
    let pipeline = PipelineConfig::default().build().expect("default config is valid");

    for (i, c) in pipeline.candidates(data).enumerate() {
        if !c.is_literal() {
            assert!(c.offset >= 1);
            assert!((c.offset as usize) + 1 <= i);
            assert!((c.len as usize) >= MINMATCH);
        }
    }

    let accounted: usize = pipeline
        .sequences(data)
        .map(|s| {
            s.literals.len()
                + if s.token.closes_with_match() {
                    s.token.match_len as usize + MINMATCH
                } else {
                    0
                }
        })
        .sum();
    assert_eq!(accounted, data.len());
});
