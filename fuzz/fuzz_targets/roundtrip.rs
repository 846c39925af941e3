#![no_main]
use libfuzzer_sys::fuzz_target;
use lz4_cascade::{BlockVerdict, PipelineConfig};

fuzz_target!(|data: &[u8]| {
    let pipeline = PipelineConfig::default().build().expect("default config is valid");

    let mut payload = Vec::new();
    match pipeline.compress_block(data, &mut payload) {
        BlockVerdict::Compressed => {
            assert!(payload.len() < data.len());
            let decoded = lz4_flex::block::decompress(&payload, data.len())
                .expect("compressed block must decode");
            assert!(decoded.iter().eq(data));
        }
        // The caller would ship a stored block for these; nothing to check
        // beyond the truncation guarantee.
        BlockVerdict::Incompressible | BlockVerdict::LiteralCapExceeded => {
            assert!(payload.len() <= data.len());
        }
    }
});
