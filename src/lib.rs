#![forbid(unsafe_code)]

//! Staged LZ4 block compression.
//!
//! The encoder is organized as a one-way pipeline of five small stages
//! rather than one big loop. Bytes go in at the front and each stage
//! consumes its upstream neighbour's output in order:
//!
//! 1. [`DictionaryMatcher`] proposes a raw match for every input position,
//! 2. [`BestMatchFilter`] drops proposals overlapped by a longer one,
//! 3. [`MatchBooster`] grows the survivors against recent history,
//! 4. [`TokenDivider`] splits the result into literal runs and tokens,
//! 5. [`Lz4Serializer`] renders everything into the LZ4 block grammar.
//!
//! The stages are plain pull-based iterators. Nothing is reordered and no
//! stage shares state with another, so the whole chain behaves like the
//! channel-connected processes it stands in for, minus the threads.
//!
//! What comes out is a raw block payload: no frame header, no checksums,
//! no block-size prefix. Those belong to whatever packs blocks into files
//! or streams. The same goes for the stored-block fallback: when a block
//! does not shrink, or a literal run overflows the cap, the caller learns
//! about it through [`BlockVerdict`] and is expected to ship the input
//! bytes verbatim instead.
//!
//! ```
//! use lz4_cascade::{BlockVerdict, PipelineConfig};
//!
//! let pipeline = PipelineConfig::default().build()?;
//! let input = b"an example that repeats itself, repeats itself, and repeats itself".repeat(8);
//! let mut payload = Vec::new();
//! match pipeline.compress_block(&input, &mut payload) {
//!     BlockVerdict::Compressed => assert!(payload.len() < input.len()),
//!     verdict => panic!("expected a compressible input, got {:?}", verdict),
//! }
//! # Ok::<(), lz4_cascade::ConfigError>(())
//! ```

pub mod matcher;
pub mod filter;
pub mod booster;
pub mod divider;
pub mod serializer;

use std::io::{self, Write};

use byteorder::WriteBytesExt;
use fehler::{throw, throws};
use thiserror::Error;

pub use booster::MatchBooster;
pub use divider::{Sequence, Token, TokenDivider, LITERAL_CAP_SENTINEL};
pub use filter::BestMatchFilter;
pub use matcher::{Candidate, DictionaryMatcher};
pub use serializer::Lz4Serializer;

/// Shortest match the format can express. The token bias is fixed to this
/// value no matter how picky the matcher is configured to be.
pub const MINMATCH: usize = 4;

/// Widest hash window a dictionary slot can store.
pub const MAX_WINDOW: usize = 8;

/// Offsets must fit the two wire bytes after the one-based adjustment.
const OFFSET_LIMIT_CAP: usize = 65536;
/// Boosted lengths live in a byte upstream of the divider.
const MATCH_LEN_CAP: usize = 255;
/// Keeps epoch-relative positions comfortably inside a u32.
const RESET_INTERVAL_CAP: usize = 1 << 31;
/// Keeps literal counts comfortably inside a u32.
const LIT_COUNT_CAP: usize = 1 << 30;

/// Errors detected when validating a [`PipelineConfig`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("minimum match of {0} is below the format floor of 4")]
    MinMatchTooSmall(usize),
    #[error("hash window of {0} bytes cannot hold a minimum match of {1}")]
    WindowTooShort(usize, usize),
    #[error("hash window of {0} bytes exceeds the 8-byte slot storage")]
    WindowTooLong(usize),
    #[error("dictionary needs at least one slot per bucket")]
    ZeroMatchLevel,
    #[error("dictionary size {0} is not a power of two")]
    DictSizeNotPowerOfTwo(usize),
    #[error("booster window {0} is not a power of two")]
    BoosterWindowNotPowerOfTwo(usize),
    #[error("offset floor must be at least 1")]
    ZeroMinOffset,
    #[error("offset limit {0} is outside 2..=65536")]
    BadOffsetLimit(usize),
    #[error("match length cap {0} is outside {1}..=255")]
    BadMatchLenCap(usize, usize),
    #[error("literal cap {0} is outside 1..=2^30")]
    BadLiteralCap(usize),
    #[error("dictionary reset interval {0} is outside 1..=2^31")]
    BadResetInterval(usize),
}

/// A builder-style struct that configures one compression pipeline.
///
/// Create it using `Default::default()`, adjust what you need, then call
/// [`build`](PipelineConfig::build). The defaults produce output any LZ4
/// block decoder accepts.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub(crate) min_offset: usize,
    pub(crate) min_match: usize,
    pub(crate) max_offset_limit: usize,
    pub(crate) match_len: usize,
    pub(crate) match_level: usize,
    pub(crate) dict_size: usize,
    pub(crate) max_match_len: usize,
    pub(crate) max_lit_count: usize,
    pub(crate) booster_window: usize,
    pub(crate) left_bytes: usize,
    pub(crate) dict_reset_interval: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            min_offset: 1,
            min_match: MINMATCH,
            max_offset_limit: 64 * 1024,
            match_len: 6,
            match_level: 6,
            dict_size: 1 << 12,
            max_match_len: 255,
            max_lit_count: 4096,
            booster_window: 16 * 1024,
            left_bytes: 64,
            dict_reset_interval: 16 << 20,
        }
    }
}

impl PipelineConfig {
    /// Smallest accepted zero-based match offset. An offset of 0 would
    /// reference the directly preceding byte; the default floor of 1 rules
    /// that out.
    pub fn min_offset(&mut self, v: usize) -> &mut Self {
        self.min_offset = v;
        self
    }

    /// Shortest match worth accepting. Raising this makes matching pickier
    /// without changing the output format; the wire bias stays at 4.
    pub fn min_match(&mut self, v: usize) -> &mut Self {
        self.min_match = v;
        self
    }

    /// Exclusive upper bound on the match distance. 65536 (the format
    /// maximum) by default.
    pub fn max_offset_limit(&mut self, v: usize) -> &mut Self {
        self.max_offset_limit = v;
        self
    }

    /// Width of the hash window, which is also how long a match the finder
    /// can see on its own. Longer matches are the booster's job.
    pub fn match_len(&mut self, v: usize) -> &mut Self {
        self.match_len = v;
        self
    }

    /// How many recent windows each dictionary bucket remembers.
    pub fn match_level(&mut self, v: usize) -> &mut Self {
        self.match_level = v;
        self
    }

    /// Number of hash buckets. When this number is lower, collisions are
    /// more likely, hurting the compression ratio.
    pub fn dict_size(&mut self, v: usize) -> &mut Self {
        self.dict_size = v;
        self
    }

    /// Longest match the booster may grow to.
    pub fn max_match_len(&mut self, v: usize) -> &mut Self {
        self.max_match_len = v;
        self
    }

    /// Longest literal run a block may carry before it is flagged for the
    /// stored-block fallback.
    pub fn max_lit_count(&mut self, v: usize) -> &mut Self {
        self.max_lit_count = v;
        self
    }

    /// Size of the booster's history buffer. Matches further back than
    /// this pass through without extension.
    pub fn booster_window(&mut self, v: usize) -> &mut Self {
        self.booster_window = v;
        self
    }

    /// Length of the block tail that is emitted as bare literals, with no
    /// match search at all. The default leaves the last 64 bytes alone;
    /// lowering it lets very short inputs match.
    pub fn left_bytes(&mut self, v: usize) -> &mut Self {
        self.left_bytes = v;
        self
    }

    /// How many bytes may pass before the dictionary is wiped and its
    /// position numbering restarts. Bounds the index width a slot has to
    /// carry; 16 MiB by default.
    pub fn dict_reset_interval(&mut self, v: usize) -> &mut Self {
        self.dict_reset_interval = v;
        self
    }

    /// Validate the settings and produce a ready-to-use [`Pipeline`].
    #[throws(ConfigError)]
    pub fn build(&self) -> Pipeline {
        if self.min_match < MINMATCH {
            throw!(ConfigError::MinMatchTooSmall(self.min_match));
        }
        if self.match_len < self.min_match {
            throw!(ConfigError::WindowTooShort(self.match_len, self.min_match));
        }
        if self.match_len > MAX_WINDOW {
            throw!(ConfigError::WindowTooLong(self.match_len));
        }
        if self.match_level == 0 {
            throw!(ConfigError::ZeroMatchLevel);
        }
        if !self.dict_size.is_power_of_two() {
            throw!(ConfigError::DictSizeNotPowerOfTwo(self.dict_size));
        }
        if !self.booster_window.is_power_of_two() {
            throw!(ConfigError::BoosterWindowNotPowerOfTwo(self.booster_window));
        }
        if self.min_offset == 0 {
            throw!(ConfigError::ZeroMinOffset);
        }
        if self.max_offset_limit < 2 || self.max_offset_limit > OFFSET_LIMIT_CAP {
            throw!(ConfigError::BadOffsetLimit(self.max_offset_limit));
        }
        if self.max_match_len < self.match_len || self.max_match_len > MATCH_LEN_CAP {
            throw!(ConfigError::BadMatchLenCap(self.max_match_len, self.match_len));
        }
        if self.max_lit_count == 0 || self.max_lit_count > LIT_COUNT_CAP {
            throw!(ConfigError::BadLiteralCap(self.max_lit_count));
        }
        if self.dict_reset_interval == 0 || self.dict_reset_interval > RESET_INTERVAL_CAP {
            throw!(ConfigError::BadResetInterval(self.dict_reset_interval));
        }
        Pipeline { cfg: self.clone() }
    }
}

/// What became of one block.
///
/// Only `Compressed` means the payload is worth keeping. The other two
/// verdicts tell the caller to ship a stored (uncompressed) block; the
/// payload buffer then holds a truncated rendering with no further use.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BlockVerdict {
    /// The payload is a valid LZ4 block strictly smaller than the input.
    Compressed,
    /// The rendering reached the input size and writing stopped there.
    Incompressible,
    /// A literal run hit the cap and the sentinel went out in its place.
    LiteralCapExceeded,
}

/// A validated configuration, ready to compress any number of independent
/// blocks. Each block gets a fresh dictionary; instances share nothing, so
/// running several side by side on partitioned input is the caller's
/// choice to make.
pub struct Pipeline {
    cfg: PipelineConfig,
}

impl Pipeline {
    /// The match finder on its own: one [`Candidate`] per input byte.
    pub fn candidates<'a>(&self, input: &'a [u8]) -> DictionaryMatcher<'a> {
        DictionaryMatcher::new(&self.cfg, input)
    }

    /// The full front of the pipeline, stopping just short of the
    /// serializer: matcher, filter, booster, and divider chained together.
    pub fn sequences<'a>(
        &self,
        input: &'a [u8],
    ) -> TokenDivider<MatchBooster<BestMatchFilter<DictionaryMatcher<'a>>>> {
        let filtered = BestMatchFilter::new(self.candidates(input), self.cfg.match_len);
        let boosted = MatchBooster::new(
            filtered,
            self.cfg.booster_window,
            self.cfg.max_match_len,
            input.len().saturating_sub(self.cfg.left_bytes),
        );
        TokenDivider::new(boosted, self.cfg.max_lit_count)
    }

    fn divide(&self, input: &[u8]) -> (Vec<Sequence>, bool) {
        let mut divider = self.sequences(input);
        let seqs: Vec<Sequence> = divider.by_ref().collect();
        (seqs, divider.literal_cap_exceeded())
    }

    fn verdict(&self, input_len: usize, rendered: usize, overflowed: bool) -> BlockVerdict {
        if overflowed {
            BlockVerdict::LiteralCapExceeded
        } else if rendered >= input_len {
            BlockVerdict::Incompressible
        } else {
            BlockVerdict::Compressed
        }
    }

    /// Compress one block into `output`.
    ///
    /// At most `input.len()` bytes are appended: once the rendering stops
    /// shrinking the data there is no point materializing the rest, though
    /// the token stream is still consumed to completion so the verdict is
    /// based on the true rendered size.
    pub fn compress_block(&self, input: &[u8], output: &mut Vec<u8>) -> BlockVerdict {
        let (seqs, overflowed) = self.divide(input);
        let mut rendered = 0usize;
        for byte in Lz4Serializer::new(seqs.into_iter()) {
            if rendered < input.len() {
                output.push(byte);
            }
            rendered += 1;
        }
        self.verdict(input.len(), rendered, overflowed)
    }

    /// Compress one block straight into a writer. Same truncation rule as
    /// [`compress_block`](Pipeline::compress_block).
    #[throws(io::Error)]
    pub fn write_block<W: Write>(&self, input: &[u8], mut writer: W) -> BlockVerdict {
        let (seqs, overflowed) = self.divide(input);
        let mut rendered = 0usize;
        for byte in Lz4Serializer::new(seqs.into_iter()) {
            if rendered < input.len() {
                writer.write_u8(byte)?;
            }
            rendered += 1;
        }
        self.verdict(input.len(), rendered, overflowed)
    }
}
