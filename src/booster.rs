//! Greedy match extension against recent history.
//!
//! The match finder can only report matches as long as its hash window, so
//! a long repeat comes out of it as a chain of stubby window-sized matches.
//! This stage keeps the last few kilobytes of the byte stream in a circular
//! buffer and grows an accepted match byte by byte against it, as far as
//! the match cap allows. Positions swallowed by a grown match are consumed
//! here and never reach the divider, which is what makes the downstream
//! byte accounting work out.
//!
//! Only matches whose source still sits inside the history buffer can be
//! grown. A match pointing further back is passed through untouched, and
//! the positions it covers are consumed unseen.
//!
//! The final stretch of the block (the same tail the finder leaves
//! unmatched) is forwarded verbatim, so a block always ends in plain
//! literals rather than a match that ran into the end of the input.

use crate::matcher::Candidate;

/// Iterator adaptor that lengthens window-local matches to their true
/// maximal length. The output stream carries one item per literal plus one
/// per accepted match, which is strictly shorter than the input stream
/// whenever any match exists.
pub struct MatchBooster<I> {
    inner: I,
    history: Vec<u8>,
    mask: usize,
    window: usize,
    max_match_len: usize,
    /// Positions before this are fair game for extension; everything from
    /// here on is tail and passes through untouched.
    main_len: usize,
    /// Absolute input position of the next candidate to consume.
    pos: usize,
    /// Match currently being grown, if any. Its `len` is re-derived from
    /// history one byte at a time, so it always reaches at least the
    /// length the match finder proposed.
    pending: Option<Candidate>,
    /// History position the next extension byte has to equal.
    match_loc: usize,
    /// Covered positions left to consume for a match that cannot grow.
    skip: usize,
    /// Candidate displaced by a close-out, emitted on the following pull.
    ready: Option<Candidate>,
}

impl<I> MatchBooster<I> {
    pub(crate) fn new(inner: I, window: usize, max_match_len: usize, main_len: usize) -> Self {
        MatchBooster {
            inner,
            history: vec![0; window],
            mask: window - 1,
            window,
            max_match_len,
            main_len,
            pos: 0,
            pending: None,
            match_loc: 0,
            skip: 0,
            ready: None,
        }
    }

    /// Route a candidate that is not extending anything. Literals are
    /// emitted as-is. A match starts the tracker only when its source is
    /// inside the history window and its re-walk completes before the
    /// tail; otherwise it is emitted untouched and the positions it covers
    /// are consumed through the skip counter.
    fn admit(&mut self, cand: Candidate, i: usize) -> Option<Candidate> {
        if cand.is_literal() {
            return Some(cand);
        }
        if (cand.offset as usize) < self.window && i + cand.len as usize <= self.main_len {
            self.pending = Some(Candidate { len: 1, ..cand });
            self.match_loc = i - cand.offset as usize;
            return None;
        }
        self.skip = cand.len as usize - 1;
        Some(cand)
    }
}

impl<I: Iterator<Item = Candidate>> Iterator for MatchBooster<I> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        if let Some(c) = self.ready.take() {
            return Some(c);
        }
        loop {
            // Tail phase: flush whatever was still growing, then forward
            // the rest of the stream untouched.
            if self.pos >= self.main_len && self.skip == 0 {
                if let Some(p) = self.pending.take() {
                    return Some(p);
                }
                let c = self.inner.next()?;
                self.pos += 1;
                return Some(c);
            }

            let cand = match self.inner.next() {
                Some(c) => c,
                // A match can still be growing when the input ends.
                None => return self.pending.take(),
            };
            let i = self.pos;
            self.pos += 1;

            // Read before write: when the match distance equals the window
            // size, both land on the same cell.
            let history_byte = self.history[self.match_loc & self.mask];
            self.history[i & self.mask] = cand.byte;

            if self.skip > 0 {
                self.skip -= 1;
                continue;
            }

            if let Some(pending) = self.pending.as_mut() {
                if (pending.len as usize) < self.max_match_len && cand.byte == history_byte {
                    pending.len += 1;
                    self.match_loc += 1;
                    continue;
                }
                let closed = self.pending.take();
                self.ready = self.admit(cand, i);
                return closed;
            }

            if let Some(out) = self.admit(cand, i) {
                return Some(out);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn boost(cands: Vec<Candidate>, window: usize, cap: usize, main_len: usize) -> Vec<Candidate> {
        MatchBooster::new(cands.into_iter(), window, cap, main_len).collect()
    }

    fn m(byte: u8, len: u8, offset: u32) -> Candidate {
        Candidate { byte, len, offset }
    }

    fn lits(bytes: &[u8]) -> Vec<Candidate> {
        bytes.iter().map(|&b| Candidate::literal(b)).collect()
    }

    #[test]
    fn run_grows_to_the_end_of_input() {
        // Ten 'a' bytes; the finder reported a 4-byte match at position 2.
        let mut cands = lits(b"aa");
        cands.push(m(b'a', 4, 1));
        cands.extend(lits(b"aaaaaaa"));
        let out = boost(cands, 64, 255, 10);
        assert_eq!(
            out,
            vec![Candidate::literal(b'a'), Candidate::literal(b'a'), m(b'a', 8, 1)]
        );
    }

    #[test]
    fn match_cap_splits_long_runs() {
        let mut cands = lits(b"aa");
        cands.push(m(b'a', 4, 1));
        cands.extend(lits(b"aaaaaaa"));
        let out = boost(cands, 64, 6, 10);
        // The tracker stops at 6 and the two leftover bytes fall out as
        // the literals they were.
        assert_eq!(
            out,
            vec![
                Candidate::literal(b'a'),
                Candidate::literal(b'a'),
                m(b'a', 6, 1),
                Candidate::literal(b'a'),
                Candidate::literal(b'a'),
            ]
        );
    }

    #[test]
    fn far_matches_pass_through_with_their_cover() {
        let mut cands = lits(b"q");
        cands.push(m(b'r', 4, 9999));
        cands.extend(lits(b"xyzw"));
        // Window of 16: offset 9999 cannot be grown.
        let out = boost(cands, 16, 255, 6);
        assert_eq!(
            out,
            vec![Candidate::literal(b'q'), m(b'r', 4, 9999), Candidate::literal(b'w')]
        );
    }

    #[test]
    fn literal_stream_is_untouched() {
        let cands = lits(b"no repeats");
        assert_eq!(boost(cands.clone(), 64, 255, 10), cands);
    }

    #[test]
    fn growth_stops_where_the_repeat_stops() {
        // "XYZWXYZWXQ": the finder reports a window-sized match of 4 at
        // position 4, but the real repeat is 5 bytes long.
        let mut cands = lits(b"XYZW");
        cands.push(m(b'X', 4, 3));
        cands.extend(lits(b"YZWXQ"));
        let out = boost(cands, 64, 255, 10);
        assert_eq!(
            out,
            vec![
                Candidate::literal(b'X'),
                Candidate::literal(b'Y'),
                Candidate::literal(b'Z'),
                Candidate::literal(b'W'),
                m(b'X', 5, 3),
                Candidate::literal(b'Q'),
            ]
        );
    }

    #[test]
    fn growth_is_flushed_at_the_tail_boundary() {
        // All 'a': the match at 2 may only grow while the re-walk stays
        // inside the first six positions.
        let mut cands = lits(b"aa");
        cands.push(m(b'a', 4, 1));
        cands.extend(lits(b"aaaaaaa"));
        let out = boost(cands, 64, 255, 6);
        assert_eq!(
            out,
            vec![
                Candidate::literal(b'a'),
                Candidate::literal(b'a'),
                m(b'a', 4, 1),
                Candidate::literal(b'a'),
                Candidate::literal(b'a'),
                Candidate::literal(b'a'),
                Candidate::literal(b'a'),
            ]
        );
    }

    #[test]
    fn match_that_would_cross_the_boundary_is_not_grown() {
        let mut cands = lits(b"bbbb");
        cands.push(m(b'b', 4, 1));
        cands.extend(lits(b"bbbbb"));
        // Re-walk of a match at 4 would end at 8, past the boundary at 6,
        // so it goes out verbatim and its cover is skipped.
        let out = boost(cands, 64, 255, 6);
        assert_eq!(
            out,
            vec![
                Candidate::literal(b'b'),
                Candidate::literal(b'b'),
                Candidate::literal(b'b'),
                Candidate::literal(b'b'),
                m(b'b', 4, 1),
                Candidate::literal(b'b'),
                Candidate::literal(b'b'),
            ]
        );
    }
}
