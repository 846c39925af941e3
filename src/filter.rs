//! Overlap resolution between competing match proposals.
//!
//! The match finder judges every position in isolation, so a short match is
//! often immediately followed by a longer one covering the same bytes.
//! Keeping the short match would cut the longer one off. This stage looks a
//! full window ahead and demotes any match that a later, longer match
//! overlaps, which leaves the locally longest proposal standing.

use std::collections::VecDeque;

use crate::matcher::Candidate;

/// Iterator adaptor that drops matches subsumed by a longer overlapping
/// match starting within the look-ahead window. Emits exactly one candidate
/// per input candidate, in order.
pub struct BestMatchFilter<I> {
    inner: I,
    window: VecDeque<Candidate>,
    lookahead: usize,
    done: bool,
}

impl<I> BestMatchFilter<I> {
    pub(crate) fn new(inner: I, lookahead: usize) -> Self {
        BestMatchFilter {
            inner,
            window: VecDeque::with_capacity(lookahead),
            lookahead,
            done: false,
        }
    }
}

impl<I: Iterator<Item = Candidate>> Iterator for BestMatchFilter<I> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        while !self.done && self.window.len() < self.lookahead {
            match self.inner.next() {
                Some(c) => self.window.push_back(c),
                None => self.done = true,
            }
        }

        let mut c = self.window.pop_front()?;
        if !c.is_literal() {
            // A match j positions ahead that is longer than ours plus the
            // head start overlaps us and ends later. Ours has to go.
            for (j, later) in self.window.iter().enumerate() {
                if (c.len as usize) + j + 1 < later.len as usize {
                    c = Candidate::literal(c.byte);
                    break;
                }
            }
        }
        Some(c)
    }
}
