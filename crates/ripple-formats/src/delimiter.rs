//! Record boundary tokens

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

/// Where a delimiter token sits relative to the record it bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelimiterPosition {
    /// Token prefixes every record (`>` in FASTA)
    Start,
    /// Token separates records and belongs to neither
    Inbetween,
    /// Token terminates every record (`</spectrum>` in mzML)
    End,
}

/// A boundary token plus its position.
///
/// A line-anchored delimiter only matches at the beginning of a line, so a
/// `>` inside a FASTA description is not mistaken for a record start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiter {
    token: &'static [u8],
    position: DelimiterPosition,
    line_anchored: bool,
}

impl Delimiter {
    pub const fn new(token: &'static [u8], position: DelimiterPosition) -> Self {
        Self {
            token,
            position,
            line_anchored: false,
        }
    }

    #[must_use]
    pub const fn line_anchored(self) -> Self {
        Self {
            line_anchored: true,
            ..self
        }
    }

    pub fn token(&self) -> &'static [u8] {
        self.token
    }

    pub fn position(&self) -> DelimiterPosition {
        self.position
    }

    pub fn is_line_anchored(&self) -> bool {
        self.line_anchored
    }

    /// Non-overlapping token occurrences, scanning left to right.
    ///
    /// `at_line_start` tells an anchored delimiter whether `data[0]` begins a line.
    pub fn occurrences(&self, data: &[u8], at_line_start: bool) -> Vec<usize> {
        let tok = self.token.len();
        let mut found = Vec::new();
        if tok == 0 {
            return found;
        }
        let mut i = 0;
        while i + tok <= data.len() {
            let Some(skip) = data[i..].iter().position(|&b| b == self.token[0]) else {
                break;
            };
            i += skip;
            if i + tok > data.len() {
                break;
            }
            let anchored = !self.line_anchored
                || if i == 0 {
                    at_line_start
                } else {
                    data[i - 1] == b'\n'
                };
            if anchored && &data[i..i + tok] == self.token {
                found.push(i);
                i += tok;
            } else {
                i += 1;
            }
        }
        found
    }

    /// Offset where a carried remainder should begin, if `data` holds at
    /// least one complete record boundary.
    ///
    /// For `inbetween` and `end` tokens this is just past the last token. For
    /// `start` tokens it is the last token start other than offset zero.
    pub fn last_boundary(&self, data: &[u8]) -> Option<usize> {
        let occurrences = self.occurrences(data, true);
        match self.position {
            DelimiterPosition::Inbetween | DelimiterPosition::End => {
                occurrences.last().map(|o| o + self.token.len())
            }
            DelimiterPosition::Start => occurrences.into_iter().rev().find(|&o| o > 0),
        }
    }

    /// Split content into records, dropping whitespace-only pieces.
    ///
    /// `start` and `end` records keep their token; `inbetween` records do not.
    pub fn split(&self, content: &Bytes) -> Vec<Bytes> {
        let tok = self.token.len();
        let occurrences = self.occurrences(content, true);
        let mut records = Vec::with_capacity(occurrences.len() + 1);

        match self.position {
            DelimiterPosition::Inbetween => {
                let mut prev = 0;
                for o in occurrences {
                    push_unless_blank(&mut records, content.slice(prev..o), 0);
                    prev = o + tok;
                }
                push_unless_blank(&mut records, content.slice(prev..), 0);
            }
            DelimiterPosition::End => {
                let mut prev = 0;
                for o in occurrences {
                    let record = content.slice(prev..o + tok);
                    if !is_blank(&record[..record.len() - tok]) {
                        records.push(record);
                    }
                    prev = o + tok;
                }
                // Unterminated tail, e.g. a final flush without a trailing token
                push_unless_blank(&mut records, content.slice(prev..), 0);
            }
            DelimiterPosition::Start => {
                let first = occurrences.first().copied().unwrap_or(content.len());
                push_unless_blank(&mut records, content.slice(..first), 0);
                for (i, &o) in occurrences.iter().enumerate() {
                    let next = occurrences.get(i + 1).copied().unwrap_or(content.len());
                    push_unless_blank(&mut records, content.slice(o..next), tok);
                }
            }
        }
        records
    }

    /// Inverse of [`split`](Self::split) for content made of whole records.
    pub fn join(&self, records: &[Bytes]) -> Bytes {
        let tok = self.token.len();
        let total: usize = records.iter().map(Bytes::len).sum::<usize>()
            + records.len().saturating_sub(1) * tok;
        let mut out = BytesMut::with_capacity(total);
        for (i, record) in records.iter().enumerate() {
            if i > 0 && self.position == DelimiterPosition::Inbetween {
                out.extend_from_slice(self.token);
            }
            out.extend_from_slice(record);
        }
        out.freeze()
    }
}

fn is_blank(data: &[u8]) -> bool {
    data.iter().all(u8::is_ascii_whitespace)
}

fn push_unless_blank(records: &mut Vec<Bytes>, piece: Bytes, skip: usize) {
    if !is_blank(&piece[skip.min(piece.len())..]) {
        records.push(piece);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const NEW_LINE: Delimiter = Delimiter::new(b"\n", DelimiterPosition::Inbetween);
    const FASTA: Delimiter = Delimiter::new(b">", DelimiterPosition::Start).line_anchored();
    const SPECTRUM: Delimiter = Delimiter::new(b"</s>\n", DelimiterPosition::End);

    fn strings(records: &[Bytes]) -> Vec<&str> {
        records
            .iter()
            .map(|r| std::str::from_utf8(r).unwrap())
            .collect()
    }

    #[test]
    fn test_inbetween_split_and_join() {
        let content = Bytes::from_static(b"a b\n\nc d\n  \ne f\n");
        let records = NEW_LINE.split(&content);
        assert_eq!(strings(&records), vec!["a b", "c d", "e f"]);
        assert_eq!(NEW_LINE.join(&records), Bytes::from_static(b"a b\nc d\ne f"));
    }

    #[test]
    fn test_start_split_keeps_token() {
        let content = Bytes::from_static(b">one x>y\nAC\n>two\nGT\n");
        let records = FASTA.split(&content);
        assert_eq!(strings(&records), vec![">one x>y\nAC\n", ">two\nGT\n"]);
        assert_eq!(FASTA.join(&records), content);
    }

    #[test]
    fn test_end_split_keeps_token() {
        let content = Bytes::from_static(b"  <s>1</s>\n  <s>2</s>\n  ");
        let records = SPECTRUM.split(&content);
        assert_eq!(strings(&records), vec!["  <s>1</s>\n", "  <s>2</s>\n"]);
    }

    #[test]
    fn test_anchored_occurrences() {
        let data = b"x>y\n>z";
        assert_eq!(FASTA.occurrences(data, true), vec![4]);
        assert_eq!(FASTA.occurrences(b">a", false), Vec::<usize>::new());
        assert_eq!(FASTA.occurrences(b">a", true), vec![0]);
    }

    #[test]
    fn test_last_boundary() {
        assert_eq!(NEW_LINE.last_boundary(b"ab\ncd\nef"), Some(6));
        assert_eq!(NEW_LINE.last_boundary(b"abcdef"), None);
        assert_eq!(FASTA.last_boundary(b">a\nAC\n>b\nG"), Some(6));
        assert_eq!(FASTA.last_boundary(b">a\nACGT"), None);
    }
}
