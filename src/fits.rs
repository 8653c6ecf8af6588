//! Minimal FITS primary-header reader/writer.
//!
//! The tagging pipeline needs very little from the file format: check
//! whether a header keyword is present, append keyword/value cards and
//! HISTORY lines, and write the file back in place without touching the
//! data payload. This module implements exactly that subset of the FITS
//! standard: 80-byte ASCII cards packed into 2880-byte blocks, a `SIMPLE`
//! card first and an `END` card last, with everything after the final
//! header block treated as opaque payload bytes.
//!
//! Appending cards can grow the header past a block boundary; `save`
//! re-pads the header and rewrites the whole file, so the payload offset
//! is always consistent with the card count.

use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

const CARD_LEN: usize = 80;
const BLOCK_LEN: usize = 2880;

/// Longest string value that fits in one card: 80 bytes minus the 8-byte
/// keyword, "= ", and the two quotes.
const MAX_STRING_LEN: usize = CARD_LEN - 12;

/// Text capacity of one HISTORY card after the 8-byte keyword field.
const HISTORY_LEN: usize = CARD_LEN - 8;

/// Errors from reading or parsing a FITS file.
#[derive(Error, Debug)]
pub enum FitsError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("{0}")]
    Malformed(String),
}

/// An open FITS file: parsed header cards plus the raw data payload.
#[derive(Debug, Clone)]
pub struct FitsFile {
    /// Header cards in file order, excluding the END card.
    cards: Vec<String>,
    /// Everything after the header blocks, kept byte-for-byte.
    data: Vec<u8>,
}

impl Default for FitsFile {
    fn default() -> Self {
        Self::new()
    }
}

impl FitsFile {
    /// Creates an empty file with a minimal primary header and no data.
    ///
    /// Useful for generating placeholder frames and test fixtures.
    pub fn new() -> Self {
        let cards = vec![
            pad_card("SIMPLE  =                    T / conforms to FITS standard".to_string()),
            pad_card("BITPIX  =                   16 / bits per data pixel".to_string()),
            pad_card("NAXIS   =                    0 / number of data axes".to_string()),
        ];
        Self {
            cards,
            data: Vec::new(),
        }
    }

    /// Reads and parses a FITS file from disk.
    pub fn open(path: &Path) -> Result<Self, FitsError> {
        let bytes = fs::read(path)?;
        let mut cards = Vec::new();
        let mut offset = 0;
        loop {
            if offset + CARD_LEN > bytes.len() {
                return Err(FitsError::Malformed("no END card in header".to_string()));
            }
            let chunk = &bytes[offset..offset + CARD_LEN];
            if !chunk.is_ascii() {
                return Err(FitsError::Malformed(format!(
                    "non-ASCII header bytes at offset {offset}"
                )));
            }
            let card = String::from_utf8_lossy(chunk).into_owned();
            offset += CARD_LEN;
            if card_keyword(&card) == "END" {
                break;
            }
            cards.push(card);
        }
        if cards.first().map(|c| card_keyword(c)) != Some("SIMPLE") {
            return Err(FitsError::Malformed("missing SIMPLE card".to_string()));
        }
        // Header occupies whole 2880-byte blocks; the payload starts at the
        // next block boundary after END.
        let header_len = offset.div_ceil(BLOCK_LEN) * BLOCK_LEN;
        let data = bytes.get(header_len..).unwrap_or(&[]).to_vec();
        Ok(Self { cards, data })
    }

    /// True if the header contains a card with this keyword.
    pub fn contains_key(&self, keyword: &str) -> bool {
        let key = normalize_keyword(keyword);
        self.cards.iter().any(|c| card_keyword(c) == key)
    }

    /// Returns the parsed value of the first card with this keyword.
    ///
    /// Quoted string values are unquoted and trailing padding is stripped;
    /// other values are returned as their raw text.
    pub fn value_of(&self, keyword: &str) -> Option<String> {
        let key = normalize_keyword(keyword);
        let card = self.cards.iter().find(|c| card_keyword(c) == key)?;
        if card.len() < 10 || &card[8..10] != "= " {
            return None;
        }
        let field = card[10..].trim();
        if let Some(rest) = field.strip_prefix('\'') {
            // String value; a doubled quote escapes a literal quote.
            let mut out = String::new();
            let mut chars = rest.chars().peekable();
            while let Some(ch) = chars.next() {
                if ch == '\'' {
                    if chars.peek() == Some(&'\'') {
                        chars.next();
                        out.push('\'');
                    } else {
                        break;
                    }
                } else {
                    out.push(ch);
                }
            }
            Some(out.trim_end().to_string())
        } else {
            let end = field.find(" /").unwrap_or(field.len());
            Some(field[..end].trim().to_string())
        }
    }

    /// Appends a string-valued card (`KEYWORD = 'value'`).
    ///
    /// The value is clamped so the closing quote always lands inside the
    /// 80-byte card; over-long operator text is cut, never left as an
    /// unterminated string that downstream FITS readers would reject.
    pub fn append_string(&mut self, keyword: &str, value: &str, comment: Option<&str>) {
        let mut escaped = to_ascii(value).replace('\'', "''");
        if escaped.len() > MAX_STRING_LEN {
            escaped.truncate(MAX_STRING_LEN);
            // Never cut an escaped quote pair in half: an odd run of
            // trailing quotes would swallow the closing quote.
            if escaped.chars().rev().take_while(|&c| c == '\'').count() % 2 == 1 {
                escaped.pop();
            }
        }
        let quoted = format!("'{escaped:<8}'");
        let mut card = format!("{:<8}= {quoted:<20}", normalize_keyword(keyword));
        if let Some(c) = comment {
            card.push_str(" / ");
            card.push_str(&to_ascii(c));
        }
        self.cards.push(pad_card(card));
    }

    /// Appends free-text HISTORY, split across as many cards as it needs.
    pub fn append_history(&mut self, text: &str) {
        let ascii = to_ascii(text);
        let mut rest = ascii.as_str();
        loop {
            let (chunk, tail) = rest.split_at(rest.len().min(HISTORY_LEN));
            self.cards.push(pad_card(format!("HISTORY {chunk}")));
            if tail.is_empty() {
                break;
            }
            rest = tail;
        }
    }

    /// Writes the file back to disk, header re-padded to block boundaries
    /// and the data payload untouched.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let mut header = String::with_capacity((self.cards.len() + 1) * CARD_LEN);
        for card in &self.cards {
            header.push_str(card);
        }
        header.push_str(&pad_card("END".to_string()));
        while header.len() % BLOCK_LEN != 0 {
            header.push(' ');
        }
        let mut bytes = header.into_bytes();
        bytes.extend_from_slice(&self.data);
        fs::write(path, bytes)
    }
}

/// Keyword field of a card: the first 8 bytes, space-trimmed.
fn card_keyword(card: &str) -> &str {
    card.get(..8).unwrap_or(card).trim_end()
}

fn normalize_keyword(keyword: &str) -> String {
    let upper = to_ascii(keyword).to_ascii_uppercase();
    upper.chars().take(8).collect()
}

fn to_ascii(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii() { c } else { '?' })
        .collect()
}

fn pad_card(mut card: String) -> String {
    card.truncate(CARD_LEN);
    while card.len() < CARD_LEN {
        card.push(' ');
    }
    card
}
