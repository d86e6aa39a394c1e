//! # Short-String Dictionary Compression
//!
//! Compressor for the optional compressed block payload format, compatible
//! with the SMAZ scheme: a fixed codebook of 254 common English substrings
//! plus two escape codes for bytes the codebook cannot express.
//!
//! ## Encoding
//!
//! Output bytes `0..=253` name a codebook entry. Byte `254` is followed by
//! one verbatim byte; byte `255` is followed by a length byte `L` and then
//! `L + 1` verbatim bytes. The compressor is greedy: at each position it
//! takes the longest codebook entry that matches (entries are at most 7
//! bytes), and batches everything unmatched into verbatim runs.
//!
//! JSON punctuation and digits are mostly absent from the codebook, so
//! compression pays off on records with English-ish string content and
//! roughly breaks even otherwise. The block codec only cares that
//! `decompress(compress(x)) == x`.

use hashbrown::HashMap;
use std::sync::OnceLock;

use eyre::{bail, Result};

/// The 254-entry SMAZ codebook. Index is the wire code.
pub const CODEBOOK: [&str; 254] = [
    " ", "the", "e", "t", "a", "of", "o", "and", "i", "n", "s", "e ", "r", " th", " t", "in",
    "he", "th", "h", "he ", "to", "\r\n", "l", "s ", "d", " a", "an", "er", "c", " o", "d ", "on",
    " of", "re", "of ", "t ", ", ", "is", "u", "at", "   ", "n ", "or", "which", "f", "m", "as",
    "it", "that", "\n", "was", "en", "  ", " w", "es", " an", " i", "\r", "f ", "g", "p", "nd",
    " s", "nd ", "ed ", "w", "ed", "http://", "for", "te", "ing", "y ", "The", " c", "ti", "r ",
    "his", "st", " in", "ar", "nt", ",", " to", "y", "ng", " h", "with", "le", "al", "to ", "b",
    "ou", "be", "were", " b", "se", "o ", "ent", "ha", "ng ", "their", "\"", "hi", "from", " f",
    "in ", "de", "ion", "me", "v", ".", "ve", "all", "re ", "ri", "ro", "is ", "co", "f t", "are",
    "ea", ". ", "her", " m", "er ", " p", "es ", "by", "they", "di", "ra", "ic", "not", "s, ",
    "d t", "at ", "ce", "la", "h ", "ne", "as ", "tio", "on ", "n t", "io", "we", " a ", "om",
    ", a", "s o", "ur", "li", "ll", "ch", "had", "this", "e t", "g ", "e\r\n", " wh", "ere",
    " co", "e o", "a ", "us", " d", "ss", "\n\r\n", "\r\n\r", "=\"", " be", " e", "s a", "ma",
    "one", "t t", "or ", "but", "el", "so", "l ", "e s", "s,", "no", "ter", " wa", "iv", "ho",
    "e a", " r", "hat", "s t", "ns", "ch ", "wh", "tr", "ut", "/", "have", "ly ", "ta", " ha",
    " on", "tha", "-", " l", "ati", "en ", "pe", " re", "there", "ass", "si", " fo", "wa", "ec",
    "our", "who", "its", "z", "fo", "rs", ">", "ot", "un", "<", "im", "th ", "nc", "ate", "><",
    "ver", "ad", " we", "ly", "ee", " n", "id", " cl", "ac", "il", "</", "rt", " wi", "div",
    "e, ", " it", "whi", " ma", "ge", "x", "e c", "men", ".com",
];

const ESCAPE_ONE: u8 = 254;
const ESCAPE_RUN: u8 = 255;
const MAX_ENTRY_LEN: usize = 7;
const MAX_RUN_LEN: usize = 256;

fn code_map() -> &'static HashMap<&'static [u8], u8> {
    static MAP: OnceLock<HashMap<&'static [u8], u8>> = OnceLock::new();
    MAP.get_or_init(|| {
        CODEBOOK
            .iter()
            .enumerate()
            .map(|(code, entry)| (entry.as_bytes(), code as u8))
            .collect()
    })
}

/// Compresses `input`, returning the wire form.
pub fn compress(input: &[u8]) -> Vec<u8> {
    let map = code_map();
    let mut out = Vec::with_capacity(input.len());
    let mut verbatim: Vec<u8> = Vec::new();
    let mut pos = 0;

    while pos < input.len() {
        let longest = input.len() - pos;
        let mut matched = None;
        for len in (1..=MAX_ENTRY_LEN.min(longest)).rev() {
            if let Some(&code) = map.get(&input[pos..pos + len]) {
                matched = Some((code, len));
                break;
            }
        }
        match matched {
            Some((code, len)) => {
                flush_verbatim(&mut out, &mut verbatim);
                out.push(code);
                pos += len;
            }
            None => {
                verbatim.push(input[pos]);
                if verbatim.len() == MAX_RUN_LEN {
                    flush_verbatim(&mut out, &mut verbatim);
                }
                pos += 1;
            }
        }
    }
    flush_verbatim(&mut out, &mut verbatim);
    out
}

fn flush_verbatim(out: &mut Vec<u8>, verbatim: &mut Vec<u8>) {
    match verbatim.len() {
        0 => {}
        1 => {
            out.push(ESCAPE_ONE);
            out.push(verbatim[0]);
        }
        n => {
            out.push(ESCAPE_RUN);
            out.push((n - 1) as u8);
            out.extend_from_slice(verbatim);
        }
    }
    verbatim.clear();
}

/// Decompresses a wire form produced by [`compress`].
pub fn decompress(input: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len() * 2);
    let mut pos = 0;
    while pos < input.len() {
        match input[pos] {
            ESCAPE_ONE => {
                let Some(&byte) = input.get(pos + 1) else {
                    bail!("truncated single-byte escape at offset {}", pos);
                };
                out.push(byte);
                pos += 2;
            }
            ESCAPE_RUN => {
                let Some(&len_byte) = input.get(pos + 1) else {
                    bail!("truncated run escape at offset {}", pos);
                };
                let len = len_byte as usize + 1;
                let start = pos + 2;
                if start + len > input.len() {
                    bail!("run escape past end of input at offset {}", pos);
                }
                out.extend_from_slice(&input[start..start + len]);
                pos = start + len;
            }
            code => {
                out.extend_from_slice(CODEBOOK[code as usize].as_bytes());
                pos += 1;
            }
        }
    }
    Ok(out)
}
