//! Share links: reversible text tokens naming a folder.
//!
//! A link is `<id>:<name>` where each half is a numeral over the display
//! alphabet (the decimal id text, or the name padded to [`MAX_NAME_LEN`])
//! re-expressed over the smaller transport alphabet. Base conversion is done
//! on arbitrary-precision integers since a 50-digit base-162 numeral is far
//! beyond any machine word.

use crate::error::{Error, Result};
use crate::vertex::FolderId;
use num_bigint::BigUint;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Fixed display width of a folder name, in characters.
pub const MAX_NAME_LEN: usize = 50;

/// Decimal digits of the largest id a link can carry (`u64::MAX`).
const MAX_ID_DIGITS: usize = 20;

/// Characters folder names may be written in. Index 0 (space) is the zero
/// digit and the padding character.
pub const DISPLAY_ALPHABET: &str = concat!(
    " !?@#$%&№()[/]{\\}<|>^_\"'`*+-=~.,:;",
    "0123456789",
    "ABCDEFGHIJKLMNOPQRSTUVWXYZ",
    "abcdefghijklmnopqrstuvwxyz",
    "АБВГДЕЁЖЗИЙКЛМНОПРСТУФХЦЧШЩЪЫЬЭЮЯ",
    "абвгдеёжзийклмнопрстуфхцчшщъыьэюя",
);

/// Characters a link is written in.
pub const TRANSPORT_ALPHABET: &str = concat!(
    "@$%&",
    "0123456789",
    "ABCDEFGHIJKLMNOPQRSTUVWXYZ",
    "abcdefghijklmnopqrstuvwxyz",
);

struct Alphabet {
    chars: Vec<char>,
    index: HashMap<char, u8>,
}

impl Alphabet {
    fn new(text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let index = chars
            .iter()
            .enumerate()
            .map(|(i, &c)| (c, i as u8))
            .collect();
        Self { chars, index }
    }

    fn radix(&self) -> u32 {
        self.chars.len() as u32
    }

    /// Digit values of `text`, or the first character outside the alphabet.
    fn digits(&self, text: &str) -> std::result::Result<Vec<u8>, char> {
        text.chars()
            .map(|c| self.index.get(&c).copied().ok_or(c))
            .collect()
    }

    fn render(&self, digits: &[u8]) -> String {
        digits.iter().map(|&d| self.chars[d as usize]).collect()
    }
}

static DISPLAY: LazyLock<Alphabet> = LazyLock::new(|| Alphabet::new(DISPLAY_ALPHABET));
static TRANSPORT: LazyLock<Alphabet> = LazyLock::new(|| Alphabet::new(TRANSPORT_ALPHABET));

/// Longest transport segment an id can encode to.
pub static ID_SEGMENT_MAX: LazyLock<usize> = LazyLock::new(|| max_segment_len(MAX_ID_DIGITS));

/// Longest transport segment a padded name can encode to.
pub static NAME_SEGMENT_MAX: LazyLock<usize> = LazyLock::new(|| max_segment_len(MAX_NAME_LEN));

/// Transport length of the largest display numeral with `digits` digits.
fn max_segment_len(digits: usize) -> usize {
    let largest = BigUint::from(DISPLAY.radix()).pow(digits as u32) - 1u32;
    largest.to_radix_be(TRANSPORT.radix()).len()
}

/// Re-express a big-endian numeral in another alphabet's base.
///
/// The result has no leading zero digits, except that zero is `[0]`.
fn rebase(digits: &[u8], from: &Alphabet, to: &Alphabet) -> Result<Vec<u8>> {
    let number = BigUint::from_radix_be(digits, from.radix())
        .ok_or_else(|| Error::invalid_link("digit out of range"))?;
    Ok(number.to_radix_be(to.radix()))
}

/// Whether `ch` can appear in a linkable folder name.
pub fn is_display_char(ch: char) -> bool {
    DISPLAY.index.contains_key(&ch)
}

/// Fail with `UnsupportedCharacter` on the first character of `name` outside
/// [`DISPLAY_ALPHABET`].
pub fn check_display(name: &str) -> Result<()> {
    match name.chars().find(|&ch| !is_display_char(ch)) {
        Some(ch) => Err(Error::UnsupportedCharacter { ch }),
        None => Ok(()),
    }
}

/// Build the share link for a folder.
///
/// Fails with `NameTooLong` when the name is wider than [`MAX_NAME_LEN`] and
/// `UnsupportedCharacter` when it uses a character outside
/// [`DISPLAY_ALPHABET`].
pub fn encode(id: FolderId, name: &str) -> Result<String> {
    let len = name.chars().count();
    if len > MAX_NAME_LEN {
        return Err(Error::name_too_long(len, MAX_NAME_LEN));
    }
    if id.0 < 0 {
        return Err(Error::invalid_reference(format!("negative folder id {}", id)));
    }

    let padded = format!("{:<width$}", name, width = MAX_NAME_LEN);
    let name_digits = DISPLAY
        .digits(&padded)
        .map_err(|ch| Error::UnsupportedCharacter { ch })?;
    let id_digits = DISPLAY
        .digits(&id.0.to_string())
        .map_err(|ch| Error::UnsupportedCharacter { ch })?;

    let id_part = TRANSPORT.render(&rebase(&id_digits, &DISPLAY, &TRANSPORT)?);
    let name_part = TRANSPORT.render(&rebase(&name_digits, &DISPLAY, &TRANSPORT)?);

    Ok(format!("{}:{}", id_part, name_part))
}

/// Split a link and check each half's length and alphabet.
fn split_segments(token: &str) -> Result<(Vec<u8>, Vec<u8>)> {
    let (id_part, name_part) = token
        .split_once(':')
        .ok_or_else(|| Error::invalid_link("missing ':' separator"))?;

    let id_len = id_part.chars().count();
    if id_len == 0 || id_len > *ID_SEGMENT_MAX {
        return Err(Error::invalid_link(format!(
            "id segment has {} characters (expected 1..={})",
            id_len, *ID_SEGMENT_MAX
        )));
    }

    let name_len = name_part.chars().count();
    if name_len == 0 || name_len > *NAME_SEGMENT_MAX {
        return Err(Error::invalid_link(format!(
            "name segment has {} characters (expected 1..={})",
            name_len, *NAME_SEGMENT_MAX
        )));
    }

    let unexpected = |ch: char| Error::invalid_link(format!("unexpected character {:?}", ch));
    let id_digits = TRANSPORT.digits(id_part).map_err(unexpected)?;
    let name_digits = TRANSPORT.digits(name_part).map_err(unexpected)?;

    Ok((id_digits, name_digits))
}

/// Whether `text` has the shape of a share link.
///
/// Only lengths and characters are checked; the link may still fail to
/// [`decode`].
pub fn looks_like_link(text: &str) -> bool {
    split_segments(text).is_ok()
}

/// Recover the folder id and name from a share link.
///
/// Trailing padding is trimmed from the name, so names ending in spaces come
/// back without them.
pub fn decode(token: &str) -> Result<(FolderId, String)> {
    let (id_digits, name_digits) = split_segments(token)?;

    let id_text = DISPLAY.render(&rebase(&id_digits, &TRANSPORT, &DISPLAY)?);
    let id = match id_text.parse::<i64>() {
        Ok(id) if id >= 0 && id.to_string() == id_text => FolderId(id),
        _ => return Err(Error::invalid_link("id segment is not a folder id")),
    };

    let mut digits = rebase(&name_digits, &TRANSPORT, &DISPLAY)?;
    if digits.len() > MAX_NAME_LEN {
        return Err(Error::invalid_link("name segment is too wide"));
    }
    let mut padded = vec![0u8; MAX_NAME_LEN - digits.len()];
    padded.append(&mut digits);

    let name = DISPLAY.render(&padded).trim_end_matches(' ').to_string();
    Ok((id, name))
}
