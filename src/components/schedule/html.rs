//! Markup flattening: turns the schedule page into trimmed text lines.
//!
//! The page is scanned with a handful of tolerant patterns rather than a full
//! DOM; block-level tags become line breaks and table cells become wide gaps so
//! a `<td>Artist</td><td>8:00 - 9:00</td>` row still reads as one event line.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref INVISIBLE: Regex =
        Regex::new(r"(?is)<!--.*?-->|<script\b.*?</script\s*>|<style\b.*?</style\s*>|<head\b.*?</head\s*>")
            .unwrap();
    static ref CELL_TAG: Regex = Regex::new(r"(?i)</?\s*(?:td|th)\b[^>]*>").unwrap();
    static ref BLOCK_TAG: Regex = Regex::new(
        r"(?i)</?\s*(?:br|p|div|li|ul|ol|dl|dt|dd|tr|table|thead|tbody|tfoot|caption|h[1-6]|section|article|header|footer|nav|main|aside|blockquote|pre|hr)\b[^>]*>"
    )
    .unwrap();
    static ref ANY_TAG: Regex = Regex::new(r"(?s)<[^>]*>").unwrap();
    static ref ENTITY: Regex = Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z][a-zA-Z0-9]{1,31});").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"[\s\u{200b}]+").unwrap();
}

/// Flatten markup (or plain text) into non-empty, whitespace-collapsed lines
pub fn text_lines(markup: &str) -> Vec<String> {
    let text = INVISIBLE.replace_all(markup, "\n");
    let text = CELL_TAG.replace_all(&text, "  ");
    let text = BLOCK_TAG.replace_all(&text, "\n");
    let text = ANY_TAG.replace_all(&text, "");

    text.lines()
        .map(|line| {
            let decoded = decode_entities(line);
            WHITESPACE.replace_all(&decoded, " ").trim().to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

/// Decode named and numeric character references; unknown ones are kept verbatim
pub fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures| {
            let name = &caps[1];
            let decoded = if let Some(hex) = name
                .strip_prefix("#x")
                .or_else(|| name.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(name)
            };

            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "ndash" => '–',
        "mdash" => '—',
        "lsquo" => '‘',
        "rsquo" => '’',
        "ldquo" => '“',
        "rdquo" => '”',
        "hellip" => '…',
        "bull" => '•',
        "middot" => '·',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        "eacute" => 'é',
        "egrave" => 'è',
        "aacute" => 'á',
        "iacute" => 'í',
        "oacute" => 'ó',
        "uacute" => 'ú',
        "ntilde" => 'ñ',
        "uuml" => 'ü',
        "ouml" => 'ö',
        "auml" => 'ä',
        _ => return None,
    };
    Some(c)
}
