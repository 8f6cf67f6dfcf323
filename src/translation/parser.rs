/*!
 * Response parsing.
 *
 * The API is asked to answer one `index|translation` line per input line, but
 * nothing guarantees it does. The parser reconciles whatever came back
 * against the batch so that every input line gets exactly one result.
 */

use log::debug;
use std::collections::HashMap;

use crate::jobs::models::{Line, TranslatedLine};

/// Prefix of the translation recorded for a line missing from the response
pub const PARSE_ERROR_MARKER: &str = "[PARSE_ERROR]";

/// Sentinel translation for a line the response did not cover
pub fn sentinel_translation(original: &str) -> String {
    format!("{} {}", PARSE_ERROR_MARKER, original)
}

/// Parse one response line into `(index, translation)`
fn parse_response_line(line: &str) -> Option<(i64, &str)> {
    let (index, text) = line.split_once('|')?;
    let index = index.trim().parse::<i64>().ok()?;
    Some((index, text.trim()))
}

/// Parse a raw response into one result per line of `batch`, sorted by index.
///
/// Response lines without a `|`, with a non-numeric index, or naming an index
/// outside the batch are skipped. When an index appears more than once, the
/// first occurrence wins. Lines of the batch the response did not cover get
/// the [`PARSE_ERROR_MARKER`] sentinel.
pub fn parse_translation_result(raw: &str, batch: &[Line]) -> Vec<TranslatedLine> {
    let originals: HashMap<i64, &str> = batch.iter().map(|l| (l.index, l.text.as_str())).collect();
    let mut translations: HashMap<i64, String> = HashMap::with_capacity(batch.len());

    for response_line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match parse_response_line(response_line) {
            Some((index, text)) if originals.contains_key(&index) => {
                translations.entry(index).or_insert_with(|| text.to_string());
            }
            _ => debug!("Ignoring response line: {}", response_line),
        }
    }

    let missing = batch.len() - translations.len();
    if missing > 0 {
        debug!("{} of {} lines missing from response", missing, batch.len());
    }

    let mut results: Vec<TranslatedLine> = batch
        .iter()
        .map(|line| TranslatedLine {
            index: line.index,
            original: line.text.clone(),
            translated: translations
                .remove(&line.index)
                .unwrap_or_else(|| sentinel_translation(&line.text)),
        })
        .collect();

    results.sort_by_key(|r| r.index);
    results
}
