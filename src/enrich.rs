//! Transcript enrichment: ten-codes, callsigns, and signal phrases.
//!
//! Speech-to-text output spells ten-codes inconsistently — "10-42" comes back
//! as "1042" about as often as not — so matching tolerates both forms and
//! rewrites matched spans to the canonical hyphenated code. Extraction is
//! idempotent: running it again over its own output yields the same matches
//! and changes nothing.

use crate::dictionary::CodeDictionary;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Output of enrichment for one transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    /// Transcript text with matched ten-codes rewritten to canonical form.
    pub text: String,
    /// Formatted source-radio label, e.g. "1610092 (FCPD Dispatch)".
    pub radio_label: String,
    /// Matched ten-codes with descriptions.
    pub ten_codes: BTreeMap<String, String>,
    /// Matched callsigns with operator names.
    pub callsigns: BTreeMap<String, String>,
    /// Matched signal phrases with descriptions.
    pub signals: BTreeMap<String, String>,
}

impl EnrichedRecord {
    /// Merge the record into a single flat map.
    ///
    /// Starts from `{radio_label: text}`, then overlays ten-codes, callsigns
    /// and signals in that order; later overlays win on key collision.
    pub fn merged(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(self.radio_label.clone(), Value::String(self.text.clone()));
        for (key, value) in self
            .ten_codes
            .iter()
            .chain(self.callsigns.iter())
            .chain(self.signals.iter())
        {
            map.insert(key.clone(), Value::String(value.clone()));
        }
        map
    }

    /// Render the sidecar body: the merged map as a JSON object.
    pub fn to_sidecar_json(&self) -> String {
        Value::Object(self.merged()).to_string()
    }
}

/// Run full enrichment of a raw transcript against one dictionary.
pub fn enrich(text: &str, dictionary: &CodeDictionary, radio_label: String) -> EnrichedRecord {
    let (ten_codes, rewritten) = extract_ten_codes(text, &dictionary.ten_codes);
    let callsigns = extract_callsigns(&rewritten, &dictionary.callsigns);
    let signals = extract_signals(&rewritten, &dictionary.signals);
    EnrichedRecord {
        text: rewritten,
        radio_label,
        ten_codes,
        callsigns,
        signals,
    }
}

/// Format the source-radio label: "<id> (<name>)" when the id is known.
pub fn format_radio_label(radios: &BTreeMap<String, String>, radio_id: &str) -> String {
    match radios.get(radio_id) {
        Some(name) => format!("{} ({})", radio_id, name),
        None => radio_id.to_string(),
    }
}

/// Extract ten-codes and rewrite matched spans to canonical form.
///
/// Codes are tried longest-first so a short code never shadows a longer one
/// it prefixes ("10-4" must not claim the "10-42" in a transcript). Each code
/// is searched in both its hyphenated and de-hyphenated spelling, bounded by
/// non-digits on both sides; every bounded occurrence of the matched spelling
/// is rewritten to the canonical hyphenated code before the next code is
/// tried, so later searches run against the rewritten text.
pub fn extract_ten_codes(
    text: &str,
    ten_codes: &HashMap<String, String>,
) -> (BTreeMap<String, String>, String) {
    let mut matches = BTreeMap::new();
    let mut text = text.to_string();

    let mut ordered: Vec<(&String, &String)> = ten_codes.iter().collect();
    // Longest first; alphabetical among equal lengths for determinism.
    ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));

    for (code, description) in ordered {
        let dehyphenated = code.replacen("10-", "10", 1);
        let mut hit = rewrite_bounded(&mut text, code, code) > 0;
        if dehyphenated != *code {
            hit |= rewrite_bounded(&mut text, &dehyphenated, code) > 0;
        }
        if hit {
            matches.insert(code.clone(), description.clone());
        }
    }

    (matches, text)
}

/// Extract callsigns by exact substring containment. No rewriting.
pub fn extract_callsigns(
    text: &str,
    callsigns: &HashMap<String, String>,
) -> BTreeMap<String, String> {
    callsigns
        .iter()
        .filter(|(callsign, _)| text.contains(callsign.as_str()))
        .map(|(callsign, name)| (callsign.clone(), name.clone()))
        .collect()
}

/// Extract signal phrases, case-insensitively, longest phrase first.
///
/// The text is never mutated: signal phrases may legitimately overlap in the
/// source text, and all of them should be reported.
pub fn extract_signals(
    text: &str,
    signals: &HashMap<String, String>,
) -> BTreeMap<String, String> {
    let haystack = text.to_lowercase();

    let mut ordered: Vec<(&String, &String)> = signals.iter().collect();
    ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));

    ordered
        .into_iter()
        .filter(|(phrase, _)| haystack.contains(&phrase.to_lowercase()))
        .map(|(phrase, description)| (phrase.clone(), description.clone()))
        .collect()
}

/// Replace every digit-bounded occurrence of `needle` with `replacement`.
///
/// An occurrence only counts when the characters immediately before and after
/// it are not ASCII digits, so a code never matches inside a longer digit run
/// ("10-4" must not match inside "10-42"). Returns the number of occurrences
/// rewritten.
fn rewrite_bounded(text: &mut String, needle: &str, replacement: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    let mut count = 0;
    let mut from = 0;
    while let Some(start) = find_bounded(text, needle, from) {
        text.replace_range(start..start + needle.len(), replacement);
        from = start + replacement.len();
        count += 1;
    }
    count
}

/// Find the first digit-bounded occurrence of `needle` at or after `from`.
fn find_bounded(text: &str, needle: &str, from: usize) -> Option<usize> {
    let mut search = from;
    while let Some(offset) = text[search..].find(needle) {
        let start = search + offset;
        let end = start + needle.len();

        let digit_before = text[..start]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_digit());
        let digit_after = text[end..].chars().next().is_some_and(|c| c.is_ascii_digit());

        if !digit_before && !digit_after {
            return Some(start);
        }
        // Advance past this occurrence and keep looking.
        search = start + needle.len().max(1);
        if search >= text.len() {
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_ten_code_basic_match() {
        let dict = codes(&[("10-4", "Acknowledged")]);
        let (matches, rewritten) = extract_ten_codes("unit 12 said 10-4 now", &dict);
        assert_eq!(matches.get("10-4").map(String::as_str), Some("Acknowledged"));
        assert_eq!(rewritten, "unit 12 said 10-4 now");
    }

    #[test]
    fn test_ten_code_dehyphenated_match_rewrites() {
        let dict = codes(&[("10-42", "Ending tour")]);
        let (matches, rewritten) = extract_ten_codes("he is 1042 at the station", &dict);
        assert!(matches.contains_key("10-42"));
        assert_eq!(rewritten, "he is 10-42 at the station");
    }

    #[test]
    fn test_ten_code_boundary_rule() {
        let dict = codes(&[("10-4", "Acknowledged")]);
        // Digit immediately follows: no match.
        let (matches, rewritten) = extract_ten_codes("said 10-42 and cleared", &dict);
        assert!(matches.is_empty());
        assert_eq!(rewritten, "said 10-42 and cleared");

        // Non-digit boundary: match.
        let (matches, _) = extract_ten_codes("said 10-4 now", &dict);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_ten_code_not_matched_inside_digit_run() {
        let dict = codes(&[("10-4", "Acknowledged")]);
        let (matches, _) = extract_ten_codes("case 210-4 closed", &dict);
        assert!(matches.is_empty());
    }

    #[test]
    fn test_ten_code_longest_first() {
        let dict = codes(&[("10-4", "Acknowledged"), ("10-42", "Ending tour")]);
        let (matches, rewritten) = extract_ten_codes("unit is 10-42 tonight", &dict);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches.get("10-42").map(String::as_str), Some("Ending tour"));
        assert!(!matches.contains_key("10-4"));
        assert_eq!(rewritten, "unit is 10-42 tonight");
    }

    #[test]
    fn test_ten_code_extraction_is_idempotent() {
        let dict = codes(&[("10-4", "Acknowledged"), ("10-42", "Ending tour")]);
        let (first_matches, first_text) = extract_ten_codes("copy 104, he is 1042 now", &dict);
        let (second_matches, second_text) = extract_ten_codes(&first_text, &dict);
        assert_eq!(first_matches, second_matches);
        assert_eq!(first_text, second_text);
        assert_eq!(first_text, "copy 10-4, he is 10-42 now");
    }

    #[test]
    fn test_ten_code_rewrites_every_bounded_occurrence() {
        let dict = codes(&[("10-42", "Ending tour")]);
        let (matches, rewritten) = extract_ten_codes("1042 confirmed, 1042 at home", &dict);
        assert_eq!(matches.len(), 1);
        assert_eq!(rewritten, "10-42 confirmed, 10-42 at home");
    }

    #[test]
    fn test_ten_code_empty_transcript() {
        let dict = codes(&[("10-4", "Acknowledged")]);
        let (matches, rewritten) = extract_ten_codes("", &dict);
        assert!(matches.is_empty());
        assert_eq!(rewritten, "");
    }

    #[test]
    fn test_callsign_containment() {
        let dict = codes(&[("David-12", "J. Smith"), ("Adam-3", "B. Jones")]);
        let matches = extract_callsigns("David-12 copy direct", &dict);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches.get("David-12").map(String::as_str), Some("J. Smith"));
    }

    #[test]
    fn test_signal_case_insensitive() {
        let dict = codes(&[("Signal 7", "Intoxicated person")]);
        let matches = extract_signals("responding to a signal 7 downtown", &dict);
        assert_eq!(
            matches.get("Signal 7").map(String::as_str),
            Some("Intoxicated person")
        );
    }

    #[test]
    fn test_signals_do_not_consume_text() {
        // Overlapping phrases must both be reported.
        let dict = codes(&[("Signal 7", "Intoxicated person"), ("Signal 7 Edward", "DUI arrest")]);
        let matches = extract_signals("out with a Signal 7 Edward", &dict);
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn test_enrich_produces_full_record() {
        let dictionary = CodeDictionary {
            ten_codes: codes(&[("10-50", "Collision")]),
            callsigns: codes(&[("David-12", "J. Smith")]),
            signals: codes(&[("Signal 7", "Intoxicated person")]),
        };
        let record = enrich(
            "David-12 out at a 1050, possible signal 7",
            &dictionary,
            "1610092 (FCPD Dispatch)".to_string(),
        );
        assert_eq!(record.text, "David-12 out at a 10-50, possible signal 7");
        assert_eq!(record.ten_codes.len(), 1);
        assert_eq!(record.callsigns.len(), 1);
        assert_eq!(record.signals.len(), 1);
    }

    #[test]
    fn test_enrich_empty_matches_is_valid() {
        let record = enrich("nothing notable", &CodeDictionary::empty(), "42".to_string());
        assert!(record.ten_codes.is_empty());
        assert!(record.callsigns.is_empty());
        assert!(record.signals.is_empty());
        assert_eq!(record.text, "nothing notable");
    }

    #[test]
    fn test_merged_overlay_order_later_wins() {
        let record = EnrichedRecord {
            text: "transcript".to_string(),
            radio_label: "key".to_string(),
            ten_codes: [("key".to_string(), "from ten-codes".to_string())].into(),
            callsigns: [("key".to_string(), "from callsigns".to_string())].into(),
            signals: [("key".to_string(), "from signals".to_string())].into(),
        };
        let merged = record.merged();
        assert_eq!(merged.len(), 1);
        assert_eq!(
            merged.get("key").and_then(Value::as_str),
            Some("from signals")
        );
    }

    #[test]
    fn test_sidecar_json_shape() {
        let record = EnrichedRecord {
            text: "copy 10-4".to_string(),
            radio_label: "1610092 (FCPD Dispatch)".to_string(),
            ten_codes: [("10-4".to_string(), "Acknowledged".to_string())].into(),
            callsigns: BTreeMap::new(),
            signals: BTreeMap::new(),
        };
        let json: Value = serde_json::from_str(&record.to_sidecar_json()).unwrap();
        assert_eq!(
            json.get("1610092 (FCPD Dispatch)").and_then(Value::as_str),
            Some("copy 10-4")
        );
        assert_eq!(json.get("10-4").and_then(Value::as_str), Some("Acknowledged"));
    }

    #[test]
    fn test_format_radio_label() {
        let mut radios = BTreeMap::new();
        radios.insert("1610092".to_string(), "FCPD Dispatch".to_string());
        assert_eq!(
            format_radio_label(&radios, "1610092"),
            "1610092 (FCPD Dispatch)"
        );
        assert_eq!(format_radio_label(&radios, "999"), "999");
    }
}
