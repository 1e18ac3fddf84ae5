//! Label field parsing
//!
//! The extraction model is asked to answer with one `Label: value` line per
//! field, but nothing guarantees it does. Lines are matched on whole-word
//! markers in the label part; anything that does not match is ignored and
//! missing fields stay empty.

use serde::{Deserialize, Serialize};

/// Fields recovered from one photographed label
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedLabelData {
    /// Product name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Manufacturing or packing date, as printed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturing_date: Option<String>,
    /// Batch or lot number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_number: Option<String>,
    /// Expiry or best-before date, as printed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<String>,
}

impl CapturedLabelData {
    /// True when a product name was recovered
    #[must_use]
    pub fn has_name(&self) -> bool {
        self.name.is_some()
    }

    /// True when nothing was recovered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.manufacturing_date.is_none()
            && self.batch_number.is_none()
            && self.expiry_date.is_none()
    }
}

/// Replies the model gives when it could not read a field
const MISSING_MARKERS: &[&str] = &[
    "n/a",
    "na",
    "none",
    "null",
    "unknown",
    "not found",
    "not available",
    "not visible",
    "not specified",
    "-",
];

/// Words marking a manufacturing date label; "manufacturer" is a company
const MANUFACTURING_WORDS: &[&str] = &["manufacturing", "manufactured", "manufacture", "mfg", "mfd"];

/// Words allowed after "batch" or "lot" in a batch label
const BATCH_QUALIFIERS: &[&str] = &["no", "nr", "number", "code", "id", "lot"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    Manufacturing,
    Expiry,
    Batch,
}

impl Field {
    /// Match a lowercased label on whole words; anything unrecognized is `None`
    fn classify(label: &str) -> Option<Self> {
        let words: Vec<&str> = label
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        if words.iter().any(|w| MANUFACTURING_WORDS.contains(w)) {
            Some(Self::Manufacturing)
        } else if words.iter().any(|w| w.starts_with("expir"))
            || words
                .windows(2)
                .any(|pair| pair == ["best", "before"] || pair == ["use", "by"])
        {
            Some(Self::Expiry)
        } else if matches!(words.first(), Some(&("batch" | "lot")))
            && words[1..].iter().all(|w| BATCH_QUALIFIERS.contains(w))
        {
            Some(Self::Batch)
        } else if words == ["name"] || words == ["product", "name"] {
            Some(Self::Name)
        } else {
            None
        }
    }
}

/// Parse `Label: value` lines into label fields.
///
/// The first usable line for each field wins.
#[must_use]
pub fn parse_label_fields(text: &str) -> CapturedLabelData {
    let mut data = CapturedLabelData::default();

    for line in text.lines() {
        let Some((label, value)) = split_line(line) else {
            continue;
        };
        let Some(field) = Field::classify(&label) else {
            continue;
        };
        let Some(value) = clean_value(value) else {
            continue;
        };

        let slot = match field {
            Field::Name => &mut data.name,
            Field::Manufacturing => &mut data.manufacturing_date,
            Field::Expiry => &mut data.expiry_date,
            Field::Batch => &mut data.batch_number,
        };
        if slot.is_none() {
            *slot = Some(value);
        }
    }

    data
}

/// Split a line at its first colon, lowercasing the label and dropping list
/// bullets and markdown emphasis
fn split_line(line: &str) -> Option<(String, &str)> {
    let line = line.trim().trim_start_matches(['-', '*', '•', '#', ' ']);
    let (label, value) = line.split_once(':')?;
    let label = label.replace('*', "").trim().to_lowercase();
    if label.is_empty() {
        return None;
    }
    Some((label, value))
}

fn clean_value(value: &str) -> Option<String> {
    let value = value
        .trim()
        .trim_matches(|c| c == '*' || c == '"' || c == '`')
        .trim();
    if value.is_empty() || MISSING_MARKERS.iter().any(|m| value.eq_ignore_ascii_case(m)) {
        return None;
    }
    Some(value.to_string())
}
