//! Timing-table parsing and validation.
//!
//! A timing table is CSV with a header row naming at least `word` and
//! `start_time`. Other columns are ignored. Rows are kept in the order given;
//! the table is never re-sorted, because segment `i` is paired with row `i`.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

pub const WORD_COLUMN: &str = "word";
pub const START_TIME_COLUMN: &str = "start_time";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// One vocabulary word and the second at which it starts in the video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingEntry {
    pub word: String,
    pub start_time: f64,
}

/// Validated, immutable sequence of timing entries in table order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingTable {
    entries: Vec<TimingEntry>,
}

impl TimingTable {
    /// Parse and validate raw CSV bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self, ValidationError> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(bytes);

        let headers = reader.byte_headers()?.clone();
        let word_col = headers.iter().position(|h| h == WORD_COLUMN.as_bytes());
        let start_col = headers.iter().position(|h| h == START_TIME_COLUMN.as_bytes());

        let (word_col, start_col) = match (word_col, start_col) {
            (Some(w), Some(s)) => (w, s),
            (w, s) => {
                let mut missing = Vec::new();
                if w.is_none() {
                    missing.push(WORD_COLUMN.to_string());
                }
                if s.is_none() {
                    missing.push(START_TIME_COLUMN.to_string());
                }
                return Err(ValidationError::MissingColumns { missing });
            }
        };

        let mut entries = Vec::new();
        for record in reader.byte_records() {
            let record = record?;
            let line = record.position().map_or(0, |p| p.line());

            let raw_word = record.get(word_col).unwrap_or_default();
            let word = std::str::from_utf8(raw_word)
                .map_err(|_| ValidationError::NonTextWord { line })?;
            if word.is_empty() {
                return Err(ValidationError::EmptyWord { line });
            }

            let raw_start = String::from_utf8_lossy(record.get(start_col).unwrap_or_default());
            let start_time = parse_start_time(&raw_start).ok_or_else(|| {
                ValidationError::InvalidStartTime {
                    line,
                    value: raw_start.to_string(),
                }
            })?;
            if start_time < 0.0 {
                return Err(ValidationError::NegativeStartTime {
                    line,
                    value: start_time,
                });
            }

            entries.push(TimingEntry {
                word: word.to_string(),
                start_time,
            });
        }

        if entries.is_empty() {
            return Err(ValidationError::EmptyTable);
        }

        let duplicates = duplicate_words(&entries);
        if !duplicates.is_empty() {
            return Err(ValidationError::DuplicateWords { words: duplicates });
        }

        debug!("Parsed timing table with {} words", entries.len());
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[TimingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Words in table order
    pub fn words(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.word.clone()).collect()
    }
}

/// Finite decimal seconds; rejects `NaN` and infinities, which `f64::from_str` accepts.
fn parse_start_time(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Every word that occurs more than once, each reported once, in first-seen order.
fn duplicate_words(entries: &[TimingEntry]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for entry in entries {
        *counts.entry(entry.word.as_str()).or_default() += 1;
    }

    let mut reported = Vec::new();
    for entry in entries {
        if counts.get(entry.word.as_str()).copied().unwrap_or(0) > 1
            && !reported.contains(&entry.word)
        {
            reported.push(entry.word.clone());
        }
    }
    reported
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_rows_in_given_order() {
        let table = TimingTable::parse(b"word,start_time\nhello,1.532\nworld,2.73\nthanks,3.435\n")
            .unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.words(), vec!["hello", "world", "thanks"]);
        assert_eq!(table.entries()[1].start_time, 2.73);
    }

    #[test]
    fn test_out_of_order_times_are_not_resorted() {
        let table = TimingTable::parse(b"word,start_time\nlate,9.0\nearly,1.0\n").unwrap();
        assert_eq!(table.words(), vec!["late", "early"]);
    }

    #[test]
    fn test_extra_columns_and_column_order_are_ignored() {
        let table =
            TimingTable::parse(b"notes,start_time,word\nfirst,0.5,cat\nsecond,1.25,dog\n").unwrap();

        assert_eq!(table.words(), vec!["cat", "dog"]);
        assert_eq!(table.entries()[0].start_time, 0.5);
    }

    #[test]
    fn test_byte_order_mark_and_padding_are_tolerated() {
        let table = TimingTable::parse(b"\xEF\xBB\xBFword , start_time\n  hi , 1.0 \n").unwrap();
        assert_eq!(table.entries()[0], TimingEntry { word: "hi".into(), start_time: 1.0 });
    }

    #[test]
    fn test_missing_start_time_column() {
        let err = TimingTable::parse(b"word,time\nhello,1.0\n").unwrap_err();
        match err {
            ValidationError::MissingColumns { missing } => {
                assert_eq!(missing, vec!["start_time"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_both_columns_names_both() {
        let err = TimingTable::parse(b"a,b\n1,2\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "timing table is missing required column(s): word, start_time"
        );
    }

    #[test]
    fn test_non_numeric_start_time() {
        let err = TimingTable::parse(b"word,start_time\nhello,1.0\nworld,soon\n").unwrap_err();
        match err {
            ValidationError::InvalidStartTime { line, value } => {
                assert_eq!(line, 3);
                assert_eq!(value, "soon");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_nan_and_empty_start_times_are_rejected() {
        assert!(matches!(
            TimingTable::parse(b"word,start_time\nhello,NaN\n"),
            Err(ValidationError::InvalidStartTime { .. })
        ));
        assert!(matches!(
            TimingTable::parse(b"word,start_time\nhello,\n"),
            Err(ValidationError::InvalidStartTime { .. })
        ));
    }

    #[test]
    fn test_negative_start_time() {
        assert!(matches!(
            TimingTable::parse(b"word,start_time\nhello,-1\n"),
            Err(ValidationError::NegativeStartTime { line: 2, .. })
        ));
    }

    #[test]
    fn test_every_duplicate_is_reported_once() {
        let csv = b"word,start_time\na,1\nb,2\na,3\nc,4\nb,5\na,6\n";
        match TimingTable::parse(csv).unwrap_err() {
            ValidationError::DuplicateWords { words } => assert_eq!(words, vec!["a", "b"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_word_and_empty_table() {
        assert!(matches!(
            TimingTable::parse(b"word,start_time\n,1.0\n"),
            Err(ValidationError::EmptyWord { line: 2 })
        ));
        assert!(matches!(
            TimingTable::parse(b"word,start_time\n"),
            Err(ValidationError::EmptyTable)
        ));
    }

    #[test]
    fn test_invalid_utf8_word() {
        assert!(matches!(
            TimingTable::parse(b"word,start_time\n\xFF\xFE,1.0\n"),
            Err(ValidationError::NonTextWord { line: 2 })
        ));
    }

    #[test]
    fn test_ragged_row_is_a_csv_error() {
        assert!(matches!(
            TimingTable::parse(b"word,start_time\nhello\n"),
            Err(ValidationError::Csv(_))
        ));
    }
}
