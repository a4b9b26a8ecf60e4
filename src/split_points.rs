use crate::table::TimingTable;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Split timestamps in seconds, one per table row, in table order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentPoints {
    points: Vec<f64>,
}

impl SegmentPoints {
    /// Project `start_time` out of a validated table. No reordering, no dedup.
    pub fn derive(table: &TimingTable) -> Self {
        Self {
            points: table.entries().iter().map(|e| e.start_time).collect(),
        }
    }

    pub fn from_seconds(points: Vec<f64>) -> Self {
        Self { points }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Comma-joined argument for `-segment_times`, e.g. `1.532,2.73,3.435`.
    ///
    /// `f64`'s `Display` prints the shortest decimal that parses back to the
    /// same value and never switches to exponent notation, which the splitter
    /// would reject.
    pub fn to_arg(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SegmentPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, point) in self.points.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{point}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_matches_splitter_syntax() {
        let table =
            TimingTable::parse(b"word,start_time\na,1.532\nb,2.73\nc,3.435\n").unwrap();
        assert_eq!(SegmentPoints::derive(&table).to_arg(), "1.532,2.73,3.435");
    }

    #[test]
    fn test_arg_round_trips_every_value_in_order() {
        let csv = b"word,start_time\na,0.1\nb,0\nc,12.000000001\nd,0.0000001\ne,3600.25\nf,0.1\n";
        let table = TimingTable::parse(csv).unwrap();
        let arg = SegmentPoints::derive(&table).to_arg();

        assert!(!arg.contains('e'), "exponent notation leaked into {arg}");
        let parsed: Vec<f64> = arg.split(',').map(|v| v.parse().unwrap()).collect();
        let expected: Vec<f64> = table.entries().iter().map(|e| e.start_time).collect();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_whole_seconds_render_without_fraction() {
        let points = SegmentPoints::from_seconds(vec![1.0, 2.5]);
        assert_eq!(points.to_arg(), "1,2.5");
    }
}
