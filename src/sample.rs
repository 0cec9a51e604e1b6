use std::sync::LazyLock;

use regex::Regex;

/// Shape of a well-formed sample line: a dot/word metric key, a numeric
/// value (optionally with a decimal part), and an integer epoch timestamp,
/// separated by single spaces with nothing else on the line.
static SAMPLE_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([\w.]+) (\d+(?:\.\d+)?) (\d+)$").expect("sample shape regex is valid")
});

/// A parsed metric sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub key: String,
    pub value: f64,
    pub timestamp: u64,
}

/// Returns true if `line` is a well-formed sample.
///
/// This is the gate for the fragment-merge decision in the reassembler.
/// Complete records that arrive whole are deliberately *not* checked here;
/// the aggregator tolerates them leniently instead.
pub fn is_valid(line: &str) -> bool {
    SAMPLE_SHAPE.is_match(line)
}

impl Sample {
    /// Strictly parse a sample line, or `None` if it does not match the
    /// sample shape.
    pub fn parse(line: &str) -> Option<Self> {
        let caps = SAMPLE_SHAPE.captures(line)?;

        // The shape guarantees the numeric fields parse.
        let value = caps[2].parse().ok()?;
        let timestamp = caps[3].parse().ok()?;

        Some(Self {
            key: caps[1].to_string(),
            value,
            timestamp,
        })
    }
}
