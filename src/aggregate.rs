use std::collections::BTreeMap;

/// Width of the aggregation time window, in seconds.
pub const BUCKET_WIDTH_SECS: u64 = 60;

/// Result of one aggregation pass over the drained buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flush {
    /// Formatted `key sum bucket` lines, one per distinct (bucket, key).
    pub lines: Vec<String>,
    /// Number of raw lines that went into this flush.
    pub raw_count: usize,
    /// Number of aggregate lines emitted.
    pub emitted_count: usize,
}

impl Flush {
    /// How many raw lines aggregation absorbed: N raw samples compress to
    /// M <= N output lines.
    pub fn reduction(&self) -> usize {
        self.raw_count - self.emitted_count
    }
}

/// Reduce raw sample lines into per-bucket per-key sums.
///
/// Lines are split leniently on whitespace into `key value [time]`. A
/// missing timestamp substitutes `now_epoch`; a value that does not parse
/// as a number contributes an explicit zero rather than aborting the flush.
/// One malformed line never affects the others in the same flush.
pub fn aggregate(lines: &[String], now_epoch: u64) -> Flush {
    let mut buckets: BTreeMap<u64, BTreeMap<String, f64>> = BTreeMap::new();

    for line in lines {
        let mut fields = line.split_whitespace();
        let Some(key) = fields.next() else {
            // Blank record, nothing to account.
            continue;
        };

        let value = parse_or_zero(fields.next());
        let time = match fields.next() {
            Some(t) => t.parse::<u64>().unwrap_or(0),
            None => now_epoch,
        };

        let bucket = time / BUCKET_WIDTH_SECS * BUCKET_WIDTH_SECS;
        *buckets
            .entry(bucket)
            .or_default()
            .entry(key.to_string())
            .or_insert(0.0) += value;
    }

    let mut out = Vec::new();
    for (bucket, keys) in &buckets {
        for (key, sum) in keys {
            out.push(format!("{key} {sum} {bucket}"));
        }
    }

    Flush {
        raw_count: lines.len(),
        emitted_count: out.len(),
        lines: out,
    }
}

/// Parse a numeric field, defaulting to zero when absent or malformed.
fn parse_or_zero(field: Option<&str>) -> f64 {
    field.and_then(|v| v.parse().ok()).unwrap_or(0.0)
}
