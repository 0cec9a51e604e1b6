use crate::sample;

/// Per-connection reassembly of newline-delimited records out of arbitrary
/// transport chunks.
///
/// At most one incomplete fragment is carried between chunks. When a carried
/// fragment exists, it is glued onto the next chunk's first candidate record
/// only if the merged line is a well-formed sample; otherwise the stale
/// fragment is discarded unmerged and the candidate stands on its own. This
/// keeps one malformed fragment from contaminating unrelated records.
#[derive(Debug, Default)]
pub struct Reassembler {
    pending: Option<String>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one transport chunk and return the complete records it
    /// yields, in arrival order.
    ///
    /// Records are returned unvalidated; only the fragment-merge decision is
    /// gated on the sample shape. An unterminated tail is held back as the
    /// new pending fragment.
    pub fn feed(&mut self, chunk: &str) -> Vec<String> {
        if chunk.is_empty() {
            return Vec::new();
        }

        let terminated = chunk.ends_with('\n');
        let mut records: Vec<String> = chunk.split('\n').map(str::to_owned).collect();

        if terminated {
            // Artifact of splitting on the final delimiter, not a record.
            records.pop();
        }

        if let Some(pending) = self.pending.take() {
            if let Some(first) = records.first_mut() {
                let merged = format!("{pending}{first}");
                if sample::is_valid(&merged) {
                    *first = merged;
                }
            }
        }

        if !terminated {
            self.pending = records.pop();
        }

        records
    }

    /// The fragment currently carried between chunks, if any. Dropped
    /// permanently when the connection closes.
    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }
}
