use parking_lot::Mutex;

/// Process-wide buffer of raw sample lines awaiting the next flush.
///
/// Connections append in arrival order; the flush task takes the whole
/// contents atomically. Lines arriving while a flush is processing land in
/// the next flush, never the current one.
#[derive(Debug, Default)]
pub struct SampleBuffer {
    lines: Mutex<Vec<String>>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append complete records from one connection, preserving their order.
    pub fn append(&self, records: Vec<String>) {
        if records.is_empty() {
            return;
        }
        self.lines.lock().extend(records);
    }

    /// Atomically take ownership of all buffered lines, leaving the buffer
    /// empty. Only the flush task calls this.
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock())
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_order() {
        let buf = SampleBuffer::new();
        buf.append(vec!["a 1 60".into(), "b 2 60".into()]);
        buf.append(vec!["c 3 60".into()]);

        assert_eq!(buf.drain(), vec!["a 1 60", "b 2 60", "c 3 60"]);
    }

    #[test]
    fn test_drain_empties_buffer() {
        let buf = SampleBuffer::new();
        buf.append(vec!["a 1 60".into()]);

        assert_eq!(buf.drain().len(), 1);
        assert!(buf.is_empty());
        assert!(buf.drain().is_empty());
    }

    #[test]
    fn test_append_empty_is_noop() {
        let buf = SampleBuffer::new();
        buf.append(Vec::new());
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn test_concurrent_append() {
        use std::sync::Arc;
        use std::thread;

        let buf = Arc::new(SampleBuffer::new());
        let mut handles = Vec::new();

        for i in 0..4 {
            let buf = Arc::clone(&buf);
            handles.push(thread::spawn(move || {
                for n in 0..250 {
                    buf.append(vec![format!("conn{i}.metric {n} 60")]);
                }
            }));
        }

        for h in handles {
            h.join().expect("thread panicked");
        }

        assert_eq!(buf.len(), 1000);
    }
}
