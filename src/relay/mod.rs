use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::aggregate;
use crate::buffer::SampleBuffer;
use crate::config::Config;
use crate::forward::Forwarder;
use crate::ingest::Listener;

/// Relay wires the ingest listener, the shared buffer, the periodic flush,
/// and the downstream forwarder together.
pub struct Relay {
    cfg: Config,
    buffer: Arc<SampleBuffer>,
    cancel: CancellationToken,
    ingest_addr: Option<SocketAddr>,
}

impl Relay {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            buffer: Arc::new(SampleBuffer::new()),
            cancel: CancellationToken::new(),
            ingest_addr: None,
        }
    }

    /// Connect downstream, bind the listener, and spawn the accept loop and
    /// the flush timer.
    pub async fn start(&mut self) -> Result<()> {
        let forwarder = Forwarder::connect(&self.cfg.graphite_host, self.cfg.graphite_port)
            .await
            .context("connecting downstream forwarder")?;

        let listener = Listener::bind(self.cfg.listen_port)
            .await
            .context("starting ingest listener")?;
        let ingest_addr = listener.local_addr()?;
        self.ingest_addr = Some(ingest_addr);

        tokio::spawn(listener.run(Arc::clone(&self.buffer), self.cancel.child_token()));
        self.spawn_flusher(forwarder);

        info!(
            addr = %ingest_addr,
            graphite = %format!("{}:{}", self.cfg.graphite_host, self.cfg.graphite_port),
            interval = ?self.cfg.flush_interval,
            "relay started",
        );

        Ok(())
    }

    /// The bound ingest address (useful when listening on port 0).
    pub fn ingest_addr(&self) -> Option<SocketAddr> {
        self.ingest_addr
    }

    /// Signal all tasks to stop. Connection teardown discards per-connection
    /// fragments but leaves the shared buffer untouched.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    fn spawn_flusher(&self, mut forwarder: Forwarder) {
        let buffer = Arc::clone(&self.buffer);
        let cancel = self.cancel.child_token();
        let interval = self.cfg.flush_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {
                        flush_once(&buffer, &mut forwarder).await;
                    }
                }
            }
        });
    }
}

/// Drain the buffer and forward one aggregated flush. A tick with an empty
/// buffer does nothing downstream.
async fn flush_once(buffer: &SampleBuffer, forwarder: &mut Forwarder) {
    let raw = buffer.drain();
    if raw.is_empty() {
        return;
    }

    debug!(records = raw.len(), "preparing flush");

    let flush = aggregate::aggregate(&raw, epoch_now());
    for line in &flush.lines {
        forwarder.send(line).await;
    }

    debug!(
        emitted = flush.emitted_count,
        reduced = flush.reduction(),
        "flush complete",
    );
}

fn epoch_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
