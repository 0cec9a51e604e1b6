use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Persistent outbound connection to the downstream Graphite endpoint.
///
/// Transmission is fire-and-forget: the flush loop never waits on an
/// acknowledgment and a send failure never propagates back to it. A failed
/// write reconnects the socket and retries the line once; a second failure
/// drops the line with a warning.
pub struct Forwarder {
    addr: String,
    stream: Option<TcpStream>,
}

impl Forwarder {
    /// Open the outbound connection. Called once at startup; failing to
    /// reach the downstream endpoint at this point is fatal.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let addr = format!("{host}:{port}");
        let stream = TcpStream::connect(&addr)
            .await
            .with_context(|| format!("connecting to graphite at {addr}"))?;

        debug!(%addr, "connected to downstream graphite");

        Ok(Self {
            addr,
            stream: Some(stream),
        })
    }

    /// Send one formatted output line.
    pub async fn send(&mut self, line: &str) {
        if self.write_line(line).await.is_ok() {
            return;
        }

        warn!(addr = %self.addr, "downstream write failed, reconnecting");
        self.stream = None;

        match TcpStream::connect(&self.addr).await {
            Ok(stream) => {
                self.stream = Some(stream);
                if let Err(e) = self.write_line(line).await {
                    warn!(error = %e, line, "dropping line after reconnect");
                }
            }
            Err(e) => {
                warn!(error = %e, addr = %self.addr, line, "reconnect failed, dropping line");
            }
        }
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        let stream = self.stream.as_mut().context("no downstream connection")?;
        stream.write_all(line.as_bytes()).await?;
        stream.write_all(b"\n").await?;
        Ok(())
    }
}
