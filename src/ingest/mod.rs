pub mod framing;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::buffer::SampleBuffer;

use self::framing::Reassembler;

const READ_BUF_SIZE: usize = 4096;

/// Plaintext ingest listener. Each accepted connection runs its own handler
/// task owning its own [`Reassembler`]; complete records go straight into
/// the shared buffer. Write-only protocol: nothing is ever sent back.
pub struct Listener {
    listener: TcpListener,
}

impl Listener {
    /// Bind on all interfaces at the given port.
    pub async fn bind(port: u16) -> Result<Self> {
        let addr = format!("0.0.0.0:{port}");
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("binding ingest listener on {addr}"))?;

        Ok(Self { listener })
    }

    /// The bound address (useful when binding port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("reading ingest listener address")
    }

    /// Accept connections until cancelled.
    pub async fn run(self, buffer: Arc<SampleBuffer>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("ingest listener stopped");
                    return;
                }
                result = self.listener.accept() => match result {
                    Ok((stream, peer)) => {
                        debug!(%peer, "client connecting");

                        let buffer = Arc::clone(&buffer);
                        let cancel = cancel.child_token();

                        tokio::spawn(async move {
                            handle_connection(stream, &buffer, cancel).await;
                            debug!(%peer, "client disconnecting");
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "accept failed");
                    }
                }
            }
        }
    }
}

/// Read chunks until EOF or cancellation, reassembling records into the
/// shared buffer. A pending fragment left at teardown is dropped, never
/// emitted.
async fn handle_connection(
    mut stream: TcpStream,
    buffer: &SampleBuffer,
    cancel: CancellationToken,
) {
    let mut asm = Reassembler::new();
    let mut chunk = [0u8; READ_BUF_SIZE];

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            read = stream.read(&mut chunk) => match read {
                Ok(0) => break,
                Ok(n) => {
                    let text = String::from_utf8_lossy(&chunk[..n]);
                    buffer.append(asm.feed(&text));
                }
                Err(e) => {
                    warn!(error = %e, "client read failed");
                    break;
                }
            }
        }
    }

    if let Some(fragment) = asm.pending() {
        debug!(fragment, "dropping unterminated fragment on disconnect");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::AsyncWriteExt;

    use super::*;

    async fn start_listener() -> (SocketAddr, Arc<SampleBuffer>, CancellationToken) {
        let listener = Listener::bind(0).await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let buffer = Arc::new(SampleBuffer::new());
        let cancel = CancellationToken::new();

        tokio::spawn(listener.run(Arc::clone(&buffer), cancel.clone()));

        (addr, buffer, cancel)
    }

    async fn wait_for_len(buffer: &SampleBuffer, n: usize) {
        for _ in 0..100 {
            if buffer.len() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("buffer never reached {n} records (got {})", buffer.len());
    }

    #[tokio::test]
    async fn test_records_reach_shared_buffer() {
        let (addr, buffer, cancel) = start_listener().await;

        let mut client = TcpStream::connect(addr).await.expect("connect");
        client
            .write_all(b"a.b 1 60\nc.d 2 60\n")
            .await
            .expect("write");
        client.flush().await.expect("flush");

        wait_for_len(&buffer, 2).await;
        assert_eq!(buffer.drain(), vec!["a.b 1 60", "c.d 2 60"]);

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_record_split_across_writes() {
        let (addr, buffer, cancel) = start_listener().await;

        let mut client = TcpStream::connect(addr).await.expect("connect");
        client.write_all(b"a.b 1").await.expect("write");
        client.flush().await.expect("flush");
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.write_all(b" 60\n").await.expect("write");
        client.flush().await.expect("flush");

        wait_for_len(&buffer, 1).await;
        assert_eq!(buffer.drain(), vec!["a.b 1 60"]);

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_trailing_fragment_lost_on_disconnect() {
        let (addr, buffer, cancel) = start_listener().await;

        let mut client = TcpStream::connect(addr).await.expect("connect");
        client.write_all(b"a.b 1 60\npartial rec").await.expect("write");
        client.flush().await.expect("flush");
        wait_for_len(&buffer, 1).await;

        drop(client);
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Only the terminated record survives.
        assert_eq!(buffer.drain(), vec!["a.b 1 60"]);

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_multiple_concurrent_connections() {
        let (addr, buffer, cancel) = start_listener().await;

        let mut a = TcpStream::connect(addr).await.expect("connect a");
        let mut b = TcpStream::connect(addr).await.expect("connect b");
        a.write_all(b"conn.a 1 60\n").await.expect("write a");
        b.write_all(b"conn.b 2 60\n").await.expect("write b");
        a.flush().await.expect("flush a");
        b.flush().await.expect("flush b");

        wait_for_len(&buffer, 2).await;

        let mut records = buffer.drain();
        records.sort();
        assert_eq!(records, vec!["conn.a 1 60", "conn.b 2 60"]);

        cancel.cancel();
    }
}
