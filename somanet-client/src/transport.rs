//! Deadline-bounded request/response exchange over a single TCP connection.

use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use snafu::ResultExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;

use somanet_common::frame::{EthernetFrame, HEADER_LEN};

use crate::error::{FrameSnafu, IoSnafu, Result, TimeoutSnafu};

/// Allocator handing out the 16-bit sequence ids carried by outbound frames
///
/// Monotonically incrementing, wrapping at 0xFFFF. Atomic, so two tasks
/// racing for the transport lock never observe the same id.
#[derive(Debug, Default)]
pub(crate) struct SeqIdAllocator(AtomicU16);

impl SeqIdAllocator {
    pub const fn new() -> Self {
        Self(AtomicU16::new(0))
    }

    /// Hand out the next sequence id
    pub fn next_id(&self) -> u16 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// One TCP connection to a drive
///
/// The socket sits behind a mutex so that exactly one request/response pair
/// is in flight at a time; concurrent callers queue on the lock. Sequence
/// ids are assigned by the layer above, not here.
#[derive(Debug)]
pub(crate) struct Transport {
    stream: Mutex<TcpStream>,
}

impl Transport {
    /// Open a TCP connection to `host:port`
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((host, port)).await.context(IoSnafu)?;
        // Frames are small and latency bound, Nagle only hurts here.
        stream.set_nodelay(true).context(IoSnafu)?;
        Ok(Self {
            stream: Mutex::new(stream),
        })
    }

    /// Write one request and read one response, bounded by `deadline`
    ///
    /// The deadline covers the write and both reads together. On timeout the
    /// socket may be left with a partially drained response, so the session
    /// should be reconnected before further exchanges.
    pub async fn exchange(
        &self,
        request: &EthernetFrame,
        deadline: Duration,
    ) -> Result<EthernetFrame> {
        let mut stream = self.stream.lock().await;
        match timeout(deadline, Self::exchange_locked(&mut stream, request)).await {
            Ok(result) => result,
            Err(_) => TimeoutSnafu { deadline }.fail(),
        }
    }

    async fn exchange_locked(
        stream: &mut TcpStream,
        request: &EthernetFrame,
    ) -> Result<EthernetFrame> {
        let raw = request.serialize();
        log::trace!(
            "tx {:?} id={} status={:?} {} payload bytes",
            request.message_type,
            request.id,
            request.status,
            request.payload.len()
        );
        stream.write_all(&raw).await.context(IoSnafu)?;

        let mut buffer = vec![0u8; HEADER_LEN];
        stream.read_exact(&mut buffer).await.context(IoSnafu)?;
        let size = u16::from_le_bytes([buffer[5], buffer[6]]) as usize;
        buffer.resize(HEADER_LEN + size, 0);
        stream
            .read_exact(&mut buffer[HEADER_LEN..])
            .await
            .context(IoSnafu)?;

        let response = EthernetFrame::parse(&buffer).context(FrameSnafu)?;
        log::trace!(
            "rx {:?} id={} status={:?} sqi={:?} {} payload bytes",
            response.message_type,
            response.id,
            response.status,
            response.sqi_status,
            response.payload.len()
        );
        Ok(response)
    }

    /// Shut down the connection
    pub async fn shutdown(&self) -> Result<()> {
        self.stream.lock().await.shutdown().await.context(IoSnafu)
    }
}
