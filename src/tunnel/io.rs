//! Payload-level I/O seams for the two sides of a tunnel.
//!
//! The relay and negotiation code only sees opaque chunks of bytes. The client
//! side is a WebSocket (one chunk per data frame), the target side a TCP stream
//! (one chunk per read).

use std::future::Future;
use std::io;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Read buffer size for stream endpoints.
pub const READ_BUFFER_SIZE: usize = 32 * 1024;

/// Source of payload chunks.
pub trait PayloadReader: Send + 'static {
    /// Next chunk, or `None` once the peer has finished.
    fn read_payload(&mut self) -> impl Future<Output = io::Result<Option<Bytes>>> + Send;
}

/// Sink for payload chunks.
pub trait PayloadWriter: Send + 'static {
    fn write_payload(&mut self, payload: Bytes) -> impl Future<Output = io::Result<()>> + Send;

    /// Close this endpoint. The copy loop reading from it then ends.
    fn close(&mut self) -> impl Future<Output = io::Result<()>> + Send;
}

/// Something that can emit a protocol-level keepalive.
pub trait Pinger: Send + Sync + 'static {
    fn ping(&self) -> impl Future<Output = io::Result<()>> + Send;
}

/// Reading half of a byte stream.
pub struct StreamReader<R> {
    inner: R,
    buf: Box<[u8]>,
}

impl<R> StreamReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: vec![0; READ_BUFFER_SIZE].into_boxed_slice(),
        }
    }
}

impl<R: AsyncRead + Unpin + Send + 'static> PayloadReader for StreamReader<R> {
    async fn read_payload(&mut self) -> io::Result<Option<Bytes>> {
        let n = self.inner.read(&mut self.buf).await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(Bytes::copy_from_slice(&self.buf[..n])))
    }
}

/// Writing half of a byte stream.
pub struct StreamWriter<W> {
    inner: W,
}

impl<W> StreamWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: AsyncWrite + Unpin + Send + 'static> PayloadWriter for StreamWriter<W> {
    async fn write_payload(&mut self, payload: Bytes) -> io::Result<()> {
        self.inner.write_all(&payload).await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.inner.shutdown().await
    }
}

/// Receiving half of the client WebSocket.
pub struct WsReader {
    stream: SplitStream<WebSocket>,
}

impl PayloadReader for WsReader {
    /// Text and binary frames both carry payload; ping and pong are skipped.
    async fn read_payload(&mut self) -> io::Result<Option<Bytes>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(Some(data)),
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(Bytes::copy_from_slice(text.as_str().as_bytes())))
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Err(e)) => return Err(io::Error::other(e)),
            }
        }
    }
}

/// Sending half of the client WebSocket.
///
/// Shared between the downstream copy loop and the keepalive task, so the sink
/// sits behind an async mutex. Payload always goes out as binary frames.
#[derive(Clone)]
pub struct WsWriter {
    sink: Arc<Mutex<SplitSink<WebSocket, Message>>>,
}

impl WsWriter {
    async fn send(&self, message: Message) -> io::Result<()> {
        self.sink.lock().await.send(message).await.map_err(io::Error::other)
    }
}

impl PayloadWriter for WsWriter {
    async fn write_payload(&mut self, payload: Bytes) -> io::Result<()> {
        self.send(Message::Binary(payload)).await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.sink.lock().await.close().await.map_err(io::Error::other)
    }
}

impl Pinger for WsWriter {
    async fn ping(&self) -> io::Result<()> {
        self.send(Message::Ping(Bytes::new())).await
    }
}

/// Split an upgraded socket into its payload halves.
pub fn split_websocket(socket: WebSocket) -> (WsReader, WsWriter) {
    let (sink, stream) = socket.split();
    (
        WsReader { stream },
        WsWriter {
            sink: Arc::new(Mutex::new(sink)),
        },
    )
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stream_endpoints_round_trip_and_eof() {
        let (a, b) = tokio::io::duplex(64);
        let mut writer = StreamWriter::new(a);
        let mut reader = StreamReader::new(b);

        writer.write_payload(Bytes::from_static(b"hello")).await.unwrap();
        let chunk = reader.read_payload().await.unwrap().unwrap();
        assert_eq!(&chunk[..], b"hello");

        writer.close().await.unwrap();
        assert!(reader.read_payload().await.unwrap().is_none());
    }
}
