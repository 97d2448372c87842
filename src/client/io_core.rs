use crate::config::ReadMode;
use crate::oneshot_debug;
use bytes::{Bytes, BytesMut};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

/// Largest slice handed to a single `write_all` call.
const MAX_CHUNK_SIZE: usize = 64 * 1024;
/// Scratch buffer size for the looping read modes.
const READ_CHUNK_SIZE: usize = 16 * 1024;

// The one stream a run owns, with or without TLS on top
pub(crate) enum Connection {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Connection {
    /// Best-effort graceful close (FIN, or `close_notify` for TLS).
    /// Dropping the connection releases the socket either way.
    pub async fn close(mut self) {
        if let Err(e) = self.shutdown().await {
            oneshot_debug!("Shutdown after exchange failed: {:?}", e);
        }
    }
}

impl AsyncRead for Connection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Connection::Plain(tcp) => Pin::new(tcp).poll_read(cx, buf),
            Connection::Tls(tls) => Pin::new(tls.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Connection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Connection::Plain(tcp) => Pin::new(tcp).poll_write(cx, buf),
            Connection::Tls(tls) => Pin::new(tls.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Connection::Plain(tcp) => Pin::new(tcp).poll_flush(cx),
            Connection::Tls(tls) => Pin::new(tls.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Connection::Plain(tcp) => Pin::new(tcp).poll_shutdown(cx),
            Connection::Tls(tls) => Pin::new(tls.as_mut()).poll_shutdown(cx),
        }
    }
}

/* ----------------------------------------------------------------
   Stream helpers, generic so they work on any reader/writer
---------------------------------------------------------------- */

/// Writes the whole payload and flushes. Short writes are continued by
/// `write_all` until every byte is out or the stream fails.
pub async fn write_payload<W>(writer: &mut W, payload: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_CHUNK_SIZE {
        oneshot_debug!("Large payload ({} bytes), writing in {}KB pieces",
                       payload.len(), MAX_CHUNK_SIZE / 1024);
    }

    for chunk in payload.chunks(MAX_CHUNK_SIZE) {
        writer.write_all(chunk).await?;
    }
    writer.flush().await
}

/// Collects one response according to `mode`, never more than `limit` bytes.
pub async fn read_response<R>(reader: &mut R, mode: &ReadMode, limit: usize) -> io::Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    match mode {
        ReadMode::Single => {
            let mut buf = vec![0u8; limit];
            let n = read_some(reader, &mut buf, 0).await?;
            buf.truncate(n);
            Ok(Bytes::from(buf))
        }
        ReadMode::ToClose => {
            let mut buf = BytesMut::with_capacity(limit.min(READ_CHUNK_SIZE));
            let mut chunk = vec![0u8; READ_CHUNK_SIZE];
            loop {
                let room = limit - buf.len();
                if room == 0 {
                    oneshot_debug!("Response reached the {} byte limit, stop reading", limit);
                    break;
                }
                let n = read_some(reader, &mut chunk[..room.min(READ_CHUNK_SIZE)], buf.len()).await?;
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            Ok(buf.freeze())
        }
        ReadMode::UntilDelimiter(delimiter) => {
            read_until(reader, delimiter.as_bytes(), limit).await
        }
    }
}

async fn read_until<R>(reader: &mut R, delimiter: &[u8], limit: usize) -> io::Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(limit.min(READ_CHUNK_SIZE));
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];
    // Everything before `scanned` is known not to start a delimiter
    let mut scanned = 0;

    loop {
        if let Some(pos) = find(&buf[scanned..], delimiter) {
            buf.truncate(scanned + pos);
            break;
        }
        scanned = buf.len().saturating_sub(delimiter.len().saturating_sub(1));

        let room = limit - buf.len();
        if room == 0 {
            oneshot_debug!("No delimiter within {} bytes, returning what was read", limit);
            break;
        }
        let n = read_some(reader, &mut chunk[..room.min(READ_CHUNK_SIZE)], buf.len()).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Ok(buf.freeze())
}

// A TLS peer that closes without close_notify surfaces as UnexpectedEof; treat it as EOF.
// A peer that drops the socket with our payload unread answers with RST instead of FIN,
// which only counts as EOF while nothing of the response has arrived yet.
async fn read_some<R>(reader: &mut R, buf: &mut [u8], received: usize) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    match reader.read(buf).await {
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(0),
        Err(e) if e.kind() == io::ErrorKind::ConnectionReset && received == 0 => {
            oneshot_debug!("Connection reset before any response byte, treating as close");
            Ok(0)
        }
        other => other,
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
