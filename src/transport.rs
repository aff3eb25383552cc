//! Client for the p0f API socket
//!
//! Every exchange uses a fresh connection: one query written, one response
//! read, then the socket is closed. Connecting, writing and reading are each
//! bounded by the client's timeout on their own, so a slow daemon can hold a
//! caller up for at most that long per stage.

use std::{
    io,
    mem::{offset_of, size_of},
    path::{Path, PathBuf},
    time::Duration,
};

use bincode::error::{DecodeError, EncodeError};
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::{UnixSocket, UnixStream},
    runtime::Runtime,
    time::timeout,
};

use crate::{
    error::{Error, Result, errno},
    incoming, internal,
    logging::LogSink,
    outgoing,
    protocol::{Query, RESPONSE_SIZE, Response},
};

/// Default bound on each socket operation
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Room for a socket path in `sockaddr_un`, terminator included.
const SUN_PATH_LEN: usize = size_of::<libc::sockaddr_un>() - offset_of!(libc::sockaddr_un, sun_path);

/// Longest socket path accepted.
pub const MAX_SOCKET_PATH: usize = SUN_PATH_LEN - 2;

/// Ways an exchange with the daemon can go wrong. These are never returned
/// to callers; the message is what gets logged.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error(
        "p0f: Can't connect to API socket {path} (errno = {}). p0f daemon down or socket name incorrect?",
        errno(.source)
    )]
    Connect { path: String, source: io::Error },

    #[error("p0f: Error {} writing to API socket.", errno(.0))]
    Write(#[source] io::Error),

    #[error("p0f: Short write to API socket.")]
    ShortWrite,

    #[error("p0f: Timed out writing to API socket.")]
    WriteTimeout,

    #[error("p0f: Error {} reading from API socket.", errno(.0))]
    Read(#[source] io::Error),

    #[error("p0f: Short read from API socket.")]
    ShortRead,

    #[error("p0f: Timed out reading from API socket.")]
    ReadTimeout,

    #[error("p0f: Unable to encode query: {0}")]
    Encode(#[from] EncodeError),

    #[error("p0f: Unable to decode response: {0}")]
    Decode(#[from] DecodeError),
}

/// Talks to a p0f daemon listening on `socket_path`.
#[derive(Debug, Clone)]
pub struct Client {
    socket_path: PathBuf,
    timeout: Duration,
}

impl Client {
    /// Create a client for the daemon socket at `socket_path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SocketPathTooLong`] if the path can't be stored in a
    /// Unix socket address.
    pub fn new(socket_path: impl Into<PathBuf>) -> Result<Self> {
        let socket_path = socket_path.into();

        let len = socket_path.as_os_str().len();
        if len > MAX_SOCKET_PATH {
            return Err(Error::SocketPathTooLong {
                len,
                max: MAX_SOCKET_PATH,
            });
        }

        Ok(Self {
            socket_path,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Set the bound on each socket operation
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `query` and wait for the daemon's answer.
    ///
    /// Anything that goes wrong after the socket has been created is written
    /// to `sink` and reported as `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Socket`] if no socket could be created at all.
    pub async fn exchange(&self, query: &Query, sink: &dyn LogSink) -> Result<Option<Response>> {
        let socket = UnixSocket::new_stream().map_err(Error::Socket)?;

        Ok(settle(self.round_trip(socket, query).await, sink))
    }

    async fn round_trip(
        &self,
        socket: UnixSocket,
        query: &Query,
    ) -> std::result::Result<Response, TransportError> {
        let mut stream = self.connect(socket).await?;
        self.converse(&mut stream, query).await
    }

    /// One query out, one response back, over an already connected stream.
    async fn converse<S>(
        &self,
        stream: &mut S,
        query: &Query,
    ) -> std::result::Result<Response, TransportError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let request = query.encode()?;
        outgoing!("{} byte query for {:?}", request.len(), query.address());

        write_query(stream, &request, self.timeout).await?;
        read_response(stream, self.timeout).await
    }

    async fn connect(&self, socket: UnixSocket) -> std::result::Result<UnixStream, TransportError> {
        internal!("Connecting to p0f socket: {}", self.socket_path.display());

        timeout(self.timeout, socket.connect(&self.socket_path))
            .await
            .unwrap_or_else(|_| Err(io::Error::from_raw_os_error(libc::ETIMEDOUT)))
            .map_err(|source| TransportError::Connect {
                path: self.socket_path.display().to_string(),
                source,
            })
    }
}

/// Log a failed exchange to `sink`.
fn settle(
    result: std::result::Result<Response, TransportError>,
    sink: &dyn LogSink,
) -> Option<Response> {
    match result {
        Ok(response) => Some(response),
        Err(err) => {
            sink.log_write(&err.to_string());
            None
        }
    }
}

/// Write the whole query in a single call.
async fn write_query<W>(
    writer: &mut W,
    request: &[u8],
    limit: Duration,
) -> std::result::Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    match timeout(limit, writer.write(request)).await {
        Err(_) => Err(TransportError::WriteTimeout),
        Ok(Err(err)) => Err(TransportError::Write(err)),
        Ok(Ok(written)) if written != request.len() => Err(TransportError::ShortWrite),
        Ok(Ok(_)) => Ok(()),
    }
}

async fn read_response<R>(
    reader: &mut R,
    limit: Duration,
) -> std::result::Result<Response, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = [0; RESPONSE_SIZE];
    let received = timeout(limit, read_record(reader, &mut buffer))
        .await
        .map_err(|_| TransportError::ReadTimeout)?
        .map_err(TransportError::Read)?;

    incoming!("{received} byte response");

    if received != RESPONSE_SIZE {
        return Err(TransportError::ShortRead);
    }

    Ok(Response::decode(&buffer)?)
}

/// Read until `buffer` is full or the daemon hangs up, returning how much
/// was read.
async fn read_record<R>(reader: &mut R, buffer: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;

    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]).await? {
            0 => break,
            read => filled += read,
        }
    }

    Ok(filled)
}

/// A single threaded I/O driver for one blocking lookup.
pub(crate) fn runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()
        .map_err(Error::Runtime)
}
