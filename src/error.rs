/// Socket creation, resolution and lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("socket() failed: {}", errno_to_str(*.errno))]
    Create { errno: i32 },

    #[error("bind({addr}) failed: {}", errno_to_str(*.errno))]
    Bind { errno: i32, addr: String },

    #[error("listen(backlog={backlog}) failed: {}", errno_to_str(*.errno))]
    Listen { errno: i32, backlog: i32 },

    #[error("connect({addr}) failed: {}", errno_to_str(*.errno))]
    Connect { errno: i32, addr: String },

    #[error("accept() failed: {}", errno_to_str(*.errno))]
    Accept { errno: i32 },

    #[error("close() failed: {}", errno_to_str(*.errno))]
    Close { errno: i32 },

    #[error("shutdown() failed: {}", errno_to_str(*.errno))]
    Shutdown { errno: i32 },

    #[error("setsockopt({option}) failed: {}", errno_to_str(*.errno))]
    SetOption { errno: i32, option: &'static str },

    #[error("getsockopt({option}) failed: {}", errno_to_str(*.errno))]
    GetOption { errno: i32, option: &'static str },

    #[error("invalid address: {reason}")]
    InvalidAddress { reason: &'static str },

    /// Name lookup itself failed; there are no candidates to retry.
    #[error("getaddrinfo({host:?}, {service:?}) failed: {reason}")]
    Resolve { host: String, service: String, code: i32, reason: String },

    /// Every candidate address failed to bind or connect.
    #[error("could not establish endpoint for {host:?}:{service:?}: {}", errno_to_str(*.errno))]
    Exhausted { host: String, service: String, errno: i32 },

    /// The operation is not defined for the endpoint's current role.
    #[error("{operation} requires a {expected} endpoint, found {found}")]
    InvalidRole { operation: &'static str, expected: &'static str, found: &'static str },

    #[error("getnameinfo() failed: {reason}")]
    NameInfo { code: i32, reason: String },

    #[error("poll() failed: {}", errno_to_str(*.errno))]
    Poll { errno: i32 },
}

/// I/O operation errors.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("recv() failed: {}", errno_to_str(*.errno))]
    Read { errno: i32 },

    #[error("send() failed: {}", errno_to_str(*.errno))]
    Write { errno: i32 },

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("operation would block")]
    WouldBlock,

    #[error("interrupted by signal")]
    Interrupted,

    /// An error raised by a foreign `Read`/`Write` implementation.
    #[error("stream error: {source}")]
    Other { source: std::io::Error },
}

/// Wire framing and stream protocol violations.
///
/// These point at a misbehaving peer or caller, never at a dead connection.
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("frame does not start with the start marker (found {found:#04x})")]
    MissingStart { found: u8 },

    #[error("stream ended inside a {context}")]
    Truncated { context: &'static str },

    #[error("framed string is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("expected field separator {expected:#04x}, found {found:#04x}")]
    MissingSeparator { expected: u8, found: u8 },

    #[error("frame markers must be distinct (start={start:#04x} end={end:#04x} escape={escape:#04x} separator={separator:#04x})")]
    MarkerConflict { start: u8, end: u8, escape: u8, separator: u8 },

    #[error("no previously read byte is left to unget")]
    PushbackExhausted,
}

/// Crate-wide error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Socket(#[from] SocketError),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Framing(#[from] FramingError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True when the operation made no progress and may be retried after readiness.
    pub fn is_would_block(&self) -> bool {
        matches!(self, Error::Io(IoError::WouldBlock))
    }

    /// True when the peer is gone and the connection should be closed.
    pub fn is_disconnected(&self) -> bool {
        match self {
            Error::Io(IoError::ConnectionClosed) => true,
            Error::Io(IoError::Read { errno } | IoError::Write { errno }) => {
                matches!(*errno, libc::ECONNRESET | libc::EPIPE | libc::ENOTCONN)
            }
            _ => false,
        }
    }

    /// True for peer-protocol and caller-logic violations.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Error::Framing(_) | Error::Socket(SocketError::InvalidRole { .. }))
    }

    /// The OS status code carried by this error, if any.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            Error::Socket(err) => socket_errno(err),
            Error::Io(IoError::Read { errno } | IoError::Write { errno }) => Some(*errno),
            Error::Io(IoError::Other { source }) => source.raw_os_error(),
            _ => None,
        }
    }
}

/// Returns current errno value.
#[inline]
pub fn errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

/// Converts errno to human-readable string.
fn errno_to_str(errno: i32) -> String {
    match errno {
        libc::EACCES => "permission denied".into(),
        libc::EADDRINUSE => "address already in use".into(),
        libc::EADDRNOTAVAIL => "address not available".into(),
        libc::EAFNOSUPPORT => "address family not supported".into(),
        libc::EAGAIN => "resource temporarily unavailable".into(),
        libc::EBADF => "bad file descriptor".into(),
        libc::ECONNREFUSED => "connection refused".into(),
        libc::ECONNRESET => "connection reset by peer".into(),
        libc::EINPROGRESS => "operation in progress".into(),
        libc::EINTR => "interrupted by signal".into(),
        libc::EINVAL => "invalid argument".into(),
        libc::EMFILE => "too many open files".into(),
        libc::ENETUNREACH => "network unreachable".into(),
        libc::ENOBUFS => "no buffer space available".into(),
        libc::ENOTCONN => "not connected".into(),
        libc::EPIPE => "broken pipe".into(),
        libc::ETIMEDOUT => "connection timed out".into(),
        0 => "no candidate address".into(),
        _ => format!("errno {}", errno),
    }
}

/// Maps errno to std::io::ErrorKind.
fn errno_to_kind(errno: i32) -> std::io::ErrorKind {
    match errno {
        libc::EACCES | libc::EPERM => std::io::ErrorKind::PermissionDenied,
        libc::EADDRINUSE => std::io::ErrorKind::AddrInUse,
        libc::EADDRNOTAVAIL => std::io::ErrorKind::AddrNotAvailable,
        libc::EAGAIN => std::io::ErrorKind::WouldBlock,
        libc::ECONNREFUSED => std::io::ErrorKind::ConnectionRefused,
        libc::ECONNRESET => std::io::ErrorKind::ConnectionReset,
        libc::EINTR => std::io::ErrorKind::Interrupted,
        libc::EINVAL => std::io::ErrorKind::InvalidInput,
        libc::ENOTCONN => std::io::ErrorKind::NotConnected,
        libc::EPIPE => std::io::ErrorKind::BrokenPipe,
        libc::ETIMEDOUT => std::io::ErrorKind::TimedOut,
        _ => std::io::ErrorKind::Other,
    }
}

fn socket_errno(err: &SocketError) -> Option<i32> {
    match err {
        SocketError::Create { errno }
        | SocketError::Bind { errno, .. }
        | SocketError::Listen { errno, .. }
        | SocketError::Connect { errno, .. }
        | SocketError::Accept { errno }
        | SocketError::Close { errno }
        | SocketError::Shutdown { errno }
        | SocketError::SetOption { errno, .. }
        | SocketError::GetOption { errno, .. }
        | SocketError::Exhausted { errno, .. }
        | SocketError::Poll { errno } => Some(*errno),
        SocketError::InvalidAddress { .. } | SocketError::InvalidRole { .. } => Some(libc::EINVAL),
        SocketError::Resolve { .. } | SocketError::NameInfo { .. } => None,
    }
}

impl From<SocketError> for std::io::Error {
    fn from(err: SocketError) -> Self {
        let kind = socket_errno(&err).map_or(std::io::ErrorKind::Other, errno_to_kind);
        std::io::Error::new(kind, err)
    }
}

impl From<IoError> for std::io::Error {
    fn from(err: IoError) -> Self {
        let kind = match &err {
            IoError::Read { errno } => errno_to_kind(*errno),
            IoError::Write { errno } => errno_to_kind(*errno),
            IoError::ConnectionClosed => std::io::ErrorKind::ConnectionReset,
            IoError::WouldBlock => std::io::ErrorKind::WouldBlock,
            IoError::Interrupted => std::io::ErrorKind::Interrupted,
            IoError::Other { source } => source.kind(),
        };
        std::io::Error::new(kind, err)
    }
}

impl From<FramingError> for std::io::Error {
    fn from(err: FramingError) -> Self {
        std::io::Error::new(std::io::ErrorKind::InvalidData, err)
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Socket(err) => err.into(),
            Error::Io(err) => err.into(),
            Error::Framing(err) => err.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    /// Recovers this crate's error payloads from a `std::io::Error`, so errors
    /// that travelled through `Read`/`Write` keep their classification.
    fn from(err: std::io::Error) -> Self {
        let kind = err.kind();
        if err.get_ref().is_none() {
            return match kind {
                std::io::ErrorKind::WouldBlock => Error::Io(IoError::WouldBlock),
                std::io::ErrorKind::Interrupted => Error::Io(IoError::Interrupted),
                std::io::ErrorKind::UnexpectedEof => Error::Io(IoError::ConnectionClosed),
                _ => Error::Io(IoError::Other { source: err }),
            };
        }
        let Some(inner) = err.into_inner() else {
            return Error::Io(IoError::Other { source: kind.into() });
        };
        let inner = match inner.downcast::<IoError>() {
            Ok(io) => return Error::Io(*io),
            Err(inner) => inner,
        };
        let inner = match inner.downcast::<SocketError>() {
            Ok(socket) => return Error::Socket(*socket),
            Err(inner) => inner,
        };
        match inner.downcast::<FramingError>() {
            Ok(framing) => Error::Framing(*framing),
            Err(inner) => Error::Io(IoError::Other { source: std::io::Error::new(kind, inner) }),
        }
    }
}
