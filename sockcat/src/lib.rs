//! sockcat connects to a unix stream socket, sends one request, and returns the single response
//! the peer answers with.
//!
//! The exchange is minimal:  connect, write the entire request, perform exactly one
//! read of at most [RESPONSE_SIZE] bytes, and close.  There is no framing.  Whatever the peer's
//! first reply segment contains is the response.

use std::fmt::{Display, Formatter};
use std::io::{ErrorKind, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;

use arrrg_derive::CommandLine;
use biometrics::Counter;
use indicio::{clue, INFO};
use utf8path::Path;

/// The most bytes a single exchange will return.  Any remainder of a longer reply is never read.
pub const RESPONSE_SIZE: usize = 1024;

//////////////////////////////////////////// biometrics ////////////////////////////////////////////

static CONNECT: Counter = Counter::new("sockcat.connect");
static TRANSMIT: Counter = Counter::new("sockcat.transmit");
static TRANSMIT_BYTES: Counter = Counter::new("sockcat.transmit.bytes");
static HALF_CLOSE: Counter = Counter::new("sockcat.half_close");
static RECEIVE: Counter = Counter::new("sockcat.receive");
static RECEIVE_BYTES: Counter = Counter::new("sockcat.receive.bytes");
static RECEIVE_EMPTY: Counter = Counter::new("sockcat.receive.empty");
static RECEIVE_INTERRUPTED: Counter = Counter::new("sockcat.receive.interrupted");

static CONNECT_ERROR: Counter = Counter::new("sockcat.error.connect");
static TRANSMIT_ERROR: Counter = Counter::new("sockcat.error.transmit");
static RECEIVE_ERROR: Counter = Counter::new("sockcat.error.receive");
static READ_REQUEST_ERROR: Counter = Counter::new("sockcat.error.read_request");
static WRITE_RESPONSE_ERROR: Counter = Counter::new("sockcat.error.write_response");

pub fn register_biometrics(collector: &biometrics::Collector) {
    collector.register_counter(&CONNECT);
    collector.register_counter(&TRANSMIT);
    collector.register_counter(&TRANSMIT_BYTES);
    collector.register_counter(&HALF_CLOSE);
    collector.register_counter(&RECEIVE);
    collector.register_counter(&RECEIVE_BYTES);
    collector.register_counter(&RECEIVE_EMPTY);
    collector.register_counter(&RECEIVE_INTERRUPTED);
    collector.register_counter(&CONNECT_ERROR);
    collector.register_counter(&TRANSMIT_ERROR);
    collector.register_counter(&RECEIVE_ERROR);
    collector.register_counter(&READ_REQUEST_ERROR);
    collector.register_counter(&WRITE_RESPONSE_ERROR);
}

pub static COLLECTOR: indicio::Collector = indicio::Collector::new();

/////////////////////////////////////////////// Error //////////////////////////////////////////////

/// Every way an exchange can fail.  Each variant names the step that failed; the underlying
/// system error is carried as its kind and rendered text.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Error {
    Connect {
        path: String,
        kind: ErrorKind,
        what: String,
    },
    Transmit {
        kind: ErrorKind,
        what: String,
    },
    Receive {
        kind: ErrorKind,
        what: String,
    },
    ReadRequest {
        kind: ErrorKind,
        what: String,
    },
    WriteResponse {
        kind: ErrorKind,
        what: String,
    },
}

impl Error {
    fn connect(path: &Path, err: std::io::Error) -> Self {
        CONNECT_ERROR.click();
        Self::Connect {
            path: path.as_str().to_string(),
            kind: err.kind(),
            what: err.to_string(),
        }
    }

    fn transmit(err: std::io::Error) -> Self {
        TRANSMIT_ERROR.click();
        Self::Transmit {
            kind: err.kind(),
            what: err.to_string(),
        }
    }

    fn receive(err: std::io::Error) -> Self {
        RECEIVE_ERROR.click();
        Self::Receive {
            kind: err.kind(),
            what: err.to_string(),
        }
    }

    fn read_request(err: std::io::Error) -> Self {
        READ_REQUEST_ERROR.click();
        Self::ReadRequest {
            kind: err.kind(),
            what: err.to_string(),
        }
    }

    fn write_response(err: std::io::Error) -> Self {
        WRITE_RESPONSE_ERROR.click();
        Self::WriteResponse {
            kind: err.kind(),
            what: err.to_string(),
        }
    }

    /// The kind of the system error that caused this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connect { kind, .. } => *kind,
            Error::Transmit { kind, .. } => *kind,
            Error::Receive { kind, .. } => *kind,
            Error::ReadRequest { kind, .. } => *kind,
            Error::WriteResponse { kind, .. } => *kind,
        }
    }
}

impl Display for Error {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Error::Connect { path, what, .. } => {
                write!(fmt, "could not connect to {path}: {what}")
            }
            Error::Transmit { what, .. } => write!(fmt, "could not send request: {what}"),
            Error::Receive { what, .. } => write!(fmt, "could not receive response: {what}"),
            Error::ReadRequest { what, .. } => write!(fmt, "could not read request: {what}"),
            Error::WriteResponse { what, .. } => {
                write!(fmt, "could not write response: {what}")
            }
        }
    }
}

impl std::error::Error for Error {}

////////////////////////////////////////// SockcatOptions //////////////////////////////////////////

#[derive(Clone, CommandLine, Debug, Default, Eq, PartialEq)]
pub struct SockcatOptions {
    #[arrrg(flag, "Shut down the write half of the socket once the request is sent.")]
    pub half_close: bool,
    #[arrrg(flag, "Log each step of the exchange to stderr.")]
    pub verbose: bool,
}

////////////////////////////////////////////// Client //////////////////////////////////////////////

/// A client for one unix stream socket.  Each call to [Client::exchange] opens and closes its own
/// connection.
pub struct Client {
    path: Path<'static>,
    half_close: bool,
}

impl Client {
    pub fn new<'a>(path: impl Into<Path<'a>>) -> Result<Self, Error> {
        let path = path.into().into_owned();
        Ok(Client {
            path,
            half_close: false,
        })
    }

    /// Signal end-of-request to the peer by shutting down the write half after sending.
    pub fn with_half_close(mut self, half_close: bool) -> Self {
        self.half_close = half_close;
        self
    }

    pub fn path(&self) -> &Path<'static> {
        &self.path
    }

    /// Connect, send all of `request`, and return what one read of at most [RESPONSE_SIZE] bytes
    /// yields.  An empty response means the peer closed without replying.
    pub fn exchange(&self, request: &[u8]) -> Result<Vec<u8>, Error> {
        let mut stream =
            UnixStream::connect(self.path.as_str()).map_err(|err| Error::connect(&self.path, err))?;
        CONNECT.click();
        clue!(COLLECTOR, INFO, {
            connected: self.path.as_str(),
        });
        stream.write_all(request).map_err(Error::transmit)?;
        TRANSMIT.click();
        TRANSMIT_BYTES.count(request.len() as u64);
        clue!(COLLECTOR, INFO, {
            sent: request.len() as u64,
        });
        if self.half_close {
            stream.shutdown(Shutdown::Write).map_err(Error::transmit)?;
            HALF_CLOSE.click();
        }
        let mut buf = [0u8; RESPONSE_SIZE];
        let amt = loop {
            match stream.read(&mut buf) {
                Ok(amt) => break amt,
                // Interrupted before any bytes arrived; the retry is still the single receive.
                Err(err) if err.kind() == ErrorKind::Interrupted => {
                    RECEIVE_INTERRUPTED.click();
                }
                Err(err) => return Err(Error::receive(err)),
            }
        };
        RECEIVE.click();
        RECEIVE_BYTES.count(amt as u64);
        if amt == 0 {
            RECEIVE_EMPTY.click();
        }
        clue!(COLLECTOR, INFO, {
            received: amt as u64,
        });
        Ok(buf[..amt].to_vec())
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        write!(fmt, "Client({:?})", self.path)
    }
}

//////////////////////////////////////////////// run ///////////////////////////////////////////////

/// Perform a single exchange against the socket at `path`.
pub fn run<'a>(path: impl Into<Path<'a>>, request: &[u8]) -> Result<Vec<u8>, Error> {
    Client::new(path)?.exchange(request)
}

/// Read `input` to its end, exchange it with the socket at `path`, and write the response to
/// `output`.  Returns the number of response bytes written.  Nothing reaches `output` unless the
/// exchange succeeds.
pub fn exchange_stdio<'a>(
    options: &SockcatOptions,
    path: impl Into<Path<'a>>,
    mut input: impl Read,
    mut output: impl Write,
) -> Result<usize, Error> {
    let mut request = vec![];
    input
        .read_to_end(&mut request)
        .map_err(Error::read_request)?;
    clue!(COLLECTOR, INFO, {
        request: request.len() as u64,
    });
    let client = Client::new(path)?.with_half_close(options.half_close);
    let response = client.exchange(&request)?;
    output.write_all(&response).map_err(Error::write_response)?;
    output.flush().map_err(Error::write_response)?;
    Ok(response.len())
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////
