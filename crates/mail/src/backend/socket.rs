//! TCP transport for the sync stream that can be shut from another thread
//!
//! A read blocked on the event stream only returns once the socket is
//! shut down, so the connector keeps a clone of each socket it opens.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::debug;
use ureq::Error;
use ureq::unversioned::transport::{Buffers, ConnectionDetails, Connector, LazyBuffers, NextTimeout, Transport};

/// Shared handle to the socket of the stream's connection
#[derive(Clone, Default)]
pub struct SocketHandle(Arc<Mutex<Option<TcpStream>>>);

impl SocketHandle {
    fn slot(&self) -> MutexGuard<'_, Option<TcpStream>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Shut both directions; a read blocked on the socket returns at once
    pub fn shutdown(&self) {
        if let Some(stream) = self.slot().take() {
            debug!("Shutting down sync stream socket");
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                debug!("Sync stream socket already closed: {}", e);
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.slot().is_some()
    }
}

/// Plain TCP connector that registers its socket with a [`SocketHandle`]
pub struct ClosableTcpConnector {
    handle: SocketHandle,
}

impl ClosableTcpConnector {
    pub fn new(handle: SocketHandle) -> Self {
        Self { handle }
    }
}

impl Connector for ClosableTcpConnector {
    type Out = ClosableTcpTransport;

    fn connect(&self, details: &ConnectionDetails, _chained: Option<()>) -> Result<Option<Self::Out>, Error> {
        let stream = connect_any(details)?;
        if details.config.no_delay() {
            stream.set_nodelay(true)?;
        }
        *self.handle.slot() = Some(stream.try_clone()?);

        let buffers = LazyBuffers::new(details.config.input_buffer_size(), details.config.output_buffer_size());
        Ok(Some(ClosableTcpTransport {
            stream,
            buffers,
            read_timeout: None,
            write_timeout: None,
        }))
    }
}

fn connect_any(details: &ConnectionDetails) -> Result<TcpStream, Error> {
    let timeout = details.timeout.not_zero().map(|t| *t);
    let mut last_err = None;

    for addr in &details.addrs {
        let attempt = match timeout {
            Some(timeout) => TcpStream::connect_timeout(addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => {
                debug!("Connected sync stream to {}", addr);
                return Ok(stream);
            }
            Err(e) => {
                debug!("Connecting to {} failed: {}", addr, e);
                last_err = Some(io_error(e, details.timeout));
            }
        }
    }

    Err(last_err.unwrap_or_else(|| {
        Error::Io(io::Error::new(io::ErrorKind::ConnectionRefused, "no address to connect to"))
    }))
}

fn io_error(e: io::Error, timeout: NextTimeout) -> Error {
    match e.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Error::Timeout(timeout.reason),
        _ => Error::Io(e),
    }
}

pub struct ClosableTcpTransport {
    stream: TcpStream,
    buffers: LazyBuffers,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl Transport for ClosableTcpTransport {
    fn buffers(&mut self) -> &mut dyn Buffers {
        &mut self.buffers
    }

    fn transmit_output(&mut self, amount: usize, timeout: NextTimeout) -> Result<(), Error> {
        let wanted = timeout.not_zero().map(|t| *t);
        if wanted != self.write_timeout {
            self.stream.set_write_timeout(wanted)?;
            self.write_timeout = wanted;
        }

        let output = &self.buffers.output()[..amount];
        self.stream.write_all(output).map_err(|e| io_error(e, timeout))
    }

    fn await_input(&mut self, timeout: NextTimeout) -> Result<bool, Error> {
        let wanted = timeout.not_zero().map(|t| *t);
        if wanted != self.read_timeout {
            self.stream.set_read_timeout(wanted)?;
            self.read_timeout = wanted;
        }

        let input = self.buffers.input_append_buf();
        let amount = self.stream.read(input).map_err(|e| io_error(e, timeout))?;
        self.buffers.input_appended(amount);
        Ok(amount > 0)
    }

    /// Each stream gets its own agent, so connections are never reused
    fn is_open(&mut self) -> bool {
        false
    }
}

impl fmt::Debug for ClosableTcpConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosableTcpConnector")
            .field("connected", &self.handle.is_connected())
            .finish()
    }
}

impl fmt::Debug for ClosableTcpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosableTcpTransport")
            .field("addr", &self.stream.peer_addr().ok())
            .finish()
    }
}
