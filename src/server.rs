use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;

use mio::event::Event;
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};
use tracing::{debug, error, info};

use crate::conn::Connection;
use crate::engine::KvdEngine;
use crate::Result;

const LISTENER: Token = Token(0);

// readiness events drained per poll wakeup
const EVENT_CAPACITY: usize = 1024;

/// A TCP socket server over a key value storage engine.
///
/// The server is single-threaded: one poller multiplexes the listening
/// socket and every client connection, and all I/O is non-blocking. Each
/// connection carries its own incoming/outgoing buffers, so partial reads
/// and writes leave the connection parked on the poller in whatever intent
/// state it was in until the socket is ready again.
///
/// The listening socket is bound with `SO_REUSEADDR`; accepted sockets are
/// non-blocking from the start.
///
/// # Example
/// Bind a server backed by the in-memory engine and run it:
/// ```rust
/// use kvd::{KvdServer, MemStore};
/// # use std::error::Error;
/// # fn main() -> Result<(), Box<dyn Error>> {
/// let addr = "127.0.0.1:0".parse()?; // port 0 picks an ephemeral port
/// let server = KvdServer::bind(MemStore::new(), addr)?;
/// // start the server (runs until the process exits)
/// //server.run()?;
/// #
/// # Ok(())
/// # }
/// ```
pub struct KvdServer<E: KvdEngine> {
    /// the kvd engine that requests are executed against
    engine: E,
    poll: Poll,
    listener: TcpListener,
    /// live connections, keyed by their poller token
    conns: HashMap<Token, Connection>,
    next_token: usize,
}

impl<E: KvdEngine> KvdServer<E> {
    /// Creates a server over the given engine, bound and listening on `addr`.
    ///
    /// # Errors
    /// returns [`KvdError::Io`] if the address cannot be bound or the
    /// poller cannot be created
    ///
    /// [`KvdError::Io`]: crate::KvdError
    pub fn bind(engine: E, addr: SocketAddr) -> Result<KvdServer<E>> {
        let poll = Poll::new()?;
        let mut listener = TcpListener::bind(addr)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;

        Ok(KvdServer {
            engine,
            poll,
            listener,
            conns: HashMap::new(),
            next_token: 1,
        })
    }

    /// the address the listening socket is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Runs the event loop until a fatal error occurs.
    ///
    /// Each iteration waits for readiness, accepts whatever connections
    /// are pending, and drives every ready connection through its
    /// read/serve/write cycle. Connections that asked for teardown are
    /// released before the next wait.
    ///
    /// # Errors
    /// returns [`KvdError::Io`] if the readiness wait itself fails with
    /// anything other than a signal interruption
    ///
    /// [`KvdError::Io`]: crate::KvdError
    pub fn run(mut self) -> Result<()> {
        info!("listening on {}", self.listener.local_addr()?);

        let mut events = Events::with_capacity(EVENT_CAPACITY);
        loop {
            if let Err(err) = self.poll.poll(&mut events, None) {
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err.into());
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER => self.accept_ready(),
                    token => self.conn_ready(token, event),
                }
            }
        }
    }

    /// accepts pending connections until the listener would block
    fn accept_ready(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((socket, peer)) => {
                    let token = Token(self.next_token);
                    self.next_token += 1;

                    let mut conn = Connection::new(socket);
                    let interest = conn.interest();
                    if let Err(err) = self
                        .poll
                        .registry()
                        .register(&mut conn.socket, token, interest)
                    {
                        error!("failed to register connection from {}: {}", peer, err);
                        continue; // dropping the connection closes the socket
                    }
                    debug!("accepted connection from {}", peer);
                    self.conns.insert(token, conn);
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    // a failed accept does not take the server down
                    error!("accept failed: {}", err);
                    break;
                }
            }
        }
    }

    /// drives one connection through whatever readiness was reported
    fn conn_ready(&mut self, token: Token, event: &Event) {
        let conn = match self.conns.get_mut(&token) {
            Some(conn) => conn,
            // the connection was torn down earlier in this batch
            None => return,
        };

        if event.is_error() {
            conn.close_now();
        }
        if event.is_readable() && conn.wants_read() {
            conn.receive(&mut self.engine);
            if conn.wants_write() {
                // attempt one immediate write; the response often fits
                // without waiting for a writable event
                conn.transmit();
            }
        }
        if event.is_writable() && conn.wants_write() {
            conn.transmit();
        }

        if conn.wants_close() {
            self.teardown(token);
            return;
        }
        let interest = conn.interest();
        if let Err(err) = self
            .poll
            .registry()
            .reregister(&mut conn.socket, token, interest)
        {
            error!("failed to reregister connection: {}", err);
            self.teardown(token);
        }
    }

    /// removes a connection from the poller and the index; dropping it
    /// closes the socket and releases its buffers
    fn teardown(&mut self, token: Token) {
        if let Some(mut conn) = self.conns.remove(&token) {
            if let Err(err) = self.poll.registry().deregister(&mut conn.socket) {
                debug!("deregister failed: {}", err);
            }
            debug!("closed connection");
        }
    }
}
