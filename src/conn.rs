use std::io::{self, Read, Write};

use bytes::{Buf, BytesMut};
use mio::net::TcpStream;
use mio::Interest;
use tracing::debug;

use crate::command;
use crate::engine::KvdEngine;
use crate::protocol;

// bytes read from the socket per read() call
const READ_CHUNK: usize = 64 * 1024;

/// One client connection: the socket, a buffer for bytes read but not yet
/// parsed, a buffer for responses not yet written, and the intent flags
/// telling the event loop what readiness this connection waits for.
///
/// Exactly one of `want_read`/`want_write` is set at any moment. While the
/// outgoing buffer is non-empty the connection waits for writability only,
/// so no further incoming data accumulates until the peer has drained what
/// it already asked for. Once `want_close` is raised the event loop tears
/// the connection down before the next readiness wait.
pub(crate) struct Connection {
    pub(crate) socket: TcpStream,
    incoming: BytesMut,
    outgoing: BytesMut,
    want_read: bool,
    want_write: bool,
    want_close: bool,
}

impl Connection {
    pub(crate) fn new(socket: TcpStream) -> Connection {
        Connection {
            socket,
            incoming: BytesMut::new(),
            outgoing: BytesMut::new(),
            want_read: true,
            want_write: false,
            want_close: false,
        }
    }

    /// the readiness interest to register with the poller
    pub(crate) fn interest(&self) -> Interest {
        if self.want_write {
            Interest::WRITABLE
        } else {
            Interest::READABLE
        }
    }

    pub(crate) fn wants_read(&self) -> bool {
        self.want_read
    }

    pub(crate) fn wants_write(&self) -> bool {
        self.want_write
    }

    pub(crate) fn wants_close(&self) -> bool {
        self.want_close
    }

    /// marks the connection for teardown (error-class readiness)
    pub(crate) fn close_now(&mut self) {
        self.want_close = true;
    }

    /// Reads whatever the socket currently holds and serves every complete
    /// request that arrived.
    ///
    /// The socket is drained until it would block, as the poller is
    /// edge-triggered. EOF or a read error marks the connection for
    /// teardown.
    pub(crate) fn receive<E: KvdEngine>(&mut self, engine: &mut E) {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.socket.read(&mut chunk) {
                Ok(0) => {
                    debug!("peer closed the connection");
                    self.want_close = true;
                    return;
                }
                Ok(n) => {
                    self.incoming.extend_from_slice(&chunk[..n]);
                    self.process(engine);
                    if self.want_close || self.want_write {
                        return;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    debug!("read error: {}", err);
                    self.want_close = true;
                    return;
                }
            }
        }
    }

    /// Parses and serves as many complete requests as the incoming buffer
    /// holds, then flips intent to write if any responses were queued.
    ///
    /// A frame error is non-recoverable: the connection is marked for
    /// teardown and whatever was already queued is not extended.
    fn process<E: KvdEngine>(&mut self, engine: &mut E) {
        loop {
            match protocol::parse_request(&mut self.incoming) {
                Ok(Some(args)) => command::execute(engine, args, &mut self.outgoing),
                Ok(None) => break,
                Err(err) => {
                    debug!("dropping connection: {}", err);
                    self.want_close = true;
                    break;
                }
            }
        }
        if !self.outgoing.is_empty() && self.want_read {
            self.want_read = false;
            self.want_write = true;
        }
    }

    /// Writes from the head of the outgoing buffer until it drains or the
    /// socket would block, then flips intent back to read on a full drain.
    pub(crate) fn transmit(&mut self) {
        while !self.outgoing.is_empty() {
            match self.socket.write(&self.outgoing) {
                Ok(0) => {
                    self.want_close = true;
                    return;
                }
                Ok(n) => self.outgoing.advance(n),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    debug!("write error: {}", err);
                    self.want_close = true;
                    return;
                }
            }
        }
        if self.want_write {
            self.want_write = false;
            self.want_read = true;
        }
    }
}
