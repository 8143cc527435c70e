use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use bytes::BytesMut;
use tracing::debug;

use crate::protocol::{self, Status};
use crate::{KvdError, Result};

/// `KvdClient` contains the functionality for communication with a [`KvdServer`]
///
/// It speaks the length-prefixed binary protocol over a blocking TCP
/// stream: one request frame out, one response frame back.
///
/// [`KvdServer`]: crate::KvdServer
pub struct KvdClient {
    stream: TcpStream,
}

impl KvdClient {
    /// creates a client and establishes a socket connection to the server at the given `addr`
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<KvdClient> {
        let stream = TcpStream::connect(addr)?;
        debug!("connected to {}", stream.peer_addr()?);
        Ok(KvdClient { stream })
    }

    /// gets the value of the specified `key` from the server
    /// ## Returns
    /// `Ok<Some<Vec<u8>>>` if a value was found for the key.
    /// `Ok<None>` if there is no value associated with the key
    /// # Errors
    /// `Err<KvdError::Server>` if the server rejected the request
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.request(&[&b"get"[..], key])? {
            (Status::Ok, payload) => Ok(Some(payload)),
            (Status::Nx, _) => Ok(None),
            (Status::Err, _) => Err(KvdError::Server("server rejected get".to_string())),
        }
    }

    /// sends a set key/value request to the server
    /// # Errors
    /// `Err<KvdError::Server>` if the server answered anything but `OK`
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        match self.request(&[&b"set"[..], key, value])? {
            (Status::Ok, _) => Ok(()),
            (status, _) => Err(KvdError::Server(format!(
                "unexpected {:?} response to set",
                status
            ))),
        }
    }

    /// removes a key and its associated value from the store
    ///
    /// removing a key that does not exist is not an error
    /// # Errors
    /// `Err<KvdError::Server>` if the server answered anything but `OK`
    pub fn del(&mut self, key: &[u8]) -> Result<()> {
        match self.request(&[&b"del"[..], key])? {
            (Status::Ok, _) => Ok(()),
            (status, _) => Err(KvdError::Server(format!(
                "unexpected {:?} response to del",
                status
            ))),
        }
    }

    /// writes one request frame and reads back one response frame
    fn request(&mut self, args: &[&[u8]]) -> Result<(Status, Vec<u8>)> {
        let mut buf = BytesMut::new();
        protocol::write_request(&mut buf, args);
        self.stream.write_all(&buf)?;

        let mut header = [0u8; 4];
        self.stream.read_exact(&mut header)?;
        let reslen = u32::from_le_bytes(header) as usize;
        if reslen > protocol::MAX_MSG {
            return Err(protocol::FrameError::Oversize(reslen).into());
        }
        if reslen < 4 {
            return Err(KvdError::Server(format!(
                "response length {} is shorter than the status word",
                reslen
            )));
        }

        let mut body = vec![0u8; reslen];
        self.stream.read_exact(&mut body)?;
        let code = u32::from_le_bytes([body[0], body[1], body[2], body[3]]);
        let status = Status::from_code(code)
            .ok_or_else(|| KvdError::Server(format!("unknown status code {}", code)))?;
        let payload = body.split_off(4);
        Ok((status, payload))
    }
}
