use bytes::BytesMut;

use crate::engine::KvdEngine;
use crate::protocol::{self, Status};

/// These are the request "commands" that can be made to the key/value store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// fetch the value stored for a key
    Get {
        /// the key to look up
        key: Vec<u8>,
    },
    /// store a value for a key, replacing any previous value
    Set {
        /// the key to store under
        key: Vec<u8>,
        /// the value to store
        value: Vec<u8>,
    },
    /// remove a key and its value
    Del {
        /// the key to remove
        key: Vec<u8>,
    },
}

impl Request {
    /// Matches a parsed argument vector against the known command shapes.
    ///
    /// Returns `None` when the verb is unrecognized or the arity is wrong;
    /// the caller answers those with an `ERR` response. Verbs are matched
    /// case-sensitively.
    pub fn from_args(args: Vec<Vec<u8>>) -> Option<Request> {
        let mut args = args.into_iter();
        match (args.next(), args.next(), args.next(), args.next()) {
            (Some(verb), Some(key), None, None) if verb == b"get" => Some(Request::Get { key }),
            (Some(verb), Some(key), Some(value), None) if verb == b"set" => {
                Some(Request::Set { key, value })
            }
            (Some(verb), Some(key), None, None) if verb == b"del" => Some(Request::Del { key }),
            _ => None,
        }
    }
}

/// Executes one request against the engine and appends exactly one framed
/// response to `out`.
///
/// `get` answers `OK` with the value, or `NX` when the key is absent.
/// `set` and `del` answer `OK` with an empty payload; `del` does so whether
/// or not the key existed. Anything else answers `ERR`.
pub(crate) fn execute<E: KvdEngine>(engine: &mut E, args: Vec<Vec<u8>>, out: &mut BytesMut) {
    match Request::from_args(args) {
        Some(Request::Get { key }) => match engine.get(&key) {
            Some(value) => protocol::write_response(out, Status::Ok, value),
            None => protocol::write_response(out, Status::Nx, &[]),
        },
        Some(Request::Set { key, value }) => {
            engine.set(key, value);
            protocol::write_response(out, Status::Ok, &[]);
        }
        Some(Request::Del { key }) => {
            engine.remove(&key);
            protocol::write_response(out, Status::Ok, &[]);
        }
        None => protocol::write_response(out, Status::Err, &[]),
    }
}
