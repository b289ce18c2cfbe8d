//! Request and response payloads
//!
//! Strings and blobs are length-prefixed (u32, little-endian); lists are a
//! u32 count followed by their strings. A payload must be consumed exactly.

use super::frame::{read_frame, write_frame, Opcode};
use crate::error::{ErrorCode, StoreError, StoreResult};
use crate::key::ContentKey;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read, Write};

/// Requests understood by storage nodes (data plane) and the router (admin plane)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    WriteFile { key: ContentKey, data: Vec<u8> },
    ReadFile { key: ContentKey },
    DeleteFile { key: ContentKey },
    ListFiles,
    Ping,
    ListNodes,
    AddNode { endpoint: String },
    RemoveNode { endpoint: String },
}

/// Successful replies; failures travel as `StoreError`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Written,
    Data(Vec<u8>),
    Deleted,
    Files(Vec<String>),
    Pong,
    Nodes(Vec<String>),
    NodeAdded { migrated: u32 },
    NodeRemoved { migrated: u32 },
}

impl Request {
    pub fn opcode(&self) -> Opcode {
        match self {
            Request::WriteFile { .. } => Opcode::WriteFile,
            Request::ReadFile { .. } => Opcode::ReadFile,
            Request::DeleteFile { .. } => Opcode::DeleteFile,
            Request::ListFiles => Opcode::ListFiles,
            Request::Ping => Opcode::Ping,
            Request::ListNodes => Opcode::ListNodes,
            Request::AddNode { .. } => Opcode::AddNode,
            Request::RemoveNode { .. } => Opcode::RemoveNode,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Request::WriteFile { key, data } => {
                put_key(&mut buf, key);
                put_bytes(&mut buf, data);
            }
            Request::ReadFile { key } | Request::DeleteFile { key } => put_key(&mut buf, key),
            Request::AddNode { endpoint } | Request::RemoveNode { endpoint } => {
                put_str(&mut buf, endpoint)
            }
            Request::ListFiles | Request::Ping | Request::ListNodes => {}
        }
        buf
    }

    pub fn decode(opcode: Opcode, payload: &[u8]) -> StoreResult<Self> {
        let mut cur = Cursor::new(payload);
        let request = match opcode {
            Opcode::WriteFile => {
                let key = get_key(&mut cur)?;
                let data = get_bytes(&mut cur)?;
                Request::WriteFile { key, data }
            }
            Opcode::ReadFile => Request::ReadFile {
                key: get_key(&mut cur)?,
            },
            Opcode::DeleteFile => Request::DeleteFile {
                key: get_key(&mut cur)?,
            },
            Opcode::ListFiles => Request::ListFiles,
            Opcode::Ping => Request::Ping,
            Opcode::ListNodes => Request::ListNodes,
            Opcode::AddNode => Request::AddNode {
                endpoint: get_str(&mut cur)?,
            },
            Opcode::RemoveNode => Request::RemoveNode {
                endpoint: get_str(&mut cur)?,
            },
            Opcode::Failure => {
                return Err(StoreError::Protocol(
                    "failure frame is not a request".to_string(),
                ))
            }
        };
        finish(&cur)?;
        Ok(request)
    }
}

impl Response {
    pub fn opcode(&self) -> Opcode {
        match self {
            Response::Written => Opcode::WriteFile,
            Response::Data(_) => Opcode::ReadFile,
            Response::Deleted => Opcode::DeleteFile,
            Response::Files(_) => Opcode::ListFiles,
            Response::Pong => Opcode::Ping,
            Response::Nodes(_) => Opcode::ListNodes,
            Response::NodeAdded { .. } => Opcode::AddNode,
            Response::NodeRemoved { .. } => Opcode::RemoveNode,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            // the blob is the whole payload; the frame length already bounds it
            Response::Data(data) => buf.extend_from_slice(data),
            Response::Files(items) | Response::Nodes(items) => put_list(&mut buf, items),
            Response::NodeAdded { migrated } | Response::NodeRemoved { migrated } => {
                put_u32(&mut buf, *migrated)
            }
            Response::Written | Response::Deleted | Response::Pong => {}
        }
        buf
    }

    pub fn decode(opcode: Opcode, payload: Vec<u8>) -> StoreResult<Self> {
        if opcode == Opcode::ReadFile {
            return Ok(Response::Data(payload));
        }

        let mut cur = Cursor::new(payload.as_slice());
        let response = match opcode {
            Opcode::WriteFile => Response::Written,
            Opcode::DeleteFile => Response::Deleted,
            Opcode::Ping => Response::Pong,
            Opcode::ListFiles => Response::Files(get_list(&mut cur)?),
            Opcode::ListNodes => Response::Nodes(get_list(&mut cur)?),
            Opcode::AddNode => Response::NodeAdded {
                migrated: get_u32(&mut cur)?,
            },
            Opcode::RemoveNode => Response::NodeRemoved {
                migrated: get_u32(&mut cur)?,
            },
            Opcode::ReadFile | Opcode::Failure => {
                return Err(StoreError::Protocol(format!(
                    "unexpected response opcode {:?}",
                    opcode
                )))
            }
        };
        finish(&cur)?;
        Ok(response)
    }
}

/// Encode an error frame payload
pub fn encode_error(err: &StoreError) -> Vec<u8> {
    let (code, detail, reason) = err.to_wire();
    let mut buf = vec![code as u8];
    put_str(&mut buf, &detail);
    put_str(&mut buf, &reason);
    buf
}

/// Decode an error frame payload
pub fn decode_error(payload: &[u8]) -> StoreError {
    parse_error(&mut Cursor::new(payload)).unwrap_or_else(|e| e)
}

fn parse_error(cur: &mut Cursor<&[u8]>) -> StoreResult<StoreError> {
    let code = ErrorCode::try_from(cur.read_u8().map_err(truncated)?)?;
    let detail = get_str(cur)?;
    let reason = get_str(cur)?;
    finish(cur)?;
    Ok(StoreError::from_wire(code, detail, reason))
}

/// Send a request frame
pub fn write_request<W: Write>(writer: &mut W, request: &Request) -> io::Result<()> {
    write_frame(writer, request.opcode(), &request.encode())
}

/// Send the outcome of a request: its response, or a failure frame
pub fn write_outcome<W: Write>(writer: &mut W, outcome: &StoreResult<Response>) -> io::Result<()> {
    match outcome {
        Ok(response) => write_frame(writer, response.opcode(), &response.encode()),
        Err(err) => write_frame(writer, Opcode::Failure, &encode_error(err)),
    }
}

/// Receive the outcome of a request.
///
/// The outer `io::Result` is the transport; the inner result is what the
/// peer answered.
pub fn read_outcome<R: Read>(reader: &mut R) -> io::Result<StoreResult<Response>> {
    let (opcode, payload) = read_frame(reader)?;
    if opcode == Opcode::Failure {
        return Ok(Err(decode_error(&payload)));
    }
    Ok(Response::decode(opcode, payload))
}

fn truncated(e: io::Error) -> StoreError {
    StoreError::Protocol(format!("truncated payload: {}", e))
}

fn finish(cur: &Cursor<&[u8]>) -> StoreResult<()> {
    let remaining = cur.get_ref().len() as u64 - cur.position();
    if remaining != 0 {
        return Err(StoreError::Protocol(format!(
            "{} trailing bytes in payload",
            remaining
        )));
    }
    Ok(())
}

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    // writes into a Vec cannot fail
    let _ = buf.write_u32::<LittleEndian>(value);
}

fn put_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    put_u32(buf, data.len() as u32);
    buf.extend_from_slice(data);
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    put_bytes(buf, s.as_bytes());
}

fn put_key(buf: &mut Vec<u8>, key: &ContentKey) {
    put_str(buf, key.group_id());
    put_str(buf, key.name());
}

fn put_list(buf: &mut Vec<u8>, items: &[String]) {
    put_u32(buf, items.len() as u32);
    for item in items {
        put_str(buf, item);
    }
}

fn get_u32(cur: &mut Cursor<&[u8]>) -> StoreResult<u32> {
    cur.read_u32::<LittleEndian>().map_err(truncated)
}

fn get_bytes(cur: &mut Cursor<&[u8]>) -> StoreResult<Vec<u8>> {
    let len = get_u32(cur)? as u64;
    let remaining = cur.get_ref().len() as u64 - cur.position();
    if len > remaining {
        return Err(StoreError::Protocol(format!(
            "field length {} exceeds remaining {} bytes",
            len, remaining
        )));
    }
    let mut data = vec![0u8; len as usize];
    cur.read_exact(&mut data).map_err(truncated)?;
    Ok(data)
}

fn get_str(cur: &mut Cursor<&[u8]>) -> StoreResult<String> {
    String::from_utf8(get_bytes(cur)?)
        .map_err(|e| StoreError::Protocol(format!("invalid UTF-8 string: {}", e)))
}

fn get_key(cur: &mut Cursor<&[u8]>) -> StoreResult<ContentKey> {
    let group_id = get_str(cur)?;
    let name = get_str(cur)?;
    ContentKey::new(group_id, name)
}

fn get_list(cur: &mut Cursor<&[u8]>) -> StoreResult<Vec<String>> {
    let count = get_u32(cur)?;
    // each entry needs at least its 4-byte length prefix
    let remaining = cur.get_ref().len() as u64 - cur.position();
    if count as u64 * 4 > remaining {
        return Err(StoreError::Protocol(format!(
            "list of {} entries does not fit in {} bytes",
            count, remaining
        )));
    }
    (0..count).map(|_| get_str(cur)).collect()
}
