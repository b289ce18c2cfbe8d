//! Storage and admin wire protocol
//!
//! Simple binary protocol over TCP, one request and one response frame at a
//! time per connection.

pub mod frame;
pub mod message;

pub use frame::{read_frame, write_frame, Opcode, MAX_FRAME_LEN};
pub use message::{read_outcome, write_outcome, write_request, Request, Response};
