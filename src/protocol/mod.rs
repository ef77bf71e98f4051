//! Protocol Module
//!
//! Defines the wire protocol for client → hub and hub → node links.
//!
//! ## Requests
//! One ASCII line of whitespace-separated tokens, ended by `\n` (or by the
//! end of the stream). Upload requests carry the file body after the line.
//!
//! ### Client → Hub
//! - `ufile <name> <dest>` - upload, body follows
//! - `dfile <name>`        - download
//! - `rmfile <name>`       - delete
//! - `dtar <type>`         - archive of one file type
//! - `display <path>`      - aggregated listing
//!
//! ### Hub → Node
//! - `STORE <relpath>` - persist, body follows
//! - `RETRIEVE <name>` - file bytes
//! - `DELETE <name>`   - status line
//! - `ARCHIVE`         - tar of the shard
//! - `LIST`            - newline-delimited base names
//!
//! ## Responses
//! Raw bytes or text lines with no header. The end of a message is either
//! the sender's half-close or, on framed node links, an END frame:
//! ```text
//! ┌──────────┬──────────┬─────────────────────┬──────────┐
//! │Status(1) │ Len (4)  │       Payload       │ CRC (4)  │
//! └──────────┴──────────┴─────────────────────┴──────────┘
//! ```
//!
//! ### Status Codes
//! - 0x00: DATA
//! - 0x01: ERROR
//! - 0x02: END

mod command;
mod response;
mod codec;

pub use command::{ClientCommand, NodeCommand, MAX_NAME_LEN};
pub use response::{Frame, Status};
pub use codec::{
    decode_frame, encode_frame, line_from_bytes, read_frame, read_line, write_frame,
    HEADER_SIZE, MAX_COMMAND_LEN, MAX_FRAME_PAYLOAD, TRAILER_SIZE,
};
