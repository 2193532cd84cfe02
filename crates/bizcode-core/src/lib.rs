//! # bizcode-core
//!
//! Pure, I/O-free engine that turns call sites into business error codes.
//!
//! ## Design
//!
//! A business code is 9 ASCII digits. One frame encodes as
//! `crc8(package) · crc8(function) · line % 1000`, three zero-padded digits
//! each. A filtered chain of frames composes into one code:
//!
//! - no frames: `000000000`
//! - one frame: that frame's code
//! - several: CRC-8 of the remaining codes as prefix, then the head's
//!   function and line digits
//!
//! ## Quick Start
//!
//! ```rust
//! use bizcode_core::{ChainBuilder, ErrorCode, Frame, compose, encode};
//!
//! assert_eq!(encode("app/users", "Create", 42), "223040042");
//!
//! let frames = vec![
//!     Frame::new("app::users", "create", 42),
//!     Frame::new("std::rt", "lang_start", 1),
//! ];
//! let chain = ChainBuilder::new(vec!["app".into()], vec![]).build(&frames);
//! assert_eq!(compose(&chain), chain.head().unwrap().code);
//!
//! let err = ErrorCode::new(404, compose(&chain), "user not found");
//! let back = ErrorCode::parse_msg(&err.to_string()).unwrap();
//! assert_eq!(back, err);
//! ```

pub mod crc8;
mod frame;
mod coder;
mod chain;
mod compose;
mod error_code;

// ── Public API ────────────────────────────────────────────────────

pub use frame::Frame;
pub use coder::{encode, encode_frame, is_well_formed, CODE_LEN, SENTINEL};
pub use chain::{Chain, ChainBuilder, CodeInfo, Iter};
pub use compose::compose;
pub use error_code::{ErrorCode, ParseMsgError, SharedError, DEFAULT_STATUS, SEPARATOR};
