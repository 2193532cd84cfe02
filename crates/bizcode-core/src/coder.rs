//! Frame → 9-digit code.
//!
//! ```text
//! ┌───────────┬────────────┬───────────┐
//! │ crc8(pkg) │ crc8(func) │ line%1000 │
//! │  3 digits │  3 digits  │  3 digits │
//! └───────────┴────────────┴───────────┘
//! ```

use crate::crc8;
use crate::Frame;

/// Width of every business code.
pub const CODE_LEN: usize = 9;

/// Code used when no frame could be attributed.
pub const SENTINEL: &str = "000000000";

/// Lines wrap at this modulus so the line field stays three digits.
const LINE_MODULUS: u32 = 1000;

/// Encode one call site.
///
/// Pure: the same `(package, function, line)` always yields the same
/// string. Lines of 1000 and above wrap (`1042` encodes like `42`).
///
/// ```
/// use bizcode_core::encode;
/// assert_eq!(encode("app/users", "Create", 42), "223040042");
/// ```
pub fn encode(package: &str, function: &str, line: u32) -> String {
    format!(
        "{:03}{:03}{:03}",
        crc8::checksum(package.as_bytes()),
        crc8::checksum(function.as_bytes()),
        line % LINE_MODULUS,
    )
}

/// Encode a [`Frame`].
#[inline]
pub fn encode_frame(frame: &Frame) -> String {
    encode(&frame.package, &frame.function, frame.line)
}

/// True if `code` is exactly [`CODE_LEN`] ASCII digits.
pub fn is_well_formed(code: &str) -> bool {
    code.len() == CODE_LEN && code.bytes().all(|b| b.is_ascii_digit())
}
