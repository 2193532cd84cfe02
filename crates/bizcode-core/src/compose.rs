//! Chain → one composite business code.

use crate::chain::Chain;
use crate::coder::{CODE_LEN, SENTINEL};
use crate::crc8;

/// Digits of the head code kept verbatim (function checksum + line).
const TAIL: usize = 6;

/// Reduce a chain to a single fixed-width code.
///
/// - empty chain: [`SENTINEL`]
/// - one node: that node's code
/// - more: the head's function and line digits, prefixed by the CRC-8 of
///   the remaining codes joined with `:`
///
/// The prefix collides far more often than a full frame code; the registry
/// holds the exact call path.
pub fn compose(chain: &Chain) -> String {
    let mut codes = chain.codes();
    let Some(head) = codes.next() else {
        return SENTINEL.to_string();
    };
    let rest: Vec<&str> = codes.collect();
    if rest.is_empty() {
        return head.to_string();
    }

    let prefix = crc8::checksum(rest.join(":").as_bytes());
    let tail = head
        .get(CODE_LEN - TAIL..)
        .unwrap_or(&SENTINEL[CODE_LEN - TAIL..]);
    format!("{:03}{}", prefix, tail)
}
