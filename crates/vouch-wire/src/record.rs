//! Record codec
//!
//! Encodes `MessageRecord`s into the pipe-delimited text form and parses
//! them back. The parser accepts every deployment variant:
//! - `num|origin` (origin may be a link-local IPv6 address)
//! - `num|origin|attest`
//! - `num|origin|attest|time`

use std::net::Ipv6Addr;
use std::str::FromStr;

use bytes::Bytes;
use vouch_core::{MessageRecord, NodeId, VouchError, VouchResult};

/// Records at or above this size are rejected before parsing
pub const MAX_RECORD_SIZE: usize = 64;

/// Field separator
pub const FIELD_SEPARATOR: char = '|';

/// Maximum number of fields in a record
pub const MAX_FIELDS: usize = 4;

/// Encode a record to its wire form
pub fn encode(record: &MessageRecord) -> Bytes {
    // Worst case is 43 bytes, always under MAX_RECORD_SIZE
    Bytes::from(record.to_string())
}

/// Parse a record from raw datagram bytes
pub fn parse(buf: &[u8]) -> VouchResult<MessageRecord> {
    if buf.len() >= MAX_RECORD_SIZE {
        return Err(VouchError::RecordTooLarge {
            len: buf.len(),
            max: MAX_RECORD_SIZE,
        });
    }

    let text = std::str::from_utf8(buf)
        .map_err(|_| VouchError::Malformed("record is not UTF-8".into()))?;

    // C senders may include the terminating NUL or pad the buffer
    let text = text.trim_matches(|c: char| c == '\0' || c.is_ascii_whitespace());

    let mut fields = text.split(FIELD_SEPARATOR);

    let message_num: u32 = parse_field(fields.next(), "message_num")?;
    let origin_node = parse_origin(fields.next())?;
    let attest_node = match fields.next() {
        Some(field) => NodeId(parse_field(Some(field), "attest_node")?),
        None => NodeId::ZERO,
    };
    let broadcast_time = match fields.next() {
        Some(field) => Some(parse_field::<u64>(Some(field), "broadcast_time")?),
        None => None,
    };

    if fields.next().is_some() {
        return Err(VouchError::Malformed(format!(
            "more than {} fields",
            MAX_FIELDS
        )));
    }

    Ok(MessageRecord {
        message_num,
        origin_node,
        attest_node,
        broadcast_time,
    })
}

fn parse_field<T: FromStr>(field: Option<&str>, name: &str) -> VouchResult<T> {
    let field = field.ok_or_else(|| VouchError::Malformed(format!("missing {}", name)))?;
    field
        .parse()
        .map_err(|_| VouchError::Malformed(format!("invalid {}: '{}'", name, field)))
}

/// Origin is either a numeric node id or the origin's link-local address
fn parse_origin(field: Option<&str>) -> VouchResult<NodeId> {
    let field = field.ok_or_else(|| VouchError::Malformed("missing origin_node".into()))?;
    if let Ok(id) = field.parse::<u16>() {
        return Ok(NodeId(id));
    }
    field
        .parse::<Ipv6Addr>()
        .map(|addr| NodeId::from_ipv6(&addr))
        .map_err(|_| VouchError::Malformed(format!("invalid origin_node: '{}'", field)))
}
