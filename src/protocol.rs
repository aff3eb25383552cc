//! p0f v3 API records
//!
//! Both records are fixed size and are exchanged verbatim: fields in declared
//! order, integers at their natural width in host byte order, no padding.
//! They go through `bincode` with fixed-width integers so the layout never
//! depends on how the compiler would lay the structs out in memory.

use std::{
    borrow::Cow,
    fmt::{self, Display},
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
};

use bincode::error::{DecodeError, EncodeError};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const QUERY_MAGIC: u32 = 0x5030_4601;
pub const RESPONSE_MAGIC: u32 = 0x5030_4602;

pub const STATUS_BADQUERY: u32 = 0x00;
pub const STATUS_OK: u32 = 0x10;
pub const STATUS_NOMATCH: u32 = 0x20;

pub const ADDR_IPV4: u8 = 0x04;
pub const ADDR_IPV6: u8 = 0x06;

/// Longest visible string in a response text field
pub const STR_MAX: usize = 31;
const TEXT_LEN: usize = STR_MAX + 1;

pub const MATCH_FUZZY: u8 = 0x01;
pub const MATCH_GENERIC: u8 = 0x02;

pub const QUERY_SIZE: usize = 4 + 1 + 16;
pub const RESPONSE_SIZE: usize = 9 * 4 + 2 + 1 + 1 + 6 * TEXT_LEN;

#[cfg(target_endian = "little")]
fn wire() -> impl bincode::config::Config {
    bincode::config::standard()
        .with_fixed_int_encoding()
        .with_little_endian()
}

#[cfg(target_endian = "big")]
fn wire() -> impl bincode::config::Config {
    bincode::config::standard()
        .with_fixed_int_encoding()
        .with_big_endian()
}

fn encode<T: Serialize, const N: usize>(record: &T) -> std::result::Result<[u8; N], EncodeError> {
    let mut buffer = [0; N];
    let written = bincode::serde::encode_into_slice(record, &mut buffer, wire())?;
    debug_assert_eq!(written, N);
    Ok(buffer)
}

fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> std::result::Result<T, DecodeError> {
    let (record, _) = bincode::serde::decode_from_slice(bytes, wire())?;
    Ok(record)
}

/// A lookup request for a single host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub magic: u32,
    pub addr_type: u8,
    /// Big endian, left aligned, zero padded
    pub addr: [u8; 16],
}

impl Query {
    #[must_use]
    pub fn new(address: IpAddr) -> Self {
        let mut addr = [0; 16];

        let addr_type = match address {
            IpAddr::V4(v4) => {
                addr[..4].copy_from_slice(&v4.octets());
                ADDR_IPV4
            }
            IpAddr::V6(v6) => {
                addr.copy_from_slice(&v6.octets());
                ADDR_IPV6
            }
        };

        Self {
            magic: QUERY_MAGIC,
            addr_type,
            addr,
        }
    }

    /// Build a query from the textual form of an address, trying dotted
    /// decimal IPv4 before IPv6 notation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnrecognizedAddress`] if `address` is neither.
    pub fn parse(address: &str) -> Result<Self> {
        address
            .parse::<Ipv4Addr>()
            .map(IpAddr::V4)
            .or_else(|_| address.parse::<Ipv6Addr>().map(IpAddr::V6))
            .map(Self::new)
            .map_err(|_| Error::UnrecognizedAddress(address.to_string()))
    }

    /// The address this query asks about, if the type tag is one we know.
    #[must_use]
    pub fn address(&self) -> Option<IpAddr> {
        match self.addr_type {
            ADDR_IPV4 => Some(IpAddr::V4(Ipv4Addr::new(
                self.addr[0],
                self.addr[1],
                self.addr[2],
                self.addr[3],
            ))),
            ADDR_IPV6 => Some(IpAddr::V6(Ipv6Addr::from(self.addr))),
            _ => None,
        }
    }

    /// # Errors
    ///
    /// Only fails if the record layout and [`QUERY_SIZE`] disagree.
    pub fn encode(&self) -> std::result::Result<[u8; QUERY_SIZE], EncodeError> {
        encode(self)
    }

    /// # Errors
    ///
    /// Fails if `bytes` is shorter than [`QUERY_SIZE`].
    pub fn decode(bytes: &[u8]) -> std::result::Result<Self, DecodeError> {
        decode(bytes)
    }
}

/// What p0f made of the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    BadQuery,
    Ok,
    NoMatch,
    Other(u32),
}

impl From<u32> for Status {
    fn from(value: u32) -> Self {
        match value {
            STATUS_BADQUERY => Self::BadQuery,
            STATUS_OK => Self::Ok,
            STATUS_NOMATCH => Self::NoMatch,
            other => Self::Other(other),
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadQuery => f.write_str("bad query"),
            Self::Ok => f.write_str("ok"),
            Self::NoMatch => f.write_str("no match"),
            Self::Other(code) => write!(f, "unknown status {code:#04x}"),
        }
    }
}

/// Everything p0f knows about a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub magic: u32,
    pub status: u32,

    /// Unix time
    pub first_seen: u32,
    /// Unix time
    pub last_seen: u32,
    pub total_conn: u32,

    pub uptime_min: u32,
    pub up_mod_days: u32,

    /// Unix time NAT or load balancing was last detected
    pub last_nat: u32,
    /// Unix time an OS change was last detected
    pub last_chg: u32,

    pub distance: i16,

    /// Declared software doesn't match the fingerprint
    pub bad_sw: u8,
    pub os_match_q: u8,

    pub os_name: [u8; TEXT_LEN],
    pub os_flavor: [u8; TEXT_LEN],
    pub http_name: [u8; TEXT_LEN],
    pub http_flavor: [u8; TEXT_LEN],
    pub link_type: [u8; TEXT_LEN],
    pub language: [u8; TEXT_LEN],
}

impl Default for Response {
    fn default() -> Self {
        Self::new(STATUS_BADQUERY)
    }
}

impl Response {
    /// An otherwise empty response carrying `status`.
    #[must_use]
    pub const fn new(status: u32) -> Self {
        Self {
            magic: RESPONSE_MAGIC,
            status,
            first_seen: 0,
            last_seen: 0,
            total_conn: 0,
            uptime_min: 0,
            up_mod_days: 0,
            last_nat: 0,
            last_chg: 0,
            distance: 0,
            bad_sw: 0,
            os_match_q: 0,
            os_name: [0; TEXT_LEN],
            os_flavor: [0; TEXT_LEN],
            http_name: [0; TEXT_LEN],
            http_flavor: [0; TEXT_LEN],
            link_type: [0; TEXT_LEN],
            language: [0; TEXT_LEN],
        }
    }

    #[must_use]
    pub fn status(&self) -> Status {
        Status::from(self.status)
    }

    #[must_use]
    pub const fn has_valid_magic(&self) -> bool {
        self.magic == RESPONSE_MAGIC
    }

    #[must_use]
    pub fn os_name(&self) -> Cow<'_, str> {
        text(&self.os_name)
    }

    #[must_use]
    pub fn os_flavor(&self) -> Cow<'_, str> {
        text(&self.os_flavor)
    }

    #[must_use]
    pub fn http_name(&self) -> Cow<'_, str> {
        text(&self.http_name)
    }

    #[must_use]
    pub fn http_flavor(&self) -> Cow<'_, str> {
        text(&self.http_flavor)
    }

    #[must_use]
    pub fn link_type(&self) -> Cow<'_, str> {
        text(&self.link_type)
    }

    #[must_use]
    pub fn language(&self) -> Cow<'_, str> {
        text(&self.language)
    }

    /// The OS signature only matched after relaxing some checks.
    #[must_use]
    pub const fn is_fuzzy(&self) -> bool {
        self.os_match_q & MATCH_FUZZY != 0
    }

    /// The OS signature was a generic one.
    #[must_use]
    pub const fn is_generic(&self) -> bool {
        self.os_match_q & MATCH_GENERIC != 0
    }

    #[must_use]
    pub const fn lies_about_software(&self) -> bool {
        self.bad_sw != 0
    }

    /// Network hops to the host, or `None` when p0f couldn't tell.
    #[must_use]
    pub const fn distance(&self) -> Option<i16> {
        match self.distance {
            -1 => None,
            hops => Some(hops),
        }
    }

    /// # Errors
    ///
    /// Only fails if the record layout and [`RESPONSE_SIZE`] disagree.
    pub fn encode(&self) -> std::result::Result<[u8; RESPONSE_SIZE], EncodeError> {
        encode(self)
    }

    /// # Errors
    ///
    /// Fails if `bytes` is shorter than [`RESPONSE_SIZE`].
    pub fn decode(bytes: &[u8]) -> std::result::Result<Self, DecodeError> {
        decode(bytes)
    }
}

/// Pack `value` into a text field, truncated to [`STR_MAX`] bytes.
#[must_use]
pub fn text_field(value: &str) -> [u8; TEXT_LEN] {
    let mut field = [0; TEXT_LEN];
    let len = value.len().min(STR_MAX);
    field[..len].copy_from_slice(&value.as_bytes()[..len]);
    field
}

/// The visible part of a text field: everything before the first NUL, and
/// never the terminator slot.
fn text(field: &[u8; TEXT_LEN]) -> Cow<'_, str> {
    let visible = &field[..STR_MAX];
    let end = visible.iter().position(|&b| b == 0).unwrap_or(STR_MAX);
    String::from_utf8_lossy(&visible[..end])
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(QUERY_SIZE, 21);
        assert_eq!(RESPONSE_SIZE, 232);
    }

    #[test]
    fn ipv4_query() {
        let query = Query::parse("192.0.2.17").unwrap();
        assert_eq!(query.magic, QUERY_MAGIC);
        assert_eq!(query.addr_type, ADDR_IPV4);
        assert_eq!(&query.addr[..4], &[192, 0, 2, 17]);
        assert!(query.addr[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn ipv6_query() {
        let query = Query::parse("2001:db8::1").unwrap();
        let expected: Ipv6Addr = "2001:db8::1".parse().unwrap();
        assert_eq!(query.addr_type, ADDR_IPV6);
        assert_eq!(query.addr, expected.octets());
    }

    #[test]
    fn ipv4_mapped_is_ipv6() {
        let query = Query::parse("::ffff:192.0.2.1").unwrap();
        assert_eq!(query.addr_type, ADDR_IPV6);
        assert_eq!(&query.addr[10..], &[0xff, 0xff, 192, 0, 2, 1]);
    }

    #[test]
    fn unrecognized_addresses() {
        for address in [
            "",
            "localhost",
            "192.0.2",
            "192.0.2.256",
            "192.0.2.1/24",
            " 192.0.2.1",
            "2001:db8::1::2",
            "fe80::1%eth0",
        ] {
            assert!(
                matches!(Query::parse(address), Err(Error::UnrecognizedAddress(ref a)) if a == address),
                "{address:?} should be rejected"
            );
        }
    }

    #[test]
    fn query_wire_layout() {
        let query = Query::parse("10.1.2.3").unwrap();
        let bytes = query.encode().unwrap();

        assert_eq!(&bytes[..4], &QUERY_MAGIC.to_ne_bytes());
        assert_eq!(bytes[4], ADDR_IPV4);
        assert_eq!(&bytes[5..9], &[10, 1, 2, 3]);
        assert!(bytes[9..].iter().all(|&b| b == 0));
    }

    #[test]
    fn query_decodes_to_itself() {
        let query = Query::parse("2001:db8:85a3::8a2e:370:7334").unwrap();
        let decoded = Query::decode(&query.encode().unwrap()).unwrap();
        assert_eq!(decoded, query);
        assert_eq!(decoded.address(), Some("2001:db8:85a3::8a2e:370:7334".parse().unwrap()));
    }

    #[test]
    fn response_wire_layout() {
        let mut response = Response::new(STATUS_OK);
        response.first_seen = 0x0102_0304;
        response.distance = -3;
        response.bad_sw = 2;
        response.os_match_q = MATCH_GENERIC;
        response.os_name = text_field("Linux");
        response.language = text_field("English");

        let bytes = response.encode().unwrap();

        assert_eq!(&bytes[..4], &RESPONSE_MAGIC.to_ne_bytes());
        assert_eq!(&bytes[4..8], &STATUS_OK.to_ne_bytes());
        assert_eq!(&bytes[8..12], &0x0102_0304_u32.to_ne_bytes());
        assert_eq!(&bytes[36..38], &(-3_i16).to_ne_bytes());
        assert_eq!(bytes[38], 2);
        assert_eq!(bytes[39], MATCH_GENERIC);
        assert_eq!(&bytes[40..46], b"Linux\0");
        assert_eq!(&bytes[200..208], b"English\0");

        assert_eq!(Response::decode(&bytes).unwrap(), response);
    }

    #[test]
    fn short_response_is_rejected() {
        let bytes = Response::new(STATUS_OK).encode().unwrap();
        assert!(Response::decode(&bytes[..RESPONSE_SIZE - 1]).is_err());
    }

    #[test]
    fn text_fields() {
        let mut response = Response::new(STATUS_OK);
        assert_eq!(response.os_name(), "");

        response.os_name = text_field("Windows");
        response.os_flavor = text_field("7 or 8");
        assert_eq!(response.os_name(), "Windows");
        assert_eq!(response.os_flavor(), "7 or 8");

        // Garbage after the terminator is ignored
        let mut field = [b'x'; TEXT_LEN];
        field[..7].copy_from_slice(b"Chrome\0");
        response.http_name = field;
        assert_eq!(response.http_name(), "Chrome");
    }

    #[test]
    fn unterminated_text_stops_at_capacity() {
        let mut response = Response::new(STATUS_OK);
        response.link_type = [b'a'; TEXT_LEN];
        assert_eq!(response.link_type().len(), STR_MAX);
    }

    #[test]
    fn text_field_truncates() {
        let field = text_field(&"x".repeat(40));
        assert_eq!(field[STR_MAX], 0);
        assert!(field[..STR_MAX].iter().all(|&b| b == b'x'));
    }

    #[test]
    fn statuses() {
        assert_eq!(Status::from(STATUS_BADQUERY), Status::BadQuery);
        assert_eq!(Status::from(STATUS_OK), Status::Ok);
        assert_eq!(Status::from(STATUS_NOMATCH), Status::NoMatch);
        assert_eq!(Status::from(0x42), Status::Other(0x42));
        assert_eq!(Status::from(0x42).to_string(), "unknown status 0x42");
        assert_eq!(Status::NoMatch.to_string(), "no match");
    }

    #[test]
    fn distance() {
        let mut response = Response::new(STATUS_OK);
        assert_eq!(response.distance(), Some(0));

        response.distance = 12;
        assert_eq!(response.distance(), Some(12));

        response.distance = -1;
        assert_eq!(response.distance(), None);
    }

    #[test]
    fn match_quality() {
        let mut response = Response::new(STATUS_OK);
        assert!(!response.is_fuzzy());
        assert!(!response.is_generic());

        response.os_match_q = MATCH_FUZZY | MATCH_GENERIC;
        assert!(response.is_fuzzy());
        assert!(response.is_generic());
    }
}
