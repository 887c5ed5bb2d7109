//! Wire codec: checksum + opcode header followed by `|`-terminated text arguments.
//!
//! Arguments are escaped so that any string survives the trip:
//! `\` becomes `\\`, `|` becomes `\|` and NUL becomes `\0`. The payload ends at the
//! first unescaped NUL, which is where the zero padding starts.

use crate::{Opcode, CHECKSUM_MAGIC, HEADER_SIZE, PACKET_SIZE};
use std::fmt::Display;
use thiserror::Error;

const DELIMITER: u8 = b'|';
const ESCAPE: u8 = b'\\';

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("datagram too short: {actual} bytes, need at least {required}")]
    TooShort { actual: usize, required: usize },

    #[error("checksum mismatch: found 0x{found:08X}")]
    BadChecksum { found: u32 },

    #[error("unknown opcode {0}")]
    UnknownOpcode(u16),

    #[error("argument {index} is not valid UTF-8")]
    InvalidUtf8 { index: usize },

    #[error("argument {index} is not terminated")]
    Unterminated { index: usize },

    #[error("invalid escape sequence in argument {index}")]
    InvalidEscape { index: usize },

    #[error("payload of {needed} bytes does not fit in a {capacity} byte packet")]
    PayloadTooLarge { needed: usize, capacity: usize },
}

impl WireError {
    /// Foreign or garbage traffic: dropped quietly rather than reported.
    pub fn is_foreign(&self) -> bool {
        matches!(
            self,
            WireError::TooShort { .. } | WireError::BadChecksum { .. } | WireError::UnknownOpcode(_)
        )
    }
}

/// A message with its opcode and ordered text arguments.
///
/// Built with [`Packet::new`] and [`Packet::arg`]; numbers are written with their
/// `Display` form, which for floats is the shortest representation that parses back
/// to the same value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    opcode: Opcode,
    args: Vec<String>,
}

impl Packet {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            args: Vec::new(),
        }
    }

    pub fn with_args(opcode: Opcode, args: Vec<String>) -> Self {
        Self { opcode, args }
    }

    pub fn arg(mut self, value: impl Display) -> Self {
        self.args.push(value.to_string());
        self
    }

    pub fn args_from<I, T>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Display,
    {
        self.args.extend(values.into_iter().map(|v| v.to_string()));
        self
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn into_args(self) -> Vec<String> {
        self.args
    }

    /// Number of bytes the packet occupies before zero padding.
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE
            + self
                .args
                .iter()
                .map(|arg| escaped_len(arg) + 1)
                .sum::<usize>()
    }
}

fn escaped_len(arg: &str) -> usize {
    arg.bytes()
        .map(|b| match b {
            ESCAPE | DELIMITER | 0 => 2,
            _ => 1,
        })
        .sum()
}

fn escape_into(arg: &str, buf: &mut Vec<u8>) {
    for b in arg.bytes() {
        match b {
            ESCAPE => buf.extend_from_slice(b"\\\\"),
            DELIMITER => buf.extend_from_slice(b"\\|"),
            0 => buf.extend_from_slice(b"\\0"),
            _ => buf.push(b),
        }
    }
}

/// Serializes a packet into exactly [`PACKET_SIZE`] bytes.
///
/// A payload that does not fit is rejected; it is never truncated.
pub fn encode(packet: &Packet) -> Result<Vec<u8>, WireError> {
    let needed = packet.encoded_len();
    if needed > PACKET_SIZE {
        return Err(WireError::PayloadTooLarge {
            needed,
            capacity: PACKET_SIZE,
        });
    }

    let mut buf = Vec::with_capacity(PACKET_SIZE);
    buf.extend_from_slice(&CHECKSUM_MAGIC.to_le_bytes());
    buf.extend_from_slice(&packet.opcode.as_u16().to_le_bytes());
    for arg in &packet.args {
        escape_into(arg, &mut buf);
        buf.push(DELIMITER);
    }
    buf.resize(PACKET_SIZE, 0);
    Ok(buf)
}

/// Parses a received datagram.
///
/// Argument count and argument contents are not checked here; that is up to the
/// handler registered for the opcode.
pub fn decode(datagram: &[u8]) -> Result<Packet, WireError> {
    if datagram.len() < HEADER_SIZE {
        return Err(WireError::TooShort {
            actual: datagram.len(),
            required: HEADER_SIZE,
        });
    }

    let found = u32::from_le_bytes([datagram[0], datagram[1], datagram[2], datagram[3]]);
    if found != CHECKSUM_MAGIC {
        return Err(WireError::BadChecksum { found });
    }

    let raw_opcode = u16::from_le_bytes([datagram[4], datagram[5]]);
    let opcode = Opcode::from_u16(raw_opcode).ok_or(WireError::UnknownOpcode(raw_opcode))?;

    let payload = &datagram[HEADER_SIZE..];
    let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
    let args = split_args(&payload[..end])?;

    Ok(Packet { opcode, args })
}

fn split_args(payload: &[u8]) -> Result<Vec<String>, WireError> {
    let mut args = Vec::new();
    let mut current = Vec::new();
    let mut bytes = payload.iter().copied();

    while let Some(b) = bytes.next() {
        match b {
            ESCAPE => {
                let index = args.len();
                match bytes.next() {
                    Some(ESCAPE) => current.push(ESCAPE),
                    Some(DELIMITER) => current.push(DELIMITER),
                    Some(b'0') => current.push(0),
                    _ => return Err(WireError::InvalidEscape { index }),
                }
            }
            DELIMITER => {
                let index = args.len();
                let arg = String::from_utf8(std::mem::take(&mut current))
                    .map_err(|_| WireError::InvalidUtf8 { index })?;
                args.push(arg);
            }
            _ => current.push(b),
        }
    }

    if !current.is_empty() {
        return Err(WireError::Unterminated { index: args.len() });
    }

    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(opcode: u16) -> Vec<u8> {
        let mut buf = CHECKSUM_MAGIC.to_le_bytes().to_vec();
        buf.extend_from_slice(&opcode.to_le_bytes());
        buf
    }

    #[test]
    fn test_encode_is_fixed_size() {
        let packet = Packet::new(Opcode::Connect).arg("alice").arg("pw");
        let bytes = encode(&packet).unwrap();
        assert_eq!(bytes.len(), PACKET_SIZE);
        assert_eq!(&bytes[6..15], b"alice|pw|");
        assert!(bytes[15..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_roundtrip_with_delimiters_in_arguments() {
        let packet = Packet::new(Opcode::SendChatMessage)
            .arg(7)
            .arg("a|b\\c")
            .arg("")
            .arg("nul\0inside");
        let decoded = decode(&encode(&packet).unwrap()).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_roundtrip_every_opcode() {
        let tricky = [
            "",
            "|",
            "\\",
            "\0",
            "\\|",
            "a\0|\\b",
            "héllo wörld",
            "日本語|ü",
            "||",
            " ",
        ];
        for opcode in Opcode::ALL {
            let packet = Packet::new(opcode).args_from(tricky);
            let decoded = decode(&encode(&packet).unwrap()).unwrap();
            assert_eq!(decoded, packet, "{:?}", opcode);

            // Fill the rest of the packet exactly, with two-byte characters where possible.
            let room = PACKET_SIZE - packet.encoded_len() - 1;
            let mut filler = "é".repeat(room / 2);
            if room % 2 == 1 {
                filler.push('x');
            }
            let full = packet.arg(&filler);
            assert_eq!(full.encoded_len(), PACKET_SIZE);
            let decoded = decode(&encode(&full).unwrap()).unwrap();
            assert_eq!(decoded, full, "{:?}", opcode);
        }
    }

    #[test]
    fn test_roundtrip_floats() {
        let packet = Packet::new(Opcode::PlayerCorrection)
            .arg(3)
            .arg(1.25f32)
            .arg(-0.1f32)
            .arg(100000.5f32);
        let decoded = decode(&encode(&packet).unwrap()).unwrap();
        let values: Vec<f32> = decoded.args()[1..]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        assert_eq!(values, vec![1.25, -0.1, 100000.5]);
    }

    #[test]
    fn test_no_arguments() {
        let packet = Packet::new(Opcode::CreateAccountSuccess);
        let decoded = decode(&encode(&packet).unwrap()).unwrap();
        assert_eq!(decoded.opcode(), Opcode::CreateAccountSuccess);
        assert!(decoded.args().is_empty());
    }

    #[test]
    fn test_bad_checksum_is_foreign() {
        let mut bytes = encode(&Packet::new(Opcode::Ping).arg(1)).unwrap();
        bytes[0] ^= 0xFF;
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, WireError::BadChecksum { .. }));
        assert!(err.is_foreign());
    }

    #[test]
    fn test_unknown_opcode_is_foreign() {
        let bytes = header(9999);
        let err = decode(&bytes).unwrap_err();
        assert_eq!(err, WireError::UnknownOpcode(9999));
        assert!(err.is_foreign());
    }

    #[test]
    fn test_too_short() {
        let err = decode(&[0x0D, 0xF0]).unwrap_err();
        assert_eq!(
            err,
            WireError::TooShort {
                actual: 2,
                required: HEADER_SIZE
            }
        );
    }

    #[test]
    fn test_short_datagram_without_padding_decodes() {
        let mut bytes = header(Opcode::Heartbeat.as_u16());
        bytes.extend_from_slice(b"12|token|");
        let packet = decode(&bytes).unwrap();
        assert_eq!(packet.args(), &["12".to_string(), "token".to_string()]);
    }

    #[test]
    fn test_unterminated_argument() {
        let mut bytes = header(Opcode::Heartbeat.as_u16());
        bytes.extend_from_slice(b"12|tok");
        assert_eq!(
            decode(&bytes).unwrap_err(),
            WireError::Unterminated { index: 1 }
        );
    }

    #[test]
    fn test_invalid_escape() {
        let mut bytes = header(Opcode::Heartbeat.as_u16());
        bytes.extend_from_slice(b"a\\x|");
        assert_eq!(
            decode(&bytes).unwrap_err(),
            WireError::InvalidEscape { index: 0 }
        );
    }

    #[test]
    fn test_invalid_utf8() {
        let mut bytes = header(Opcode::Heartbeat.as_u16());
        bytes.extend_from_slice(&[b'o', b'k', b'|', 0xFF, 0xFE, b'|']);
        assert_eq!(
            decode(&bytes).unwrap_err(),
            WireError::InvalidUtf8 { index: 1 }
        );
    }

    #[test]
    fn test_overflow_is_rejected() {
        let big = "x".repeat(PACKET_SIZE);
        let packet = Packet::new(Opcode::PropagateChatMessage).arg("bob").arg(&big);
        match encode(&packet) {
            Err(WireError::PayloadTooLarge { needed, capacity }) => {
                assert_eq!(capacity, PACKET_SIZE);
                assert_eq!(needed, packet.encoded_len());
                assert!(needed > capacity);
            }
            other => panic!("expected overflow, got {:?}", other),
        }
    }

    #[test]
    fn test_exact_fit_is_accepted() {
        let room = PACKET_SIZE - HEADER_SIZE - 1;
        let packet = Packet::new(Opcode::Pong).arg("y".repeat(room));
        assert_eq!(packet.encoded_len(), PACKET_SIZE);
        let bytes = encode(&packet).unwrap();
        assert_eq!(decode(&bytes).unwrap(), packet);
    }

    #[test]
    fn test_escaped_length_counts_escapes() {
        let packet = Packet::new(Opcode::Pong).arg("|\\");
        assert_eq!(packet.encoded_len(), HEADER_SIZE + 4 + 1);
    }
}
