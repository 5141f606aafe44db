use crate::error::ProtocolError;

/// Largest framed message on the wire (`SET_COMPUTE`): 1 type byte +
/// 17 payload bytes + 1 checksum byte.
pub const MAX_MESSAGE_SIZE: usize = 19;

/// The wire type tag, kept as its own enum (rather than folded into
/// [`Message`]) so the frame reader can classify an incoming byte
/// before a full payload has arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Ok = 37,
    Error = 38,
    Abort = 39,
    Done = 40,
    GetVersion = 41,
    Version = 42,
    Startup = 43,
    Compute = 44,
    ComputeData = 45,
    SetCompute = 46,
    Comm = 47,
    ConnTest = 48,
    ConnOk = 49,
    Reset = 50,
}

impl MessageType {
    /// Inverse of the `as u8` cast; `None` for any byte outside 37..=50.
    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            37 => Self::Ok,
            38 => Self::Error,
            39 => Self::Abort,
            40 => Self::Done,
            41 => Self::GetVersion,
            42 => Self::Version,
            43 => Self::Startup,
            44 => Self::Compute,
            45 => Self::ComputeData,
            46 => Self::SetCompute,
            47 => Self::Comm,
            48 => Self::ConnTest,
            49 => Self::ConnOk,
            50 => Self::Reset,
            _ => return None,
        })
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Payload length in bytes, excluding the type tag and checksum.
    pub fn payload_size(self) -> usize {
        match self {
            Self::Ok
            | Self::Error
            | Self::Abort
            | Self::Done
            | Self::GetVersion
            | Self::ConnTest
            | Self::ConnOk
            | Self::Reset => 0,
            Self::Version => 3,                // major, minor, patch
            Self::Startup => 11,                // ASCII identifier
            Self::Compute => 1 + 4 + 4 + 1 + 1, // cid, re, im, n_re, n_im
            Self::ComputeData => 1 + 1 + 1 + 1, // cid, i_re, i_im, iter
            Self::SetCompute => 4 + 4 + 4 + 4 + 1, // c_re, c_im, d_re, d_im, n
            Self::Comm => 4 + 1,                // baudrate, enable_burst
        }
    }

    /// Total framed length: type byte + payload + checksum byte.
    pub fn message_size(self) -> usize {
        2 + self.payload_size()
    }
}

/// A fully decoded protocol message. Variants without fields carry no
/// payload on the wire; see [`MessageType::payload_size`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    Ok,
    Error,
    Abort,
    Done,
    GetVersion,
    Version { major: u8, minor: u8, patch: u8 },
    /// ASCII boot identifier, not NUL-terminated.
    Startup { id: [u8; 11] },
    Compute { cid: u8, re: f32, im: f32, n_re: u8, n_im: u8 },
    ComputeData { cid: u8, i_re: u8, i_im: u8, iter: u8 },
    SetCompute { c_re: f32, c_im: f32, d_re: f32, d_im: f32, n: u8 },
    Comm { baudrate: u32, enable_burst: bool },
    ConnTest,
    ConnOk,
    Reset,
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Ok => MessageType::Ok,
            Self::Error => MessageType::Error,
            Self::Abort => MessageType::Abort,
            Self::Done => MessageType::Done,
            Self::GetVersion => MessageType::GetVersion,
            Self::Version { .. } => MessageType::Version,
            Self::Startup { .. } => MessageType::Startup,
            Self::Compute { .. } => MessageType::Compute,
            Self::ComputeData { .. } => MessageType::ComputeData,
            Self::SetCompute { .. } => MessageType::SetCompute,
            Self::Comm { .. } => MessageType::Comm,
            Self::ConnTest => MessageType::ConnTest,
            Self::ConnOk => MessageType::ConnOk,
            Self::Reset => MessageType::Reset,
        }
    }

    /// Writes the framed message (type, payload, checksum) into `buf`,
    /// returning the number of bytes written. `buf` must be at least
    /// `message_type().message_size()` bytes long.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, ProtocolError> {
        let ty = self.message_type();
        let size = ty.message_size();
        if buf.len() < size {
            return Err(ProtocolError::ShortBuffer { need: size, have: buf.len() });
        }
        buf[0] = ty.tag();
        let payload = &mut buf[1..size - 1];
        match *self {
            Message::Ok
            | Message::Error
            | Message::Abort
            | Message::Done
            | Message::GetVersion
            | Message::ConnTest
            | Message::ConnOk
            | Message::Reset => {}
            Message::Version { major, minor, patch } => {
                payload[0] = major;
                payload[1] = minor;
                payload[2] = patch;
            }
            Message::Startup { id } => payload.copy_from_slice(&id),
            Message::Compute { cid, re, im, n_re, n_im } => {
                payload[0] = cid;
                payload[1..5].copy_from_slice(&re.to_le_bytes());
                payload[5..9].copy_from_slice(&im.to_le_bytes());
                payload[9] = n_re;
                payload[10] = n_im;
            }
            Message::ComputeData { cid, i_re, i_im, iter } => {
                payload[0] = cid;
                payload[1] = i_re;
                payload[2] = i_im;
                payload[3] = iter;
            }
            Message::SetCompute { c_re, c_im, d_re, d_im, n } => {
                payload[0..4].copy_from_slice(&c_re.to_le_bytes());
                payload[4..8].copy_from_slice(&c_im.to_le_bytes());
                payload[8..12].copy_from_slice(&d_re.to_le_bytes());
                payload[12..16].copy_from_slice(&d_im.to_le_bytes());
                payload[16] = n;
            }
            Message::Comm { baudrate, enable_burst } => {
                payload[0..4].copy_from_slice(&baudrate.to_le_bytes());
                payload[4] = enable_burst as u8;
            }
        }
        let cksum = checksum(&buf[..size - 1]);
        buf[size - 1] = cksum;
        Ok(size)
    }

    /// Decodes a framed message from `buf`. Does not validate the
    /// checksum; call [`checksum_ok`] separately (spec §4.1: decode is
    /// total for valid types and leaves checksum verification to the
    /// caller).
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.is_empty() {
            return Err(ProtocolError::ShortBuffer { need: 2, have: 0 });
        }
        let ty = MessageType::from_tag(buf[0]).ok_or(ProtocolError::UnknownType(buf[0]))?;
        let size = ty.message_size();
        if buf.len() < size {
            return Err(ProtocolError::ShortBuffer { need: size, have: buf.len() });
        }
        let payload = &buf[1..size - 1];
        Ok(match ty {
            MessageType::Ok => Message::Ok,
            MessageType::Error => Message::Error,
            MessageType::Abort => Message::Abort,
            MessageType::Done => Message::Done,
            MessageType::GetVersion => Message::GetVersion,
            MessageType::ConnTest => Message::ConnTest,
            MessageType::ConnOk => Message::ConnOk,
            MessageType::Reset => Message::Reset,
            MessageType::Version => Message::Version {
                major: payload[0],
                minor: payload[1],
                patch: payload[2],
            },
            MessageType::Startup => {
                let mut id = [0u8; 11];
                id.copy_from_slice(payload);
                Message::Startup { id }
            }
            MessageType::Compute => Message::Compute {
                cid: payload[0],
                re: f32::from_le_bytes(payload[1..5].try_into().unwrap()),
                im: f32::from_le_bytes(payload[5..9].try_into().unwrap()),
                n_re: payload[9],
                n_im: payload[10],
            },
            MessageType::ComputeData => Message::ComputeData {
                cid: payload[0],
                i_re: payload[1],
                i_im: payload[2],
                iter: payload[3],
            },
            MessageType::SetCompute => Message::SetCompute {
                c_re: f32::from_le_bytes(payload[0..4].try_into().unwrap()),
                c_im: f32::from_le_bytes(payload[4..8].try_into().unwrap()),
                d_re: f32::from_le_bytes(payload[8..12].try_into().unwrap()),
                d_im: f32::from_le_bytes(payload[12..16].try_into().unwrap()),
                n: payload[16],
            },
            MessageType::Comm => Message::Comm {
                baudrate: u32::from_le_bytes(payload[0..4].try_into().unwrap()),
                enable_burst: payload[4] != 0,
            },
        })
    }
}

/// Additive checksum over `framed[..framed.len()]`, i.e. over the type
/// byte and payload but *excluding* the checksum byte itself. Callers
/// pass the frame without its trailing checksum byte.
pub fn checksum(framed_without_checksum: &[u8]) -> u8 {
    framed_without_checksum.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Recomputes the checksum of a complete framed message (including its
/// trailing checksum byte) and compares it against that trailing byte.
pub fn checksum_ok(framed: &[u8]) -> bool {
    match framed.split_last() {
        Some((&trailing, rest)) => checksum(rest) == trailing,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_SAMPLES: &[Message] = &[
        Message::Ok,
        Message::Error,
        Message::Abort,
        Message::Done,
        Message::GetVersion,
        Message::Version { major: 1, minor: 2, patch: 3 },
        Message::Startup { id: *b"JULIA-DEV01" },
        Message::Compute { cid: 7, re: -1.6, im: 1.1, n_re: 2, n_im: 2 },
        Message::ComputeData { cid: 7, i_re: 1, i_im: 0, iter: 42 },
        Message::SetCompute { c_re: -0.4, c_im: 0.6, d_re: 0.01, d_im: 0.01, n: 10 },
        Message::Comm { baudrate: 230_400, enable_burst: false },
        Message::ConnTest,
        Message::ConnOk,
        Message::Reset,
    ];

    #[test]
    fn round_trip_every_type() {
        for msg in ALL_SAMPLES {
            let mut buf = [0u8; MAX_MESSAGE_SIZE];
            let n = msg.encode(&mut buf).unwrap();
            assert_eq!(n, msg.message_type().message_size());
            assert!(checksum_ok(&buf[..n]));
            let decoded = Message::decode(&buf[..n]).unwrap();
            assert_eq!(decoded, *msg);
        }
    }

    #[test]
    fn size_agreement() {
        for msg in ALL_SAMPLES {
            let ty = msg.message_type();
            let mut buf = [0xAAu8; MAX_MESSAGE_SIZE];
            let n = msg.encode(&mut buf).unwrap();
            assert_eq!(n, ty.message_size());
            // bytes past the written frame are untouched
            assert!(buf[n..].iter().all(|&b| b == 0xAA));
        }
    }

    #[test]
    fn unknown_type_tag_rejected() {
        for tag in 0u8..=255 {
            if MessageType::from_tag(tag).is_none() {
                assert_eq!(Message::decode(&[tag, 0]), Err(ProtocolError::UnknownType(tag)));
            }
        }
    }

    #[test]
    fn decode_short_buffer() {
        assert_eq!(
            Message::decode(&[MessageType::Version.tag(), 1, 2]),
            Err(ProtocolError::ShortBuffer { need: 5, have: 3 })
        );
    }

    #[test]
    fn checksum_sensitivity_single_bit_flip() {
        let msg = Message::ComputeData { cid: 3, i_re: 1, i_im: 2, iter: 9 };
        let mut buf = [0u8; MAX_MESSAGE_SIZE];
        let n = msg.encode(&mut buf).unwrap();
        // A single-bit flip changes exactly one byte's value, which
        // changes the additive sum of either the signed bytes or the
        // trailing checksum byte itself — so `checksum_ok` must always
        // disagree afterwards, independent of whether the type tag
        // happens to still land on a known value.
        for bit in 0..(n * 8) {
            let mut flipped = buf;
            flipped[bit / 8] ^= 1 << (bit % 8);
            assert!(!checksum_ok(&flipped[..n]), "bit {bit} flip went undetected");
        }
    }

    #[test]
    fn checksum_additive_not_xor() {
        // Regression for spec §9's open question: this implementation
        // standardizes on the additive variant, not XOR.
        let msg = Message::ComputeData { cid: 1, i_re: 1, i_im: 1, iter: 1 };
        let mut buf = [0u8; MAX_MESSAGE_SIZE];
        let n = msg.encode(&mut buf).unwrap();
        let expected: u8 = buf[..n - 1].iter().fold(0u8, |a, &b| a.wrapping_add(b));
        assert_eq!(buf[n - 1], expected);
    }
}
