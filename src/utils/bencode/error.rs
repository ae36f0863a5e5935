use super::BencodedValue;

/// Reasons a byte buffer is not valid bencode. Positions are byte offsets into the input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BencodeError {
    #[error("empty input")]
    EmptyInput,

    #[error("unexpected end of input at byte {0}")]
    UnexpectedEof(usize),

    #[error("unexpected byte 0x{byte:02x} at byte {position}")]
    UnexpectedByte { byte: u8, position: usize },

    #[error("invalid integer at byte {position}: {reason}")]
    InvalidInteger { position: usize, reason: &'static str },

    #[error("invalid byte string length at byte {position}: {reason}")]
    InvalidLength { position: usize, reason: &'static str },

    #[error("byte string at byte {position} claims {claimed} bytes but only {remaining} remain")]
    LengthOutOfBounds { position: usize, claimed: usize, remaining: usize },

    #[error("dictionary key at byte {0} is not a byte string")]
    NonStringKey(usize),

    #[error("duplicate dictionary key at byte {0}")]
    DuplicateKey(usize),

    #[error("nesting deeper than {max} levels at byte {position}")]
    NestingTooDeep { max: usize, position: usize },

    #[error("trailing data after the root value at byte {0}")]
    TrailingData(usize),
}

/// A decoded value had a different shape than the caller required.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected {} {expected}, found {} {found}", article(.expected), article(.found))]
pub struct TypeMismatch {
    pub expected: &'static str,
    pub found: &'static str,
}

impl TypeMismatch {
    pub fn new(expected: &'static str, found: &BencodedValue) -> Self {
        Self { expected, found: found.kind() }
    }
}

fn article(kind: &str) -> &'static str {
    match kind.as_bytes().first() {
        Some(b'a' | b'e' | b'i' | b'o' | b'u') => "an",
        _ => "a",
    }
}
