use super::{BencodeError, BencodedValue};

mod parsing_utils;

pub fn decode(bytes: &[u8]) -> Result<BencodedValue, BencodeError> {
    parsing_utils::parse_to_bencoded_value(bytes)
}

pub fn encode(bencoded_value: &BencodedValue) -> Vec<u8> {
    parsing_utils::parse_from_bencoded_value(bencoded_value)
}
