use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use super::super::{BencodeError, BencodedValue, MAX_NESTING_DEPTH};

pub fn parse_to_bencoded_value(input: &[u8]) -> Result<BencodedValue, BencodeError> {
    if input.is_empty() {
        return Err(BencodeError::EmptyInput);
    }

    let mut cur_index = 0;
    let value = create_value(input, &mut cur_index, 0)?;

    if cur_index != input.len() {
        return Err(BencodeError::TrailingData(cur_index));
    }

    Ok(value)
}

pub fn parse_from_bencoded_value(bencoded_value: &BencodedValue) -> Vec<u8> {
    match bencoded_value {
        BencodedValue::Dict(dict) => to_bencoded_dict(dict),
        BencodedValue::List(list) => to_bencoded_list(list),
        _ => {
            let mut bencoded_string = Vec::new();
            append_bencoded_value(bencoded_value, &mut bencoded_string);

            bencoded_string
        }
    }
}

pub fn to_bencoded_dict(dict: &BTreeMap<Vec<u8>, BencodedValue>) -> Vec<u8> {
    let mut bencoded_string = Vec::new();
    append_bencoded_dict(dict, &mut bencoded_string);

    bencoded_string
}

pub fn to_bencoded_list(list: &[BencodedValue]) -> Vec<u8> {
    let mut bencoded_string = Vec::new();
    append_bencoded_list(list, &mut bencoded_string);

    bencoded_string
}

fn append_bencoded_value(bencoded_value: &BencodedValue, out: &mut Vec<u8>) {
    match bencoded_value {
        BencodedValue::Dict(dict) => append_bencoded_dict(dict, out),
        BencodedValue::List(list) => append_bencoded_list(list, out),
        BencodedValue::Integer(integer) => {
            out.push(b'i');
            out.extend_from_slice(integer.to_string().as_bytes());
            out.push(b'e');
        }
        BencodedValue::ByteString(bytes) => append_byte_string(bytes, out),
    }
}

fn append_bencoded_dict(dict: &BTreeMap<Vec<u8>, BencodedValue>, out: &mut Vec<u8>) {
    out.push(b'd');

    // BTreeMap iterates keys in ascending byte order
    for (key, value) in dict {
        append_byte_string(key, out);
        append_bencoded_value(value, out);
    }

    out.push(b'e');
}

fn append_bencoded_list(list: &[BencodedValue], out: &mut Vec<u8>) {
    out.push(b'l');

    for value in list {
        append_bencoded_value(value, out);
    }

    out.push(b'e');
}

fn append_byte_string(bytes: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(bytes.len().to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(bytes);
}

/// Parses the body of an integer token, the bytes between `i` and `e`.
pub fn parse_integer(token: &[u8]) -> Result<i64, &'static str> {
    let (negative, digits) = match token.split_first() {
        None => return Err("parsing an empty number"),
        Some((b'-', rest)) => (true, rest),
        Some(_) => (false, token),
    };

    if digits.is_empty() {
        return Err("parsing an empty number");
    }

    if !digits.iter().all(u8::is_ascii_digit) {
        return Err("non-digit character");
    }

    if digits[0] == b'0' && digits.len() > 1 {
        return Err("leading zeros");
    }

    if negative && digits == b"0" {
        return Err("negative zero");
    }

    let mut number: i64 = 0;
    for &digit in digits {
        let digit = i64::from(digit - b'0');

        number = number
            .checked_mul(10)
            .and_then(|n| if negative { n.checked_sub(digit) } else { n.checked_add(digit) })
            .ok_or("number out of range")?;
    }

    Ok(number)
}

/// Parses the decimal length prefix of a byte string.
pub fn parse_length(digits: &[u8]) -> Result<usize, &'static str> {
    if digits.is_empty() {
        return Err("missing length");
    }

    if digits[0] == b'0' && digits.len() > 1 {
        return Err("leading zeros");
    }

    let mut length: usize = 0;
    for &digit in digits {
        if !digit.is_ascii_digit() {
            return Err("non-digit character");
        }

        length = length
            .checked_mul(10)
            .and_then(|l| l.checked_add(usize::from(digit - b'0')))
            .ok_or("length out of range")?;
    }

    Ok(length)
}

fn expect_byte(input: &[u8], cur_index: usize, expected: u8) -> Result<(), BencodeError> {
    match input.get(cur_index) {
        None => Err(BencodeError::UnexpectedEof(cur_index)),
        Some(&byte) if byte == expected => Ok(()),
        Some(&byte) => Err(BencodeError::UnexpectedByte { byte, position: cur_index }),
    }
}

/// Decodes the value starting at `cur_index`. `depth` is the nesting level of the enclosing container.
pub fn create_value(input: &[u8], cur_index: &mut usize, depth: usize) -> Result<BencodedValue, BencodeError> {
    match input.get(*cur_index) {
        None => Err(BencodeError::UnexpectedEof(*cur_index)),
        Some(b'd') => create_dict(input, cur_index, depth + 1),
        Some(b'l') => create_list(input, cur_index, depth + 1),
        Some(b'i') => create_int(input, cur_index),
        Some(b'0'..=b'9') => Ok(BencodedValue::ByteString(create_byte_string(input, cur_index)?)),
        Some(&byte) => Err(BencodeError::UnexpectedByte { byte, position: *cur_index }),
    }
}

pub fn create_dict(input: &[u8], cur_index: &mut usize, depth: usize) -> Result<BencodedValue, BencodeError> {
    if depth > MAX_NESTING_DEPTH {
        return Err(BencodeError::NestingTooDeep { max: MAX_NESTING_DEPTH, position: *cur_index });
    }

    expect_byte(input, *cur_index, b'd')?;
    *cur_index += 1;

    let mut dict = BTreeMap::new();
    loop {
        let key_index = *cur_index;

        match input.get(key_index) {
            None => return Err(BencodeError::UnexpectedEof(key_index)),
            Some(b'e') => break,
            Some(b'0'..=b'9') => {}
            Some(_) => return Err(BencodeError::NonStringKey(key_index)),
        }

        let key = create_byte_string(input, cur_index)?;
        let value = create_value(input, cur_index, depth)?;

        match dict.entry(key) {
            Entry::Vacant(entry) => {
                entry.insert(value);
            }
            Entry::Occupied(_) => return Err(BencodeError::DuplicateKey(key_index)),
        }
    }
    *cur_index += 1;

    Ok(BencodedValue::Dict(dict))
}

pub fn create_list(input: &[u8], cur_index: &mut usize, depth: usize) -> Result<BencodedValue, BencodeError> {
    if depth > MAX_NESTING_DEPTH {
        return Err(BencodeError::NestingTooDeep { max: MAX_NESTING_DEPTH, position: *cur_index });
    }

    expect_byte(input, *cur_index, b'l')?;
    *cur_index += 1;

    let mut list = Vec::new();
    loop {
        match input.get(*cur_index) {
            None => return Err(BencodeError::UnexpectedEof(*cur_index)),
            Some(b'e') => break,
            Some(_) => list.push(create_value(input, cur_index, depth)?),
        }
    }
    *cur_index += 1;

    Ok(BencodedValue::List(list))
}

pub fn create_int(input: &[u8], cur_index: &mut usize) -> Result<BencodedValue, BencodeError> {
    let start = *cur_index;
    expect_byte(input, start, b'i')?;

    let token_start = start + 1;
    let token_len = input[token_start..]
        .iter()
        .position(|&byte| byte == b'e')
        .ok_or(BencodeError::UnexpectedEof(input.len()))?;

    let token = &input[token_start..token_start + token_len];
    let number = parse_integer(token)
        .map_err(|reason| BencodeError::InvalidInteger { position: start, reason })?;

    *cur_index = token_start + token_len + 1; // + 1 for the 'e' byte

    Ok(BencodedValue::Integer(number))
}

pub fn create_byte_string(input: &[u8], cur_index: &mut usize) -> Result<Vec<u8>, BencodeError> {
    let start = *cur_index;

    let digits_len = input[start..]
        .iter()
        .take_while(|byte| byte.is_ascii_digit())
        .count();
    let colon_index = start + digits_len;

    expect_byte(input, colon_index, b':')?;

    let word_len = parse_length(&input[start..colon_index])
        .map_err(|reason| BencodeError::InvalidLength { position: start, reason })?;

    let word_start = colon_index + 1; // + 1 for the ':' byte
    let remaining = input.len() - word_start;
    if word_len > remaining {
        return Err(BencodeError::LengthOutOfBounds { position: start, claimed: word_len, remaining });
    }

    *cur_index = word_start + word_len;

    Ok(input[word_start..*cur_index].to_vec())
}
