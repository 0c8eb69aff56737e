//! Solidity type recognition for typed-data fields.

use log::trace;

use crate::eip712::NAME_LENGTH_LIMIT;

/// Parses a decimal count off a type suffix.
///
/// At most nine digits (so the accumulator cannot overflow a `u32`), no
/// leading zero.
pub(crate) fn decode_ascii_int(digits: &str) -> Option<u32> {
    if digits.is_empty() || digits.len() > 9 || digits.starts_with('0') {
        return None;
    }

    let mut acc = 0u32;
    for c in digits.bytes() {
        if !c.is_ascii_digit() {
            return None;
        }
        acc = acc * 10 + (c - b'0') as u32;
    }

    Some(acc)
}

/// Gets whether `name` is a legal field or type identifier.
pub(crate) fn is_valid_identifier(name: &str) -> bool {
    if name.is_empty() || name.len() > NAME_LENGTH_LIMIT {
        return false;
    }

    name.bytes().enumerate().all(|(i, c)| {
        c.is_ascii_lowercase()
            || c.is_ascii_uppercase()
            || c == b'$'
            || c == b'_'
            || (i > 0 && c.is_ascii_digit())
    })
}

/// Recognizes a fixed-width (atomic) type and returns its pad length.
///
/// Positive pad lengths pad before the value (ints, addresses, bool);
/// negative pad lengths pad after it (`bytesN`). The absolute value plus
/// the value width is always 32.
pub(crate) fn atomic_pad(type_str: &str) -> Option<i8> {
    if type_str == "bool" {
        return Some(31);
    }

    if type_str == "address" {
        return Some(12);
    }

    if let Some(digits) = type_str.strip_prefix("bytes") {
        let width = decode_ascii_int(digits)?;
        if width == 0 || width > 32 {
            return None;
        }
        return Some(-((32 - width) as i8));
    }

    let digits = type_str
        .strip_prefix("uint")
        .or_else(|| type_str.strip_prefix("int"))?;
    let bits = decode_ascii_int(digits)?;
    if bits & 0x07 != 0 || bits == 0 || bits > 256 {
        return None;
    }

    Some((32 - bits / 8) as i8)
}

/// Gets whether `type_str` is a dynamic-length type.
pub(crate) fn is_dynamic_type(type_str: &str) -> bool {
    type_str == "bytes" || type_str == "string"
}

/// A recognized array type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ArrayType<'a> {
    /// The element type, everything before the final `[`
    pub element: &'a str,
    /// The count digits between the brackets, empty for dynamic arrays
    pub digits: &'a str,
    /// Declared element count, `u32::MAX` for dynamic arrays
    pub count: u32,
}

/// Recognizes an array type: a trailing `]` with a `[` somewhere after
/// the first character.
pub(crate) fn array_type(type_str: &str) -> Option<ArrayType<'_>> {
    let bytes = type_str.as_bytes();

    // minimal array type: "A[]"
    if bytes.len() < 3 || bytes[bytes.len() - 1] != b']' {
        return None;
    }

    let open = bytes[..bytes.len() - 1].iter().rposition(|&b| b == b'[')?;
    if open == 0 {
        return None;
    }

    let digits = &type_str[open + 1..type_str.len() - 1];
    let count = if digits.is_empty() {
        u32::MAX
    } else {
        decode_ascii_int(digits)?
    };

    let element = &type_str[..open];
    trace!("array type {type_str}: element {element}, count {digits:?}");

    Some(ArrayType {
        element,
        digits,
        count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers() {
        assert!(is_valid_identifier("from"));
        assert!(is_valid_identifier("_private"));
        assert!(is_valid_identifier("$dollar"));
        assert!(is_valid_identifier("name2"));

        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("2name"));
        assert!(!is_valid_identifier("has space"));
        assert!(!is_valid_identifier("paren("));

        // 63 bytes is the limit
        let long = "a".repeat(63);
        assert!(is_valid_identifier(&long));
        let too_long = "a".repeat(64);
        assert!(!is_valid_identifier(&too_long));
    }

    #[test]
    fn test_atomic_pads() {
        assert_eq!(atomic_pad("bool"), Some(31));
        assert_eq!(atomic_pad("address"), Some(12));
        assert_eq!(atomic_pad("uint256"), Some(0));
        assert_eq!(atomic_pad("uint8"), Some(31));
        assert_eq!(atomic_pad("int128"), Some(16));
        assert_eq!(atomic_pad("bytes32"), Some(0));
        assert_eq!(atomic_pad("bytes1"), Some(-31));
        assert_eq!(atomic_pad("bytes20"), Some(-12));
    }

    #[test]
    fn test_atomic_rejections() {
        // non-multiple-of-8 widths
        assert_eq!(atomic_pad("uint17"), None);
        assert_eq!(atomic_pad("int3"), None);
        // out-of-range widths
        assert_eq!(atomic_pad("uint0"), None);
        assert_eq!(atomic_pad("uint512"), None);
        assert_eq!(atomic_pad("bytes0"), None);
        assert_eq!(atomic_pad("bytes33"), None);
        // leading zeros
        assert_eq!(atomic_pad("uint08"), None);
        assert_eq!(atomic_pad("bytes04"), None);
        // dynamic and struct types are not atomic
        assert_eq!(atomic_pad("bytes"), None);
        assert_eq!(atomic_pad("string"), None);
        assert_eq!(atomic_pad("Person"), None);
    }

    #[test]
    fn test_dynamic_types() {
        assert!(is_dynamic_type("bytes"));
        assert!(is_dynamic_type("string"));
        assert!(!is_dynamic_type("bytes32"));
        assert!(!is_dynamic_type("uint256"));
    }

    #[test]
    fn test_array_types() {
        let arr = array_type("uint256[3]").expect("fixed array");
        assert_eq!(arr.element, "uint256");
        assert_eq!(arr.digits, "3");
        assert_eq!(arr.count, 3);

        let arr = array_type("string[]").expect("dynamic array");
        assert_eq!(arr.element, "string");
        assert_eq!(arr.digits, "");
        assert_eq!(arr.count, u32::MAX);

        // nested arrays split at the rightmost bracket pair
        let arr = array_type("uint8[2][]").expect("nested array");
        assert_eq!(arr.element, "uint8[2]");
        assert_eq!(arr.count, u32::MAX);
    }

    #[test]
    fn test_array_rejections() {
        assert!(array_type("uint256").is_none());
        assert!(array_type("[]").is_none());
        assert!(array_type("[3]").is_none());
        assert!(array_type("uint256[0]").is_none());
        assert!(array_type("uint256[03]").is_none());
        assert!(array_type("uint256[x]").is_none());
    }
}
