//! Review-prompt rendering for typed-data fields.

#[cfg(not(feature = "std"))]
use alloc::string::String;

use crate::eip712::frame::Frame;
use crate::eip712::hash::keccak256;

/// Renders the path through the frame stack, e.g.
/// `Mail / to: Person / name: string`.
pub(crate) fn struct_path(frames: &[Frame], name: &str, type_str: &str) -> String {
    let mut out = String::new();

    if let Some(root) = frames.first() {
        out.push_str(&root.type_name);
    }
    for frame in frames.iter().skip(1) {
        out.push_str(&format!(" / {}: {}", frame.field_name, frame.type_name));
    }

    if !name.is_empty() || !type_str.is_empty() {
        if !frames.is_empty() {
            out.push_str(" / ");
        }
        if !name.is_empty() {
            out.push_str(name);
        }
        if !name.is_empty() && !type_str.is_empty() {
            out.push_str(": ");
        }
        if !type_str.is_empty() {
            out.push_str(type_str);
        }
    }

    out
}

/// Renders a field value for review.
///
/// `value` is the captured prefix; `total_len` the full value length. A
/// shortened prefix gets a trailing ellipsis.
pub(crate) fn format_value(type_str: &str, value: &[u8], total_len: usize) -> String {
    let mut out = String::new();

    if type_str == "bool" && value.len() == 1 && total_len == 1 {
        out.push_str(if value[0] != 0 { "true" } else { "false" });
    } else if type_str == "string" {
        out.push('"');
        for &byte in value {
            if byte == b'"' || byte == b'\\' {
                out.push('\\');
            }
            out.push(byte as char);
        }
        out.push('"');
    } else if type_str == "address" && value.len() == 20 {
        out.push_str(&checksum_address(value));
    } else if (type_str.starts_with("uint") || type_str.starts_with("int"))
        && !value.is_empty()
        && value.len() <= 32
    {
        // integers render wrapped in their declaring type: uint256(1)
        out.push_str(type_str);
        out.push('(');
        out.push_str(&format_int(type_str.starts_with("int"), value));
        out.push(')');
    } else if !value.is_empty() {
        out.push_str("0x");
        for &byte in value {
            out.push_str(&format!("{byte:02x}"));
        }
    } else if total_len == 0 {
        out.push_str("(empty)");
    }

    if value.len() < total_len {
        out.push_str("...");
    }

    out
}

/// EIP-55 mixed-case checksum encoding of a 20-byte address.
pub(crate) fn checksum_address(address: &[u8]) -> String {
    let mut lower = String::with_capacity(40);
    for &byte in address {
        lower.push_str(&format!("{byte:02x}"));
    }

    let digest = keccak256(lower.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            digest[i / 2] >> 4
        } else {
            digest[i / 2] & 0x0f
        };

        out.push(if c.is_ascii_alphabetic() && nibble >= 8 {
            c.to_ascii_uppercase()
        } else {
            c
        });
    }

    out
}

/// Lowercase hex of a byte string.
pub(crate) fn hex_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }

    out
}

/// Decimal rendering of a big-endian integer of up to 32 bytes.
///
/// Signed values are interpreted as 256-bit two's complement.
fn format_int(signed: bool, value: &[u8]) -> String {
    let negative = signed && value[0] & 0x80 != 0;

    let mut magnitude = [if negative { 0xffu8 } else { 0x00 }; 32];
    magnitude[32 - value.len()..].copy_from_slice(value);

    if negative {
        // two's complement negate to get the magnitude
        let mut carry = true;
        for byte in magnitude.iter_mut().rev() {
            *byte = !*byte;
            if carry {
                let (sum, overflow) = byte.overflowing_add(1);
                *byte = sum;
                carry = overflow;
            }
        }
    }

    // repeated division by ten, least-significant digit first
    let mut digits = String::new();
    loop {
        let mut rem = 0u32;
        for byte in magnitude.iter_mut() {
            let cur = (rem << 8) | *byte as u32;
            *byte = (cur / 10) as u8;
            rem = cur % 10;
        }
        digits.push((b'0' + rem as u8) as char);

        if magnitude.iter().all(|&b| b == 0) {
            break;
        }
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.extend(digits.chars().rev());

    out
}
