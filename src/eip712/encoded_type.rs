//! Encoded-type strings and the canonical extended signature.
//!
//! A struct push hands the device the canonical EIP-712 concatenation of
//! type signatures, primary type first, e.g.
//! `Mail(Person from,Person to,string contents)Person(string name,address wallet)`.
//! The extended signature is rebuilt by walking the primary type's fields
//! in order and emitting each field's signature recursively; cycles are
//! impossible because every referenced struct must appear exactly once,
//! enforced with a bitfield indexed by segment position.

#[cfg(not(feature = "std"))]
use alloc::string::String;

use crate::eip712::hash::extend_hash;
use crate::eip712::types::{array_type, atomic_pad, is_dynamic_type, is_valid_identifier};
use crate::eip712::{FIELD_LIMIT, STACK_DEPTH_LIMIT};

/// One `Name(fields)` segment of an encoded type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct StructType<'a> {
    pub name: &'a str,
    pub fields: &'a str,
    /// Zero-based position of the segment in the encoded type
    pub index: usize,
}

/// Scans the encoded type for a struct segment.
///
/// With `target == None` the first (primary) segment is returned. Every
/// segment walked over is validated, so a malformed tail fails the scan
/// even when the target appears before it.
pub(crate) fn find_struct_type<'a>(encoded: &'a str, target: Option<&str>) -> Option<StructType<'a>> {
    let mut rest = encoded;
    let mut index = 0usize;

    while !rest.is_empty() {
        let open = rest.find('(')?;
        let name = &rest[..open];
        if !is_valid_identifier(name) {
            return None;
        }

        let after = &rest[open + 1..];
        let close = after.find(')')?;
        let fields = &after[..close];

        if target.map_or(true, |t| t == name) {
            return Some(StructType {
                name,
                fields,
                index,
            });
        }

        rest = &after[close + 1..];
        index = index.checked_add(1)?;
    }

    None
}

/// Counts the type signatures an encoded type contains.
///
/// Atomic and dynamic types count as one; arrays count their element
/// type; struct lists count their segments (validating each).
pub(crate) fn count_types(encoded: &str) -> Option<usize> {
    if is_dynamic_type(encoded) || atomic_pad(encoded).is_some() {
        return Some(1);
    }

    if let Some(arr) = array_type(encoded) {
        return count_types(arr.element);
    }

    let mut rest = encoded;
    let mut count = 0usize;

    while !rest.is_empty() {
        let open = rest.find('(')?;
        if !is_valid_identifier(&rest[..open]) {
            return None;
        }

        let after = &rest[open + 1..];
        let close = after.find(')')?;

        rest = &after[close + 1..];
        count += 1;
    }

    Some(count)
}

/// Bitfield over encoded-type segment positions.
#[derive(Default)]
struct SeenSet([u32; FIELD_LIMIT / 32]);

impl SeenSet {
    fn set(&mut self, index: usize) -> bool {
        let Some(word) = self.0.get_mut(index / 32) else {
            return false;
        };
        *word |= 1 << (index % 32);

        true
    }

    /// Number of set bits, provided they are contiguous from bit zero.
    fn contiguous_count(&self) -> Option<usize> {
        let mut count = 0usize;
        let mut saw_zero = false;

        for word in self.0 {
            for bit in 0..32 {
                if word >> bit & 1 == 1 {
                    if saw_zero {
                        return None;
                    }
                    count += 1;
                } else {
                    saw_zero = true;
                }
            }
        }

        Some(count)
    }
}

/// Extends `acc` with the canonical extended signature of `encoded`.
///
/// Fails on malformed encoded types, on reference structs that are
/// missing, duplicated, or unused, and on over-deep nesting.
pub(crate) fn extend_with_encoded_type(acc: &mut [u8; 32], encoded: &str) -> bool {
    // bare atomic and dynamic types are their own signature
    if is_dynamic_type(encoded) || atomic_pad(encoded).is_some() {
        extend_hash(acc, encoded.as_bytes());
        return true;
    }

    // an array-typed primary hashes as its element signature plus the
    // bracket suffix
    if let Some((element_encoded, digits)) = split_array_encoded(encoded) {
        if !extend_with_encoded_type(acc, &element_encoded) {
            return false;
        }

        extend_hash(acc, b"[");
        extend_hash(acc, digits.as_bytes());
        extend_hash(acc, b"]");

        return true;
    }

    let Some(type_count) = count_types(encoded) else {
        return false;
    };
    if type_count == 0 {
        return false;
    }

    let mut seen = SeenSet::default();
    if !extend_inner(acc, encoded, None, &mut seen, 0) {
        return false;
    }

    // every listed reference type must have been visited exactly once
    seen.contiguous_count() == Some(type_count)
}

/// Splits an encoded type whose primary segment carries an array suffix.
///
/// `Person[2](string name,address wallet)` becomes the element encoded
/// type `Person(string name,address wallet)` plus the digits `"2"`.
pub(crate) fn split_array_encoded(encoded: &str) -> Option<(String, &str)> {
    let head_end = encoded.find('(').unwrap_or(encoded.len());
    let arr = array_type(&encoded[..head_end])?;

    let mut element_encoded = String::with_capacity(arr.element.len() + encoded.len() - head_end);
    element_encoded.push_str(arr.element);
    element_encoded.push_str(&encoded[head_end..]);

    Some((element_encoded, arr.digits))
}

fn extend_inner(
    acc: &mut [u8; 32],
    encoded: &str,
    type_name: Option<&str>,
    seen: &mut SeenSet,
    depth: usize,
) -> bool {
    if let Some(name) = type_name {
        if is_dynamic_type(name) || atomic_pad(name).is_some() {
            extend_hash(acc, name.as_bytes());
            return true;
        }

        if let Some(arr) = array_type(name) {
            if !extend_inner(acc, encoded, Some(arr.element), seen, depth + 1) {
                return false;
            }

            extend_hash(acc, b"[");
            extend_hash(acc, arr.digits.as_bytes());
            extend_hash(acc, b"]");

            return true;
        }

        if !is_valid_identifier(name) {
            return false;
        }
    }

    // not a security check, just refusing to walk forever on bad input
    if depth >= STACK_DEPTH_LIMIT {
        return false;
    }

    let Some(st) = find_struct_type(encoded, type_name) else {
        return false;
    };
    if !seen.set(st.index) {
        return false;
    }

    extend_hash(acc, st.name.as_bytes());
    extend_hash(acc, b"(");

    if !st.fields.is_empty() {
        for (i, field) in st.fields.split(',').enumerate() {
            if field.is_empty() {
                return false;
            }

            if i > 0 {
                extend_hash(acc, b",");
            }

            let Some((field_type, field_name)) = field.split_once(' ') else {
                return false;
            };
            if field_type.is_empty() || !is_valid_identifier(field_name) {
                return false;
            }

            extend_hash(acc, field_name.as_bytes());
            extend_hash(acc, b" ");

            if !extend_inner(acc, encoded, Some(field_type), seen, depth + 1) {
                return false;
            }
        }
    }

    extend_hash(acc, b")");

    true
}
