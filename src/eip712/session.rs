//! The typed-data encoding session.
//!
//! The host drives the session frame by frame; the device incrementally
//! computes `keccak256("\x19\x01" ‖ hashStruct(domain) ‖ hashStruct(message))`
//! and emits a review prompt for every value it mixes in. Every operation
//! is fail-fast: the first violated invariant poisons the session and all
//! later operations fail until the next `init`.

#[cfg(not(feature = "std"))]
use alloc::string::String;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use log::warn;

use crate::eip712::display::{format_value, struct_path};
use crate::eip712::encoded_type::{
    extend_with_encoded_type, find_struct_type, split_array_encoded,
};
use crate::eip712::frame::{Frame, FrameInfo};
use crate::eip712::hash::{extend_hash, keccak256, HashSlot};
use crate::eip712::types::{array_type, atomic_pad, is_dynamic_type, is_valid_identifier};
use crate::eip712::{NAME_LENGTH_LIMIT, STACK_DEPTH_LIMIT, TYPE_LENGTH_LIMIT};
use crate::messages::FrameKind;

/// Marker for a failed (and now poisoned) session operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionError;

pub type SessionResult<T> = core::result::Result<T, SessionError>;

/// A review prompt produced while mixing a value into the digest.
///
/// The title is the path through the frame stack, the body the rendered
/// value. A declined prompt must abort the session.
#[derive(Clone, Debug, PartialEq)]
pub struct Prompt {
    pub title: String,
    pub body: String,
}

/// Lifecycle states of the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Not initialized, or poisoned by a failed operation
    Invalid,
    /// Accepting operations
    Ok,
    /// Finalized; the digest is available
    Done,
}

/// Poisons the session and returns [SessionError] unless `cond` holds.
macro_rules! ensure {
    ($session:expr, $cond:expr) => {
        if !($cond) {
            return Err($session.fail(file!(), line!()));
        }
    };
}

/// The typed-data encoding session.
///
/// Process-wide: one session exists per device, re-initialized by every
/// `Eip712Init` and torn down after `Eip712Sign`/`Eip712Verify`.
pub struct Session {
    state: SessionState,
    hash_updates: u32,
    hash: HashSlot,
    frames: Vec<Frame>,
    #[cfg(feature = "debug-link")]
    failure: Option<(&'static str, u32)>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            state: SessionState::Invalid,
            hash_updates: 0,
            hash: HashSlot::new(),
            frames: Vec::with_capacity(STACK_DEPTH_LIMIT),
            #[cfg(feature = "debug-link")]
            failure: None,
        }
    }
}

impl Session {
    /// Clears the session and seeds the top-level hash with the
    /// `\x19\x01` prefix.
    pub fn init(&mut self) {
        *self = Self::default();
        self.state = SessionState::Ok;
        self.hash.update(b"\x19\x01");
    }

    /// Poisons the session (e.g. after a declined review prompt).
    pub fn abort(&mut self) {
        self.state = SessionState::Invalid;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Frames currently on the stack.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Top-level hash inputs mixed so far (domain and message hashes).
    pub fn hash_updates(&self) -> u32 {
        self.hash_updates
    }

    /// Location of the first failed invariant, for debug reporting.
    #[cfg(feature = "debug-link")]
    pub fn failure_location(&self) -> Option<(&'static str, u32)> {
        self.failure
    }

    fn fail(&mut self, file: &'static str, line: u32) -> SessionError {
        warn!("typed-data session failure at {file}:{line}");

        #[cfg(feature = "debug-link")]
        if self.failure.is_none() {
            self.failure = Some((file, line));
        }

        self.state = SessionState::Invalid;

        SessionError
    }

    fn check_ok(&mut self) -> SessionResult<()> {
        ensure!(self, self.state == SessionState::Ok);
        Ok(())
    }

    /// Pushes a new frame.
    ///
    /// With a non-empty stack the push introduces the next field of the
    /// parent frame; the root push must carry an empty field name.
    pub fn push(&mut self, kind: FrameKind, encoded_type: &str, field_name: &str) -> SessionResult<()> {
        self.check_ok()?;
        ensure!(self, field_name.len() <= NAME_LENGTH_LIMIT);

        if self.frames.is_empty() {
            ensure!(self, field_name.is_empty());
        } else {
            self.next_field(self.frames.len() - 1, field_name)?;
        }

        ensure!(self, self.frames.len() < STACK_DEPTH_LIMIT);

        match kind {
            FrameKind::Struct => self.push_struct(encoded_type, field_name),
            FrameKind::Array => self.push_array(encoded_type, field_name),
            FrameKind::DynamicData => self.push_dynamic(encoded_type, field_name),
        }
    }

    fn push_struct(&mut self, encoded_type: &str, field_name: &str) -> SessionResult<()> {
        let Some(primary) = find_struct_type(encoded_type, None) else {
            return Err(self.fail(file!(), line!()));
        };
        ensure!(self, primary.name.len() <= TYPE_LENGTH_LIMIT);

        let mut frame = Frame::new_struct(primary.name, field_name);

        // hashStruct starts with the type hash of the full encoded type
        ensure!(self, frame.hash.update(&keccak256(encoded_type.as_bytes())));

        let expected_ok = match &mut frame.info {
            FrameInfo::Struct {
                expected_extended, ..
            } => extend_with_encoded_type(expected_extended, encoded_type),
            _ => false,
        };
        ensure!(self, expected_ok);

        // open the accumulated signature, on this frame and up the stack
        if let FrameInfo::Struct { extended, .. } = &mut frame.info {
            extend_hash(extended, primary.name.as_bytes());
            extend_hash(extended, b"(");
        }
        if !self.frames.is_empty() {
            let top = self.frames.len() - 1;
            self.extend_extended_at(top, primary.name.as_bytes())?;
            self.extend_extended_at(top, b"(")?;
        }

        self.frames.push(frame);

        Ok(())
    }

    fn push_array(&mut self, encoded_type: &str, field_name: &str) -> SessionResult<()> {
        // arrays only ever appear as fields, never at the root
        ensure!(self, !self.frames.is_empty());

        let head_end = encoded_type.find('(').unwrap_or(encoded_type.len());
        let head = &encoded_type[..head_end];
        let Some(parsed) = array_type(head) else {
            return Err(self.fail(file!(), line!()));
        };
        ensure!(self, head.len() <= TYPE_LENGTH_LIMIT);

        let Some((element_encoded, _)) = split_array_encoded(encoded_type) else {
            return Err(self.fail(file!(), line!()));
        };

        let mut frame = Frame::new_array(head, field_name, parsed.count);

        let expected_ok = match &mut frame.info {
            FrameInfo::Array {
                expected_element_extended,
                ..
            } => extend_with_encoded_type(expected_element_extended, &element_encoded),
            _ => false,
        };
        ensure!(self, expected_ok);

        // the parent's signature absorbs the full array signature
        let top = self.frames.len() - 1;
        ensure!(
            self,
            extend_frames_with_encoded_type(&mut self.frames, top, encoded_type)
        );

        self.frames.push(frame);

        Ok(())
    }

    fn push_dynamic(&mut self, encoded_type: &str, field_name: &str) -> SessionResult<()> {
        ensure!(self, is_dynamic_type(encoded_type));

        self.frames.push(Frame::new_dynamic(encoded_type, field_name));

        Ok(())
    }

    /// Finalizes the top frame, mixing its hash into its parent (or, for
    /// a root frame, into the session hash).
    pub fn pop(&mut self) -> SessionResult<Option<Prompt>> {
        self.check_ok()?;
        ensure!(self, !self.frames.is_empty());

        let Some(mut frame) = self.frames.pop() else {
            return Err(self.fail(file!(), line!()));
        };
        let prompt = self.finalize_frame(&mut frame)?;

        let digest = match frame.hash.digest() {
            Some(digest) => *digest,
            None => return Err(self.fail(file!(), line!())),
        };

        if let Some(top) = self.frames.len().checked_sub(1) {
            let updated = self.frames[top].hash.update(&digest);
            ensure!(self, updated);
        } else {
            ensure!(self, self.hash.update(&digest));

            self.hash_updates += 1;
            match self.hash_updates {
                1 => {
                    ensure!(self, frame.kind() == FrameKind::Struct);
                    ensure!(self, frame.type_name == "EIP712Domain");
                }
                2 => ensure!(self, frame.kind() == FrameKind::Struct),
                // encode() takes exactly two sub-hashes
                _ => return Err(self.fail(file!(), line!())),
            }
        }

        Ok(prompt)
    }

    fn finalize_frame(&mut self, frame: &mut Frame) -> SessionResult<Option<Prompt>> {
        match frame.kind() {
            FrameKind::Struct => {
                ensure!(self, frame.hash.finalize());

                // close the accumulated signature here and in the parent
                if let FrameInfo::Struct { extended, .. } = &mut frame.info {
                    extend_hash(extended, b")");
                }
                if !self.frames.is_empty() {
                    self.extend_extended_at(self.frames.len() - 1, b")")?;
                }

                let signature_ok = matches!(
                    &frame.info,
                    FrameInfo::Struct { extended, expected_extended, .. }
                        if extended == expected_extended
                );
                ensure!(self, signature_ok);

                Ok(
                    matches!(&frame.info, FrameInfo::Struct { field_count: 0, .. })
                        .then(|| self.empty_prompt(&frame.field_name, &frame.type_name)),
                )
            }
            FrameKind::Array => {
                let (count, expected) = match &frame.info {
                    FrameInfo::Array {
                        element_count,
                        expected_elements,
                        ..
                    } => (*element_count, *expected_elements),
                    _ => (0, 0),
                };

                if expected != u32::MAX {
                    ensure!(self, count == expected);
                }

                if count > 0 {
                    let element_ok = matches!(
                        &frame.info,
                        FrameInfo::Array { element_extended, expected_element_extended, .. }
                            if element_extended == expected_element_extended
                    );
                    ensure!(self, element_ok);
                }

                ensure!(self, frame.hash.finalize());

                Ok((count == 0).then(|| self.empty_prompt(&frame.field_name, &frame.type_name)))
            }
            FrameKind::DynamicData => {
                // dynamic data always hands its hash to a parent frame
                ensure!(self, !self.frames.is_empty());
                ensure!(self, frame.hash.finalize());

                let type_name = frame.type_name.clone();
                self.extend_extended_at(self.frames.len() - 1, type_name.as_bytes())?;

                let (first, first_len, total_len) = match &frame.info {
                    FrameInfo::Dynamic {
                        first,
                        first_len,
                        total_len,
                    } => (first, *first_len, *total_len),
                    _ => return Err(self.fail(file!(), line!())),
                };

                Ok(Some(Prompt {
                    title: struct_path(&self.frames, &frame.field_name, &frame.type_name),
                    body: format_value(&frame.type_name, &first[..first_len], total_len),
                }))
            }
        }
    }

    /// Mixes one fixed-width field into the current frame.
    ///
    /// Legal on Struct and Array frames; the value must be exactly the
    /// type's width and is padded to 32 bytes (sign-extending negative
    /// ints, zero-padding everything else).
    pub fn append_atomic(&mut self, type_str: &str, name: &str, value: &[u8]) -> SessionResult<Prompt> {
        self.check_ok()?;
        ensure!(self, !self.frames.is_empty());

        let Some(pad) = atomic_pad(type_str) else {
            return Err(self.fail(file!(), line!()));
        };
        ensure!(self, value.len() <= 32);
        ensure!(self, value.len() == 32 - pad.unsigned_abs() as usize);

        if type_str == "bool" {
            ensure!(self, value[0] <= 0x01);
        }

        let top = self.frames.len() - 1;
        self.next_field(top, name)?;
        self.extend_extended_at(top, type_str.as_bytes())?;

        let negative =
            type_str.starts_with("int") && !value.is_empty() && value[0] & 0x80 != 0;

        for _ in 0..pad.max(0) {
            self.update_hash_at(top, if negative { &[0xff] } else { &[0x00] })?;
        }
        self.update_hash_at(top, value)?;
        for _ in 0..(-pad).max(0) {
            self.update_hash_at(top, &[0x00])?;
        }

        Ok(Prompt {
            title: struct_path(&self.frames, name, type_str),
            body: format_value(type_str, value, value.len()),
        })
    }

    /// Appends a slice of the current DynamicData frame's value.
    pub fn append_dynamic(&mut self, data: &[u8]) -> SessionResult<()> {
        self.check_ok()?;
        ensure!(self, !self.frames.is_empty());

        let top = self.frames.len() - 1;
        ensure!(self, self.frames[top].kind() == FrameKind::DynamicData);

        let mut length_ok = false;
        if let FrameInfo::Dynamic {
            total_len,
            first_len,
            first,
        } = &mut self.frames[top].info
        {
            if *first_len < first.len() {
                let take = data.len().min(first.len() - *first_len);
                first[*first_len..*first_len + take].copy_from_slice(&data[..take]);
                *first_len += take;
            }

            if let Some(total) = total_len.checked_add(data.len()) {
                *total_len = total;
                length_ok = true;
            }
        }
        ensure!(self, length_ok);

        self.update_hash_at(top, data)
    }

    /// Finalizes the session and returns the 32-byte digest.
    ///
    /// Requires an empty stack and exactly two top-level hash inputs.
    /// Idempotent once the session is done.
    pub fn finalize(&mut self) -> SessionResult<[u8; 32]> {
        if self.state == SessionState::Done {
            if let Some(digest) = self.hash.digest() {
                return Ok(*digest);
            }
        }

        self.check_ok()?;
        ensure!(self, self.frames.is_empty());
        ensure!(self, self.hash_updates == 2);
        ensure!(self, self.hash.finalize());

        self.state = SessionState::Done;

        match self.hash.digest() {
            Some(digest) => Ok(*digest),
            None => Err(self.fail(file!(), line!())),
        }
    }

    fn next_field(&mut self, idx: usize, field_name: &str) -> SessionResult<()> {
        match self.frames[idx].kind() {
            FrameKind::Struct => {
                ensure!(self, is_valid_identifier(field_name));

                let first = matches!(
                    &self.frames[idx].info,
                    FrameInfo::Struct { field_count: 0, .. }
                );
                if !first {
                    self.extend_extended_at(idx, b",")?;
                }
                self.extend_extended_at(idx, field_name.as_bytes())?;
                self.extend_extended_at(idx, b" ")?;

                let mut count = 0;
                if let FrameInfo::Struct { field_count, .. } = &mut self.frames[idx].info {
                    *field_count += 1;
                    count = *field_count;
                }
                ensure!(self, count > 0);

                Ok(())
            }
            FrameKind::Array => {
                // array elements are anonymous
                ensure!(self, field_name.is_empty());

                let previous_ok = match &self.frames[idx].info {
                    FrameInfo::Array {
                        element_count,
                        expected_element_extended,
                        element_extended,
                        ..
                    } => *element_count == 0 || element_extended == expected_element_extended,
                    _ => false,
                };
                ensure!(self, previous_ok);

                let mut count = 0;
                let mut limit = 0;
                if let FrameInfo::Array {
                    element_count,
                    expected_elements,
                    element_extended,
                    ..
                } = &mut self.frames[idx].info
                {
                    *element_count += 1;
                    *element_extended = [0u8; 32];
                    count = *element_count;
                    limit = *expected_elements;
                }
                ensure!(self, count > 0 && count <= limit);

                Ok(())
            }
            FrameKind::DynamicData => Err(self.fail(file!(), line!())),
        }
    }

    fn extend_extended_at(&mut self, idx: usize, chunk: &[u8]) -> SessionResult<()> {
        ensure!(self, extend_frames(&mut self.frames, idx, chunk));
        Ok(())
    }

    fn update_hash_at(&mut self, idx: usize, data: &[u8]) -> SessionResult<()> {
        let updated = self.frames[idx].hash.update(data);
        ensure!(self, updated);
        Ok(())
    }

    fn empty_prompt(&self, name: &str, type_str: &str) -> Prompt {
        Prompt {
            title: struct_path(&self.frames, name, type_str),
            body: String::from("(empty)"),
        }
    }
}

/// Extends the accumulated signatures along the stack, starting at
/// `idx`: Struct frames take the chunk and pass it on to their parent,
/// the nearest Array frame absorbs it into the current element's
/// signature, DynamicData frames have no signature at all.
fn extend_frames(frames: &mut [Frame], mut idx: usize, chunk: &[u8]) -> bool {
    loop {
        match &mut frames[idx].info {
            FrameInfo::Struct { extended, .. } => {
                extend_hash(extended, chunk);
                if idx == 0 {
                    return true;
                }
                idx -= 1;
            }
            FrameInfo::Array {
                element_extended, ..
            } => {
                extend_hash(element_extended, chunk);
                return true;
            }
            FrameInfo::Dynamic { .. } => return false,
        }
    }
}

/// Like [extend_frames], but walking a whole encoded type into each
/// accumulator; Array frames absorb and keep propagating, matching how
/// array pushes surface in the enclosing signatures.
fn extend_frames_with_encoded_type(frames: &mut [Frame], mut idx: usize, encoded: &str) -> bool {
    loop {
        match &mut frames[idx].info {
            FrameInfo::Struct { extended, .. } => {
                if !extend_with_encoded_type(extended, encoded) {
                    return false;
                }
                if idx == 0 {
                    return true;
                }
                idx -= 1;
            }
            FrameInfo::Array {
                element_extended, ..
            } => {
                if !extend_with_encoded_type(element_extended, encoded) {
                    return false;
                }
                if idx == 0 {
                    return true;
                }
                idx -= 1;
            }
            FrameInfo::Dynamic { .. } => return false,
        }
    }
}
