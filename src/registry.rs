//! Static message registry.
//!
//! Maps `(channel, id, direction)` to a schema entry with a dispatch
//! mode, a permission class, and an optional handler. The table is total
//! over its id space: absent ids are `None`, never zeroed placeholders,
//! and a present id with the wrong channel or direction is a miss.

use crate::std;
use std::fmt;

use crate::messages::MsgId;

/// Transport channel a message travels on.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Normal,
    Debug,
}

impl From<Channel> for &'static str {
    fn from(channel: Channel) -> Self {
        match channel {
            Channel::Normal => "normal",
            Channel::Debug => "debug",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", <&'static str>::from(*self))
    }
}

/// Direction of travel relative to the device.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    InFromHost,
    OutToHost,
}

/// How the body of an inbound message reaches its handler.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Reassemble the whole body, decode it, invoke the handler once.
    Parsed,
    /// Hand every chunk to a stateful raw handler; no reassembly buffer.
    Raw,
}

/// Firmware-variant gate for a message.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    /// Executable on every firmware variant
    Any,
    /// Manufacturing firmware only
    FactoryOnly,
    /// Excluded from manufacturing firmware
    FactoryProhibited,
}

impl Permission {
    /// Gets whether a message with this permission class may run.
    pub fn allows(&self, factory_firmware: bool) -> bool {
        match self {
            Self::Any => true,
            Self::FactoryOnly => factory_firmware,
            Self::FactoryProhibited => !factory_firmware,
        }
    }
}

/// Handler routing for an inbound message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handler {
    /// Decoded and routed through the request dispatcher.
    Request,
    /// Chunk-streamed into the typed-data dynamic-data feeder.
    RawDynamicData,
}

/// One registry row.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MessageEntry {
    pub id: MsgId,
    pub channel: Channel,
    pub direction: Direction,
    pub dispatch: Dispatch,
    pub permission: Permission,
    pub handler: Option<Handler>,
}

impl MessageEntry {
    const fn incoming(id: MsgId, permission: Permission, handler: Option<Handler>) -> Self {
        Self {
            id,
            channel: Channel::Normal,
            direction: Direction::InFromHost,
            dispatch: Dispatch::Parsed,
            permission,
            handler,
        }
    }

    const fn outgoing(id: MsgId) -> Self {
        Self {
            id,
            channel: Channel::Normal,
            direction: Direction::OutToHost,
            dispatch: Dispatch::Parsed,
            permission: Permission::Any,
            handler: None,
        }
    }

    const fn raw_incoming(id: MsgId, permission: Permission) -> Self {
        Self {
            id,
            channel: Channel::Normal,
            direction: Direction::InFromHost,
            dispatch: Dispatch::Raw,
            permission,
            handler: Some(Handler::RawDynamicData),
        }
    }

    #[cfg(feature = "debug-link")]
    const fn debug_incoming(id: MsgId, handler: Option<Handler>) -> Self {
        Self {
            id,
            channel: Channel::Debug,
            direction: Direction::InFromHost,
            dispatch: Dispatch::Parsed,
            permission: Permission::Any,
            handler,
        }
    }

    #[cfg(feature = "debug-link")]
    const fn debug_outgoing(id: MsgId) -> Self {
        Self {
            id,
            channel: Channel::Debug,
            direction: Direction::OutToHost,
            dispatch: Dispatch::Parsed,
            permission: Permission::Any,
            handler: None,
        }
    }

    /// Finds the registry entry for `(channel, id, direction)`.
    ///
    /// Returns `None` for unknown ids and for known ids arriving on the
    /// wrong channel or in the wrong direction.
    pub fn lookup(channel: Channel, id: u16, direction: Direction) -> Option<&'static Self> {
        let index = MESSAGE_TABLE
            .binary_search_by_key(&id, |entry| u16::from(entry.id))
            .ok()?;
        let entry = &MESSAGE_TABLE[index];

        (entry.channel == channel && entry.direction == direction).then_some(entry)
    }
}

/// Registry table, sorted by wire id.
static MESSAGE_TABLE: &[MessageEntry] = &[
    MessageEntry::incoming(MsgId::Initialize, Permission::Any, Some(Handler::Request)),
    MessageEntry::incoming(MsgId::Ping, Permission::Any, Some(Handler::Request)),
    MessageEntry::outgoing(MsgId::Success),
    MessageEntry::outgoing(MsgId::Failure),
    MessageEntry::outgoing(MsgId::Features),
    MessageEntry::outgoing(MsgId::PinMatrixRequest),
    // acks are accepted only as tiny messages; a full-frame ack decodes
    // but has nowhere to go
    MessageEntry::incoming(MsgId::PinMatrixAck, Permission::Any, None),
    MessageEntry::incoming(MsgId::Cancel, Permission::Any, Some(Handler::Request)),
    MessageEntry::outgoing(MsgId::ButtonRequest),
    MessageEntry::incoming(MsgId::ButtonAck, Permission::Any, None),
    MessageEntry::outgoing(MsgId::PassphraseRequest),
    MessageEntry::incoming(MsgId::PassphraseAck, Permission::Any, None),
    MessageEntry::incoming(MsgId::GetFeatures, Permission::Any, Some(Handler::Request)),
    MessageEntry::outgoing(MsgId::MessageSignature),
    #[cfg(feature = "debug-link")]
    MessageEntry::debug_incoming(MsgId::DebugLinkDecision, None),
    #[cfg(feature = "debug-link")]
    MessageEntry::debug_incoming(MsgId::DebugLinkGetState, Some(Handler::Request)),
    #[cfg(feature = "debug-link")]
    MessageEntry::debug_outgoing(MsgId::DebugLinkState),
    #[cfg(feature = "debug-link")]
    MessageEntry::debug_incoming(MsgId::DebugLinkStop, Some(Handler::Request)),
    MessageEntry::incoming(MsgId::SoftReset, Permission::FactoryOnly, Some(Handler::Request)),
    MessageEntry::incoming(MsgId::Eip712Init, Permission::Any, Some(Handler::Request)),
    MessageEntry::outgoing(MsgId::Eip712ContextInfo),
    MessageEntry::incoming(MsgId::Eip712PushFrame, Permission::Any, Some(Handler::Request)),
    MessageEntry::incoming(MsgId::Eip712PopFrame, Permission::Any, Some(Handler::Request)),
    MessageEntry::incoming(
        MsgId::Eip712AppendAtomicField,
        Permission::Any,
        Some(Handler::Request),
    ),
    MessageEntry::raw_incoming(MsgId::Eip712AppendDynamicData, Permission::Any),
    MessageEntry::incoming(
        MsgId::Eip712Sign,
        Permission::FactoryProhibited,
        Some(Handler::Request),
    ),
    MessageEntry::incoming(
        MsgId::Eip712Verify,
        Permission::FactoryProhibited,
        Some(Handler::Request),
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_sorted_by_id() {
        let mut last = None;
        for entry in MESSAGE_TABLE {
            let id = u16::from(entry.id);
            if let Some(prev) = last {
                assert!(id > prev, "table out of order at id {id}");
            }
            last = Some(id);
        }
    }

    #[test]
    fn test_lookup_known_entries() {
        let ping = MessageEntry::lookup(Channel::Normal, 1, Direction::InFromHost)
            .expect("Ping is registered");
        assert_eq!(ping.id, MsgId::Ping);
        assert_eq!(ping.dispatch, Dispatch::Parsed);
        assert_eq!(ping.handler, Some(Handler::Request));

        let raw = MessageEntry::lookup(Channel::Normal, 469, Direction::InFromHost)
            .expect("dynamic data append is registered");
        assert_eq!(raw.dispatch, Dispatch::Raw);
        assert_eq!(raw.handler, Some(Handler::RawDynamicData));
    }

    #[test]
    fn test_lookup_rejects_direction_mismatch() {
        // Success exists, but only device-to-host
        assert!(MessageEntry::lookup(Channel::Normal, 2, Direction::InFromHost).is_none());
        assert!(MessageEntry::lookup(Channel::Normal, 2, Direction::OutToHost).is_some());
    }

    #[test]
    fn test_lookup_rejects_channel_mismatch() {
        // Ping is not a debug-channel message
        assert!(MessageEntry::lookup(Channel::Debug, 1, Direction::InFromHost).is_none());
    }

    #[test]
    fn test_lookup_unknown_id() {
        assert!(MessageEntry::lookup(Channel::Normal, 0x4242, Direction::InFromHost).is_none());
    }

    #[test]
    fn test_permission_gating() {
        assert!(Permission::Any.allows(true));
        assert!(Permission::Any.allows(false));
        assert!(Permission::FactoryOnly.allows(true));
        assert!(!Permission::FactoryOnly.allows(false));
        assert!(!Permission::FactoryProhibited.allows(true));
        assert!(Permission::FactoryProhibited.allows(false));
    }
}
