//! Streaming EIP-712 typed-data hasher.
//!
//! Computes `keccak256("\x19\x01" ‖ hashStruct(domain) ‖ hashStruct(message))`
//! over a document the host presents piecewise as a bounded stack of
//! frames, while producing a review prompt for every value mixed into
//! the digest. See [session::Session] for the driving API.

mod display;
mod encoded_type;
mod frame;
mod hash;
/// The encoding session and its operations
pub mod session;
mod types;

pub use session::{Prompt, Session, SessionError, SessionResult, SessionState};

pub(crate) use display::{checksum_address, hex_string};

/// Maximum number of frames on the encoding stack.
pub const STACK_DEPTH_LIMIT: usize = 8;
/// Maximum byte length of a type name.
pub const TYPE_LENGTH_LIMIT: usize = 63;
/// Maximum byte length of a field name.
pub const NAME_LENGTH_LIMIT: usize = 63;
/// Bytes of a dynamic value captured for the review prompt.
pub const DYNAMIC_DATA_LIMIT: usize = 64;
/// Maximum number of type signatures in one encoded type.
pub const FIELD_LIMIT: usize = 256;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::FrameKind;

    const DOMAIN_TYPE: &str =
        "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";
    const MAIL_TYPE: &str =
        "Mail(Person from,Person to,string contents)Person(string name,address wallet)";
    const PERSON_TYPE: &str = "Person(string name,address wallet)";

    fn push_string(session: &mut Session, name: &str, value: &[u8]) {
        session
            .push(FrameKind::DynamicData, "string", name)
            .unwrap_or_else(|_| panic!("push string {name}"));
        session
            .append_dynamic(value)
            .unwrap_or_else(|_| panic!("append string {name}"));
        session
            .pop()
            .unwrap_or_else(|_| panic!("pop string {name}"));
    }

    fn push_person(session: &mut Session, field: &str, name: &str, wallet: &[u8; 20]) {
        session
            .push(FrameKind::Struct, PERSON_TYPE, field)
            .unwrap_or_else(|_| panic!("push person {field}"));
        push_string(session, "name", name.as_bytes());
        session
            .append_atomic("address", "wallet", wallet)
            .unwrap_or_else(|_| panic!("append wallet of {field}"));
        session
            .pop()
            .unwrap_or_else(|_| panic!("pop person {field}"));
    }

    /// The canonical "Ether Mail" vector from the EIP-712 specification.
    #[test]
    fn test_ether_mail_digest() {
        let mut session = Session::default();
        session.init();

        // domain separator
        session
            .push(FrameKind::Struct, DOMAIN_TYPE, "")
            .expect("push domain");
        push_string(&mut session, "name", b"Ether Mail");
        push_string(&mut session, "version", b"1");

        let mut chain_id = [0u8; 32];
        chain_id[31] = 1;
        session
            .append_atomic("uint256", "chainId", &chain_id)
            .expect("append chainId");

        let verifying_contract = [0xccu8; 20];
        session
            .append_atomic("address", "verifyingContract", &verifying_contract)
            .expect("append verifyingContract");
        session.pop().expect("pop domain");

        // message
        session
            .push(FrameKind::Struct, MAIL_TYPE, "")
            .expect("push mail");

        let cow: [u8; 20] = [
            0xcd, 0x2a, 0x3d, 0x9f, 0x93, 0x8e, 0x13, 0xcd, 0x94, 0x7e, 0xc0, 0x5a, 0xbc, 0x7f,
            0xe7, 0x34, 0xdf, 0x8d, 0xd8, 0x26,
        ];
        let bob = [0xbbu8; 20];
        push_person(&mut session, "from", "Cow", &cow);
        push_person(&mut session, "to", "Bob", &bob);
        push_string(&mut session, "contents", b"Hello, Bob!");

        session.pop().expect("pop mail");

        let digest = session.finalize().expect("finalize");
        assert_eq!(
            hex::encode(digest),
            "be609aee343fb3c4b28e1df9e632fca64fcfaede20f02e86244efddf30957bd2"
        );

        // finalize is idempotent once done
        assert_eq!(session.state(), SessionState::Done);
        assert_eq!(session.finalize().expect("finalize again"), digest);
    }

    /// Chunked dynamic data must hash identically to one-shot appends.
    #[test]
    fn test_chunked_dynamic_data_equivalence() {
        let digest_of = |chunks: &[&[u8]]| {
            let mut session = Session::default();
            session.init();
            session
                .push(FrameKind::Struct, DOMAIN_TYPE, "")
                .expect("push domain");
            session
                .push(FrameKind::DynamicData, "string", "name")
                .expect("push name");
            for chunk in chunks {
                session.append_dynamic(chunk).expect("append chunk");
            }
            session.pop().expect("pop name");
            push_string(&mut session, "version", b"1");

            let mut chain_id = [0u8; 32];
            chain_id[31] = 1;
            session
                .append_atomic("uint256", "chainId", &chain_id)
                .expect("append chainId");
            session
                .append_atomic("address", "verifyingContract", &[0xccu8; 20])
                .expect("append verifyingContract");
            session.pop().expect("pop domain");

            session
                .push(FrameKind::Struct, "Empty()", "")
                .expect("push message");
            session.pop().expect("pop message");

            session.finalize().expect("finalize")
        };

        assert_eq!(
            digest_of(&[b"Ether Mail"]),
            digest_of(&[b"Ether ", b"Mail"]),
        );
    }

    /// Arrays of structs: every element reproduces the element signature.
    #[test]
    fn test_struct_array_round() {
        let mut session = Session::default();
        session.init();

        session
            .push(FrameKind::Struct, "EIP712Domain(string name)", "")
            .expect("push domain");
        push_string(&mut session, "name", b"Group chat");
        session.pop().expect("pop domain");

        session
            .push(
                FrameKind::Struct,
                "Group(Person[2] members)Person(string name,address wallet)",
                "",
            )
            .expect("push group");
        session
            .push(FrameKind::Array, "Person[2](string name,address wallet)", "members")
            .expect("push members");

        push_person(&mut session, "", "Alice", &[0xaa; 20]);
        push_person(&mut session, "", "Bob", &[0xbb; 20]);

        session.pop().expect("pop members");
        session.pop().expect("pop group");

        let digest = session.finalize().expect("finalize");
        assert_eq!(digest.len(), 32);
    }

    /// A mismatched element type poisons the array on its pop.
    #[test]
    fn test_struct_array_element_type_mismatch() {
        let mut session = Session::default();
        session.init();

        session
            .push(FrameKind::Struct, "EIP712Domain(string name)", "")
            .expect("push domain");
        push_string(&mut session, "name", b"x");
        session.pop().expect("pop domain");

        session
            .push(
                FrameKind::Struct,
                "Group(Person[] members)Person(string name,address wallet)",
                "",
            )
            .expect("push group");
        session
            .push(FrameKind::Array, "Person[](string name,address wallet)", "members")
            .expect("push members");

        // element whose signature does not match Person
        session
            .push(FrameKind::Struct, "Animal(string name)", "")
            .expect("element push is accepted");
        push_string(&mut session, "name", b"Rex");
        session.pop().expect("element pop");

        assert!(session.pop().is_err());
        assert_eq!(session.state(), SessionState::Invalid);
    }
}
