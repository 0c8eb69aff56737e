#![no_main]

use libfuzzer_sys::fuzz_target;

use hidsign::eip712::Session;
use hidsign::messages::FrameKind;

#[derive(arbitrary::Arbitrary, Debug)]
enum SessionOp {
    Push {
        kind: u8,
        encoded_type: String,
        field_name: String,
    },
    Pop,
    Atomic {
        encoded_type: String,
        field_name: String,
        value: Vec<u8>,
    },
    Dynamic(Vec<u8>),
    Finalize,
}

fuzz_target!(|ops: Vec<SessionOp>| {
    let mut session = Session::default();
    session.init();

    for op in ops {
        match op {
            SessionOp::Push {
                kind,
                encoded_type,
                field_name,
            } => {
                let kind = FrameKind::from_wire((kind % 3) as u32 + 1).expect("kind in range");
                let _ = session.push(kind, &encoded_type, &field_name);
            }
            SessionOp::Pop => {
                let _ = session.pop();
            }
            SessionOp::Atomic {
                encoded_type,
                field_name,
                value,
            } => {
                let _ = session.append_atomic(&encoded_type, &field_name, &value);
            }
            SessionOp::Dynamic(data) => {
                let _ = session.append_dynamic(&data);
            }
            SessionOp::Finalize => {
                let _ = session.finalize();
            }
        }
    }
});
