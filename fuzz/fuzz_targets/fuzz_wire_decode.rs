#![no_main]

use libfuzzer_sys::fuzz_target;

use hidsign::messages::{
    Eip712AppendAtomicField, Eip712PushFrame, Eip712Sign, Eip712Verify, Failure, Features, Ping,
    WireMessage,
};

fuzz_target!(|data: &[u8]| {
    let _ = Ping::decode(data);
    let _ = Failure::decode(data);
    let _ = Features::decode(data);
    let _ = Eip712PushFrame::decode(data);
    let _ = Eip712AppendAtomicField::decode(data);
    let _ = Eip712Sign::decode(data);
    let _ = Eip712Verify::decode(data);
});
