#![no_main]

use libfuzzer_sys::fuzz_target;

use hidsign::{decode_tiny, Channel, REPORT_LEN};

fuzz_target!(|data: &[u8]| {
    if data.len() < REPORT_LEN {
        return;
    }

    let mut report = [0u8; REPORT_LEN];
    report.copy_from_slice(&data[..REPORT_LEN]);

    let _ = decode_tiny(Channel::Normal, &report);
});
