#![no_main]

use libfuzzer_sys::fuzz_target;

use hidsign::{Assembler, Channel};

fuzz_target!(|data: &[u8]| {
    let mut assembler = Assembler::new(Channel::Normal);

    for report in data.chunks(64) {
        let _ = assembler.feed(report);
    }
});
