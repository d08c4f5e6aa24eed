#![no_main]

use libfuzzer_sys::fuzz_target;
use logpilot_supervisor::process::parse_ppid;

fuzz_target!(|data: &[u8]| {
    if let Ok(stat) = std::str::from_utf8(data) {
        let _ = parse_ppid(stat);
    }
});
