#![no_main]

use libfuzzer_sys::fuzz_target;
use logpilot_container_sync::parse_tags;

fuzz_target!(|data: &[u8]| {
    if let Ok(raw) = std::str::from_utf8(data) {
        if let Ok(tags) = parse_tags(raw) {
            // 성공한 결과에는 빈 키/값이나 구분자가 남지 않음
            for (key, value) in &tags {
                assert!(!key.is_empty() && !value.is_empty());
                assert!(!key.contains(['=', ',']) && !value.contains(['=', ',']));
            }
        }
    }
});
