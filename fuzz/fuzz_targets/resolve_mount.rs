#![no_main]

use std::collections::HashMap;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use logpilot_container_sync::resolve_mount;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    mounts: Vec<(String, String)>,
    dir: String,
}

fuzz_target!(|input: FuzzInput| {
    let mounts: HashMap<String, String> = input.mounts.into_iter().take(16).collect();
    if let Some(source) = resolve_mount(&mounts, &input.dir) {
        assert!(mounts.values().any(|v| v == source));
    }
});
