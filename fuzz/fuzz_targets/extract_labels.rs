#![no_main]

use std::path::Path;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use logpilot_container_sync::extract_log_configs;
use logpilot_core::types::{ContainerDetails, MountPoint};

const PREFIX: &str = "aliyun.logs.";

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 레이블 (키 앞에 prefix를 붙일지 여부 포함)
    labels: Vec<(bool, String, String)>,
    mounts: Vec<(String, String)>,
    log_path: String,
}

fuzz_target!(|input: FuzzInput| {
    let details = ContainerDetails {
        id: "fuzz".to_owned(),
        name: "/fuzz".to_owned(),
        labels: input
            .labels
            .into_iter()
            .take(32)
            .map(|(prefixed, key, value)| {
                let key = if prefixed { format!("{PREFIX}{key}") } else { key };
                (key, value)
            })
            .collect(),
        log_path: input.log_path,
        mounts: input
            .mounts
            .into_iter()
            .take(16)
            .map(|(destination, source)| MountPoint {
                destination,
                source,
            })
            .collect(),
    };

    let host_root = Path::new("/host");
    let configs = extract_log_configs(PREFIX, host_root, &details);

    // 이름은 정렬되어 있고 중복되지 않으며 모든 HostDir은 기준 디렉토리 아래
    for pair in configs.windows(2) {
        assert!(pair[0].name < pair[1].name);
    }
    for config in &configs {
        assert!(!config.name.contains('.'));
        assert!(config.host_dir.starts_with(host_root));
    }
});
