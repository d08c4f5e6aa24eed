//! 레이블 해석: 컨테이너 레이블에서 로그 수집 규칙 추출
//!
//! # 레이블 스키마
//!
//! ```text
//! <prefix><name>          = <절대 컨테이너 경로> | "stdout"   (필수)
//! <prefix><name>.format   = <문자열>                          (선택, 기본값 "none")
//! <prefix><name>.tags     = "k1=v1,k2=v2"                     (선택, 기본값 빈 맵)
//! ```
//!
//! 잘못된 항목은 경고 로그를 남기고 해당 항목만 건너뜁니다.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tracing::warn;

use logpilot_core::metrics as m;
use logpilot_core::types::{ContainerDetails, LogConfig, Source};

use crate::error::SyncError;
use crate::mount::resolve_mount;

/// compose 프로젝트 레이블
pub const LABEL_PROJECT: &str = "com.docker.compose.project";
/// compose 서비스 레이블
pub const LABEL_SERVICE: &str = "com.docker.compose.service";

/// 런타임이 관리하는 stdout 로그를 가리키는 레이블 값
const STDOUT: &str = "stdout";
const DEFAULT_FORMAT: &str = "none";
const STDOUT_FORMAT: &str = "json";

/// `k1=v1,k2=v2` 형식의 tags 문자열을 파싱합니다.
///
/// 빈 문자열은 빈 맵입니다. 각 쌍은 `=`로 정확히 두 조각으로 나뉘어야 하며
/// 공백을 제거한 key와 value가 모두 비어 있지 않아야 합니다.
///
/// # 예시
/// ```
/// use logpilot_container_sync::parse_tags;
///
/// let tags = parse_tags("a=1, b = 2").unwrap();
/// assert_eq!(tags["a"], "1");
/// assert_eq!(tags["b"], "2");
/// assert!(parse_tags("bad").is_err());
/// ```
pub fn parse_tags(raw: &str) -> Result<BTreeMap<String, String>, SyncError> {
    let mut tags = BTreeMap::new();
    if raw.is_empty() {
        return Ok(tags);
    }

    for pair in raw.split(',') {
        let parts: Vec<&str> = pair.split('=').collect();
        let invalid = || SyncError::InvalidTags {
            raw: raw.to_owned(),
            reason: format!("'{pair}' is not a valid k=v pair"),
        };
        let [key, value] = parts.as_slice() else {
            return Err(invalid());
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() {
            return Err(invalid());
        }
        tags.insert(key.to_owned(), value.to_owned());
    }
    Ok(tags)
}

/// 컨테이너의 모든 로그 레이블을 해석합니다.
///
/// 결과는 `name` 사전순으로 정렬됩니다. 항목별 에러는 경고 후 건너뜁니다.
pub fn extract_log_configs(
    prefix: &str,
    host_root: &Path,
    details: &ContainerDetails,
) -> Vec<LogConfig> {
    let mounts = details.mount_table();
    let mut keys: Vec<&str> = details
        .labels
        .keys()
        .map(String::as_str)
        .filter(|key| log_label_name(prefix, key).is_some())
        .collect();
    keys.sort_unstable();

    let mut configs = Vec::with_capacity(keys.len());
    for key in keys {
        match parse_log_config(prefix, key, host_root, &details.log_path, &mounts, &details.labels)
        {
            Ok(config) => configs.push(config),
            Err(e) => {
                metrics::counter!(m::SYNC_LABEL_ERRORS_TOTAL).increment(1);
                warn!(
                    container_id = %details.id,
                    label = key,
                    error = %e,
                    "skipping invalid log label"
                );
            }
        }
    }
    configs
}

/// 로그 레이블 키이면 이름 세그먼트를 반환합니다.
///
/// `<prefix><name>`만 해당되며 `.format`/`.tags` 같은 접미 키는 제외됩니다.
pub fn log_label_name<'a>(prefix: &str, key: &'a str) -> Option<&'a str> {
    let name = key.strip_prefix(prefix)?;
    (!name.is_empty() && !name.contains('.')).then_some(name)
}

/// 로그 레이블 하나를 [`LogConfig`]로 변환합니다.
///
/// # Errors
///
/// - `SyncError::InvalidLabel`: 값이 비었거나 절대 경로가 아니거나 디렉토리 경로
/// - `SyncError::InvalidTags`: `.tags` 파싱 실패
/// - `SyncError::MountNotFound`: 경로를 덮는 마운트가 없음
pub fn parse_log_config(
    prefix: &str,
    key: &str,
    host_root: &Path,
    native_log_path: &str,
    mounts: &HashMap<String, String>,
    labels: &HashMap<String, String>,
) -> Result<LogConfig, SyncError> {
    let invalid = |reason: &str| SyncError::InvalidLabel {
        label: key.to_owned(),
        reason: reason.to_owned(),
    };

    let name = log_label_name(prefix, key).ok_or_else(|| invalid("not a log label key"))?;
    let path = labels.get(key).map(String::as_str).unwrap_or_default();
    if path.is_empty() {
        return Err(invalid("value is empty"));
    }

    let format = labels
        .get(&format!("{key}.format"))
        .filter(|f| !f.is_empty())
        .cloned()
        .unwrap_or_else(|| DEFAULT_FORMAT.to_owned());

    let tags = match labels.get(&format!("{key}.tags")) {
        Some(raw) => parse_tags(raw)?,
        None => BTreeMap::new(),
    };

    if path == STDOUT {
        let native = Path::new(native_log_path);
        let (dir, file) = split_file(native)
            .ok_or_else(|| invalid("container has no native log path"))?;
        return Ok(LogConfig {
            name: name.to_owned(),
            host_dir: under_root(host_root, dir),
            container_dir: None,
            format: STDOUT_FORMAT.to_owned(),
            file,
            tags,
        });
    }

    let container_path = Path::new(path);
    if !container_path.is_absolute() {
        return Err(invalid("path must be absolute"));
    }
    if path.ends_with('/') {
        return Err(invalid("path must be a file, not a directory"));
    }
    let (container_dir, file) =
        split_file(container_path).ok_or_else(|| invalid("path must be a file, not a directory"))?;

    let dir_str = container_dir
        .to_str()
        .ok_or_else(|| invalid("path is not valid UTF-8"))?;
    let host_source = resolve_mount(mounts, dir_str)
        .ok_or_else(|| SyncError::MountNotFound(dir_str.to_owned()))?;

    Ok(LogConfig {
        name: name.to_owned(),
        host_dir: under_root(host_root, Path::new(host_source)),
        container_dir: Some(container_dir.to_path_buf()),
        format,
        file,
        tags,
    })
}

/// 컨테이너 메타데이터에서 표시용 식별자를 만듭니다.
pub fn source_of(details: &ContainerDetails) -> Source {
    Source {
        application: details.label(LABEL_PROJECT).to_owned(),
        service: details.label(LABEL_SERVICE).to_owned(),
        container: details.name.trim_start_matches('/').to_owned(),
    }
}

fn split_file(path: &Path) -> Option<(&Path, String)> {
    let file = path.file_name()?.to_str()?.to_owned();
    let dir = path.parent()?;
    Some((dir, file))
}

// 절대 경로를 기준 디렉토리 아래로 옮김 (PathBuf::join은 절대 경로를 그대로 덮어씀)
fn under_root(host_root: &Path, path: &Path) -> PathBuf {
    let relative = path.strip_prefix("/").unwrap_or(path);
    host_root.join(relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use logpilot_core::types::MountPoint;

    const PREFIX: &str = "aliyun.logs.";

    fn details(labels: &[(&str, &str)], mounts: &[(&str, &str)]) -> ContainerDetails {
        ContainerDetails {
            id: "c0ffee".to_owned(),
            name: "/shop-web-1".to_owned(),
            labels: labels
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
            log_path: "/var/lib/x/abc-json.log".to_owned(),
            mounts: mounts
                .iter()
                .map(|(d, s)| MountPoint {
                    destination: (*d).to_owned(),
                    source: (*s).to_owned(),
                })
                .collect(),
        }
    }

    // --- parse_tags ---

    #[test]
    fn parse_tags_empty_is_empty_map() {
        assert!(parse_tags("").unwrap().is_empty());
    }

    #[test]
    fn parse_tags_pairs() {
        let tags = parse_tags("a=1,b=2").unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags["a"], "1");
        assert_eq!(tags["b"], "2");
    }

    #[test]
    fn parse_tags_trims_whitespace() {
        let tags = parse_tags(" stage = prod ,team=core").unwrap();
        assert_eq!(tags["stage"], "prod");
        assert_eq!(tags["team"], "core");
    }

    #[test]
    fn parse_tags_rejects_malformed() {
        for raw in ["bad", "a=", "=b", "a=1,", "a=b=c", " = "] {
            assert!(
                matches!(parse_tags(raw), Err(SyncError::InvalidTags { .. })),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn parse_tags_duplicate_key_last_wins() {
        let tags = parse_tags("a=1,a=2").unwrap();
        assert_eq!(tags["a"], "2");
    }

    // --- log_label_name ---

    #[test]
    fn label_name_excludes_suffixed_keys() {
        assert_eq!(log_label_name(PREFIX, "aliyun.logs.access"), Some("access"));
        assert_eq!(log_label_name(PREFIX, "aliyun.logs.access.format"), None);
        assert_eq!(log_label_name(PREFIX, "aliyun.logs.access.tags"), None);
        assert_eq!(log_label_name(PREFIX, "aliyun.logs."), None);
        assert_eq!(log_label_name(PREFIX, "other.logs.access"), None);
    }

    // --- extract_log_configs ---

    #[test]
    fn mounted_file_resolves_to_host_dir() {
        let d = details(
            &[("aliyun.logs.access", "/var/log/app/access.log")],
            &[("/var/log/app", "/data/logs/app")],
        );
        let configs = extract_log_configs(PREFIX, Path::new("/host"), &d);
        assert_eq!(configs.len(), 1);
        let c = &configs[0];
        assert_eq!(c.name, "access");
        assert_eq!(c.container_dir.as_deref(), Some(Path::new("/var/log/app")));
        assert_eq!(c.file, "access.log");
        assert_eq!(c.format, "none");
        assert_eq!(c.host_dir, PathBuf::from("/host/data/logs/app"));
        assert!(c.tags.is_empty());
    }

    #[test]
    fn stdout_uses_native_log_path() {
        let d = details(&[("aliyun.logs.console", "stdout")], &[]);
        let configs = extract_log_configs(PREFIX, Path::new("/host"), &d);
        assert_eq!(configs.len(), 1);
        let c = &configs[0];
        assert_eq!(c.format, "json");
        assert_eq!(c.file, "abc-json.log");
        assert_eq!(c.host_dir, PathBuf::from("/host/var/lib/x"));
        assert_eq!(c.container_dir, None);
    }

    #[test]
    fn stdout_ignores_format_label() {
        let d = details(
            &[
                ("aliyun.logs.console", "stdout"),
                ("aliyun.logs.console.format", "regexp"),
            ],
            &[],
        );
        let configs = extract_log_configs(PREFIX, Path::new("/host"), &d);
        assert_eq!(configs[0].format, "json");
    }

    #[test]
    fn format_and_tags_labels_apply() {
        let d = details(
            &[
                ("aliyun.logs.access", "/var/log/app/access.log"),
                ("aliyun.logs.access.format", "nginx"),
                ("aliyun.logs.access.tags", "stage=prod,team=web"),
            ],
            &[("/var/log", "/srv/log")],
        );
        let configs = extract_log_configs(PREFIX, Path::new("/host"), &d);
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].format, "nginx");
        assert_eq!(configs[0].tags["stage"], "prod");
        assert_eq!(configs[0].tags["team"], "web");
        assert_eq!(configs[0].host_dir, PathBuf::from("/host/srv/log"));
    }

    #[test]
    fn invalid_entries_are_skipped_individually() {
        let d = details(
            &[
                ("aliyun.logs.good", "/var/log/app/good.log"),
                ("aliyun.logs.relative", "var/log/app/x.log"),
                ("aliyun.logs.dironly", "/var/log/app/"),
                ("aliyun.logs.empty", ""),
                ("aliyun.logs.unmounted", "/opt/other/x.log"),
                ("aliyun.logs.badtags", "/var/log/app/bt.log"),
                ("aliyun.logs.badtags.tags", "oops"),
            ],
            &[("/var/log/app", "/data/app")],
        );
        let configs = extract_log_configs(PREFIX, Path::new("/host"), &d);
        let names: Vec<&str> = configs.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["good"]);
    }

    #[test]
    fn output_is_sorted_by_name() {
        let d = details(
            &[
                ("aliyun.logs.zeta", "stdout"),
                ("aliyun.logs.alpha", "stdout"),
                ("aliyun.logs.mid", "stdout"),
            ],
            &[],
        );
        let configs = extract_log_configs(PREFIX, Path::new("/host"), &d);
        let names: Vec<&str> = configs.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn unrelated_labels_produce_nothing() {
        let d = details(&[("maintainer", "ops"), (LABEL_PROJECT, "shop")], &[]);
        assert!(extract_log_configs(PREFIX, Path::new("/host"), &d).is_empty());
    }

    #[test]
    fn parse_log_config_reports_mount_not_found() {
        let d = details(&[("aliyun.logs.x", "/nowhere/x.log")], &[]);
        let err = parse_log_config(
            PREFIX,
            "aliyun.logs.x",
            Path::new("/host"),
            &d.log_path,
            &d.mount_table(),
            &d.labels,
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::MountNotFound(_)));
        assert!(err.is_entry_level());
    }

    #[test]
    fn stdout_without_native_log_path_is_rejected() {
        let mut d = details(&[("aliyun.logs.console", "stdout")], &[]);
        d.log_path = String::new();
        assert!(extract_log_configs(PREFIX, Path::new("/host"), &d).is_empty());
    }

    // --- source_of ---

    #[test]
    fn source_from_compose_labels() {
        let d = details(&[(LABEL_PROJECT, "shop"), (LABEL_SERVICE, "web")], &[]);
        let source = source_of(&d);
        assert_eq!(source.application, "shop");
        assert_eq!(source.service, "web");
        assert_eq!(source.container, "shop-web-1");
    }

    #[test]
    fn source_without_compose_labels_is_blank() {
        let d = details(&[], &[]);
        let source = source_of(&d);
        assert!(source.application.is_empty());
        assert!(source.service.is_empty());
    }
}
