//! 도메인 타입: 컨테이너 메타데이터와 로그 수집 규칙
//!
//! 컨테이너 런타임에서 조회한 정보([`ContainerDetails`])와
//! 레이블에서 추출한 로그 수집 규칙([`LogConfig`])을 정의합니다.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// 렌더링에 포함되는 표시용 식별자
///
/// 조회 키로는 사용하지 않습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// compose 프로젝트명
    pub application: String,
    /// compose 서비스명
    pub service: String,
    /// 컨테이너 이름 (앞의 `/` 제거)
    pub container: String,
}

/// 컨테이너 하나의 로그 스트림 하나에 대한 수집 규칙
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// 레이블 키에서 prefix를 제외한 이름
    pub name: String,
    /// 호스트 기준 로그 디렉토리 (항상 절대 경로)
    pub host_dir: PathBuf,
    /// 컨테이너 내부 로그 디렉토리 (stdout 스트림은 None)
    pub container_dir: Option<PathBuf>,
    /// 로그 형식 (기본값 `none`)
    pub format: String,
    /// 로그 파일명
    pub file: String,
    /// 스트림에 첨부되는 메타데이터
    pub tags: BTreeMap<String, String>,
}

impl LogConfig {
    /// 호스트 기준 로그 파일 전체 경로를 반환합니다.
    pub fn host_path(&self) -> PathBuf {
        self.host_dir.join(&self.file)
    }
}

impl fmt::Display for LogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} (format={})",
            self.name,
            self.host_path().display(),
            self.format
        )
    }
}

/// 런타임이 보고한 바인드 마운트
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountPoint {
    /// 컨테이너 내부 경로
    pub destination: String,
    /// 호스트 경로
    pub source: String,
}

/// 컨테이너 목록 조회 결과 항목
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSummary {
    /// 컨테이너 ID
    pub id: String,
    /// 컨테이너 이름
    pub name: String,
    /// 상태 (running, exited 등)
    pub state: String,
}

/// 컨테이너 상세 정보
///
/// 재스캔이나 이벤트마다 런타임에서 새로 조회하며 캐시하지 않습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDetails {
    /// 컨테이너 ID
    pub id: String,
    /// 컨테이너 이름 (앞의 `/` 제거)
    pub name: String,
    /// 레이블
    pub labels: HashMap<String, String>,
    /// 런타임이 관리하는 stdout 로그 파일 경로
    pub log_path: String,
    /// 마운트 목록
    pub mounts: Vec<MountPoint>,
}

impl ContainerDetails {
    /// 마운트 목록을 destination → source 매핑으로 변환합니다.
    pub fn mount_table(&self) -> HashMap<String, String> {
        self.mounts
            .iter()
            .map(|m| (m.destination.clone(), m.source.clone()))
            .collect()
    }

    /// 레이블 값을 조회합니다. 없으면 빈 문자열을 반환합니다.
    pub fn label(&self, key: &str) -> &str {
        self.labels.get(key).map(String::as_str).unwrap_or_default()
    }
}

/// 컨테이너 ID 앞 12글자 (로그 표시용)
///
/// 런타임이 준 ID를 검증 없이 받으므로 문자 경계에서 자릅니다.
pub fn short_id(id: &str) -> &str {
    id.char_indices().nth(12).map_or(id, |(end, _)| &id[..end])
}

impl fmt::Display for ContainerDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) labels={} mounts={}",
            self.name,
            short_id(&self.id),
            self.labels.len(),
            self.mounts.len(),
        )
    }
}
