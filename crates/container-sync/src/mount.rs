//! 마운트 해석: 컨테이너 내부 디렉토리를 호스트 경로로 변환
//!
//! 로그 파일의 바로 위 디렉토리가 아니라 상위 디렉토리만 바인드 마운트된
//! 경우를 처리하기 위해 가장 깊은 조상 마운트를 찾습니다.

use std::collections::HashMap;
use std::path::Path;

/// 컨테이너 내부 디렉토리를 덮는 가장 깊은 마운트의 호스트 경로를 반환합니다.
///
/// `dir`부터 시작해 mount 테이블(destination → source)에서 정확히 일치하는
/// 항목을 찾고, 없으면 부모 디렉토리로 올라가며 반복합니다. 루트(`/`)까지
/// 확인한 뒤에도 없으면 `None`입니다.
///
/// 결과는 테이블과 입력 경로에만 의존합니다.
///
/// # 예시
/// ```
/// use std::collections::HashMap;
/// use logpilot_container_sync::resolve_mount;
///
/// let mounts = HashMap::from([("/data".to_owned(), "/host/data".to_owned())]);
/// assert_eq!(resolve_mount(&mounts, "/data/sub/dir"), Some("/host/data"));
/// assert_eq!(resolve_mount(&HashMap::new(), "/any/path"), None);
/// ```
pub fn resolve_mount<'a>(mounts: &'a HashMap<String, String>, dir: &str) -> Option<&'a str> {
    if mounts.is_empty() {
        return None;
    }

    let mut current = Some(Path::new(dir));
    while let Some(path) = current {
        let key = path.to_str()?;
        if let Some(source) = lookup(mounts, key) {
            return Some(source);
        }
        current = path.parent();
    }
    None
}

// 런타임이 보고한 destination에 후행 '/'가 붙은 경우도 허용
fn lookup<'a>(mounts: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    mounts
        .get(key)
        .or_else(|| {
            (key != "/")
                .then(|| format!("{key}/"))
                .and_then(|slashed| mounts.get(&slashed))
        })
        .map(String::as_str)
}
