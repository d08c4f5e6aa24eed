//! 설정 저장소: 컨테이너당 설정 파일 하나
//!
//! 경로는 `<dir>/<container_id>.conf`로 결정됩니다. 쓰기는 임시 파일에 먼저
//! 기록한 뒤 rename하므로 수집기가 반쯤 쓰인 파일을 읽지 않습니다.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::SyncError;

const CONF_EXT: &str = "conf";

/// 컨테이너별 설정 파일 저장소
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    /// 저장소 디렉토리로 생성합니다. 디렉토리는 [`ensure_dir`](Self::ensure_dir)에서 만듭니다.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// 저장소 디렉토리
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 컨테이너 ID에 대응하는 설정 파일 경로
    pub fn path_of(&self, container_id: &str) -> PathBuf {
        self.dir.join(format!("{container_id}.{CONF_EXT}"))
    }

    /// 저장소 디렉토리가 없으면 생성합니다.
    pub async fn ensure_dir(&self) -> Result<(), SyncError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| self.io_err(&self.dir, e))
    }

    /// 설정 파일 존재 여부
    pub async fn exists(&self, container_id: &str) -> Result<bool, SyncError> {
        let path = self.path_of(container_id);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| self.io_err(&path, e))
    }

    /// 설정 문서를 기록합니다. 기존 파일은 덮어씁니다.
    pub async fn write(&self, container_id: &str, document: &str) -> Result<PathBuf, SyncError> {
        let path = self.path_of(container_id);
        let tmp = self.dir.join(format!("{container_id}.{CONF_EXT}.tmp"));

        tokio::fs::write(&tmp, document)
            .await
            .map_err(|e| self.io_err(&tmp, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o644))
                .await
                .map_err(|e| self.io_err(&tmp, e))?;
        }

        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| self.io_err(&path, e))?;

        debug!(path = %path.display(), bytes = document.len(), "config written");
        Ok(path)
    }

    /// 설정 파일을 삭제합니다. 실제로 삭제했으면 `true`를 반환합니다.
    pub async fn remove(&self, container_id: &str) -> Result<bool, SyncError> {
        let path = self.path_of(container_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(self.io_err(&path, e)),
        }
    }

    /// 디렉토리의 일반 파일을 모두 삭제합니다. 하위 디렉토리는 유지합니다.
    ///
    /// 삭제한 파일 수를 반환합니다. 디렉토리가 없으면 0입니다.
    pub async fn wipe(&self) -> Result<usize, SyncError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(self.io_err(&self.dir, e)),
        };

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| self.io_err(&self.dir, e))?
        {
            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| self.io_err(&path, e))?;
            if !file_type.is_file() {
                continue;
            }
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| self.io_err(&path, e))?;
            removed += 1;
        }
        Ok(removed)
    }

    /// 설정 파일이 있는 컨테이너 ID 목록 (정렬됨)
    pub async fn container_ids(&self) -> Result<Vec<String>, SyncError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_err(&self.dir, e)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| self.io_err(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CONF_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_owned());
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    fn io_err(&self, path: &Path, source: std::io::Error) -> SyncError {
        SyncError::Store {
            path: path.display().to_string(),
            source,
        }
    }
}
