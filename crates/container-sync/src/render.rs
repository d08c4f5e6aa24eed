//! 설정 렌더러: 컨테이너별 로그 수집 설정 문서 생성
//!
//! 렌더러는 교체 가능한 협력자입니다. Reconciler는 [`ConfigRenderer`] trait만
//! 알고 있으며, 기본 구현 [`FluentdRenderer`]는 fluentd `tail` 입력을 생성합니다.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use logpilot_core::types::{LogConfig, Source};

use crate::error::SyncError;

/// 렌더링 입력
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    /// 대상 컨테이너 ID
    pub container_id: &'a str,
    /// 표시용 식별자
    pub source: &'a Source,
    /// 로그 수집 규칙 (name 순)
    pub configs: &'a [LogConfig],
}

/// 설정 문서 렌더러
pub trait ConfigRenderer: Send + Sync + 'static {
    /// 렌더링 입력으로 설정 문서를 생성합니다.
    ///
    /// # Errors
    ///
    /// `SyncError::Render`: 입력으로 문서를 만들 수 없음
    fn render(&self, ctx: &RenderContext<'_>) -> Result<String, SyncError>;
}

/// fluentd `tail` 입력 렌더러
#[derive(Debug, Clone)]
pub struct FluentdRenderer {
    pos_file: PathBuf,
}

impl FluentdRenderer {
    /// 모든 tail 입력이 공유할 pos 파일 경로로 렌더러를 생성합니다.
    pub fn new(pos_file: impl Into<PathBuf>) -> Self {
        Self {
            pos_file: pos_file.into(),
        }
    }

    /// pos 파일 경로
    pub fn pos_file(&self) -> &Path {
        &self.pos_file
    }

    fn write_stream(
        &self,
        out: &mut String,
        ctx: &RenderContext<'_>,
        config: &LogConfig,
    ) -> std::fmt::Result {
        let tag = format!("docker.{}.{}", ctx.container_id, config.name);

        writeln!(out, "<source>")?;
        writeln!(out, "  @type tail")?;
        writeln!(out, "  tag {tag}")?;
        writeln!(out, "  path {}", config.host_path().display())?;
        writeln!(out, "  format {}", config.format)?;
        writeln!(out, "  pos_file {}", self.pos_file.display())?;
        writeln!(out, "  refresh_interval 5")?;
        writeln!(out, "</source>")?;
        writeln!(out)?;

        writeln!(out, "<filter {tag}>")?;
        writeln!(out, "  @type record_transformer")?;
        writeln!(out, "  <record>")?;
        writeln!(out, "    host \"#{{Socket.gethostname}}\"")?;
        for (key, value) in &config.tags {
            writeln!(out, "    {key} {value}")?;
        }
        for (key, value) in [
            ("docker_app", &ctx.source.application),
            ("docker_service", &ctx.source.service),
            ("docker_container", &ctx.source.container),
        ] {
            if !value.is_empty() {
                writeln!(out, "    {key} {value}")?;
            }
        }
        writeln!(out, "  </record>")?;
        writeln!(out, "</filter>")?;
        writeln!(out)
    }
}

impl ConfigRenderer for FluentdRenderer {
    fn render(&self, ctx: &RenderContext<'_>) -> Result<String, SyncError> {
        let fail = |reason: String| SyncError::Render {
            container_id: ctx.container_id.to_owned(),
            reason,
        };

        if ctx.container_id.is_empty() {
            return Err(fail("container id is empty".to_owned()));
        }
        if ctx.configs.is_empty() {
            return Err(fail("no log configs to render".to_owned()));
        }

        let mut out = String::new();
        for config in ctx.configs {
            self.write_stream(&mut out, ctx, config)
                .map_err(|e| fail(e.to_string()))?;
        }
        Ok(out)
    }
}
