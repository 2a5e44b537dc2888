//! 수집 서비스 설정
//!
//! [`IngestConfig`]는 core의 [`DiagpostConfig`]를 기반으로
//! 수집 서비스 전용 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use diagpost_core::config::DiagpostConfig;
//! use diagpost_ingest::config::IngestConfig;
//!
//! let core_config = DiagpostConfig::default();
//! let config = IngestConfig::from_core(&core_config);
//! ```

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use chrono::FixedOffset;
use diagpost_core::config::DiagpostConfig;

use crate::decode::DEFAULT_MAX_DECOMPRESSED_BYTES;
use crate::error::IngestError;

/// 수집 서비스 설정
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// 데이터 루트 디렉토리
    pub root_dir: PathBuf,
    /// 업로드 로그 카테고리
    pub log_category: String,
    /// 로그 파일 하나의 최대 크기 (바이트)
    pub max_log_file_bytes: u64,
    /// 타임스탬프 UTC 오프셋 (시간)
    pub utc_offset_hours: i32,
    /// 필터 설정 JSON 경로
    pub filter_config_path: PathBuf,
    /// 필터 설정 파일 감시 여부
    pub watch_filter_config: bool,
    /// 변경 감지 후 리로드 지연 (밀리초)
    pub reload_delay_ms: u64,
    /// 운영 에스컬레이션 웹훅
    pub online_webhook: String,
    /// 개발 에스컬레이션 웹훅
    pub dev_webhook: String,
    /// 에스컬레이션 웹훅 서명 키 (비어 있으면 서명 안 함)
    pub escalation_secret: String,
    /// 웹훅 요청 타임아웃 (초)
    pub webhook_timeout_secs: u64,
    /// 멘션 이름(소문자) -> 사용자 ID
    pub mentions: BTreeMap<String, String>,

    // --- 확장 설정 (core에 없는 추가 필드) ---
    /// 압축 해제 결과 최대 크기 (바이트)
    pub max_decompressed_bytes: u64,
    /// 종료 시 진행 중인 알림 전송을 기다리는 최대 시간 (밀리초)
    pub alert_drain_timeout_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self::from_core(&DiagpostConfig::default())
    }
}

impl IngestConfig {
    /// core 설정에서 수집 서비스 설정을 생성합니다.
    ///
    /// core 설정에 없는 확장 필드는 기본값이 적용됩니다.
    pub fn from_core(core: &DiagpostConfig) -> Self {
        Self {
            root_dir: PathBuf::from(&core.storage.root_dir),
            log_category: core.storage.log_category.clone(),
            max_log_file_bytes: core.storage.max_log_file_bytes,
            utc_offset_hours: core.storage.utc_offset_hours,
            filter_config_path: core.filter_config_path(),
            watch_filter_config: core.filter.watch,
            reload_delay_ms: core.filter.reload_delay_ms,
            online_webhook: core.escalation.online_webhook.clone(),
            dev_webhook: core.escalation.dev_webhook.clone(),
            escalation_secret: core.escalation.secret.clone(),
            webhook_timeout_secs: core.escalation.timeout_secs,
            mentions: core
                .escalation
                .mentions
                .iter()
                .map(|(name, id)| (name.to_lowercase(), id.clone()))
                .collect(),
            max_decompressed_bytes: DEFAULT_MAX_DECOMPRESSED_BYTES,
            alert_drain_timeout_ms: 5_000,
        }
    }

    /// 업로드 로그 디렉토리: `<root>/logs/<category>`
    pub fn log_dir(&self) -> PathBuf {
        self.root_dir.join("logs").join(&self.log_category)
    }

    /// 스냅샷 루트 디렉토리: `<root>/snapshoot`
    pub fn snapshot_dir(&self) -> PathBuf {
        self.root_dir.join("snapshoot")
    }

    /// 설정된 UTC 오프셋을 반환합니다.
    pub fn utc_offset(&self) -> Result<FixedOffset, IngestError> {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).ok_or_else(|| IngestError::Config {
            field: "utc_offset_hours".to_owned(),
            reason: format!("offset {} is out of range", self.utc_offset_hours),
        })
    }

    /// 로그 카테고리가 단일 경로 세그먼트인지 검증합니다.
    fn validate_category(category: &str) -> Result<(), IngestError> {
        let mut components = Path::new(category).components();
        let single_normal = matches!(components.next(), Some(Component::Normal(_)))
            && components.next().is_none();

        if category.is_empty() || !single_normal || category.contains('\\') {
            return Err(IngestError::Config {
                field: "log_category".to_owned(),
                reason: format!("'{category}' must be a single path segment"),
            });
        }
        Ok(())
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), IngestError> {
        const MAX_RELOAD_DELAY_MS: u64 = 60_000;

        if self.root_dir.as_os_str().is_empty() {
            return Err(IngestError::Config {
                field: "root_dir".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        Self::validate_category(&self.log_category)?;

        if self.max_log_file_bytes == 0 {
            return Err(IngestError::Config {
                field: "max_log_file_bytes".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        self.utc_offset()?;

        if self.reload_delay_ms > MAX_RELOAD_DELAY_MS {
            return Err(IngestError::Config {
                field: "reload_delay_ms".to_owned(),
                reason: format!("must be at most {MAX_RELOAD_DELAY_MS}"),
            });
        }

        if self.webhook_timeout_secs == 0 {
            return Err(IngestError::Config {
                field: "webhook_timeout_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.max_decompressed_bytes == 0 {
            return Err(IngestError::Config {
                field: "max_decompressed_bytes".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        Ok(())
    }
}

/// 수집 서비스 설정 빌더
#[derive(Default)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 데이터 루트 디렉토리를 설정합니다.
    ///
    /// 필터 설정 경로도 새 루트 기준 기본 경로로 바뀝니다.
    pub fn root_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.root_dir = dir.into();
        self.config.filter_config_path = self
            .config
            .root_dir
            .join("config")
            .join("log_filter_config.json");
        self
    }

    /// 로그 카테고리를 설정합니다.
    pub fn log_category(mut self, category: impl Into<String>) -> Self {
        self.config.log_category = category.into();
        self
    }

    /// 로그 파일 최대 크기를 설정합니다.
    pub fn max_log_file_bytes(mut self, bytes: u64) -> Self {
        self.config.max_log_file_bytes = bytes;
        self
    }

    /// UTC 오프셋을 설정합니다.
    pub fn utc_offset_hours(mut self, hours: i32) -> Self {
        self.config.utc_offset_hours = hours;
        self
    }

    /// 필터 설정 JSON 경로를 설정합니다.
    pub fn filter_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.filter_config_path = path.into();
        self
    }

    /// 필터 설정 파일 감시 여부를 설정합니다.
    pub fn watch_filter_config(mut self, watch: bool) -> Self {
        self.config.watch_filter_config = watch;
        self
    }

    /// 리로드 지연(밀리초)을 설정합니다.
    pub fn reload_delay_ms(mut self, ms: u64) -> Self {
        self.config.reload_delay_ms = ms;
        self
    }

    /// 에스컬레이션 웹훅을 설정합니다.
    pub fn webhooks(mut self, online: impl Into<String>, dev: impl Into<String>) -> Self {
        self.config.online_webhook = online.into();
        self.config.dev_webhook = dev.into();
        self
    }

    /// 에스컬레이션 웹훅 서명 키를 설정합니다.
    pub fn escalation_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.escalation_secret = secret.into();
        self
    }

    /// 멘션 매핑을 추가합니다.
    pub fn mention(mut self, name: &str, user_id: impl Into<String>) -> Self {
        self.config
            .mentions
            .insert(name.to_lowercase(), user_id.into());
        self
    }

    /// 압축 해제 최대 크기를 설정합니다.
    pub fn max_decompressed_bytes(mut self, bytes: u64) -> Self {
        self.config.max_decompressed_bytes = bytes;
        self
    }

    /// 설정을 검증하고 `IngestConfig`를 생성합니다.
    pub fn build(self) -> Result<IngestConfig, IngestError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
