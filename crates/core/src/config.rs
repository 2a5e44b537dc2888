//! 설정 관리 -- diagpost.toml 파싱 및 런타임 설정
//!
//! [`DiagpostConfig`]는 프로세스 전체 설정을 담는 최상위 구조체입니다.
//! 필터/알림 규칙 자체는 이 파일이 아니라 별도의 JSON 문서에 있으며,
//! 여기서는 그 문서의 경로와 리로드 정책만 지정합니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`DIAGPOST_STORAGE_ROOT_DIR=/data` 형식)
//! 3. 설정 파일 (`diagpost.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), diagpost_core::error::DiagpostError> {
//! use diagpost_core::config::DiagpostConfig;
//!
//! let config = DiagpostConfig::load("diagpost.toml").await?;
//! let config = DiagpostConfig::parse("[storage]\nroot_dir = \"/tmp/diag\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, DiagpostError};

/// 로그 파일 기본 최대 크기 (500MB)
pub const DEFAULT_MAX_LOG_FILE_BYTES: u64 = 500 * 1024 * 1024;

/// diagpost 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagpostConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 저장소 설정
    #[serde(default)]
    pub storage: StorageSection,
    /// 필터 설정 문서 위치 및 리로드 정책
    #[serde(default)]
    pub filter: FilterSection,
    /// 스냅샷 에스컬레이션 웹훅 설정
    #[serde(default)]
    pub escalation: EscalationConfig,
}

impl DiagpostConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DiagpostError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, DiagpostError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DiagpostError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                DiagpostError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, DiagpostError> {
        toml::from_str(toml_str).map_err(|e| {
            DiagpostError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `DIAGPOST_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "DIAGPOST_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "DIAGPOST_GENERAL_LOG_FORMAT");

        // Storage
        override_string(&mut self.storage.root_dir, "DIAGPOST_STORAGE_ROOT_DIR");
        override_string(
            &mut self.storage.log_category,
            "DIAGPOST_STORAGE_LOG_CATEGORY",
        );
        override_u64(
            &mut self.storage.max_log_file_bytes,
            "DIAGPOST_STORAGE_MAX_LOG_FILE_BYTES",
        );
        override_i32(
            &mut self.storage.utc_offset_hours,
            "DIAGPOST_STORAGE_UTC_OFFSET_HOURS",
        );

        // Filter
        override_string(&mut self.filter.config_path, "DIAGPOST_FILTER_CONFIG_PATH");
        override_bool(&mut self.filter.watch, "DIAGPOST_FILTER_WATCH");
        override_u64(
            &mut self.filter.reload_delay_ms,
            "DIAGPOST_FILTER_RELOAD_DELAY_MS",
        );

        // Escalation
        override_string(
            &mut self.escalation.online_webhook,
            "DIAGPOST_ESCALATION_ONLINE_WEBHOOK",
        );
        override_string(
            &mut self.escalation.dev_webhook,
            "DIAGPOST_ESCALATION_DEV_WEBHOOK",
        );
        override_string(&mut self.escalation.secret, "DIAGPOST_ESCALATION_SECRET");
        override_u64(
            &mut self.escalation.timeout_secs,
            "DIAGPOST_ESCALATION_TIMEOUT_SECS",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), DiagpostError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.storage.root_dir.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "storage.root_dir".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        if self.storage.log_category.is_empty()
            || self.storage.log_category.contains(['/', '\\'])
            || self.storage.log_category == ".."
        {
            return Err(ConfigError::InvalidValue {
                field: "storage.log_category".to_owned(),
                reason: "must be a single non-empty path segment".to_owned(),
            }
            .into());
        }

        if self.storage.max_log_file_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "storage.max_log_file_bytes".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if !(-12..=14).contains(&self.storage.utc_offset_hours) {
            return Err(ConfigError::InvalidValue {
                field: "storage.utc_offset_hours".to_owned(),
                reason: "must be within -12..=14".to_owned(),
            }
            .into());
        }

        if self.escalation.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "escalation.timeout_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        Ok(())
    }

    /// 필터 설정 JSON 문서의 실제 경로를 반환합니다.
    ///
    /// `filter.config_path`가 비어 있으면 `<root_dir>/config/log_filter_config.json`.
    pub fn filter_config_path(&self) -> PathBuf {
        if self.filter.config_path.is_empty() {
            Path::new(&self.storage.root_dir)
                .join("config")
                .join("log_filter_config.json")
        } else {
            PathBuf::from(&self.filter.config_path)
        }
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 저장소 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// 데이터 루트 디렉토리 (`logs/`, `snapshoot/`, `config/`의 부모)
    pub root_dir: String,
    /// 업로드 로그의 카테고리 (`<root>/logs/<category>/`)
    pub log_category: String,
    /// 로그 파일 하나의 최대 크기 (바이트)
    pub max_log_file_bytes: u64,
    /// 로그 레코드 타임스탬프와 일자 파일명에 쓰는 UTC 오프셋 (시간)
    pub utc_offset_hours: i32,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            root_dir: "/share_data".to_owned(),
            log_category: "log".to_owned(),
            max_log_file_bytes: DEFAULT_MAX_LOG_FILE_BYTES,
            utc_offset_hours: 8,
        }
    }
}

/// 필터 설정 문서 위치 및 리로드 정책
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSection {
    /// 필터/알림 규칙 JSON 경로 (비어 있으면 루트 기준 기본 경로)
    pub config_path: String,
    /// 파일 변경 감시로 자동 리로드할지 여부
    pub watch: bool,
    /// 변경 감지 후 리로드까지 지연 (밀리초)
    pub reload_delay_ms: u64,
}

impl Default for FilterSection {
    fn default() -> Self {
        Self {
            config_path: String::new(),
            watch: true,
            reload_delay_ms: 1000,
        }
    }
}

/// 스냅샷 에스컬레이션 웹훅 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// 운영 클라이언트용 웹훅
    pub online_webhook: String,
    /// 개발 클라이언트(`isOnline:false`)용 웹훅
    pub dev_webhook: String,
    /// 웹훅 서명 키. 비어 있으면 서명하지 않음
    pub secret: String,
    /// HTTP 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 멘션 이름 -> 사용자 ID (이름은 소문자로 비교)
    pub mentions: BTreeMap<String, String>,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            online_webhook: String::new(),
            dev_webhook: String::new(),
            secret: String::new(),
            timeout_secs: 10,
            mentions: BTreeMap::new(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_i32(target: &mut i32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<i32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse i32 from env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = DiagpostConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.storage.root_dir, "/share_data");
        assert_eq!(config.storage.max_log_file_bytes, 500 * 1024 * 1024);
        assert_eq!(config.storage.utc_offset_hours, 8);
        assert!(config.filter.watch);
        assert_eq!(config.filter.reload_delay_ms, 1000);
    }

    #[test]
    fn default_config_passes_validation() {
        DiagpostConfig::default().validate().unwrap();
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config = DiagpostConfig::parse("").unwrap();
        assert_eq!(config.storage.log_category, "log");
    }

    #[test]
    fn partial_toml_merges_with_defaults() {
        let toml = r#"
[storage]
root_dir = "/data/diag"
max_log_file_bytes = 1024

[escalation.mentions]
alice = "ou_123"
"#;
        let config = DiagpostConfig::parse(toml).unwrap();
        assert_eq!(config.storage.root_dir, "/data/diag");
        assert_eq!(config.storage.max_log_file_bytes, 1024);
        // 나머지는 기본값 유지
        assert_eq!(config.storage.utc_offset_hours, 8);
        assert_eq!(config.escalation.mentions.get("alice").unwrap(), "ou_123");
    }

    #[test]
    fn invalid_toml_returns_parse_error() {
        let err = DiagpostConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            DiagpostError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_zero_max_file_size() {
        let mut config = DiagpostConfig::default();
        config.storage.max_log_file_bytes = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_log_file_bytes"));
    }

    #[test]
    fn validate_rejects_category_with_separator() {
        let mut config = DiagpostConfig::default();
        config.storage.log_category = "../etc".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_category"));
    }

    #[test]
    fn validate_rejects_out_of_range_offset() {
        let mut config = DiagpostConfig::default();
        config.storage.utc_offset_hours = 20;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let mut config = DiagpostConfig::default();
        config.general.log_format = "xml".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_format"));
    }

    #[test]
    fn filter_config_path_defaults_under_root() {
        let mut config = DiagpostConfig::default();
        config.storage.root_dir = "/srv/diag".to_owned();
        assert_eq!(
            config.filter_config_path(),
            PathBuf::from("/srv/diag/config/log_filter_config.json")
        );

        config.filter.config_path = "/etc/diagpost/filters.json".to_owned();
        assert_eq!(
            config.filter_config_path(),
            PathBuf::from("/etc/diagpost/filters.json")
        );
    }

    #[test]
    #[serial]
    fn env_override_applies() {
        // SAFETY: serial_test로 직렬화되어 다른 테스트와 환경변수를 공유하지 않습니다.
        unsafe { std::env::set_var("DIAGPOST_STORAGE_ROOT_DIR", "/env/root") };
        unsafe { std::env::set_var("DIAGPOST_FILTER_WATCH", "false") };
        let mut config = DiagpostConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.storage.root_dir, "/env/root");
        assert!(!config.filter.watch);
        unsafe { std::env::remove_var("DIAGPOST_STORAGE_ROOT_DIR") };
        unsafe { std::env::remove_var("DIAGPOST_FILTER_WATCH") };
    }

    #[test]
    #[serial]
    fn env_override_sets_escalation_secret() {
        // SAFETY: serial_test로 직렬화되어 다른 테스트와 환경변수를 공유하지 않습니다.
        unsafe { std::env::set_var("DIAGPOST_ESCALATION_SECRET", "from-env") };
        let mut config = DiagpostConfig::default();
        assert!(config.escalation.secret.is_empty());
        config.apply_env_overrides();
        assert_eq!(config.escalation.secret, "from-env");
        unsafe { std::env::remove_var("DIAGPOST_ESCALATION_SECRET") };
    }

    #[test]
    #[serial]
    fn env_override_invalid_number_keeps_original() {
        // SAFETY: serial_test로 직렬화되어 다른 테스트와 환경변수를 공유하지 않습니다.
        unsafe { std::env::set_var("DIAGPOST_STORAGE_MAX_LOG_FILE_BYTES", "lots") };
        let mut config = DiagpostConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.storage.max_log_file_bytes, DEFAULT_MAX_LOG_FILE_BYTES);
        unsafe { std::env::remove_var("DIAGPOST_STORAGE_MAX_LOG_FILE_BYTES") };
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = DiagpostConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = DiagpostConfig::parse(&toml_str).unwrap();
        assert_eq!(config.storage.root_dir, parsed.storage.root_dir);
        assert_eq!(config.filter.reload_delay_ms, parsed.filter.reload_delay_ms);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = DiagpostConfig::from_file("/nonexistent/path/diagpost.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DiagpostError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
