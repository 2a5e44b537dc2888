//! 필터/알림 규칙 데이터 타입
//!
//! JSON 설정 문서에서 역직렬화되는 구조체들을 정의합니다.
//!
//! # JSON 스키마
//! ```json
//! {
//!   "lastUpdated": "2024-01-01T12:00:00+08:00",
//!   "filterConfig": {
//!     "enabled": true,
//!     "invalidLogFilters": [
//!       { "id": "debug_filter", "name": "Filter debug logs", "type": "contains",
//!         "pattern": "[DEBUG]", "caseSensitive": false, "enabled": true,
//!         "description": "Drop debug level logs" }
//!     ]
//!   },
//!   "alertConfig": {
//!     "enabled": true,
//!     "webhook": "https://hooks.example.com/...",
//!     "alertRules": [
//!       { "id": "error_alert", "type": "contains", "pattern": "ERROR", "cooldown": 300 }
//!     ]
//!   }
//! }
//! ```

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::alert::WebhookTarget;

/// 알림 규칙 기본 쿨다운 (초)
pub const DEFAULT_COOLDOWN_SECS: u64 = 300;

/// 매칭 방식
///
/// 알 수 없는 문자열은 [`MatchType::Unsupported`]로 역직렬화되며 절대 매칭되지 않습니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    /// 부분 문자열 포함 (기본값)
    #[default]
    Contains,
    /// 접두어 일치
    StartsWith,
    /// 접미어 일치
    EndsWith,
    /// 정규식
    Regex,
    /// 지원하지 않는 방식
    #[serde(other)]
    Unsupported,
}

/// 필터 규칙. 매칭되면 해당 로그를 버립니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterRule {
    /// 규칙 고유 ID (같은 종류 안에서 유일)
    pub id: String,
    /// 표시 이름
    pub name: String,
    /// 매칭 방식
    #[serde(rename = "type")]
    pub match_type: MatchType,
    /// 패턴 또는 정규식
    pub pattern: String,
    /// 대소문자 구분 여부
    pub case_sensitive: bool,
    /// 활성화 여부
    pub enabled: bool,
    /// 설명
    pub description: String,
}

impl Default for FilterRule {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            match_type: MatchType::Contains,
            pattern: String::new(),
            case_sensitive: false,
            enabled: true,
            description: String::new(),
        }
    }
}

impl FilterRule {
    /// 새 규칙을 만듭니다. 대소문자 무시, 활성 상태입니다.
    pub fn new(id: impl Into<String>, match_type: MatchType, pattern: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            match_type,
            pattern: pattern.into(),
            ..Default::default()
        }
    }

    /// 이름을 지정합니다.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 설명을 지정합니다.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// 대소문자 구분 여부를 지정합니다.
    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// 활성화 여부를 지정합니다.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// 알림 규칙. 필터 규칙과 같은 매칭 필드에 쿨다운을 더합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRule {
    /// 매칭 필드
    #[serde(flatten)]
    pub rule: FilterRule,
    /// 같은 규칙의 재알림 최소 간격 (초)
    #[serde(rename = "cooldown", default = "default_cooldown")]
    pub cooldown_seconds: u64,
}

impl AlertRule {
    /// 매칭 규칙과 쿨다운으로 알림 규칙을 만듭니다.
    pub fn new(rule: FilterRule, cooldown_seconds: u64) -> Self {
        Self {
            rule,
            cooldown_seconds,
        }
    }
}

fn default_cooldown() -> u64 {
    DEFAULT_COOLDOWN_SECS
}

/// 필터 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// 필터링 활성화 여부
    pub enabled: bool,
    /// 순서가 곧 우선순위인 필터 규칙 목록
    #[serde(rename = "invalidLogFilters")]
    pub rules: Vec<FilterRule>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rules: Vec::new(),
        }
    }
}

/// 알림 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// 알림 활성화 여부
    pub enabled: bool,
    /// 알림 웹훅 대상
    #[serde(rename = "webhook", alias = "feishuWebhook")]
    pub webhook: String,
    /// 웹훅 서명 키 (비어 있으면 서명 안 함)
    #[serde(skip_serializing_if = "String::is_empty")]
    pub secret: String,
    /// 알림 규칙 목록
    #[serde(rename = "alertRules")]
    pub rules: Vec<AlertRule>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            webhook: String::new(),
            secret: String::new(),
            rules: Vec::new(),
        }
    }
}

impl AlertConfig {
    /// 서명 키를 포함한 알림 웹훅 대상
    pub fn target(&self) -> WebhookTarget {
        WebhookTarget::new(&self.webhook).with_secret(&self.secret)
    }
}

/// 필터 설정 문서 (JSON 파일 루트)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterDocument {
    /// 마지막 수정 시각
    #[serde(deserialize_with = "lenient_timestamp")]
    pub last_updated: DateTime<Utc>,
    /// 필터 설정
    pub filter_config: FilterConfig,
    /// 알림 설정
    pub alert_config: AlertConfig,
}

impl Default for FilterDocument {
    fn default() -> Self {
        Self {
            last_updated: Utc::now(),
            filter_config: FilterConfig::default(),
            alert_config: AlertConfig::default(),
        }
    }
}

impl FilterDocument {
    /// 설정 파일이 없을 때 쓰는 기본 문서
    pub fn builtin() -> Self {
        Self {
            last_updated: Utc::now(),
            filter_config: FilterConfig {
                enabled: true,
                rules: vec![
                    FilterRule::new("debug_filter", MatchType::Contains, "[DEBUG]")
                        .with_name("Filter debug logs")
                        .with_description("Drop debug level logs"),
                    FilterRule::new("heartbeat_filter", MatchType::Regex, "^heartbeat.*alive$")
                        .with_name("Filter heartbeat logs")
                        .with_description("Drop heartbeat logs")
                        .enabled(false),
                ],
            },
            alert_config: AlertConfig {
                enabled: true,
                webhook: String::new(),
                secret: String::new(),
                rules: vec![
                    AlertRule::new(
                        FilterRule::new("error_alert", MatchType::Contains, "ERROR")
                            .with_name("Error log alert")
                            .with_description("Notify when an error log arrives"),
                        300,
                    ),
                    AlertRule::new(
                        FilterRule::new("crash_alert", MatchType::Regex, "(crash|exception|fatal)")
                            .with_name("Crash log alert")
                            .with_description("Notify when a crash related log arrives")
                            .enabled(false),
                        60,
                    ),
                ],
            },
        }
    }

    /// 활성화된 필터 규칙과 알림 규칙 수
    pub fn enabled_rule_count(&self) -> usize {
        let filters = self.filter_config.rules.iter().filter(|r| r.enabled).count();
        let alerts = self
            .alert_config
            .rules
            .iter()
            .filter(|r| r.rule.enabled)
            .count();
        filters + alerts
    }
}

/// RFC 3339 또는 오프셋 없는 ISO 시각(UTC로 간주)을 받고, 해석할 수 없으면 현재 시각을 씁니다.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    let parsed = raw.as_deref().and_then(|s| {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            })
    });
    Ok(parsed.unwrap_or_else(Utc::now))
}
