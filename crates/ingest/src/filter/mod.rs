//! 로그 필터링 -- 규칙 문서, 매칭, 핫 리로드
//!
//! - [`types`]: 필터/알림 규칙과 설정 문서 (JSON 와이어 형식)
//! - [`matcher`]: 매칭 방식별 평가와 정규식 캐시
//! - [`loader`]: 설정 파일 읽기/쓰기, 지문 계산, 검증
//! - [`engine`]: 보존/폐기 판정, 알림 매칭, 리로드, 통계
//! - [`watcher`]: 설정 파일 변경 감시

pub mod engine;
pub mod loader;
pub mod matcher;
pub mod types;
pub mod watcher;

pub use engine::{ActiveRules, FilterEngine, FilterStatistics, ReloadOutcome};
pub use loader::{FilterConfigLoader, RawDocument};
pub use matcher::{RuleKind, RuleMatcher};
pub use types::{AlertConfig, AlertRule, FilterConfig, FilterDocument, FilterRule, MatchType};
pub use watcher::ConfigWatcher;
