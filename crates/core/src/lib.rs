//! diagpost 공통 크레이트
//!
//! 수집 백엔드의 모든 크레이트가 공유하는 타입을 정의합니다.
//!
//! - [`config`]: `diagpost.toml` 파싱, 환경변수 오버라이드, 유효성 검증
//! - [`error`]: 최상위 에러 타입과 도메인별 하위 에러
//! - [`metrics`]: 메트릭 이름 상수 및 설명 등록

pub mod config;
pub mod error;
pub mod metrics;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, DiagpostError, StorageError};

// 설정
pub use config::{DiagpostConfig, EscalationConfig, FilterSection, GeneralConfig, StorageSection};
