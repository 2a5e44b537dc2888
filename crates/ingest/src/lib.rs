//! diagpost 수집 엔진
//!
//! 원격 클라이언트가 올린 진단 로그와 스냅샷을 처리합니다.
//! 로그는 디코딩 후 필터 규칙으로 보존 여부를 판정하고, 알림 규칙에 매칭되면
//! 쿨다운을 거쳐 웹훅으로 알리며, 보존된 로그는 크기 회전 파일에 비동기로 기록합니다.
//! 스냅샷은 파일 종류별로 디코딩하여 저장하고, 다중 파일 번들은 추출 후 zip으로 묶습니다.
//!
//! # 모듈 구성
//!
//! - [`decode`]: gzip/base64 업로드 디코딩
//! - [`filter`]: 필터/알림 규칙, 매칭, 핫 리로드, 통계
//! - [`alert`]: 쿨다운 게이트, 웹훅 전송, 스냅샷 에스컬레이션
//! - [`writer`]: 큐 기반 회전 로그 기록기
//! - [`snapshot`]: 스냅샷 봉투, 번들 코덱, 저장소
//! - [`service`]: 위 구성요소를 묶은 진입점
//! - [`config`]: 수집 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! upload -> decode -> FilterEngine.process -+-> drop
//!                                           +-> AlertDispatcher (fire-and-forget)
//!                                           +-> DailyLogWriter -> DurableLogWriter -> RotatingFile
//!
//! envelope -> SnapshotStore -+-> image / text file (+ escalation)
//!                            +-> bundle decode -> extract -> zip
//! ```

pub mod alert;
pub mod config;
pub mod decode;
pub mod error;
pub mod filter;
pub mod service;
pub mod snapshot;
pub mod writer;

// --- 주요 타입 re-export ---

// 서비스
pub use service::{IngestService, IngestServiceBuilder, LogDisposition};

// 설정
pub use config::{IngestConfig, IngestConfigBuilder};

// 에러
pub use error::IngestError;

// 필터
pub use filter::{FilterDocument, FilterEngine, FilterStatistics, ReloadOutcome};

// 알림
pub use alert::{AlertDispatcher, AlertTransport, WebhookTarget, WebhookTransport};

// 기록기
pub use writer::{DailyLogWriter, DurableLogWriter, LogLevel};

// 스냅샷
pub use snapshot::{SnapshotEnvelope, SnapshotFileType, SnapshotStore};
