//! 수집 크레이트 에러 타입
//!
//! [`IngestError`]는 디코딩, 필터 설정, 영속화, 알림 전송 등 수집 경로에서
//! 발생하는 모든 에러를 표현합니다.
//! `From<IngestError> for DiagpostError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use diagpost_core::error::{ConfigError, DiagpostError, StorageError};

/// 수집 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// 전송 인코딩 또는 번들 스트림이 잘못됨
    #[error("decode error: {reason}")]
    Decode {
        /// 실패 사유
        reason: String,
    },

    /// 필터 설정 문서 또는 크레이트 설정 오류
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명 또는 문서 경로
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 로그/스냅샷 파일 기록 실패
    #[error("persistence error: {path}: {reason}")]
    Persistence {
        /// 대상 파일 경로
        path: String,
        /// 에러 사유
        reason: String,
    },

    /// 알림 전송 실패
    #[error("transport error: {reason}")]
    Transport {
        /// 에러 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl IngestError {
    /// `Decode` 에러를 생성합니다.
    pub(crate) fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    /// `Persistence` 에러를 생성합니다.
    pub(crate) fn persistence(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        Self::Persistence {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<IngestError> for DiagpostError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Config { field, reason } => {
                DiagpostError::Config(ConfigError::InvalidValue { field, reason })
            }
            IngestError::Persistence { path, reason } => {
                DiagpostError::Storage(StorageError::Write { path, reason })
            }
            IngestError::Io(e) => DiagpostError::Io(e),
            other => DiagpostError::Ingest(other.to_string()),
        }
    }
}
