//! 에러 타입 -- 도메인별 에러 정의

/// diagpost 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum DiagpostError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 수집 처리 에러 (디코딩, 필터, 전송)
    #[error("ingest error: {0}")]
    Ingest(String),

    /// 저장소 에러 (로그 파일, 스냅샷)
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 저장소 에러
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 파일 쓰기 실패
    #[error("write failed for {path}: {reason}")]
    Write { path: String, reason: String },
}
