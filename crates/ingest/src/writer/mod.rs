//! 영속 로그 기록
//!
//! - [`rotating`]: 크기 기반 회전 파일 세트
//! - [`durable`]: 큐 + 전용 워커 스레드 기반 비동기 기록기
//! - [`daily`]: 날짜별 파일(`log_yyyyMMdd.txt`)로 기록기를 교체하는 래퍼

pub mod daily;
pub mod durable;
pub mod rotating;

pub use daily::DailyLogWriter;
pub use durable::{DurableLogWriter, format_record};
pub use rotating::RotatingFile;

use std::fmt;

/// 레코드 레벨
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// 일반 로그
    Log,
    /// 경고
    Warning,
    /// 에러
    Error,
    /// 예외
    Exception,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Log => "Log",
            Self::Warning => "Warning",
            Self::Error => "Error",
            Self::Exception => "Exception",
        };
        f.write_str(name)
    }
}
