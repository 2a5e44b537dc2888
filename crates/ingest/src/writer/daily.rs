//! 날짜별 로그 기록기
//!
//! 설정된 오프셋 기준 날짜가 바뀌면 새 [`DurableLogWriter`]를 만들고
//! 이전 기록기를 은퇴시킵니다. 이전 기록기의 큐 입력은 교체 직후 막히고,
//! 남은 레코드 배출과 파일 닫기는 교체 잠금 밖의 별도 스레드에서 진행됩니다.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::JoinHandle;

use chrono::{FixedOffset, NaiveDate, Utc};

use super::LogLevel;
use super::durable::DurableLogWriter;
use crate::error::IngestError;

/// 날짜별 로그 기록기
pub struct DailyLogWriter {
    dir: PathBuf,
    max_bytes: u64,
    offset: FixedOffset,
    /// 현재 날짜와 기록기 (교체 잠금)
    current: RwLock<Option<(NaiveDate, Arc<DurableLogWriter>)>>,
    /// 동시에 두 기록기를 만들지 않도록 직렬화
    opening: Mutex<()>,
    /// 배출 중인 이전 기록기 스레드
    retiring: Mutex<Vec<JoinHandle<()>>>,
    /// `shutdown` 이후 새 기록기를 열지 않음
    closed: AtomicBool,
}

impl DailyLogWriter {
    /// 새 날짜별 기록기를 만듭니다. 파일은 첫 기록 시 열립니다.
    pub fn new(dir: impl Into<PathBuf>, max_bytes: u64, offset: FixedOffset) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
            offset,
            current: RwLock::new(None),
            opening: Mutex::new(()),
            retiring: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// 날짜의 기준 파일명: `log_yyyyMMdd.txt`
    pub fn file_name_for(date: NaiveDate) -> String {
        format!("log_{}.txt", date.format("%Y%m%d"))
    }

    /// 기록 디렉토리
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 오늘(설정 오프셋 기준) 기록기를 반환합니다.
    pub fn writer_for_today(&self) -> Result<Arc<DurableLogWriter>, IngestError> {
        let today = Utc::now().with_timezone(&self.offset).date_naive();
        self.writer_for(today)
    }

    /// 주어진 날짜의 기록기를 반환합니다. 날짜가 바뀌었으면 교체합니다.
    ///
    /// `shutdown` 이후에는 `Persistence` 오류를 반환합니다.
    pub fn writer_for(&self, date: NaiveDate) -> Result<Arc<DurableLogWriter>, IngestError> {
        if let Some(writer) = self.matching(date) {
            return Ok(writer);
        }

        let (fresh, previous) = {
            let _opening = self.opening.lock().unwrap_or_else(PoisonError::into_inner);
            if self.closed.load(Ordering::Acquire) {
                return Err(IngestError::persistence(
                    &self.dir,
                    "daily log writer is shut down",
                ));
            }
            if let Some(writer) = self.matching(date) {
                return Ok(writer);
            }

            let fresh = Arc::new(DurableLogWriter::open(
                &self.dir,
                &Self::file_name_for(date),
                self.max_bytes,
                self.offset,
            )?);
            let previous = self
                .current
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .replace((date, Arc::clone(&fresh)));
            (fresh, previous)
        };

        if let Some((previous_date, writer)) = previous {
            tracing::info!(
                dir = %self.dir.display(),
                from = %previous_date,
                to = %date,
                "switching daily log file"
            );
            self.retire(writer);
        }
        Ok(fresh)
    }

    /// 이전 기록기의 입력을 막고 배출은 별도 스레드에 맡깁니다.
    fn retire(&self, writer: Arc<DurableLogWriter>) {
        writer.close_intake();

        let spawned = std::thread::Builder::new()
            .name("diagpost-writer-retire".to_owned())
            .spawn({
                let writer = Arc::clone(&writer);
                move || writer.shutdown()
            });
        match spawned {
            Ok(handle) => {
                let mut retiring = self.retiring.lock().unwrap_or_else(PoisonError::into_inner);
                retiring.retain(|h| !h.is_finished());
                retiring.push(handle);
            }
            Err(e) => {
                tracing::warn!(error = %e, "retire thread unavailable, draining inline");
                writer.shutdown();
            }
        }
    }

    fn matching(&self, date: NaiveDate) -> Option<Arc<DurableLogWriter>> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        match current.as_ref() {
            Some((d, writer)) if *d == date => Some(Arc::clone(writer)),
            _ => None,
        }
    }

    /// 오늘 파일에 레코드를 추가합니다.
    ///
    /// 날짜 교체와 겹쳐 방금 은퇴한 기록기가 거절하면 새 기록기로 한 번 더 시도합니다.
    /// 그래도 큐에 들어가지 못하면 `Persistence` 오류를 반환합니다.
    pub fn append(&self, message: &str, level: LogLevel) -> Result<(), IngestError> {
        let writer = self.writer_for_today()?;
        if writer.append(message, level) {
            return Ok(());
        }

        let retry = self.writer_for_today()?;
        if !Arc::ptr_eq(&writer, &retry) && retry.append(message, level) {
            return Ok(());
        }
        Err(IngestError::persistence(
            &retry.current_path(),
            "log writer rejected record",
        ))
    }

    /// 현재 기록기 (아직 열리지 않았으면 None)
    pub fn current(&self) -> Option<Arc<DurableLogWriter>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|(_, writer)| Arc::clone(writer))
    }

    /// 현재 기록기와 은퇴 중인 기록기를 모두 비우고 종료합니다.
    ///
    /// 이후 기록은 `Persistence` 오류가 됩니다. 여러 번 호출해도 안전합니다.
    pub fn shutdown(&self) {
        let current = {
            let _opening = self.opening.lock().unwrap_or_else(PoisonError::into_inner);
            self.closed.store(true, Ordering::Release);
            self.current
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .take()
        };
        if let Some((_, writer)) = current {
            writer.shutdown();
        }

        let retiring = std::mem::take(
            &mut *self.retiring.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for handle in retiring {
            if handle.join().is_err() {
                tracing::error!(dir = %self.dir.display(), "retire thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc8() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn file_name_uses_compact_date() {
        assert_eq!(DailyLogWriter::file_name_for(date(2024, 1, 9)), "log_20240109.txt");
    }

    #[test]
    fn same_date_reuses_writer() {
        let dir = tempfile::tempdir().unwrap();
        let daily = DailyLogWriter::new(dir.path(), 1 << 20, utc8());
        let a = daily.writer_for(date(2024, 1, 1)).unwrap();
        let b = daily.writer_for(date(2024, 1, 1)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        daily.shutdown();
    }

    #[test]
    fn date_change_switches_and_drains_previous() {
        let dir = tempfile::tempdir().unwrap();
        let daily = DailyLogWriter::new(dir.path(), 1 << 20, utc8());

        let first = daily.writer_for(date(2024, 1, 1)).unwrap();
        first.append("day one", LogLevel::Log);
        let second = daily.writer_for(date(2024, 1, 2)).unwrap();
        second.append("day two", LogLevel::Log);

        // 이전 기록기는 종료되어 더 이상 받지 않음
        assert!(!first.append("too late", LogLevel::Log));
        daily.shutdown();

        let one = std::fs::read_to_string(dir.path().join("log_20240101.txt")).unwrap();
        let two = std::fs::read_to_string(dir.path().join("log_20240102.txt")).unwrap();
        assert!(one.contains("day one"));
        assert!(!one.contains("too late"));
        assert!(two.contains("day two"));
    }

    #[test]
    fn append_opens_todays_file() {
        let dir = tempfile::tempdir().unwrap();
        let daily = DailyLogWriter::new(dir.path(), 1 << 20, utc8());
        assert!(daily.current().is_none());
        daily.append("hello", LogLevel::Log).unwrap();
        let path = daily.current().unwrap().current_path();
        daily.shutdown();

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("log_") && name.ends_with(".txt"));
    }

    #[test]
    fn date_switch_does_not_wait_for_previous_drain() {
        let dir = tempfile::tempdir().unwrap();
        let daily = DailyLogWriter::new(dir.path(), 1 << 20, utc8());

        // 이전 기록기를 붙잡아 배출을 막아도 교체는 곧바로 끝나야 함
        let first = daily.writer_for(date(2024, 1, 1)).unwrap();
        for i in 0..2000 {
            first.append(&format!("backlog {i}"), LogLevel::Log);
        }
        let held = first.lock_file();
        let second = daily.writer_for(date(2024, 1, 2)).unwrap();
        assert!(second.append("day two", LogLevel::Log));
        assert!(!first.append("too late", LogLevel::Log));
        drop(held);

        daily.shutdown();
        let one = std::fs::read_to_string(dir.path().join("log_20240101.txt")).unwrap();
        assert!(one.contains("backlog 1999"));
        assert!(!one.contains("too late"));
    }

    #[test]
    fn append_after_shutdown_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let daily = DailyLogWriter::new(dir.path(), 1 << 20, utc8());
        daily.append("before", LogLevel::Log).unwrap();
        daily.shutdown();

        assert!(matches!(
            daily.append("after", LogLevel::Log),
            Err(IngestError::Persistence { .. })
        ));
        assert!(daily.current().is_none());
        daily.shutdown();
    }
}
