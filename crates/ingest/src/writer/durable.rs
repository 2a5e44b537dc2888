//! 비동기 영속 로그 기록기
//!
//! 생산자는 포맷된 레코드를 채널에 넣고 즉시 반환합니다.
//! 전용 OS 스레드 하나가 FIFO로 꺼내 [`RotatingFile`]에 기록합니다.
//!
//! # 잠금 구조
//! - 큐 측: `Mutex<Option<UnboundedSender>>` (생산자만 접근)
//! - 파일 측: `Mutex<RotatingFile>` (워커 기록과 종료 처리 직렬화)

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use chrono::{DateTime, FixedOffset, Utc};
use diagpost_core::metrics as m;
use tokio::sync::mpsc;

use super::rotating::RotatingFile;
use super::LogLevel;
use crate::error::IngestError;

/// 기록기를 열 때 넣는 시작 레코드
pub const START_MARKER: &str = "start.....";

/// 레코드 한 줄을 포맷합니다: `[@@@]MM-dd HH:mm:ss:fff [Level]: message`
pub fn format_record(at: DateTime<FixedOffset>, level: LogLevel, message: &str) -> String {
    format!("[@@@]{} [{level}]: {message}", at.format("%m-%d %H:%M:%S:%3f"))
}

/// 비동기 영속 로그 기록기
pub struct DurableLogWriter {
    /// 메트릭 레이블용 카테고리
    category: String,
    /// 레코드 타임스탬프 오프셋
    offset: FixedOffset,
    /// 큐 송신측 (종료 후 None)
    sender: Mutex<Option<mpsc::UnboundedSender<String>>>,
    /// 회전 파일 상태
    file: Arc<Mutex<RotatingFile>>,
    /// 워커 스레드 핸들
    worker: Mutex<Option<JoinHandle<()>>>,
    /// 큐에 들어간 레코드 수
    record_count: AtomicU64,
}

impl DurableLogWriter {
    /// `<dir>/<file_name>`을 기준 경로로 하는 기록기를 엽니다.
    ///
    /// 기존 세그먼트를 스캔해 이어서 쓰고, 시작 레코드를 큐에 넣습니다.
    pub fn open(
        dir: &Path,
        file_name: &str,
        max_bytes: u64,
        offset: FixedOffset,
    ) -> Result<Self, IngestError> {
        let category = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file = Arc::new(Mutex::new(RotatingFile::open(dir.join(file_name), max_bytes)?));
        let (tx, rx) = mpsc::unbounded_channel();

        let worker_file = Arc::clone(&file);
        let worker_category = category.clone();
        let worker = std::thread::Builder::new()
            .name(format!("diagpost-writer-{category}"))
            .spawn(move || run_worker(rx, worker_file, worker_category))?;

        let writer = Self {
            category,
            offset,
            sender: Mutex::new(Some(tx)),
            file,
            worker: Mutex::new(Some(worker)),
            record_count: AtomicU64::new(0),
        };
        writer.append(START_MARKER, LogLevel::Log);
        Ok(writer)
    }

    /// 레코드를 포맷해 큐에 넣습니다. 디스크 I/O를 기다리지 않습니다.
    ///
    /// 종료된 기록기에 넣은 레코드는 버려지고 `false`를 반환합니다.
    pub fn append(&self, message: &str, level: LogLevel) -> bool {
        let now = Utc::now().with_timezone(&self.offset);
        let record = format_record(now, level, message);

        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let accepted = match sender.as_ref() {
            Some(tx) => tx.send(record).is_ok(),
            None => false,
        };
        drop(sender);

        if accepted {
            self.record_count.fetch_add(1, Ordering::Relaxed);
        } else {
            tracing::warn!(category = %self.category, "writer is shut down, record dropped");
        }
        accepted
    }

    /// 큐 입력을 막고 남은 레코드를 모두 기록한 뒤 파일을 닫습니다.
    ///
    /// 여러 번 호출해도 안전합니다.
    pub fn shutdown(&self) {
        self.close_intake();

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = worker
            && handle.join().is_err()
        {
            tracing::error!(category = %self.category, "log writer thread panicked");
        }

        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if !file.is_closed() {
            file.close();
            tracing::debug!(category = %self.category, "log writer closed");
        }
    }

    /// 큐 입력만 막습니다. 이후 `append`는 `false`를 반환합니다.
    ///
    /// 송신측을 버리면 워커는 남은 레코드를 비운 뒤 스스로 종료합니다.
    /// 대기는 하지 않으므로 기록 완료가 필요하면 [`shutdown`](Self::shutdown)을 호출합니다.
    pub fn close_intake(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(sender);
    }

    /// 지금까지 큐에 들어간 레코드 수 (시작 레코드 포함)
    pub fn record_count(&self) -> u64 {
        self.record_count.load(Ordering::Relaxed)
    }

    /// 현재 세그먼트 경로
    pub fn current_path(&self) -> PathBuf {
        self.file
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current_path()
    }

    /// 회전 파일 잠금을 잡습니다. 잡고 있는 동안 워커는 기록하지 못합니다.
    #[cfg(test)]
    pub(crate) fn lock_file(&self) -> std::sync::MutexGuard<'_, RotatingFile> {
        self.file.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 현재 세그먼트 내용을 읽습니다.
    pub fn read_current(&self) -> Result<String, IngestError> {
        let file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        let path = file.current_path();
        std::fs::read_to_string(&path).map_err(|e| IngestError::persistence(&path, e))
    }
}

impl Drop for DurableLogWriter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// 워커 루프: 큐가 닫히고 비워질 때까지 FIFO로 기록합니다.
///
/// 기록 실패는 해당 레코드만 버리고 다음 레코드를 계속 처리합니다.
fn run_worker(
    mut rx: mpsc::UnboundedReceiver<String>,
    file: Arc<Mutex<RotatingFile>>,
    category: String,
) {
    while let Some(record) = rx.blocking_recv() {
        let mut file = file.lock().unwrap_or_else(PoisonError::into_inner);
        match file.write_record(&record) {
            Ok(rotated) => {
                metrics::counter!(m::WRITER_RECORDS_WRITTEN_TOTAL, m::LABEL_CATEGORY => category.clone())
                    .increment(1);
                if rotated {
                    metrics::counter!(m::WRITER_ROTATIONS_TOTAL).increment(1);
                }
            }
            Err(e) => {
                metrics::counter!(m::WRITER_WRITE_ERRORS_TOTAL).increment(1);
                tracing::warn!(category = %category, error = %e, "failed to write log record");
            }
        }
    }
}
