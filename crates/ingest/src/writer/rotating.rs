//! 크기 기반 회전 파일
//!
//! 인덱스 0은 기본 파일명 그대로, 인덱스 N(>0)은 확장자 앞에 `_N`을 붙입니다.
//! 예: `log_20240101.txt`, `log_20240101_1.txt`, `log_20240101_2.txt`

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::IngestError;

/// 크기 기반으로 회전하는 로그 파일 세트
///
/// 현재 인덱스는 생성 후 증가만 합니다.
pub struct RotatingFile {
    /// 인덱스 0 파일 경로
    base_path: PathBuf,
    /// 세그먼트 최대 크기 (바이트)
    max_bytes: u64,
    /// 현재 세그먼트 인덱스
    current_index: u32,
    /// 현재 세그먼트 크기 (바이트)
    current_size: u64,
    /// 열린 파일 핸들 (닫히면 None)
    file: Option<File>,
}

impl RotatingFile {
    /// 회전 파일을 엽니다.
    ///
    /// 인덱스 0부터 올라가며 파일이 없거나 `max_bytes` 미만인 첫 인덱스를 선택합니다.
    /// 이미 가득 찬 세그먼트는 덮어쓰지 않습니다.
    pub fn open(base_path: impl Into<PathBuf>, max_bytes: u64) -> Result<Self, IngestError> {
        let base_path = base_path.into();
        if let Some(parent) = base_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| IngestError::persistence(parent, e))?;
        }

        let current_index = Self::find_current_index(&base_path, max_bytes);
        let path = Self::path_for_index(&base_path, current_index);
        let file = Self::open_append(&path)?;
        let current_size = file
            .metadata()
            .map_err(|e| IngestError::persistence(&path, e))?
            .len();

        tracing::debug!(
            path = %path.display(),
            index = current_index,
            size = current_size,
            "opened log segment"
        );

        Ok(Self {
            base_path,
            max_bytes,
            current_index,
            current_size,
            file: Some(file),
        })
    }

    /// 주어진 인덱스의 세그먼트 경로를 계산합니다.
    pub fn path_for_index(base_path: &Path, index: u32) -> PathBuf {
        if index == 0 {
            return base_path.to_path_buf();
        }

        let stem = base_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match base_path.extension() {
            Some(ext) => format!("{stem}_{index}.{}", ext.to_string_lossy()),
            None => format!("{stem}_{index}"),
        };
        base_path.with_file_name(name)
    }

    /// 재시작 시 이어서 쓸 세그먼트 인덱스를 찾습니다.
    fn find_current_index(base_path: &Path, max_bytes: u64) -> u32 {
        let mut index = 0;
        loop {
            let path = Self::path_for_index(base_path, index);
            match std::fs::metadata(&path) {
                Ok(meta) if meta.len() >= max_bytes => index += 1,
                _ => return index,
            }
        }
    }

    fn open_append(path: &Path) -> Result<File, IngestError> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| IngestError::persistence(path, e))
    }

    /// 레코드 한 줄을 기록하고 플러시한 뒤 회전 여부를 평가합니다.
    ///
    /// 회전은 기록 후에 판단하므로 세그먼트는 레코드 하나만큼 `max_bytes`를 넘을 수 있습니다.
    /// 회전이 일어났으면 `true`를 반환합니다. 다음 세그먼트를 열지 못하면 현재 세그먼트에
    /// 계속 기록하고 다음 레코드에서 회전을 다시 시도합니다.
    pub fn write_record(&mut self, record: &str) -> Result<bool, IngestError> {
        let path = self.current_path();
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| IngestError::persistence(&path, "log segment is closed"))?;

        file.write_all(record.as_bytes())
            .and_then(|()| file.write_all(b"\n"))
            .and_then(|()| file.flush())
            .map_err(|e| IngestError::persistence(&path, e))?;
        self.current_size += record.len() as u64 + 1;

        if self.current_size >= self.max_bytes {
            match self.rotate() {
                Ok(()) => return Ok(true),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        size = self.current_size,
                        error = %e,
                        "log rotation failed, keeping current segment"
                    );
                }
            }
        }
        Ok(false)
    }

    /// 다음 인덱스의 세그먼트를 연 뒤 현재 세그먼트와 교체합니다.
    ///
    /// 실패하면 인덱스와 핸들은 바뀌지 않습니다.
    fn rotate(&mut self) -> Result<(), IngestError> {
        let next_index = self.current_index + 1;
        let path = Self::path_for_index(&self.base_path, next_index);
        let file = Self::open_append(&path)?;
        let size = file
            .metadata()
            .map_err(|e| IngestError::persistence(&path, e))?
            .len();

        self.file = Some(file);
        self.current_index = next_index;
        self.current_size = size;

        tracing::info!(path = %path.display(), index = next_index, "log file rotated");
        Ok(())
    }

    /// 파일 핸들을 닫습니다. 이후 기록은 실패합니다.
    pub fn close(&mut self) {
        if let Some(mut file) = self.file.take()
            && let Err(e) = file.flush()
        {
            tracing::warn!(path = %self.current_path().display(), error = %e, "flush on close failed");
        }
    }

    /// [`close`](Self::close)로 핸들이 닫혔는지 여부
    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// 현재 세그먼트 경로
    pub fn current_path(&self) -> PathBuf {
        Self::path_for_index(&self.base_path, self.current_index)
    }

    /// 현재 세그먼트 인덱스
    pub fn current_index(&self) -> u32 {
        self.current_index
    }

    /// 현재 세그먼트 크기 (바이트)
    pub fn current_size(&self) -> u64 {
        self.current_size
    }
}
