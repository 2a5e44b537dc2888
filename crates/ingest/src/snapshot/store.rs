//! 스냅샷 저장소 -- 파일 종류별 디코딩과 기록
//!
//! 저장 경로는 `<snapshot_dir>/IP_<ip>_UID_<uid>/<이름><확장자>`입니다.
//! 페이로드는 디렉토리를 만들기 전에 전부 디코딩하므로 디코딩 실패 시 아무것도 남지 않습니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use diagpost_core::metrics as m;

use super::bundle::{self, BundleEntry};
use super::envelope::{SnapshotEnvelope, SnapshotFileType};
use crate::alert::{AlertTransport, SnapshotEscalator};
use crate::decode::{decode_base64_gzip, decode_base64_gzip_text};
use crate::error::IngestError;

/// 디코딩된 페이로드
enum Payload {
    Image(Vec<u8>),
    Bundle(Vec<BundleEntry>),
    Text(String),
}

/// 스냅샷 저장소
pub struct SnapshotStore<T: AlertTransport> {
    root: PathBuf,
    escalator: Arc<SnapshotEscalator<T>>,
    max_decompressed_bytes: u64,
}

impl<T: AlertTransport> SnapshotStore<T> {
    /// 새 저장소를 만듭니다. `root`는 스냅샷 루트 디렉토리입니다.
    pub fn new(
        root: impl Into<PathBuf>,
        escalator: Arc<SnapshotEscalator<T>>,
        max_decompressed_bytes: u64,
    ) -> Self {
        Self {
            root: root.into(),
            escalator,
            max_decompressed_bytes,
        }
    }

    /// 스냅샷 루트 디렉토리
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 봉투의 저장 경로를 계산합니다.
    pub fn target_path(&self, envelope: &SnapshotEnvelope) -> Result<PathBuf, IngestError> {
        let name = envelope.file_name()?;
        Ok(self
            .root
            .join(envelope.folder_name())
            .join(format!("{name}{}", envelope.extension())))
    }

    /// 봉투를 디코딩하여 저장하고 저장 경로를 반환합니다.
    ///
    /// 번들은 같은 이름의 하위 디렉토리에 추출되고 저장 경로는 그 옆의 zip입니다.
    /// 에스컬레이션 실패는 경고 로그만 남깁니다.
    pub async fn store(&self, envelope: &SnapshotEnvelope) -> Result<PathBuf, IngestError> {
        let file_type = envelope.file_type;
        let result = self.store_inner(envelope).await;

        match &result {
            Ok(path) => {
                metrics::counter!(m::SNAPSHOT_STORED_TOTAL, m::LABEL_FILE_TYPE => file_type.to_string())
                    .increment(1);
                tracing::info!(
                    uid = %envelope.uid,
                    file_type = %file_type,
                    path = %path.display(),
                    "snapshot stored"
                );
            }
            Err(e) => {
                if matches!(e, IngestError::Decode { .. }) {
                    metrics::counter!(m::SNAPSHOT_DECODE_FAILURES_TOTAL, m::LABEL_FILE_TYPE => file_type.to_string())
                        .increment(1);
                }
                tracing::warn!(uid = %envelope.uid, file_type = %file_type, error = %e, "snapshot rejected");
            }
        }
        result
    }

    async fn store_inner(&self, envelope: &SnapshotEnvelope) -> Result<PathBuf, IngestError> {
        envelope.validate()?;
        let path = self.target_path(envelope)?;
        let payload = self.decode_payload(envelope)?;

        let folder = self.root.join(envelope.folder_name());
        tokio::fs::create_dir_all(&folder)
            .await
            .map_err(|e| IngestError::persistence(&folder, e))?;

        match payload {
            Payload::Image(bytes) => {
                tokio::fs::write(&path, bytes)
                    .await
                    .map_err(|e| IngestError::persistence(&path, e))?;
            }
            Payload::Bundle(entries) => {
                let dir = folder.join(envelope.file_name()?);
                bundle::extract_entries(entries, dir, path.clone()).await?;
            }
            Payload::Text(text) => {
                tokio::fs::write(&path, text.as_bytes())
                    .await
                    .map_err(|e| IngestError::persistence(&path, e))?;
                if envelope.escalate {
                    self.escalate(envelope, &text).await;
                }
            }
        }

        Ok(path)
    }

    fn decode_payload(&self, envelope: &SnapshotEnvelope) -> Result<Payload, IngestError> {
        let limit = self.max_decompressed_bytes;
        let payload = match envelope.file_type {
            SnapshotFileType::Image => Payload::Image(decode_base64_gzip(&envelope.content, limit)?),
            SnapshotFileType::Bytes => {
                let raw = decode_base64_gzip(&envelope.content, limit)?;
                Payload::Bundle(bundle::decode(&raw)?)
            }
            SnapshotFileType::Text | SnapshotFileType::Xml | SnapshotFileType::Csv => {
                Payload::Text(decode_base64_gzip_text(&envelope.content, limit)?)
            }
        };
        Ok(payload)
    }

    async fn escalate(&self, envelope: &SnapshotEnvelope, text: &str) {
        match self.escalator.escalate(text, &envelope.extra_info).await {
            Ok(true) => tracing::info!(uid = %envelope.uid, "snapshot escalated"),
            Ok(false) => {}
            Err(e) => tracing::warn!(uid = %envelope.uid, error = %e, "snapshot escalation failed"),
        }
    }
}
