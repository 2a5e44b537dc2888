//! 필터 설정 로더 -- JSON 설정 문서를 디스크에서 읽고 씁니다.
//!
//! 파일이 없으면 기본 문서를 기록하고 그것을 사용합니다.
//! 같은 종류 안에서 중복된 규칙 ID는 첫 번째만 남기고 경고 로그를 남깁니다.

use std::collections::HashSet;
use std::path::Path;

use sha2::{Digest, Sha256};

use super::types::FilterDocument;
use crate::error::IngestError;

/// 설정 파일 최대 크기
const MAX_CONFIG_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB
/// 종류별 최대 규칙 수
const MAX_RULES_COUNT: usize = 10_000;

/// 디스크에서 읽은 설정 원본
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// 파일 바이트
    pub bytes: Vec<u8>,
    /// 파일 바이트의 SHA-256 지문 (hex)
    pub fingerprint: String,
}

/// 필터 설정 로더
pub struct FilterConfigLoader;

impl FilterConfigLoader {
    /// 바이트의 SHA-256 지문을 hex 문자열로 계산합니다.
    pub fn fingerprint(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    /// 설정 파일을 읽습니다. 파일이 없으면 `None`을 반환합니다.
    pub async fn read(path: impl AsRef<Path>) -> Result<Option<RawDocument>, IngestError> {
        let path = path.as_ref();

        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(IngestError::Config {
                    field: path.display().to_string(),
                    reason: format!("failed to read file metadata: {e}"),
                });
            }
        };

        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(IngestError::Config {
                field: path.display().to_string(),
                reason: format!(
                    "file too large: {} bytes (max: {MAX_CONFIG_FILE_SIZE})",
                    metadata.len()
                ),
            });
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| IngestError::Config {
                field: path.display().to_string(),
                reason: format!("failed to read file: {e}"),
            })?;
        let fingerprint = Self::fingerprint(&bytes);
        Ok(Some(RawDocument { bytes, fingerprint }))
    }

    /// 문서를 JSON으로 기록하고 기록한 원본을 반환합니다.
    pub async fn write(
        path: impl AsRef<Path>,
        document: &FilterDocument,
    ) -> Result<RawDocument, IngestError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| IngestError::persistence(parent, e))?;
        }

        let bytes = serde_json::to_vec_pretty(document).map_err(|e| IngestError::Config {
            field: path.display().to_string(),
            reason: format!("failed to serialize document: {e}"),
        })?;
        tokio::fs::write(path, &bytes)
            .await
            .map_err(|e| IngestError::persistence(path, e))?;

        tracing::info!(path = %path.display(), "wrote default filter config");
        let fingerprint = Self::fingerprint(&bytes);
        Ok(RawDocument { bytes, fingerprint })
    }

    /// JSON 바이트를 파싱하고 중복 규칙을 정리합니다.
    pub fn parse(bytes: &[u8], source: &str) -> Result<FilterDocument, IngestError> {
        let mut document: FilterDocument =
            serde_json::from_slice(bytes).map_err(|e| IngestError::Config {
                field: source.to_owned(),
                reason: format!("JSON parse error: {e}"),
            })?;

        if document.filter_config.rules.len() > MAX_RULES_COUNT
            || document.alert_config.rules.len() > MAX_RULES_COUNT
        {
            return Err(IngestError::Config {
                field: source.to_owned(),
                reason: format!("too many rules: max {MAX_RULES_COUNT}"),
            });
        }

        let mut seen = HashSet::new();
        document.filter_config.rules.retain(|rule| {
            let first = seen.insert(rule.id.clone());
            if !first {
                tracing::warn!(rule_id = %rule.id, source, "duplicate filter rule id, skipping");
            }
            first
        });

        let mut seen = HashSet::new();
        document.alert_config.rules.retain(|alert| {
            let first = seen.insert(alert.rule.id.clone());
            if !first {
                tracing::warn!(rule_id = %alert.rule.id, source, "duplicate alert rule id, skipping");
            }
            first
        });

        Ok(document)
    }
}
