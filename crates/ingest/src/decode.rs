//! 업로드 페이로드 디코딩
//!
//! 클라이언트 업로드는 gzip 압축이거나 평문 UTF-8입니다.
//! 스냅샷 콘텐츠는 base64로 감싼 gzip 바이트입니다.
//! 압축 해제 결과는 상한을 두어 악의적인 페이로드가 메모리를 소진하지 못하게 합니다.

use std::io::Read;

use base64::{Engine, engine::general_purpose::STANDARD};
use flate2::read::GzDecoder;

use crate::error::IngestError;

/// gzip 매직 바이트
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// 압축 해제 결과 기본 상한 (256MB)
pub const DEFAULT_MAX_DECOMPRESSED_BYTES: u64 = 256 * 1024 * 1024;

/// 페이로드가 gzip 매직으로 시작하는지 확인합니다.
pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= GZIP_MAGIC.len() && bytes[..2] == GZIP_MAGIC
}

/// gzip 바이트를 압축 해제합니다.
///
/// 결과가 `limit` 바이트를 넘으면 `Decode` 에러를 반환합니다.
pub fn gunzip(bytes: &[u8], limit: u64) -> Result<Vec<u8>, IngestError> {
    let mut out = Vec::new();
    GzDecoder::new(bytes)
        .take(limit.saturating_add(1))
        .read_to_end(&mut out)
        .map_err(|e| IngestError::decode(format!("invalid gzip data: {e}")))?;

    if out.len() as u64 > limit {
        return Err(IngestError::decode(format!(
            "decompressed payload exceeds {limit} bytes"
        )));
    }
    Ok(out)
}

/// 클라이언트 로그 업로드를 텍스트로 디코딩합니다.
///
/// gzip이면 압축 해제 후, 아니면 그대로 UTF-8(손실 허용)로 변환합니다.
/// 결과가 비어 있거나 공백뿐이면 `Decode` 에러입니다.
pub fn decode_upload(bytes: &[u8], limit: u64) -> Result<String, IngestError> {
    let content = if is_gzip(bytes) {
        let raw = gunzip(bytes, limit)?;
        tracing::debug!(
            compressed = bytes.len(),
            decompressed = raw.len(),
            "decompressed upload"
        );
        String::from_utf8_lossy(&raw).into_owned()
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    };

    if content.trim().is_empty() {
        return Err(IngestError::decode("empty content after processing"));
    }
    Ok(content)
}

/// base64로 인코딩된 gzip 페이로드를 원본 바이트로 디코딩합니다.
pub fn decode_base64_gzip(encoded: &str, limit: u64) -> Result<Vec<u8>, IngestError> {
    let compressed = STANDARD
        .decode(encoded.trim())
        .map_err(|e| IngestError::decode(format!("invalid base64: {e}")))?;
    gunzip(&compressed, limit)
}

/// base64로 인코딩된 gzip 페이로드를 UTF-8 텍스트로 디코딩합니다.
pub fn decode_base64_gzip_text(encoded: &str, limit: u64) -> Result<String, IngestError> {
    let raw = decode_base64_gzip(encoded, limit)?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// 바이트를 gzip 압축 후 base64로 인코딩합니다.
pub fn encode_base64_gzip(raw: &[u8]) -> Result<String, IngestError> {
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(raw)?;
    let compressed = encoder.finish()?;
    Ok(STANDARD.encode(compressed))
}
