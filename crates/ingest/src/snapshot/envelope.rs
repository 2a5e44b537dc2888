//! 스냅샷 봉투 -- 업로드 메타데이터와 인코딩된 페이로드

use std::fmt;

use chrono::DateTime;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::IngestError;

/// 스냅샷 파일 종류
///
/// JSON에서는 숫자 인덱스(0~4) 또는 대소문자 무시 이름을 모두 받습니다.
/// 직렬화는 숫자 인덱스로 합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SnapshotFileType {
    /// 텍스트
    #[default]
    Text,
    /// 이미지 (PNG)
    Image,
    /// XML
    Xml,
    /// 다중 파일 번들
    Bytes,
    /// CSV
    Csv,
}

impl SnapshotFileType {
    /// 모든 종류 (인덱스 순서)
    pub const ALL: [Self; 5] = [Self::Text, Self::Image, Self::Xml, Self::Bytes, Self::Csv];

    /// 저장 파일 확장자
    pub fn extension(self) -> &'static str {
        match self {
            Self::Text => ".txt",
            Self::Image => ".png",
            Self::Xml => ".xml",
            Self::Bytes => ".zip",
            Self::Csv => ".csv",
        }
    }

    /// 와이어 인덱스
    pub fn index(self) -> u8 {
        match self {
            Self::Text => 0,
            Self::Image => 1,
            Self::Xml => 2,
            Self::Bytes => 3,
            Self::Csv => 4,
        }
    }

    /// 인덱스로 종류를 찾습니다.
    pub fn from_index(index: u64) -> Option<Self> {
        Self::ALL.get(usize::try_from(index).ok()?).copied()
    }

    /// 이름(대소문자 무시)으로 종류를 찾습니다.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.to_string().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for SnapshotFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "Text",
            Self::Image => "Image",
            Self::Xml => "Xml",
            Self::Bytes => "Bytes",
            Self::Csv => "Csv",
        };
        f.write_str(name)
    }
}

impl Serialize for SnapshotFileType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.index())
    }
}

struct FileTypeVisitor;

impl Visitor<'_> for FileTypeVisitor {
    type Value = SnapshotFileType;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a file type index (0-4) or name")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        SnapshotFileType::from_index(v)
            .ok_or_else(|| E::invalid_value(de::Unexpected::Unsigned(v), &self))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        u64::try_from(v)
            .ok()
            .and_then(SnapshotFileType::from_index)
            .ok_or_else(|| E::invalid_value(de::Unexpected::Signed(v), &self))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        if let Ok(index) = v.trim().parse::<u64>() {
            return self.visit_u64(index);
        }
        SnapshotFileType::from_name(v).ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}

impl<'de> Deserialize<'de> for SnapshotFileType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FileTypeVisitor)
    }
}

/// 스냅샷 업로드 봉투
///
/// 키는 camelCase가 기본이며, 클라이언트가 보내는 PascalCase/소문자/대문자 변형도 받습니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotEnvelope {
    /// 사용자 ID
    #[serde(alias = "Uid", alias = "UID")]
    pub uid: String,
    /// 배포 채널
    #[serde(alias = "Channel")]
    pub channel: String,
    /// 클라이언트가 지정한 파일 이름
    #[serde(alias = "Filename", alias = "FileName", alias = "fileName")]
    pub filename: String,
    /// 클라이언트 IP
    #[serde(alias = "Ip", alias = "IP")]
    pub ip: String,
    /// 디바이스 정보
    #[serde(alias = "Device")]
    pub device: String,
    /// OS 정보
    #[serde(alias = "Os", alias = "OS")]
    pub os: String,
    /// 유닉스 타임스탬프 (초)
    #[serde(alias = "Timestamp", alias = "TimeStamp")]
    pub timestamp: i64,
    /// base64(gzip(payload))
    #[serde(alias = "Content")]
    pub content: String,
    /// 웹훅 에스컬레이션 요청 여부
    #[serde(
        rename = "todingtalk",
        alias = "Todingtalk",
        alias = "ToDingTalk",
        alias = "toDingTalk"
    )]
    pub escalate: bool,
    /// 파일 종류
    #[serde(rename = "fileType", alias = "FileType", alias = "filetype")]
    pub file_type: SnapshotFileType,
    /// 부가 정보 JSON 문자열
    #[serde(rename = "extraInfo", alias = "ExtraInfo", alias = "extrainfo")]
    pub extra_info: String,
    /// 저장 파일 이름 재정의
    #[serde(
        rename = "saveFileName",
        alias = "SaveFileName",
        alias = "savefilename"
    )]
    pub save_file_name: String,
}

impl SnapshotEnvelope {
    /// JSON 문서를 파싱합니다.
    pub fn from_json(bytes: &[u8]) -> Result<Self, IngestError> {
        serde_json::from_slice(bytes)
            .map_err(|e| IngestError::decode(format!("invalid snapshot envelope: {e}")))
    }

    /// 저장 폴더 이름: `IP_<ip>_UID_<uid>`
    pub fn folder_name(&self) -> String {
        format!("IP_{}_UID_{}", self.ip, self.uid)
    }

    /// 생성 파일 이름 (확장자 제외)
    ///
    /// `saveFileName`이 있으면 그대로, 없으면 `tm_<UTC MMddHHmmss>_<filename>`입니다.
    pub fn file_name(&self) -> Result<String, IngestError> {
        if !self.save_file_name.is_empty() {
            return Ok(self.save_file_name.clone());
        }
        let at = DateTime::from_timestamp(self.timestamp, 0).ok_or_else(|| {
            IngestError::decode(format!("timestamp {} out of range", self.timestamp))
        })?;
        Ok(format!("tm_{}_{}", at.format("%m%d%H%M%S"), self.filename))
    }

    /// 저장 파일 확장자
    pub fn extension(&self) -> &'static str {
        self.file_type.extension()
    }

    /// 경로에 쓰이는 필드가 단일 경로 구성요소인지 검사합니다.
    pub fn validate(&self) -> Result<(), IngestError> {
        check_segment("folder", &self.folder_name())?;
        check_segment("file name", &self.file_name()?)?;
        if self.content.is_empty() {
            return Err(IngestError::decode("snapshot content is empty"));
        }
        Ok(())
    }
}

fn check_segment(what: &str, value: &str) -> Result<(), IngestError> {
    let bad = value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\', '\0'])
        || value.contains("..");
    if bad {
        return Err(IngestError::decode(format!("invalid snapshot {what} '{value}'")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope() -> SnapshotEnvelope {
        SnapshotEnvelope {
            uid: "42".to_owned(),
            ip: "10.0.0.1".to_owned(),
            filename: "state".to_owned(),
            // 2024-03-05 06:07:08 UTC
            timestamp: 1_709_618_828,
            content: "H4sI".to_owned(),
            ..Default::default()
        }
    }

    #[test]
    fn derived_names() {
        let env = envelope();
        assert_eq!(env.folder_name(), "IP_10.0.0.1_UID_42");
        assert_eq!(env.file_name().unwrap(), "tm_0305060708_state");
        assert_eq!(env.extension(), ".txt");
    }

    #[test]
    fn save_file_name_overrides_generated_name() {
        let env = SnapshotEnvelope {
            save_file_name: "custom".to_owned(),
            ..envelope()
        };
        assert_eq!(env.file_name().unwrap(), "custom");
    }

    #[test]
    fn file_type_accepts_index_and_name() {
        let by_index: SnapshotEnvelope =
            serde_json::from_str(r#"{"fileType": 3, "todingtalk": true}"#).unwrap();
        assert_eq!(by_index.file_type, SnapshotFileType::Bytes);
        assert!(by_index.escalate);

        let by_name: SnapshotEnvelope = serde_json::from_str(r#"{"fileType": "image"}"#).unwrap();
        assert_eq!(by_name.file_type, SnapshotFileType::Image);

        let quoted_index: SnapshotEnvelope = serde_json::from_str(r#"{"fileType": "4"}"#).unwrap();
        assert_eq!(quoted_index.file_type, SnapshotFileType::Csv);

        assert!(serde_json::from_str::<SnapshotEnvelope>(r#"{"fileType": 9}"#).is_err());
        assert!(serde_json::from_str::<SnapshotEnvelope>(r#"{"fileType": "pdf"}"#).is_err());
    }

    #[test]
    fn pascal_case_keys_are_accepted() {
        let env = SnapshotEnvelope::from_json(
            br#"{
                "Uid": "42", "Channel": "beta", "FileName": "state", "IP": "10.0.0.1",
                "Device": "pc", "OS": "win", "Timestamp": 1709618828, "Content": "H4sI",
                "ToDingTalk": true, "FileType": "Csv", "ExtraInfo": "{}", "SaveFileName": "custom"
            }"#,
        )
        .unwrap();
        assert_eq!(env.uid, "42");
        assert_eq!(env.channel, "beta");
        assert_eq!(env.filename, "state");
        assert_eq!(env.ip, "10.0.0.1");
        assert_eq!(env.os, "win");
        assert_eq!(env.timestamp, 1_709_618_828);
        assert!(env.escalate);
        assert_eq!(env.file_type, SnapshotFileType::Csv);
        assert_eq!(env.extra_info, "{}");
        assert_eq!(env.save_file_name, "custom");

        // 직렬화는 기본 키 유지
        let json = serde_json::to_string(&env).unwrap();
        assert!(json.contains("\"fileType\":4"));
        assert!(json.contains("\"todingtalk\":true"));
    }

    #[test]
    fn file_type_serializes_as_index() {
        let json = serde_json::to_string(&SnapshotFileType::Xml).unwrap();
        assert_eq!(json, "2");
    }

    #[test]
    fn every_type_has_distinct_extension() {
        let mut exts: Vec<_> = SnapshotFileType::ALL.iter().map(|t| t.extension()).collect();
        exts.sort_unstable();
        exts.dedup();
        assert_eq!(exts.len(), SnapshotFileType::ALL.len());
    }

    #[test]
    fn traversal_in_path_fields_is_rejected() {
        let env = SnapshotEnvelope {
            uid: "../../etc".to_owned(),
            ..envelope()
        };
        assert!(matches!(env.validate(), Err(IngestError::Decode { .. })));

        let env = SnapshotEnvelope {
            filename: "a/b".to_owned(),
            ..envelope()
        };
        assert!(env.validate().is_err());

        assert!(envelope().validate().is_ok());
    }

    #[test]
    fn empty_content_is_rejected() {
        let env = SnapshotEnvelope {
            content: String::new(),
            ..envelope()
        };
        assert!(env.validate().is_err());
    }

    #[test]
    fn malformed_json_is_decode_error() {
        assert!(matches!(
            SnapshotEnvelope::from_json(b"{"),
            Err(IngestError::Decode { .. })
        ));
    }
}
