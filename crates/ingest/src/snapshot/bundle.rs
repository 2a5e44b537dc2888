//! 다중 파일 번들 코덱
//!
//! 와이어 형식은 다음 엔트리의 반복입니다. 개수나 종료 표시는 없고 버퍼 끝이 유일한 종료 신호입니다.
//!
//! ```text
//! [i32 LE 이름 길이][UTF-8 이름][i32 LE 내용 길이][내용]
//! ```
//!
//! 디코딩은 스트림 전체를 먼저 검증한 뒤에만 파일을 씁니다.
//! 잘린 버퍼, 음수 길이, 경로 탈출 이름은 모두 `Decode` 에러이며 아무 파일도 남기지 않습니다.

use std::fs::File;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::IngestError;

/// 길이 접두사 크기
const LEN_PREFIX: usize = 4;

/// 번들 엔트리
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEntry {
    /// 엔트리 이름 (상대 경로)
    pub name: String,
    /// 내용
    pub data: Vec<u8>,
}

impl BundleEntry {
    /// 새 엔트리를 만듭니다.
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// 추출 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleReport {
    /// 추출된 파일 경로 (엔트리 순서)
    pub files: Vec<PathBuf>,
    /// 아카이브 경로
    pub archive: PathBuf,
}

/// 입력 버퍼 커서
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn read_len(&mut self, what: &str) -> Result<usize, IngestError> {
        if self.remaining() < LEN_PREFIX {
            return Err(IngestError::decode(format!(
                "truncated {what} length prefix at offset {}",
                self.pos
            )));
        }
        let mut raw = [0u8; LEN_PREFIX];
        raw.copy_from_slice(&self.buf[self.pos..self.pos + LEN_PREFIX]);
        let len = i32::from_le_bytes(raw);
        let offset = self.pos;
        self.pos += LEN_PREFIX;

        usize::try_from(len).map_err(|_| {
            IngestError::decode(format!("negative {what} length {len} at offset {offset}"))
        })
    }

    fn read_bytes(&mut self, len: usize, what: &str) -> Result<&'a [u8], IngestError> {
        if len > self.remaining() {
            return Err(IngestError::decode(format!(
                "{what} length {len} at offset {} exceeds remaining {} bytes",
                self.pos,
                self.remaining()
            )));
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }
}

/// 번들 스트림을 엔트리 목록으로 디코딩합니다.
///
/// 모든 엔트리 이름은 [`sanitize_name`]을 통과해야 합니다.
pub fn decode(bytes: &[u8]) -> Result<Vec<BundleEntry>, IngestError> {
    let mut cursor = Cursor { buf: bytes, pos: 0 };
    let mut entries = Vec::new();

    while cursor.remaining() > 0 {
        let name_len = cursor.read_len("name")?;
        let name_bytes = cursor.read_bytes(name_len, "name")?;
        let name = std::str::from_utf8(name_bytes)
            .map_err(|e| IngestError::decode(format!("entry name is not utf-8: {e}")))?
            .to_owned();
        sanitize_name(&name)?;

        let data_len = cursor.read_len("content")?;
        let data = cursor.read_bytes(data_len, "content")?.to_vec();

        entries.push(BundleEntry { name, data });
    }

    Ok(entries)
}

/// 엔트리 목록을 번들 스트림으로 인코딩합니다.
pub fn encode(entries: &[BundleEntry]) -> Result<Vec<u8>, IngestError> {
    let capacity = entries
        .iter()
        .map(|e| 2 * LEN_PREFIX + e.name.len() + e.data.len())
        .sum();
    let mut out = Vec::with_capacity(capacity);

    for entry in entries {
        for part in [entry.name.as_bytes(), entry.data.as_slice()] {
            let len = i32::try_from(part.len()).map_err(|_| {
                IngestError::decode(format!("entry '{}' is too large to encode", entry.name))
            })?;
            out.extend_from_slice(&len.to_le_bytes());
            out.extend_from_slice(part);
        }
    }

    Ok(out)
}

/// 엔트리 이름을 출력 디렉토리 기준 상대 경로로 바꿉니다.
///
/// `\`는 구분자로 취급합니다. 빈 이름, 절대 경로, `..`, 드라이브 접두사는 거부합니다.
pub fn sanitize_name(name: &str) -> Result<PathBuf, IngestError> {
    let normalized = name.replace('\\', "/");
    let reject = |reason: &str| IngestError::decode(format!("unsafe entry name '{name}': {reason}"));

    if normalized.trim().is_empty() {
        return Err(reject("empty"));
    }
    if normalized.contains('\0') {
        return Err(reject("contains nul"));
    }
    if normalized.starts_with('/') {
        return Err(reject("absolute path"));
    }
    // 윈도우 드라이브 접두사 (C:)
    let first = normalized.split('/').next().unwrap_or_default();
    if first.len() >= 2 && first.as_bytes()[1] == b':' {
        return Err(reject("drive prefix"));
    }

    let mut path = PathBuf::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::ParentDir => return Err(reject("parent directory component")),
            Component::RootDir | Component::Prefix(_) => return Err(reject("absolute path")),
        }
    }

    if path.as_os_str().is_empty() {
        return Err(reject("no file component"));
    }
    Ok(path)
}

/// 엔트리를 `dir` 아래에 기록합니다. 중첩 이름은 하위 디렉토리를 만듭니다.
///
/// 같은 부모 아래 임시 디렉토리에 먼저 모두 쓴 뒤 `dir`과 교체합니다.
/// 중간에 실패하면 임시 디렉토리만 지워지고 `dir`은 그대로입니다.
/// 성공하면 이전 업로드가 `dir`에 남긴 파일은 사라집니다.
pub fn extract(entries: &[BundleEntry], dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
    let parent = dir
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| IngestError::persistence(parent, e))?;

    let staging = tempfile::Builder::new()
        .prefix(".bundle-")
        .tempdir_in(parent)
        .map_err(|e| IngestError::persistence(parent, e))?;

    let mut relative = Vec::with_capacity(entries.len());
    for entry in entries {
        let rel = sanitize_name(&entry.name)?;
        let path = staging.path().join(&rel);
        if let Some(sub) = path.parent() {
            std::fs::create_dir_all(sub).map_err(|e| IngestError::persistence(sub, e))?;
        }
        std::fs::write(&path, &entry.data).map_err(|e| IngestError::persistence(&path, e))?;
        relative.push(rel);
    }

    if dir.exists() {
        std::fs::remove_dir_all(dir).map_err(|e| IngestError::persistence(dir, e))?;
        tracing::debug!(dir = %dir.display(), "replaced previous bundle output");
    }
    std::fs::rename(staging.path(), dir).map_err(|e| IngestError::persistence(dir, e))?;

    Ok(relative.into_iter().map(|rel| dir.join(rel)).collect())
}

/// 주어진 파일들만 deflate zip 하나로 묶습니다.
///
/// 아카이브 내 이름은 `dir` 기준 상대 경로이며 `/`로 구분합니다. 같은 경로는 한 번만 넣습니다.
pub fn archive_files(dir: &Path, files: &[PathBuf], archive: &Path) -> Result<usize, IngestError> {
    let mut named = files
        .iter()
        .map(|abs| {
            let rel = abs
                .strip_prefix(dir)
                .map_err(|e| IngestError::persistence(abs, e))?
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            Ok((rel, abs))
        })
        .collect::<Result<Vec<_>, IngestError>>()?;
    named.sort();
    named.dedup_by(|a, b| a.0 == b.0);

    let file = File::create(archive).map_err(|e| IngestError::persistence(archive, e))?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for (rel, abs) in &named {
        let data = std::fs::read(abs).map_err(|e| IngestError::persistence(abs, e))?;
        zip.start_file(rel.as_str(), options)
            .map_err(|e| IngestError::persistence(archive, e))?;
        zip.write_all(&data)
            .map_err(|e| IngestError::persistence(archive, e))?;
    }

    zip.finish()
        .map_err(|e| IngestError::persistence(archive, e))?;
    Ok(named.len())
}

/// 번들을 검증, 추출한 뒤 이번에 추출한 파일을 아카이브합니다.
///
/// 추출 디렉토리는 지우지 않습니다. 파일 I/O는 blocking 스레드에서 수행합니다.
pub async fn extract_and_archive(
    bytes: Vec<u8>,
    dir: PathBuf,
    archive: PathBuf,
) -> Result<BundleReport, IngestError> {
    let entries = decode(&bytes)?;
    drop(bytes);
    extract_entries(entries, dir, archive).await
}

/// 이미 디코딩된 엔트리를 추출하고 아카이브합니다.
pub async fn extract_entries(
    entries: Vec<BundleEntry>,
    dir: PathBuf,
    archive: PathBuf,
) -> Result<BundleReport, IngestError> {
    tokio::task::spawn_blocking(move || {
        let files = extract(&entries, &dir)?;
        let archived = archive_files(&dir, &files, &archive)?;
        tracing::debug!(
            dir = %dir.display(),
            entries = entries.len(),
            archived,
            "bundle extracted"
        );
        Ok(BundleReport { files, archive })
    })
    .await
    .map_err(|e| IngestError::Io(std::io::Error::other(e)))?
}
