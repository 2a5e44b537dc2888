//! 통합 테스트 -- 수집 경로 전체 흐름 검증
//!
//! 필터 우선순위, 회전 파일 수, 재시작 후 이어쓰기, 쿨다운, 번들 왕복,
//! 잘린 번들 거부, 리로드 멱등성, 회전 실패 뒤 기록 복구, 기록 거절 보고를
//! 공개 API만으로 검증합니다.

use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{FixedOffset, Utc};
use diagpost_ingest::alert::{AlertDispatcher, AlertTransport, WebhookTarget};
use diagpost_ingest::error::IngestError;
use diagpost_ingest::filter::{
    AlertConfig, AlertRule, FilterConfig, FilterDocument, FilterEngine, FilterRule, MatchType,
};
use diagpost_ingest::snapshot::BundleEntry;
use diagpost_ingest::snapshot::bundle;
use diagpost_ingest::writer::{DurableLogWriter, RotatingFile};
use diagpost_ingest::{
    IngestConfigBuilder, IngestServiceBuilder, LogDisposition, LogLevel, ReloadOutcome,
    SnapshotEnvelope, SnapshotFileType,
};

/// 전송 내용을 기록하는 전송기
#[derive(Default)]
struct Recorder {
    sent: Mutex<Vec<(String, String)>>,
}

impl Recorder {
    fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl AlertTransport for Recorder {
    async fn send(&self, target: &WebhookTarget, text: &str) -> Result<(), IngestError> {
        self.sent
            .lock()
            .unwrap()
            .push((target.url.clone(), text.to_owned()));
        Ok(())
    }
}

fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

fn document(filters: Vec<FilterRule>, alerts: Vec<AlertRule>) -> FilterDocument {
    FilterDocument {
        last_updated: Utc::now(),
        filter_config: FilterConfig {
            enabled: true,
            rules: filters,
        },
        alert_config: AlertConfig {
            enabled: true,
            webhook: "https://hook.invalid/alert".to_owned(),
            secret: String::new(),
            rules: alerts,
        },
    }
}

fn engine(doc: FilterDocument) -> FilterEngine<Arc<Recorder>> {
    let dispatcher = Arc::new(AlertDispatcher::new(Arc::new(Recorder::default()), utc()));
    FilterEngine::with_document("unused.json", doc, dispatcher)
}

fn file_sizes(dir: &Path) -> Vec<(String, u64)> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| {
            let e = e.unwrap();
            (
                e.file_name().to_string_lossy().into_owned(),
                e.metadata().unwrap().len(),
            )
        })
        .collect();
    files.sort();
    files
}

// --- 필터 ---

#[tokio::test]
async fn first_enabled_filter_decides_drop_and_disabling_changes_outcome() {
    let rules = vec![
        FilterRule::new("a", MatchType::StartsWith, "noise"),
        FilterRule::new("b", MatchType::Contains, "keepme"),
    ];
    let eng = engine(document(rules.clone(), vec![]));
    assert!(!eng.process("noise keepme", "ip"));
    assert!(!eng.process("xx keepme", "ip"));
    assert!(eng.process("clean", "ip"));

    // 두 규칙 모두 비활성화하면 순서와 무관하게 보존
    let disabled: Vec<_> = rules.into_iter().map(|r| r.enabled(false)).collect();
    let eng = engine(document(disabled, vec![]));
    assert!(eng.process("noise keepme", "ip"));
}

#[tokio::test]
async fn match_types_and_case_sensitivity() {
    let eng = engine(document(
        vec![
            FilterRule::new("ends", MatchType::EndsWith, "TAIL"),
            FilterRule::new("exact", MatchType::Contains, "Secret").case_sensitive(true),
            FilterRule::new("re", MatchType::Regex, r"^id=\d+$"),
        ],
        vec![],
    ));
    assert!(!eng.process("some tail", "ip"));
    assert!(eng.process("a secret", "ip"));
    assert!(!eng.process("a Secret", "ip"));
    assert!(!eng.process("ID=42", "ip"));
    assert!(eng.process("id=4x", "ip"));
}

#[tokio::test]
async fn unsupported_match_type_never_matches() {
    let doc: FilterDocument = serde_json::from_str(
        r#"{
            "filterConfig": {
                "enabled": true,
                "invalidLogFilters": [
                    {"id": "x", "type": "fuzzy", "pattern": "a", "enabled": true}
                ]
            },
            "alertConfig": {"enabled": false, "webhook": "", "alertRules": []}
        }"#,
    )
    .unwrap();
    assert!(engine(doc).process("aaa", "ip"));
}

// --- 쿨다운 ---

#[tokio::test(start_paused = true)]
async fn cooldown_allows_one_dispatch_per_window() {
    let recorder = Arc::new(Recorder::default());
    let dispatcher = Arc::new(AlertDispatcher::new(Arc::clone(&recorder), utc()));
    let eng = FilterEngine::with_document(
        "unused.json",
        document(
            vec![],
            vec![AlertRule::new(
                FilterRule::new("err", MatchType::Contains, "ERROR"),
                60,
            )],
        ),
        dispatcher,
    );

    assert!(eng.process("ERROR first", "ip"));
    eng.wait_for_alerts(Duration::from_secs(1)).await;
    assert!(eng.process("ERROR second, different text", "ip"));
    eng.wait_for_alerts(Duration::from_secs(1)).await;
    assert_eq!(recorder.count(), 1);

    tokio::time::advance(Duration::from_secs(61)).await;
    assert!(eng.process("ERROR third", "ip"));
    eng.wait_for_alerts(Duration::from_secs(1)).await;
    assert_eq!(recorder.count(), 2);
    assert_eq!(eng.statistics().alerts_fired, 3);
}

// --- 기록기 ---

#[tokio::test]
async fn rotation_produces_expected_file_count() {
    let tmp = tempfile::tempdir().unwrap();
    let writer = DurableLogWriter::open(tmp.path(), "app.txt", 1000, utc()).unwrap();

    let message = "x".repeat(200);
    for _ in 0..20 {
        assert!(writer.append(&message, LogLevel::Log));
    }
    writer.shutdown();

    let files = file_sizes(tmp.path());
    let total: u64 = files.iter().map(|(_, size)| size).sum();
    let expected = total.div_ceil(1000) as usize;
    assert!(
        files.len().abs_diff(expected) <= 1,
        "{} files for {total} bytes",
        files.len()
    );

    assert_eq!(files[0].0, "app.txt");
    for (index, (name, _)) in files.iter().enumerate().skip(1) {
        assert_eq!(name, &format!("app_{index}.txt"));
    }
    // 마지막 파일을 제외하면 모두 임계값 이상
    for (_, size) in &files[..files.len() - 1] {
        assert!(*size >= 1000);
    }
}

#[tokio::test]
async fn restart_resumes_at_first_under_threshold_index() {
    let tmp = tempfile::tempdir().unwrap();
    let base = tmp.path().join("app.txt");
    std::fs::write(&base, vec![b'a'; 100]).unwrap();
    std::fs::write(RotatingFile::path_for_index(&base, 1), vec![b'b'; 100]).unwrap();
    std::fs::write(RotatingFile::path_for_index(&base, 2), b"partial\n").unwrap();

    let writer = DurableLogWriter::open(tmp.path(), "app.txt", 100, utc()).unwrap();
    writer.append("resumed", LogLevel::Warning);
    writer.shutdown();

    assert_eq!(std::fs::read(&base).unwrap(), vec![b'a'; 100]);
    assert_eq!(
        std::fs::read(RotatingFile::path_for_index(&base, 1)).unwrap(),
        vec![b'b'; 100]
    );
    let resumed = std::fs::read_to_string(RotatingFile::path_for_index(&base, 2)).unwrap();
    assert!(resumed.starts_with("partial\n"));
    assert!(resumed.contains("[Warning]: resumed"));
}

#[tokio::test]
async fn records_are_written_in_fifo_order() {
    let tmp = tempfile::tempdir().unwrap();
    let writer = DurableLogWriter::open(tmp.path(), "fifo.txt", u64::MAX, utc()).unwrap();
    for i in 0..500 {
        writer.append(&format!("line-{i}"), LogLevel::Log);
    }
    writer.shutdown();

    let text = std::fs::read_to_string(tmp.path().join("fifo.txt")).unwrap();
    let lines: Vec<_> = text.lines().skip(1).collect();
    assert_eq!(lines.len(), 500);
    for (i, line) in lines.iter().enumerate() {
        assert!(line.ends_with(&format!("line-{i}")), "{line}");
    }
}

// --- 번들 ---

#[tokio::test]
async fn bundle_round_trip_produces_files_and_archive() {
    let tmp = tempfile::tempdir().unwrap();
    let entries = vec![
        BundleEntry::new("save.dat", vec![1u8, 2, 3, 0, 255]),
        BundleEntry::new("meta.json", br#"{"level":7}"#.to_vec()),
    ];
    let bytes = bundle::encode(&entries).unwrap();

    let dir = tmp.path().join("out");
    let archive = tmp.path().join("out.zip");
    let report = bundle::extract_and_archive(bytes, dir.clone(), archive.clone())
        .await
        .unwrap();

    assert_eq!(report.files.len(), 2);
    for entry in &entries {
        assert_eq!(std::fs::read(dir.join(&entry.name)).unwrap(), entry.data);
    }

    let mut zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
    assert_eq!(zip.len(), 2);
    for entry in &entries {
        let mut file = zip.by_name(&entry.name).unwrap();
        let mut data = Vec::new();
        std::io::Read::read_to_end(&mut file, &mut data).unwrap();
        assert_eq!(data, entry.data);
    }
}

#[tokio::test]
async fn truncated_bundle_is_rejected_without_files() {
    let tmp = tempfile::tempdir().unwrap();
    let mut bytes = bundle::encode(&[
        BundleEntry::new("a", b"aaaa".to_vec()),
        BundleEntry::new("b", b"bbbbbbbb".to_vec()),
    ])
    .unwrap();
    bytes.truncate(bytes.len() - 3);

    let dir = tmp.path().join("out");
    let result = bundle::extract_and_archive(bytes, dir.clone(), tmp.path().join("out.zip")).await;
    assert!(matches!(result, Err(IngestError::Decode { .. })));
    assert!(!dir.exists());
    assert!(std::fs::read_dir(tmp.path()).unwrap().next().is_none());
}

// --- 리로드 ---

#[tokio::test]
async fn reload_of_unchanged_file_keeps_identity() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("filters.json");
    let dispatcher = Arc::new(AlertDispatcher::new(Arc::new(Recorder::default()), utc()));
    let eng = FilterEngine::load(&path, dispatcher).await.unwrap();

    let before = eng.active();
    assert_eq!(eng.reload().await.unwrap(), ReloadOutcome::Unchanged);
    assert_eq!(eng.reload().await.unwrap(), ReloadOutcome::Unchanged);
    assert!(Arc::ptr_eq(&before, &eng.active()));

    let mut doc = FilterDocument::builtin();
    doc.filter_config.rules.push(FilterRule::new("new", MatchType::Regex, "x+"));
    std::fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();
    assert_eq!(eng.reload().await.unwrap(), ReloadOutcome::Reloaded);
    assert!(!Arc::ptr_eq(&before, &eng.active()));
    assert_eq!(eng.active().matcher.regex_count(), before.matcher.regex_count() + 1);
}

#[tokio::test]
async fn records_after_failed_rotation_still_land() {
    let tmp = tempfile::tempdir().unwrap();
    let base = tmp.path().join("a.txt");
    let next = RotatingFile::path_for_index(&base, 1);
    // 다음 세그먼트 자리를 디렉터리로 막아 회전을 실패시킴
    std::fs::create_dir(&next).unwrap();

    let writer = DurableLogWriter::open(tmp.path(), "a.txt", 100, utc()).unwrap();
    let filler = "f".repeat(80);
    assert!(writer.append(&filler, LogLevel::Log));
    for _ in 0..500 {
        if writer.read_current().unwrap_or_default().contains(&filler) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(writer.current_path(), base);

    std::fs::remove_dir(&next).unwrap();
    assert!(writer.append("after-1", LogLevel::Log));
    assert!(writer.append("after-2", LogLevel::Log));
    writer.shutdown();

    let text = format!(
        "{}{}",
        std::fs::read_to_string(&base).unwrap(),
        std::fs::read_to_string(&next).unwrap()
    );
    assert!(text.contains("after-1"), "{text}");
    assert!(text.contains("after-2"), "{text}");
}

// --- 서비스 ---

#[tokio::test]
async fn rejected_record_is_reported_by_process_log() {
    let tmp = tempfile::tempdir().unwrap();
    let config = IngestConfigBuilder::new()
        .root_dir(tmp.path())
        .watch_filter_config(false)
        .build()
        .unwrap();
    let service = IngestServiceBuilder::new()
        .config(config)
        .build_with_transport(Recorder::default())
        .await
        .unwrap();

    assert!(service.process_log("accepted", "ip").unwrap().is_kept());
    service.shutdown().await;

    match service.process_log("rejected", "ip") {
        Err(IngestError::Persistence { .. }) => {}
        other => panic!("expected persistence error, got {other:?}"),
    }
}

#[tokio::test]
async fn service_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let config = IngestConfigBuilder::new()
        .root_dir(tmp.path())
        .log_category("game")
        .watch_filter_config(false)
        .build()
        .unwrap();
    let service = IngestServiceBuilder::new()
        .config(config)
        .build_with_transport(Recorder::default())
        .await
        .unwrap();

    assert_eq!(
        service.ingest_upload(b"player crashed", "10.1.1.1").unwrap(),
        LogDisposition::Kept
    );
    assert_eq!(
        service.ingest_upload(b"[DEBUG] tick", "10.1.1.1").unwrap(),
        LogDisposition::Dropped
    );

    let envelope = SnapshotEnvelope {
        uid: "u1".to_owned(),
        ip: "10.1.1.1".to_owned(),
        filename: "dump".to_owned(),
        timestamp: 0,
        content: diagpost_ingest::decode::encode_base64_gzip(
            &bundle::encode(&[BundleEntry::new("x.txt", b"x".to_vec())]).unwrap(),
        )
        .unwrap(),
        file_type: SnapshotFileType::Bytes,
        ..Default::default()
    };
    let stored = service.store_snapshot(&envelope).await.unwrap();
    assert_eq!(
        stored,
        tmp.path()
            .join("snapshoot")
            .join("IP_10.1.1.1_UID_u1")
            .join("tm_0101000000_dump.zip")
    );

    service.shutdown().await;

    let log_dir = tmp.path().join("logs").join("game");
    let files = file_sizes(&log_dir);
    assert_eq!(files.len(), 1);
    let text = std::fs::read_to_string(log_dir.join(&files[0].0)).unwrap();
    assert!(text.contains("player crashed"));
    assert!(!text.contains("tick"));
}
