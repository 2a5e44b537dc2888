//! 메트릭 상수 및 설명 등록
//!
//! 수집 백엔드의 메트릭 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다. 레코더가 설치되지 않으면 호출은 아무 일도 하지 않습니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `diagpost_`
//! - 모듈명: `filter_`, `alert_`, `writer_`, `snapshot_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(diagpost_core::metrics::FILTER_LOGS_PROCESSED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 규칙 ID 레이블 키
pub const LABEL_RULE_ID: &str = "rule_id";

/// 로그 카테고리 레이블 키
pub const LABEL_CATEGORY: &str = "category";

/// 스냅샷 파일 형식 레이블 키 (text, image, xml, bytes, csv)
pub const LABEL_FILE_TYPE: &str = "file_type";

// ─── Filter 메트릭 ────────────────────────────────────────────────

/// Filter: 평가된 전체 로그 수 (counter)
pub const FILTER_LOGS_PROCESSED_TOTAL: &str = "diagpost_filter_logs_processed_total";

/// Filter: 필터 규칙으로 버려진 로그 수 (counter)
pub const FILTER_LOGS_FILTERED_TOTAL: &str = "diagpost_filter_logs_filtered_total";

/// Filter: 보존된 로그 수 (counter)
pub const FILTER_LOGS_KEPT_TOTAL: &str = "diagpost_filter_logs_kept_total";

/// Filter: 설정 리로드 성공 수 (counter)
pub const FILTER_CONFIG_RELOADS_TOTAL: &str = "diagpost_filter_config_reloads_total";

/// Filter: 설정 리로드 실패 수 (counter)
pub const FILTER_CONFIG_RELOAD_FAILURES_TOTAL: &str =
    "diagpost_filter_config_reload_failures_total";

/// Filter: 현재 활성 규칙 수 (gauge)
pub const FILTER_ACTIVE_RULES: &str = "diagpost_filter_active_rules";

// ─── Alert 메트릭 ─────────────────────────────────────────────────

/// Alert: 알림 규칙 매칭 수 (counter, label: rule_id)
pub const ALERT_MATCHED_TOTAL: &str = "diagpost_alert_matched_total";

/// Alert: 웹훅 전송 성공 수 (counter)
pub const ALERT_SENT_TOTAL: &str = "diagpost_alert_sent_total";

/// Alert: 쿨다운으로 억제된 알림 수 (counter)
pub const ALERT_SUPPRESSED_TOTAL: &str = "diagpost_alert_suppressed_total";

/// Alert: 웹훅 전송 실패 수 (counter)
pub const ALERT_FAILED_TOTAL: &str = "diagpost_alert_failed_total";

// ─── Writer 메트릭 ────────────────────────────────────────────────

/// Writer: 파일에 기록된 레코드 수 (counter, label: category)
pub const WRITER_RECORDS_WRITTEN_TOTAL: &str = "diagpost_writer_records_written_total";

/// Writer: 기록 실패 수 (counter)
pub const WRITER_WRITE_ERRORS_TOTAL: &str = "diagpost_writer_write_errors_total";

/// Writer: 크기 초과로 인한 파일 회전 수 (counter)
pub const WRITER_ROTATIONS_TOTAL: &str = "diagpost_writer_rotations_total";

// ─── Snapshot 메트릭 ──────────────────────────────────────────────

/// Snapshot: 저장된 스냅샷 수 (counter, label: file_type)
pub const SNAPSHOT_STORED_TOTAL: &str = "diagpost_snapshot_stored_total";

/// Snapshot: 번들 디코딩 실패 수 (counter)
pub const SNAPSHOT_DECODE_FAILURES_TOTAL: &str = "diagpost_snapshot_decode_failures_total";

/// 모든 메트릭의 설명을 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    // Filter
    describe_counter!(
        FILTER_LOGS_PROCESSED_TOTAL,
        "Total number of log payloads evaluated by the filter engine"
    );
    describe_counter!(
        FILTER_LOGS_FILTERED_TOTAL,
        "Total number of log payloads dropped by a filter rule"
    );
    describe_counter!(
        FILTER_LOGS_KEPT_TOTAL,
        "Total number of log payloads kept for persistence"
    );
    describe_counter!(
        FILTER_CONFIG_RELOADS_TOTAL,
        "Total number of successful filter configuration reloads"
    );
    describe_counter!(
        FILTER_CONFIG_RELOAD_FAILURES_TOTAL,
        "Total number of failed filter configuration reloads"
    );
    describe_gauge!(
        FILTER_ACTIVE_RULES,
        "Number of enabled filter and alert rules"
    );

    // Alert
    describe_counter!(
        ALERT_MATCHED_TOTAL,
        "Total number of alert rule matches by rule"
    );
    describe_counter!(ALERT_SENT_TOTAL, "Total number of alerts delivered");
    describe_counter!(
        ALERT_SUPPRESSED_TOTAL,
        "Total number of alerts suppressed by cooldown"
    );
    describe_counter!(
        ALERT_FAILED_TOTAL,
        "Total number of alert deliveries that failed"
    );

    // Writer
    describe_counter!(
        WRITER_RECORDS_WRITTEN_TOTAL,
        "Total number of log records appended to disk"
    );
    describe_counter!(
        WRITER_WRITE_ERRORS_TOTAL,
        "Total number of log records that could not be written"
    );
    describe_counter!(
        WRITER_ROTATIONS_TOTAL,
        "Total number of size-triggered log file rotations"
    );

    // Snapshot
    describe_counter!(
        SNAPSHOT_STORED_TOTAL,
        "Total number of snapshots persisted by file type"
    );
    describe_counter!(
        SNAPSHOT_DECODE_FAILURES_TOTAL,
        "Total number of snapshot bundles rejected as malformed"
    );
}
