//! 수집 서비스 -- 필터, 기록기, 스냅샷 저장소를 하나로 묶습니다.
//!
//! HTTP 계층(또는 CLI)이 호출하는 진입점입니다.
//!
//! # 사용 예시
//! ```ignore
//! use diagpost_ingest::{IngestConfig, IngestServiceBuilder};
//!
//! let service = IngestServiceBuilder::new()
//!     .config(IngestConfig::default())
//!     .build()
//!     .await?;
//! service.ingest_upload(&body, "10.0.0.1")?;
//! service.shutdown().await;
//! ```

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::alert::{AlertDispatcher, AlertTransport, EscalationTargets, SnapshotEscalator, WebhookTransport};
use crate::config::IngestConfig;
use crate::decode::decode_upload;
use crate::error::IngestError;
use crate::filter::{ConfigWatcher, FilterEngine, FilterStatistics, ReloadOutcome};
use crate::snapshot::{SnapshotEnvelope, SnapshotStore};
use crate::writer::{DailyLogWriter, LogLevel};

/// 로그 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDisposition {
    /// 기록 큐에 들어감
    Kept,
    /// 필터 규칙으로 버려짐
    Dropped,
}

impl LogDisposition {
    /// 보존 여부
    pub fn is_kept(self) -> bool {
        self == Self::Kept
    }
}

impl fmt::Display for LogDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kept => f.write_str("kept"),
            Self::Dropped => f.write_str("dropped"),
        }
    }
}

/// 수집 서비스
pub struct IngestService<T: AlertTransport> {
    config: IngestConfig,
    engine: Arc<FilterEngine<Arc<T>>>,
    writer: DailyLogWriter,
    snapshots: SnapshotStore<Arc<T>>,
    watcher: Mutex<Option<ConfigWatcher>>,
    /// 클라이언트 로그 업로드 스위치 (클라이언트가 조회)
    client_logging: AtomicBool,
}

impl<T: AlertTransport> IngestService<T> {
    /// 로그 한 건을 평가하고 보존되면 오늘 파일에 기록합니다.
    ///
    /// 보존 판정을 받았지만 기록기가 레코드를 받지 못하면 `Persistence` 오류입니다.
    pub fn process_log(
        &self,
        content: &str,
        client_ip: &str,
    ) -> Result<LogDisposition, IngestError> {
        if !self.engine.process(content, client_ip) {
            return Ok(LogDisposition::Dropped);
        }
        self.writer.append(content, LogLevel::Log)?;
        Ok(LogDisposition::Kept)
    }

    /// 업로드 본문(gzip 또는 평문)을 디코딩한 뒤 처리합니다.
    pub fn ingest_upload(
        &self,
        body: &[u8],
        client_ip: &str,
    ) -> Result<LogDisposition, IngestError> {
        let content = decode_upload(body, self.config.max_decompressed_bytes)?;
        let disposition = self.process_log(&content, client_ip)?;
        tracing::debug!(
            client_ip,
            raw_len = body.len(),
            decoded_len = content.len(),
            disposition = %disposition,
            "upload processed"
        );
        Ok(disposition)
    }

    /// 스냅샷을 디코딩하여 저장하고 저장 경로를 반환합니다.
    pub async fn store_snapshot(
        &self,
        envelope: &SnapshotEnvelope,
    ) -> Result<PathBuf, IngestError> {
        self.snapshots.store(envelope).await
    }

    /// 필터 설정을 다시 읽습니다.
    pub async fn reload_filter_config(&self) -> Result<ReloadOutcome, IngestError> {
        self.engine.reload().await
    }

    /// 필터 통계
    pub fn statistics(&self) -> FilterStatistics {
        self.engine.statistics()
    }

    /// 클라이언트 로그 업로드가 켜져 있는지
    pub fn client_logging_enabled(&self) -> bool {
        self.client_logging.load(Ordering::Relaxed)
    }

    /// 클라이언트 로그 업로드 스위치를 바꿉니다.
    pub fn set_client_logging(&self, enabled: bool) {
        let previous = self.client_logging.swap(enabled, Ordering::Relaxed);
        if previous != enabled {
            tracing::info!(enabled, "client logging switched");
        }
    }

    /// 필터 엔진
    pub fn engine(&self) -> &Arc<FilterEngine<Arc<T>>> {
        &self.engine
    }

    /// 로그 기록기
    pub fn writer(&self) -> &DailyLogWriter {
        &self.writer
    }

    /// 서비스 설정
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// 설정 파일 감시 중인지
    pub fn is_watching(&self) -> bool {
        self.watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// 서비스를 종료합니다.
    ///
    /// 감시를 멈추고, 진행 중인 알림 전송을 제한 시간 동안 기다린 뒤,
    /// 기록 큐를 모두 디스크에 비웁니다. 여러 번 호출해도 안전합니다.
    pub async fn shutdown(&self) {
        let watcher = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(watcher);

        let drain = Duration::from_millis(self.config.alert_drain_timeout_ms);
        self.engine.wait_for_alerts(drain).await;

        self.writer.shutdown();
        tracing::info!("ingest service stopped");
    }
}

/// 수집 서비스 빌더
#[derive(Debug, Default)]
pub struct IngestServiceBuilder {
    config: IngestConfig,
}

impl IngestServiceBuilder {
    /// 기본 설정으로 빌더를 만듭니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 서비스 설정을 지정합니다.
    pub fn config(mut self, config: IngestConfig) -> Self {
        self.config = config;
        self
    }

    /// 웹훅 전송기로 서비스를 만듭니다.
    pub async fn build(self) -> Result<IngestService<WebhookTransport>, IngestError> {
        let transport =
            WebhookTransport::new(Duration::from_secs(self.config.webhook_timeout_secs))?;
        self.build_with_transport(transport).await
    }

    /// 지정한 전송기로 서비스를 만듭니다.
    ///
    /// 필터 설정 파일이 없으면 기본 문서를 기록합니다.
    pub async fn build_with_transport<T: AlertTransport>(
        self,
        transport: T,
    ) -> Result<IngestService<T>, IngestError> {
        let config = self.config;
        config.validate()?;
        let offset = config.utc_offset()?;
        let transport = Arc::new(transport);

        let dispatcher = Arc::new(AlertDispatcher::new(Arc::clone(&transport), offset));
        let engine = Arc::new(FilterEngine::load(&config.filter_config_path, dispatcher).await?);

        let escalator = Arc::new(SnapshotEscalator::new(
            transport,
            EscalationTargets {
                online: config.online_webhook.clone(),
                dev: config.dev_webhook.clone(),
                secret: config.escalation_secret.clone(),
            },
            config.mentions.clone(),
        ));
        let snapshots =
            SnapshotStore::new(config.snapshot_dir(), escalator, config.max_decompressed_bytes);
        let writer = DailyLogWriter::new(config.log_dir(), config.max_log_file_bytes, offset);

        let watcher = if config.watch_filter_config {
            let delay = Duration::from_millis(config.reload_delay_ms);
            match ConfigWatcher::spawn(Arc::clone(&engine), delay) {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    tracing::warn!(error = %e, "filter config watch unavailable, explicit reload only");
                    None
                }
            }
        } else {
            None
        };

        tracing::info!(
            root = %config.root_dir.display(),
            category = %config.log_category,
            watching = watcher.is_some(),
            "ingest service ready"
        );

        Ok(IngestService {
            config,
            engine,
            writer,
            snapshots,
            watcher: Mutex::new(watcher),
            client_logging: AtomicBool::new(true),
        })
    }
}
