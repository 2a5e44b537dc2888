//! 필터 엔진 -- 보존/폐기 판정과 알림 매칭
//!
//! 활성 규칙 스냅샷은 `RwLock<Arc<ActiveRules>>`로 보관하며 리로드 시 통째로 교체합니다.
//! 판정 중인 호출자는 잠금을 잡지 않고 자신이 복제한 스냅샷을 끝까지 사용합니다.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use diagpost_core::metrics as m;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio_util::task::TaskTracker;

use super::loader::FilterConfigLoader;
use super::matcher::{RuleKind, RuleMatcher};
use super::types::{AlertRule, FilterDocument};
use crate::alert::{AlertDispatcher, AlertTransport, WebhookTarget};
use crate::error::IngestError;

/// 한 번의 설정 로드로 만들어진 불변 규칙 스냅샷
#[derive(Debug)]
pub struct ActiveRules {
    /// 설정 문서
    pub document: FilterDocument,
    /// 이 문서로 컴파일된 매처
    pub matcher: RuleMatcher,
    /// 원본 파일 지문 (기본 문서로 대체된 경우 None)
    pub fingerprint: Option<String>,
    /// 로드 시각
    pub loaded_at: DateTime<Utc>,
}

impl ActiveRules {
    /// 문서의 활성 정규식 규칙을 컴파일하여 스냅샷을 만듭니다.
    ///
    /// 정규식 컴파일 실패는 경고 로그를 남기고 해당 규칙만 비활성화됩니다.
    pub fn compile(document: FilterDocument, fingerprint: Option<String>) -> Self {
        let mut matcher = RuleMatcher::new();

        for rule in &document.filter_config.rules {
            if let Err(e) = matcher.compile_rule(RuleKind::Filter, rule) {
                tracing::warn!(rule_id = %rule.id, error = %e, "invalid filter regex, rule disabled");
            }
        }
        for alert in &document.alert_config.rules {
            if let Err(e) = matcher.compile_rule(RuleKind::Alert, &alert.rule) {
                tracing::warn!(rule_id = %alert.rule.id, error = %e, "invalid alert regex, rule disabled");
            }
        }

        Self {
            document,
            matcher,
            fingerprint,
            loaded_at: Utc::now(),
        }
    }
}

/// 필터 통계 스냅샷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterStatistics {
    /// 평가한 로그 수
    pub processed: u64,
    /// 필터 규칙으로 버린 로그 수
    pub filtered: u64,
    /// 매칭된 알림 수 (쿨다운 억제 포함)
    pub alerts_fired: u64,
    /// 현재 설정 로드 시각
    pub config_loaded_at: DateTime<Utc>,
}

/// 리로드 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// 파일 지문이 같아 아무것도 바꾸지 않음
    Unchanged,
    /// 새 설정으로 교체함
    Reloaded,
}

/// 필터 엔진
pub struct FilterEngine<T: AlertTransport> {
    /// 설정 JSON 경로
    config_path: PathBuf,
    /// 활성 규칙 스냅샷
    active: RwLock<Arc<ActiveRules>>,
    /// 알림 디스패처
    dispatcher: Arc<AlertDispatcher<T>>,
    /// 알림 전송 태스크 추적
    tracker: TaskTracker,
    /// 알림 태스크를 띄울 런타임 (생성 시점 캡처)
    runtime: Option<Handle>,
    /// 리로드 직렬화
    reload_lock: tokio::sync::Mutex<()>,
    processed: AtomicU64,
    filtered: AtomicU64,
    alerts_fired: AtomicU64,
}

impl<T: AlertTransport> FilterEngine<T> {
    /// 설정 파일에서 규칙을 로드하여 엔진을 만듭니다.
    ///
    /// - 파일이 없으면 기본 문서를 기록하고 사용합니다.
    /// - JSON이 잘못되었으면 기본 문서로 대체합니다.
    pub async fn load(
        config_path: impl Into<PathBuf>,
        dispatcher: Arc<AlertDispatcher<T>>,
    ) -> Result<Self, IngestError> {
        let config_path = config_path.into();
        let source = config_path.display().to_string();

        let active = match FilterConfigLoader::read(&config_path).await? {
            Some(raw) => match FilterConfigLoader::parse(&raw.bytes, &source) {
                Ok(document) => ActiveRules::compile(document, Some(raw.fingerprint)),
                Err(e) => {
                    tracing::warn!(path = %source, error = %e, "malformed filter config, using built-in defaults");
                    ActiveRules::compile(FilterDocument::builtin(), None)
                }
            },
            None => {
                let document = FilterDocument::builtin();
                match FilterConfigLoader::write(&config_path, &document).await {
                    Ok(raw) => ActiveRules::compile(document, Some(raw.fingerprint)),
                    Err(e) => {
                        tracing::warn!(path = %source, error = %e, "failed to write default filter config");
                        ActiveRules::compile(document, None)
                    }
                }
            }
        };

        tracing::info!(
            path = %source,
            filters = active.document.filter_config.rules.len(),
            alerts = active.document.alert_config.rules.len(),
            "filter config loaded"
        );

        Ok(Self::from_active(config_path, active, dispatcher))
    }

    /// 이미 가진 문서로 엔진을 만듭니다. 디스크를 읽지 않습니다.
    pub fn with_document(
        config_path: impl Into<PathBuf>,
        document: FilterDocument,
        dispatcher: Arc<AlertDispatcher<T>>,
    ) -> Self {
        Self::from_active(
            config_path.into(),
            ActiveRules::compile(document, None),
            dispatcher,
        )
    }

    fn from_active(
        config_path: PathBuf,
        active: ActiveRules,
        dispatcher: Arc<AlertDispatcher<T>>,
    ) -> Self {
        metrics::gauge!(m::FILTER_ACTIVE_RULES).set(active.document.enabled_rule_count() as f64);
        Self {
            config_path,
            active: RwLock::new(Arc::new(active)),
            dispatcher,
            tracker: TaskTracker::new(),
            runtime: Handle::try_current().ok(),
            reload_lock: tokio::sync::Mutex::new(()),
            processed: AtomicU64::new(0),
            filtered: AtomicU64::new(0),
            alerts_fired: AtomicU64::new(0),
        }
    }

    /// 로그를 평가합니다. `true`면 보존, `false`면 폐기입니다.
    ///
    /// 필터 규칙이 먼저 평가되며 첫 매칭에서 즉시 폐기합니다 (알림 규칙은 평가하지 않음).
    /// 보존되는 로그는 매칭되는 모든 활성 알림 규칙마다 전송 태스크를 띄웁니다.
    pub fn process(&self, content: &str, client_ip: &str) -> bool {
        self.processed.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::FILTER_LOGS_PROCESSED_TOTAL).increment(1);

        let active = self.active();
        let document = &active.document;

        if document.filter_config.enabled {
            let hit = document
                .filter_config
                .rules
                .iter()
                .filter(|rule| rule.enabled)
                .find(|rule| active.matcher.matches(RuleKind::Filter, rule, content));

            if let Some(rule) = hit {
                self.filtered.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(m::FILTER_LOGS_FILTERED_TOTAL).increment(1);
                tracing::debug!(rule_id = %rule.id, client_ip, "log dropped by filter rule");
                return false;
            }
        }

        let alerts = &document.alert_config;
        if alerts.enabled && !alerts.webhook.is_empty() {
            let target = alerts.target();
            for alert in alerts.rules.iter().filter(|a| a.rule.enabled) {
                if active.matcher.matches(RuleKind::Alert, &alert.rule, content) {
                    self.alerts_fired.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!(m::ALERT_MATCHED_TOTAL, m::LABEL_RULE_ID => alert.rule.id.clone())
                        .increment(1);
                    self.spawn_dispatch(alert, content, client_ip, &target);
                }
            }
        }

        metrics::counter!(m::FILTER_LOGS_KEPT_TOTAL).increment(1);
        true
    }

    /// 알림 전송 태스크를 띄웁니다. 호출자는 기다리지 않습니다.
    fn spawn_dispatch(
        &self,
        alert: &AlertRule,
        content: &str,
        client_ip: &str,
        target: &WebhookTarget,
    ) {
        let Some(runtime) = self.runtime.as_ref() else {
            tracing::warn!(rule_id = %alert.rule.id, "no async runtime available, alert skipped");
            return;
        };

        let dispatcher = Arc::clone(&self.dispatcher);
        let alert = alert.clone();
        let content = content.to_owned();
        let client_ip = client_ip.to_owned();
        let target = target.clone();

        self.tracker.spawn_on(
            async move {
                dispatcher
                    .fire_rule(&alert, &content, &client_ip, &target)
                    .await;
            },
            runtime,
        );
    }

    /// 설정 파일을 다시 읽어 규칙을 교체합니다.
    ///
    /// 파일 지문이 현재 설정과 같으면 아무것도 하지 않습니다.
    /// 실패하면 에러를 로그로 남기고 이전 설정을 유지합니다.
    pub async fn reload(&self) -> Result<ReloadOutcome, IngestError> {
        let _guard = self.reload_lock.lock().await;
        let result = self.reload_locked().await;

        match &result {
            Ok(ReloadOutcome::Reloaded) => {
                metrics::counter!(m::FILTER_CONFIG_RELOADS_TOTAL).increment(1);
            }
            Ok(ReloadOutcome::Unchanged) => {
                tracing::debug!(path = %self.config_path.display(), "filter config unchanged");
            }
            Err(e) => {
                metrics::counter!(m::FILTER_CONFIG_RELOAD_FAILURES_TOTAL).increment(1);
                tracing::warn!(
                    path = %self.config_path.display(),
                    error = %e,
                    "filter config reload failed, keeping previous config"
                );
            }
        }
        result
    }

    async fn reload_locked(&self) -> Result<ReloadOutcome, IngestError> {
        let source = self.config_path.display().to_string();
        let raw = FilterConfigLoader::read(&self.config_path)
            .await?
            .ok_or_else(|| IngestError::Config {
                field: source.clone(),
                reason: "config file not found".to_owned(),
            })?;

        if self.active().fingerprint.as_deref() == Some(raw.fingerprint.as_str()) {
            return Ok(ReloadOutcome::Unchanged);
        }

        let document = FilterConfigLoader::parse(&raw.bytes, &source)?;
        let active = ActiveRules::compile(document, Some(raw.fingerprint));

        tracing::info!(
            path = %source,
            filters = active.document.filter_config.rules.len(),
            alerts = active.document.alert_config.rules.len(),
            "filter config reloaded"
        );
        metrics::gauge!(m::FILTER_ACTIVE_RULES).set(active.document.enabled_rule_count() as f64);

        *self.active.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(active);
        Ok(ReloadOutcome::Reloaded)
    }

    /// 현재 활성 규칙 스냅샷
    pub fn active(&self) -> Arc<ActiveRules> {
        Arc::clone(&self.active.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// 통계 스냅샷
    pub fn statistics(&self) -> FilterStatistics {
        FilterStatistics {
            processed: self.processed.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            alerts_fired: self.alerts_fired.load(Ordering::Relaxed),
            config_loaded_at: self.active().loaded_at,
        }
    }

    /// 설정 파일 경로
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// 알림 디스패처
    pub fn dispatcher(&self) -> &Arc<AlertDispatcher<T>> {
        &self.dispatcher
    }

    /// 진행 중인 알림 전송을 최대 `timeout` 동안 기다립니다.
    ///
    /// 모두 끝났으면 `true`입니다.
    pub async fn wait_for_alerts(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let finished = tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok();
        self.tracker.reopen();
        if !finished {
            tracing::warn!(pending = self.tracker.len(), "alert dispatches still in flight");
        }
        finished
    }
}
