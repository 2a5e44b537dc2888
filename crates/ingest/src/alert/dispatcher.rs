//! 알림 디스패처 -- 쿨다운 게이트를 거쳐 알림을 전송합니다.
//!
//! 쿨다운 키는 규칙 ID뿐입니다. 같은 규칙에 매칭된 서로 다른 메시지도
//! 하나의 억제 윈도우를 공유합니다.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use diagpost_core::metrics as m;

use super::cooldown::CooldownGate;
use super::transport::{AlertTransport, WebhookTarget};
use crate::filter::types::AlertRule;

/// 알림 본문에 넣는 로그 미리보기 최대 문자 수
pub const PREVIEW_CHARS: usize = 500;

/// 내용의 앞부분만 남깁니다. 잘렸으면 `...`을 붙입니다.
pub fn preview(content: &str) -> String {
    match content.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_owned(),
    }
}

/// 알림 메시지를 렌더링합니다.
pub fn render_message(
    rule: &AlertRule,
    content: &str,
    client_ip: &str,
    at: DateTime<FixedOffset>,
) -> String {
    format!(
        "🚨 Log alert: {}\n📅 Time: {}\n🌐 Client IP: {}\n📝 Rule: {}\n📄 Preview:\n{}",
        rule.rule.name,
        at.format("%Y-%m-%d %H:%M:%S"),
        client_ip,
        rule.rule.description,
        preview(content),
    )
}

/// 알림 디스패처
pub struct AlertDispatcher<T: AlertTransport> {
    transport: T,
    cooldown: CooldownGate,
    /// 메시지 타임스탬프 오프셋
    offset: FixedOffset,
    sent: AtomicU64,
    suppressed: AtomicU64,
    failed: AtomicU64,
}

impl<T: AlertTransport> AlertDispatcher<T> {
    /// 새 디스패처를 만듭니다.
    pub fn new(transport: T, offset: FixedOffset) -> Self {
        Self {
            transport,
            cooldown: CooldownGate::new(),
            offset,
            sent: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// 쿨다운을 확인하고 전송합니다. 실제로 전송에 성공했으면 `true`입니다.
    ///
    /// 전송 실패 시 마지막 전송 시각은 바뀌지 않습니다.
    pub async fn try_fire(
        &self,
        rule_id: &str,
        cooldown: Duration,
        message: &str,
        target: &WebhookTarget,
    ) -> bool {
        let Some(permit) = self.cooldown.try_acquire(rule_id, cooldown) else {
            self.suppressed.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(m::ALERT_SUPPRESSED_TOTAL).increment(1);
            tracing::debug!(rule_id, "alert suppressed by cooldown");
            return false;
        };

        match self.transport.send(target, message).await {
            Ok(()) => {
                permit.succeed();
                self.sent.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(m::ALERT_SENT_TOTAL).increment(1);
                tracing::info!(rule_id, "alert sent");
                true
            }
            Err(e) => {
                drop(permit);
                self.failed.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(m::ALERT_FAILED_TOTAL).increment(1);
                tracing::warn!(rule_id, error = %e, "failed to send alert");
                false
            }
        }
    }

    /// 알림 규칙과 로그 내용으로 메시지를 만들어 전송합니다.
    pub async fn fire_rule(
        &self,
        rule: &AlertRule,
        content: &str,
        client_ip: &str,
        target: &WebhookTarget,
    ) -> bool {
        let now = Utc::now().with_timezone(&self.offset);
        let message = render_message(rule, content, client_ip, now);
        self.try_fire(
            &rule.rule.id,
            Duration::from_secs(rule.cooldown_seconds),
            &message,
            target,
        )
        .await
    }

    /// 쿨다운 게이트
    pub fn cooldown(&self) -> &CooldownGate {
        &self.cooldown
    }

    /// 전송 계층
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// 전송 성공 수
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// 쿨다운으로 억제된 수
    pub fn suppressed_count(&self) -> u64 {
        self.suppressed.load(Ordering::Relaxed)
    }

    /// 전송 실패 수
    pub fn failed_count(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}
