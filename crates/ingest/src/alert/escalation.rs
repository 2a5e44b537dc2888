//! 스냅샷 에스컬레이션
//!
//! 에스컬레이션을 요청한 스냅샷의 텍스트를 웹훅으로 전달합니다.
//! 텍스트에 `isOnline:false`가 있으면 개발 웹훅, 아니면 운영 웹훅을 씁니다.
//! 멘션 대상은 봉투의 `extraInfo` JSON에서 `FeiShuAT` 키로 읽습니다.

use std::collections::BTreeMap;

use super::transport::{AlertTransport, WebhookTarget};
use crate::error::IngestError;

/// 개발 클라이언트 표시
pub const DEV_MARKER: &str = "isOnline:false";

/// `extraInfo` 안의 멘션 목록 키
pub const MENTION_KEY: &str = "FeiShuAT";

/// 에스컬레이션 대상 웹훅
#[derive(Debug, Clone, Default)]
pub struct EscalationTargets {
    /// 운영 웹훅
    pub online: String,
    /// 개발 웹훅
    pub dev: String,
    /// 두 웹훅 공통 서명 키 (비어 있으면 서명 안 함)
    pub secret: String,
}

impl EscalationTargets {
    /// 텍스트에 맞는 웹훅을 고릅니다.
    pub fn select(&self, text: &str) -> &str {
        if text.contains(DEV_MARKER) {
            &self.dev
        } else {
            &self.online
        }
    }

    /// 텍스트에 맞는 웹훅을 서명 키와 함께 고릅니다. URL이 비어 있으면 `None`입니다.
    pub fn target_for(&self, text: &str) -> Option<WebhookTarget> {
        let url = self.select(text);
        (!url.is_empty()).then(|| WebhookTarget::new(url).with_secret(&self.secret))
    }
}

/// `extraInfo` JSON에서 멘션 목록(쉼표 구분)을 꺼냅니다.
///
/// JSON이 아니거나 키가 없으면 `None`입니다.
pub fn mention_list(extra_info: &str) -> Option<String> {
    if extra_info.trim().is_empty() {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(extra_info).ok()?;
    value
        .get(MENTION_KEY)
        .and_then(|v| v.as_str())
        .map(str::to_owned)
}

/// 쉼표로 구분된 이름을 ID로 바꾸어 멘션 줄을 만듭니다.
///
/// 이름은 소문자로 조회하며, 매핑에 없는 이름은 건너뜁니다.
pub fn render_mentions(names: &str, mentions: &BTreeMap<String, String>) -> String {
    names
        .split(',')
        .map(|name| name.trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .filter_map(|name| mentions.get(&name))
        .map(|id| format!("<at user_id=\"{id}\">{id}</at>\n"))
        .collect()
}

/// 스냅샷 에스컬레이션 전송기
pub struct SnapshotEscalator<T: AlertTransport> {
    transport: T,
    targets: EscalationTargets,
    mentions: BTreeMap<String, String>,
}

impl<T: AlertTransport> SnapshotEscalator<T> {
    /// 새 전송기를 만듭니다. 멘션 키는 소문자여야 합니다.
    pub fn new(transport: T, targets: EscalationTargets, mentions: BTreeMap<String, String>) -> Self {
        Self {
            transport,
            targets,
            mentions,
        }
    }

    /// 멘션 줄과 본문을 합친 최종 메시지를 만듭니다.
    pub fn compose(&self, text: &str, extra_info: &str) -> String {
        let mentions = mention_list(extra_info)
            .map(|names| render_mentions(&names, &self.mentions))
            .unwrap_or_default();
        format!("\n{mentions}{text}")
    }

    /// 텍스트를 에스컬레이션합니다.
    ///
    /// 대상 웹훅이 설정되지 않았으면 보내지 않고 `Ok(false)`를 반환합니다.
    pub async fn escalate(&self, text: &str, extra_info: &str) -> Result<bool, IngestError> {
        let Some(target) = self.targets.target_for(text) else {
            tracing::debug!("no escalation webhook configured, skipping");
            return Ok(false);
        };

        let message = self.compose(text, extra_info);
        self.transport.send(&target, &message).await?;
        Ok(true)
    }

    /// 전송 계층
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::dispatcher::tests::RecordingTransport;

    fn targets() -> EscalationTargets {
        EscalationTargets {
            online: "https://online".to_owned(),
            dev: "https://dev".to_owned(),
            secret: String::new(),
        }
    }

    fn mentions() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("alice".to_owned(), "ou_a".to_owned()),
            ("bob".to_owned(), "ou_b".to_owned()),
        ])
    }

    #[test]
    fn dev_marker_selects_dev_webhook() {
        let t = targets();
        assert_eq!(t.select("state isOnline:false ..."), "https://dev");
        assert_eq!(t.select("state isOnline:true ..."), "https://online");
    }

    #[test]
    fn target_carries_shared_secret() {
        let t = EscalationTargets {
            secret: "key".to_owned(),
            ..targets()
        };
        let target = t.target_for("isOnline:false").unwrap();
        assert_eq!(target.url, "https://dev");
        assert_eq!(target.secret, "key");

        assert!(EscalationTargets::default().target_for("x").is_none());
    }

    #[test]
    fn mention_list_reads_key() {
        assert_eq!(
            mention_list(r#"{"FeiShuAT":"Alice,bob"}"#).as_deref(),
            Some("Alice,bob")
        );
        assert!(mention_list("").is_none());
        assert!(mention_list("not json").is_none());
        assert!(mention_list(r#"{"other":1}"#).is_none());
    }

    #[test]
    fn mentions_are_case_insensitive_and_skip_unknown() {
        let rendered = render_mentions("ALICE, carol ,Bob", &mentions());
        assert_eq!(
            rendered,
            "<at user_id=\"ou_a\">ou_a</at>\n<at user_id=\"ou_b\">ou_b</at>\n"
        );
    }

    #[tokio::test]
    async fn escalate_sends_composed_message() {
        let escalator =
            SnapshotEscalator::new(RecordingTransport::default(), targets(), mentions());
        let sent = escalator
            .escalate("crash report", r#"{"FeiShuAT":"alice"}"#)
            .await
            .unwrap();
        assert!(sent);

        let log = escalator.transport().sent.lock().unwrap();
        assert_eq!(log[0].0, "https://online");
        assert_eq!(log[0].1, "\n<at user_id=\"ou_a\">ou_a</at>\ncrash report");
    }

    #[tokio::test]
    async fn missing_webhook_skips() {
        let escalator = SnapshotEscalator::new(
            RecordingTransport::default(),
            EscalationTargets::default(),
            mentions(),
        );
        assert!(!escalator.escalate("text", "").await.unwrap());
    }
}
