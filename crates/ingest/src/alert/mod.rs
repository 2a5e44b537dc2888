//! 알림 전송 -- 쿨다운 게이트, 웹훅 전송, 스냅샷 에스컬레이션
//!
//! - [`cooldown`]: 규칙 ID별 쿨다운 및 전송 중 상태
//! - [`dispatcher`]: 알림 메시지 렌더링과 쿨다운 확인 후 전송
//! - [`transport`]: 전송 trait과 웹훅 구현
//! - [`escalation`]: 스냅샷 텍스트의 웹훅 에스컬레이션 (멘션 포함)

pub mod cooldown;
pub mod dispatcher;
pub mod escalation;
pub mod transport;

pub use cooldown::{CooldownGate, CooldownPermit};
pub use dispatcher::{AlertDispatcher, preview, render_message};
pub use escalation::{EscalationTargets, SnapshotEscalator};
pub use transport::{AlertTransport, WebhookTarget, WebhookTransport};
