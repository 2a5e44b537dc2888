//! 알림 전송 계층
//!
//! [`AlertTransport`] trait으로 전송을 추상화하여 디스패처를 네트워크 없이 테스트할 수 있습니다.
//! 기본 구현 [`WebhookTransport`]는 텍스트 메시지를 JSON으로 POST 합니다.
//! 대상에 서명 키가 있으면 `timestamp`와 `sign` 필드를 함께 보냅니다.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;

use crate::error::IngestError;

type HmacSha256 = Hmac<Sha256>;

/// 웹훅 대상: URL과 선택적 서명 키
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookTarget {
    /// 웹훅 URL
    pub url: String,
    /// 서명 키. 비어 있으면 서명하지 않음
    pub secret: String,
}

impl WebhookTarget {
    /// 서명 없는 대상을 만듭니다.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            secret: String::new(),
        }
    }

    /// 서명 키를 지정합니다.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = secret.into();
        self
    }

    /// URL이 비어 있는지
    pub fn is_empty(&self) -> bool {
        self.url.is_empty()
    }
}

/// 알림 전송 trait
pub trait AlertTransport: Send + Sync + 'static {
    /// `target`으로 텍스트 메시지를 전송합니다.
    ///
    /// # Errors
    ///
    /// 연결 실패, 타임아웃, 2xx가 아닌 응답은 `IngestError::Transport`입니다.
    fn send(
        &self,
        target: &WebhookTarget,
        text: &str,
    ) -> impl Future<Output = Result<(), IngestError>> + Send;
}

impl<T: AlertTransport> AlertTransport for Arc<T> {
    fn send(
        &self,
        target: &WebhookTarget,
        text: &str,
    ) -> impl Future<Output = Result<(), IngestError>> + Send {
        (**self).send(target, text)
    }
}

/// 웹훅 서명: `"{timestamp}\n{secret}"`을 키로 한 빈 메시지의 HMAC-SHA256, base64 인코딩
pub fn sign(timestamp: i64, secret: &str) -> Result<String, IngestError> {
    let key = format!("{timestamp}\n{secret}");
    let mac = HmacSha256::new_from_slice(key.as_bytes()).map_err(|e| IngestError::Transport {
        reason: format!("failed to sign webhook payload: {e}"),
    })?;
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// 웹훅 텍스트 메시지 전송기
#[derive(Debug, Clone)]
pub struct WebhookTransport {
    client: reqwest::Client,
}

impl WebhookTransport {
    /// 요청 타임아웃을 지정하여 전송기를 만듭니다.
    pub fn new(timeout: Duration) -> Result<Self, IngestError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IngestError::Transport {
                reason: format!("failed to build http client: {e}"),
            })?;
        Ok(Self { client })
    }

    /// 텍스트 메시지 페이로드: `{"msg_type":"text","content":{"text":...}}`
    ///
    /// `secret`이 비어 있지 않으면 `timestamp`(유닉스 초, 문자열)와 `sign`을 추가합니다.
    pub fn payload(
        text: &str,
        secret: &str,
        timestamp: i64,
    ) -> Result<serde_json::Value, IngestError> {
        let mut payload = json!({
            "msg_type": "text",
            "content": { "text": text },
        });
        if !secret.is_empty() {
            payload["timestamp"] = json!(timestamp.to_string());
            payload["sign"] = json!(sign(timestamp, secret)?);
        }
        Ok(payload)
    }
}

impl AlertTransport for WebhookTransport {
    async fn send(&self, target: &WebhookTarget, text: &str) -> Result<(), IngestError> {
        let payload = Self::payload(text, &target.secret, Utc::now().timestamp())?;
        let response = self
            .client
            .post(&target.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| IngestError::Transport {
                reason: format!("request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Transport {
                reason: format!("webhook responded with status {status}"),
            });
        }

        tracing::debug!(status = %status, signed = !target.secret.is_empty(), "webhook delivered");
        Ok(())
    }
}
