//! 알림 쿨다운 게이트
//!
//! 규칙 ID별 마지막 성공 전송 시각을 메모리에 보관합니다 (재시작 시 초기화).
//! 같은 규칙의 동시 매칭이 둘 다 게이트를 통과하지 않도록 전송 중 집합도 함께 관리합니다.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Default)]
struct CooldownState {
    /// rule_id -> 마지막 성공 전송 시각
    last_fired: HashMap<String, Instant>,
    /// 현재 전송 중인 rule_id
    in_flight: HashSet<String>,
}

/// 규칙 ID 기준 쿨다운 게이트
#[derive(Debug, Default)]
pub struct CooldownGate {
    state: Mutex<CooldownState>,
}

impl CooldownGate {
    /// 빈 게이트를 만듭니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 규칙이 지금 전송 가능한지 확인하고, 가능하면 전송 권한을 얻습니다.
    ///
    /// 이전 성공이 없거나 경과 시간이 `cooldown` 이상이면 전송 가능합니다.
    /// 같은 규칙이 이미 전송 중이면 `None`입니다.
    pub fn try_acquire(&self, rule_id: &str, cooldown: Duration) -> Option<CooldownPermit<'_>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if state.in_flight.contains(rule_id) {
            return None;
        }
        if let Some(last) = state.last_fired.get(rule_id)
            && last.elapsed() < cooldown
        {
            return None;
        }

        state.in_flight.insert(rule_id.to_owned());
        Some(CooldownPermit {
            gate: self,
            rule_id: rule_id.to_owned(),
            succeeded: false,
        })
    }

    /// 규칙의 마지막 성공 전송 시각
    pub fn last_fired(&self, rule_id: &str) -> Option<Instant> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_fired
            .get(rule_id)
            .copied()
    }

    /// 한 번이라도 성공한 규칙 수
    pub fn tracked_rules(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_fired
            .len()
    }

    fn release(&self, rule_id: &str, succeeded: bool) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.in_flight.remove(rule_id);
        if succeeded {
            state.last_fired.insert(rule_id.to_owned(), Instant::now());
        }
    }
}

/// 전송 권한. 해제될 때 전송 중 표시를 지우고, 성공했으면 시각을 기록합니다.
#[derive(Debug)]
pub struct CooldownPermit<'a> {
    gate: &'a CooldownGate,
    rule_id: String,
    succeeded: bool,
}

impl CooldownPermit<'_> {
    /// 전송 성공으로 표시합니다.
    pub fn succeed(mut self) {
        self.succeeded = true;
    }
}

impl Drop for CooldownPermit<'_> {
    fn drop(&mut self) {
        self.gate.release(&self.rule_id, self.succeeded);
    }
}
