//! 규칙 매칭 로직 -- 문자열 비교 및 정규식 캐싱
//!
//! [`RuleMatcher`]는 필터 규칙과 알림 규칙을 같은 방식으로 평가합니다.
//! 정규식은 설정 로딩 시 한 번만 컴파일하여 `(종류, 규칙 ID)` 키로 캐싱합니다.

use std::collections::HashMap;

use regex::{Regex, RegexBuilder};

use super::types::{FilterRule, MatchType};
use crate::error::IngestError;

/// 정규식 크기 상한 (컴파일 결과)
const MAX_REGEX_SIZE: usize = 1 << 20;

/// 규칙 종류. 같은 ID라도 종류가 다르면 별개의 캐시 항목입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// 필터 규칙
    Filter,
    /// 알림 규칙
    Alert,
}

/// 규칙 매처 -- 정규식 캐시를 소유합니다.
#[derive(Debug)]
pub struct RuleMatcher {
    /// 컴파일된 정규식 캐시: (kind, rule_id) -> Regex
    regex_cache: HashMap<(RuleKind, String), Regex>,
}

impl RuleMatcher {
    /// 새 매처를 생성합니다.
    pub fn new() -> Self {
        Self {
            regex_cache: HashMap::new(),
        }
    }

    /// 활성화된 정규식 규칙을 컴파일하여 캐싱합니다.
    ///
    /// 다른 방식의 규칙이나 비활성 규칙은 아무 일도 하지 않습니다.
    pub fn compile_rule(&mut self, kind: RuleKind, rule: &FilterRule) -> Result<(), IngestError> {
        if !rule.enabled || rule.match_type != MatchType::Regex || rule.pattern.is_empty() {
            return Ok(());
        }

        let regex = RegexBuilder::new(&rule.pattern)
            .case_insensitive(!rule.case_sensitive)
            .size_limit(MAX_REGEX_SIZE)
            .build()?;
        self.regex_cache.insert((kind, rule.id.clone()), regex);
        Ok(())
    }

    /// 규칙이 내용과 매칭되는지 평가합니다.
    ///
    /// 내용이나 패턴이 비어 있으면, 또는 지원하지 않는 방식이면 `false`입니다.
    /// 컴파일되지 않은 정규식 규칙도 `false`입니다.
    pub fn matches(&self, kind: RuleKind, rule: &FilterRule, content: &str) -> bool {
        if content.is_empty() || rule.pattern.is_empty() {
            return false;
        }

        match rule.match_type {
            MatchType::Contains => {
                compare(content, &rule.pattern, rule.case_sensitive, |c, p| c.contains(p))
            }
            MatchType::StartsWith => {
                compare(content, &rule.pattern, rule.case_sensitive, |c, p| c.starts_with(p))
            }
            MatchType::EndsWith => {
                compare(content, &rule.pattern, rule.case_sensitive, |c, p| c.ends_with(p))
            }
            MatchType::Regex => self
                .regex_cache
                .get(&(kind, rule.id.clone()))
                .is_some_and(|regex| regex.is_match(content)),
            MatchType::Unsupported => false,
        }
    }

    /// 캐시된 정규식 수
    pub fn regex_count(&self) -> usize {
        self.regex_cache.len()
    }

    /// 해당 규칙의 정규식이 캐시에 있는지 여부
    pub fn has_regex(&self, kind: RuleKind, rule_id: &str) -> bool {
        self.regex_cache.contains_key(&(kind, rule_id.to_owned()))
    }
}

impl Default for RuleMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// 대소문자 구분 여부에 따라 비교합니다.
fn compare(content: &str, pattern: &str, case_sensitive: bool, op: fn(&str, &str) -> bool) -> bool {
    if case_sensitive {
        op(content, pattern)
    } else {
        op(&fold_case(content), &fold_case(pattern))
    }
}

/// 문자 단위 단순 대문자 변환
///
/// 한 문자가 여러 문자로 펼쳐지는 변환('ß' -> "SS", 'ŉ' -> "ʼN")은 하지 않고 원래 문자를 둡니다.
/// 그래서 'ß'는 "ss"와, 'İ'는 "i"와 같게 취급되지 않습니다.
fn fold_case(s: &str) -> String {
    if s.is_ascii() {
        return s.to_ascii_uppercase();
    }
    s.chars().map(simple_upper).collect()
}

fn simple_upper(c: char) -> char {
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(u), None) => u,
        _ => c,
    }
}
