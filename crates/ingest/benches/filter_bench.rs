//! 필터 벤치마크
//!
//! 매칭 방식별 단일 규칙 평가와 규칙 수에 따른 엔진 판정 비용을 측정합니다.

use std::sync::Arc;

use chrono::FixedOffset;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use diagpost_ingest::alert::{AlertDispatcher, AlertTransport, WebhookTarget};
use diagpost_ingest::error::IngestError;
use diagpost_ingest::filter::{FilterDocument, FilterEngine, FilterRule, MatchType, RuleKind, RuleMatcher};

/// 아무것도 보내지 않는 전송기
struct NullTransport;

impl AlertTransport for NullTransport {
    async fn send(&self, _target: &WebhookTarget, _text: &str) -> Result<(), IngestError> {
        Ok(())
    }
}

const LINE: &str = "2024-01-15 12:00:00 [INFO] player 1024 entered scene forest_03 (latency 42ms)";

fn engine_with_rules(count: usize) -> FilterEngine<NullTransport> {
    let mut document = FilterDocument::builtin();
    document.alert_config.webhook.clear();
    document.filter_config.rules = (0..count)
        .map(|i| match i % 4 {
            0 => FilterRule::new(format!("c{i}"), MatchType::Contains, format!("token-{i}")),
            1 => FilterRule::new(format!("s{i}"), MatchType::StartsWith, format!("prefix-{i}")),
            2 => FilterRule::new(format!("e{i}"), MatchType::EndsWith, format!("suffix-{i}")),
            _ => FilterRule::new(format!("r{i}"), MatchType::Regex, format!(r"code=\d+-{i}")),
        })
        .collect();

    let dispatcher = Arc::new(AlertDispatcher::new(
        NullTransport,
        FixedOffset::east_opt(0).unwrap(),
    ));
    FilterEngine::with_document("bench.json", document, dispatcher)
}

fn bench_single_rule(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_rule");
    group.throughput(Throughput::Elements(1));

    for (name, match_type, pattern) in [
        ("contains", MatchType::Contains, "SCENE"),
        ("starts_with", MatchType::StartsWith, "2024-01-15"),
        ("ends_with", MatchType::EndsWith, "42MS)"),
        ("regex", MatchType::Regex, r"latency \d+ms"),
    ] {
        let rule = FilterRule::new(name, match_type, pattern);
        let mut matcher = RuleMatcher::new();
        matcher.compile_rule(RuleKind::Filter, &rule).unwrap();

        group.bench_function(name, |b| {
            b.iter(|| matcher.matches(RuleKind::Filter, black_box(&rule), black_box(LINE)))
        });
    }
    group.finish();
}

fn bench_engine_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_process");

    for rule_count in [1usize, 10, 100] {
        let engine = engine_with_rules(rule_count);
        group.throughput(Throughput::Elements(rule_count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rule_count), &rule_count, |b, _| {
            b.iter(|| engine.process(black_box(LINE), "127.0.0.1"))
        });
    }
    group.finish();
}

fn bench_rule_compilation(c: &mut Criterion) {
    let mut group = c.benchmark_group("rule_compilation");
    group.bench_function("compile_100_rules", |b| {
        b.iter(|| black_box(engine_with_rules(100)))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_single_rule,
    bench_engine_scaling,
    bench_rule_compilation
);
criterion_main!(benches);
