//! 이벤트 시스템 벤치마크
//!
//! ScanEvent 생성, 직렬화, broadcast 채널 팬아웃 성능을 측정합니다.

use std::collections::BTreeMap;

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use scanwarden_core::event::{ProgressLevel, ScanEvent};
use scanwarden_core::types::{
    HostInfo, HostState, PortInfo, PortState, ResultStatus, ScanConfig, ScanResult, ScanType,
};

fn create_result(hosts: usize) -> ScanResult {
    let hosts = (0..hosts)
        .map(|i| {
            let mut host = HostInfo::new(format!("10.0.{}.{}", i / 250, i % 250 + 1).parse().unwrap());
            host.state = HostState::Up;
            host.ports = [22u16, 80, 443]
                .iter()
                .map(|port| PortInfo {
                    port: *port,
                    protocol: "tcp".to_owned(),
                    state: PortState::Open,
                    service: "http".to_owned(),
                    version: "nginx 1.25.3".to_owned(),
                    reason: "syn-ack".to_owned(),
                    scripts: BTreeMap::new(),
                })
                .collect();
            host
        })
        .collect();

    ScanResult {
        scan_id: "bench".to_owned(),
        hosts,
        status: ResultStatus::Completed,
        start_time: None,
        end_time: None,
        raw_xml: String::new(),
        scanner_version: Some("7.94".to_owned()),
        scanner_args: None,
        error: None,
    }
}

fn bench_event_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_creation");

    group.bench_function("progress", |b| {
        b.iter(|| {
            ScanEvent::progress(
                black_box("job-1"),
                black_box(42),
                black_box("Nmap scan report for 10.0.0.1"),
                ProgressLevel::Info,
            )
        })
    });

    let config = ScanConfig::new(["10.0.0.0/24"]).with_scan_type(ScanType::Comprehensive);
    group.bench_function("started", |b| {
        b.iter(|| ScanEvent::started(black_box("job-1"), config.clone()))
    });

    let result = create_result(50);
    group.bench_function("completed_50_hosts", |b| {
        b.iter(|| ScanEvent::completed(black_box("job-1"), result.clone()))
    });

    group.finish();
}

fn bench_event_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_serialization");

    let event = ScanEvent::completed("job-1", create_result(50));
    group.throughput(Throughput::Elements(1));
    group.bench_function("completed_to_json", |b| {
        b.iter(|| serde_json::to_string(black_box(&event)).unwrap())
    });

    group.finish();
}

fn bench_broadcast_fanout(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("broadcast_fanout");

    for subscribers in [1usize, 4, 16] {
        group.throughput(Throughput::Elements(100));
        group.bench_function(format!("{subscribers}_subscribers"), |b| {
            b.iter(|| {
                runtime.block_on(async {
                    let (tx, _) = tokio::sync::broadcast::channel(256);
                    let mut receivers: Vec<_> = (0..subscribers).map(|_| tx.subscribe()).collect();
                    for i in 0..100u8 {
                        let _ = tx.send(ScanEvent::progress("job", i, "line", ProgressLevel::Info));
                    }
                    for rx in &mut receivers {
                        while rx.try_recv().is_ok() {}
                    }
                })
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_event_creation,
    bench_event_serialization,
    bench_broadcast_fanout
);
criterion_main!(benches);
