use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use filedrop::cache::CacheDescriptor;
use filedrop::request::Headers;

fn descriptor_new_benchmark(c: &mut Criterion) {
    let modified = UNIX_EPOCH + Duration::from_secs(1_700_000_000);

    c.bench_function("descriptor_new", |b| {
        b.iter(|| CacheDescriptor::new(black_box(modified), black_box(123_456)));
    });
}

fn evaluate_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("descriptor_evaluate");
    let descriptor = CacheDescriptor::new(SystemTime::now(), 8192);

    let cases = [
        ("no_conditionals", "Host: localhost".to_string()),
        (
            "etag_hit",
            format!("Host: localhost\r\nIf-None-Match: {}", descriptor.etag()),
        ),
        (
            "date_hit",
            format!(
                "Host: localhost\r\nIf-Modified-Since: {}",
                descriptor.last_modified()
            ),
        ),
        (
            "both_miss",
            "Host: localhost\r\nIf-None-Match: \"0-0\"\r\nIf-Modified-Since: Thu, 01 Jan 1970 00:00:00 GMT"
                .to_string(),
        ),
    ];

    for (label, lines) in cases.iter() {
        let headers = Headers::parse(&format!("GET /retrieve?name=a HTTP/1.1\r\n{}", lines));
        group.bench_with_input(BenchmarkId::from_parameter(label), &headers, |b, headers| {
            b.iter(|| descriptor.evaluate(black_box(headers)));
        });
    }

    group.finish();
}

fn header_lookup_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("header_lookup");

    for count in [4usize, 16, 64].iter() {
        let mut head = String::from("GET /retrieve?name=a HTTP/1.1");
        for i in 0..*count {
            head.push_str(&format!("\r\nX-Header-{}: value-{}", i, i));
        }
        head.push_str("\r\nIf-None-Match: \"abc-1\"");
        let headers = Headers::parse(&head);

        group.bench_with_input(BenchmarkId::from_parameter(count), &headers, |b, headers| {
            b.iter(|| headers.get(black_box("if-none-match")));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    descriptor_new_benchmark,
    evaluate_benchmark,
    header_lookup_benchmark
);
criterion_main!(benches);
