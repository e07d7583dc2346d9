use criterion::{black_box, criterion_group, criterion_main, Criterion};

use flow_core::cache::FileCache;
use flow_core::hash::content_fingerprint;

// ---------------------------------------------------------------------------
// Extraction benchmarks
// ---------------------------------------------------------------------------

const SMALL_MODULE: &str = r#"
class ApiError(Exception):
    pass


def validate(payload):
    if not payload:
        raise ApiError("empty payload")
    return payload


def handle_request(payload):
    data = validate(payload)
    return data
"#;

fn bench_extract_small_module(c: &mut Criterion) {
    c.bench_function("extract_small_module", |b| {
        b.iter(|| {
            flow_extract::extractor::extract(black_box(SMALL_MODULE.as_bytes()), "bench.py", "bench.py")
        })
    });
}

fn bench_extract_large_module(c: &mut Criterion) {
    let mut large = String::new();
    for i in 0..200 {
        large.push_str(&format!(
            "def f{i}():\n    if f{i} % 2:\n        raise ValueError('e{i}')\n    return {i}\n\n\n"
        ));
    }
    c.bench_function("extract_large_module_200_functions", |b| {
        b.iter(|| flow_extract::extractor::extract(black_box(large.as_bytes()), "bench.py", "bench.py"))
    });
}

fn bench_content_fingerprint(c: &mut Criterion) {
    let source = SMALL_MODULE.repeat(20);
    c.bench_function("content_fingerprint", |b| {
        b.iter(|| content_fingerprint(black_box(source.as_bytes())))
    });
}

// ---------------------------------------------------------------------------
// Cache benchmarks
// ---------------------------------------------------------------------------

fn bench_cache_put_and_get(c: &mut Criterion) {
    let extraction = flow_extract::extractor::extract(SMALL_MODULE.as_bytes(), "bench.py", "bench.py");
    let cache = FileCache::in_memory().expect("in-memory cache");

    c.bench_function("cache_put", |b| {
        b.iter(|| {
            cache.put(black_box("bench.py"), black_box(1), black_box(256), black_box("fp"), black_box(&extraction))
        })
    });

    cache.put("bench.py", 1, 256, "fp", &extraction);
    c.bench_function("cache_get_hit", |b| {
        b.iter(|| cache.get(black_box("bench.py"), black_box(1), black_box(256)))
    });
}

// ---------------------------------------------------------------------------
// Propagation benchmarks
// ---------------------------------------------------------------------------

fn build_chain_model(depth: usize) -> flow_core::types::ProgramModel {
    let mut src = String::from("def f0():\n    raise ValueError('base')\n\n\n");
    for i in 1..depth {
        src.push_str(&format!("def f{i}():\n    f{}()\n\n\n", i - 1));
    }
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("chain.py"), &src).unwrap();
    flow_analyze::builder::build(dir.path(), &[])
}

fn bench_propagate_long_chain(c: &mut Criterion) {
    let model = build_chain_model(50);
    c.bench_function("propagate_exceptions_chain_50", |b| {
        b.iter(|| {
            let mut ctx = flow_analyze::context::AnalysisContext::new();
            flow_analyze::propagate::propagate_exceptions(
                black_box(&model),
                &mut ctx,
                flow_core::config::ResolutionMode::Default,
                false,
                None,
                None,
            )
        })
    });
}

fn build_fanout_model(width: usize) -> flow_core::types::ProgramModel {
    let mut src = String::new();
    for i in 0..width {
        src.push_str(&format!("def leaf{i}():\n    raise ValueError('e{i}')\n\n\n"));
    }
    src.push_str("def dispatch():\n");
    for i in 0..width {
        src.push_str(&format!("    leaf{i}()\n"));
    }
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("fanout.py"), &src).unwrap();
    flow_analyze::builder::build(dir.path(), &[])
}

fn bench_propagate_wide_fanout(c: &mut Criterion) {
    let model = build_fanout_model(50);
    c.bench_function("propagate_exceptions_fanout_50", |b| {
        b.iter(|| {
            let mut ctx = flow_analyze::context::AnalysisContext::new();
            flow_analyze::propagate::propagate_exceptions(
                black_box(&model),
                &mut ctx,
                flow_core::config::ResolutionMode::Default,
                false,
                None,
                None,
            )
        })
    });
}

criterion_group!(
    benches,
    bench_extract_small_module,
    bench_extract_large_module,
    bench_content_fingerprint,
    bench_cache_put_and_get,
    bench_propagate_long_chain,
    bench_propagate_wide_fanout,
);
criterion_main!(benches);
