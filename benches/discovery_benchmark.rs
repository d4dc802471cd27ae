use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cldisco::driver::{ScriptedDevice, ScriptedDriver, ScriptedPlatform};
use cldisco::{classify_device_type, DeviceType, DiscoveryConfig, DriverContext, TextReporter};

fn scripted_context() -> DriverContext<ScriptedDriver> {
    let mut driver = ScriptedDriver::new();
    for p in 0..4 {
        let mut platform = ScriptedPlatform::new(&format!("platform-{p}"), "bench");
        for d in 0..8 {
            platform = platform.with_device(ScriptedDevice::new(
                &format!("device-{p}-{d}"),
                if d % 2 == 0 { DeviceType::GPU } else { DeviceType::CPU },
                1 << 32,
            ));
        }
        driver = driver.with_platform(platform);
    }
    DriverContext::with_api(driver)
}

pub fn bench_collect(c: &mut Criterion) {
    let context = scripted_context();
    c.bench_function("collect_scripted_4x8", |b| {
        b.iter(|| {
            context.api().clear_calls();
            context.enumerator(DiscoveryConfig::default()).collect()
        })
    });
}

pub fn bench_text_report(c: &mut Criterion) {
    let context = scripted_context();
    c.bench_function("stream_text_scripted_4x8", |b| {
        b.iter(|| {
            context.api().clear_calls();
            let mut reporter = TextReporter::new(Vec::with_capacity(8192), Default::default());
            let _ = context.enumerator(DiscoveryConfig::default()).run(&mut reporter);
            reporter.into_inner()
        })
    });
}

pub fn bench_classify(c: &mut Criterion) {
    c.bench_function("classify_all_masks", |b| {
        b.iter(|| {
            for mask in 0u64..32 {
                black_box(classify_device_type(DeviceType(black_box(mask))));
            }
        })
    });
}

criterion_group!(benches, bench_collect, bench_text_report, bench_classify);
criterion_main!(benches);
