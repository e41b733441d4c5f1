use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::time::{Duration, Instant};

use crossbeam::channel as cbchan;
use helixrt::prelude::{
    AnonymousConnectable, Connection, Consumer, Disposable, LoopBuilder, Next,
};

fn run_dispatch_burst(total_events: u64) -> Duration {
    let (done_tx, done_rx) = cbchan::bounded::<()>(1);

    let effect_handler: AnonymousConnectable<String, u64> =
        AnonymousConnectable::new(|_output: Consumer<u64>| {
            Connection::new(|_effect: String| {}, || {})
        });

    let target = total_events;
    let event_loop = LoopBuilder::new(
        move |count: &u64, _event: u64| Next::next(count + 1),
        effect_handler,
    )
    .start_from(0u64);

    let _observer = event_loop.add_observer(move |count: u64| {
        if count == target {
            let _ = done_tx.try_send(());
        }
    });

    let start = Instant::now();
    for i in 0..total_events {
        event_loop.dispatch_event(i);
    }
    done_rx
        .recv_timeout(Duration::from_secs(30))
        .expect("loop did not reach the target count");
    let elapsed = start.elapsed();

    event_loop.dispose();
    elapsed
}

pub fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_loop_dispatch");

    for &events in &[10_000_u64, 100_000_u64, 500_000_u64] {
        group.bench_function(BenchmarkId::from_parameter(events), |b| {
            b.iter_custom(|n| {
                let mut total = Duration::ZERO;
                for _ in 0..n {
                    total += run_dispatch_burst(events);
                }
                total
            });
        });
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .warm_up_time(Duration::from_millis(500))
        .measurement_time(Duration::from_secs(3))
        .sample_size(10);
    targets = bench_dispatch
}
criterion_main!(benches);
