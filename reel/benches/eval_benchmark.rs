use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pprof::criterion::{Output, PProfProfiler};
use rand::{seq::SliceRandom, thread_rng, Rng};

use reel::{
    builtins::math,
    env::Env,
    interpreter::eval_with_env,
    number::{self, ratio, Number},
    value::Value,
};
use tap::Tap;

// generate rand

fn generate_rand_ratios(size: usize) -> Vec<Number> {
    let mut rng = thread_rng();
    (0..size)
        .map(|_| ratio(rng.gen_range(-10_000..10_000), rng.gen_range(1..2_000)))
        .collect()
}

/// Frame rates that show up in real footage, shuffled.
fn timebases(size: usize) -> Vec<Number> {
    let common = [
        ratio(24000, 1001),
        number::int(24),
        number::int(25),
        ratio(30000, 1001),
        number::int(30),
        ratio(60000, 1001),
    ];
    common
        .iter()
        .cycle()
        .take(size)
        .cloned()
        .collect::<Vec<_>>()
        .tap_mut(|v| v.shuffle(&mut thread_rng()))
}

// bench

fn native_sum(numbers: &[Value]) -> Value {
    math::add(numbers).unwrap_or(Value::Void)
}

fn to_frames(seconds: &[Number], timebases: &[Number]) -> Vec<Number> {
    seconds
        .iter()
        .zip(timebases)
        .map(|(s, tb)| number::seconds_to_frames(s, tb))
        .collect()
}

const LOOP: &str = "
(define (loop n acc)
  (if (= n 0) acc (loop (- n 1) (+ acc 1/3))))
(loop 2000 0)";

const FIB: &str = "
(define (fib n)
  (if (< n 2) n (+ (fib (- n 1)) (fib (- n 2)))))
(fib 15)";

pub fn criterion_benchmark(c: &mut Criterion) {
    const N: usize = 10000;
    let ratios = generate_rand_ratios(N);
    let values: Vec<Value> = ratios.iter().cloned().map(Value::Number).collect();
    let tbs = timebases(N);

    c.bench_function("native_sum", |b| b.iter(|| native_sum(black_box(&values))));
    c.bench_function("seconds_to_frames", |b| {
        b.iter(|| to_frames(black_box(&ratios), &tbs))
    });
    c.bench_function("tail_loop", |b| {
        b.iter(|| eval_with_env(black_box(LOOP), Env::new_global_rc()))
    });
    c.bench_function("fib", |b| {
        b.iter(|| eval_with_env(black_box(FIB), Env::new_global_rc()))
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().with_profiler(PProfProfiler::new(100, Output::Flamegraph(None)));
    targets = criterion_benchmark
}

criterion_main!(benches);
