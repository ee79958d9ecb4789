use std::env;
use std::hint::black_box;
use std::process;
use std::time::Instant;

use simd_bottom::{
    Bottom, BottomSearch, DEFAULT_CAPACITY, SimdLevel, Strategy, bottom_scalar, bottom_vectorized,
    find_bottom,
};
use tracing::info;

const DEFAULT_SEED: u64 = 0x1234_5678_9ABC_DEF0;

#[derive(Clone, Copy)]
enum Bench {
    BottomScalar,
    BottomVectorized,
    FindBottom,
    FindBottomScratch,
}

#[derive(Clone, Copy)]
struct Config {
    bench: Bench,
    len: usize,
    iters: usize,
    seed: u64,
    verify: bool,
    report: bool,
}

const BENCHES: &[Bench] = &[
    Bench::BottomScalar,
    Bench::BottomVectorized,
    Bench::FindBottom,
    Bench::FindBottomScratch,
];

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = match parse_args() {
        Ok(result) => result,
        Err(err) => {
            eprintln!("error: {err}");
            print_usage(&program_name());
            process::exit(2);
        }
    };

    let strategy = Strategy::detected();
    info!(
        strategy = strategy.name(),
        lanes = strategy.lanes(),
        "bottom search strategy"
    );

    if config.verify {
        if let Err(err) = verify_bench(config) {
            eprintln!("verify failed: {err}");
            process::exit(1);
        }
        info!(bench = config.bench.name(), "verified against scalar scan");
    }

    run_bench(config);
}

fn parse_args() -> Result<Config, String> {
    let mut args = env::args();
    let program = args.next().unwrap_or_else(|| "perf_harness".to_string());

    let mut bench = None;
    let mut len = DEFAULT_CAPACITY;
    let mut iters = 1_000_000;
    let mut seed = DEFAULT_SEED;
    let mut verify = false;
    let mut report = true;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bench" => {
                let name = args.next().ok_or("--bench requires a value")?;
                let parsed = parse_bench(&name).ok_or_else(|| format!("unknown bench: {name}"))?;
                bench = Some(parsed);
            }
            "--len" => {
                let value = args.next().ok_or("--len requires a value")?;
                len = parse_usize(&value, "--len")?;
            }
            "--iters" => {
                let value = args.next().ok_or("--iters requires a value")?;
                iters = parse_usize(&value, "--iters")?;
            }
            "--seed" => {
                let value = args.next().ok_or("--seed requires a value")?;
                seed = parse_u64(&value, "--seed")?;
            }
            "--verify" => verify = true,
            "--report" => report = true,
            "--no-report" => report = false,
            "--list" => {
                list_benches();
                process::exit(0);
            }
            "-h" | "--help" => {
                print_usage(&program);
                process::exit(0);
            }
            _ => return Err(format!("unknown argument: {arg}")),
        }
    }

    let bench = bench.ok_or("missing --bench")?;
    if len > DEFAULT_CAPACITY {
        return Err(format!("--len must be at most {DEFAULT_CAPACITY}"));
    }

    Ok(Config {
        bench,
        len,
        iters,
        seed,
        verify,
        report,
    })
}

fn program_name() -> String {
    env::args()
        .next()
        .unwrap_or_else(|| "perf_harness".to_string())
}

fn print_usage(program: &str) {
    eprintln!(
        "\
Usage:
  {program} --bench <name> [--len N] [--iters N] [--seed N] [--verify]
  {program} --list

Options:
  --bench <name>   Benchmark to run (see --list)
  --len N          Batch length, at most {DEFAULT_CAPACITY} (default: {DEFAULT_CAPACITY})
  --iters N        Iterations (default: 1000000)
  --seed N         RNG seed (default: 0x123456789ABCDEF0)
  --verify         Check the bench against the scalar scan before timing
  --report         Print throughput summary after the run (default)
  --no-report      Disable throughput summary
  --list           Show available benches

Environment:
  RUST_LOG=debug          Log strategy selection
  BOTTOM_AVX512=1         Prefer AVX-512 over AVX2
  BOTTOM_FORCE_SCALAR=1   Route find_bottom through the scalar scan
"
    );
}

fn list_benches() {
    for bench in BENCHES {
        println!("{}", bench.name());
    }
}

fn parse_bench(name: &str) -> Option<Bench> {
    BENCHES.iter().copied().find(|bench| bench.name() == name)
}

impl Bench {
    fn name(self) -> &'static str {
        match self {
            Bench::BottomScalar => "bottom_scalar",
            Bench::BottomVectorized => "bottom_vectorized",
            Bench::FindBottom => "find_bottom",
            Bench::FindBottomScratch => "find_bottom_scratch",
        }
    }
}

fn parse_usize(value: &str, flag: &str) -> Result<usize, String> {
    value
        .parse::<usize>()
        .map_err(|_| format!("{flag} expects a non-negative integer"))
}

fn parse_u64(value: &str, flag: &str) -> Result<u64, String> {
    value
        .parse::<u64>()
        .map_err(|_| format!("{flag} expects a non-negative integer"))
}

#[inline]
fn next_u64(state: &mut u64) -> u64 {
    let mut x = *state;
    x ^= x >> 12;
    x ^= x << 25;
    x ^= x >> 27;
    *state = x;
    x.wrapping_mul(0x2545_F491_4F6C_DD1D)
}

fn make_samples(len: usize, seed: u64) -> Vec<f32> {
    let mut state = seed;
    let mut values = Vec::with_capacity(len);
    for _ in 0..len {
        let unit = (next_u64(&mut state) >> 40) as f32 / (1u32 << 24) as f32;
        values.push(unit * 2000.0 - 1000.0);
    }
    values
}

fn run_bench(config: Config) {
    let start = Instant::now();
    match config.bench {
        Bench::BottomScalar => bench_kernel(config, bottom_scalar),
        Bench::BottomVectorized => bench_kernel(config, bottom_vectorized),
        Bench::FindBottom => bench_find_bottom(config),
        Bench::FindBottomScratch => bench_find_bottom_scratch(config),
    }
    let elapsed = start.elapsed();
    if config.report {
        print_report(&config, elapsed);
    }
}

fn print_report(config: &Config, elapsed: std::time::Duration) {
    let work_items = (config.len as u128) * (config.iters as u128);
    let elapsed_s = elapsed.as_secs_f64();
    let items_per_s = work_items as f64 / elapsed_s;
    let ns_per_call = (elapsed_s * 1.0e9) / config.iters.max(1) as f64;

    let lines = [
        format!(
            "bench={} len={} iters={} strategy={}",
            config.bench.name(),
            config.len,
            config.iters,
            Strategy::detected().name()
        ),
        format!(
            "elapsed_s={:.6} ns_per_call={:.3} throughput={}",
            elapsed_s,
            ns_per_call,
            format_rate(items_per_s, "elem")
        ),
        format!(
            "bytes={} byte_throughput={}",
            work_items * 4,
            format_rate(items_per_s * 4.0, "B")
        ),
    ];

    println!("{}", lines.join("\n"));
}

fn format_rate(rate: f64, unit: &str) -> String {
    let (value, prefix) = if rate >= 1.0e12 {
        (rate / 1.0e12, "T")
    } else if rate >= 1.0e9 {
        (rate / 1.0e9, "G")
    } else if rate >= 1.0e6 {
        (rate / 1.0e6, "M")
    } else if rate >= 1.0e3 {
        (rate / 1.0e3, "K")
    } else {
        (rate, "")
    };
    format!("{value:.3} {prefix}{unit}/s")
}

fn same_bottom(a: Option<Bottom>, b: Option<Bottom>) -> bool {
    a.map(|x| (x.value_bits(), x.index)) == b.map(|x| (x.value_bits(), x.index))
}

fn verify_bench(config: Config) -> Result<(), String> {
    let samples = make_samples(config.len, config.seed);
    let expected = bottom_scalar(&samples);

    let actual = match config.bench {
        Bench::BottomScalar => expected,
        Bench::BottomVectorized => bottom_vectorized(&samples),
        Bench::FindBottom => find_bottom(&samples).ok(),
        Bench::FindBottomScratch => {
            let search = BottomSearch::default();
            let mut scratch = search.scratch();
            search.find_with(&mut scratch, &samples).ok()
        }
    };
    if !same_bottom(actual, expected) {
        return Err(format!("expected {expected:?}, got {actual:?}"));
    }

    // Cross-check every vector level the CPU offers, not only the detected one.
    for level in [
        SimdLevel::Sse41,
        SimdLevel::Avx2,
        SimdLevel::Avx512,
        SimdLevel::Neon,
    ] {
        if let Some(strategy) = Strategy::vectorized(level) {
            let actual = strategy.reduce(&samples);
            if !same_bottom(actual, expected) {
                return Err(format!("{}: expected {expected:?}, got {actual:?}", level.name()));
            }
        }
    }
    Ok(())
}

fn bench_kernel(config: Config, func: fn(&[f32]) -> Option<Bottom>) {
    let input = make_samples(config.len, config.seed);
    let mut acc = 0usize;
    for _ in 0..config.iters {
        if let Some(bottom) = func(black_box(&input)) {
            acc ^= bottom.index;
        }
    }
    black_box(acc);
}

fn bench_find_bottom(config: Config) {
    let input = make_samples(config.len, config.seed);
    let mut acc = 0usize;
    for _ in 0..config.iters {
        if let Ok(bottom) = find_bottom(black_box(&input)) {
            acc ^= bottom.index;
        }
    }
    black_box(acc);
}

fn bench_find_bottom_scratch(config: Config) {
    let input = make_samples(config.len, config.seed);
    let search = BottomSearch::default();
    let mut scratch = search.scratch();
    let mut acc = 0usize;
    for _ in 0..config.iters {
        if let Ok(bottom) = search.find_with(&mut scratch, black_box(&input)) {
            acc ^= bottom.index;
        }
    }
    black_box(acc);
}
