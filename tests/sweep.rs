#![cfg(unix)]

use anyhow::Result;
use approx::assert_relative_eq;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tiletune::autotune::{CandidateStatus, MetricKeys, SweepReport};
use tiletune::codegen::{Template, DEFAULT_PLACEHOLDER};
use tiletune::driver::{CandidateEncoding, Sweep, SweepOutcome, SweepOutput};
use tiletune::runner::{
    BuildDriver, CancelToken, ScratchPaths, ToolCommand, Watchdog, WatchdogOptions,
};
use tiletune::space::{ParamRange, SearchProfile};
use tokio::runtime::Runtime;

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quirk {
    /// The compiler rejects the candidate.
    CompileError,
    /// The built candidate touches the toolchain's marker file, then never exits.
    Hang,
    /// The built candidate prints output the metric parser cannot read.
    Garbled,
}

/// Fake toolchain: the translator copies, the compiler emits a script that
/// prints metrics keyed on the candidate's block width. `quirks` give block
/// widths that misbehave.
struct Toolchain {
    translator: ToolCommand,
    compiler: ToolCommand,
    marker: PathBuf,
}

impl Toolchain {
    fn new(dir: &Path, quirks: &[(u32, Quirk)]) -> Self {
        let otsc = script(dir, "otsc", r#"cp "$2" "$4""#);
        let marker = dir.join("candidate-running");

        let mut cases = String::new();
        for (x, quirk) in quirks {
            let action = match quirk {
                Quirk::CompileError => {
                    "echo \"ptxas error: too many resources\" >&2; exit 2".to_string()
                }
                Quirk::Hang => format!(
                    "printf '#!/bin/sh\\ntouch \"{}\"\\nexec sleep 30\\n' > \"$out\"; \
                     chmod +x \"$out\"; exit 0",
                    marker.display()
                ),
                Quirk::Garbled => "printf '#!/bin/sh\\necho \"Elapsed: fast\"\\n' > \"$out\"; \
                                   chmod +x \"$out\"; exit 0"
                    .to_string(),
            };
            cases.push_str(&format!("  {x}) {action} ;;\n"));
        }
        cases.push_str("  32) e=1.0; g=10.0 ;;\n  64) e=0.5; g=20.0 ;;\n  *) e=2.0; g=5.0 ;;\n");

        let body = format!(
            r#"in=$1; out=$2
x=$(sed -n 's/.*block:\([0-9]*\),.*/\1/p' "$in")
case "$x" in
{cases}esac
printf '#!/bin/sh\necho "Elapsed: %s"\necho "GFlops: %s"\necho "CPU Elapsed: %s"\n' \
    "$e" "$g" "$e" > "$out"
chmod +x "$out""#
        );
        let nvcc = script(dir, "nvcc", &body);

        Self {
            translator: ToolCommand::new(
                otsc.display().to_string(),
                ["-c", "{input}", "-o", "{output}"],
            ),
            compiler: ToolCommand::new(nvcc.display().to_string(), ["{input}", "{output}"]),
            marker,
        }
    }
}

/// 2-D profile with the given block widths and every other dimension fixed.
fn profile(widths: ParamRange) -> SearchProfile {
    let mut profile = SearchProfile::tile_search(2).unwrap();
    profile.set_range("x", widths).unwrap();
    for name in ["y", "t", "ey"] {
        let value = if name == "y" { 4 } else { 1 };
        profile.set_range(name, ParamRange::single(value)).unwrap();
    }
    profile
}

fn two_candidate_profile() -> SearchProfile {
    profile(ParamRange::new(32, 64, 32).unwrap())
}

fn sweep_with(
    dir: &Path,
    rt: &Runtime,
    toolchain: Toolchain,
    profile: SearchProfile,
    timeout: Duration,
    cancel: CancelToken,
) -> Sweep {
    let template = Template::new(
        format!("// stencil\n#pragma overtile {DEFAULT_PLACEHOLDER}\nvoid step() {{}}\n"),
        DEFAULT_PLACEHOLDER,
    )
    .unwrap();
    Sweep::new(
        profile,
        CandidateEncoding::Template(template),
        BuildDriver::new(toolchain.compiler).with_translator(toolchain.translator),
        Watchdog::new(WatchdogOptions { timeout }, rt.handle().clone()),
        MetricKeys::tile_search().with_throughput_key("GFlops"),
        cancel,
    )
    .with_scratch(ScratchPaths::in_dir(&dir.join("scratch"), "tiletune-search"))
}

fn sweep(dir: &Path, rt: &Runtime, toolchain: Toolchain, timeout: Duration) -> Sweep {
    sweep_with(
        dir,
        rt,
        toolchain,
        two_candidate_profile(),
        timeout,
        CancelToken::new(),
    )
}

fn run(sweep: Sweep) -> Result<(SweepOutcome, String, String)> {
    let mut data = Vec::new();
    let mut diagnostics = Vec::new();
    let outcome = sweep.run(&mut SweepOutput::new(&mut data, &mut diagnostics))?;
    Ok((outcome, String::from_utf8(data)?, String::from_utf8(diagnostics)?))
}

#[test]
fn sweep_reports_best_of_two_candidates() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let rt = runtime();
    let toolchain = Toolchain::new(dir.path(), &[]);

    let timeout = Duration::from_secs(10);
    let (outcome, data, diagnostics) = run(sweep(dir.path(), &rt, toolchain, timeout))?;

    let summary = outcome.summary();
    assert_relative_eq!(summary.min_elapsed, 0.5);
    assert_relative_eq!(summary.max_throughput, 20.0);
    assert_eq!(summary.succeeded, 2);

    let rows: Vec<_> = data.lines().skip(1).collect();
    assert_eq!(
        data.lines().next(),
        Some("x,y,z,t,ex,ey,ez,gflops,cpu_elapsed,compute_elapsed,")
    );
    assert_eq!(rows.len(), 2);
    assert!(rows[1].starts_with("64,4,1,1,1,1,1,20.000000,0.500000,"));

    assert!(diagnostics.contains("Num Configs: 2"));
    assert!(diagnostics.contains("Max GFlops:   20.000000"));
    // 6000^2 * 1000 / 1e9 = 36 units of work over 0.5 s.
    assert!(diagnostics.contains("Max Total GFlops: 72.000000"));
    Ok(())
}

#[test]
fn compile_failure_is_recorded_and_skipped() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let rt = runtime();
    let toolchain = Toolchain::new(dir.path(), &[(32, Quirk::CompileError)]);

    let timeout = Duration::from_secs(10);
    let (outcome, data, diagnostics) = run(sweep(dir.path(), &rt, toolchain, timeout))?;

    let results = outcome.aggregator.results();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].status, CandidateStatus::CompileFailed);
    assert!(results[0].metrics.is_none());
    assert_eq!(results[1].status, CandidateStatus::Success);

    let summary = outcome.summary();
    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failures_of(CandidateStatus::CompileFailed), 1);

    assert_eq!(data.lines().count(), 2);
    assert!(!data.contains("\n32,"));
    assert!(diagnostics.contains("Run error! (compile-failed)"));
    assert!(diagnostics.contains("Successes: 1 of 2 attempted (1 compile-failed)"));
    Ok(())
}

#[test]
fn hanging_candidate_times_out_and_sweep_continues() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let rt = runtime();
    let toolchain = Toolchain::new(dir.path(), &[(32, Quirk::Hang)]);

    let started = Instant::now();
    let (outcome, data, _) = run(sweep(dir.path(), &rt, toolchain, Duration::from_secs(1)))?;

    assert!(started.elapsed() < Duration::from_secs(15));
    let results = outcome.aggregator.results();
    assert_eq!(results[0].status, CandidateStatus::TimedOut);
    assert_eq!(results[1].status, CandidateStatus::Success);
    assert_eq!(data.lines().count(), 2);
    Ok(())
}

#[test]
fn unreadable_output_is_a_parse_failure() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let rt = runtime();
    let toolchain = Toolchain::new(dir.path(), &[(32, Quirk::Garbled)]);

    let timeout = Duration::from_secs(10);
    let (outcome, data, diagnostics) = run(sweep(dir.path(), &rt, toolchain, timeout))?;

    let results = outcome.aggregator.results();
    assert_eq!(results[0].status, CandidateStatus::ParseFailed);
    assert!(results[0].metrics.is_none());
    assert_eq!(results[1].status, CandidateStatus::Success);

    let rows: Vec<_> = data.lines().skip(1).collect();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].starts_with("64,"));
    assert!(diagnostics.contains("Run error! (parse-failed)"));
    assert_relative_eq!(outcome.summary().max_throughput, 20.0);
    Ok(())
}

#[test]
fn cancel_mid_sweep_keeps_completed_results() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let rt = runtime();
    let toolchain = Toolchain::new(dir.path(), &[(64, Quirk::Hang)]);
    let marker = toolchain.marker.clone();
    let cancel = CancelToken::new();

    let trigger = cancel.clone();
    let watcher = thread::spawn(move || {
        while !marker.exists() {
            thread::sleep(Duration::from_millis(10));
        }
        trigger.cancel();
    });

    let started = Instant::now();
    let (outcome, data, diagnostics) = run(sweep_with(
        dir.path(),
        &rt,
        toolchain,
        profile(ParamRange::new(32, 96, 32)?),
        Duration::from_secs(30),
        cancel,
    ))?;
    watcher.join().unwrap();

    assert!(started.elapsed() < Duration::from_secs(15));
    assert!(outcome.cancelled);
    let results = outcome.aggregator.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, CandidateStatus::Success);
    assert_eq!(data.lines().count(), 2);

    assert!(diagnostics.contains("Running [64, 4, 1, 1, 1, 1, 1] (2 of 3)"));
    assert!(!diagnostics.contains("(3 of 3)"));
    assert!(diagnostics.contains("Premature ABORT!"));
    assert!(diagnostics.contains("Min Elapsed:  1.000000"));
    assert!(diagnostics.contains("Max GFlops:   10.000000"));
    assert!(outcome.report().cancelled);
    Ok(())
}

#[test]
fn total_failure_reports_sentinels() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let rt = runtime();
    let mut toolchain = Toolchain::new(dir.path(), &[]);
    toolchain.translator = ToolCommand::new("false", Vec::<String>::new());

    let timeout = Duration::from_secs(10);
    let (outcome, data, diagnostics) = run(sweep(dir.path(), &rt, toolchain, timeout))?;

    assert!(!outcome.summary().has_successes());
    assert_eq!(outcome.summary().failures_of(CandidateStatus::TranslateFailed), 2);
    assert_eq!(data.lines().count(), 1);
    assert!(diagnostics.contains("Min Elapsed:  100000.000000"));
    assert!(diagnostics.contains("Max GFlops:   0.000000"));
    assert!(diagnostics.contains("Best: none"));
    Ok(())
}

#[test]
fn report_on_disk_resumes_the_sweep() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let rt = runtime();

    let (full, _, _) = run(sweep(
        dir.path(),
        &rt,
        Toolchain::new(dir.path(), &[]),
        Duration::from_secs(10),
    ))?;

    let mut partial = full.report();
    partial.results.truncate(1);
    partial.cancelled = true;
    let path = dir.path().join("reports").join("partial.json");
    partial.save_to_file(&path)?;

    let resumed = sweep(
        dir.path(),
        &rt,
        Toolchain::new(dir.path(), &[]),
        Duration::from_secs(10),
    )
    .resume_from(SweepReport::load_from_file(&path)?)?;
    let (outcome, _, diagnostics) = run(resumed)?;

    assert!(diagnostics.contains("Resuming at candidate 2 of 2"));
    assert_eq!(outcome.aggregator.results(), full.aggregator.results());
    assert_eq!(outcome.summary(), full.summary());
    Ok(())
}
