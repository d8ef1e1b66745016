//! CLI wiring for tiletune.

use crate::output::{OutputRouting, SweepOutput};
use crate::suite::CheckSuite;
use crate::sweep::{CandidateEncoding, Sweep};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tiletune_autotune::{MetricKeys, SweepReport};
use tiletune_codegen::{Template, DEFAULT_DEFINE_PREFIX, DEFAULT_PLACEHOLDER};
use tiletune_runner::{
    BuildDriver, CancelToken, ScratchPaths, ToolCommand, Watchdog, WatchdogOptions,
};
use tiletune_space::{ParamRange, SearchProfile, SpaceError};
use tokio::runtime::Runtime;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "tiletune",
    about = "Tile-size autotuning harness for generated stencil kernels"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search GPU tile sizes by substituting them into a kernel template.
    TileSearch {
        /// Problem dimensionality (2 or 3).
        dimension: u32,
        /// Kernel template containing the placeholder exactly once.
        template: PathBuf,
        /// GPU architecture passed to the compiler, e.g. sm_20.
        arch: String,
        #[arg(long, default_value = DEFAULT_PLACEHOLDER)]
        placeholder: String,
        /// Translator command template.
        #[arg(long)]
        translator: Option<ToolCommand>,
        /// Compiler command template.
        #[arg(long)]
        compiler: Option<ToolCommand>,
        #[arg(long)]
        throughput_key: Option<String>,
        #[arg(long)]
        problem_size: Option<u32>,
        #[arg(long)]
        time_steps: Option<u32>,
        #[command(flatten)]
        sweep: SweepArgs,
    },
    /// Sweep CPU tile sizes passed to a fixed kernel as preprocessor defines.
    CpuSweep {
        /// Problem dimensionality (1, 2 or 3).
        dimensions: u32,
        /// Kernel name; the source is `<kernel>-cpu.pocc.c`.
        kernel: String,
        #[arg(long, default_value = DEFAULT_DEFINE_PREFIX)]
        define_prefix: String,
        #[arg(long)]
        compiler: Option<ToolCommand>,
        #[arg(long)]
        throughput_key: Option<String>,
        /// Work per run, used to derive sweep-wide throughput.
        #[arg(long)]
        total_work: Option<f64>,
        #[command(flatten)]
        sweep: SweepArgs,
    },
    /// Print a search space without building anything.
    Space {
        #[arg(value_enum)]
        profile: ProfileArg,
        dimension: u32,
        /// Print every tuple with its index.
        #[arg(long, default_value_t = false)]
        list: bool,
        #[arg(long = "range", value_name = "DIM=START[:END[:STEP]]")]
        ranges: Vec<RangeOverride>,
    },
    /// Translate, build and run every kernel of a regression directory.
    Check {
        dir: PathBuf,
        /// Only kernels whose file name contains this.
        filter: Option<String>,
        #[arg(long, default_value = "sm_20")]
        arch: String,
        #[arg(long)]
        translator: Option<ToolCommand>,
        #[arg(long)]
        compiler: Option<ToolCommand>,
        #[arg(long, default_value_t = 60)]
        timeout: u64,
        /// Defaults to `<dir>/build.temp`.
        #[arg(long)]
        scratch_dir: Option<PathBuf>,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum ProfileArg {
    Tile,
    Cpu,
}

/// Options shared by both sweep variants.
#[derive(Args, Debug, Clone)]
pub struct SweepArgs {
    /// Replace one dimension's range (repeatable).
    #[arg(long = "range", value_name = "DIM=START[:END[:STEP]]")]
    pub ranges: Vec<RangeOverride>,
    /// Per-candidate wall-clock limit in seconds.
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,
    /// Directory for scratch sources and executables.
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputRouting::Split)]
    pub routing: OutputRouting,
    /// Write a JSON sweep report here when the sweep ends.
    #[arg(long)]
    pub report: Option<PathBuf>,
    /// Continue the sweep recorded in this report.
    #[arg(long)]
    pub resume: Option<PathBuf>,
}

/// `DIM=START[:END[:STEP]]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeOverride {
    pub name: String,
    pub range: ParamRange,
}

impl FromStr for RangeOverride {
    type Err = SpaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, range) = s
            .split_once('=')
            .ok_or_else(|| SpaceError::MalformedRange(s.to_string()))?;
        Ok(Self {
            name: name.trim().to_string(),
            range: range.parse()?,
        })
    }
}

pub fn run_cli(cli: Cli) -> Result<ExitCode> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();

    match cli.command {
        Command::TileSearch {
            dimension,
            template,
            arch,
            placeholder,
            translator,
            compiler,
            throughput_key,
            problem_size,
            time_steps,
            sweep,
        } => {
            let mut profile = SearchProfile::tile_search(dimension)?;
            apply_ranges(&mut profile, &sweep.ranges)?;
            if let Some(size) = problem_size {
                profile.set_problem_size(size);
            }
            if let Some(steps) = time_steps {
                profile.set_time_steps(steps);
            }
            let template = Template::load(&template, &placeholder)?;

            let compiler = compiler.unwrap_or_else(ToolCommand::default_cuda_compiler);
            let mut builder = BuildDriver::new(compiler)
                .with_translator(translator.unwrap_or_else(ToolCommand::default_translator))
                .with_var("arch", arch)
                .with_var("time_steps", profile.time_steps.to_string());
            if let Some(size) = profile.problem_size {
                builder = builder.with_var("problem_size", size.to_string());
            }

            let mut keys = MetricKeys::tile_search();
            if let Some(key) = throughput_key {
                keys = keys.with_throughput_key(key);
            }
            let paths = ScratchPaths::in_dir(&scratch_dir(&sweep), "tiletune-search");

            run_sweep(
                profile,
                CandidateEncoding::Template(template),
                builder,
                keys,
                paths,
                &sweep,
            )
        }
        Command::CpuSweep {
            dimensions,
            kernel,
            define_prefix,
            compiler,
            throughput_key,
            total_work,
            sweep,
        } => {
            let mut profile = SearchProfile::cpu(dimensions)?;
            apply_ranges(&mut profile, &sweep.ranges)?;
            if let Some(work) = total_work {
                profile.set_total_work(work);
            }

            let builder =
                BuildDriver::new(compiler.unwrap_or_else(ToolCommand::default_cpu_compiler));
            let mut keys = MetricKeys::cpu();
            if let Some(key) = throughput_key {
                keys = keys.with_throughput_key(key);
            }

            let stem = Path::new(&kernel)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| kernel.clone());
            let scratch = scratch_dir(&sweep);
            let paths = ScratchPaths {
                source: PathBuf::from(format!("{kernel}-cpu.pocc.c")),
                translated: scratch.join(format!("{stem}-cpu.pocc.out.c")),
                executable: scratch.join(format!("{stem}-cpu.pocc")),
            };

            run_sweep(
                profile,
                CandidateEncoding::Defines {
                    prefix: define_prefix,
                },
                builder,
                keys,
                paths,
                &sweep,
            )
        }
        Command::Space {
            profile,
            dimension,
            list,
            ranges,
        } => {
            let mut profile = match profile {
                ProfileArg::Tile => SearchProfile::tile_search(dimension)?,
                ProfileArg::Cpu => SearchProfile::cpu(dimension)?,
            };
            apply_ranges(&mut profile, &ranges)?;

            for dim in profile.space.dimensions() {
                println!("{} = {}", dim.name, dim.range);
            }
            println!("Num Configs: {}", profile.space.len());
            if let Some(work) = profile.total_work {
                println!("Total work: {work}");
            }
            if list {
                for (index, tuple) in profile.space.iter().enumerate() {
                    println!("{index}: {tuple}");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Check {
            dir,
            filter,
            arch,
            translator,
            compiler,
            timeout,
            scratch_dir,
        } => {
            let scratch = scratch_dir.unwrap_or_else(|| dir.join("build.temp"));
            let suite = CheckSuite::discover(&dir, filter.as_deref(), &scratch)?;
            let compiler = compiler.unwrap_or_else(ToolCommand::default_check_compiler);
            let builder = BuildDriver::new(compiler)
                .with_translator(translator.unwrap_or_else(ToolCommand::default_translator))
                .with_var("arch", arch)
                .with_var("include", dir.display().to_string());
            let paths = ScratchPaths {
                source: scratch.join("check.cu"),
                translated: scratch.join("otsc.out.cu"),
                executable: scratch.join("nvcc.out"),
            };

            let runtime = Runtime::new()?;
            let cancel = CancelToken::new();
            cancel.cancel_on_interrupt(runtime.handle());
            let watchdog = Watchdog::new(
                WatchdogOptions {
                    timeout: Duration::from_secs(timeout),
                },
                runtime.handle().clone(),
            );

            let mut stdout = std::io::stdout();
            let report = suite.run(&builder, &watchdog, &paths, &cancel, &mut stdout)?;
            report.write_summary(&mut stdout)?;
            Ok(if report.success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn apply_ranges(profile: &mut SearchProfile, ranges: &[RangeOverride]) -> Result<()> {
    for RangeOverride { name, range } in ranges {
        profile.set_range(name, *range)?;
    }
    Ok(())
}

fn scratch_dir(args: &SweepArgs) -> PathBuf {
    args.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
}

fn run_sweep(
    profile: SearchProfile,
    encoding: CandidateEncoding,
    builder: BuildDriver,
    keys: MetricKeys,
    paths: ScratchPaths,
    args: &SweepArgs,
) -> Result<ExitCode> {
    let runtime = Runtime::new()?;
    let cancel = CancelToken::new();
    cancel.cancel_on_interrupt(runtime.handle());
    let watchdog = Watchdog::new(
        WatchdogOptions {
            timeout: Duration::from_secs(args.timeout),
        },
        runtime.handle().clone(),
    );

    let mut sweep =
        Sweep::new(profile, encoding, builder, watchdog, keys, cancel).with_scratch(paths);
    if let Some(path) = &args.resume {
        let report = SweepReport::load_from_file(path)?;
        sweep = sweep
            .resume_from(report)
            .with_context(|| format!("cannot resume from {}", path.display()))?;
    }

    let (mut data, mut diagnostics) = args.routing.writers();
    let mut out = SweepOutput::new(&mut *data, &mut *diagnostics);
    let outcome = sweep.run(&mut out)?;

    if let Some(path) = &args.report {
        outcome.report().save_to_file(path)?;
        info!(path = %path.display(), "sweep report written");
    }
    Ok(ExitCode::SUCCESS)
}
