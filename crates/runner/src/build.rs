//! Translate-then-compile pipeline for a single candidate.

use crate::tool::{ToolCommand, ToolVars};
use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use tracing::debug;

/// Fixed scratch files reused by every candidate of a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchPaths {
    pub source: PathBuf,
    pub translated: PathBuf,
    pub executable: PathBuf,
}

impl ScratchPaths {
    pub fn in_dir(dir: &Path, stem: &str) -> Self {
        Self {
            source: dir.join(format!("{stem}.cu")),
            translated: dir.join(format!("{stem}.out.cu")),
            executable: dir.join(format!("{stem}.x")),
        }
    }

    pub fn prepare(&self) -> Result<()> {
        for path in [&self.source, &self.translated, &self.executable] {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create scratch dir {}", parent.display()))?;
            }
        }
        Ok(())
    }
}

impl Default for ScratchPaths {
    fn default() -> Self {
        Self::in_dir(&std::env::temp_dir(), "tiletune-search")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStep {
    Translate,
    Compile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Built { executable: PathBuf },
    TranslateFailed { diagnostics: String },
    CompileFailed { diagnostics: String },
    /// The step's tool died from SIGINT or SIGTERM, or exited with the
    /// shell's 128+signal status for one of them.
    Interrupted { step: BuildStep, diagnostics: String },
}

pub struct BuildDriver {
    translator: Option<ToolCommand>,
    compiler: ToolCommand,
    vars: ToolVars,
}

impl BuildDriver {
    pub fn new(compiler: ToolCommand) -> Self {
        Self {
            translator: None,
            compiler,
            vars: ToolVars::new(),
        }
    }

    pub fn with_translator(mut self, translator: ToolCommand) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Bind a placeholder shared by every invocation (e.g. `arch`).
    pub fn with_var(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.vars.insert(key, value.into());
        self
    }

    pub fn translator(&self) -> Option<&ToolCommand> {
        self.translator.as_ref()
    }

    pub fn compiler(&self) -> &ToolCommand {
        &self.compiler
    }

    /// Build `source` into `paths.executable`. `extra_flags` are appended to
    /// the compiler invocation.
    ///
    /// Tool failures are returned as outcomes; only scratch-file I/O is an error.
    pub fn build(
        &self,
        source: &Path,
        paths: &ScratchPaths,
        extra_flags: &[String],
    ) -> Result<BuildOutcome> {
        let compile_input = match &self.translator {
            Some(translator) => {
                let (program, args) = translator.render(&self.step_vars(source, &paths.translated));
                if let Err(failure) = invoke(&program, &args) {
                    return Ok(failure.into_outcome(BuildStep::Translate));
                }
                paths.translated.as_path()
            }
            None => source,
        };

        remove_stale(&paths.executable)?;

        let (program, mut args) = self
            .compiler
            .render(&self.step_vars(compile_input, &paths.executable));
        args.extend(extra_flags.iter().cloned());
        if let Err(failure) = invoke(&program, &args) {
            return Ok(failure.into_outcome(BuildStep::Compile));
        }

        Ok(BuildOutcome::Built {
            executable: paths.executable.clone(),
        })
    }

    fn step_vars(&self, input: &Path, output: &Path) -> ToolVars {
        let mut vars = self.vars.clone();
        vars.insert("input", input.display().to_string());
        vars.insert("output", output.display().to_string());
        vars
    }
}

fn remove_stale(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => {
            Err(err).with_context(|| format!("failed to remove stale artifact {}", path.display()))
        }
    }
}

struct StepFailure {
    diagnostics: String,
    interrupted: bool,
}

impl StepFailure {
    fn into_outcome(self, step: BuildStep) -> BuildOutcome {
        let diagnostics = self.diagnostics;
        match (self.interrupted, step) {
            (true, step) => BuildOutcome::Interrupted { step, diagnostics },
            (false, BuildStep::Translate) => BuildOutcome::TranslateFailed { diagnostics },
            (false, BuildStep::Compile) => BuildOutcome::CompileFailed { diagnostics },
        }
    }
}

/// Run a tool to completion. On failure, returns everything the tool printed.
fn invoke(program: &str, args: &[String]) -> std::result::Result<(), StepFailure> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|err| StepFailure {
            diagnostics: format!("failed to launch `{program}`: {err}"),
            interrupted: false,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if output.status.success() {
        debug!(program, stdout = %stdout.trim_end(), stderr = %stderr.trim_end(), "tool succeeded");
        return Ok(());
    }

    let mut diagnostics = format!("`{program} {}` exited with {}", args.join(" "), output.status);
    for text in [stdout.trim_end(), stderr.trim_end()] {
        if !text.is_empty() {
            diagnostics.push('\n');
            diagnostics.push_str(text);
        }
    }
    Err(StepFailure {
        diagnostics,
        interrupted: killed_by_interrupt(&output.status),
    })
}

fn killed_by_interrupt(status: &ExitStatus) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if matches!(status.signal(), Some(2 | 15)) {
            return true;
        }
    }
    matches!(status.code(), Some(130 | 143))
}
