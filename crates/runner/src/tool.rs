//! Command templates for external tools.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("tool command must name a program")]
pub struct EmptyCommand;

/// A program plus argument templates. Arguments may contain `{name}`
/// placeholders that are filled in per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
}

pub type ToolVars = BTreeMap<&'static str, String>;

impl ToolCommand {
    pub fn new(
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Source-to-source translator.
    pub fn default_translator() -> Self {
        Self::new("otsc", ["-c", "{input}", "-o", "{output}"])
    }

    /// CUDA build of translated tile-search candidates.
    pub fn default_cuda_compiler() -> Self {
        Self::new(
            "nvcc",
            [
                "-Xptxas",
                "-v",
                "-O3",
                "-arch",
                "{arch}",
                "{input}",
                "-o",
                "{output}",
                "-DPROBLEM_SIZE={problem_size}",
                "-DTIME_STEPS={time_steps}",
            ],
        )
    }

    /// CUDA build of translated regression kernels; `{include}` is the
    /// suite directory.
    pub fn default_check_compiler() -> Self {
        Self::new(
            "nvcc",
            [
                "-Xptxas",
                "-v",
                "-arch",
                "{arch}",
                "-O3",
                "{input}",
                "-o",
                "{output}",
                "-I{include}",
            ],
        )
    }

    /// OpenMP build of CPU sweep candidates.
    pub fn default_cpu_compiler() -> Self {
        Self::new(
            "icc",
            ["-std=c99", "-fast", "-openmp", "{input}", "-o", "{output}"],
        )
    }

    /// Expand placeholders, returning the program and concrete arguments.
    pub fn render(&self, vars: &ToolVars) -> (String, Vec<String>) {
        let args = self
            .args
            .iter()
            .map(|arg| {
                vars.iter().fold(arg.clone(), |acc, (key, value)| {
                    acc.replace(&format!("{{{key}}}"), value)
                })
            })
            .collect();
        (self.program.clone(), args)
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

impl FromStr for ToolCommand {
    type Err = EmptyCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let program = words.next().ok_or(EmptyCommand)?;
        Ok(Self::new(program, words))
    }
}
