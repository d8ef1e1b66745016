//! Kernel source templates with a single reserved placeholder.

use crate::attrs::{AttributeError, TileAttributes};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tiletune_space::ParameterTuple;

pub const DEFAULT_PLACEHOLDER: &str = "TILE_SIZE_PARAMS";

/// Template problems are fatal for the whole sweep: no candidate could
/// ever be built from a template that fails these checks.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read template {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("template does not contain the placeholder '{0}'")]
    MissingPlaceholder(String),

    #[error("template contains the placeholder '{placeholder}' {count} times; expected exactly once")]
    AmbiguousPlaceholder { placeholder: String, count: usize },

    #[error(transparent)]
    Attributes(#[from] AttributeError),
}

#[derive(Debug, Clone)]
pub struct Template {
    text: String,
    placeholder: String,
}

impl Template {
    pub fn new(
        text: impl Into<String>,
        placeholder: impl Into<String>,
    ) -> Result<Self, TemplateError> {
        let text = text.into();
        let placeholder = placeholder.into();
        match text.matches(placeholder.as_str()).count() {
            0 => Err(TemplateError::MissingPlaceholder(placeholder)),
            1 => Ok(Self { text, placeholder }),
            count => Err(TemplateError::AmbiguousPlaceholder { placeholder, count }),
        }
    }

    pub fn load(path: &Path, placeholder: &str) -> Result<Self, TemplateError> {
        let text = fs::read_to_string(path).map_err(|source| TemplateError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::new(text, placeholder)
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn materialize(&self, tuple: &ParameterTuple) -> Result<CandidateSource, TemplateError> {
        let attrs = TileAttributes::from_tuple(tuple)?;
        Ok(self.materialize_attributes(&attrs))
    }

    pub fn materialize_attributes(&self, attrs: &TileAttributes) -> CandidateSource {
        CandidateSource {
            text: self.text.replacen(&self.placeholder, &attrs.to_string(), 1),
        }
    }
}

/// Concrete source for one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSource {
    pub text: String,
}

impl CandidateSource {
    /// Overwrite `path` with this candidate's source.
    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        fs::write(path, &self.text)
    }
}
