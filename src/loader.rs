//! Loading the JSON inputs: resource schema documents and recorded driver output.
//!
//! An input is read from a file, from stdin (`-`) or, with the `remote` feature, over
//! HTTP(S). Errors name which input failed and where it was read from.

use std::fmt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::LoadError;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Timeout for fetching a remote input.
#[cfg(feature = "remote")]
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// What an input is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// A resource schema document.
    Schema,
    /// Raw driver output to be projected.
    Data,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputKind::Schema => f.write_str("schema"),
            InputKind::Data => f.write_str("data"),
        }
    }
}

/// Where an input is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Stdin,
    File(PathBuf),
    Url(String),
}

impl Source {
    /// `-` is stdin, `http://` or `https://` is a URL, anything else a file path.
    pub fn parse(s: &str) -> Self {
        if s == "-" {
            Source::Stdin
        } else if s.starts_with("http://") || s.starts_with("https://") {
            Source::Url(s.to_string())
        } else {
            Source::File(PathBuf::from(s))
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Stdin => f.write_str("<stdin>"),
            Source::File(path) => write!(f, "{}", path.display()),
            Source::Url(url) => f.write_str(url),
        }
    }
}

/// Load a schema document from a file path, URL or `-`.
///
/// # Errors
///
/// Returns `LoadError` naming the schema input if it cannot be read or is not JSON.
pub fn load_schema(source: &str) -> Result<Value, LoadError> {
    load(InputKind::Schema, &Source::parse(source))
}

/// Load recorded driver output from a file path, URL or `-`.
///
/// # Errors
///
/// Returns `LoadError` naming the data input if it cannot be read or is not JSON.
pub fn load_data(source: &str) -> Result<Value, LoadError> {
    load(InputKind::Data, &Source::parse(source))
}

/// Read and parse one input.
///
/// # Errors
///
/// Returns `LoadError` for missing files, read or fetch failures and invalid JSON.
pub fn load(input: InputKind, source: &Source) -> Result<Value, LoadError> {
    let content = match source {
        Source::Stdin => read_stdin(input)?,
        Source::File(path) => read_file(input, path)?,
        Source::Url(url) => fetch(input, url)?,
    };
    parse_input(input, &content, &source.to_string())
}

/// Parse an input already held in memory. `origin` is used in error messages.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` if `content` is not valid JSON.
pub fn parse_input(input: InputKind, content: &str, origin: &str) -> Result<Value, LoadError> {
    serde_json::from_str(content).map_err(|source| LoadError::InvalidJson {
        input,
        origin: origin.to_string(),
        source,
    })
}

fn read_stdin(input: InputKind) -> Result<String, LoadError> {
    let mut content = String::new();
    io::stdin()
        .read_to_string(&mut content)
        .map_err(|source| LoadError::ReadError {
            input,
            origin: Source::Stdin.to_string(),
            source,
        })?;
    Ok(content)
}

fn read_file(input: InputKind, path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => LoadError::FileNotFound {
            input,
            path: path.to_path_buf(),
        },
        _ => LoadError::ReadError {
            input,
            origin: path.display().to_string(),
            source,
        },
    })
}

#[cfg(feature = "remote")]
fn fetch(input: InputKind, url: &str) -> Result<String, LoadError> {
    reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .and_then(|client| client.get(url).send())
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.text())
        .map_err(|source| LoadError::NetworkError {
            input,
            url: url.to_string(),
            source,
        })
}

#[cfg(not(feature = "remote"))]
fn fetch(input: InputKind, url: &str) -> Result<String, LoadError> {
    Err(LoadError::RemoteDisabled {
        input,
        url: url.to_string(),
    })
}
