//! Error types for schema loading, compilation, request handling and projection.

use std::path::PathBuf;
use thiserror::Error;

use crate::loader::InputKind;

/// Boxed error carried across driver and middleware boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors while loading a schema document or recorded driver output.
///
/// Every variant names the input that failed and where it was read from.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("{input} file not found: {}", path.display())]
    FileNotFound { input: InputKind, path: PathBuf },

    #[error("cannot read {input} from {origin}: {source}")]
    ReadError {
        input: InputKind,
        origin: String,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {input} from {url}: {source}")]
    NetworkError {
        input: InputKind,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Usage and parse errors (exit code 2)
    #[error("cannot fetch {input} from {url}: built without the remote feature")]
    RemoteDisabled { input: InputKind, url: String },

    #[error("invalid JSON in {input} {origin}: {source}")]
    InvalidJson {
        input: InputKind,
        origin: String,
        #[source]
        source: serde_json::Error,
    },
}

impl LoadError {
    /// The input this error is about.
    pub fn input(&self) -> InputKind {
        match self {
            LoadError::FileNotFound { input, .. }
            | LoadError::ReadError { input, .. }
            | LoadError::RemoteDisabled { input, .. }
            | LoadError::InvalidJson { input, .. } => *input,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { input, .. } => *input,
        }
    }

    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            LoadError::RemoteDisabled { .. } | LoadError::InvalidJson { .. } => 2,
        }
    }
}

/// A single structural problem found in a schema document.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SchemaViolation {
    /// JSON Pointer (RFC 6901) to the offending node.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "{}: {}", path, self.message)
    }
}

/// Errors raised while compiling a resource schema.
///
/// These surface at construction time only; a compiled schema never fails a request
/// because of its own shape.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("schema has {} structural error(s): {}", violations.len(), join_violations(violations))]
    InvalidSchema { violations: Vec<SchemaViolation> },

    #[error("duplicate resource identity \"{identity}\" at {path}")]
    DuplicateIdentity { identity: String, path: String },

    #[error("invalid inclusion \"{value}\" at {path}: expected always, default, or byRequest")]
    InvalidInclusion { path: String, value: String },

    #[error("unresolved $ref \"{target}\" at {path}")]
    UnresolvedRef { path: String, target: String },

    #[error("$ref cycle detected at {path}: {}", chain.join(" -> "))]
    RefCycle { path: String, chain: Vec<String> },

    #[error("malformed schema node at {path}: {message}")]
    MalformedNode { path: String, message: String },
}

fn join_violations(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl CompileError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Errors in the shape of an incoming request.
///
/// All of these are raised before any middleware or driver runs.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("method {method} not allowed: only GET is supported")]
    MethodNotAllowed { method: String },

    #[error("path must start with /: \"{path}\"")]
    PathNotAbsolute { path: String },

    #[error("path does not name a resource: \"{path}\"")]
    EmptyPath { path: String },

    #[error("unknown resource \"{link}\" in {path}")]
    UnknownResource { path: String, link: String },

    #[error("malformed query pair \"{pair}\": missing =")]
    MalformedQueryPair { pair: String },

    #[error("invalid percent-encoding in \"{value}\"")]
    InvalidEncoding { value: String },

    #[error("invalid field specifier \"{specifier}\": {reason}")]
    InvalidFieldSpecifier { specifier: String, reason: String },

    #[error("invalid order \"{value}\": expected name[,asc|desc|1|-1]")]
    InvalidOrder { value: String },

    #[error("invalid limit \"{value}\": expected a non-negative integer")]
    InvalidLimit { value: String },
}

impl RequestError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Errors while projecting driver output onto the selected fields.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("expected array at {pointer}, got {actual}")]
    NotAnArray {
        pointer: String,
        actual: &'static str,
        value: serde_json::Value,
    },
}

impl ProjectError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

/// Errors from [`Service::process`](crate::Service::process).
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error("driver for \"{identity}\" returned status {status}")]
    DriverStatus {
        identity: String,
        status: u16,
        /// The driver's raw response, for diagnostics.
        response: serde_json::Value,
    },

    #[error("driver for \"{identity}\" does not support {operation}")]
    Unsupported {
        identity: String,
        operation: &'static str,
    },

    #[error("driver for \"{identity}\" failed: {source}")]
    Driver {
        identity: String,
        #[source]
        source: BoxError,
    },

    #[error("middleware failed: {0}")]
    Middleware(#[source] BoxError),
}

impl ProcessError {
    /// Wrap an arbitrary error raised inside a middleware.
    pub fn middleware(err: impl Into<BoxError>) -> Self {
        ProcessError::Middleware(err.into())
    }

    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ProcessError::Request(e) => e.exit_code(),
            ProcessError::Project(e) => e.exit_code(),
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_exit_codes() {
        let err = LoadError::FileNotFound {
            input: InputKind::Schema,
            path: PathBuf::from("schema.json"),
        };
        assert_eq!(err.exit_code(), 3);
        assert_eq!(err.to_string(), "schema file not found: schema.json");

        let source = serde_json::from_str::<serde_json::Value>("nope").unwrap_err();
        let err = LoadError::InvalidJson {
            input: InputKind::Data,
            origin: "<stdin>".into(),
            source,
        };
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.input(), InputKind::Data);
        assert!(err.to_string().starts_with("invalid JSON in data <stdin>: "));
    }

    #[test]
    fn process_error_exit_codes() {
        let err = ProcessError::from(RequestError::MethodNotAllowed {
            method: "POST".into(),
        });
        assert_eq!(err.exit_code(), 2);

        let err = ProcessError::DriverStatus {
            identity: "widgets".into(),
            status: 404,
            response: serde_json::Value::Null,
        };
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn schema_violation_display() {
        let v = SchemaViolation {
            path: "/widgets/fields/bar".into(),
            message: "expected object".into(),
        };
        assert_eq!(v.to_string(), "/widgets/fields/bar: expected object");

        let root = SchemaViolation {
            path: String::new(),
            message: "expected object".into(),
        };
        assert_eq!(root.to_string(), "/: expected object");
    }

    #[test]
    fn invalid_schema_lists_violations() {
        let err = CompileError::InvalidSchema {
            violations: vec![
                SchemaViolation {
                    path: "/a".into(),
                    message: "x".into(),
                },
                SchemaViolation {
                    path: "/b".into(),
                    message: "y".into(),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "schema has 2 structural error(s): /a: x; /b: y"
        );
    }
}
