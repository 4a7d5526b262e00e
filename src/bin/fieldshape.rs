//! Fieldshape CLI
//!
//! Command-line interface for compiling resource schemas and previewing requests.

use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use fieldshape::{
    load_data, load_schema, ByIdResponse, CompiledSchema, Driver, DriverDispatch,
    DriverRegistry, Link, ListParams, ListResponse, ProcessError, RawRequest, Request, Service,
};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fieldshape")]
#[command(about = "Compile resource schemas and preview sparse-fieldset requests")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a schema and print its resources, links and inclusion sets
    Compile {
        /// Schema source: file path, URL (http:// or https://), or - for stdin
        schema: String,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Print the prepared request a driver would receive for a path
    Fields {
        /// Schema source: file path, URL (http:// or https://), or - for stdin
        schema: String,

        /// Request path, e.g. /widgets/w1
        path: String,

        /// Raw query string, e.g. 'f=name,bazz.plugh&limit=10'
        #[arg(long, short, default_value = "")]
        query: String,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Project raw driver output through a request and print the response envelope
    Project {
        /// Schema source: file path, URL (http:// or https://), or - for stdin
        schema: String,

        /// Request path, e.g. /widgets/w1
        path: String,

        /// Raw driver output: an object for a single resource, an array (or a
        /// `{"resources": [...], "next": ...}` object) for a collection.
        /// File path, URL, or - for stdin
        #[arg(long)]
        data: String,

        /// Raw query string, e.g. 'f=name,bazz.plugh&limit=10'
        #[arg(long, short, default_value = "")]
        query: String,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile { schema, pretty } => run_compile(&schema, pretty),
        Commands::Fields {
            schema,
            path,
            query,
            pretty,
        } => run_fields(&schema, &path, &query, pretty),
        Commands::Project {
            schema,
            path,
            data,
            query,
            pretty,
        } => run_project(&schema, &path, &data, &query, pretty),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

/// Print `Error: ...` and return the exit code.
fn fail(message: impl std::fmt::Display, code: i32) -> u8 {
    eprintln!("Error: {}", message);
    u8::try_from(code).unwrap_or(1)
}

fn compile(schema_source: &str) -> Result<CompiledSchema, u8> {
    let schema = load_schema(schema_source).map_err(|e| fail(&e, e.exit_code()))?;
    CompiledSchema::compile(&schema).map_err(|e| fail(&e, e.exit_code()))
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), u8> {
    let output = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| fail(format!("serializing output: {}", e), 2))?;

    println!("{}", output);
    Ok(())
}

fn run_compile(schema_source: &str, pretty: bool) -> Result<(), u8> {
    let compiled = compile(schema_source)?;
    print_json(&compiled, pretty)
}

fn run_fields(schema_source: &str, path: &str, query: &str, pretty: bool) -> Result<(), u8> {
    let service = Service::from_compiled(Arc::new(compile(schema_source)?));
    let request = service
        .prepare(&RawRequest::get(path).query(query))
        .map_err(|e| fail(&e, e.exit_code()))?;
    print_json(&request, pretty)
}

fn run_project(
    schema_source: &str,
    path: &str,
    data_source: &str,
    query: &str,
    pretty: bool,
) -> Result<(), u8> {
    let compiled = Arc::new(compile(schema_source)?);
    let data = load_data(data_source).map_err(|e| fail(&e, e.exit_code()))?;

    let raw = RawRequest::get(path).query(query);
    let identity = Service::from_compiled(Arc::clone(&compiled))
        .prepare(&raw)
        .map_err(|e| fail(&e, e.exit_code()))?
        .identity()
        .to_string();

    let mut service = Service::from_compiled(compiled);
    service.use_middleware(DriverDispatch::new(
        DriverRegistry::new().with(identity, FileDriver { data }),
    ));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(|e| fail(format!("starting runtime: {}", e), 1))?;
    let response = runtime
        .block_on(service.process(raw))
        .map_err(|e| fail(&e, e.exit_code()))?;

    print_json(&response, pretty)
}

/// Serves the contents of a data file as driver output.
struct FileDriver {
    data: Value,
}

#[async_trait]
impl Driver for FileDriver {
    async fn by_id(
        &self,
        _links: &[Link],
        _request: &Request,
        _aux: &Value,
    ) -> Result<ByIdResponse, ProcessError> {
        Ok(ByIdResponse::new(self.data.clone()))
    }

    async fn list(
        &self,
        _params: &ListParams,
        request: &Request,
        _aux: &Value,
    ) -> Result<ListResponse, ProcessError> {
        match &self.data {
            Value::Array(items) => Ok(ListResponse::new(items.clone())),
            other => serde_json::from_value(other.clone()).map_err(|e| ProcessError::Driver {
                identity: request.identity().to_string(),
                source: Box::new(e),
            }),
        }
    }
}
