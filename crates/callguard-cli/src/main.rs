//! callguard CLI.
//!
//! Provides the `callguard` binary for working with contracts outside a host
//! program: `compile` validates a specification and prints its compiled form
//! as JSON, `match` evaluates a single behavior against a single value.
//!
//! Logging goes to stderr and is filtered by `RUST_LOG`. Runtime limits come
//! from `CALLGUARD_*` environment variables.

use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use callguard_check::signature::{compile, compile_behavior, Side, SignatureSummary, Slot};
use callguard_check::{Runtime, RuntimeConfig};

/// Call-time contract tools.
#[derive(Parser)]
#[command(name = "callguard", about = "Call-time contract tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Compile a contract such as `[Integer, {b: Float}] => Any`.
    Compile {
        /// Contract in notation.
        spec: String,

        /// Print single-line JSON.
        #[arg(long)]
        compact: bool,
    },
    /// Check whether a value satisfies a behavior.
    Match {
        /// Behavior in notation, e.g. `:to_i` or `1..10`.
        descriptor: String,

        /// Value in notation, e.g. `42` or `"cuba"`.
        value: String,
    },
}

#[derive(Serialize)]
struct CompileOutput<'a> {
    spec: &'a str,
    signature: SignatureSummary,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let rt = Runtime::with_config(RuntimeConfig::from_env());

    let exit_code = match cli.command {
        Commands::Compile { spec, compact } => match render_compile(&rt, &spec, compact) {
            Ok(json) => {
                println!("{}", json);
                0
            }
            Err(code) => code,
        },
        Commands::Match { descriptor, value } => match run_match(&rt, &descriptor, &value) {
            Ok(true) => {
                println!("match");
                0
            }
            Ok(false) => {
                println!("no match");
                1
            }
            Err(code) => code,
        },
    };
    process::exit(exit_code);
}

/// Execute the compile subcommand.
///
/// Returns the JSON text, or the exit code: 2 = notation or signature error,
/// 3 = serialization failure.
fn render_compile(rt: &Runtime, spec: &str, compact: bool) -> Result<String, i32> {
    let raw = rt.parse_spec(spec).map_err(|e| {
        eprintln!("Error: {}", e);
        2
    })?;
    let signature = compile(&raw).map_err(|e| {
        eprintln!("Error: {}", e);
        2
    })?;
    tracing::debug!(%signature, "compiled");

    let output = CompileOutput {
        spec,
        signature: signature.summary(),
    };
    let json = if compact {
        serde_json::to_string(&output)
    } else {
        serde_json::to_string_pretty(&output)
    };
    json.map_err(|e| {
        eprintln!("Error: failed to serialize signature: {}", e);
        3
    })
}

/// Execute the match subcommand. `Err` carries exit code 2.
fn run_match(rt: &Runtime, descriptor: &str, value: &str) -> Result<bool, i32> {
    let raw = rt.parse_spec(descriptor).map_err(|e| {
        eprintln!("Error: {}", e);
        2
    })?;
    // The return side is the only one that also admits `nil`.
    let behavior = compile_behavior(&raw, Side::Return, &Slot::Return).map_err(|e| {
        eprintln!("Error: {}", e);
        2
    })?;
    let value = rt.parse_value(value).map_err(|e| {
        eprintln!("Error: {}", e);
        2
    })?;

    let matched = rt.matcher().matches(&behavior, &value);
    tracing::debug!(%behavior, value = %rt.inspect(&value), matched, "matched");
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_renders_summary() {
        let rt = Runtime::new();
        let json = render_compile(&rt, "[Integer, {b: Float}] => Any", true).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["signature"]["positional"][0], "Integer");
        assert_eq!(parsed["signature"]["keyword"]["b"], "Float");
        assert_eq!(parsed["signature"]["info"], "[Integer, {b: Float}] => Any");
    }

    #[test]
    fn compile_errors_exit_2() {
        let rt = Runtime::new();
        assert_eq!(render_compile(&rt, "[nil] => Any", false), Err(2));
        assert_eq!(render_compile(&rt, "[Integer", false), Err(2));
    }

    #[test]
    fn match_outcomes() {
        let rt = Runtime::new();
        assert_eq!(run_match(&rt, ":to_i", "\"42\""), Ok(true));
        assert_eq!(run_match(&rt, "1..10", "1001"), Ok(false));
        assert_eq!(run_match(&rt, "nil", "nil"), Ok(true));
        assert_eq!(run_match(&rt, "[Integer, Float]", "[1, 2.0]"), Ok(true));
        assert_eq!(run_match(&rt, "{a: Integer}", "1"), Err(2));
        assert_eq!(run_match(&rt, "Integer", "1 2"), Err(2));
    }
}
