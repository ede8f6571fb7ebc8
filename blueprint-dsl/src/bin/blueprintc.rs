//! Thin command-line front end for the Blueprint compiler.
//!
//! Prints diagnostics one per line as `name:line:column: severity:
//! message` and exits 0 only on success. A file that is not valid UTF-8
//! is the one hard failure, reported before the compiler core is invoked.

use blueprint_dsl::{compile, structure_summary};
use std::process::ExitCode;

const USAGE: &str = "usage: blueprintc [--json] <file>";

fn main() -> ExitCode {
    let mut json = false;
    let mut path: Option<String> = None;

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--json" => json = true,
            "--help" | "-h" => {
                println!("{}", USAGE);
                return ExitCode::SUCCESS;
            }
            other if path.is_none() => path = Some(other.to_string()),
            _ => {
                eprintln!("{}", USAGE);
                return ExitCode::from(2);
            }
        }
    }

    let Some(path) = path else {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    };

    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("error: cannot read {}: {}", path, err);
            return ExitCode::from(2);
        }
    };
    let source = match String::from_utf8(bytes) {
        Ok(source) => source,
        Err(_) => {
            eprintln!("error: {} is not valid UTF-8 text", path);
            return ExitCode::from(2);
        }
    };

    let result = compile(&source, &path);

    if json {
        let summary = result.program.as_ref().map(structure_summary);
        let payload = serde_json::json!({
            "name": result.name,
            "success": result.success,
            "diagnostics": result.diagnostics,
            "summary": summary,
        });
        match serde_json::to_string_pretty(&payload) {
            Ok(text) => println!("{}", text),
            Err(err) => {
                eprintln!("error: {}", err);
                return ExitCode::from(2);
            }
        }
    } else {
        for diagnostic in &result.diagnostics {
            eprintln!("{}:{}", result.name, diagnostic);
        }
    }

    if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
