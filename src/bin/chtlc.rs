//! `chtlc`: thin CLI wrapper around [`chtl::compile_file`].
//!
//! Grounded in the teacher's ambient-stack choice of `anyhow` at the binary
//! edge (library code returns `CompileError`; the CLI collapses everything
//! into one `anyhow::Result` and prints) plus `env_logger` for `RUST_LOG`-
//! driven diagnostics, matching the teacher's `main.rs` logging setup.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use chtl::{CompileOptions, CompileOutput};

struct Args {
    input: PathBuf,
    out_dir: Option<PathBuf>,
    strict: bool,
    cache_dir: Option<PathBuf>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut input = None;
    let mut out_dir = None;
    let mut strict = false;
    let mut cache_dir = None;

    let mut raw = std::env::args().skip(1);
    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--strict" => strict = true,
            "--out-dir" => out_dir = Some(PathBuf::from(raw.next().context("--out-dir requires a path")?)),
            "--cache-dir" => cache_dir = Some(PathBuf::from(raw.next().context("--cache-dir requires a path")?)),
            other if !other.starts_with('-') => input = Some(PathBuf::from(other)),
            other => bail!("unrecognized argument `{other}`"),
        }
    }

    Ok(Args {
        input: input.context("usage: chtlc <input.chtl> [--out-dir DIR] [--strict] [--cache-dir DIR]")?,
        out_dir,
        strict,
        cache_dir,
    })
}

fn write_outputs(stem: &str, out_dir: &PathBuf, output: &CompileOutput) -> anyhow::Result<()> {
    std::fs::create_dir_all(out_dir).with_context(|| format!("creating output directory {}", out_dir.display()))?;
    std::fs::write(out_dir.join(format!("{stem}.html")), &output.generated.html)?;
    if !output.generated.css.is_empty() {
        std::fs::write(out_dir.join(format!("{stem}.css")), &output.generated.css)?;
    }
    if !output.generated.js.is_empty() {
        std::fs::write(out_dir.join(format!("{stem}.js")), &output.generated.js)?;
    }
    Ok(())
}

fn run() -> anyhow::Result<ExitCode> {
    env_logger::init();
    let args = parse_args()?;

    let options = CompileOptions {
        strict: args.strict,
        cache_dir: args.cache_dir,
    };

    let result = chtl::compile_file(&args.input, &options);
    match result {
        Ok(output) => {
            for diagnostic in &output.diagnostics {
                eprintln!("{diagnostic}");
            }
            let stem = args.input.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
            let out_dir = args.out_dir.unwrap_or_else(|| PathBuf::from("."));
            write_outputs(stem, &out_dir, &output)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            for diagnostic in err.diagnostics() {
                eprintln!("{diagnostic}");
            }
            eprintln!("error: {err}");
            Ok(ExitCode::from(err.exit_code() as u8))
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
