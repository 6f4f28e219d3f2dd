//! The `glyphc` command line. A thin shell: one required input path, one
//! optional output path, nothing else — compilation proper lives in
//! [`crate::compiler`]. Modeled on the teacher's `cli/args.rs` use of
//! `clap`'s derive API, scaled down to the single action this compiler's
//! CLI surface supports per its out-of-core-scope ambient boundary.

use std::path::PathBuf;

use clap::Parser;

use crate::config::CompileOptions;
use crate::error::{self, CompileError};

/// Compile a `.hql` source file to ECMAScript.
#[derive(Debug, Parser)]
#[command(name = "glyphc", version, about = "Compiles a Lisp-family source file to ECMAScript.")]
pub struct Args {
    /// The source file to compile.
    pub input: PathBuf,

    /// Where to write the compiled output. Defaults to `input` with its
    /// extension swapped for `.js`.
    pub output: Option<PathBuf>,
}

/// The CLI's sole entry point. Returns the process exit code so `main` can
/// stay a one-liner.
pub fn run() -> i32 {
    let args = Args::parse();
    match compile(&args) {
        Ok(()) => 0,
        Err(errors) => {
            for e in &errors {
                error::report(e);
            }
            1
        }
    }
}

fn compile(args: &Args) -> Result<(), Vec<CompileError>> {
    let options = CompileOptions::default();
    let mut outputs = crate::compiler::compile_file(&args.input, &options)?;

    if let Some(output_path) = &args.output {
        outputs[0].path = output_path.clone();
    }

    crate::compiler::write_outputs(&outputs).map_err(|e| {
        vec![CompileError::new(
            crate::error::ErrorKind::IOError { detail: e.to_string() },
            &crate::error::SourceText::new(args.input.to_string_lossy().into_owned(), ""),
            crate::ast::Span::default(),
        )]
    })
}
