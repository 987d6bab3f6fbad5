use std::{path::PathBuf, process::ExitCode};

use clap::Parser as ClapParser;

use emc::{
    backend,
    driver::{self, CompileOptions},
    frontend::{SourceFile, SourceFileOrigin},
    ir::optimize::OptLevel,
    middle::diagnostics::{DiagnosticKind, DiagnosticSink},
};

#[derive(Debug, ClapParser)]
#[command(name = "emc", version, about = "Ahead-of-time compiler for the M language")]
struct Args {
    /// Write textual IR next to the input, replacing its extension with .ll
    #[arg(long = "emit-ll")]
    emit_ll: bool,

    /// Write a native object file next to the input with extension .o
    #[arg(long = "emit-o")]
    emit_o: bool,

    /// Optimization level; out-of-range values clamp to 0-3
    #[arg(short = 'O', default_value_t = 2, value_name = "LEVEL")]
    optimization_level: u8,

    input_file: PathBuf,
}

fn main() -> ExitCode {
    // Accept the double-dash spelling of the level flags (--O2) alongside
    // clap's native -O2
    let argv = std::env::args().map(|arg| match arg.as_str() {
        "--O0" => "-O0".to_string(),
        "--O1" => "-O1".to_string(),
        "--O2" => "-O2".to_string(),
        "--O3" => "-O3".to_string(),
        _ => arg,
    });

    let args = match Args::try_parse_from(argv) {
        Ok(args) => args,
        Err(error) => {
            let _ = error.print();
            return ExitCode::FAILURE;
        }
    };

    let opt_level = args.optimization_level.min(3);

    let source = match std::fs::read_to_string(&args.input_file) {
        Ok(contents) => SourceFile {
            contents,
            origin: SourceFileOrigin::File(args.input_file.clone()),
        },
        Err(error) => {
            let mut sink = DiagnosticSink::with_filename(args.input_file.display().to_string());
            sink.error(
                DiagnosticKind::SyntaxError,
                format!("Cannot read file: {error}"),
                0,
                0,
            );
            sink.print_all(&SourceFile::from_string(""));

            return ExitCode::FAILURE;
        }
    };

    let result = driver::compile_source(
        &source,
        CompileOptions {
            opt_level: OptLevel::from_level(opt_level),
        },
    );

    result.sink.print_all(&source);

    let Some(ir) = result.ir else {
        return ExitCode::FAILURE;
    };

    if !args.emit_ll && !args.emit_o {
        print!("{ir}");
        return ExitCode::SUCCESS;
    }

    if args.emit_o {
        if let Err(error) = backend::write_object_file(&args.input_file, &ir, opt_level, args.emit_ll)
        {
            eprintln!("error: {error}");
            return ExitCode::FAILURE;
        }
    } else if let Err(error) = backend::write_ir_file(&args.input_file, &ir) {
        eprintln!("error: {error}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
