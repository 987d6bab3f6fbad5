//! The compilation pipeline, front to back: lex/parse, semantic analysis,
//! IR generation. Each phase gates the next; diagnostics accumulate in one
//! sink across all of them.

use crate::{
    frontend::{parser::Parser, SourceFile, SourceFileOrigin},
    ir::{gen::IrGenerator, optimize::OptLevel},
    middle::{
        analyzer::SemanticAnalyzer,
        diagnostics::{DiagnosticKind, DiagnosticSink},
    },
};

#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    pub opt_level: OptLevel,
}

#[derive(Debug)]
pub struct CompilationResult {
    pub success: bool,
    pub sink: DiagnosticSink,
    /// Textual IR, present iff compilation succeeded
    pub ir: Option<String>,
}

pub fn compile_source(source: &SourceFile, options: CompileOptions) -> CompilationResult {
    let mut sink = match &source.origin {
        SourceFileOrigin::File(path) => DiagnosticSink::with_filename(path.display().to_string()),
        SourceFileOrigin::Memory => DiagnosticSink::new(),
    };

    let Some(program) = Parser::parse_program(source, &mut sink) else {
        return CompilationResult {
            success: false,
            sink,
            ir: None,
        };
    };

    SemanticAnalyzer::check_program(&program, &mut sink);

    if sink.has_errors() {
        return CompilationResult {
            success: false,
            sink,
            ir: None,
        };
    }

    match IrGenerator::generate(&program, options.opt_level) {
        Ok(module) => CompilationResult {
            success: true,
            sink,
            ir: Some(module.print_to_string()),
        },
        Err(error) => {
            sink.error(
                DiagnosticKind::SemanticError,
                format!("Code generation failed: {error}"),
                0,
                0,
            );

            CompilationResult {
                success: false,
                sink,
                ir: None,
            }
        }
    }
}
