//! Diagnostics sink shared by every compiler stage.
//!
//! Diagnostics are collected, never thrown: the semantic analyzer keeps
//! walking after reporting so a run surfaces everything it can, and the
//! caller decides at phase boundaries whether to continue.

use colored::Colorize;
use strum::Display;

use crate::{frontend::SourceFile, middle::primitive::PrimitiveType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DiagnosticKind {
    #[strum(serialize = "Syntax Error")]
    SyntaxError,
    #[strum(serialize = "Semantic Error")]
    SemanticError,
    #[strum(serialize = "Type Error")]
    TypeError,
    #[strum(serialize = "Undefined Symbol")]
    UndefinedSymbol,
    #[strum(serialize = "Symbol Redefinition")]
    RedefinedSymbol,
    #[strum(serialize = "Incompatible Types")]
    IncompatibleTypes,
    #[strum(serialize = "Function Not Found")]
    FunctionNotFound,
    #[strum(serialize = "Wrong Argument Count")]
    WrongArgumentCount,
    #[strum(serialize = "Invalid Assignment")]
    InvalidAssignment,
    /// Reserved; the core passes never emit it
    #[strum(serialize = "Unreachable Code")]
    UnreachableCode,
    #[strum(serialize = "Uninitialized Variable")]
    UninitializedVariable,
    #[strum(serialize = "Constant Assignment")]
    ConstantAssignment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
    /// 1-based; 0 means "no usable position" (e.g. an I/O failure)
    pub line: usize,
    pub column: usize,
    pub filename: Option<String>,
}

impl Diagnostic {
    /// `<filename>:<line>:<col>: error: <kind>: <message>`
    pub fn header(&self) -> String {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };

        let mut header = String::new();

        if let Some(filename) = &self.filename {
            header.push_str(filename);
            header.push(':');
        }

        header.push_str(&format!(
            "{}:{}: {severity}: {}: {}",
            self.line, self.column, self.kind, self.message
        ));

        header
    }

    /// The header plus the quoted source line with a caret under the column.
    /// Tabs in the prefix are preserved so the caret stays aligned.
    pub fn render(&self, source: &SourceFile) -> String {
        let mut out = self.header();
        out.push('\n');

        if let Some(source_line) = source.line(self.line) {
            out.push_str(&format!("{:4} | {source_line}\n", self.line));
            out.push_str("     | ");

            for c in source_line.chars().take(self.column.saturating_sub(1)) {
                out.push(if c == '\t' { '\t' } else { ' ' });
            }

            out.push_str("^\n");
        }

        out
    }
}

#[derive(Debug, Default)]
pub struct DiagnosticSink {
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
    filename: Option<String>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filename(filename: impl Into<String>) -> Self {
        Self {
            filename: Some(filename.into()),
            ..Self::default()
        }
    }

    pub fn error(&mut self, kind: DiagnosticKind, message: String, line: usize, column: usize) {
        self.errors.push(Diagnostic {
            kind,
            severity: Severity::Error,
            message,
            line,
            column,
            filename: self.filename.clone(),
        });
    }

    pub fn warning(&mut self, kind: DiagnosticKind, message: String, line: usize, column: usize) {
        self.warnings.push(Diagnostic {
            kind,
            severity: Severity::Warning,
            message,
            line,
            column,
            filename: self.filename.clone(),
        });
    }

    pub fn undefined_symbol(&mut self, name: &str, line: usize, column: usize) {
        self.error(
            DiagnosticKind::UndefinedSymbol,
            format!("Symbol '{name}' is not defined"),
            line,
            column,
        );
    }

    pub fn redefined_symbol(&mut self, name: &str, line: usize, column: usize) {
        self.error(
            DiagnosticKind::RedefinedSymbol,
            format!("Symbol '{name}' is already defined in this scope"),
            line,
            column,
        );
    }

    pub fn type_error(
        &mut self,
        expected: PrimitiveType,
        actual: PrimitiveType,
        line: usize,
        column: usize,
    ) {
        self.error(
            DiagnosticKind::TypeError,
            format!("Expected type '{expected}' but got '{actual}'"),
            line,
            column,
        );
    }

    pub fn incompatible_types(
        &mut self,
        left: PrimitiveType,
        right: PrimitiveType,
        operation: &str,
        line: usize,
        column: usize,
    ) {
        self.error(
            DiagnosticKind::IncompatibleTypes,
            format!("Cannot apply '{operation}' to types '{left}' and '{right}'"),
            line,
            column,
        );
    }

    pub fn wrong_argument_count(
        &mut self,
        name: &str,
        expected: usize,
        actual: usize,
        line: usize,
        column: usize,
    ) {
        self.error(
            DiagnosticKind::WrongArgumentCount,
            format!("Function '{name}' expects {expected} arguments but got {actual}"),
            line,
            column,
        );
    }

    pub fn uninitialized_variable(&mut self, name: &str, line: usize, column: usize) {
        self.warning(
            DiagnosticKind::UninitializedVariable,
            format!("Variable '{name}' may be used before initialization"),
            line,
            column,
        );
    }

    pub fn constant_assignment(&mut self, name: &str, line: usize, column: usize) {
        self.error(
            DiagnosticKind::ConstantAssignment,
            format!("Cannot assign to constant '{name}'"),
            line,
            column,
        );
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    /// Prints every collected diagnostic to stderr, errors first, followed
    /// by a one-line summary
    pub fn print_all(&self, source: &SourceFile) {
        for error in &self.errors {
            let rendered = self.colorize(error.render(source), "error");
            eprintln!("{rendered}");
        }

        for warning in &self.warnings {
            let rendered = self.colorize(warning.render(source), "warning");
            eprintln!("{rendered}");
        }

        if self.has_errors() || self.has_warnings() {
            eprintln!(
                "Compilation finished with {} error(s) and {} warning(s)",
                self.errors.len(),
                self.warnings.len()
            );
        }
    }

    fn colorize(&self, rendered: String, severity: &str) -> String {
        let keyword = format!("{severity}:");
        let colored = match severity {
            "error" => keyword.red().bold().to_string(),
            _ => keyword.yellow().bold().to_string(),
        };

        rendered.replacen(&keyword, &colored, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_format_matches_the_rendering_contract() {
        let mut sink = DiagnosticSink::with_filename("test.m");
        sink.type_error(PrimitiveType::Bool, PrimitiveType::I32, 3, 7);

        assert_eq!(
            sink.errors()[0].header(),
            "test.m:3:7: error: Type Error: Expected type 'bool' but got 'i32'"
        );
    }

    #[test]
    fn rendered_diagnostic_quotes_the_line_with_a_caret() {
        let source = SourceFile::from_string("a : i32 = 0;\nb : bool = 5;\n");
        let mut sink = DiagnosticSink::new();
        sink.type_error(PrimitiveType::Bool, PrimitiveType::I32, 2, 1);

        let rendered = sink.errors()[0].render(&source);
        let mut lines = rendered.lines();

        assert_eq!(
            lines.next(),
            Some("2:1: error: Type Error: Expected type 'bool' but got 'i32'")
        );
        assert_eq!(lines.next(), Some("   2 | b : bool = 5;"));
        assert_eq!(lines.next(), Some("     | ^"));
    }

    #[test]
    fn caret_preserves_tabs_in_the_line_prefix() {
        let source = SourceFile::from_string("\t\tx = 1;\n");
        let mut sink = DiagnosticSink::new();
        sink.undefined_symbol("x", 1, 3);

        let rendered = sink.errors()[0].render(&source);
        let caret_line = rendered.lines().last().unwrap();

        assert_eq!(caret_line, "     | \t\t^");
    }

    #[test]
    fn warnings_do_not_count_as_errors() {
        let mut sink = DiagnosticSink::new();
        sink.uninitialized_variable("x", 1, 1);

        assert!(!sink.has_errors());
        assert!(sink.has_warnings());
        assert_eq!(sink.warnings()[0].severity, Severity::Warning);
    }

    #[test]
    fn diagnostics_keep_input_order() {
        let mut sink = DiagnosticSink::new();
        sink.undefined_symbol("a", 1, 1);
        sink.redefined_symbol("b", 2, 1);
        sink.constant_assignment("c", 3, 1);

        let kinds: Vec<_> = sink.errors().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::UndefinedSymbol,
                DiagnosticKind::RedefinedSymbol,
                DiagnosticKind::ConstantAssignment,
            ]
        );
    }
}
