use emc::frontend::{parser::Parser, SourceFile};
use emc::middle::analyzer::SemanticAnalyzer;
use emc::middle::diagnostics::{DiagnosticKind, DiagnosticSink};
use emc::middle::symbol::Symbol;
use indoc::indoc;

fn analyze(source: &str) -> DiagnosticSink {
    let source = SourceFile::from_string(source);
    let mut sink = DiagnosticSink::new();

    let program = Parser::parse_program(&source, &mut sink).expect("parse failed");
    SemanticAnalyzer::check_program(&program, &mut sink);

    sink
}

fn error_kinds(sink: &DiagnosticSink) -> Vec<DiagnosticKind> {
    sink.errors().iter().map(|e| e.kind).collect()
}

#[test]
fn test_assignment_to_undefined_symbol_fails() {
    // S5: assigning to a name that was never declared
    let sink = analyze(": main () : void { y = 1; }");

    assert!(sink.has_errors());
    assert!(error_kinds(&sink).contains(&DiagnosticKind::UndefinedSymbol));
    assert!(sink.errors()[0].message.contains("'y'"));
}

#[test]
fn test_wrong_arity_reports_once_and_skips_argument_checks() {
    // S6: the bool argument would also mismatch, but arity failure
    // suppresses per-argument checking for that call
    let sink = analyze(indoc! {"
        : f (x : i32) : i32 { return x; }
        : main () : void { f(1, true); }
    "});

    let kinds = error_kinds(&sink);
    assert_eq!(kinds, vec![DiagnosticKind::WrongArgumentCount]);
    assert!(sink.errors()[0].message.contains("expects 1 arguments but got 2"));
}

#[test]
fn test_if_condition_must_be_bool() {
    let sink = analyze(": main () : void { if (1) { } }");

    let kinds = error_kinds(&sink);
    assert_eq!(kinds, vec![DiagnosticKind::TypeError]);
    assert!(sink.errors()[0]
        .message
        .contains("Expected type 'bool' but got 'i32'"));
}

#[test]
fn test_while_condition_must_be_bool() {
    let sink = analyze(": main () : void { while (2 + 2) { } }");

    assert_eq!(error_kinds(&sink), vec![DiagnosticKind::TypeError]);
}

#[test]
fn test_non_void_function_needs_a_return() {
    let sink = analyze(": f () : i32 { x : i32 = 1; }");

    assert_eq!(error_kinds(&sink), vec![DiagnosticKind::SemanticError]);
    assert!(sink.errors()[0].message.contains("must return a value"));
}

#[test]
fn test_return_presence_is_not_path_complete() {
    // Only one branch returns; the presence-only check is satisfied
    let sink = analyze(indoc! {"
        : f (c : bool) : i32 {
            if (c) { return 1; }
        }
    "});

    assert!(!sink.has_errors());
}

#[test]
fn test_bare_return_in_void_function_is_fine() {
    let sink = analyze(": f () : void { return; }");

    assert!(!sink.has_errors());
}

#[test]
fn test_bare_return_in_non_void_function_errors() {
    let sink = analyze(": f () : i32 { return; }");

    assert_eq!(error_kinds(&sink), vec![DiagnosticKind::SemanticError]);
}

#[test]
fn test_returning_a_value_from_void_errors() {
    let sink = analyze(": f () : void { return 1; }");

    assert_eq!(error_kinds(&sink), vec![DiagnosticKind::TypeError]);
}

#[test]
fn test_duplicate_declaration_reports_exactly_one_redefinition() {
    let sink = analyze(indoc! {"
        : main () : void {
            x : i32 = 1;
            x : bool = true;
        }
    "});

    let kinds = error_kinds(&sink);
    assert_eq!(kinds, vec![DiagnosticKind::RedefinedSymbol]);
}

#[test]
fn test_duplicate_function_names_are_redefinitions() {
    let sink = analyze(indoc! {"
        : f () : void { }
        : f () : void { }
    "});

    assert_eq!(error_kinds(&sink), vec![DiagnosticKind::RedefinedSymbol]);
}

#[test]
fn test_forward_reference_type_checks() {
    // g is declared after f but phase A collects every signature first
    let sink = analyze(indoc! {"
        : f (x : i32) : i32 { return g(x); }
        : g (x : i32) : i32 { return x; }
    "});

    assert!(!sink.has_errors());
}

#[test]
fn test_mutual_recursion_type_checks() {
    let sink = analyze(indoc! {"
        : even (n : i32) : bool {
            if (n == 0) { return true; }
            return odd(n - 1);
        }
        : odd (n : i32) : bool {
            if (n == 0) { return false; }
            return even(n - 1);
        }
    "});

    assert!(!sink.has_errors());
}

#[test]
fn test_extern_functions_are_callable() {
    let sink = analyze(indoc! {"
        extern : putchar (c : i32) : i32;
        : main () : void { putchar(65); }
    "});

    assert!(!sink.has_errors());
}

#[test]
fn test_shadowing_uses_the_inner_symbol_until_scope_exit() {
    // the inner x is bool, so assigning a bool inside the block is fine;
    // after the block the outer i32 binding is visible again
    let sink = analyze(indoc! {"
        : main () : void {
            x : i32 = 1;
            {
                x : bool = true;
                x = false;
            }
            x = 2;
        }
    "});

    assert!(!sink.has_errors());
}

#[test]
fn test_sibling_scopes_do_not_leak_declarations() {
    let sink = analyze(indoc! {"
        : main () : void {
            { y : i32 = 1; }
            y = 2;
        }
    "});

    assert_eq!(error_kinds(&sink), vec![DiagnosticKind::UndefinedSymbol]);
}

#[test]
fn test_declaration_accepts_widening_initializer() {
    let sink = analyze(indoc! {"
        : main () : void {
            a : i64 = 1;
            b : f64 = 2.5;
            c : f32 = 3;
        }
    "});

    assert!(!sink.has_errors());
}

#[test]
fn test_declaration_rejects_narrowing_initializer() {
    let sink = analyze(": main () : void { x : i32 = (1 as : i64); }");

    assert_eq!(error_kinds(&sink), vec![DiagnosticKind::TypeError]);
    assert!(sink.errors()[0]
        .message
        .contains("Expected type 'i32' but got 'i64'"));
}

#[test]
fn test_assignment_uses_assignability_not_exact_equality() {
    // an i32 value widens into an i64 variable on assignment, just like in
    // a declaration
    let sink = analyze(indoc! {"
        : main () : void {
            x : i64 = 0;
            x = 1;
        }
    "});

    assert!(!sink.has_errors());
}

#[test]
fn test_assignment_rejects_incompatible_value() {
    let sink = analyze(indoc! {"
        : main () : void {
            x : i32 = 0;
            x = true;
        }
    "});

    assert_eq!(error_kinds(&sink), vec![DiagnosticKind::TypeError]);
}

#[test]
fn test_assigning_to_a_function_is_invalid() {
    let sink = analyze(indoc! {"
        : f () : void { }
        : main () : void { f = 1; }
    "});

    assert_eq!(error_kinds(&sink), vec![DiagnosticKind::InvalidAssignment]);
    assert!(sink.errors()[0].message.contains("'f' is not a variable"));
}

#[test]
fn test_calling_a_variable_is_not_a_function() {
    let sink = analyze(indoc! {"
        : main () : void {
            x : i32 = 1;
            x();
        }
    "});

    assert_eq!(error_kinds(&sink), vec![DiagnosticKind::FunctionNotFound]);
}

#[test]
fn test_argument_type_must_be_assignable() {
    let sink = analyze(indoc! {"
        : f (x : i32) : void { }
        : main () : void { f(true); }
    "});

    assert_eq!(error_kinds(&sink), vec![DiagnosticKind::TypeError]);
}

#[test]
fn test_argument_widening_is_permitted() {
    let sink = analyze(indoc! {"
        : f (x : i64) : void { }
        : main () : void { f(1); }
    "});

    assert!(!sink.has_errors());
}

#[test]
fn test_arithmetic_requires_numeric_operands() {
    let sink = analyze(": main () : void { x : i32 = true + 1; }");

    assert_eq!(error_kinds(&sink), vec![DiagnosticKind::IncompatibleTypes]);
    assert!(sink.errors()[0]
        .message
        .contains("Cannot apply '+' to types 'bool' and 'i32'"));
}

#[test]
fn test_arithmetic_widens_to_the_common_type() {
    let sink = analyze(indoc! {"
        : main () : void {
            a : i64 = 1 + (2 as : i64);
            b : f32 = 1 + 2.5;
            c : f64 = (1.0 as : f64) + 2;
        }
    "});

    assert!(!sink.has_errors());
}

#[test]
fn test_comparison_requires_comparable_operands() {
    let sink = analyze(": main () : void { x : bool = true < 1; }");

    assert_eq!(error_kinds(&sink), vec![DiagnosticKind::IncompatibleTypes]);
}

#[test]
fn test_mixed_numeric_comparison_is_comparable() {
    let sink = analyze(": main () : void { x : bool = 1 < 2.5; }");

    assert!(!sink.has_errors());
}

#[test]
fn test_logical_operators_require_bool() {
    let sink = analyze(": main () : void { x : bool = 1 && true; }");

    assert_eq!(error_kinds(&sink), vec![DiagnosticKind::TypeError]);
}

#[test]
fn test_logical_not_requires_bool() {
    let sink = analyze(": main () : void { x : bool = !3; }");

    assert_eq!(error_kinds(&sink), vec![DiagnosticKind::TypeError]);
}

#[test]
fn test_unary_minus_requires_numeric() {
    let sink = analyze(": main () : void { x : bool = -true; }");

    assert_eq!(error_kinds(&sink), vec![DiagnosticKind::IncompatibleTypes]);
}

#[test]
fn test_cast_between_numerics_is_allowed() {
    let sink = analyze(indoc! {"
        : main () : void {
            a : i8 = (300 as : i8);
            b : f64 = (1 as : f64);
            c : i32 = (2.5 as : i32);
        }
    "});

    assert!(!sink.has_errors());
}

#[test]
fn test_cast_from_bool_to_int_is_rejected() {
    let sink = analyze(": main () : void { x : i32 = (true as : i32); }");

    assert_eq!(error_kinds(&sink), vec![DiagnosticKind::IncompatibleTypes]);
    assert!(sink.errors()[0]
        .message
        .contains("Cannot apply 'as' to types 'bool' and 'i32'"));
}

#[test]
fn test_a_single_undefined_symbol_does_not_cascade() {
    // z is unknown; the addition and the initialization swallow it
    let sink = analyze(": main () : void { x : i32 = z + 1; }");

    assert_eq!(error_kinds(&sink), vec![DiagnosticKind::UndefinedSymbol]);
}

#[test]
fn test_string_literals_type_check_against_builtins() {
    let sink = analyze(indoc! {r#"
        : main () : void {
            print("hello");
            println(toString(42));
        }
    "#});

    assert!(!sink.has_errors());
}

#[test]
fn test_builtin_arity_is_enforced() {
    let sink = analyze(r#": main () : void { print("a", "b"); }"#);

    assert_eq!(error_kinds(&sink), vec![DiagnosticKind::WrongArgumentCount]);
}

#[test]
fn test_for_statement_type_checks_its_pieces() {
    let sink = analyze(indoc! {"
        : main () : void {
            for (i : i32 = 0; i < 10; i = i + 1) { }
        }
    "});

    assert!(!sink.has_errors());
}

#[test]
fn test_for_condition_must_be_bool() {
    let sink = analyze(indoc! {"
        : main () : void {
            for (i : i32 = 0; i + 1; i = i + 1) { }
        }
    "});

    assert_eq!(error_kinds(&sink), vec![DiagnosticKind::TypeError]);
}

#[test]
fn test_diagnostics_arrive_in_source_order() {
    let sink = analyze(indoc! {"
        : main () : void {
            if (1) { }
            y = 2;
        }
    "});

    let kinds = error_kinds(&sink);
    assert_eq!(
        kinds,
        vec![DiagnosticKind::TypeError, DiagnosticKind::UndefinedSymbol]
    );
    assert!(sink.errors()[0].line < sink.errors()[1].line);
}

#[test]
fn test_function_symbols_record_their_body_scope() {
    let source = SourceFile::from_string(": f (x : i32) : i32 { return x; }");
    let mut sink = DiagnosticSink::new();

    let program = Parser::parse_program(&source, &mut sink).expect("parse failed");
    let table = SemanticAnalyzer::check_program(&program, &mut sink);
    assert!(!sink.has_errors());

    let Some(Symbol::Function(f)) = table.resolve("f") else {
        panic!("f should resolve to a function symbol");
    };

    let scope = table.scope(f.local_scope.expect("body scope recorded"));
    assert_eq!(scope.name, "f");
    assert!(scope.symbols().any(|s| s.name() == "x"));
}

#[test]
fn test_global_variables_define_in_the_global_scope() {
    let sink = analyze(indoc! {"
        limit : i32 = 10;
        : main () : i32 { return limit; }
    "});

    assert!(!sink.has_errors());
}
