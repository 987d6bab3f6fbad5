use emc::frontend::{parser::Parser, SourceFile};
use emc::ir::gen::{GenError, IrGenerator};
use emc::ir::optimize::OptLevel;
use emc::ir::Module;
use emc::middle::analyzer::SemanticAnalyzer;
use emc::middle::diagnostics::DiagnosticSink;
use indoc::indoc;

fn generate(source: &str, level: OptLevel) -> Result<Module, GenError> {
    let source = SourceFile::from_string(source);
    let mut sink = DiagnosticSink::new();

    let program = Parser::parse_program(&source, &mut sink).expect("parse failed");
    SemanticAnalyzer::check_program(&program, &mut sink);
    assert!(!sink.has_errors(), "semantic errors: {:?}", sink.errors());

    IrGenerator::generate(&program, level)
}

fn generate_text(source: &str, level: OptLevel) -> String {
    generate(source, level)
        .expect("IR generation should succeed")
        .print_to_string()
}

#[test]
fn test_smallest_valid_program() {
    // S1
    let ir = generate_text(": main () : i32 { return 0; }", OptLevel::O0);

    assert!(ir.contains("define i32 @main()"));
    assert!(ir.contains("ret i32 0"));
}

#[test]
fn test_return_widens_to_the_signature_type() {
    // S2: the i32 literal is sign-extended at the ret
    let ir = generate_text(": f () : i64 { return 1; }", OptLevel::O0);

    assert!(ir.contains("sext i32 1 to i64"));
    assert!(ir.contains("ret i64"));
}

#[test]
fn test_branching_function_lowers_to_then_and_else_blocks() {
    // S3
    let ir = generate_text(
        indoc! {"
            : abs (x : i32) : i32 {
                if (x < 0) { return -x; } else { return x; }
            }
        "},
        OptLevel::O0,
    );

    assert!(ir.contains("icmp slt i32"));
    assert!(ir.contains("then:"));
    assert!(ir.contains("else:"));
    assert_eq!(ir.matches("ret i32").count(), 2);

    // both arms return, so the merge block is dead and dropped
    assert!(!ir.contains("endif"));
}

#[test]
fn test_while_loop_lowers_to_cond_body_end_blocks() {
    // S4
    let ir = generate_text(
        indoc! {"
            : sum_to (n : i32) : i32 {
                s : i32 = 0;
                i : i32 = 0;
                while (i < n) { s = s + i; i = i + 1; }
                return s;
            }
        "},
        OptLevel::O0,
    );

    assert!(ir.contains("whilecond:"));
    assert!(ir.contains("whilebody:"));
    assert!(ir.contains("whileend:"));

    // one branch into the loop header plus the back edge from the body
    assert_eq!(ir.matches("br label %whilecond").count(), 2);
}

#[test]
fn test_generated_modules_pass_the_verifier() {
    let sources = [
        ": main () : i32 { return 0; }",
        ": f () : i64 { return 1; }",
        indoc! {"
            : abs (x : i32) : i32 {
                if (x < 0) { return -x; } else { return x; }
            }
        "},
        indoc! {"
            : sum_to (n : i32) : i32 {
                s : i32 = 0;
                i : i32 = 0;
                while (i < n) { s = s + i; i = i + 1; }
                return s;
            }
        "},
    ];

    for source in sources {
        for level in [OptLevel::O0, OptLevel::O1, OptLevel::O2, OptLevel::O3] {
            let module = generate(source, level).expect("generation should succeed");
            module.verify().expect("module should verify");
        }
    }
}

#[test]
fn test_every_block_ends_in_exactly_one_terminator() {
    let module = generate(
        indoc! {"
            : classify (x : i32) : i32 {
                if (x < 0) { return 0 - 1; }
                if (x > 0) { return 1; }
                return 0;
            }
        "},
        OptLevel::O0,
    )
    .expect("generation should succeed");

    for function in module.functions.iter().filter(|f| !f.is_declaration()) {
        for block in function.blocks.iter() {
            assert!(
                block.terminator.is_some(),
                "block '{}' is unterminated",
                block.label
            );
        }
    }
}

#[test]
fn test_void_functions_get_an_implicit_ret_void() {
    let ir = generate_text(": main () : void { x : i32 = 1; }", OptLevel::O0);

    assert!(ir.contains("ret void"));
}

#[test]
fn test_parameters_are_spilled_to_stack_slots() {
    let ir = generate_text(": id (x : i32) : i32 { return x; }", OptLevel::O0);

    assert!(ir.contains("alloca i32"));
    assert!(ir.contains("store i32 %x"));
    assert!(ir.contains("load i32"));
}

#[test]
fn test_identity_cast_emits_nothing() {
    let ir = generate_text(": main () : i32 { return (1 as : i32); }", OptLevel::O0);

    assert!(!ir.contains("sext"));
    assert!(!ir.contains("trunc"));
    assert!(ir.contains("ret i32 1"));
}

#[test]
fn test_narrowing_cast_truncates() {
    let ir = generate_text(
        ": main () : i32 { x : i8 = (300 as : i8); return 0; }",
        OptLevel::O0,
    );

    assert!(ir.contains("trunc i32 300 to i8"));
}

#[test]
fn test_int_to_float_cast_uses_sitofp() {
    let ir = generate_text(
        ": main () : void { x : f64 = (7 as : f64); }",
        OptLevel::O0,
    );

    assert!(ir.contains("sitofp i32 7 to double"));
}

#[test]
fn test_float_to_int_cast_uses_fptosi() {
    let ir = generate_text(
        ": main () : void { x : i32 = (2.5 as : i32); }",
        OptLevel::O0,
    );

    assert!(ir.contains("fptosi float"));
}

#[test]
fn test_mixed_width_arithmetic_widens_the_narrow_side() {
    let ir = generate_text(
        ": f (a : i32, b : i64) : i64 { return a + b; }",
        OptLevel::O0,
    );

    assert!(ir.contains("sext i32"));
    assert!(ir.contains("add i64"));
}

#[test]
fn test_mixed_int_float_arithmetic_converts_to_float() {
    let ir = generate_text(
        ": f (a : f32) : f64 { return a + 1; }",
        OptLevel::O0,
    );

    assert!(ir.contains("sitofp i32 1 to float"));
    assert!(ir.contains("fadd float"));
    assert!(ir.contains("fpext float"));
    assert!(ir.contains("ret double"));
}

#[test]
fn test_float_comparison_uses_ordered_predicates() {
    let ir = generate_text(
        ": f (a : f32, b : f32) : bool { return a < b; }",
        OptLevel::O0,
    );

    assert!(ir.contains("fcmp olt float"));
    assert!(ir.contains("ret i1"));
}

#[test]
fn test_logical_operators_are_bitwise_on_i1() {
    let ir = generate_text(
        ": f (a : bool, b : bool) : bool { return a && !b; }",
        OptLevel::O0,
    );

    assert!(ir.contains("xor i1"));
    assert!(ir.contains("and i1"));
}

#[test]
fn test_unary_minus_on_floats_uses_fneg() {
    let ir = generate_text(": f (x : f32) : f32 { return -x; }", OptLevel::O0);

    assert!(ir.contains("fneg float"));
}

#[test]
fn test_calls_cast_arguments_to_parameter_types() {
    let ir = generate_text(
        indoc! {"
            : wide (x : i64) : i64 { return x; }
            : main () : i64 { return wide(5); }
        "},
        OptLevel::O0,
    );

    assert!(ir.contains("sext i32 5 to i64"));
    assert!(ir.contains("call i64 @wide(i64"));
    assert!(ir.contains("%calltmp"));
}

#[test]
fn test_call_to_a_later_definition_works() {
    // prototypes are declared for the whole program before any body
    let ir = generate_text(
        indoc! {"
            : f (x : i32) : i32 { return g(x); }
            : g (x : i32) : i32 { return x; }
        "},
        OptLevel::O0,
    );

    assert!(ir.contains("call i32 @g"));
}

#[test]
fn test_extern_functions_become_declarations() {
    let ir = generate_text(
        indoc! {"
            extern : putchar (c : i32) : i32;
            : main () : i32 { return putchar(65); }
        "},
        OptLevel::O0,
    );

    assert!(ir.contains("declare i32 @putchar(i32)"));
    assert!(ir.contains("call i32 @putchar(i32 65)"));
}

#[test]
fn test_void_calls_have_no_result_name() {
    let ir = generate_text(
        indoc! {"
            extern : exit (code : i32) : void;
            : main () : void { exit(0); }
        "},
        OptLevel::O0,
    );

    assert!(ir.contains("call void @exit(i32 0)"));
    assert!(!ir.contains("= call void"));
}

#[test]
fn test_for_statement_is_refused_by_the_generator() {
    let source = SourceFile::from_string(indoc! {"
        : main () : void {
            for (i : i32 = 0; i < 10; i = i + 1) { }
        }
    "});
    let mut sink = DiagnosticSink::new();

    let program = Parser::parse_program(&source, &mut sink).expect("parse failed");
    SemanticAnalyzer::check_program(&program, &mut sink);
    assert!(!sink.has_errors());

    let error = IrGenerator::generate(&program, OptLevel::O0).unwrap_err();
    assert!(matches!(error, GenError::NotImplemented(_)));
    assert!(error.to_string().contains("not implemented"));
}

#[test]
fn test_string_declarations_are_fatal_in_the_generator() {
    let source = SourceFile::from_string(r#": main () : void { s : string = "hi"; }"#);
    let mut sink = DiagnosticSink::new();

    let program = Parser::parse_program(&source, &mut sink).expect("parse failed");
    SemanticAnalyzer::check_program(&program, &mut sink);
    assert!(!sink.has_errors());

    let error = IrGenerator::generate(&program, OptLevel::O0).unwrap_err();
    assert!(matches!(error, GenError::UnsupportedType(_)));
}

#[test]
fn test_builtin_calls_fail_in_the_generator_not_the_analyzer() {
    // print type-checks but has no IR-level definition
    let source = SourceFile::from_string(r#": main () : void { print("hi"); }"#);
    let mut sink = DiagnosticSink::new();

    let program = Parser::parse_program(&source, &mut sink).expect("parse failed");
    SemanticAnalyzer::check_program(&program, &mut sink);
    assert!(!sink.has_errors());

    assert!(IrGenerator::generate(&program, OptLevel::O0).is_err());
}

#[test]
fn test_global_variable_reads_are_a_generator_error() {
    let source = SourceFile::from_string(indoc! {"
        limit : i32 = 10;
        : main () : i32 { return limit; }
    "});
    let mut sink = DiagnosticSink::new();

    let program = Parser::parse_program(&source, &mut sink).expect("parse failed");
    SemanticAnalyzer::check_program(&program, &mut sink);
    assert!(!sink.has_errors());

    let error = IrGenerator::generate(&program, OptLevel::O0).unwrap_err();
    assert!(matches!(error, GenError::UnknownLocal(_)));
}

#[test]
fn test_constant_arithmetic_folds_at_o2() {
    let at_o0 = generate_text(": main () : i32 { return 1 + 2; }", OptLevel::O0);
    let at_o2 = generate_text(": main () : i32 { return 1 + 2; }", OptLevel::O2);

    assert!(at_o0.contains("add i32 1, 2"));
    assert!(at_o2.contains("ret i32 3"));
    assert!(!at_o2.contains("add"));
}

#[test]
fn test_constant_branches_collapse_at_o2() {
    let ir = generate_text(
        indoc! {"
            : main () : i32 {
                if (true) { return 1; } else { return 2; }
            }
        "},
        OptLevel::O2,
    );

    assert!(!ir.contains("br i1"));
    assert!(ir.contains("ret i32 1"));
    assert!(!ir.contains("ret i32 2"));
}

#[test]
fn test_loops_survive_optimization() {
    let ir = generate_text(
        indoc! {"
            : sum_to (n : i32) : i32 {
                s : i32 = 0;
                i : i32 = 0;
                while (i < n) { s = s + i; i = i + 1; }
                return s;
            }
        "},
        OptLevel::O2,
    );

    assert!(ir.contains("whilecond"));
    assert!(ir.contains("icmp slt i32"));
}

#[test]
fn test_redeclaring_a_prototype_is_idempotent() {
    let module = generate(
        indoc! {"
            : f (x : i32) : i32 { return x; }
            : main () : i32 { return f(f(1)); }
        "},
        OptLevel::O0,
    )
    .expect("generation should succeed");

    // one definition of f, one of main; no duplicates from re-declaration
    assert_eq!(module.functions.len(), 2);
    let ir = module.print_to_string();
    assert_eq!(ir.matches("define i32 @f(").count(), 1);
}

#[test]
fn test_float_literals_print_bit_exact() {
    let ir = generate_text(": main () : void { x : f32 = 1.5; }", OptLevel::O0);

    // 1.5 is exactly representable; the printer always uses hex double bits
    assert!(ir.contains("0x3FF8000000000000"));
}

#[test]
fn test_shadowed_locals_get_distinct_slots() {
    let ir = generate_text(
        indoc! {"
            : main () : i32 {
                x : i32 = 1;
                {
                    x : i32 = 2;
                    x = 3;
                }
                return x;
            }
        "},
        OptLevel::O0,
    );

    // two distinct allocas named after x
    assert!(ir.contains("%x = alloca i32"));
    assert!(ir.contains("%x1 = alloca i32"));
    assert!(ir.contains("store i32 3, ptr %x1"));
}
