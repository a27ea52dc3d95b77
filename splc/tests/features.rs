use splc::backend::sim;
use splc::ir::flat::Op;
use splc::{compile, compile_to_basic, lower, parse, ErrorKind, LowerOptions};

const BRANCHY: &str = "glob{g} proc{} func{} \
    main{var{x} x = 3; if (x > 2) { print 1 } else { }; print g; halt}";

fn goto_count(basic: &str) -> usize {
    basic.lines().filter(|l| l.contains(" GOTO ")).count()
}

// ── Options ──────────────────────────────────────────────────────────────

#[test]
fn default_options() {
    let options = LowerOptions::default();
    assert_eq!(options.max_inline_depth, 32);
    assert_eq!(options.line_start, 10);
    assert_eq!(options.line_step, 10);
    assert!(options.eliminate_dead_jumps);
    assert!(options.zero_init_globals);
}

#[test]
fn options_from_partial_json() {
    let options: LowerOptions = serde_json::from_str(r#"{ "line_start": 100, "line_step": 5 }"#).unwrap();
    assert_eq!(options.line_start, 100);
    assert_eq!(options.line_step, 5);
    assert_eq!(options.max_inline_depth, 32);

    let basic = compile_to_basic(BRANCHY, &options).unwrap();
    assert!(basic.starts_with("100 GLOBALg = 0\n105 "), "{basic}");
}

#[test]
fn zero_line_step_is_rejected() {
    let options = LowerOptions {
        line_step: 0,
        ..LowerOptions::default()
    };
    assert!(options.validate().is_err());
    let err = compile_to_basic(BRANCHY, &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOption);
    assert!(err.to_string().contains("line_step"), "{err}");
}

#[test]
fn line_numbers_past_u32_max_are_rejected() {
    let options = LowerOptions {
        line_start: u32::MAX - 5,
        ..LowerOptions::default()
    };
    let err = compile_to_basic(BRANCHY, &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOption);
    assert!(err.to_string().contains("line_start"), "{err}");
}

#[test]
fn dead_jump_to_empty_else_is_removed() {
    let basic = compile_to_basic(BRANCHY, &LowerOptions::default()).unwrap();
    assert_eq!(goto_count(&basic), 0, "{basic}");

    let keep = LowerOptions {
        eliminate_dead_jumps: false,
        ..LowerOptions::default()
    };
    let basic = compile_to_basic(BRANCHY, &keep).unwrap();
    assert_eq!(goto_count(&basic), 1, "{basic}");
}

#[test]
fn live_jumps_survive_elimination() {
    let source = "glob{} proc{} func{} \
        main{var{x} if (x eq 0) { print 1 } else { print 2 }; print 3; halt}";
    let basic = compile_to_basic(source, &LowerOptions::default()).unwrap();
    assert_eq!(goto_count(&basic), 1, "{basic}");
}

#[test]
fn globals_zero_init_can_be_disabled() {
    let options = LowerOptions {
        zero_init_globals: false,
        ..LowerOptions::default()
    };
    let program = compile(BRANCHY, &options).unwrap();
    assert!(matches!(&program.instrs[0].op, Op::Assign { dst, .. } if dst == "MAINx"));
    assert_eq!(program.instrs[0].line, Some(10));
}

// ── Pipeline entry points ────────────────────────────────────────────────

#[test]
fn lower_accepts_a_parsed_program() {
    let program = parse(BRANCHY).unwrap();
    let flat = lower(&program, &LowerOptions::default()).unwrap();
    let out = sim::run(&flat, 1000).unwrap();
    assert_eq!(out.output, vec!["1", "0"]);
    assert_eq!(out.slot("MAINx"), 3);
}

#[test]
fn flat_listing_shows_lines_and_labels() {
    let keep = LowerOptions {
        eliminate_dead_jumps: false,
        ..LowerOptions::default()
    };
    let lines = compile(BRANCHY, &keep).unwrap().to_lines();
    assert_eq!(lines[0], "   10  GLOBALg := 0");
    assert!(lines
        .iter()
        .any(|l| l.contains("[MAIN_ELSE0001, MAIN_END0002]")));
    assert!(lines.iter().any(|l| l.contains("if_false (MAINx > 2) goto ")));
}

#[test]
fn strings_and_numbers_print_verbatim() {
    let source = "glob{} proc{} func{} main{var{} print \"hello\"; print 42; halt}";
    let basic = compile_to_basic(source, &LowerOptions::default()).unwrap();
    assert_eq!(basic, "10 PRINT \"hello\"\n20 PRINT 42\n30 STOP\n");
}

#[test]
fn unary_terms() {
    let source = "glob{} proc{} func{} \
        main{var{a} a = (neg 4); print a; if (not (a > 0)) { print 1 } else { print 0 }; halt}";
    let flat = compile(source, &LowerOptions::default()).unwrap();
    assert_eq!(sim::run(&flat, 100).unwrap().output, vec!["-4", "1"]);
    let basic = compile_to_basic(source, &LowerOptions::default()).unwrap();
    assert!(basic.contains("MAINa = -(4)"), "{basic}");
    assert!(basic.contains("NOT (MAINa > 0)"), "{basic}");
}

#[test]
fn shadowed_names_get_distinct_slots() {
    let source = "glob{x} proc{p(x){local{} print x}} func{} main{var{y} x = 1; p(2); print x; halt}";
    let flat = compile(source, &LowerOptions::default()).unwrap();
    assert!(flat.slot("GLOBALx").is_some());
    assert!(flat.slot("P1x").is_some());
    assert_eq!(sim::run(&flat, 100).unwrap().output, vec!["2", "1"]);
}
