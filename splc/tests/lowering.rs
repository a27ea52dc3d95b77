use splc::backend::{basic, sim};
use splc::ir::flat::{FlatProgram, Op, PrintArg, Target};
use splc::{compile, LowerOptions};

const SHOW_DOUBLE: &str = "glob{c} proc{show(){local{} print c}} \
    func{double(n){local{}; return (n plus n)}} \
    main{var{x} x=5; c=double(x); show(); halt}";

fn lower(source: &str) -> FlatProgram {
    compile(source, &LowerOptions::default()).unwrap()
}

fn run(source: &str) -> Vec<String> {
    sim::run(&lower(source), 10_000).unwrap().output
}

fn assigned_slots(program: &FlatProgram) -> Vec<&str> {
    program
        .instrs
        .iter()
        .filter_map(|i| match &i.op {
            Op::Assign { dst, .. } => Some(dst.as_str()),
            _ => None,
        })
        .collect()
}

// ── End-to-end scenario ──────────────────────────────────────────────────

#[test]
fn show_double_lowers_in_order() {
    let program = lower(SHOW_DOUBLE);
    let assigned = assigned_slots(&program);
    // The zero-init of GLOBALc comes first; the call result is the last write.
    assert_eq!(assigned.first(), Some(&"GLOBALc"));
    let param = assigned.iter().position(|s| *s == "DOUBLE1n").unwrap();
    let last_c = assigned.iter().rposition(|s| *s == "GLOBALc").unwrap();
    assert!(param < last_c);

    let prints: Vec<&PrintArg> = program
        .instrs
        .iter()
        .filter_map(|i| match &i.op {
            Op::Print(arg) => Some(arg),
            _ => None,
        })
        .collect();
    assert_eq!(prints, vec![&PrintArg::Slot("GLOBALc".into())]);

    assert_eq!(program.instrs.last().map(|i| &i.op), Some(&Op::Halt));
    assert!(program
        .instrs
        .iter()
        .all(|i| !matches!(i.target(), Some(Target::Label(_)))));
}

#[test]
fn show_double_basic_text() {
    let program = lower(SHOW_DOUBLE);
    assert_eq!(
        basic::write_program(&program),
        "10 GLOBALc = 0\n\
         20 MAINx = 5\n\
         30 DOUBLE1n = MAINx\n\
         40 GLOBALc = (DOUBLE1n + DOUBLE1n)\n\
         50 PRINT GLOBALc\n\
         60 STOP\n"
    );
    assert_eq!(run(SHOW_DOUBLE), vec!["10"]);
}

// ── Call-site independence ───────────────────────────────────────────────

#[test]
fn call_sites_do_not_share_locals() {
    let source = "glob{} proc{bump(v){local{k} k = (k plus v); print k}} func{} \
                  main{var{} bump(1); bump(5); bump(1)}";
    // A shared local would accumulate: 1, 6, 7.
    assert_eq!(run(source), vec!["1", "5", "1"]);

    let program = lower(source);
    for name in ["BUMP1k", "BUMP2k", "BUMP3k", "BUMP1v", "BUMP2v", "BUMP3v"] {
        assert!(program.slot(name).is_some(), "missing slot {name}");
    }
}

#[test]
fn nested_calls_get_fresh_copies() {
    let source = "glob{} proc{} \
        func{inc(a){local{t} t = (a plus 1); return t} twice(b){local{}; return inc(inc(b))}} \
        main{var{x y} x = twice(1); y = twice(10); print x; print y; halt}";
    assert_eq!(run(source), vec!["3", "12"]);
    let program = lower(source);
    assert!(program.slot("INC4t").is_some());
    assert!(program.slot("INC5t").is_none());
}

// ── Evaluation order ─────────────────────────────────────────────────────

#[test]
fn arguments_evaluate_left_to_right() {
    let source = "glob{g} proc{} \
        func{setg(v){local{} g = v; return v} pair(a b){local{}; return ((a mult 10) plus b)}} \
        main{var{r} r = pair(setg(1) setg(2)); print r; print g; halt}";
    assert_eq!(run(source), vec!["12", "2"]);
}

#[test]
fn left_operand_is_read_before_a_later_call() {
    let source = "glob{g} proc{} func{setg(v){local{} g = v; return v}} \
        main{var{r} g = 1; r = (g plus setg(5)); print r; print g; halt}";
    assert_eq!(run(source), vec!["6", "5"]);
}

#[test]
fn procedure_sees_global_writes_of_earlier_calls() {
    let source = "glob{total} proc{add(n){local{} total = (total plus n)}} func{} \
        main{var{} add(2); add(3); print total; halt}";
    assert_eq!(run(source), vec!["5"]);
}

// ── Loop semantics ───────────────────────────────────────────────────────

#[test]
fn do_until_runs_body_once_when_condition_starts_true() {
    let source = "glob{} proc{} func{} main{var{} do { print 1 } until (1 eq 1); halt}";
    assert_eq!(run(source), vec!["1"]);
}

#[test]
fn while_skips_body_when_condition_starts_false() {
    let source = "glob{} proc{} func{} main{var{} while (0 > 1) { print 1 }; print 2; halt}";
    assert_eq!(run(source), vec!["2"]);
}

#[test]
fn loop_condition_calls_are_reevaluated() {
    let source = "glob{n} proc{} func{below(k){local{}; return (k minus n)}} \
        main{var{} n = 0; while (below(3) > 0) { print n; n = (n plus 1) }; halt}";
    assert_eq!(run(source), vec!["0", "1", "2"]);
}

#[test]
fn do_until_condition_calls_are_reevaluated() {
    let source = "glob{n} proc{} func{reached(k){local{}; return (n minus k)}} \
        main{var{} do { n = (n plus 1) } until (reached(4) eq 0); print n; halt}";
    assert_eq!(run(source), vec!["4"]);
}

#[test]
fn falling_off_main_stops() {
    let source = "glob{} proc{} func{} main{var{x} if (x eq 0) { print 1 }}";
    let program = lower(source);
    assert_eq!(program.instrs.last().map(|i| &i.op), Some(&Op::Halt));
    assert_eq!(run(source), vec!["1"]);
}

// ── Jump pairing ─────────────────────────────────────────────────────────

#[test]
fn every_jump_lands_on_an_instruction() {
    let source = "glob{} proc{p(a){local{} while (a > 0) { if (a eq 2) { print a } else { }; a = (a minus 1) }}} \
        func{} main{var{i} i = 3; p(i); p(2); do { i = (i minus 1) } until (1 > i); halt}";
    let options = LowerOptions {
        eliminate_dead_jumps: false,
        ..LowerOptions::default()
    };
    let program = compile(source, &options).unwrap();
    let lines: Vec<u32> = program.instrs.iter().filter_map(|i| i.line).collect();
    assert_eq!(lines.len(), program.instrs.len());
    for ins in &program.instrs {
        match ins.target() {
            Some(Target::Line(n)) => assert!(lines.contains(n)),
            Some(Target::Label(l)) => panic!("unresolved label {l}"),
            None => {}
        }
    }
    assert_eq!(sim::run(&program, 10_000).unwrap().output, vec!["2", "2"]);
}
