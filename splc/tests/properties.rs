use proptest::collection::vec;
use proptest::option;
use proptest::prelude::*;
use proptest::sample::select;
use splc::backend::sim::{self, SimError};
use splc::ir::ast::{Atom, BinOp, Instr, Output, Program, Term};
use splc::ir::flat::{FlatProgram, Target};
use splc::{lower, parse, LowerOptions};
use std::collections::HashSet;

/// Globals `a` and `b`, a procedure and a function that touch them. Main's
/// body is generated.
const FRAME: &str = "glob{a b} \
    proc{p(y){local{k} k = (k plus y); a = (a plus k)}} \
    func{f(x){local{t} t = (x plus b); return t}} \
    main{var{} halt}";

fn var() -> impl Strategy<Value = &'static str> {
    select(vec!["a", "b"])
}

fn term() -> impl Strategy<Value = Term> {
    let leaf = prop_oneof![(0i64..20).prop_map(Term::num), var().prop_map(Term::var)];
    leaf.prop_recursive(3, 12, 2, |inner| {
        prop_oneof![
            (
                inner.clone(),
                inner.clone(),
                select(vec![BinOp::Plus, BinOp::Minus, BinOp::Gt, BinOp::Eq, BinOp::And])
            )
                .prop_map(|(l, r, op)| Term::binary(op, l, r)),
            inner.prop_map(|t| Term::call("f", vec![t])),
        ]
    })
}

fn instr() -> impl Strategy<Value = Instr> {
    let leaf = prop_oneof![
        (var(), term()).prop_map(|(v, t)| Instr::Assign {
            target: v.to_string(),
            value: t
        }),
        var().prop_map(|v| Instr::Print(Output::Atom(Atom::Var(v.to_string())))),
        term().prop_map(|t| Instr::Call {
            name: "p".to_string(),
            args: vec![t]
        }),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            (term(), vec(inner.clone(), 0..3), option::of(vec(inner.clone(), 0..3))).prop_map(
                |(cond, then_branch, else_branch)| Instr::If {
                    cond,
                    then_branch,
                    else_branch
                }
            ),
            (term(), vec(inner.clone(), 0..3)).prop_map(|(cond, body)| Instr::While { cond, body }),
            (vec(inner, 0..3), term()).prop_map(|(body, cond)| Instr::DoUntil { body, cond }),
        ]
    })
}

fn program_with(body: Vec<Instr>) -> Program {
    let mut program = parse(FRAME).unwrap();
    program.main.body = body;
    program
}

fn check_resolved(flat: &FlatProgram) -> Result<(), TestCaseError> {
    let lines: Vec<u32> = flat.instrs.iter().filter_map(|i| i.line).collect();
    prop_assert_eq!(lines.len(), flat.instrs.len());
    prop_assert!(lines.windows(2).all(|w| w[0] < w[1]));
    let known: HashSet<u32> = lines.into_iter().collect();
    for ins in &flat.instrs {
        match ins.target() {
            Some(Target::Line(n)) => prop_assert!(known.contains(n)),
            Some(Target::Label(l)) => prop_assert!(false, "unresolved label {}", l),
            None => {}
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn flat_names_are_unique(body in vec(instr(), 0..6)) {
        let flat = lower(&program_with(body), &LowerOptions::default()).unwrap();
        let mut seen = HashSet::new();
        for slot in &flat.slots {
            prop_assert!(seen.insert(slot.name.to_ascii_lowercase()), "duplicate slot {}", slot.name);
        }
    }

    #[test]
    fn every_jump_is_paired(body in vec(instr(), 0..6), eliminate in any::<bool>()) {
        let options = LowerOptions { eliminate_dead_jumps: eliminate, ..LowerOptions::default() };
        let flat = lower(&program_with(body), &options).unwrap();
        check_resolved(&flat)?;
        match sim::run(&flat, 2_000) {
            Ok(_) | Err(SimError::StepLimit { .. }) => {}
            Err(other) => prop_assert!(false, "unexpected run error {}", other),
        }
    }

    #[test]
    fn do_until_body_runs_at_least_once(n in 0i64..100, body in vec(instr(), 0..3)) {
        let mut inner = vec![Instr::Print(Output::Atom(Atom::Num(n)))];
        inner.extend(body);
        let program = program_with(vec![
            Instr::DoUntil { body: inner, cond: Term::num(1) },
            Instr::Halt,
        ]);
        let flat = lower(&program, &LowerOptions::default()).unwrap();
        if let Ok(outcome) = sim::run(&flat, 2_000) {
            let expected = n.to_string();
            prop_assert_eq!(outcome.output.first().map(String::as_str), Some(expected.as_str()));
        }
    }

    #[test]
    fn while_false_never_runs_body(body in vec(instr(), 0..4)) {
        let program = program_with(vec![
            Instr::While { cond: Term::num(0), body },
            Instr::Print(Output::Str("after".to_string())),
            Instr::Halt,
        ]);
        let flat = lower(&program, &LowerOptions::default()).unwrap();
        let outcome = sim::run(&flat, 2_000).unwrap();
        prop_assert_eq!(outcome.output, vec!["after".to_string()]);
    }
}
