//! BASIC serialization.
//!
//! One line per instruction, `"{line} {statement}"`. Every binary expression
//! is parenthesized, so operator precedence in the target never matters.

use crate::ir::ast::{BinOp, UnOp};
use crate::ir::flat::{Expr, FlatInstruction, FlatProgram, Op, PrintArg};

pub fn write_program(program: &FlatProgram) -> String {
    let mut text = write_lines(&program.instrs).join("\n");
    text.push('\n');
    text
}

pub fn write_lines(instrs: &[FlatInstruction]) -> Vec<String> {
    instrs
        .iter()
        .map(|ins| {
            let stmt = statement(&ins.op);
            match ins.line {
                Some(n) => format!("{n} {stmt}"),
                None => stmt,
            }
        })
        .collect()
}

fn statement(op: &Op) -> String {
    match op {
        Op::Assign { dst, src } => format!("{dst} = {}", expr(src)),
        Op::Print(PrintArg::Slot(s)) => format!("PRINT {s}"),
        Op::Print(PrintArg::Num(n)) => format!("PRINT {n}"),
        Op::Print(PrintArg::Str(s)) => format!("PRINT \"{s}\""),
        Op::JumpIfFalse { cond, target } => {
            format!("IF NOT {} THEN {}", grouped(cond), target)
        }
        Op::Jump(target) => format!("GOTO {}", target),
        Op::Halt => "STOP".to_string(),
    }
}

fn operator(op: BinOp) -> &'static str {
    match op {
        BinOp::Eq => "=",
        BinOp::Gt => ">",
        BinOp::Or => "OR",
        BinOp::And => "AND",
        BinOp::Plus => "+",
        BinOp::Minus => "-",
        BinOp::Mult => "*",
        BinOp::Div => "\\",
    }
}

fn expr(e: &Expr) -> String {
    match e {
        Expr::Num(n) => n.to_string(),
        Expr::Slot(s) => s.clone(),
        Expr::Unary { op: UnOp::Neg, operand } => format!("-{}", grouped(operand)),
        Expr::Unary { op: UnOp::Not, operand } => format!("NOT {}", grouped(operand)),
        Expr::Binary { op, left, right } => {
            format!("({} {} {})", expr(left), operator(*op), expr(right))
        }
    }
}

/// `e` in parentheses, without doubling the ones a binary expression
/// already has.
fn grouped(e: &Expr) -> String {
    match e {
        Expr::Binary { .. } => expr(e),
        _ => format!("({})", expr(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::flat::{Label, Target};

    fn slot(s: &str) -> Box<Expr> {
        Box::new(Expr::Slot(s.into()))
    }

    fn at(line: u32, op: Op) -> FlatInstruction {
        let mut ins = FlatInstruction::new(op);
        ins.line = Some(line);
        ins
    }

    #[test]
    fn statements() {
        let instrs = vec![
            at(
                10,
                Op::Assign {
                    dst: "MAINx".into(),
                    src: Expr::Binary {
                        op: BinOp::Div,
                        left: slot("MAINx"),
                        right: Box::new(Expr::Num(2)),
                    },
                },
            ),
            at(
                20,
                Op::JumpIfFalse {
                    cond: Expr::Binary {
                        op: BinOp::Gt,
                        left: slot("MAINx"),
                        right: Box::new(Expr::Num(0)),
                    },
                    target: Target::Line(50),
                },
            ),
            at(30, Op::Print(PrintArg::Str("hi".into()))),
            at(40, Op::Jump(Target::Line(10))),
            at(50, Op::Halt),
        ];
        assert_eq!(
            write_lines(&instrs),
            vec![
                "10 MAINx = (MAINx \\ 2)",
                "20 IF NOT (MAINx > 0) THEN 50",
                "30 PRINT \"hi\"",
                "40 GOTO 10",
                "50 STOP",
            ]
        );
    }

    #[test]
    fn unary_operators() {
        let neg = Expr::Unary {
            op: UnOp::Neg,
            operand: slot("a"),
        };
        let not = Expr::Unary {
            op: UnOp::Not,
            operand: Box::new(Expr::Binary {
                op: BinOp::Eq,
                left: slot("a"),
                right: Box::new(Expr::Num(1)),
            }),
        };
        assert_eq!(expr(&neg), "-(a)");
        assert_eq!(expr(&not), "NOT (a = 1)");
        assert_eq!(
            statement(&Op::JumpIfFalse {
                cond: Expr::Slot("a".into()),
                target: Target::Label(Label("MAIN_END0001".into())),
            }),
            "IF NOT (a) THEN MAIN_END0001"
        );
    }
}
