//! SPL front end: tokenizer and parser.

pub mod lexer;
pub mod parser;

// Expose the LALRPOP-generated parser module under frontend::grammar
lalrpop_util::lalrpop_mod!(
    #[allow(clippy::all, unused_parens)]
    pub grammar,
    "/frontend/grammar.rs"
);

pub use parser::parse_program;
