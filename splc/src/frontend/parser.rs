//! SPL parser entry point.
//!
//! The grammar lives in `grammar.lalrpop`; this module feeds it the logos
//! token stream and turns LALRPOP errors into positioned [`CompileError`]s.

use super::grammar;
use super::lexer;
use crate::ir::ast::Program;
use crate::CompileError;

pub fn parse_program(source: &str) -> Result<Program, CompileError> {
    grammar::ProgramParser::new()
        .parse(source, lexer::lex_adapter(source))
        .map_err(|e| {
            use lalrpop_util::ParseError;

            fn fmt_expected(expected: &[String]) -> String {
                expected
                    .iter()
                    .map(|s| lexer::friendly_token_name(s))
                    .collect::<Vec<_>>()
                    .join(", ")
            }

            fn make_parse_error(source: &str, position: usize, message: String) -> CompileError {
                let (line, col) = lexer::position_to_line_col(source, position);
                let context = lexer::get_error_context(source, position);
                CompileError::Parse {
                    line,
                    col,
                    context,
                    message,
                }
            }

            match e {
                ParseError::InvalidToken { location } => {
                    make_parse_error(source, location, "Invalid token".to_string())
                }
                ParseError::UnrecognizedEof { location, expected } => make_parse_error(
                    source,
                    location,
                    format!(
                        "Unexpected end of input. Expected one of: {}",
                        fmt_expected(&expected)
                    ),
                ),
                ParseError::UnrecognizedToken {
                    token: (start, tok, _end),
                    expected,
                } => make_parse_error(
                    source,
                    start,
                    format!(
                        "Unexpected token '{}'. Expected one of: {}",
                        tok,
                        fmt_expected(&expected)
                    ),
                ),
                ParseError::ExtraToken {
                    token: (start, tok, _end),
                } => make_parse_error(source, start, format!("Extra token '{}'", tok)),
                // Lexical errors already carry line/col
                ParseError::User { error } => CompileError::Lexical(error),
            }
        })
}
