use logos::Logos;
use std::fmt;

/// Longest string literal SPL accepts (characters between the quotes).
pub const MAX_STRING_LEN: usize = 15;

#[derive(Logos, Debug, PartialEq, Eq, Hash, Clone)]
#[logos(skip r"[ \t\r\n]+")] // Whitespace
#[logos(skip r"//[^\n]*")] // Line comments
pub enum Token {
    // --- Section keywords ---
    #[token("glob")]
    Glob,
    #[token("proc")]
    Proc,
    #[token("func")]
    Func,
    #[token("main")]
    Main,
    #[token("var")]
    Var,
    #[token("local")]
    Local,

    // --- Instruction keywords ---
    #[token("halt")]
    Halt,
    #[token("print")]
    Print,
    #[token("while")]
    While,
    #[token("do")]
    Do,
    #[token("until")]
    Until,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("return")]
    Return,

    // --- Operators (SPL spells them as words) ---
    #[token("eq")]
    Eq,
    #[token("or")]
    Or,
    #[token("and")]
    And,
    #[token("plus")]
    Plus,
    #[token("minus")]
    Minus,
    #[token("mult")]
    Mult,
    #[token("div")]
    Div,
    #[token("neg")]
    Neg,
    #[token("not")]
    Not,
    #[token(">")]
    Gt,

    // --- Names, numbers and strings ---
    #[regex(r"[a-z]+[0-9]*", |lex| lex.slice().to_string())]
    Name(String),

    #[regex(r"0|[1-9][0-9]*", |lex| lex.slice().parse().ok())]
    Number(i64),

    #[regex(r#""[a-zA-Z0-9]*""#, |lex| {
        let s = lex.slice();
        let inner = &s[1..s.len() - 1];
        (inner.len() <= MAX_STRING_LEN).then(|| inner.to_string())
    })]
    Str(String),

    // --- Punctuation ---
    #[token("=")]
    Assign,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(";")]
    Semicolon,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Glob => write!(f, "glob"),
            Token::Proc => write!(f, "proc"),
            Token::Func => write!(f, "func"),
            Token::Main => write!(f, "main"),
            Token::Var => write!(f, "var"),
            Token::Local => write!(f, "local"),
            Token::Halt => write!(f, "halt"),
            Token::Print => write!(f, "print"),
            Token::While => write!(f, "while"),
            Token::Do => write!(f, "do"),
            Token::Until => write!(f, "until"),
            Token::If => write!(f, "if"),
            Token::Else => write!(f, "else"),
            Token::Return => write!(f, "return"),
            Token::Eq => write!(f, "eq"),
            Token::Or => write!(f, "or"),
            Token::And => write!(f, "and"),
            Token::Plus => write!(f, "plus"),
            Token::Minus => write!(f, "minus"),
            Token::Mult => write!(f, "mult"),
            Token::Div => write!(f, "div"),
            Token::Neg => write!(f, "neg"),
            Token::Not => write!(f, "not"),
            Token::Gt => write!(f, ">"),
            Token::Name(s) => write!(f, "{}", s),
            Token::Number(n) => write!(f, "{}", n),
            Token::Str(s) => write!(f, "\"{}\"", s),
            Token::Assign => write!(f, "="),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Semicolon => write!(f, ";"),
        }
    }
}

/// Human-readable name for an expected terminal as the grammar spells it
/// (`"\"glob\""`, `"\"name\""`, ...).
pub fn friendly_token_name(expected: &str) -> String {
    match expected.trim_matches('"') {
        bare @ ("name" | "number" | "string") => bare.to_string(),
        other => format!("'{}'", other),
    }
}

/// Custom error type for lexical errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexicalError {
    pub location: usize,
    pub line: usize,
    pub column: usize,
    pub unexpected_char: char,
    pub context: String,
}

impl fmt::Display for LexicalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unexpected character '{}' at line {}, column {} (position {})\n  Context: {}",
            self.unexpected_char, self.line, self.column, self.location, self.context
        )
    }
}

impl std::error::Error for LexicalError {}

/// Convert a byte position to line and column numbers (1-based)
pub fn position_to_line_col(source: &str, position: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;

    for (i, ch) in source.char_indices() {
        if i >= position {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }

    (line, col)
}

/// Get context around an error position (the line containing the error)
pub fn get_error_context(source: &str, position: usize) -> String {
    let position = position.min(source.len());
    let line_start = source[..position]
        .rfind('\n')
        .map(|pos| pos + 1)
        .unwrap_or(0);

    let line_end = source[position..]
        .find('\n')
        .map(|pos| position + pos)
        .unwrap_or(source.len());

    source[line_start..line_end].trim().to_string()
}

fn create_lexical_error(source: &str, position: usize) -> LexicalError {
    let (line, column) = position_to_line_col(source, position);
    let unexpected_char = source[position..].chars().next().unwrap_or('\0');
    let context = get_error_context(source, position);

    LexicalError {
        location: position,
        line,
        column,
        unexpected_char,
        context,
    }
}

pub type Spanned<Tok, Loc, Error> = Result<(Loc, Tok, Loc), Error>;

/// Wraps the logos lexer so every token carries its byte span and every
/// failure carries a positioned [`LexicalError`].
pub struct LexerAdapter<'source> {
    source: &'source str,
    lexer: logos::Lexer<'source, Token>,
}

impl<'source> LexerAdapter<'source> {
    pub fn new(source: &'source str) -> Self {
        Self {
            source,
            lexer: Token::lexer(source),
        }
    }
}

impl<'source> Iterator for LexerAdapter<'source> {
    type Item = Spanned<Token, usize, LexicalError>;

    fn next(&mut self) -> Option<Self::Item> {
        let token_result = self.lexer.next()?;
        let span = self.lexer.span();

        Some(match token_result {
            Ok(token) => Ok((span.start, token, span.end)),
            Err(_) => Err(create_lexical_error(self.source, span.start)),
        })
    }
}

pub fn lex_adapter(source: &str) -> LexerAdapter<'_> {
    LexerAdapter::new(source)
}
