// Lexer for JAM source files (both tiers).
//
// One token set serves the embedded-tier (C-like) and managed-tier (JS-like)
// grammars. Uses the `logos` crate for DFA-based lexing.
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns all tokens with byte-offset spans, plus any lex errors.
// Failure modes: unrecognized characters produce `LexError`; lexing continues.
// Side effects: none.

use logos::Logos;
use std::fmt;

/// Byte-offset span in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A lexer error with location.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Result of lexing: tokens plus any errors (non-fatal).
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub errors: Vec<LexError>,
}

/// JAM token types.
///
/// Literals and identifiers carry no value; the parser slices the source
/// with the token span, so generated code reproduces the literal spelling.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
pub enum Token {
    // ── JAM keywords ──
    #[token("jsync")]
    Jsync,
    #[token("jasync")]
    Jasync,
    #[token("jcond")]
    Jcond,
    #[token("jdata")]
    Jdata,
    #[token("as")]
    As,

    // ── Host keywords ──
    #[token("function")]
    Function,
    #[token("var")]
    Var,
    #[token("let")]
    Let,
    #[token("return")]
    Return,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("await")]
    Await,
    #[token("new")]
    New,

    // ── Delimiters ──
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("->")]
    Arrow,
    #[token(":")]
    Colon,

    // ── Assignment ──
    #[token("=")]
    Assign,
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token("*=")]
    StarAssign,
    #[token("/=")]
    SlashAssign,

    // ── Comparison ──
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("===")]
    StrictEq,
    #[token("!==")]
    StrictNotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,

    // ── Arithmetic / logic ──
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Bang,
    #[token("~")]
    Tilde,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,

    // ── Literals ──
    /// Numeric literal: decimal, float with exponent, or hex.
    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?")]
    #[regex(r"0[xX][0-9a-fA-F]+")]
    Number,

    /// String literal in either quote style, escapes kept verbatim.
    #[regex(r#""([^"\\\n]|\\.)*""#)]
    #[regex(r"'([^'\\\n]|\\.)*'")]
    Str,

    // ── Identifier ──
    //
    // logos prioritises fixed `#[token]` matches over regex for the same
    // length, so `jsync` matches Jsync, not Ident.
    /// Identifier: `[a-zA-Z_$][a-zA-Z0-9_$]*`
    #[regex(r"[a-zA-Z_$][a-zA-Z0-9_$]*")]
    Ident,

    /// Preprocessor line (`#include ...`), carried through untouched.
    #[regex(r"#[^\n]*")]
    Directive,
}

impl Token {
    /// Source spelling of fixed tokens. Literal tokens return a placeholder.
    pub fn as_str(&self) -> &'static str {
        match self {
            Token::Jsync => "jsync",
            Token::Jasync => "jasync",
            Token::Jcond => "jcond",
            Token::Jdata => "jdata",
            Token::As => "as",
            Token::Function => "function",
            Token::Var => "var",
            Token::Let => "let",
            Token::Return => "return",
            Token::If => "if",
            Token::Else => "else",
            Token::While => "while",
            Token::Await => "await",
            Token::New => "new",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Semi => ";",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::Arrow => "->",
            Token::Colon => ":",
            Token::Assign => "=",
            Token::PlusAssign => "+=",
            Token::MinusAssign => "-=",
            Token::StarAssign => "*=",
            Token::SlashAssign => "/=",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::StrictEq => "===",
            Token::StrictNotEq => "!==",
            Token::Lt => "<",
            Token::Le => "<=",
            Token::Gt => ">",
            Token::Ge => ">=",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::PlusPlus => "++",
            Token::MinusMinus => "--",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
            Token::Bang => "!",
            Token::Tilde => "~",
            Token::Amp => "&",
            Token::Pipe => "|",
            Token::Caret => "^",
            Token::Number => "<number>",
            Token::Str => "<string>",
            Token::Ident => "<ident>",
            Token::Directive => "<directive>",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Public API ──

/// Lex a JAM source string into tokens.
///
/// Returns all successfully parsed tokens together with any errors for
/// unrecognised characters. Lexing is non-fatal: errors are collected and
/// the lexer continues past bad characters.
pub fn lex(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, range) in lexer.spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(LexError {
                span,
                message: format!("unexpected character: {:?}", &source[span.start..span.end]),
            }),
        }
    }

    LexResult { tokens, errors }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_ok(source: &str) -> Vec<Token> {
        let result = lex(source);
        assert!(
            result.errors.is_empty(),
            "unexpected lex errors: {:?}",
            result.errors
        );
        result.tokens.into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn jam_keywords() {
        assert_eq!(
            lex_ok("jsync jasync jcond jdata as"),
            vec![Token::Jsync, Token::Jasync, Token::Jcond, Token::Jdata, Token::As]
        );
    }

    #[test]
    fn keyword_prefix_is_ident() {
        assert_eq!(lex_ok("jsyncer asx"), vec![Token::Ident, Token::Ident]);
    }

    #[test]
    fn longest_operator_wins() {
        assert_eq!(
            lex_ok("= == === != !== <= >= ++ -> &&"),
            vec![
                Token::Assign,
                Token::EqEq,
                Token::StrictEq,
                Token::NotEq,
                Token::StrictNotEq,
                Token::Le,
                Token::Ge,
                Token::PlusPlus,
                Token::Arrow,
                Token::AndAnd,
            ]
        );
    }

    #[test]
    fn literals_keep_spans() {
        let src = r#"x = "dev" + 'c' + 1.5e3;"#;
        let result = lex(src);
        assert!(result.errors.is_empty());
        let strs: Vec<&str> = result
            .tokens
            .iter()
            .filter(|(t, _)| matches!(t, Token::Str | Token::Number))
            .map(|(_, s)| &src[s.start..s.end])
            .collect();
        assert_eq!(strs, vec!["\"dev\"", "'c'", "1.5e3"]);
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            lex_ok("a // line\n/* block\n * more */ b"),
            vec![Token::Ident, Token::Ident]
        );
    }

    #[test]
    fn directive_is_one_token() {
        let src = "#include \"jam.h\"\nint x;";
        let result = lex(src);
        assert_eq!(result.tokens[0].0, Token::Directive);
        let span = result.tokens[0].1;
        assert_eq!(&src[span.start..span.end], "#include \"jam.h\"");
        assert_eq!(result.tokens.len(), 4);
    }

    #[test]
    fn unknown_character_is_reported() {
        let result = lex("a @ b");
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.tokens.len(), 2);
    }
}
