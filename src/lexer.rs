//! Lexer (tokenizer) for Migo using logos.
//!
//! Converts source text into a stream of tokens with byte spans. Newlines
//! are significant during lexing: `tokenize` applies the automatic
//! semicolon-insertion rule (a statement-ending token followed by a newline
//! yields a synthetic `;`) and then drops the newline tokens.

use logos::Logos;
use std::fmt;

use crate::ast::Span;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")] // Skip horizontal whitespace; newlines are tokens
#[logos(skip r"//[^\n]*")] // Skip line comments
#[logos(skip r"/\*([^*]|\*[^/])*\*/")] // Skip block comments
pub enum Token {
    // Keywords
    #[token("package")]
    Package,

    #[token("import")]
    Import,

    #[token("const")]
    Const,

    #[token("var")]
    Var,

    #[token("type")]
    Type,

    #[token("func")]
    Func,

    #[token("return")]
    Return,

    #[token("if")]
    If,

    #[token("else")]
    Else,

    #[token("for")]
    For,

    #[token("range")]
    Range,

    #[token("switch")]
    Switch,

    #[token("case")]
    Case,

    #[token("default")]
    Default,

    #[token("break")]
    Break,

    #[token("continue")]
    Continue,

    #[token("fallthrough")]
    Fallthrough,

    #[token("go")]
    Go,

    #[token("defer")]
    Defer,

    #[token("struct")]
    Struct,

    #[token("interface")]
    Interface,

    #[token("map")]
    Map,

    #[token("chan")]
    Chan,

    // Operators and punctuation
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

    #[token("&")]
    Amp,

    #[token("|")]
    Pipe,

    #[token("^")]
    Caret,

    #[token("&^")]
    AmpCaret,

    #[token("<<")]
    Shl,

    #[token(">>")]
    Shr,

    #[token("&&")]
    AmpAmp,

    #[token("||")]
    PipePipe,

    #[token("!")]
    Bang,

    #[token("==")]
    EqEq,

    #[token("!=")]
    NotEq,

    #[token("<")]
    Lt,

    #[token("<=")]
    Le,

    #[token(">")]
    Gt,

    #[token(">=")]
    Ge,

    #[token("=")]
    Assign,

    #[token(":=")]
    Define,

    #[token("+=")]
    PlusAssign,

    #[token("-=")]
    MinusAssign,

    #[token("*=")]
    StarAssign,

    #[token("/=")]
    SlashAssign,

    #[token("%=")]
    PercentAssign,

    #[token("++")]
    Inc,

    #[token("--")]
    Dec,

    #[token("<-")]
    Arrow,

    #[token("...")]
    Ellipsis,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token(",")]
    Comma,

    #[token(";")]
    Semi,

    #[token(":")]
    Colon,

    #[token(".")]
    Dot,

    #[token("\n")]
    Newline,

    // Identifiers
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // Numeric literals; raw source spelling is kept for exact reprinting
    #[regex(r"[0-9]+|0[xX][0-9a-fA-F]+", |lex| lex.slice().to_string())]
    Int(String),

    #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?|[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().to_string())]
    Float(String),

    // String literals (interpreted and raw), quotes included
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| lex.slice().to_string())]
    #[regex(r"`[^`]*`", |lex| lex.slice().to_string())]
    Str(String),

    // Rune literals, quotes included
    #[regex(r"'([^'\\\n]|\\.)+'", |lex| lex.slice().to_string())]
    Rune(String),
}

impl Token {
    /// Statement-ending tokens after which a newline inserts a semicolon.
    fn ends_statement(&self) -> bool {
        matches!(
            self,
            Token::Ident(_)
                | Token::Int(_)
                | Token::Float(_)
                | Token::Str(_)
                | Token::Rune(_)
                | Token::Return
                | Token::Break
                | Token::Continue
                | Token::Fallthrough
                | Token::Inc
                | Token::Dec
                | Token::RParen
                | Token::RBracket
                | Token::RBrace
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Package => write!(f, "package"),
            Token::Import => write!(f, "import"),
            Token::Const => write!(f, "const"),
            Token::Var => write!(f, "var"),
            Token::Type => write!(f, "type"),
            Token::Func => write!(f, "func"),
            Token::Return => write!(f, "return"),
            Token::If => write!(f, "if"),
            Token::Else => write!(f, "else"),
            Token::For => write!(f, "for"),
            Token::Range => write!(f, "range"),
            Token::Switch => write!(f, "switch"),
            Token::Case => write!(f, "case"),
            Token::Default => write!(f, "default"),
            Token::Break => write!(f, "break"),
            Token::Continue => write!(f, "continue"),
            Token::Fallthrough => write!(f, "fallthrough"),
            Token::Go => write!(f, "go"),
            Token::Defer => write!(f, "defer"),
            Token::Struct => write!(f, "struct"),
            Token::Interface => write!(f, "interface"),
            Token::Map => write!(f, "map"),
            Token::Chan => write!(f, "chan"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Amp => write!(f, "&"),
            Token::Pipe => write!(f, "|"),
            Token::Caret => write!(f, "^"),
            Token::AmpCaret => write!(f, "&^"),
            Token::Shl => write!(f, "<<"),
            Token::Shr => write!(f, ">>"),
            Token::AmpAmp => write!(f, "&&"),
            Token::PipePipe => write!(f, "||"),
            Token::Bang => write!(f, "!"),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::Le => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Ge => write!(f, ">="),
            Token::Assign => write!(f, "="),
            Token::Define => write!(f, ":="),
            Token::PlusAssign => write!(f, "+="),
            Token::MinusAssign => write!(f, "-="),
            Token::StarAssign => write!(f, "*="),
            Token::SlashAssign => write!(f, "/="),
            Token::PercentAssign => write!(f, "%="),
            Token::Inc => write!(f, "++"),
            Token::Dec => write!(f, "--"),
            Token::Arrow => write!(f, "<-"),
            Token::Ellipsis => write!(f, "..."),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::Comma => write!(f, ","),
            Token::Semi => write!(f, ";"),
            Token::Colon => write!(f, ":"),
            Token::Dot => write!(f, "."),
            Token::Newline => writeln!(f),
            Token::Ident(s) | Token::Int(s) | Token::Float(s) | Token::Str(s) | Token::Rune(s) => {
                write!(f, "{}", s)
            }
        }
    }
}

/// Tokenize source code, applying semicolon insertion.
pub fn tokenize(source: &str) -> Result<Vec<(Token, Span)>, LexError> {
    let mut tokens: Vec<(Token, Span)> = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(Token::Newline) => {
                if let Some((last, _)) = tokens.last() {
                    if last.ends_statement() {
                        tokens.push((Token::Semi, Span::new(span.start, span.start)));
                    }
                }
            }
            Ok(token) => tokens.push((token, Span::new(span.start, span.end))),
            Err(_) => {
                return Err(LexError {
                    position: span.start,
                    snippet: source[span.clone()].to_string(),
                });
            }
        }
    }

    // A statement-ending token at EOF also terminates a statement.
    if let Some((last, span)) = tokens.last() {
        if last.ends_statement() {
            let end = span.end;
            tokens.push((Token::Semi, Span::new(end as usize, end as usize)));
        }
    }

    Ok(tokens)
}

/// Lexical error.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub position: usize,
    pub snippet: String,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unexpected character at offset {}: '{}'",
            self.position, self.snippet
        )
    }
}

impl std::error::Error for LexError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn test_keywords() {
        let toks = kinds("package import type func struct");
        assert_eq!(
            toks,
            vec![
                Token::Package,
                Token::Import,
                Token::Type,
                Token::Func,
                Token::Struct
            ]
        );
    }

    #[test]
    fn test_identifiers_and_literals() {
        let toks = kinds(r#"Box val 42 0xff 12.34 "foo" 'x'"#);
        assert!(matches!(toks[0], Token::Ident(ref s) if s == "Box"));
        assert!(matches!(toks[1], Token::Ident(ref s) if s == "val"));
        assert!(matches!(toks[2], Token::Int(ref s) if s == "42"));
        assert!(matches!(toks[3], Token::Int(ref s) if s == "0xff"));
        assert!(matches!(toks[4], Token::Float(ref s) if s == "12.34"));
        assert!(matches!(toks[5], Token::Str(ref s) if s == "\"foo\""));
        assert!(matches!(toks[6], Token::Rune(ref s) if s == "'x'"));
        // 'x' ends the line-less input, so a synthetic semicolon follows.
        assert_eq!(*toks.last().unwrap(), Token::Semi);
    }

    #[test]
    fn test_operators() {
        let toks = kinds(":= == != <= >= && || <- ... &^");
        assert_eq!(
            toks,
            vec![
                Token::Define,
                Token::EqEq,
                Token::NotEq,
                Token::Le,
                Token::Ge,
                Token::AmpAmp,
                Token::PipePipe,
                Token::Arrow,
                Token::Ellipsis,
                Token::AmpCaret
            ]
        );
    }

    #[test]
    fn test_semicolon_insertion() {
        let toks = kinds("x := 1\ny := 2\n");
        assert_eq!(
            toks,
            vec![
                Token::Ident("x".to_string()),
                Token::Define,
                Token::Int("1".to_string()),
                Token::Semi,
                Token::Ident("y".to_string()),
                Token::Define,
                Token::Int("2".to_string()),
                Token::Semi,
            ]
        );
    }

    #[test]
    fn test_no_semicolon_after_operators() {
        let toks = kinds("x +\n1\n");
        assert_eq!(
            toks,
            vec![
                Token::Ident("x".to_string()),
                Token::Plus,
                Token::Int("1".to_string()),
                Token::Semi,
            ]
        );
    }

    #[test]
    fn test_comments_ignored() {
        let toks = kinds("type // trailing comment\n/* block\ncomment */ Box");
        assert_eq!(toks[0], Token::Type);
        assert!(matches!(toks[1], Token::Ident(ref s) if s == "Box"));
    }

    #[test]
    fn test_brackets_insert_semicolons() {
        // `}` and `)` end statements; `{` does not.
        let toks = kinds("func main() {\n}\n");
        assert_eq!(
            toks,
            vec![
                Token::Func,
                Token::Ident("main".to_string()),
                Token::LParen,
                Token::RParen,
                Token::LBrace,
                Token::RBrace,
                Token::Semi,
            ]
        );
    }

    #[test]
    fn test_lex_error_position() {
        let err = tokenize("x := $").unwrap_err();
        assert_eq!(err.position, 5);
        assert_eq!(err.snippet, "$");
    }

    #[test]
    fn test_type_param_brackets() {
        let toks = kinds("type Box[T] struct{}");
        assert_eq!(
            toks,
            vec![
                Token::Type,
                Token::Ident("Box".to_string()),
                Token::LBracket,
                Token::Ident("T".to_string()),
                Token::RBracket,
                Token::Struct,
                Token::LBrace,
                Token::RBrace,
                Token::Semi,
            ]
        );
    }
}
