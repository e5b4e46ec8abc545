//! Line-oriented tokenizer for the textual IR.

use anyhow::{bail, Context, Result};
use logos::Logos;
use std::fmt;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+|;[^\n]*")]
pub(super) enum Token {
    /// Bare word: keyword, opcode or block label.
    #[regex(r"[A-Za-z_][A-Za-z0-9_.]*", |lex| lex.slice().to_string())]
    Ident(String),
    /// `%name`
    #[regex(r"%[A-Za-z0-9_.]+", |lex| lex.slice()[1..].to_string())]
    Local(String),
    /// `@name`
    #[regex(r"@[A-Za-z0-9_.]+", |lex| lex.slice()[1..].to_string())]
    Symbol(String),
    /// `$N`
    #[regex(r"\$[0-9]+", |lex| lex.slice()[1..].parse::<u32>().ok())]
    Arg(u32),
    #[regex(r"-?[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),
    #[regex(r"-?[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"-?[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),
    #[token("=")]
    Eq,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
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
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "`{}`", s),
            Token::Local(s) => write!(f, "`%{}`", s),
            Token::Symbol(s) => write!(f, "`@{}`", s),
            Token::Arg(n) => write!(f, "`${}`", n),
            Token::Int(v) => write!(f, "`{}`", v),
            Token::Float(v) => write!(f, "`{:?}`", v),
            Token::Eq => write!(f, "`=`"),
            Token::Comma => write!(f, "`,`"),
            Token::Colon => write!(f, "`:`"),
            Token::LParen => write!(f, "`(`"),
            Token::RParen => write!(f, "`)`"),
            Token::LBracket => write!(f, "`[`"),
            Token::RBracket => write!(f, "`]`"),
            Token::LBrace => write!(f, "`{{`"),
            Token::RBrace => write!(f, "`}}`"),
        }
    }
}

/// A non-empty source line after tokenization.
#[derive(Debug, Clone)]
pub(super) struct Line {
    /// 1-based line number in the source.
    pub(super) number: usize,
    pub(super) tokens: Vec<Token>,
}

/// Tokenizes `source`, dropping blank and comment-only lines.
pub(super) fn tokenize(source: &str) -> Result<Vec<Line>> {
    let mut lines = Vec::new();
    for (idx, text) in source.lines().enumerate() {
        let number = idx + 1;
        let tokens = tokenize_line(text).with_context(|| format!("line {}", number))?;
        if !tokens.is_empty() {
            lines.push(Line { number, tokens });
        }
    }
    Ok(lines)
}

fn tokenize_line(text: &str) -> Result<Vec<Token>> {
    let mut lexer = Token::lexer(text);
    let mut tokens = Vec::new();
    while let Some(tok) = lexer.next() {
        match tok {
            Ok(tok) => tokens.push(tok),
            Err(()) => bail!(
                "unexpected `{}` at column {}",
                lexer.slice(),
                lexer.span().start + 1
            ),
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_instruction_line() {
        let lines = tokenize("  %x = add %a, -3 ; trailing comment").unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(
            lines[0].tokens,
            vec![
                Token::Local("x".into()),
                Token::Eq,
                Token::Ident("add".into()),
                Token::Local("a".into()),
                Token::Comma,
                Token::Int(-3),
            ]
        );
    }

    #[test]
    fn skips_blank_and_comment_lines_keeping_numbers() {
        let lines = tokenize("; header\n\nfunc @f(1) {\n}\n").unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].number, 3);
        assert_eq!(lines[1].number, 4);
    }

    #[test]
    fn floats_and_args() {
        let lines = tokenize("fadd $0, 2.5, 1e20").unwrap();
        assert_eq!(lines[0].tokens[1], Token::Arg(0));
        assert_eq!(lines[0].tokens[3], Token::Float(2.5));
        assert_eq!(lines[0].tokens[5], Token::Float(1e20));
    }

    #[test]
    fn rejects_stray_characters() {
        let err = tokenize("ok\n  %x = add #1").unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("line 2"), "{msg}");
        assert!(msg.contains("column 12"), "{msg}");
    }

    #[test]
    fn argument_out_of_range_is_an_error() {
        assert!(tokenize("ret $99999999999").is_err());
    }

    #[test]
    fn dotted_names_and_printed_labels() {
        let lines = tokenize("bb3:\n  call @llvm.trap()").unwrap();
        assert_eq!(lines[0].tokens, vec![Token::Ident("bb3".into()), Token::Colon]);
        assert_eq!(lines[1].tokens[1], Token::Symbol("llvm.trap".into()));
    }
}
