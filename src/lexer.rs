//! Source text to token stream (spec §4.1).
//!
//! Scans byte-by-byte over the source (ASCII-oriented, as the grammar's
//! keywords/operators/punctuation all are), tracking line/column so every
//! emitted token carries a usable [`Span`]. Grounded on the teacher's
//! `LineLexer` cursor/position-tracking idiom in
//! `examples/Brahmastra-Labs-logicaffeine/src/lexer.rs`.

use crate::span::{Position, Span};
use crate::token::{FStringChunk, FStringHole, Token, TokenKind};

#[derive(Debug, Clone)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer { src, bytes: src.as_bytes(), pos: 0, line: 1, column: 1 }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let start_pos = self.position();
            let start = self.pos;
            if self.is_at_end() {
                tokens.push(Token::new(TokenKind::Eof, "", Span::new(start, start, start_pos)));
                break;
            }
            let c = self.peek();
            let kind = if c == b'"' {
                self.lex_string()?
            } else if c == b'f' && self.peek_at(1) == Some(b'"') {
                self.advance();
                self.lex_fstring()?
            } else if c.is_ascii_digit() {
                self.lex_number()?
            } else if c.is_ascii_alphabetic() || c == b'_' {
                self.lex_ident_or_keyword()
            } else {
                self.lex_operator()?
            };
            let span = Span::new(start, self.pos, start_pos);
            let lexeme = self.src[start..self.pos].to_string();
            tokens.push(Token::new(kind, lexeme, span));
        }
        Ok(tokens)
    }

    fn position(&self) -> Position {
        Position { line: self.line, column: self.column }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> u8 {
        self.bytes[self.pos]
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> u8 {
        let c = self.bytes[self.pos];
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn skip_trivia(&mut self) {
        loop {
            if self.is_at_end() {
                return;
            }
            match self.peek() {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.advance();
                }
                b'/' if self.peek_at(1) == Some(b'/') => {
                    while !self.is_at_end() && self.peek() != b'\n' {
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    fn err(&self, message: impl Into<String>, start: usize) -> LexError {
        LexError {
            message: message.into(),
            span: Span::new(start, self.pos, self.position()),
        }
    }

    fn lex_ident_or_keyword(&mut self) -> TokenKind {
        let start = self.pos;
        while !self.is_at_end()
            && (self.peek().is_ascii_alphanumeric() || self.peek() == b'_')
        {
            self.advance();
        }
        let word = &self.src[start..self.pos];
        TokenKind::keyword(word).unwrap_or_else(|| TokenKind::Ident(word.to_string()))
    }

    fn lex_number(&mut self) -> Result<TokenKind, LexError> {
        let start = self.pos;
        while !self.is_at_end() && self.peek().is_ascii_digit() {
            self.advance();
        }
        if !self.is_at_end() && self.peek() == b'.' && self.peek_at(1).is_some_and(|c| c.is_ascii_digit())
        {
            self.advance(); // '.'
            while !self.is_at_end() && self.peek().is_ascii_digit() {
                self.advance();
            }
            let text = &self.src[start..self.pos];
            let value: f64 = text
                .parse()
                .map_err(|_| self.err(format!("invalid float literal '{text}'"), start))?;
            Ok(TokenKind::Float(value))
        } else {
            let text = &self.src[start..self.pos];
            let value: i64 = text
                .parse()
                .map_err(|_| self.err(format!("invalid integer literal '{text}'"), start))?;
            Ok(TokenKind::Int(value))
        }
    }

    fn read_escape(&mut self, start: usize) -> Result<char, LexError> {
        match self.advance() {
            b'n' => Ok('\n'),
            b't' => Ok('\t'),
            b'"' => Ok('"'),
            b'\\' => Ok('\\'),
            other => Err(self.err(
                format!("unknown escape sequence '\\{}'", other as char),
                start,
            )),
        }
    }

    fn lex_string(&mut self) -> Result<TokenKind, LexError> {
        let start = self.pos;
        self.advance(); // opening quote
        let mut out = String::new();
        loop {
            if self.is_at_end() {
                return Err(self.err("unterminated string literal", start));
            }
            match self.peek() {
                b'"' => {
                    self.advance();
                    break;
                }
                b'\\' => {
                    self.advance();
                    out.push(self.read_escape(start)?);
                }
                b'\n' => return Err(self.err("unterminated string literal", start)),
                _ => out.push(self.advance() as char),
            }
        }
        Ok(TokenKind::Str(out))
    }

    fn lex_fstring(&mut self) -> Result<TokenKind, LexError> {
        let start = self.pos - 1; // include the leading 'f'
        self.advance(); // opening quote
        let mut chunks = Vec::new();
        let mut literal = String::new();
        loop {
            if self.is_at_end() {
                return Err(self.err("unterminated f-string literal", start));
            }
            match self.peek() {
                b'"' => {
                    self.advance();
                    break;
                }
                b'\\' if matches!(self.peek_at(1), Some(b'{') | Some(b'}')) => {
                    self.advance();
                    literal.push(self.advance() as char);
                }
                b'\\' => {
                    self.advance();
                    literal.push(self.read_escape(start)?);
                }
                b'{' => {
                    if !literal.is_empty() {
                        chunks.push(FStringChunk::Literal(std::mem::take(&mut literal)));
                    }
                    chunks.push(FStringChunk::Hole(self.lex_fstring_hole(start)?));
                }
                b'\n' => return Err(self.err("unterminated f-string literal", start)),
                _ => literal.push(self.advance() as char),
            }
        }
        if !literal.is_empty() || chunks.is_empty() {
            chunks.push(FStringChunk::Literal(literal));
        }
        Ok(TokenKind::FString(chunks))
    }

    fn lex_fstring_hole(&mut self, fstring_start: usize) -> Result<FStringHole, LexError> {
        let hole_start_pos = self.position();
        let brace_start = self.pos;
        self.advance(); // '{'
        let mut depth = 1usize;
        let body_start = self.pos;
        loop {
            if self.is_at_end() {
                return Err(self.err("unterminated format hole", fstring_start));
            }
            match self.peek() {
                b'{' => {
                    depth += 1;
                    self.advance();
                }
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    self.advance();
                }
                b'\n' => return Err(self.err("unterminated format hole", fstring_start)),
                _ => {
                    self.advance();
                }
            }
        }
        let body = &self.src[body_start..self.pos];
        self.advance(); // closing '}'
        let span = Span::new(brace_start, self.pos, hole_start_pos);

        let (expr_src, spec) = split_hole_body(body);
        Ok(FStringHole {
            expr_src: expr_src.to_string(),
            expr_offset: body_start,
            spec: spec.map(|s| s.to_string()),
            span,
        })
    }

    fn lex_operator(&mut self) -> Result<TokenKind, LexError> {
        let start = self.pos;
        let c = self.advance();
        use TokenKind::*;
        Ok(match c {
            b'=' if self.peek_opt() == Some(b'=') => {
                self.advance();
                EqEq
            }
            b'!' if self.peek_opt() == Some(b'=') => {
                self.advance();
                NotEq
            }
            b'<' if self.peek_opt() == Some(b'=') => {
                self.advance();
                LtEq
            }
            b'>' if self.peek_opt() == Some(b'=') => {
                self.advance();
                GtEq
            }
            b'-' if self.peek_opt() == Some(b'>') => {
                self.advance();
                Arrow
            }
            b'+' => Plus,
            b'-' => Minus,
            b'*' => Star,
            b'/' => Slash,
            b'%' => Percent,
            b'<' => Lt,
            b'>' => Gt,
            b'=' => Eq,
            b'!' => Bang,
            b'&' => Amp,
            b'|' => Pipe,
            b'(' => LParen,
            b')' => RParen,
            b'[' => LBracket,
            b']' => RBracket,
            b'{' => LBrace,
            b'}' => RBrace,
            b',' => Comma,
            b':' => Colon,
            b'.' => Dot,
            other => {
                return Err(self.err(
                    format!("unexpected character '{}'", other as char),
                    start,
                ))
            }
        })
    }

    fn peek_opt(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }
}

/// Splits an f-string hole body `expr[:spec]` on the last top-level `:`
/// (one not nested inside `()`/`[]`), since the grammar has no other use
/// for a bare colon inside an expression.
fn split_hole_body(body: &str) -> (&str, Option<&str>) {
    let bytes = body.as_bytes();
    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth -= 1,
            b':' if depth == 0 => return (&body[..i], Some(&body[i + 1..])),
            _ => {}
        }
    }
    (body, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_keywords_and_identifiers() {
        let k = kinds("let x = 5");
        assert_eq!(
            k,
            vec![
                TokenKind::Let,
                TokenKind::Ident("x".into()),
                TokenKind::Eq,
                TokenKind::Int(5),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_multichar_operators_before_single() {
        let k = kinds("a <= b != c");
        assert_eq!(
            k,
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::LtEq,
                TokenKind::Ident("b".into()),
                TokenKind::NotEq,
                TokenKind::Ident("c".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_float_and_int() {
        let k = kinds("3.14 42");
        assert_eq!(k, vec![TokenKind::Float(3.14), TokenKind::Int(42), TokenKind::Eof]);
    }

    #[test]
    fn lexes_string_escapes() {
        let k = kinds(r#""a\nb\"c""#);
        assert_eq!(k, vec![TokenKind::Str("a\nb\"c".into()), TokenKind::Eof]);
    }

    #[test]
    fn rejects_unterminated_string() {
        assert!(Lexer::new("\"abc").tokenize().is_err());
    }

    #[test]
    fn splits_fstring_into_chunks() {
        let k = kinds(r#"f"n={n:05} done""#);
        match &k[0] {
            TokenKind::FString(chunks) => {
                assert_eq!(chunks.len(), 3);
                assert_eq!(chunks[0], FStringChunk::Literal("n=".into()));
                match &chunks[1] {
                    FStringChunk::Hole(h) => {
                        assert_eq!(h.expr_src, "n");
                        assert_eq!(h.spec.as_deref(), Some("05"));
                    }
                    _ => panic!("expected hole"),
                }
                assert_eq!(chunks[2], FStringChunk::Literal(" done".into()));
            }
            other => panic!("expected fstring, got {other:?}"),
        }
    }

    #[test]
    fn empty_fstring_is_empty_literal() {
        let k = kinds(r#"f"""#);
        assert_eq!(k[0], TokenKind::FString(vec![FStringChunk::Literal(String::new())]));
    }

    #[test]
    fn discards_line_comments() {
        let k = kinds("let x = 1 // trailing comment\nlet y = 2");
        assert_eq!(
            k,
            vec![
                TokenKind::Let,
                TokenKind::Ident("x".into()),
                TokenKind::Eq,
                TokenKind::Int(1),
                TokenKind::Let,
                TokenKind::Ident("y".into()),
                TokenKind::Eq,
                TokenKind::Int(2),
                TokenKind::Eof,
            ]
        );
    }
}
