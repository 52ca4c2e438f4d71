//! Recursive-descent parser (spec §4.2): tokens to AST.
//!
//! One method per grammar production, with `peek`/`check`/`advance`/
//! `expect` helpers on the parser struct — the idiom carried over from the
//! teacher's per-production parser modules (each of
//! `examples/Brahmastra-Labs-logicaffeine/src/parser/{clause,noun,verb}.rs`
//! is "one recursive function per syntactic category"), collapsed here into
//! a single module since Noxy's grammar is a fraction of the size.

use crate::ast::*;
use crate::lexer::Lexer;
use crate::span::Span;
use crate::token::{FStringChunk, Token, TokenKind};

#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

type PResult<T> = Result<T, ParseError>;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

pub fn parse_program(src: &str) -> Result<Program, ParseError> {
    let tokens = Lexer::new(src)
        .tokenize()
        .map_err(|e| ParseError { message: e.message, span: e.span })?;
    Parser::new(tokens).parse_program()
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    pub fn parse_program(&mut self) -> PResult<Program> {
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::Eof) {
            stmts.push(self.statement()?);
        }
        Ok(stmts)
    }

    // ---- token stream helpers ------------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.pos - 1]
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn advance(&mut self) -> &Token {
        if !self.check(&TokenKind::Eof) {
            self.pos += 1;
        }
        self.previous()
    }

    fn match_tok(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> PResult<&Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let found = self.peek().clone();
            Err(ParseError {
                message: format!("expected {what}, found '{}'", found.lexeme_or_kind()),
                span: found.span,
            })
        }
    }

    fn expect_ident(&mut self) -> PResult<(String, Span)> {
        if let TokenKind::Ident(name) = &self.peek().kind {
            let name = name.clone();
            let span = self.peek().span;
            self.advance();
            Ok((name, span))
        } else {
            let found = self.peek().clone();
            Err(ParseError {
                message: format!("expected an identifier, found '{}'", found.lexeme_or_kind()),
                span: found.span,
            })
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError { message: message.into(), span: self.peek().span }
    }

    // ---- statements -----------------------------------------------------------

    fn block_until(&mut self, terminators: &[TokenKind]) -> PResult<Block> {
        let start = self.peek().span;
        let mut stmts = Vec::new();
        while !terminators.iter().any(|t| self.check(t)) && !self.check(&TokenKind::Eof) {
            stmts.push(self.statement()?);
        }
        let end = self.peek().span;
        Ok(Block { stmts, span: start.to(end) })
    }

    fn statement(&mut self) -> PResult<Stmt> {
        match &self.peek().kind {
            TokenKind::Let => self.let_stmt(false),
            TokenKind::Global => self.let_stmt(true),
            TokenKind::Func => self.func_decl(),
            TokenKind::Struct => self.struct_decl(),
            TokenKind::If => self.if_stmt(),
            TokenKind::While => self.while_stmt(),
            TokenKind::Return => self.return_stmt(),
            TokenKind::Break => {
                let span = self.advance().span;
                Ok(Stmt::Break { span })
            }
            TokenKind::Use => self.use_decl(),
            _ => self.assign_or_expr_stmt(),
        }
    }

    fn let_stmt(&mut self, is_global: bool) -> PResult<Stmt> {
        let start = self.advance().span; // `let` / `global`
        let (name, _) = self.expect_ident()?;
        self.expect(&TokenKind::Colon, "':' after variable name")?;
        let ty = self.type_expr()?;
        self.expect(&TokenKind::Eq, "'=' in declaration")?;
        let init = self.expression()?;
        let span = start.to(init.span());
        Ok(if is_global {
            Stmt::Global { name, ty, init, span }
        } else {
            Stmt::Let { name, ty, init, span }
        })
    }

    fn func_decl(&mut self) -> PResult<Stmt> {
        let start = self.advance().span; // `func`
        let (name, _) = self.expect_ident()?;
        self.expect(&TokenKind::LParen, "'(' after function name")?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let (pname, pspan) = self.expect_ident()?;
                self.expect(&TokenKind::Colon, "':' after parameter name")?;
                let ty = self.type_expr()?;
                params.push(Param { name: pname, ty, span: pspan });
                if !self.match_tok(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "')' after parameters")?;
        let return_type = if self.match_tok(&TokenKind::Arrow) {
            self.type_expr()?
        } else {
            TypeExpr::Void
        };
        let body = self.block_until(&[TokenKind::End])?;
        let end = self.expect(&TokenKind::End, "'end' to close function body")?.span;
        Ok(Stmt::FuncDecl(FuncDecl {
            name,
            params,
            return_type,
            body,
            span: start.to(end),
        }))
    }

    fn struct_decl(&mut self) -> PResult<Stmt> {
        let start = self.advance().span; // `struct`
        let (name, _) = self.expect_ident()?;
        let mut fields = Vec::new();
        while !self.check(&TokenKind::End) {
            let (fname, fspan) = self.expect_ident()?;
            self.expect(&TokenKind::Colon, "':' after field name")?;
            let ty = self.type_expr()?;
            fields.push(StructField { name: fname, ty, span: fspan });
            if !self.match_tok(&TokenKind::Comma) {
                break;
            }
        }
        let end = self.expect(&TokenKind::End, "'end' to close struct declaration")?.span;
        Ok(Stmt::StructDecl(StructDecl { name, fields, span: start.to(end) }))
    }

    fn if_stmt(&mut self) -> PResult<Stmt> {
        let start = self.advance().span; // `if`
        let cond = self.expression()?;
        self.expect(&TokenKind::Then, "'then' after if condition")?;
        let then_block = self.block_until(&[TokenKind::Else, TokenKind::End])?;
        let else_block = if self.match_tok(&TokenKind::Else) {
            Some(self.block_until(&[TokenKind::End])?)
        } else {
            None
        };
        let end = self.expect(&TokenKind::End, "'end' to close if statement")?.span;
        Ok(Stmt::If { cond, then_block, else_block, span: start.to(end) })
    }

    fn while_stmt(&mut self) -> PResult<Stmt> {
        let start = self.advance().span; // `while`
        let cond = self.expression()?;
        self.expect(&TokenKind::Do, "'do' after while condition")?;
        let body = self.block_until(&[TokenKind::End])?;
        let end = self.expect(&TokenKind::End, "'end' to close while loop")?.span;
        Ok(Stmt::While { cond, body, span: start.to(end) })
    }

    fn return_stmt(&mut self) -> PResult<Stmt> {
        let start = self.advance().span; // `return`
        if self.starts_expression() {
            let value = self.expression()?;
            let span = start.to(value.span());
            Ok(Stmt::Return { value: Some(value), span })
        } else {
            Ok(Stmt::Return { value: None, span: start })
        }
    }

    /// Whether the current token can begin an expression — used to decide
    /// whether a bare `return` has a trailing value.
    fn starts_expression(&self) -> bool {
        !matches!(
            self.peek().kind,
            TokenKind::End | TokenKind::Else | TokenKind::Eof
        )
    }

    fn use_decl(&mut self) -> PResult<Stmt> {
        let start = self.advance().span; // `use`
        let mut path = vec![self.expect_ident()?.0];
        while self.match_tok(&TokenKind::Dot) {
            path.push(self.expect_ident()?.0);
        }
        let (kind, end) = if self.match_tok(&TokenKind::As) {
            let (alias, span) = self.expect_ident()?;
            (UseKind::Alias(alias), span)
        } else if self.match_tok(&TokenKind::Select) {
            if self.match_tok(&TokenKind::Star) {
                (UseKind::Select(SelectList::Wildcard), self.previous().span)
            } else {
                let mut names = vec![self.expect_ident()?.0];
                let mut last = self.previous().span;
                while self.match_tok(&TokenKind::Comma) {
                    let (n, s) = self.expect_ident()?;
                    names.push(n);
                    last = s;
                }
                (UseKind::Select(SelectList::Names(names)), last)
            }
        } else {
            (UseKind::Namespace, self.previous().span)
        };
        Ok(Stmt::Use(UseDecl { path, kind, span: start.to(end) }))
    }

    fn assign_or_expr_stmt(&mut self) -> PResult<Stmt> {
        let expr = self.expression()?;
        if self.match_tok(&TokenKind::Eq) {
            if !expr.is_lvalue() {
                return Err(ParseError {
                    message: "left-hand side of assignment is not assignable".into(),
                    span: expr.span(),
                });
            }
            let value = self.expression()?;
            let span = expr.span().to(value.span());
            Ok(Stmt::Assign { target: expr, value, span })
        } else {
            let span = expr.span();
            Ok(Stmt::ExprStmt { expr, span })
        }
    }

    // ---- types ------------------------------------------------------------

    fn type_expr(&mut self) -> PResult<TypeExpr> {
        let base = match &self.peek().kind {
            TokenKind::KwInt => {
                self.advance();
                TypeExpr::Int
            }
            TokenKind::KwFloat => {
                self.advance();
                TypeExpr::Float
            }
            TokenKind::KwString | TokenKind::KwStr => {
                self.advance();
                TypeExpr::String
            }
            TokenKind::KwBool => {
                self.advance();
                TypeExpr::Bool
            }
            TokenKind::KwVoid => {
                self.advance();
                TypeExpr::Void
            }
            TokenKind::KwRef => {
                self.advance();
                let inner = self.type_expr()?;
                return Ok(TypeExpr::Ref(Box::new(inner)));
            }
            TokenKind::Ident(_) if self.peek_ident_is("map") => {
                self.advance();
                self.expect(&TokenKind::LBracket, "'[' after 'map'")?;
                let key = self.type_expr()?;
                self.expect(&TokenKind::Comma, "',' between map key and value types")?;
                let value = self.type_expr()?;
                self.expect(&TokenKind::RBracket, "']' to close map type")?;
                return Ok(TypeExpr::Map(Box::new(key), Box::new(value)));
            }
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                TypeExpr::Named(name)
            }
            _ => return Err(self.error("expected a type")),
        };
        self.array_suffix(base)
    }

    fn peek_ident_is(&self, word: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Ident(n) if n == word)
    }

    fn array_suffix(&mut self, base: TypeExpr) -> PResult<TypeExpr> {
        if self.match_tok(&TokenKind::LBracket) {
            if self.match_tok(&TokenKind::RBracket) {
                return Ok(TypeExpr::DynamicArray(Box::new(base)));
            }
            let tok = self.peek().clone();
            if let TokenKind::Int(n) = tok.kind {
                self.advance();
                self.expect(&TokenKind::RBracket, "']' to close fixed-array type")?;
                let len: u32 = n
                    .try_into()
                    .map_err(|_| ParseError {
                        message: "fixed array length must be non-negative".into(),
                        span: tok.span,
                    })?;
                return Ok(TypeExpr::FixedArray(Box::new(base), len));
            }
            return Err(ParseError {
                message: "expected ']' or an integer literal in array type".into(),
                span: tok.span,
            });
        }
        Ok(base)
    }

    // ---- expressions: precedence climbing ----------------------------------

    fn expression(&mut self) -> PResult<Expr> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> PResult<Expr> {
        let mut left = self.and_expr()?;
        while self.check(&TokenKind::Pipe) {
            self.advance();
            let right = self.and_expr()?;
            let span = left.span().to(right.span());
            left = Expr::Binary { op: BinaryOp::Or, left: Box::new(left), right: Box::new(right), span };
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> PResult<Expr> {
        let mut left = self.not_expr()?;
        while self.check(&TokenKind::Amp) {
            self.advance();
            let right = self.not_expr()?;
            let span = left.span().to(right.span());
            left = Expr::Binary { op: BinaryOp::And, left: Box::new(left), right: Box::new(right), span };
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> PResult<Expr> {
        if self.check(&TokenKind::Bang) {
            let start = self.advance().span;
            let expr = self.not_expr()?;
            let span = start.to(expr.span());
            Ok(Expr::Unary { op: UnaryOp::Not, expr: Box::new(expr), span })
        } else {
            self.comparison()
        }
    }

    fn comparison(&mut self) -> PResult<Expr> {
        let left = self.additive()?;
        let op = match self.peek().kind {
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::LtEq => BinaryOp::LtEq,
            TokenKind::GtEq => BinaryOp::GtEq,
            TokenKind::EqEq => BinaryOp::EqEq,
            TokenKind::NotEq => BinaryOp::NotEq,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.additive()?;
        if Self::is_comparison_op(&self.peek().kind) {
            return Err(self.error("comparison operators do not associate; parenthesize one side"));
        }
        let span = left.span().to(right.span());
        Ok(Expr::Binary { op, left: Box::new(left), right: Box::new(right), span })
    }

    fn is_comparison_op(kind: &TokenKind) -> bool {
        matches!(
            kind,
            TokenKind::Lt
                | TokenKind::Gt
                | TokenKind::LtEq
                | TokenKind::GtEq
                | TokenKind::EqEq
                | TokenKind::NotEq
        )
    }

    fn additive(&mut self) -> PResult<Expr> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.multiplicative()?;
            let span = left.span().to(right.span());
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right), span };
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> PResult<Expr> {
        let mut left = self.unary_minus()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.unary_minus()?;
            let span = left.span().to(right.span());
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right), span };
        }
        Ok(left)
    }

    fn unary_minus(&mut self) -> PResult<Expr> {
        if self.check(&TokenKind::Minus) {
            let start = self.advance().span;
            let expr = self.unary_minus()?;
            let span = start.to(expr.span());
            Ok(Expr::Unary { op: UnaryOp::Neg, expr: Box::new(expr), span })
        } else {
            self.postfix()
        }
    }

    fn postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            expr = match &self.peek().kind {
                TokenKind::Dot => {
                    self.advance();
                    let (name, fspan) = self.expect_ident()?;
                    let span = expr.span().to(fspan);
                    Expr::Field { target: Box::new(expr), name, span }
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.expression()?;
                    let end = self.expect(&TokenKind::RBracket, "']' to close index")?.span;
                    let span = expr.span().to(end);
                    Expr::Index { target: Box::new(expr), index: Box::new(index), span }
                }
                TokenKind::LParen => {
                    self.advance();
                    let mut args = Vec::new();
                    if !self.check(&TokenKind::RParen) {
                        loop {
                            args.push(self.expression()?);
                            if !self.match_tok(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    let end = self.expect(&TokenKind::RParen, "')' to close call")?.span;
                    let span = expr.span().to(end);
                    Expr::Call { callee: Box::new(expr), args, span }
                }
                _ => break,
            };
        }
        Ok(expr)
    }

    fn primary(&mut self) -> PResult<Expr> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Int(value) => {
                self.advance();
                Ok(Expr::Int { value, span: tok.span })
            }
            TokenKind::Float(value) => {
                self.advance();
                Ok(Expr::Float { value, span: tok.span })
            }
            TokenKind::Str(value) => {
                self.advance();
                Ok(Expr::Str { value, span: tok.span })
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Bool { value: true, span: tok.span })
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Bool { value: false, span: tok.span })
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Null { span: tok.span })
            }
            TokenKind::FString(chunks) => {
                self.advance();
                self.parse_fstring(chunks, tok.span)
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Expr::Ident { name, span: tok.span })
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(&TokenKind::RParen, "')' to close parenthesized expression")?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                if !self.check(&TokenKind::RBracket) {
                    loop {
                        elements.push(self.expression()?);
                        if !self.match_tok(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                let end = self.expect(&TokenKind::RBracket, "']' to close array literal")?.span;
                Ok(Expr::ArrayLiteral { elements, span: tok.span.to(end) })
            }
            TokenKind::Zeros => {
                self.advance();
                self.expect(&TokenKind::LParen, "'(' after 'zeros'")?;
                let count = self.expression()?;
                let end = self.expect(&TokenKind::RParen, "')' to close 'zeros'")?.span;
                Ok(Expr::Zeros { count: Box::new(count), span: tok.span.to(end) })
            }
            TokenKind::KwRef => {
                self.advance();
                let target = self.postfix()?;
                let span = tok.span.to(target.span());
                Ok(Expr::Ref { target: Box::new(target), span })
            }
            _ => Err(ParseError {
                message: format!("expected an expression, found '{}'", tok.lexeme_or_kind()),
                span: tok.span,
            }),
        }
    }

    /// Re-parses each hole's already-sliced expression source with a fresh
    /// [`Lexer`]/`Parser`, then parses the spec text into a [`FormatSpec`].
    fn parse_fstring(&self, chunks: Vec<FStringChunk>, span: Span) -> PResult<Expr> {
        let mut parts = Vec::new();
        for chunk in chunks {
            match chunk {
                FStringChunk::Literal(s) => parts.push(FStringPart::Literal(s)),
                FStringChunk::Hole(hole) => {
                    let tokens = Lexer::new(&hole.expr_src)
                        .tokenize()
                        .map_err(|e| ParseError { message: e.message, span: hole.span })?;
                    let expr = Parser::new(tokens).expression().map_err(|mut e| {
                        e.span = hole.span;
                        e
                    })?;
                    let spec = match hole.spec {
                        Some(s) => Some(parse_format_spec(&s).map_err(|msg| ParseError {
                            message: msg,
                            span: hole.span,
                        })?),
                        None => None,
                    };
                    parts.push(FStringPart::Hole { expr, spec });
                }
            }
        }
        Ok(Expr::FString { parts, span })
    }
}

/// Parses `[width][.precision][type]` (spec §6.2).
fn parse_format_spec(s: &str) -> Result<FormatSpec, String> {
    let mut spec = FormatSpec::default();
    let bytes = s.as_bytes();
    let mut i = 0;
    if i < bytes.len() && bytes[i] == b'0' {
        spec.zero_pad = true;
    }
    let width_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i > width_start {
        spec.width = Some(s[width_start..i].parse().map_err(|_| "invalid width".to_string())?);
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let prec_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        spec.precision =
            Some(s[prec_start..i].parse().map_err(|_| "invalid precision".to_string())?);
    }
    if i < bytes.len() {
        let rest = &s[i..];
        if rest.len() != 1 || !"xXofeg".contains(rest) {
            return Err(format!("unknown format type specifier '{rest}'"));
        }
        spec.ty = rest.chars().next();
    }
    Ok(spec)
}

impl Token {
    fn lexeme_or_kind(&self) -> String {
        if self.lexeme.is_empty() {
            format!("{:?}", self.kind)
        } else {
            self.lexeme.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_expr(src: &str) -> Expr {
        let tokens = Lexer::new(src).tokenize().unwrap();
        Parser::new(tokens).expression().unwrap()
    }

    #[test]
    fn precedence_mul_before_add() {
        let e = parse_expr("1 + 2 * 3");
        match e {
            Expr::Binary { op: BinaryOp::Add, right, .. } => {
                assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn comparison_is_non_associative() {
        let tokens = Lexer::new("a < b < c").tokenize().unwrap();
        assert!(Parser::new(tokens).expression().is_err());
    }

    #[test]
    fn and_short_circuits_before_or_in_precedence() {
        let e = parse_expr("a | b & c");
        match e {
            Expr::Binary { op: BinaryOp::Or, right, .. } => {
                assert!(matches!(*right, Expr::Binary { op: BinaryOp::And, .. }));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn postfix_chains_field_index_and_call() {
        let e = parse_expr("a.b[0](1, 2)");
        assert!(matches!(e, Expr::Call { .. }));
    }

    #[test]
    fn parses_fixed_and_dynamic_array_types() {
        let tokens = Lexer::new("let a: int[5] = zeros(5)").tokenize().unwrap();
        let stmt = Parser::new(tokens).parse_program().unwrap();
        match &stmt[0] {
            Stmt::Let { ty: TypeExpr::FixedArray(inner, 5), .. } => {
                assert_eq!(**inner, TypeExpr::Int);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parses_ref_type_and_expression() {
        let prog = parse_program(
            "struct Node valor:int, proximo:ref Node end\n\
             func make(n: ref Node) -> void end",
        )
        .unwrap();
        assert_eq!(prog.len(), 2);
    }

    #[test]
    fn parses_if_then_else_end() {
        let prog = parse_program("if true then return 1 else return 2 end").unwrap();
        assert!(matches!(prog[0], Stmt::If { .. }));
    }

    #[test]
    fn parses_use_select_wildcard() {
        let prog = parse_program("use math.utils select *").unwrap();
        match &prog[0] {
            Stmt::Use(u) => {
                assert_eq!(u.path, vec!["math".to_string(), "utils".to_string()]);
                assert_eq!(u.kind, UseKind::Select(SelectList::Wildcard));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
