//! Recursive-descent parser with Pratt-style operator precedence, fused
//! with the semantic checks that attach symbols and types to every node.

use crate::ast::{Ast, AstKind, BinOp, NodeId};
use crate::error::{diag, CompileError, CompileResult, DiagCode};
use crate::symbol::{SymbolId, SymbolKind, SymbolOrigin, SymbolTable};
use hashbrown::HashMap;
use ulang_common::{DiagnosticBag, SourceLocation};
use ulang_lexer::{Token, TokenKind};
use ulang_types::DataType;

#[derive(Debug)]
pub struct ParseOutput {
    pub ast: Ast,
    pub symbols: SymbolTable,
    pub diagnostics: DiagnosticBag,
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    ast: Ast,
    symbols: SymbolTable,
    diagnostics: DiagnosticBag,
    /// Return type of each function body currently being parsed (nesting
    /// doesn't exist in this language, but a stack keeps `return_stmt`
    /// honest about being inside exactly one body at a time).
    fn_ctx: Vec<&'static DataType>,
    /// Tracks the known literal value of a variable for the sole purpose of
    /// catching `x / y` where `y` was last given a literal zero — cleared
    /// on any non-literal assignment.
    known_values: HashMap<SymbolId, i64>,
}

fn infer_type(ast: &Ast, symbols: &SymbolTable, id: NodeId) -> &'static DataType {
    match &ast.get(id).kind {
        AstKind::Number { .. } => ulang_types::resolve("int32").expect("int32 always resolves"),
        AstKind::Variable { symbol, .. } => {
            symbols.symbol(symbol.expect("parser sets symbol before a Variable node is usable")).type_ref
        }
        AstKind::BinOp { left, right, .. } => {
            let l = infer_type(ast, symbols, *left);
            let r = infer_type(ast, symbols, *right);
            ulang_types::binop_result_type(l, r)
        }
        AstKind::FnCall { symbol, .. } => {
            symbols.symbol(symbol.expect("parser sets symbol before an FnCall node is usable")).type_ref
        }
        AstKind::FnArg { value } => infer_type(ast, symbols, *value),
        _ => ulang_types::resolve("void").expect("void always resolves"),
    }
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            ast: Ast::new(),
            symbols: SymbolTable::new(),
            diagnostics: DiagnosticBag::new(),
            fn_ctx: Vec::new(),
            known_values: HashMap::new(),
        }
    }

    /// `Some(v)` if `id` is a literal number, or a variable whose last
    /// assignment was a literal number.
    fn const_value(&self, id: NodeId) -> Option<i64> {
        match &self.ast.get(id).kind {
            AstKind::Number { value } => Some(*value),
            AstKind::Variable { symbol, .. } => self.known_values.get(&(*symbol)?).copied(),
            _ => None,
        }
    }

    pub fn parse(mut self) -> CompileResult<ParseOutput> {
        log::debug!("parsing {} tokens", self.tokens.len());
        self.prepass_functions();
        self.translation_unit()?;
        log::debug!("parsed {} top-level nodes, {} AST nodes, {} symbols", self.ast.top_level.len(), self.ast.len(), self.symbols.len());
        Ok(ParseOutput { ast: self.ast, symbols: self.symbols, diagnostics: self.diagnostics })
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::EndOfFile)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if !self.at_eof() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn expect(&mut self, kind: TokenKind) -> CompileResult<Token> {
        if self.peek().kind == kind {
            Ok(self.advance())
        } else {
            let found = self.peek().clone();
            Err(CompileError::new(DiagCode::UnexpectedToken, format!("expected {kind}, found {found}"), found.loc))
        }
    }

    /// Registers every top-level function's name and return type in the
    /// global scope before parsing bodies, so calls may reference functions
    /// declared later in the file.
    fn prepass_functions(&mut self) {
        let mut i = 0;
        while i < self.tokens.len() {
            if self.tokens[i].kind == TokenKind::Function {
                if let (Some(ty_tok), Some(name_tok)) = (self.tokens.get(i + 1), self.tokens.get(i + 2)) {
                    if ty_tok.kind == TokenKind::TypeKeyword
                        && name_tok.kind == TokenKind::Identifier
                        && self.symbols.lookup(&name_tok.text).is_none()
                    {
                        let ret_ty = ulang_types::resolve(&ty_tok.text).expect("lexer only emits valid type names");
                        let _ = self.symbols.decl_fn(&name_tok.text, ret_ty, name_tok.loc.clone(), SymbolOrigin::User);
                    }
                }
            }
            i += 1;
        }
    }

    fn translation_unit(&mut self) -> CompileResult<()> {
        while !self.at_eof() {
            let node = match self.peek().kind {
                TokenKind::TypeKeyword => self.var_decl()?,
                TokenKind::Function => self.fn_decl()?,
                _ => {
                    let expr = self.expression(0)?;
                    self.expect(TokenKind::Semicolon)?;
                    expr
                }
            };
            self.ast.top_level.push(node);
        }
        Ok(())
    }

    fn check_operand_types(&mut self, a: &DataType, b: &DataType, loc: &SourceLocation) {
        use ulang_types::DataTypeFlags;
        if a.flags.contains(DataTypeFlags::SIGNED) != b.flags.contains(DataTypeFlags::SIGNED) {
            self.diagnostics.push(diag(
                DiagCode::TypesSignDiff,
                format!("'{}' and '{}' differ in signedness", a.name, b.name),
                loc.clone(),
            ));
        }
        if a.size_bytes != b.size_bytes {
            self.diagnostics.push(diag(
                DiagCode::TypesSizeDiff,
                format!("'{}' and '{}' differ in width", a.name, b.name),
                loc.clone(),
            ));
        }
    }

    fn var_decl(&mut self) -> CompileResult<NodeId> {
        let ty_tok = self.advance();
        let ty = ulang_types::resolve(&ty_tok.text).expect("lexer only emits valid type names");
        let name_tok = self.expect(TokenKind::Identifier)?;
        let loc = name_tok.loc.clone();
        let symbol = self.symbols.decl(&name_tok.text, ty, loc.clone())?;

        let init = if self.check(&TokenKind::Assign) {
            self.advance();
            let expr = self.expression(0)?;
            let init_ty = infer_type(&self.ast, &self.symbols, expr);
            self.check_operand_types(ty, init_ty, &loc);
            if let Some(v) = self.const_value(expr) {
                self.known_values.insert(symbol, v);
            }
            Some(expr)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon)?;

        Ok(self.ast.push(AstKind::Declaration { symbol: Some(symbol), type_ref: ty, init }, loc))
    }

    fn fn_decl(&mut self) -> CompileResult<NodeId> {
        let fn_tok = self.advance();
        let loc = fn_tok.loc.clone();
        let ret_tok = self.expect(TokenKind::TypeKeyword)?;
        let ret_ty = ulang_types::resolve(&ret_tok.text).expect("lexer only emits valid type names");
        let name_tok = self.expect(TokenKind::Identifier)?;

        let symbol = self.symbols.lookup(&name_tok.text).expect("prepass registers every function name");
        if self.symbols.symbol(symbol).origin == SymbolOrigin::Builtin {
            return Err(CompileError::new(
                DiagCode::BuiltinRedecl,
                format!("'{}' shadows a builtin function", name_tok.text),
                loc,
            ));
        }

        self.expect(TokenKind::LParen)?;
        let scope_name = format!("{}::{}@fn_decl", self.symbols.scope_name(self.symbols.current()), name_tok.text);
        self.symbols.enter(scope_name);

        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let p_ty_tok = self.expect(TokenKind::TypeKeyword)?;
                let p_ty = ulang_types::resolve(&p_ty_tok.text).expect("lexer only emits valid type names");
                let p_name_tok = self.expect(TokenKind::Identifier)?;
                let p_sym = self.symbols.decl(&p_name_tok.text, p_ty, p_name_tok.loc.clone())?;
                params.push(p_sym);
                if self.check(&TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;

        let (has_body, body) = if self.check(&TokenKind::Semicolon) {
            self.advance();
            self.diagnostics.push(diag(
                DiagCode::FnNoBody,
                format!("'{}' is declared without a body", name_tok.text),
                loc.clone(),
            ));
            (false, Vec::new())
        } else {
            if self.symbols.symbol(symbol).defined {
                return Err(CompileError::new(
                    DiagCode::FnRedefine,
                    format!("'{}' already has a body", name_tok.text),
                    loc,
                ));
            }

            self.fn_ctx.push(ret_ty);
            self.expect(TokenKind::LCurly)?;
            let mut body = Vec::new();
            while !self.check(&TokenKind::RCurly) {
                body.push(self.statement()?);
            }
            self.expect(TokenKind::RCurly)?;
            self.fn_ctx.pop();

            let void_ty = ulang_types::resolve("void").expect("void always resolves");
            let ends_in_return =
                matches!(body.last().map(|id| &self.ast.get(*id).kind), Some(AstKind::FnRet { .. }));
            if !std::ptr::eq(ret_ty, void_ty) && !ends_in_return {
                return Err(CompileError::new(
                    DiagCode::FnNoRet,
                    format!("'{}' does not end in a return statement", name_tok.text),
                    loc,
                ));
            }

            self.symbols.symbol_mut(symbol).defined = true;
            (true, body)
        };

        self.symbols.leave();

        Ok(self.ast.push(AstKind::FnDef { symbol: Some(symbol), ret_type: ret_ty, params, body, has_body }, loc))
    }

    fn statement(&mut self) -> CompileResult<NodeId> {
        match self.peek().kind {
            TokenKind::Return => self.return_stmt(),
            TokenKind::TypeKeyword => self.var_decl(),
            TokenKind::Identifier
                if matches!(self.tokens.get(self.pos + 1).map(|t| &t.kind), Some(TokenKind::Assign)) =>
            {
                self.assignment()
            }
            _ => {
                let expr = self.expression(0)?;
                self.expect(TokenKind::Semicolon)?;
                Ok(expr)
            }
        }
    }

    fn assignment(&mut self) -> CompileResult<NodeId> {
        let name_tok = self.advance();
        let loc = name_tok.loc.clone();
        let symbol = self.symbols.lookup(&name_tok.text).ok_or_else(|| {
            CompileError::new(DiagCode::VarUndefined, format!("'{}' is not declared", name_tok.text), loc.clone())
        })?;

        self.expect(TokenKind::Assign)?;
        let rhs = self.expression(0)?;
        self.expect(TokenKind::Semicolon)?;

        let lhs_ty = self.symbols.symbol(symbol).type_ref;
        let rhs_ty = infer_type(&self.ast, &self.symbols, rhs);
        self.check_operand_types(lhs_ty, rhs_ty, &loc);

        match self.const_value(rhs) {
            Some(v) => {
                self.known_values.insert(symbol, v);
            }
            None => {
                self.known_values.remove(&symbol);
            }
        }

        if let AstKind::FnCall { target_symbol, .. } = &mut self.ast.get_mut(rhs).kind {
            *target_symbol = Some(symbol);
        }

        Ok(self.ast.push(AstKind::Assignment { symbol: Some(symbol), rhs }, loc))
    }

    fn return_stmt(&mut self) -> CompileResult<NodeId> {
        let ret_tok = self.advance();
        let loc = ret_tok.loc.clone();

        let ret_ty = *self.fn_ctx.last().ok_or_else(|| {
            CompileError::new(DiagCode::UnexpectedReturn, "return outside of a function", loc.clone())
        })?;

        let value = if self.check(&TokenKind::Semicolon) { None } else { Some(self.expression(0)?) };
        self.expect(TokenKind::Semicolon)?;

        let void_ty = ulang_types::resolve("void").expect("void always resolves");

        if std::ptr::eq(ret_ty, void_ty) {
            if value.is_some() {
                return Err(CompileError::new(DiagCode::FnRetVoid, "void function cannot return a value", loc));
            }
        } else {
            match value {
                None => {
                    return Err(CompileError::new(DiagCode::InvalidRet, "non-void function must return a value", loc));
                }
                Some(v) => {
                    let vt = infer_type(&self.ast, &self.symbols, v);
                    if vt.kind != ret_ty.kind || vt.size_bytes != ret_ty.size_bytes {
                        return Err(CompileError::new(
                            DiagCode::InvalidRet,
                            format!("cannot return '{}' from a function returning '{}'", vt.name, ret_ty.name),
                            loc,
                        ));
                    }
                }
            }
        }

        Ok(self.ast.push(AstKind::FnRet { value }, loc))
    }

    /// `expression(min_prec)`: parse a postfix primary, then greedily
    /// consume binary operators while their precedence ≥ `min_prec`.
    fn expression(&mut self, min_prec: u8) -> CompileResult<NodeId> {
        if self.check(&TokenKind::EndOfFile) {
            let tok = self.peek().clone();
            return Err(CompileError::new(DiagCode::ExpectedExpr, "expected an expression, found end of file", tok.loc));
        }

        let mut left = self.postfix()?;

        loop {
            let prec = match self.peek().kind {
                TokenKind::Mul | TokenKind::Div => 20,
                TokenKind::Plus | TokenKind::Minus => 10,
                _ => break,
            };
            if prec < min_prec {
                break;
            }

            let op_tok = self.advance();
            let op = match op_tok.kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                TokenKind::Mul => BinOp::Mul,
                TokenKind::Div => BinOp::Div,
                _ => unreachable!("guarded above"),
            };
            let loc = op_tok.loc.clone();
            let right = self.expression(prec + 1)?;

            if op == BinOp::Div && self.const_value(right) == Some(0) {
                self.diagnostics.push(diag(DiagCode::DivisionZero, "division by a known-zero value", loc.clone()));
            }

            let lt = infer_type(&self.ast, &self.symbols, left);
            let rt = infer_type(&self.ast, &self.symbols, right);
            self.check_operand_types(lt, rt, &loc);

            left = self.ast.push(AstKind::BinOp { op, left, right }, loc);
        }

        Ok(left)
    }

    /// A primary followed by zero or more `'(' args ')'` call suffixes.
    fn postfix(&mut self) -> CompileResult<NodeId> {
        let mut node = self.primary()?;

        while self.check(&TokenKind::LParen) {
            let loc = self.peek().loc.clone();
            self.advance();

            let mut args = Vec::new();
            if !self.check(&TokenKind::RParen) {
                loop {
                    let arg_loc = self.peek().loc.clone();
                    let arg_expr = self.expression(0)?;
                    args.push(self.ast.push(AstKind::FnArg { value: arg_expr }, arg_loc));
                    if self.check(&TokenKind::Comma) {
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RParen)?;

            let callee = match &self.ast.get(node).kind {
                AstKind::Variable { symbol, .. } => *symbol,
                _ => None,
            };
            let callee = callee.expect("primary() resolves a symbol for every identifier it parses");

            if self.symbols.symbol(callee).kind != SymbolKind::Function {
                return Err(CompileError::new(
                    DiagCode::FnNotFn,
                    format!("'{}' is not callable", self.symbols.symbol(callee).name),
                    loc,
                ));
            }

            node = self.ast.push(AstKind::FnCall { symbol: Some(callee), args, target_symbol: None }, loc);
        }

        Ok(node)
    }

    fn primary(&mut self) -> CompileResult<NodeId> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::LParen => {
                self.advance();
                let expr = self.expression(0)?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::Number => {
                self.advance();
                let value: i64 = tok.text.parse().map_err(|_| {
                    CompileError::new(
                        DiagCode::TypeDetermineFail,
                        format!("invalid numeric literal '{}'", tok.text),
                        tok.loc.clone(),
                    )
                })?;
                Ok(self.ast.push(AstKind::Number { value }, tok.loc))
            }
            TokenKind::Identifier => {
                self.advance();
                let symbol = self.symbols.lookup(&tok.text).ok_or_else(|| {
                    CompileError::new(DiagCode::VarUndefined, format!("'{}' is not declared", tok.text), tok.loc.clone())
                })?;
                Ok(self.ast.push(AstKind::Variable { name: tok.text.clone(), symbol: Some(symbol) }, tok.loc))
            }
            _ => Err(CompileError::new(DiagCode::ExpectedPrimary, format!("expected an expression, found {tok}"), tok.loc)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulang_lexer::Lexer;

    fn parse(src: &str) -> CompileResult<ParseOutput> {
        let tokens = Lexer::new(src, "t.ul").tokenize().expect("valid source in tests");
        Parser::new(tokens).parse()
    }

    #[test]
    fn s1_var_decl_with_binop_initializer() {
        let out = parse("int32 x = 2 + 3 * 4;").unwrap();
        assert!(out.diagnostics.is_empty());
        assert_eq!(out.ast.top_level.len(), 1);
    }

    #[test]
    fn s3_division_by_known_zero_warns() {
        let out = parse("int32 a = 10; int32 b = 0; int32 q = a / b;").unwrap();
        assert!(out.diagnostics.iter().any(|d| d.code == "DivisionZero"));
    }

    #[test]
    fn s4_forward_function_reference_resolves() {
        let out = parse("fn int32 sq(int32 n) { return n * n; } int32 r = sq(7);").unwrap();
        assert!(out.diagnostics.is_empty());
        assert_eq!(out.ast.top_level.len(), 2);
    }

    #[test]
    fn s5_undeclared_variable_is_fatal() {
        let err = parse("int32 x = 1; y = 2;").unwrap_err();
        assert_eq!(err.0.code, "VarUndefined");
    }

    #[test]
    fn s6_narrowing_initializer_warns_but_succeeds() {
        let out = parse("uint8 x = 100000;").unwrap();
        assert!(out.diagnostics.iter().any(|d| d.code == "TypesSizeDiff"));
    }

    #[test]
    fn function_without_body_warns_fnnobody() {
        let out = parse("fn int32 foo(int32 n);").unwrap();
        assert!(out.diagnostics.iter().any(|d| d.code == "FnNoBody"));
    }

    #[test]
    fn non_void_function_without_trailing_return_is_fatal() {
        let err = parse("fn int32 foo() { int32 x = 1; }").unwrap_err();
        assert_eq!(err.0.code, "FnNoRet");
    }

    #[test]
    fn redefining_a_function_body_is_fatal() {
        let err = parse("fn int32 foo() { return 1; } fn int32 foo() { return 2; }").unwrap_err();
        assert_eq!(err.0.code, "FnRedefine");
    }

    #[test]
    fn calling_a_non_function_is_fatal() {
        let err = parse("int32 x = 1; int32 y = x(1);").unwrap_err();
        assert_eq!(err.0.code, "FnNotFn");
    }

    #[test]
    fn truncated_initializer_hits_end_of_file_is_fatal() {
        let err = parse("int32 x =").unwrap_err();
        assert_eq!(err.0.code, "ExpectedExpr");
    }
}
