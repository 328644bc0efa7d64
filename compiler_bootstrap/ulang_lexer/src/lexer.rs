//! Lexer: source text -> token stream, byte at a time, tracking
//! `(line, column)` as it goes.

use crate::error::LexError;
use crate::token::{Token, TokenKind};
use ulang_common::SourceLocation;

pub struct Lexer<'a> {
    file: String,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, file: impl Into<String>) -> Self {
        Self { file: file.into(), bytes: source.as_bytes(), pos: 0, line: 1, column: 1 }
    }

    fn peek(&self) -> u8 {
        self.bytes.get(self.pos).copied().unwrap_or(0)
    }

    fn loc(&self) -> SourceLocation {
        SourceLocation::new(self.file.clone(), self.line, self.column)
    }

    fn advance(&mut self) -> u8 {
        let c = self.peek();
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Tokenize the full input, ending with a synthetic `EndOfFile` token.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        while !self.at_end() {
            let c = self.peek();

            if c.is_ascii_whitespace() {
                self.advance();
                continue;
            }

            if c.is_ascii_digit() {
                tokens.push(self.lex_number());
                continue;
            }

            if c == b'\'' {
                tokens.push(self.lex_char_literal()?);
                continue;
            }

            if c.is_ascii_alphabetic() || c == b'_' {
                tokens.push(self.lex_identifier_or_keyword());
                continue;
            }

            let loc = self.loc();
            let kind = match c {
                b'(' => TokenKind::LParen,
                b')' => TokenKind::RParen,
                b'{' => TokenKind::LCurly,
                b'}' => TokenKind::RCurly,
                b',' => TokenKind::Comma,
                b'+' => TokenKind::Plus,
                b'-' => TokenKind::Minus,
                b'*' => TokenKind::Mul,
                b'/' => TokenKind::Div,
                b'=' => TokenKind::Assign,
                b';' => TokenKind::Semicolon,
                other => {
                    return Err(LexError::UnknownChar { ch: other as char, loc });
                }
            };

            let ch = self.advance();
            tokens.push(Token::new(kind, (ch as char).to_string(), loc));
        }

        tokens.push(Token::new(TokenKind::EndOfFile, "", self.loc()));
        log::debug!("lexed {} tokens from {}", tokens.len(), self.file);
        Ok(tokens)
    }

    /// One or more digits with optional internal underscores (never leading).
    fn lex_number(&mut self) -> Token {
        let loc = self.loc();
        let mut text = String::new();

        while self.peek().is_ascii_digit() || (!text.is_empty() && self.peek() == b'_') {
            let c = self.advance();
            if c != b'_' {
                text.push(c as char);
            }
        }

        Token::new(TokenKind::Number, text, loc)
    }

    /// `'x'` lexes to a `Number` token whose text is the integer value of `x`.
    fn lex_char_literal(&mut self) -> Result<Token, LexError> {
        let loc = self.loc();
        self.advance(); // opening quote

        let value = self.advance();

        if self.peek() != b'\'' {
            return Err(LexError::MissingCloseQuote { loc });
        }
        self.advance();

        Ok(Token::new(TokenKind::Number, (value as u32).to_string(), loc))
    }

    fn lex_identifier_or_keyword(&mut self) -> Token {
        let loc = self.loc();
        let mut text = String::new();

        while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
            text.push(self.advance() as char);
        }

        if text == "fn" {
            return Token::new(TokenKind::Function, text, loc);
        }
        if text == "return" {
            return Token::new(TokenKind::Return, text, loc);
        }
        if let Ok(ty) = ulang_types::resolve(&text) {
            return Token::new(TokenKind::TypeKeyword, ty.name, loc);
        }

        Token::new(TokenKind::Identifier, text, loc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src, "test.ul").tokenize().unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_var_decl() {
        let kinds = kinds("int32 x = 2 + 3 * 4;");
        assert_eq!(
            kinds,
            vec![
                TokenKind::TypeKeyword,
                TokenKind::Identifier,
                TokenKind::Assign,
                TokenKind::Number,
                TokenKind::Plus,
                TokenKind::Number,
                TokenKind::Mul,
                TokenKind::Number,
                TokenKind::Semicolon,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn number_allows_internal_underscores_not_leading() {
        let toks = Lexer::new("1_000", "t.ul").tokenize().unwrap();
        assert_eq!(toks[0].text, "1000");
    }

    #[test]
    fn char_literal_becomes_number_of_integer_value() {
        let toks = Lexer::new("'A'", "t.ul").tokenize().unwrap();
        assert_eq!(toks[0].kind, TokenKind::Number);
        assert_eq!(toks[0].text, "65");
    }

    #[test]
    fn fn_and_return_are_keywords() {
        let kinds = kinds("fn return");
        assert_eq!(kinds[0], TokenKind::Function);
        assert_eq!(kinds[1], TokenKind::Return);
    }

    #[test]
    fn type_keyword_normalizes_to_canonical_name() {
        let toks = Lexer::new("int32", "t.ul").tokenize().unwrap();
        assert_eq!(toks[0].kind, TokenKind::TypeKeyword);
        assert_eq!(toks[0].text, "int32");
    }

    #[test]
    fn unknown_char_is_an_error() {
        let err = Lexer::new("$", "t.ul").tokenize().unwrap_err();
        assert!(matches!(err, LexError::UnknownChar { ch: '$', .. }));
    }

    #[test]
    fn char_literal_missing_close_quote_is_an_error() {
        let err = Lexer::new("'A", "t.ul").tokenize().unwrap_err();
        assert!(matches!(err, LexError::MissingCloseQuote { .. }));
    }

    #[test]
    fn lone_quote_at_eof_is_a_missing_close_quote_error() {
        let err = Lexer::new("'", "t.ul").tokenize().unwrap_err();
        assert!(matches!(err, LexError::MissingCloseQuote { .. }));
    }

    #[test]
    fn tracks_line_and_column() {
        let toks = Lexer::new("int32\nx", "t.ul").tokenize().unwrap();
        assert_eq!(toks[0].loc.line, 1);
        assert_eq!(toks[1].loc.line, 2);
        assert_eq!(toks[1].loc.column, 1);
    }
}
