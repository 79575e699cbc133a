use super::token::{Token, TokenType};

fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

fn is_alpha(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

/// Pull-based scanner. The compiler calls `scan_token` once per token;
/// after the source is exhausted every call returns an `Eof` token.
pub struct Scanner<'a> {
    source: &'a str,
    start: usize,
    current: usize,
    line: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            start: 0,
            current: 0,
            line: 1,
        }
    }

    fn at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn peek(&self) -> u8 {
        if self.at_end() {
            b'\0'
        } else {
            self.source.as_bytes()[self.current]
        }
    }

    fn peek_next(&self) -> u8 {
        if self.current + 1 >= self.source.len() {
            b'\0'
        } else {
            self.source.as_bytes()[self.current + 1]
        }
    }

    fn advance(&mut self) -> u8 {
        self.current += 1;
        self.source.as_bytes()[self.current - 1]
    }

    fn is_next(&mut self, expected: u8) -> bool {
        if self.at_end() || self.peek() != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn make_token(&self, typ: TokenType) -> Token {
        Token::new(
            typ,
            self.source[self.start..self.current].to_string(),
            self.line,
        )
    }

    fn error_token(&self, message: &str) -> Token {
        Token::new(TokenType::Error, message.to_string(), self.line)
    }

    /// Skips spaces, tabs, carriage returns, newlines and both comment
    /// forms. An unterminated block comment surfaces as an error token.
    fn skip_whitespace(&mut self) -> Option<Token> {
        loop {
            match self.peek() {
                b' ' | b'\r' | b'\t' => {
                    self.advance();
                }
                b'\n' => {
                    self.line += 1;
                    self.advance();
                }
                b'#' => {
                    if self.peek_next() == b'|' {
                        self.advance();
                        self.advance();
                        while !self.at_end() && !(self.peek() == b'|' && self.peek_next() == b'#') {
                            if self.peek() == b'\n' {
                                self.line += 1;
                            }
                            self.advance();
                        }
                        if self.at_end() {
                            return Some(self.error_token("Unterminated comment."));
                        }
                        self.advance();
                        self.advance();
                    } else {
                        while !self.at_end() && self.peek() != b'\n' {
                            self.advance();
                        }
                    }
                }
                _ => return None,
            }
        }
    }

    fn check_keyword(&self, begin: usize, rest: &str, typ: TokenType) -> TokenType {
        if self.current - self.start == begin + rest.len()
            && &self.source[self.start + begin..self.current] == rest
        {
            typ
        } else {
            TokenType::Identifier
        }
    }

    fn identifier_type(&self) -> TokenType {
        let bytes = self.source.as_bytes();
        let len = self.current - self.start;
        match bytes[self.start] {
            b'a' => self.check_keyword(1, "nd", TokenType::And),
            b'b' => self.check_keyword(1, "reak", TokenType::Break),
            b'c' if len > 1 => match bytes[self.start + 1] {
                b'l' => self.check_keyword(2, "ass", TokenType::Class),
                b'a' => self.check_keyword(2, "se", TokenType::Case),
                b'o' => self.check_keyword(2, "ntinue", TokenType::Continue),
                _ => TokenType::Identifier,
            },
            b'd' => self.check_keyword(1, "efault", TokenType::Default),
            b'e' if len > 1 => match bytes[self.start + 1] {
                b'l' => self.check_keyword(2, "se", TokenType::Else),
                b'x' => self.check_keyword(2, "tends", TokenType::Extends),
                _ => TokenType::Identifier,
            },
            b'f' if len > 1 => match bytes[self.start + 1] {
                b'a' => self.check_keyword(2, "lse", TokenType::False),
                b'o' => self.check_keyword(2, "r", TokenType::For),
                // the surface spelling of the function keyword
                b'w' => self.check_keyword(2, "unction", TokenType::Def),
                _ => TokenType::Identifier,
            },
            b'i' if len > 1 => match bytes[self.start + 1] {
                b'f' => self.check_keyword(1, "f", TokenType::If),
                b'n' => {
                    if len == 2 {
                        TokenType::In
                    } else {
                        self.check_keyword(2, "f", TokenType::Inf)
                    }
                }
                _ => TokenType::Identifier,
            },
            b'l' => self.check_keyword(1, "et", TokenType::Let),
            b'n' if len > 1 => match bytes[self.start + 1] {
                b'a' => self.check_keyword(2, "n", TokenType::Nan),
                b'o' => {
                    if len > 2 && bytes[self.start + 2] == b'n' {
                        self.check_keyword(3, "e", TokenType::None)
                    } else {
                        self.check_keyword(2, "t", TokenType::Not)
                    }
                }
                _ => TokenType::Identifier,
            },
            b'o' => self.check_keyword(1, "r", TokenType::Or),
            b'p' => self.check_keyword(1, "rint", TokenType::Print),
            b'r' => self.check_keyword(1, "eturn", TokenType::Return),
            b's' if len > 1 => match bytes[self.start + 1] {
                b'u' => self.check_keyword(2, "per", TokenType::Super),
                b'w' => self.check_keyword(2, "itch", TokenType::Switch),
                _ => TokenType::Identifier,
            },
            b't' if len > 1 => match bytes[self.start + 1] {
                b'h' => self.check_keyword(2, "is", TokenType::This),
                b'r' => self.check_keyword(2, "ue", TokenType::True),
                _ => TokenType::Identifier,
            },
            b'w' => self.check_keyword(1, "hile", TokenType::While),
            _ => TokenType::Identifier,
        }
    }

    fn identifier(&mut self) -> Token {
        while is_alpha(self.peek()) || is_digit(self.peek()) {
            self.advance();
        }
        self.make_token(self.identifier_type())
    }

    fn number(&mut self) -> Token {
        while is_digit(self.peek()) {
            self.advance();
        }
        if self.peek() == b'.' && is_digit(self.peek_next()) {
            self.advance();
            while is_digit(self.peek()) {
                self.advance();
            }
        }
        if self.peek() == b'e' && is_digit(self.peek_next()) {
            self.advance();
            while is_digit(self.peek()) {
                self.advance();
            }
        }
        self.make_token(TokenType::Number)
    }

    fn string(&mut self) -> Token {
        while !self.at_end() && self.peek() != b'"' {
            match self.peek() {
                b'\n' => {
                    self.line += 1;
                    self.advance();
                }
                b'\\' => {
                    self.advance();
                    match self.peek() {
                        b'"' | b'\'' | b'n' | b'r' | b't' | b'v' | b'f' | b'\\' | b'0' | b'a' => {
                            self.advance();
                        }
                        _ => return self.error_token("Invalid escape character in string."),
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }

        if self.at_end() {
            return self.error_token("Unterminated single-line string.");
        }

        self.advance();
        self.make_token(TokenType::String)
    }

    fn multi_string(&mut self) -> Token {
        // past the opening `"""`
        self.advance();
        self.advance();

        while !self.at_end()
            && !(self.peek() == b'"' && self.peek_next() == b'"' && {
                let bytes = self.source.as_bytes();
                self.current + 2 < self.source.len() && bytes[self.current + 2] == b'"'
            })
        {
            if self.peek() == b'\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.at_end() {
            return self.error_token("Unterminated multi-line string.");
        }

        self.advance();
        self.advance();
        self.advance();
        self.make_token(TokenType::String)
    }

    pub fn scan_token(&mut self) -> Token {
        if let Some(token) = self.skip_whitespace() {
            self.start = self.current;
            return token;
        }
        self.start = self.current;

        if self.at_end() {
            return self.make_token(TokenType::Eof);
        }

        let c = self.advance();
        if is_alpha(c) {
            return self.identifier();
        }
        if is_digit(c) {
            return self.number();
        }

        match c {
            b'(' => self.make_token(TokenType::OParen),
            b')' => self.make_token(TokenType::CParen),
            b'{' => self.make_token(TokenType::OBrace),
            b'}' => self.make_token(TokenType::CBrace),
            b'[' => self.make_token(TokenType::OBracket),
            b']' => self.make_token(TokenType::CBracket),
            b',' => self.make_token(TokenType::Comma),
            b'.' => self.make_token(TokenType::Period),
            b';' => self.make_token(TokenType::Semicolon),
            b':' => self.make_token(TokenType::Colon),
            b'+' => self.make_token(TokenType::Plus),
            b'-' => self.make_token(TokenType::Minus),
            b'*' => self.make_token(TokenType::Star),
            b'/' => self.make_token(TokenType::Slash),
            b'%' => self.make_token(TokenType::Percent),
            b'!' => {
                if self.is_next(b'=') {
                    self.make_token(TokenType::BangEqual)
                } else {
                    self.make_token(TokenType::Bang)
                }
            }
            b'=' => {
                if self.is_next(b'=') {
                    self.make_token(TokenType::DEqual)
                } else {
                    self.make_token(TokenType::Equal)
                }
            }
            b'<' => {
                if self.is_next(b'=') {
                    self.make_token(TokenType::LessEqual)
                } else if self.is_next(b'<') {
                    self.make_token(TokenType::LeftShift)
                } else {
                    self.make_token(TokenType::Less)
                }
            }
            b'>' => {
                if self.is_next(b'=') {
                    self.make_token(TokenType::GreaterEqual)
                } else if self.is_next(b'>') {
                    self.make_token(TokenType::RightShift)
                } else {
                    self.make_token(TokenType::Greater)
                }
            }
            b'"' => {
                if self.peek() == b'"' && self.peek_next() == b'"' {
                    self.multi_string()
                } else {
                    self.string()
                }
            }
            _ => self.error_token("Unexpected character."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(source: &str) -> Vec<Token> {
        let mut scanner = Scanner::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = scanner.scan_token();
            let done = token.typ == TokenType::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    fn types(source: &str) -> Vec<TokenType> {
        scan_all(source).iter().map(|t| t.typ).collect()
    }

    #[test]
    fn single_and_double_char_operators() {
        assert_eq!(
            types("! != = == < <= << > >= >> + - * / % ; : , . ( ) { } [ ]"),
            vec![
                TokenType::Bang,
                TokenType::BangEqual,
                TokenType::Equal,
                TokenType::DEqual,
                TokenType::Less,
                TokenType::LessEqual,
                TokenType::LeftShift,
                TokenType::Greater,
                TokenType::GreaterEqual,
                TokenType::RightShift,
                TokenType::Plus,
                TokenType::Minus,
                TokenType::Star,
                TokenType::Slash,
                TokenType::Percent,
                TokenType::Semicolon,
                TokenType::Colon,
                TokenType::Comma,
                TokenType::Period,
                TokenType::OParen,
                TokenType::CParen,
                TokenType::OBrace,
                TokenType::CBrace,
                TokenType::OBracket,
                TokenType::CBracket,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn keywords() {
        assert_eq!(
            types("and or not class else false for fwunction if none print return"),
            vec![
                TokenType::And,
                TokenType::Or,
                TokenType::Not,
                TokenType::Class,
                TokenType::Else,
                TokenType::False,
                TokenType::For,
                TokenType::Def,
                TokenType::If,
                TokenType::None,
                TokenType::Print,
                TokenType::Return,
                TokenType::Eof,
            ]
        );
        assert_eq!(
            types("super this true let while extends switch case default continue break in"),
            vec![
                TokenType::Super,
                TokenType::This,
                TokenType::True,
                TokenType::Let,
                TokenType::While,
                TokenType::Extends,
                TokenType::Switch,
                TokenType::Case,
                TokenType::Default,
                TokenType::Continue,
                TokenType::Break,
                TokenType::In,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn special_number_keywords() {
        assert_eq!(
            types("inf nan infx nano"),
            vec![
                TokenType::Inf,
                TokenType::Nan,
                TokenType::Identifier,
                TokenType::Identifier,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn keyword_prefixes_are_identifiers() {
        assert_eq!(
            types("f fw lets whilex i no"),
            vec![
                TokenType::Identifier,
                TokenType::Identifier,
                TokenType::Identifier,
                TokenType::Identifier,
                TokenType::Identifier,
                TokenType::Identifier,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn numbers() {
        let tokens = scan_all("1 123 1.5 0.25 2e10 1.5e3");
        let lexemes: Vec<&str> = tokens[..6].iter().map(|t| t.lexeme.as_str()).collect();
        assert_eq!(lexemes, vec!["1", "123", "1.5", "0.25", "2e10", "1.5e3"]);
        assert!(tokens[..6].iter().all(|t| t.typ == TokenType::Number));
    }

    #[test]
    fn number_does_not_eat_trailing_dot() {
        assert_eq!(
            types("1. 2.x"),
            vec![
                TokenType::Number,
                TokenType::Period,
                TokenType::Number,
                TokenType::Period,
                TokenType::Identifier,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn line_comments_and_block_comments() {
        assert_eq!(
            types("1 # comment to end\n2 #| block\nstill block |# 3"),
            vec![
                TokenType::Number,
                TokenType::Number,
                TokenType::Number,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_block_comment_is_an_error() {
        let tokens = scan_all("1 #| never closed");
        assert_eq!(tokens[1].typ, TokenType::Error);
        assert_eq!(tokens[1].lexeme, "Unterminated comment.");
    }

    #[test]
    fn strings_and_escapes() {
        let tokens = scan_all(r#""hello" "a\nb" "q\"q""#);
        assert!(tokens[..3].iter().all(|t| t.typ == TokenType::String));
        assert_eq!(tokens[0].lexeme, "\"hello\"");
    }

    #[test]
    fn invalid_escape_is_an_error() {
        let tokens = scan_all(r#""a\qb""#);
        assert_eq!(tokens[0].typ, TokenType::Error);
        assert_eq!(tokens[0].lexeme, "Invalid escape character in string.");
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let tokens = scan_all("\"no close");
        assert_eq!(tokens[0].typ, TokenType::Error);
        assert_eq!(tokens[0].lexeme, "Unterminated single-line string.");
    }

    #[test]
    fn triple_quoted_strings_span_lines() {
        let tokens = scan_all("\"\"\"a\nb\nc\"\"\" 9");
        assert_eq!(tokens[0].typ, TokenType::String);
        assert_eq!(tokens[0].lexeme, "\"\"\"a\nb\nc\"\"\"");
        // two newlines inside the string
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn unterminated_multi_line_string_is_an_error() {
        let tokens = scan_all("\"\"\"open");
        assert_eq!(tokens[0].typ, TokenType::Error);
        assert_eq!(tokens[0].lexeme, "Unterminated multi-line string.");
    }

    #[test]
    fn newlines_increment_the_line_counter() {
        let tokens = scan_all("1\n2\n\n3");
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].line, 2);
        assert_eq!(tokens[2].line, 4);
    }

    #[test]
    fn eof_repeats_forever() {
        let mut scanner = Scanner::new("");
        for _ in 0..3 {
            assert_eq!(scanner.scan_token().typ, TokenType::Eof);
        }
    }
}
