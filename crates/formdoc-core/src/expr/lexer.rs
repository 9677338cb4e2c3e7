//! Tokenizer for condition expressions

use super::ExprError;

/// A lexical token with its byte offset in the source
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),
    True,
    False,
    None,
    And,
    Or,
    Not,
    In,
    Is,
    EqEq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Plus,
    Minus,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    /// Any other punctuation; the parser rejects it with a precise message
    Symbol(String),
}

impl Token {
    /// Human-readable form for error messages
    pub fn describe(&self) -> String {
        match self {
            Token::Int(i) => i.to_string(),
            Token::Float(f) => f.to_string(),
            Token::Str(s) => format!("'{}'", s),
            Token::Name(n) => n.clone(),
            Token::True => "True".into(),
            Token::False => "False".into(),
            Token::None => "None".into(),
            Token::And => "and".into(),
            Token::Or => "or".into(),
            Token::Not => "not".into(),
            Token::In => "in".into(),
            Token::Is => "is".into(),
            Token::EqEq => "==".into(),
            Token::NotEq => "!=".into(),
            Token::Lt => "<".into(),
            Token::LtE => "<=".into(),
            Token::Gt => ">".into(),
            Token::GtE => ">=".into(),
            Token::Plus => "+".into(),
            Token::Minus => "-".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
            Token::LBracket => "[".into(),
            Token::RBracket => "]".into(),
            Token::Comma => ",".into(),
            Token::Symbol(s) => s.clone(),
        }
    }
}

/// Split `source` into tokens
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, ExprError> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    tokens: Vec<Spanned>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.source[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn push(&mut self, token: Token, offset: usize) {
        self.tokens.push(Spanned { token, offset });
    }

    fn run(mut self) -> Result<Vec<Spanned>, ExprError> {
        while let Some(c) = self.peek() {
            let start = self.pos;
            match c {
                c if c.is_whitespace() => {
                    self.bump();
                }
                '0'..='9' => self.number(start)?,
                '.' if matches!(self.peek_second(), Some('0'..='9')) => self.number(start)?,
                '\'' | '"' => self.string(start, c)?,
                c if c.is_alphabetic() || c == '_' => self.word(start),
                _ => self.punct(start)?,
            }
        }
        Ok(self.tokens)
    }

    fn number(&mut self, start: usize) -> Result<(), ExprError> {
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' | '_' => {
                    self.bump();
                }
                '.' if !is_float => {
                    is_float = true;
                    self.bump();
                }
                'e' | 'E' => {
                    is_float = true;
                    self.bump();
                    if matches!(self.peek(), Some('+') | Some('-')) {
                        self.bump();
                    }
                    if !matches!(self.peek(), Some('0'..='9')) {
                        return Err(ExprError::syntax(start, "malformed number exponent"));
                    }
                }
                _ => break,
            }
        }

        let text: String = self.source[start..self.pos]
            .chars()
            .filter(|c| *c != '_')
            .collect();

        let token = if is_float {
            text.parse::<f64>()
                .map(Token::Float)
                .map_err(|_| ExprError::syntax(start, format!("invalid number '{}'", text)))?
        } else {
            match text.parse::<i64>() {
                Ok(i) => Token::Int(i),
                // Out of i64 range: keep magnitude as float
                Err(_) => text
                    .parse::<f64>()
                    .map(Token::Float)
                    .map_err(|_| ExprError::syntax(start, format!("invalid number '{}'", text)))?,
            }
        };
        self.push(token, start);
        Ok(())
    }

    fn string(&mut self, start: usize, quote: char) -> Result<(), ExprError> {
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(ExprError::syntax(start, "unterminated string literal")),
                Some(c) if c == quote => break,
                Some('\n') => {
                    return Err(ExprError::syntax(start, "unterminated string literal"));
                }
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('\\') => value.push('\\'),
                    Some('\'') => value.push('\''),
                    Some('"') => value.push('"'),
                    Some(other) => {
                        // Unknown escapes are kept literally
                        value.push('\\');
                        value.push(other);
                    }
                    None => return Err(ExprError::syntax(start, "unterminated string literal")),
                },
                Some(c) => value.push(c),
            }
        }
        self.push(Token::Str(value), start);
        Ok(())
    }

    fn word(&mut self, start: usize) {
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let word = &self.source[start..self.pos];
        let token = match word {
            "True" => Token::True,
            "False" => Token::False,
            "None" => Token::None,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "in" => Token::In,
            "is" => Token::Is,
            other => Token::Name(other.to_string()),
        };
        self.push(token, start);
    }

    fn punct(&mut self, start: usize) -> Result<(), ExprError> {
        let c = self.bump().ok_or_else(|| ExprError::syntax(start, "unexpected end"))?;
        let next = self.peek();
        let token = match (c, next) {
            ('=', Some('=')) => {
                self.bump();
                Token::EqEq
            }
            ('!', Some('=')) => {
                self.bump();
                Token::NotEq
            }
            ('<', Some('=')) => {
                self.bump();
                Token::LtE
            }
            ('>', Some('=')) => {
                self.bump();
                Token::GtE
            }
            ('<', _) => Token::Lt,
            ('>', _) => Token::Gt,
            ('+', _) => Token::Plus,
            ('-', _) => Token::Minus,
            ('(', _) => Token::LParen,
            (')', _) => Token::RParen,
            ('[', _) => Token::LBracket,
            (']', _) => Token::RBracket,
            (',', _) => Token::Comma,
            (other, _) => Token::Symbol(other.to_string()),
        };
        self.push(token, start);
        Ok(())
    }
}
