use crate::types::{JsString, combine_surrogates, is_high_surrogate, is_low_surrogate};
use num_bigint::BigInt;
use std::fmt;
use std::str::Chars;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    // Identifiers and keywords
    Identifier(String),
    Keyword(Keyword),

    // Literals
    NumericLiteral(f64),
    LegacyOctalLiteral(f64),
    BigIntLiteral(BigInt),
    StringLiteral(JsString),
    BooleanLiteral(bool),
    NullLiteral,
    RegExpLiteral { pattern: String, flags: String },

    // Template literals: (cooked, raw); cooked is None for invalid escapes
    NoSubstitutionTemplate(Option<JsString>, String),
    TemplateHead(Option<JsString>, String),
    TemplateMiddle(Option<JsString>, String),
    TemplateTail(Option<JsString>, String),

    // Punctuators
    LeftBrace,                // {
    RightBrace,               // }
    LeftParen,                // (
    RightParen,               // )
    LeftBracket,              // [
    RightBracket,             // ]
    Dot,                      // .
    Ellipsis,                 // ...
    Semicolon,                // ;
    Comma,                    // ,
    LessThan,                 // <
    GreaterThan,              // >
    LessThanEqual,            // <=
    GreaterThanEqual,         // >=
    Equal,                    // ==
    NotEqual,                 // !=
    StrictEqual,              // ===
    StrictNotEqual,           // !==
    Plus,                     // +
    Minus,                    // -
    Star,                     // *
    Percent,                  // %
    Exponent,                 // **
    Increment,                // ++
    Decrement,                // --
    LeftShift,                // <<
    RightShift,               // >>
    UnsignedRightShift,       // >>>
    Ampersand,                // &
    Pipe,                     // |
    Caret,                    // ^
    Bang,                     // !
    Tilde,                    // ~
    LogicalAnd,               // &&
    LogicalOr,                // ||
    NullishCoalescing,        // ??
    Question,                 // ?
    OptionalChain,            // ?.
    Colon,                    // :
    Assign,                   // =
    PlusAssign,               // +=
    MinusAssign,              // -=
    StarAssign,               // *=
    PercentAssign,            // %=
    ExponentAssign,           // **=
    LeftShiftAssign,          // <<=
    RightShiftAssign,         // >>=
    UnsignedRightShiftAssign, // >>>=
    AmpersandAssign,          // &=
    PipeAssign,               // |=
    CaretAssign,              // ^=
    LogicalAndAssign,         // &&=
    LogicalOrAssign,          // ||=
    NullishAssign,            // ??=
    Arrow,                    // =>
    Slash,                    // /
    SlashAssign,              // /=

    // Special
    /// Malformed input; carries the diagnostic. Scanning may continue.
    Invalid(String),
    Eof,
}

impl TokenKind {
    /// Whether a `/` right after this token is a division operator.
    fn ends_expression(&self) -> bool {
        match self {
            TokenKind::Identifier(_)
            | TokenKind::NumericLiteral(_)
            | TokenKind::LegacyOctalLiteral(_)
            | TokenKind::BigIntLiteral(_)
            | TokenKind::StringLiteral(_)
            | TokenKind::BooleanLiteral(_)
            | TokenKind::NullLiteral
            | TokenKind::RegExpLiteral { .. }
            | TokenKind::NoSubstitutionTemplate(..)
            | TokenKind::TemplateTail(..)
            | TokenKind::RightParen
            | TokenKind::RightBracket
            | TokenKind::Increment
            | TokenKind::Decrement => true,
            // contextual keywords used as plain names
            TokenKind::Keyword(kw) => matches!(
                kw,
                Keyword::This
                    | Keyword::Super
                    | Keyword::Let
                    | Keyword::Of
                    | Keyword::Async
                    | Keyword::Static
            ),
            _ => false,
        }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self, TokenKind::Eof)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, TokenKind::Invalid(_))
    }

    /// Tokens that count as the "previous token" for [`LexGoal::after`].
    pub fn is_significant(&self) -> bool {
        !self.is_invalid()
    }
}

/// Tells the scanner how to read a `/` at the current position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LexGoal {
    /// `/` starts a regular expression literal.
    RegExp,
    /// `/` is the division (or `/=`) operator.
    Div,
}

impl LexGoal {
    /// Goal for the token following `prev` (the last significant token, or
    /// `None` at the start of input).
    pub fn after(prev: Option<&TokenKind>) -> LexGoal {
        match prev {
            Some(kind) if kind.ends_expression() => LexGoal::Div,
            _ => LexGoal::RegExp,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keyword {
    Async,
    Await,
    Break,
    Case,
    Catch,
    Class,
    Const,
    Continue,
    Debugger,
    Default,
    Delete,
    Do,
    Else,
    Enum,
    Export,
    Extends,
    Finally,
    For,
    Function,
    If,
    Import,
    In,
    Instanceof,
    Let,
    New,
    Of,
    Return,
    Static,
    Super,
    Switch,
    This,
    Throw,
    Try,
    Typeof,
    Var,
    Void,
    While,
    With,
    Yield,
}

const KEYWORDS: &[(&str, Keyword)] = &[
    ("async", Keyword::Async),
    ("await", Keyword::Await),
    ("break", Keyword::Break),
    ("case", Keyword::Case),
    ("catch", Keyword::Catch),
    ("class", Keyword::Class),
    ("const", Keyword::Const),
    ("continue", Keyword::Continue),
    ("debugger", Keyword::Debugger),
    ("default", Keyword::Default),
    ("delete", Keyword::Delete),
    ("do", Keyword::Do),
    ("else", Keyword::Else),
    ("enum", Keyword::Enum),
    ("export", Keyword::Export),
    ("extends", Keyword::Extends),
    ("finally", Keyword::Finally),
    ("for", Keyword::For),
    ("function", Keyword::Function),
    ("if", Keyword::If),
    ("import", Keyword::Import),
    ("in", Keyword::In),
    ("instanceof", Keyword::Instanceof),
    ("let", Keyword::Let),
    ("new", Keyword::New),
    ("of", Keyword::Of),
    ("return", Keyword::Return),
    ("static", Keyword::Static),
    ("super", Keyword::Super),
    ("switch", Keyword::Switch),
    ("this", Keyword::This),
    ("throw", Keyword::Throw),
    ("try", Keyword::Try),
    ("typeof", Keyword::Typeof),
    ("var", Keyword::Var),
    ("void", Keyword::Void),
    ("while", Keyword::While),
    ("with", Keyword::With),
    ("yield", Keyword::Yield),
];

impl Keyword {
    pub fn from_str(s: &str) -> Option<Keyword> {
        KEYWORDS
            .iter()
            .find(|(text, _)| *text == s)
            .map(|&(_, kw)| kw)
    }

    pub fn as_str(self) -> &'static str {
        KEYWORDS
            .iter()
            .find(|(_, kw)| *kw == self)
            .map_or("", |&(text, _)| text)
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
    pub offset: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text the token was scanned from.
    pub raw: String,
    pub location: SourceLocation,
    /// A line terminator (or a comment containing one) precedes the token.
    pub newline_before: bool,
}

#[derive(Clone, Debug, Error)]
#[error("{}:{}: {}", .location.line, .location.column, .message)]
pub struct LexError {
    pub message: String,
    pub location: SourceLocation,
}

/// Saved cursor for speculative scanning.
#[derive(Clone)]
struct Checkpoint<'a> {
    chars: Chars<'a>,
    current: Option<char>,
    offset: usize,
    line: u32,
    column: u32,
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: Chars<'a>,
    current: Option<char>,
    offset: usize,
    line: u32,
    column: u32,
    /// Only whitespace and comments seen since the last line terminator.
    line_start: bool,
    brace_depth: usize,
    /// `brace_depth` recorded at each open `${`.
    template_stack: Vec<usize>,
    pub strict: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut chars = source.chars();
        let current = chars.next();
        Self {
            source,
            chars,
            current,
            offset: 0,
            line: 1,
            column: 0,
            line_start: true,
            brace_depth: 0,
            template_stack: Vec::new(),
            strict: false,
        }
    }

    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    fn peek(&self) -> Option<char> {
        self.current
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current;
        if let Some(c) = ch {
            self.offset += c.len_utf8();
            self.column += 1;
            self.current = self.chars.next();
        }
        ch
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn lookahead_is(&self, text: &str) -> bool {
        self.source[self.offset..].starts_with(text)
    }

    fn checkpoint(&self) -> Checkpoint<'a> {
        Checkpoint {
            chars: self.chars.clone(),
            current: self.current,
            offset: self.offset,
            line: self.line,
            column: self.column,
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint<'a>) {
        self.chars = checkpoint.chars;
        self.current = checkpoint.current;
        self.offset = checkpoint.offset;
        self.line = checkpoint.line;
        self.column = checkpoint.column;
    }

    fn location(&self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            column: self.column,
            offset: self.offset,
        }
    }

    fn error(&self, message: impl Into<String>) -> LexError {
        LexError {
            message: message.into(),
            location: self.location(),
        }
    }

    fn is_line_terminator(ch: char) -> bool {
        matches!(ch, '\n' | '\r' | '\u{2028}' | '\u{2029}')
    }

    fn is_whitespace(ch: char) -> bool {
        matches!(
            ch,
            '\t' | '\u{000B}' | '\u{000C}' | ' ' | '\u{00A0}' | '\u{FEFF}'
        ) || ch.is_whitespace() && !Self::is_line_terminator(ch)
    }

    fn is_identifier_start(ch: char) -> bool {
        ch == '_' || ch == '$' || ch.is_ascii_alphabetic() || unicode_id_start(ch)
    }

    fn is_identifier_continue(ch: char) -> bool {
        ch == '_'
            || ch == '$'
            || ch.is_ascii_alphanumeric()
            || ch == '\u{200C}'
            || ch == '\u{200D}'
            || unicode_id_continue(ch)
    }

    fn handle_newline(&mut self, ch: char) {
        if ch == '\r' && self.peek() == Some('\n') {
            self.advance();
        }
        self.line += 1;
        self.column = 0;
        self.line_start = true;
    }

    /// Skips whitespace, line terminators and every comment form. Returns
    /// whether a line terminator was crossed.
    fn skip_trivia(&mut self) -> Result<bool, LexError> {
        let mut newline = false;
        loop {
            match self.peek() {
                Some(ch) if Self::is_whitespace(ch) => {
                    self.advance();
                }
                Some(ch) if Self::is_line_terminator(ch) => {
                    self.advance();
                    self.handle_newline(ch);
                    newline = true;
                }
                Some('/') if self.peek_next() == Some('/') => self.skip_line_comment(),
                Some('/') if self.peek_next() == Some('*') => {
                    let start = self.location();
                    self.advance();
                    self.advance();
                    if self.skip_block_comment(start)? {
                        newline = true;
                    }
                }
                // Hashbang
                Some('#') if self.offset == 0 && self.peek_next() == Some('!') => {
                    self.skip_line_comment();
                }
                // Annex B HTML-like comments
                Some('<') if self.lookahead_is("<!--") => self.skip_line_comment(),
                Some('-') if self.line_start && self.lookahead_is("-->") => {
                    self.skip_line_comment();
                }
                _ => return Ok(newline),
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.peek() {
            if Self::is_line_terminator(ch) {
                break;
            }
            self.advance();
        }
    }

    fn skip_block_comment(&mut self, start: SourceLocation) -> Result<bool, LexError> {
        let mut has_line_terminator = false;
        loop {
            match self.advance() {
                Some('*') => {
                    if self.peek() == Some('/') {
                        self.advance();
                        return Ok(has_line_terminator);
                    }
                }
                Some(ch) if Self::is_line_terminator(ch) => {
                    has_line_terminator = true;
                    self.handle_newline(ch);
                }
                Some(_) => {}
                None => {
                    return Err(LexError {
                        message: "Unterminated block comment".to_string(),
                        location: start,
                    });
                }
            }
        }
    }

    fn read_string(&mut self, quote: char) -> Result<JsString, LexError> {
        let mut units = Vec::new();
        loop {
            match self.peek() {
                None => return Err(self.error("Unterminated string literal")),
                Some(ch) if ch == quote => {
                    self.advance();
                    return Ok(JsString::from_code_units(units));
                }
                Some('\n' | '\r') => return Err(self.error("Unterminated string literal")),
                Some('\\') => {
                    self.advance();
                    self.read_escape_sequence(&mut units, false)?;
                }
                Some(ch) => {
                    self.advance();
                    if Self::is_line_terminator(ch) {
                        // LS/PS are allowed inside string literals
                        self.handle_newline(ch);
                    }
                    push_code_point(&mut units, u32::from(ch));
                }
            }
        }
    }

    /// Decodes the escape after a consumed `\` into `out`. Template escapes
    /// reject legacy octal forms regardless of strictness.
    fn read_escape_sequence(&mut self, out: &mut Vec<u16>, template: bool) -> Result<(), LexError> {
        let ch = match self.advance() {
            None => return Err(self.error("Unterminated escape sequence")),
            Some(ch) => ch,
        };
        match ch {
            'n' => out.push(0x0A),
            'r' => out.push(0x0D),
            't' => out.push(0x09),
            'b' => out.push(0x08),
            'f' => out.push(0x0C),
            'v' => out.push(0x0B),
            '0'..='7' => {
                if ch == '0' && !self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    out.push(0); // \0 (null character, not octal)
                    return Ok(());
                }
                if template {
                    return Err(self.error("Octal escape sequences are not allowed in templates"));
                }
                if self.strict {
                    return Err(self.error("Octal escape sequences are not allowed in strict mode"));
                }
                let mut val = octal_digit(ch);
                if let Some(d) = self.peek().filter(|c| ('0'..='7').contains(c)) {
                    self.advance();
                    val = val * 8 + octal_digit(d);
                    if ch <= '3'
                        && let Some(d) = self.peek().filter(|c| ('0'..='7').contains(c))
                    {
                        self.advance();
                        val = val * 8 + octal_digit(d);
                    }
                }
                out.push(val as u16);
            }
            '8' | '9' => {
                if template {
                    return Err(self.error(format!("\\{ch} is not allowed in template literals")));
                }
                if self.strict {
                    return Err(self.error(format!("\\{ch} is not allowed in strict mode")));
                }
                out.push(ch as u16);
            }
            'x' => {
                let mut val = 0;
                for _ in 0..2 {
                    let d = self
                        .peek()
                        .and_then(hex_val)
                        .ok_or_else(|| self.error("Invalid hexadecimal escape sequence"))?;
                    self.advance();
                    val = val * 16 + d;
                }
                out.push(val as u16);
            }
            'u' => {
                let cp = self.read_escaped_code_point()?;
                push_code_point(out, cp);
            }
            ch if Self::is_line_terminator(ch) => {
                // line continuation
                self.handle_newline(ch);
            }
            ch => push_code_point(out, u32::from(ch)),
        }
        Ok(())
    }

    /// Reads the body of a `\u` escape (the `\u` already consumed). A high
    /// surrogate is combined with an immediately following `\uXXXX` low
    /// surrogate; otherwise the cursor is rolled back and the lone surrogate
    /// is returned as is.
    fn read_escaped_code_point(&mut self) -> Result<u32, LexError> {
        let cp = self.read_unicode_escape()?;
        if cp > 0xFFFF || !is_high_surrogate(cp as u16) || !self.lookahead_is("\\u") {
            return Ok(cp);
        }
        let checkpoint = self.checkpoint();
        self.advance();
        self.advance();
        if let Ok(low) = self.read_unicode_escape()
            && low <= 0xFFFF
            && is_low_surrogate(low as u16)
        {
            return Ok(combine_surrogates(cp as u16, low as u16));
        }
        self.restore(checkpoint);
        Ok(cp)
    }

    fn read_unicode_escape(&mut self) -> Result<u32, LexError> {
        if self.peek() == Some('{') {
            self.advance(); // skip {
            let mut val: u32 = 0;
            let mut digits = 0;
            while let Some(ch) = self.peek() {
                if ch == '}' {
                    self.advance();
                    if digits == 0 {
                        return Err(self.error("Invalid Unicode escape"));
                    }
                    return Ok(val);
                }
                let d = hex_val(ch).ok_or_else(|| self.error("Invalid Unicode escape"))?;
                val = val * 16 + d;
                if val > 0x10FFFF {
                    return Err(self.error("Unicode code point out of range"));
                }
                digits += 1;
                self.advance();
            }
            Err(self.error("Unterminated Unicode escape"))
        } else {
            let mut val: u32 = 0;
            for _ in 0..4 {
                let d = self
                    .peek()
                    .and_then(hex_val)
                    .ok_or_else(|| self.error("Invalid Unicode escape"))?;
                self.advance();
                val = val * 16 + d;
            }
            Ok(val)
        }
    }

    fn read_numeric_literal(&mut self, first: char) -> Result<TokenKind, LexError> {
        let kind = self.read_numeric_body(first)?;
        if self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || c == '\\' || Self::is_identifier_start(c))
        {
            return Err(self.error("Identifier starts immediately after numeric literal"));
        }
        Ok(kind)
    }

    fn read_numeric_body(&mut self, first: char) -> Result<TokenKind, LexError> {
        let mut s = String::new();
        s.push(first);

        if first == '0' {
            match self.peek() {
                Some('x' | 'X') => return self.read_radix_literal(16, "hexadecimal"),
                Some('o' | 'O') => return self.read_radix_literal(8, "octal"),
                Some('b' | 'B') => return self.read_radix_literal(2, "binary"),
                Some(c) if c.is_ascii_digit() || c == '_' => {
                    return self.read_legacy_octal_or_decimal(s);
                }
                _ => {}
            }
        }

        let mut integer = first != '.';
        if integer {
            self.read_digits(&mut s, 10)?;
            if self.peek() == Some('.') {
                s.push('.');
                self.advance();
                integer = false;
            }
        }
        if !integer && self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.read_digits(&mut s, 10)?;
        }

        if self.peek().is_some_and(|c| c == 'e' || c == 'E') {
            integer = false;
            self.read_exponent(&mut s)?;
        }

        if self.peek() == Some('n') {
            if !integer {
                return Err(self.error("Invalid BigInt literal"));
            }
            self.advance();
            return parse_bigint(&s, 10).ok_or_else(|| self.error("Invalid BigInt literal"));
        }

        let clean: String = s.chars().filter(|&c| c != '_').collect();
        let val: f64 = clean
            .parse()
            .map_err(|_| self.error("Invalid numeric literal"))?;
        Ok(TokenKind::NumericLiteral(val))
    }

    /// Digits of `radix` with `_` separators, which must sit between two
    /// digits.
    fn read_digits(&mut self, s: &mut String, radix: u32) -> Result<(), LexError> {
        let mut last_was_digit = s.chars().last().is_some_and(|c| c.is_digit(radix));
        while let Some(ch) = self.peek() {
            if ch.is_digit(radix) {
                s.push(ch);
                self.advance();
                last_was_digit = true;
            } else if ch == '_' {
                if !last_was_digit || !self.peek_next().is_some_and(|c| c.is_digit(radix)) {
                    self.advance();
                    return Err(self.error("Numeric separators are not allowed here"));
                }
                s.push(ch);
                self.advance();
                last_was_digit = false;
            } else {
                break;
            }
        }
        Ok(())
    }

    fn read_exponent(&mut self, s: &mut String) -> Result<(), LexError> {
        if let Some(e) = self.advance() {
            s.push(e);
        }
        if let Some(sign) = self.peek().filter(|&c| c == '+' || c == '-') {
            s.push(sign);
            self.advance();
        }
        if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
            return Err(self.error("Missing exponent digits"));
        }
        self.read_digits(s, 10)
    }

    fn read_radix_literal(&mut self, radix: u32, name: &str) -> Result<TokenKind, LexError> {
        self.advance(); // x/o/b
        if !self.peek().is_some_and(|c| c.is_digit(radix)) {
            return Err(self.error(format!("Invalid {name} literal")));
        }
        let mut digits = String::new();
        self.read_digits(&mut digits, radix)?;
        let clean: String = digits.chars().filter(|&c| c != '_').collect();
        if self.peek() == Some('n') {
            self.advance();
            return parse_bigint(&clean, radix).ok_or_else(|| self.error("Invalid BigInt literal"));
        }
        Ok(TokenKind::NumericLiteral(parse_radix(&clean, radix)))
    }

    fn read_legacy_octal_or_decimal(&mut self, mut s: String) -> Result<TokenKind, LexError> {
        if self.peek() == Some('_') {
            self.advance();
            return Err(self.error("Numeric separators are not allowed after a leading 0"));
        }
        let mut is_octal = true;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                if ch >= '8' {
                    is_octal = false;
                }
                s.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        if self.strict {
            return Err(self.error("Legacy octal literals are not allowed in strict mode"));
        }
        if self.peek() == Some('n') {
            return Err(self.error("Invalid BigInt literal"));
        }
        if is_octal {
            let oct_part = &s[1..]; // skip leading 0
            return Ok(TokenKind::LegacyOctalLiteral(parse_radix(oct_part, 8)));
        }
        // Non-octal decimal (e.g. 09, 089.5)
        if self.peek() == Some('.') {
            s.push('.');
            self.advance();
            while let Some(ch) = self.peek().filter(|c| c.is_ascii_digit()) {
                s.push(ch);
                self.advance();
            }
        }
        if self.peek().is_some_and(|c| c == 'e' || c == 'E') {
            self.read_exponent(&mut s)?;
        }
        let val: f64 = s.parse().map_err(|_| self.error("Invalid numeric literal"))?;
        Ok(TokenKind::NumericLiteral(val))
    }

    /// Reads an identifier or keyword starting at the current character,
    /// decoding `\u` escapes before classification.
    fn read_identifier(&mut self) -> Result<TokenKind, LexError> {
        let mut name = String::new();
        loop {
            let at_start = name.is_empty();
            match self.peek() {
                Some('\\') => {
                    self.advance();
                    if self.advance() != Some('u') {
                        return Err(self.error("Invalid escape sequence in identifier"));
                    }
                    let cp = self.read_escaped_code_point()?;
                    let ch = char::from_u32(cp)
                        .filter(|&c| {
                            if at_start {
                                Self::is_identifier_start(c)
                            } else {
                                Self::is_identifier_continue(c)
                            }
                        })
                        .ok_or_else(|| self.error("Invalid Unicode escape in identifier"))?;
                    name.push(ch);
                }
                Some(ch)
                    if (at_start && Self::is_identifier_start(ch))
                        || (!at_start && Self::is_identifier_continue(ch)) =>
                {
                    name.push(ch);
                    self.advance();
                }
                _ => break,
            }
        }

        Ok(match name.as_str() {
            "true" => TokenKind::BooleanLiteral(true),
            "false" => TokenKind::BooleanLiteral(false),
            "null" => TokenKind::NullLiteral,
            _ => match Keyword::from_str(&name) {
                Some(kw) => TokenKind::Keyword(kw),
                None => TokenKind::Identifier(name),
            },
        })
    }

    /// Body and flags of a regular expression literal; the opening `/` has
    /// been consumed.
    fn read_regex(&mut self) -> Result<TokenKind, LexError> {
        let mut pattern = String::new();
        let mut in_class = false;
        loop {
            match self.peek() {
                None => return Err(self.error("Unterminated regular expression")),
                Some(ch) if Self::is_line_terminator(ch) => {
                    return Err(self.error("Unterminated regular expression"));
                }
                Some('/') if !in_class => {
                    self.advance();
                    break;
                }
                Some(ch @ ('[' | ']')) => {
                    in_class = ch == '[';
                    pattern.push(ch);
                    self.advance();
                }
                Some('\\') => {
                    pattern.push('\\');
                    self.advance();
                    match self.peek() {
                        Some(c) if !Self::is_line_terminator(c) => {
                            pattern.push(c);
                            self.advance();
                        }
                        _ => return Err(self.error("Unterminated regular expression")),
                    }
                }
                Some(ch) => {
                    pattern.push(ch);
                    self.advance();
                }
            }
        }
        let mut flags = String::new();
        while let Some(c) = self.peek() {
            if Self::is_identifier_continue(c) {
                flags.push(c);
                self.advance();
            } else {
                break;
            }
        }
        Ok(TokenKind::RegExpLiteral { pattern, flags })
    }

    /// Scans the next token. `goal` decides whether a `/` here starts a
    /// regular expression; see [`LexGoal::after`]. Malformed input produces a
    /// [`TokenKind::Invalid`] token positioned at its start.
    pub fn next_token(&mut self, goal: LexGoal) -> Token {
        let newline_before = match self.skip_trivia() {
            Ok(newline) => newline,
            Err(err) => return self.invalid_token(err.location, err.message, true),
        };
        let start = self.location();
        let kind = match self.scan_token(goal) {
            Ok(kind) => kind,
            Err(err) => return self.invalid_token(start, err.message, newline_before),
        };
        Token {
            kind,
            raw: self.source[start.offset..self.offset].to_string(),
            location: start,
            newline_before,
        }
    }

    /// Like [`Lexer::next_token`], deriving the goal from the previous
    /// significant token.
    pub fn next_after(&mut self, prev: Option<&TokenKind>) -> Token {
        self.next_token(LexGoal::after(prev))
    }

    fn invalid_token(&mut self, start: SourceLocation, message: String, newline_before: bool) -> Token {
        tracing::trace!(
            line = start.line,
            column = start.column,
            %message,
            "invalid token"
        );
        self.line_start = false;
        Token {
            kind: TokenKind::Invalid(message),
            raw: self.source[start.offset..self.offset].to_string(),
            location: start,
            newline_before,
        }
    }

    fn scan_token(&mut self, goal: LexGoal) -> Result<TokenKind, LexError> {
        let ch = match self.peek() {
            None => return Ok(TokenKind::Eof),
            Some(ch) => ch,
        };
        self.line_start = false;

        // Identifiers (possibly starting with an escape)
        if ch == '\\' || Self::is_identifier_start(ch) {
            return self.read_identifier();
        }

        self.advance();

        match ch {
            '\'' | '"' => Ok(TokenKind::StringLiteral(self.read_string(ch)?)),
            '`' => self.read_template_literal(),
            '}' if self.template_stack.last() == Some(&self.brace_depth) => {
                self.template_stack.pop();
                self.read_template_continuation()
            }
            '}' => {
                self.brace_depth = self.brace_depth.saturating_sub(1);
                Ok(TokenKind::RightBrace)
            }
            '{' => {
                self.brace_depth += 1;
                Ok(TokenKind::LeftBrace)
            }
            '/' if goal == LexGoal::RegExp => self.read_regex(),
            c if c.is_ascii_digit() => self.read_numeric_literal(c),
            '.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.read_numeric_literal(ch),
            _ => self.read_punctuator(ch),
        }
    }

    // Returns (cooked, raw, is_tail). is_tail=true means ended with backtick, false means ${
    fn read_template_chars(&mut self) -> Result<(Option<JsString>, String, bool), LexError> {
        let mut cooked = Some(Vec::new());
        let mut raw = String::new();
        loop {
            match self.advance() {
                None => return Err(self.error("Unterminated template literal")),
                Some('`') => return Ok((cooked.map(JsString::from_code_units), raw, true)),
                Some('$') if self.peek() == Some('{') => {
                    self.advance();
                    return Ok((cooked.map(JsString::from_code_units), raw, false));
                }
                Some('\\') => {
                    raw.push('\\');
                    let before_offset = self.offset;
                    let mut units = Vec::new();
                    let ok = self.read_escape_sequence(&mut units, true).is_ok();
                    raw.push_str(&normalize_line_endings(
                        &self.source[before_offset..self.offset],
                    ));
                    match (&mut cooked, ok) {
                        (Some(c), true) => c.extend_from_slice(&units),
                        // Invalid escape: cooked becomes undefined, raw keeps source chars
                        _ => cooked = None,
                    }
                }
                Some(ch) if Self::is_line_terminator(ch) => {
                    let normalized = if ch == '\r' { '\n' } else { ch };
                    self.handle_newline(ch);
                    raw.push(normalized);
                    if let Some(c) = &mut cooked {
                        push_code_point(c, u32::from(normalized));
                    }
                }
                Some(ch) => {
                    raw.push(ch);
                    if let Some(c) = &mut cooked {
                        push_code_point(c, u32::from(ch));
                    }
                }
            }
        }
    }

    fn read_template_literal(&mut self) -> Result<TokenKind, LexError> {
        let (cooked, raw, is_tail) = self.read_template_chars()?;
        if is_tail {
            Ok(TokenKind::NoSubstitutionTemplate(cooked, raw))
        } else {
            self.template_stack.push(self.brace_depth);
            Ok(TokenKind::TemplateHead(cooked, raw))
        }
    }

    fn read_template_continuation(&mut self) -> Result<TokenKind, LexError> {
        let (cooked, raw, is_tail) = self.read_template_chars()?;
        if is_tail {
            Ok(TokenKind::TemplateTail(cooked, raw))
        } else {
            self.template_stack.push(self.brace_depth);
            Ok(TokenKind::TemplateMiddle(cooked, raw))
        }
    }

    fn read_punctuator(&mut self, ch: char) -> Result<TokenKind, LexError> {
        match ch {
            '(' => Ok(TokenKind::LeftParen),
            ')' => Ok(TokenKind::RightParen),
            '[' => Ok(TokenKind::LeftBracket),
            ']' => Ok(TokenKind::RightBracket),
            ';' => Ok(TokenKind::Semicolon),
            ',' => Ok(TokenKind::Comma),
            '~' => Ok(TokenKind::Tilde),
            ':' => Ok(TokenKind::Colon),

            '.' => {
                if self.peek() == Some('.') && self.peek_next() == Some('.') {
                    self.advance();
                    self.advance();
                    Ok(TokenKind::Ellipsis)
                } else {
                    Ok(TokenKind::Dot)
                }
            }

            '?' => {
                if self.peek() == Some('?') {
                    self.advance();
                    Ok(self.with_assign(TokenKind::NullishCoalescing, TokenKind::NullishAssign))
                } else if self.peek() == Some('.')
                    && !self.peek_next().is_some_and(|c| c.is_ascii_digit())
                {
                    self.advance();
                    Ok(TokenKind::OptionalChain)
                } else {
                    Ok(TokenKind::Question)
                }
            }

            '<' => {
                if self.peek() == Some('<') {
                    self.advance();
                    Ok(self.with_assign(TokenKind::LeftShift, TokenKind::LeftShiftAssign))
                } else {
                    Ok(self.with_assign(TokenKind::LessThan, TokenKind::LessThanEqual))
                }
            }

            '>' => {
                if self.peek() == Some('>') {
                    self.advance();
                    if self.peek() == Some('>') {
                        self.advance();
                        Ok(self.with_assign(
                            TokenKind::UnsignedRightShift,
                            TokenKind::UnsignedRightShiftAssign,
                        ))
                    } else {
                        Ok(self.with_assign(TokenKind::RightShift, TokenKind::RightShiftAssign))
                    }
                } else {
                    Ok(self.with_assign(TokenKind::GreaterThan, TokenKind::GreaterThanEqual))
                }
            }

            '=' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Ok(self.with_assign(TokenKind::Equal, TokenKind::StrictEqual))
                } else if self.peek() == Some('>') {
                    self.advance();
                    Ok(TokenKind::Arrow)
                } else {
                    Ok(TokenKind::Assign)
                }
            }

            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Ok(self.with_assign(TokenKind::NotEqual, TokenKind::StrictNotEqual))
                } else {
                    Ok(TokenKind::Bang)
                }
            }

            '+' => {
                if self.peek() == Some('+') {
                    self.advance();
                    Ok(TokenKind::Increment)
                } else {
                    Ok(self.with_assign(TokenKind::Plus, TokenKind::PlusAssign))
                }
            }

            '-' => {
                if self.peek() == Some('-') {
                    self.advance();
                    Ok(TokenKind::Decrement)
                } else {
                    Ok(self.with_assign(TokenKind::Minus, TokenKind::MinusAssign))
                }
            }

            '*' => {
                if self.peek() == Some('*') {
                    self.advance();
                    Ok(self.with_assign(TokenKind::Exponent, TokenKind::ExponentAssign))
                } else {
                    Ok(self.with_assign(TokenKind::Star, TokenKind::StarAssign))
                }
            }

            '/' => Ok(self.with_assign(TokenKind::Slash, TokenKind::SlashAssign)),
            '%' => Ok(self.with_assign(TokenKind::Percent, TokenKind::PercentAssign)),

            '&' => {
                if self.peek() == Some('&') {
                    self.advance();
                    Ok(self.with_assign(TokenKind::LogicalAnd, TokenKind::LogicalAndAssign))
                } else {
                    Ok(self.with_assign(TokenKind::Ampersand, TokenKind::AmpersandAssign))
                }
            }

            '|' => {
                if self.peek() == Some('|') {
                    self.advance();
                    Ok(self.with_assign(TokenKind::LogicalOr, TokenKind::LogicalOrAssign))
                } else {
                    Ok(self.with_assign(TokenKind::Pipe, TokenKind::PipeAssign))
                }
            }

            '^' => Ok(self.with_assign(TokenKind::Caret, TokenKind::CaretAssign)),

            _ => Err(self.error(format!("Unexpected character: {ch}"))),
        }
    }

    /// `assigned` when the next character is `=` (consumed), else `plain`.
    fn with_assign(&mut self, plain: TokenKind, assigned: TokenKind) -> TokenKind {
        if self.peek() == Some('=') {
            self.advance();
            assigned
        } else {
            plain
        }
    }

    /// Scans to the end, deriving each goal from the previous significant
    /// token. The final token is always `Eof`.
    pub fn tokenize_all(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut prev: Option<TokenKind> = None;
        loop {
            let token = self.next_after(prev.as_ref());
            let done = token.kind.is_eof();
            if token.kind.is_significant() {
                prev = Some(token.kind.clone());
            }
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }
}

fn push_code_point(out: &mut Vec<u16>, cp: u32) {
    match char::from_u32(cp) {
        Some(ch) => {
            let mut buf = [0u16; 2];
            out.extend_from_slice(ch.encode_utf16(&mut buf));
        }
        // lone surrogate
        None => out.push(cp as u16),
    }
}

fn normalize_line_endings(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\r', "\n")
}

fn octal_digit(ch: char) -> u32 {
    ch as u32 - '0' as u32
}

fn hex_val(ch: char) -> Option<u32> {
    ch.to_digit(16)
}

fn parse_radix(digits: &str, radix: u32) -> f64 {
    digits
        .chars()
        .filter_map(|c| c.to_digit(radix))
        .fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(d))
}

fn parse_bigint(digits: &str, radix: u32) -> Option<TokenKind> {
    let clean: String = digits.chars().filter(|&c| c != '_').collect();
    BigInt::parse_bytes(clean.as_bytes(), radix).map(TokenKind::BigIntLiteral)
}

fn unicode_id_start(ch: char) -> bool {
    !ch.is_ascii() && unicode_ident::is_xid_start(ch)
}

fn unicode_id_continue(ch: char) -> bool {
    !ch.is_ascii() && unicode_ident::is_xid_continue(ch)
}
