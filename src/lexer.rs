use chumsky::{prelude::*, text};
use std::fmt;

use crate::diagnostic::{line_col, Span};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords (matched case-insensitively)
    Is,
    Has,
    Do,
    End,
    Print,
    Can,
    Loses,
    Relation,
    Debug,
    When,
    Else,
    All,
    Each,
    Where,
    Of,
    Random,
    Chance,
    And,
    Or,
    Not,

    // Literals and Identifiers
    Ident(String),
    Number(f64),
    Str(String),
    QueryVar(String),
    Question,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    NotEq,
    Greater,
    Less,
    GreaterEq,
    LessEq,

    // Delimiters
    Dot,
    Comma,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Newline,
    Eof,
}

impl Token {
    /// Source-shaped rendering, used in parser error messages.
    pub fn lexeme(&self) -> String {
        match self {
            Token::Is => "IS".to_string(),
            Token::Has => "HAS".to_string(),
            Token::Do => "DO".to_string(),
            Token::End => "END".to_string(),
            Token::Print => "PRINT".to_string(),
            Token::Can => "CAN".to_string(),
            Token::Loses => "LOSES".to_string(),
            Token::Relation => "RELATION".to_string(),
            Token::Debug => "DEBUG".to_string(),
            Token::When => "WHEN".to_string(),
            Token::Else => "ELSE".to_string(),
            Token::All => "ALL".to_string(),
            Token::Each => "EACH".to_string(),
            Token::Where => "WHERE".to_string(),
            Token::Of => "OF".to_string(),
            Token::Random => "RANDOM".to_string(),
            Token::Chance => "CHANCE".to_string(),
            Token::And => "AND".to_string(),
            Token::Or => "OR".to_string(),
            Token::Not => "NOT".to_string(),
            Token::Ident(name) => name.clone(),
            Token::Number(n) => {
                if n.fract() == 0.0 {
                    format!("{:.0}", n)
                } else {
                    n.to_string()
                }
            }
            Token::Str(s) => format!("\"{}\"", s),
            Token::QueryVar(name) => format!("?{}", name),
            Token::Question => "?".to_string(),
            Token::Plus => "+".to_string(),
            Token::Minus => "-".to_string(),
            Token::Star => "*".to_string(),
            Token::Slash => "/".to_string(),
            Token::Percent => "%".to_string(),
            Token::Eq => "==".to_string(),
            Token::NotEq => "!=".to_string(),
            Token::Greater => ">".to_string(),
            Token::Less => "<".to_string(),
            Token::GreaterEq => ">=".to_string(),
            Token::LessEq => "<=".to_string(),
            Token::Dot => ".".to_string(),
            Token::Comma => ",".to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
            Token::LBrace => "{".to_string(),
            Token::RBrace => "}".to_string(),
            Token::Newline => "newline".to_string(),
            Token::Eof => "end of input".to_string(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lexeme())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}] {}", self.line, self.column, self.message)
    }
}

impl std::error::Error for LexError {}

fn keyword_or_ident(word: &str) -> Token {
    match word.to_ascii_lowercase().as_str() {
        "is" => Token::Is,
        "has" => Token::Has,
        "do" => Token::Do,
        "end" => Token::End,
        "print" => Token::Print,
        "can" => Token::Can,
        "loses" => Token::Loses,
        "relation" => Token::Relation,
        "debug" => Token::Debug,
        "when" => Token::When,
        "else" => Token::Else,
        "all" => Token::All,
        "each" => Token::Each,
        "where" => Token::Where,
        "of" => Token::Of,
        "random" => Token::Random,
        "chance" => Token::Chance,
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        _ => Token::Ident(word.to_string()),
    }
}

fn lexer<'a>()
-> impl Parser<'a, &'a str, Vec<(Token, SimpleSpan)>, extra::Err<Simple<'a, char>>> {
    let number = text::digits(10)
        .then(just('.').then(text::digits(10)).or_not())
        .to_slice()
        .map(|s: &str| Token::Number(s.parse().unwrap()));

    // No escape sequences; embedded newlines stay literal.
    let string = just('"')
        .ignore_then(none_of('"').repeated().collect::<String>())
        .then_ignore(just('"'))
        .map(Token::Str);

    // Identifiers start with a letter so user syntax can never produce the
    // underscore-prefixed internal property keys.
    let word = any()
        .filter(|c: &char| c.is_ascii_alphabetic())
        .then(
            any()
                .filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_')
                .repeated(),
        )
        .to_slice();

    let ident = word.clone().map(keyword_or_ident);

    let query = just('?')
        .ignore_then(word.or_not())
        .map(|name: Option<&str>| match name {
            Some(n) => Token::QueryVar(n.to_string()),
            None => Token::Question,
        });

    let multi_char_operators = choice((
        just("==").to(Token::Eq),
        just("!=").to(Token::NotEq),
        just(">=").to(Token::GreaterEq),
        just("<=").to(Token::LessEq),
    ));

    // A bare `=` or `!` matches nothing here and surfaces as a lex error.
    let single_char_operators = choice((
        just('+').to(Token::Plus),
        just('-').to(Token::Minus),
        just('*').to(Token::Star),
        just('/').to(Token::Slash),
        just('%').to(Token::Percent),
        just('>').to(Token::Greater),
        just('<').to(Token::Less),
        just('.').to(Token::Dot),
        just(',').to(Token::Comma),
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just('{').to(Token::LBrace),
        just('}').to(Token::RBrace),
    ));

    let operators = multi_char_operators.or(single_char_operators);

    let newline = just('\n').to(Token::Newline);

    // Line comments stop before the newline: the terminator still counts.
    let comment = just('/')
        .then(just('/'))
        .ignore_then(any().and_is(just('\n').not()).repeated())
        .ignored();

    let inline_ws = any()
        .filter(|c: &char| *c == ' ' || *c == '\t' || *c == '\r')
        .ignored();

    let padding = choice((comment, inline_ws)).repeated();

    let token = choice((number, string, query, ident, operators, newline))
        .map_with(|tok, e| (tok, e.span()))
        .padded_by(padding.clone());

    padding
        .ignore_then(token.repeated().collect())
        .then_ignore(end())
}

/// Tokenizes a source string, appending a final `Eof` token.
pub fn tokenize(source: &str) -> Result<Vec<(Token, Span)>, LexError> {
    let result = lexer().parse(source);
    if let Some(err) = result.errors().next() {
        let span = err.span();
        let (line, column) = line_col(source, span.start);
        // A reported `"` is always an opening quote that never closed.
        let message = match err.found().copied() {
            Some('"') | None => "unterminated string literal".to_string(),
            Some(c) => format!("unexpected character '{}'", c),
        };
        return Err(LexError {
            line,
            column,
            message,
        });
    }

    let mut tokens: Vec<(Token, Span)> = result
        .into_output()
        .unwrap_or_default()
        .into_iter()
        .map(|(tok, span)| (tok, Span::new(span.start, span.end)))
        .collect();
    tokens.push((Token::Eof, Span::new(source.len(), source.len())));
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        tokenize(source)
            .expect("lexer failed")
            .into_iter()
            .map(|(tok, _)| tok)
            .collect()
    }

    #[test]
    fn test_keywords_case_insensitive() {
        assert_eq!(lex("IS"), vec![Token::Is, Token::Eof]);
        assert_eq!(lex("is"), vec![Token::Is, Token::Eof]);
        assert_eq!(lex("Has"), vec![Token::Has, Token::Eof]);
        assert_eq!(lex("chance"), vec![Token::Chance, Token::Eof]);
    }

    #[test]
    fn test_identifiers_are_case_sensitive() {
        assert_eq!(
            lex("Player player"),
            vec![
                Token::Ident("Player".to_string()),
                Token::Ident("player".to_string()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(lex("42"), vec![Token::Number(42.0), Token::Eof]);
        assert_eq!(lex("3.14"), vec![Token::Number(3.14), Token::Eof]);
        assert_eq!(lex("0"), vec![Token::Number(0.0), Token::Eof]);
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            lex(r#""Hero""#),
            vec![Token::Str("Hero".to_string()), Token::Eof]
        );
        assert_eq!(lex(r#""""#), vec![Token::Str(String::new()), Token::Eof]);
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("\"oops").expect_err("should fail");
        assert_eq!(err.message, "unterminated string literal");
    }

    #[test]
    fn test_stray_equals_and_bang() {
        assert!(tokenize("x = 5").is_err());
        assert!(tokenize("!x").is_err());
        assert!(tokenize("x == 5").is_ok());
        assert!(tokenize("x != 5").is_ok());
    }

    #[test]
    fn test_error_position() {
        let err = tokenize("Player HAS HP 1\nx = 5").expect_err("should fail");
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 3);
    }

    #[test]
    fn test_query_tokens() {
        assert_eq!(
            lex("?m"),
            vec![Token::QueryVar("m".to_string()), Token::Eof]
        );
        assert_eq!(lex("?"), vec![Token::Question, Token::Eof]);
        assert_eq!(
            lex("? IS"),
            vec![Token::Question, Token::Is, Token::Eof]
        );
    }

    #[test]
    fn test_newlines_are_tokens() {
        assert_eq!(
            lex("a\nb"),
            vec![
                Token::Ident("a".to_string()),
                Token::Newline,
                Token::Ident("b".to_string()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_comment_keeps_newline() {
        assert_eq!(
            lex("a // trailing comment\nb"),
            vec![
                Token::Ident("a".to_string()),
                Token::Newline,
                Token::Ident("b".to_string()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            lex("1 + 2 * 3 % 4"),
            vec![
                Token::Number(1.0),
                Token::Plus,
                Token::Number(2.0),
                Token::Star,
                Token::Number(3.0),
                Token::Percent,
                Token::Number(4.0),
                Token::Eof
            ]
        );
        assert_eq!(
            lex("<= >= < >"),
            vec![
                Token::LessEq,
                Token::GreaterEq,
                Token::Less,
                Token::Greater,
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_property_access() {
        assert_eq!(
            lex("Goblin.HP"),
            vec![
                Token::Ident("Goblin".to_string()),
                Token::Dot,
                Token::Ident("HP".to_string()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_leading_underscore_rejected() {
        assert!(tokenize("_Abilities").is_err());
        assert!(tokenize("a_b").is_ok());
    }

    #[test]
    fn test_string_with_embedded_newline() {
        let tokens = lex("\"two\nlines\"");
        assert_eq!(
            tokens,
            vec![Token::Str("two\nlines".to_string()), Token::Eof]
        );
    }
}
