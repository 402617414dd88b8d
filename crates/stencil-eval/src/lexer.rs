//! Tokenizer for compiled artifacts.
//!
//! The lexer runs in two modes. Outside code islands everything up to the
//! next `<%` is a single `Text` token. Inside an island it produces script
//! tokens until the matching `%>`, which is emitted as a `Semi` so that an
//! island boundary always terminates a statement.

use std::fmt;

use chumsky::prelude::*;

use crate::error::Error;

pub const ISLAND_OPEN: &str = "<%";
pub const ISLAND_CLOSE: &str = "%>";

pub type Span = SimpleSpan;
pub type Spanned = (Token, Span);

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Literal text outside code islands
    Text(String),
    /// `$name`
    Variable(String),
    /// Builtin names and bare variable names
    Ident(String),
    Number(f64),
    Str(String),

    Echo,
    If,
    Else,
    For,
    In,
    True,
    False,
    Null,

    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    /// `;` or the end of a code island
    Semi,
    /// `->`
    Arrow,

    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    AndAnd,
    OrOr,
}

impl Token {
    /// Keywords double as member names after `->`
    pub fn keyword(&self) -> Option<&'static str> {
        Some(match self {
            Self::Echo => "echo",
            Self::If => "if",
            Self::Else => "else",
            Self::For => "for",
            Self::In => "in",
            Self::True => "true",
            Self::False => "false",
            Self::Null => "null",
            _ => return None,
        })
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(keyword) = self.keyword() {
            return f.write_str(keyword);
        }
        match self {
            Self::Text(_) => f.write_str("text"),
            Self::Variable(name) => write!(f, "${}", name),
            Self::Ident(name) => f.write_str(name),
            Self::Number(number) => write!(f, "{}", number),
            Self::Str(text) => write!(f, "{:?}", text),
            Self::LBrace => f.write_str("{"),
            Self::RBrace => f.write_str("}"),
            Self::LParen => f.write_str("("),
            Self::RParen => f.write_str(")"),
            Self::LBracket => f.write_str("["),
            Self::RBracket => f.write_str("]"),
            Self::Comma => f.write_str(","),
            Self::Semi => f.write_str(";"),
            Self::Arrow => f.write_str("->"),
            Self::Assign => f.write_str("="),
            Self::Plus => f.write_str("+"),
            Self::Minus => f.write_str("-"),
            Self::Star => f.write_str("*"),
            Self::Slash => f.write_str("/"),
            Self::Percent => f.write_str("%"),
            Self::Bang => f.write_str("!"),
            Self::EqEq => f.write_str("=="),
            Self::NotEq => f.write_str("!="),
            Self::Lt => f.write_str("<"),
            Self::LtEq => f.write_str("<="),
            Self::Gt => f.write_str(">"),
            Self::GtEq => f.write_str(">="),
            Self::AndAnd => f.write_str("&&"),
            Self::OrOr => f.write_str("||"),
            _ => Ok(()),
        }
    }
}

/// Tokenize a full artifact.
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, Error> {
    lexer()
        .parse(input)
        .into_result()
        .map_err(|errors| first_error(input, &errors))
}

/// Convert the first chumsky error into a line-numbered parse error.
pub(crate) fn first_error<T: fmt::Display>(input: &str, errors: &[Rich<'_, T, Span>]) -> Error {
    match errors.first() {
        Some(error) => Error::parse(line_of(input, error.span().start), error.to_string()),
        None => Error::parse(1, "invalid artifact"),
    }
}

/// 1-based line of a byte offset.
pub(crate) fn line_of(input: &str, offset: usize) -> usize {
    let before = input.get(..offset).unwrap_or(input);
    before.matches('\n').count() + 1
}

fn string_literal<'src>(
    quote: char,
) -> impl Parser<'src, &'src str, String, extra::Err<Rich<'src, char>>> + Clone {
    let escape = just('\\').ignore_then(any()).map(|c: char| match c {
        'n' => "\n".to_string(),
        't' => "\t".to_string(),
        'r' => "\r".to_string(),
        '\\' | '"' | '\'' | '$' => c.to_string(),
        other => format!("\\{}", other),
    });
    let plain = none_of([quote, '\\']).map(|c: char| c.to_string());

    just(quote)
        .ignore_then(escape.or(plain).repeated().collect::<Vec<String>>())
        .then_ignore(just(quote))
        .map(|parts| parts.concat())
}

pub fn lexer<'src>() -> impl Parser<'src, &'src str, Vec<Spanned>, extra::Err<Rich<'src, char>>> {
    let word = any()
        .filter(|c: &char| c.is_alphabetic() || *c == '_')
        .then(any().filter(|c: &char| c.is_alphanumeric() || *c == '_').repeated())
        .to_slice();

    let variable = just('$')
        .ignore_then(word.clone())
        .map(|name: &str| Token::Variable(name.to_string()));

    let keyword_or_ident = word.map(|word: &str| match word {
        "echo" => Token::Echo,
        "if" => Token::If,
        "else" => Token::Else,
        "for" => Token::For,
        "in" => Token::In,
        "true" => Token::True,
        "false" => Token::False,
        "null" => Token::Null,
        _ => Token::Ident(word.to_string()),
    });

    let number = text::int(10)
        .then(just('.').then(text::digits(10)).or_not())
        .to_slice()
        .from_str()
        .unwrapped()
        .map(Token::Number);

    let string = choice((string_literal('"'), string_literal('\''))).map(Token::Str);

    let operator = choice((
        just("->").to(Token::Arrow),
        just("==").to(Token::EqEq),
        just("!=").to(Token::NotEq),
        just("<=").to(Token::LtEq),
        just(">=").to(Token::GtEq),
        just("&&").to(Token::AndAnd),
        just("||").to(Token::OrOr),
        just('=').to(Token::Assign),
        just('+').to(Token::Plus),
        just('-').to(Token::Minus),
        just('*').to(Token::Star),
        just('/').to(Token::Slash),
        just('%').and_is(just(ISLAND_CLOSE).not()).to(Token::Percent),
        just('!').to(Token::Bang),
        just('<').to(Token::Lt),
        just('>').to(Token::Gt),
    ));

    let punctuation = choice((
        just('{').to(Token::LBrace),
        just('}').to(Token::RBrace),
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just('[').to(Token::LBracket),
        just(']').to(Token::RBracket),
        just(',').to(Token::Comma),
        just(';').to(Token::Semi),
    ));

    let script_token = choice((variable, string, number, keyword_or_ident, operator, punctuation))
        .map_with(|token, extra| (token, extra.span()));

    let island = just(ISLAND_OPEN)
        .ignore_then(text::whitespace())
        .ignore_then(script_token.padded().repeated().collect::<Vec<_>>())
        .then(just(ISLAND_CLOSE).map_with(|_, extra| (Token::Semi, extra.span())))
        .map(|(mut tokens, close)| {
            tokens.push(close);
            tokens
        });

    let text = any()
        .and_is(just(ISLAND_OPEN).not())
        .repeated()
        .at_least(1)
        .to_slice()
        .map_with(|text: &str, extra| vec![(Token::Text(text.to_string()), extra.span())]);

    choice((island, text))
        .repeated()
        .collect::<Vec<_>>()
        .then_ignore(end())
        .map(|chunks| chunks.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input).unwrap().into_iter().map(|(token, _)| token).collect()
    }

    #[test]
    fn test_text_only() {
        assert_eq!(kinds("hello"), vec![Token::Text("hello".into())]);
    }

    #[test]
    fn test_island_ends_with_semi() {
        assert_eq!(
            kinds("a<% echo $x->y %>b"),
            vec![
                Token::Text("a".into()),
                Token::Echo,
                Token::Variable("x".into()),
                Token::Arrow,
                Token::Ident("y".into()),
                Token::Semi,
                Token::Text("b".into()),
            ]
        );
    }

    #[test]
    fn test_empty_island() {
        assert_eq!(kinds("<% %>"), vec![Token::Semi]);
    }

    #[test]
    fn test_close_marker_inside_string() {
        assert_eq!(
            kinds("<% echo '%>' %>"),
            vec![Token::Echo, Token::Str("%>".into()), Token::Semi]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#"<% "a\n\"b\"\q" %>"#),
            vec![Token::Str("a\n\"b\"\\q".into()), Token::Semi]
        );
    }

    #[test]
    fn test_modulo_next_to_close() {
        assert_eq!(
            kinds("<% 7 % 2%>"),
            vec![Token::Number(7.0), Token::Percent, Token::Number(2.0), Token::Semi]
        );
    }

    #[test]
    fn test_decimal_number() {
        assert_eq!(kinds("<% 1.5 %>"), vec![Token::Number(1.5), Token::Semi]);
    }

    #[test]
    fn test_spans_map_to_lines() {
        let input = "one\ntwo\n<% echo %>";
        let tokens = tokenize(input).unwrap();
        assert_eq!(tokens[1].0, Token::Echo);
        assert_eq!(line_of(input, tokens[1].1.start), 3);
    }

    #[test]
    fn test_unterminated_island() {
        let err = tokenize("x\n<% echo 1").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }), "got {:?}", err);
    }

    #[test]
    fn test_unexpected_character() {
        let err = tokenize("ok\n\n<% echo # %>").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 3, .. }), "got {:?}", err);
    }
}
