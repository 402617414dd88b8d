//! Parser for artifact script, built on chumsky.
//!
//! Statements are parsed with `recursive` combinators so blocks can hold
//! text and nested control flow; expressions use a Pratt parser for
//! operator precedence.

use chumsky::{input::ValueInput, pratt::*, prelude::*};

use crate::ast::{BinOp, Block, Expr, Program, Statement, UnOp};
use crate::error::Error;
use crate::lexer::{first_error, tokenize, Span, Token};

pub type ParseError<'tokens> = Rich<'tokens, Token, Span>;

/// Parse a compiled artifact into a program.
pub fn parse(input: &str) -> Result<Program, Error> {
    let tokens = tokenize(input)?;
    let eoi = Span::from(input.len()..input.len());

    let result = program()
        .parse(tokens.map(eoi, |(token, span)| (token, span)))
        .into_result()
        .map_err(|errors| first_error(input, &errors));
    result
}

fn binary(left: Expr, op: BinOp, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn expression<'tokens, I>() -> impl Parser<'tokens, I, Expr, extra::Err<ParseError<'tokens>>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
{
    recursive(|expr| {
        let literal = select! {
            Token::Number(number) => Expr::Number(number),
            Token::Str(text) => Expr::String(text),
            Token::True => Expr::True,
            Token::False => Expr::False,
            Token::Null => Expr::Null,
            Token::Variable(name) => Expr::Variable(name),
        };

        let ident = select! { Token::Ident(name) => name };

        let list = expr
            .clone()
            .separated_by(just(Token::Comma))
            .collect::<Vec<_>>();

        let call = ident
            .clone()
            .then(list.clone().delimited_by(just(Token::LParen), just(Token::RParen)))
            .map(|(name, args)| Expr::Call { name, args });

        let array = list
            .delimited_by(just(Token::LBracket), just(Token::RBracket))
            .map(Expr::Array);

        let nested = expr
            .clone()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        let atom = choice((literal, call, ident.map(Expr::Variable), array, nested));

        let member_name = select! {
            Token::Ident(name) => name,
            Token::Number(number) if number >= 0.0 && number.fract() == 0.0 => format!("{}", number as u64),
        }
        .or(any().try_map(|token: Token, span| match token.keyword() {
            Some(keyword) => Ok(keyword.to_string()),
            None => Err(Rich::custom(span, format!("expected member name, found {}", token))),
        }));

        let member = just(Token::Arrow).ignore_then(member_name);
        let index = expr
            .clone()
            .delimited_by(just(Token::LBracket), just(Token::RBracket));

        let unary = choice((just(Token::Bang).to(UnOp::Not), just(Token::Minus).to(UnOp::Neg)));

        atom.pratt((
            infix(left(1), just(Token::OrOr).to(BinOp::Or), |l, op, r, _| binary(l, op, r)),
            infix(left(2), just(Token::AndAnd).to(BinOp::And), |l, op, r, _| binary(l, op, r)),
            infix(
                left(3),
                choice((
                    just(Token::EqEq).to(BinOp::Eq),
                    just(Token::NotEq).to(BinOp::NotEq),
                )),
                |l, op, r, _| binary(l, op, r),
            ),
            infix(
                left(4),
                choice((
                    just(Token::LtEq).to(BinOp::LtEq),
                    just(Token::GtEq).to(BinOp::GtEq),
                    just(Token::Lt).to(BinOp::Lt),
                    just(Token::Gt).to(BinOp::Gt),
                )),
                |l, op, r, _| binary(l, op, r),
            ),
            infix(
                left(5),
                choice((
                    just(Token::Plus).to(BinOp::Add),
                    just(Token::Minus).to(BinOp::Sub),
                )),
                |l, op, r, _| binary(l, op, r),
            ),
            infix(
                left(6),
                choice((
                    just(Token::Star).to(BinOp::Mul),
                    just(Token::Slash).to(BinOp::Div),
                    just(Token::Percent).to(BinOp::Mod),
                )),
                |l, op, r, _| binary(l, op, r),
            ),
            prefix(7, unary, |op, operand, _| Expr::Unary {
                op,
                operand: Box::new(operand),
            }),
            postfix(8, member, |object, field, _| Expr::Member {
                object: Box::new(object),
                field,
            }),
            postfix(8, index, |object, index, _| Expr::Index {
                object: Box::new(object),
                index: Box::new(index),
            }),
        ))
    })
}

fn program<'tokens, I>() -> impl Parser<'tokens, I, Program, extra::Err<ParseError<'tokens>>>
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
{
    let expr = expression();
    // `;` and island boundaries
    let separators = just(Token::Semi).repeated();

    let statement = recursive(|statement| {
        let body = separators.clone().ignore_then(
            statement
                .then_ignore(separators.clone())
                .repeated()
                .collect::<Vec<_>>(),
        );
        let block = body
            .delimited_by(just(Token::LBrace), just(Token::RBrace))
            .map(|statements| Block { statements });

        let text = select! { Token::Text(text) => Statement::Text(text) };

        let echo = just(Token::Echo)
            .ignore_then(
                expr.clone()
                    .separated_by(just(Token::Comma))
                    .at_least(1)
                    .collect::<Vec<_>>(),
            )
            .map(Statement::Echo);

        // `} else {` may be split across islands: `<% } %><% else { %>`
        let if_statement = recursive(|if_statement| {
            just(Token::If)
                .ignore_then(expr.clone())
                .then(block.clone())
                .then(
                    separators
                        .clone()
                        .ignore_then(just(Token::Else))
                        .ignore_then(choice((
                            if_statement.map(|nested| Block {
                                statements: vec![nested],
                            }),
                            block.clone(),
                        )))
                        .or_not(),
                )
                .map(|((condition, then_block), else_block)| Statement::If {
                    condition,
                    then_block,
                    else_block,
                })
        });

        let loop_variable = select! { Token::Variable(name) => name };
        let for_statement = just(Token::For)
            .ignore_then(loop_variable.clone())
            .then(just(Token::Comma).ignore_then(loop_variable).or_not())
            .then_ignore(just(Token::In))
            .then(expr.clone())
            .then(block)
            .map(|(((first, second), iter), body)| match second {
                Some(var) => Statement::ForIn {
                    key: Some(first),
                    var,
                    iter,
                    body,
                },
                None => Statement::ForIn {
                    key: None,
                    var: first,
                    iter,
                    body,
                },
            });

        let assign = select! { Token::Variable(name) => name }
            .then_ignore(just(Token::Assign))
            .then(expr.clone())
            .map(|(name, value)| Statement::Assign { name, value });

        choice((
            text,
            echo,
            if_statement,
            for_statement,
            assign,
            expr.clone().map(Statement::Expr),
        ))
    });

    separators
        .clone()
        .ignore_then(statement.then_ignore(separators).repeated().collect::<Vec<_>>())
        .then_ignore(end())
        .map(|statements| Program { statements })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Expr {
        Expr::Variable(name.to_string())
    }

    #[test]
    fn test_text_and_echo() {
        let program = parse("Hi <% echo $user->name %>!").unwrap();
        assert_eq!(
            program.statements,
            vec![
                Statement::Text("Hi ".into()),
                Statement::Echo(vec![Expr::Member {
                    object: Box::new(var("user")),
                    field: "name".into(),
                }]),
                Statement::Text("!".into()),
            ]
        );
    }

    #[test]
    fn test_echo_list() {
        let program = parse("<% echo 'a', $b %>").unwrap();
        assert_eq!(
            program.statements,
            vec![Statement::Echo(vec![Expr::String("a".into()), var("b")])]
        );
    }

    #[test]
    fn test_for_spanning_islands() {
        let program = parse("<% for $item in $items { %>- <% echo $item %>\n<% } %>").unwrap();
        match &program.statements[0] {
            Statement::ForIn { key, var, body, .. } => {
                assert!(key.is_none());
                assert_eq!(var, "item");
                assert_eq!(body.statements.len(), 3);
            }
            other => panic!("Expected ForIn, got {:?}", other),
        }
    }

    #[test]
    fn test_for_with_key() {
        let program = parse("<% for $k, $v in $map { } %>").unwrap();
        match &program.statements[0] {
            Statement::ForIn { key, var, .. } => {
                assert_eq!(key.as_deref(), Some("k"));
                assert_eq!(var, "v");
            }
            other => panic!("Expected ForIn, got {:?}", other),
        }
    }

    #[test]
    fn test_else_in_separate_island() {
        let program = parse("<% if $a { %>yes<% } %><% else { %>no<% } %>").unwrap();
        match &program.statements[0] {
            Statement::If { else_block, .. } => assert!(else_block.is_some()),
            other => panic!("Expected If, got {:?}", other),
        }
    }

    #[test]
    fn test_else_if_nests() {
        let program = parse("<% if $a { } else if $b { } else { $c = 1 } %>").unwrap();
        let Statement::If { else_block: Some(else_block), .. } = &program.statements[0] else {
            panic!("Expected If with else, got {:?}", program.statements[0]);
        };
        assert!(matches!(
            else_block.statements[0],
            Statement::If { else_block: Some(_), .. }
        ));
    }

    #[test]
    fn test_precedence() {
        let program = parse("<% 1 + 2 * 3 %>").unwrap();
        assert_eq!(
            program.statements[0],
            Statement::Expr(binary(
                Expr::Number(1.0),
                BinOp::Add,
                binary(Expr::Number(2.0), BinOp::Mul, Expr::Number(3.0)),
            ))
        );
    }

    #[test]
    fn test_unary_binds_looser_than_member() {
        let program = parse("<% !$a->ok && $b %>").unwrap();
        assert_eq!(
            program.statements[0],
            Statement::Expr(binary(
                Expr::Unary {
                    op: UnOp::Not,
                    operand: Box::new(Expr::Member {
                        object: Box::new(var("a")),
                        field: "ok".into(),
                    }),
                },
                BinOp::And,
                var("b"),
            ))
        );
    }

    #[test]
    fn test_call_and_index() {
        let program = parse("<% upper($items[0]) %>").unwrap();
        assert_eq!(
            program.statements[0],
            Statement::Expr(Expr::Call {
                name: "upper".into(),
                args: vec![Expr::Index {
                    object: Box::new(var("items")),
                    index: Box::new(Expr::Number(0.0)),
                }],
            })
        );
    }

    #[test]
    fn test_unclosed_block_is_a_parse_error() {
        let err = parse("\n<% if $x { %>never closed").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }), "got {:?}", err);
    }

    #[test]
    fn test_error_line_points_at_bad_token() {
        let err = parse("a\nb\n<% echo ) %>").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 3, .. }), "got {:?}", err);
    }

    #[test]
    fn test_unmatched_close() {
        assert!(parse("<% } %>").is_err());
    }

    #[test]
    fn test_numeric_and_keyword_members() {
        let program = parse("<% echo $items->0->in %>").unwrap();
        assert_eq!(
            program.statements[0],
            Statement::Echo(vec![Expr::Member {
                object: Box::new(Expr::Member {
                    object: Box::new(var("items")),
                    field: "0".into(),
                }),
                field: "in".into(),
            }])
        );
    }
}
