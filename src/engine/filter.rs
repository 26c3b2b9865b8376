use nom::{IResult, Parser};
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::{anychar, char, multispace0, none_of};
use nom::combinator::{all_consuming, map_res, opt, recognize, value};
use nom::multi::{many0, separated_list1};
use nom::number::complete::double;
use nom::sequence::{delimited, preceded};
use crate::core::error::{Error, ErrorKind, Result};
use crate::engine::expr::{CompareOp, Expr, MatchColumn, Operand, ScoreOp, Scorer};

/// Parses a `--filter` script expression.
///
/// Supports `||`, `&&`, `!`, parentheses, the comparisons
/// `== != < <= > >=`, and `column @ "key"` containment. A bare column is
/// true when its value is truthy.
pub fn parse_filter(input: &str) -> Result<Expr> {
    all_consuming(delimited(multispace0, or_expr, multispace0))
        .parse(input)
        .map(|(_, expr)| expr)
        .map_err(|e| Error::new(
            ErrorKind::Parse,
            format!("invalid filter <{}>: {}", input, e),
        ))
}

/// Parses `--match_columns`: `col`, `col * weight`, joined by `||`.
pub fn parse_match_columns(input: &str) -> Result<Vec<MatchColumn>> {
    let weighted = (
        take_while1(is_identifier_char),
        opt(preceded(ws(char('*')), double)),
    ).map(|(name, weight): (&str, Option<f64>)| MatchColumn {
        name: name.to_string(),
        weight: weight.map_or(1, |w| w as i64),
    });

    all_consuming(delimited(multispace0, separated_list1(ws(tag("||")), weighted), multispace0))
        .parse(input)
        .map(|(_, columns)| columns)
        .map_err(|e| Error::new(
            ErrorKind::Parse,
            format!("invalid match_columns <{}>: {}", input, e),
        ))
}

/// Parses `--scorer`: `_score = _score`, `_score = <number>` or
/// `_score = _score (+|-|*) <number>`.
pub fn parse_scorer(input: &str) -> Result<Scorer> {
    let adjust = preceded(
        tag("_score"),
        opt((
            ws(alt((
                value(ScoreOp::Add, char('+')),
                value(ScoreOp::Subtract, char('-')),
                value(ScoreOp::Multiply, char('*')),
            ))),
            double,
        )),
    ).map(|op| match op {
        Some((op, v)) => Scorer::Adjust(op, v),
        None => Scorer::Adjust(ScoreOp::Add, 0.0),
    });

    let program = preceded(
        (tag("_score"), ws(char('='))),
        alt((adjust, double.map(Scorer::Constant))),
    );

    all_consuming(delimited(multispace0, program, multispace0))
        .parse(input)
        .map(|(_, scorer)| scorer)
        .map_err(|e| Error::new(
            ErrorKind::Parse,
            format!("invalid scorer <{}>: {}", input, e),
        ))
}

fn ws<'a, O, P>(inner: P) -> impl Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>
where
    P: Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>,
{
    delimited(multispace0, inner, multispace0)
}

fn or_expr(input: &str) -> IResult<&str, Expr> {
    separated_list1(ws(tag("||")), and_expr)
        .map(|terms| collapse(terms, Expr::Or))
        .parse(input)
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    separated_list1(ws(tag("&&")), unary)
        .map(|terms| collapse(terms, Expr::And))
        .parse(input)
}

fn collapse(mut terms: Vec<Expr>, combine: fn(Vec<Expr>) -> Expr) -> Expr {
    if terms.len() == 1 {
        terms.remove(0)
    } else {
        combine(terms)
    }
}

fn unary(input: &str) -> IResult<&str, Expr> {
    alt((
        preceded((char('!'), multispace0), unary).map(|e| Expr::Not(Box::new(e))),
        delimited((char('('), multispace0), or_expr, (multispace0, char(')'))),
        comparison,
    )).parse(input)
}

#[derive(Debug, Clone, Copy)]
enum FilterOp {
    Compare(CompareOp),
    Match,
}

fn comparison(input: &str) -> IResult<&str, Expr> {
    let (input, left) = operand(input)?;
    let (input, rest) = opt((ws(filter_op), operand)).parse(input)?;

    let Some((op, right)) = rest else {
        return Ok((input, Expr::Truthy(left)));
    };

    match (op, left, right) {
        (FilterOp::Compare(op), left, right) => Ok((input, Expr::Compare { left, op, right })),
        (FilterOp::Match, Operand::Column(column), Operand::Literal(key)) => {
            Ok((input, Expr::contains(&column, &key)))
        }
        _ => Err(nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::Verify))),
    }
}

fn filter_op(input: &str) -> IResult<&str, FilterOp> {
    alt((
        value(FilterOp::Compare(CompareOp::Equal), tag("==")),
        value(FilterOp::Compare(CompareOp::NotEqual), tag("!=")),
        value(FilterOp::Compare(CompareOp::LessEqual), tag("<=")),
        value(FilterOp::Compare(CompareOp::GreaterEqual), tag(">=")),
        value(FilterOp::Compare(CompareOp::Less), tag("<")),
        value(FilterOp::Compare(CompareOp::Greater), tag(">")),
        value(FilterOp::Match, tag("@")),
    )).parse(input)
}

fn operand(input: &str) -> IResult<&str, Operand> {
    alt((
        string_literal.map(Operand::Literal),
        number_literal.map(|n: &str| Operand::Literal(n.to_string())),
        take_while1(is_identifier_char).map(|name: &str| match name {
            "true" | "false" => Operand::Literal(name.to_string()),
            _ => Operand::Column(name.to_string()),
        }),
    )).parse(input)
}

fn number_literal(input: &str) -> IResult<&str, &str> {
    map_res(recognize(double), |s: &str| {
        if s.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+' || c == '.') {
            Ok(s)
        } else {
            Err(())
        }
    }).parse(input)
}

fn string_literal(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        many0(alt((preceded(char('\\'), anychar), none_of("\"\\")))),
        char('"'),
    )
    .map(|chars| chars.into_iter().collect())
    .parse(input)
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_and_negation() {
        let expr = parse_filter("a == 1 || !(b < 2) && c").unwrap();
        assert_eq!(expr, Expr::Or(vec![
            Expr::compare("a", CompareOp::Equal, "1"),
            Expr::And(vec![
                Expr::Not(Box::new(Expr::compare("b", CompareOp::Less, "2"))),
                Expr::Truthy(Operand::Column("c".into())),
            ]),
        ]));
    }

    #[test]
    fn containment_and_strings() {
        assert_eq!(parse_filter(r#"body @ "a \"q\"""#).unwrap(), Expr::contains("body", r#"a "q""#));
        assert!(parse_filter(r#""x" @ body"#).is_err());
        assert!(parse_filter("a ==").is_err());
    }

    #[test]
    fn literal_on_the_left() {
        assert_eq!(parse_filter("5 < n").unwrap(), Expr::Compare {
            left: Operand::Literal("5".into()),
            op: CompareOp::Less,
            right: Operand::Column("n".into()),
        });
    }

    #[test]
    fn match_columns_with_weights() {
        let columns = parse_match_columns("title * 10 || body").unwrap();
        assert_eq!(columns, vec![
            MatchColumn { name: "title".into(), weight: 10 },
            MatchColumn::new("body"),
        ]);
        assert!(parse_match_columns("").is_err());
    }

    #[test]
    fn scorer_forms() {
        assert_eq!(parse_scorer("_score = _score * 2").unwrap(), Scorer::Adjust(ScoreOp::Multiply, 2.0));
        assert_eq!(parse_scorer("_score=10").unwrap(), Scorer::Constant(10.0));
        assert_eq!(parse_scorer("_score = _score").unwrap().apply(7), 7);
        assert!(parse_scorer("score = 1").is_err());
    }
}
