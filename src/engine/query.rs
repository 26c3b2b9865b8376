use nom::{IResult, Parser};
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::{anychar, char, multispace0, multispace1, none_of, one_of};
use nom::combinator::{all_consuming, opt, success, verify};
use nom::multi::{many0, many1, separated_list1};
use nom::sequence::{delimited, preceded};
use crate::core::error::{Error, ErrorKind, Result};
use crate::engine::expr::{CompareOp, Expr};

/// Parses the `--query` syntax.
///
/// ```text
/// a b          a AND b (also a + b)
/// a OR b       either
/// a -b         a AND NOT b
/// (a OR b) c   grouping
/// col:v        equal; col:<v col:<=v col:>v col:>=v col:!v compare
/// col:@v       col contains v
/// col:^v col:$v prefix / suffix
/// "a b"        phrase; backslash escapes the next character anywhere
/// ```
pub fn parse_query(input: &str) -> Result<Expr> {
    match all_consuming(delimited(multispace0, or_expr, multispace0)).parse(input) {
        Ok((_, expr)) => Ok(expr),
        Err(e) => Err(Error::new(
            ErrorKind::Parse,
            format!("invalid query <{}>: {}", input, e),
        )),
    }
}

fn or_expr(input: &str) -> IResult<&str, Expr> {
    separated_list1(delimited(multispace1, tag("OR"), multispace1), and_expr)
        .map(|mut terms| {
            if terms.len() == 1 {
                terms.remove(0)
            } else {
                Expr::Or(terms)
            }
        })
        .parse(input)
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = signed(input)?;
    let (input, rest) = many0(preceded(multispace0, signed)).parse(input)?;

    let mut items = vec![first];
    items.extend(rest);

    if items.len() == 1 && !items[0].0 {
        let (_, expr) = items.remove(0);
        return Ok((input, expr));
    }

    let exprs = items.into_iter()
        .map(|(negated, expr)| if negated { Expr::Not(Box::new(expr)) } else { expr })
        .collect();
    Ok((input, Expr::And(exprs)))
}

/// A primary with an optional `+` or `-` prefix; `true` means negated.
fn signed(input: &str) -> IResult<&str, (bool, Expr)> {
    (opt(one_of("+-")), primary)
        .map(|(sign, expr)| (sign == Some('-'), expr))
        .parse(input)
}

fn primary(input: &str) -> IResult<&str, Expr> {
    alt((group, column_predicate, phrase.map(|p| Expr::keyword(&p)), keyword)).parse(input)
}

fn group(input: &str) -> IResult<&str, Expr> {
    delimited(
        char('('),
        delimited(multispace0, or_expr, multispace0),
        char(')'),
    ).parse(input)
}

fn column_predicate(input: &str) -> IResult<&str, Expr> {
    let (input, column) = take_while1(is_column_char).parse(input)?;
    let (input, _) = char(':').parse(input)?;
    let (input, op) = alt((
        tag("<="), tag(">="), tag("<"), tag(">"),
        tag("!"), tag("@"), tag("^"), tag("$"),
        success(""),
    )).parse(input)?;
    let (input, value) = alt((phrase, bare_word, success(String::new()))).parse(input)?;

    let expr = match op {
        "<=" => Expr::compare(column, CompareOp::LessEqual, &value),
        ">=" => Expr::compare(column, CompareOp::GreaterEqual, &value),
        "<" => Expr::compare(column, CompareOp::Less, &value),
        ">" => Expr::compare(column, CompareOp::Greater, &value),
        "!" => Expr::compare(column, CompareOp::NotEqual, &value),
        "@" => Expr::contains(column, &value),
        "^" => Expr::Prefix { column: column.to_string(), value },
        "$" => Expr::Suffix { column: column.to_string(), value },
        _ => Expr::compare(column, CompareOp::Equal, &value),
    };
    Ok((input, expr))
}

fn keyword(input: &str) -> IResult<&str, Expr> {
    verify(bare_word, |word: &str| word != "OR")
        .map(|word| Expr::keyword(&word))
        .parse(input)
}

fn phrase(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        many0(alt((preceded(char('\\'), anychar), none_of("\"\\")))),
        char('"'),
    )
    .map(|chars| chars.into_iter().collect())
    .parse(input)
}

fn bare_word(input: &str) -> IResult<&str, String> {
    many1(alt((preceded(char('\\'), anychar), none_of(" \t\r\n()\"\\"))))
        .map(|chars| chars.into_iter().collect())
        .parse(input)
}

fn is_column_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::expr::Operand;

    #[test]
    fn joined_fragments() {
        let expr = parse_query("(id:>=2)+(id:<5)").unwrap();
        assert_eq!(expr, Expr::And(vec![
            Expr::compare("id", CompareOp::GreaterEqual, "2"),
            Expr::compare("id", CompareOp::Less, "5"),
        ]));
    }

    #[test]
    fn escapes_are_resolved() {
        let expr = parse_query(r#"(title:@a\ b\(c\)\'d\"e\\f)"#).unwrap();
        assert_eq!(expr, Expr::contains("title", r#"a b(c)'d"e\f"#));
    }

    #[test]
    fn keywords_or_and_not() {
        let expr = parse_query("a OR b -c").unwrap();
        assert_eq!(expr, Expr::Or(vec![
            Expr::keyword("a"),
            Expr::And(vec![Expr::keyword("b"), Expr::Not(Box::new(Expr::keyword("c")))]),
        ]));
    }

    #[test]
    fn phrases_and_operators() {
        assert_eq!(parse_query("\"hello world\"").unwrap(), Expr::keyword("hello world"));
        assert_eq!(
            parse_query("name:^ab").unwrap(),
            Expr::Prefix { column: "name".into(), value: "ab".into() }
        );
        assert_eq!(parse_query("flag:!true").unwrap(), Expr::Compare {
            left: Operand::Column("flag".into()),
            op: CompareOp::NotEqual,
            right: Operand::Literal("true".into()),
        });
    }

    #[test]
    fn unbalanced_input_fails() {
        assert_eq!(parse_query("(a").unwrap_err().kind, ErrorKind::Parse);
        assert!(parse_query("a)").is_err());
        assert!(parse_query("").is_err());
    }
}
