use std::borrow::Cow;
use std::collections::HashMap;
use nom::{IResult, Parser};
use nom::branch::alt;
use nom::bytes::complete::{take_while, take_while1};
use nom::character::complete::{anychar, char, multispace0, multispace1, none_of};
use nom::combinator::{all_consuming, recognize};
use nom::multi::{many0, separated_list0};
use nom::sequence::{delimited, preceded};
use crate::core::error::{Error, ErrorKind, Result};

/// One parsed command line: `name --option value ...`
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub name: String,
    pub options: HashMap<String, String>,
}

impl Command {
    pub fn get(&self, option: &str) -> Option<&str> {
        self.options.get(option).map(String::as_str)
    }

    /// Option value with every remaining `\x` escape resolved to `x`, for
    /// options whose grammar has no escapes of its own.
    pub fn get_unescaped(&self, option: &str) -> Option<Cow<'_, str>> {
        self.get(option).map(unescape)
    }

    /// Rejects options the command does not know.
    pub fn check_options(&self, known: &[&str]) -> Result<()> {
        match self.options.keys().find(|k| !known.contains(&k.as_str())) {
            Some(unknown) => Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("{}: unknown option --{}", self.name, unknown),
            )),
            None => Ok(()),
        }
    }
}

fn unescape(value: &str) -> Cow<'_, str> {
    if !value.contains('\\') {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Parses a single command line. Inside quotes only the quote character and
/// the backslash are unescaped; other escapes pass through untouched so the
/// query parser can see them.
pub fn parse_command(line: &str) -> Result<Command> {
    let (_, words) = all_consuming(command_words)
        .parse(line)
        .map_err(|e| Error::new(ErrorKind::Parse, format!("invalid command line: {}", e)))?;

    let mut words = words.into_iter();
    let name = words.next().ok_or_else(|| Error::new(
        ErrorKind::Parse,
        "empty command line".to_string(),
    ))?;

    let mut options = HashMap::new();
    while let Some(word) = words.next() {
        let Some(option) = word.strip_prefix("--") else {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("{}: unexpected argument: {}", name, word),
            ));
        };
        let value = words.next().ok_or_else(|| Error::new(
            ErrorKind::InvalidArgument,
            format!("{}: missing value for --{}", name, option),
        ))?;
        options.insert(option.to_string(), value);
    }

    Ok(Command { name, options })
}

/// Splits a batch into its non-blank command lines.
pub fn split_batch(batch: &str) -> impl Iterator<Item = &str> {
    batch.lines().map(str::trim).filter(|line| !line.is_empty())
}

fn command_words(input: &str) -> IResult<&str, Vec<String>> {
    delimited(multispace0, separated_list0(multispace1, word), multispace0).parse(input)
}

fn word(input: &str) -> IResult<&str, String> {
    alt((
        quoted('"'),
        quoted('\''),
        recognize((none_of("\"'"), take_while(|c: char| !c.is_whitespace()))).map(str::to_string),
    )).parse(input)
}

fn quoted(quote: char) -> impl FnMut(&str) -> IResult<&str, String> {
    move |input: &str| {
        delimited(char(quote), many0(quoted_piece(quote)), char(quote))
            .map(|pieces| pieces.concat())
            .parse(input)
    }
}

fn quoted_piece(quote: char) -> impl FnMut(&str) -> IResult<&str, String> {
    move |input: &str| {
        alt((
            preceded(char('\\'), anychar).map(|c| {
                if c == quote || c == '\\' {
                    c.to_string()
                } else {
                    format!("\\{}", c)
                }
            }),
            take_while1(|c: char| c != quote && c != '\\').map(str::to_string),
        )).parse(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_and_quotes() {
        let cmd = parse_command(r#"select --table t1 --query "(a\ b)+(c)" --limit -1 "#).unwrap();
        assert_eq!(cmd.name, "select");
        assert_eq!(cmd.get("table"), Some("t1"));
        assert_eq!(cmd.get("query"), Some(r"(a\ b)+(c)"));
        assert_eq!(cmd.get("limit"), Some("-1"));
    }

    #[test]
    fn quote_and_backslash_are_unescaped() {
        let cmd = parse_command(r#"select --query "x:\\\"y\\\\z""#).unwrap();
        assert_eq!(cmd.get("query"), Some(r#"x:\"y\\z"#));
        let cmd = parse_command(r"status --x 'it\'s'").unwrap();
        assert_eq!(cmd.get("x"), Some("it's"));
    }

    #[test]
    fn plain_options_drop_escapes() {
        let cmd = parse_command(r#"select --filter "n\ >\ 3" --scorer "_score\ =\ 1""#).unwrap();
        assert_eq!(cmd.get_unescaped("filter").as_deref(), Some("n > 3"));
        assert_eq!(cmd.get_unescaped("scorer").as_deref(), Some("_score = 1"));
        assert_eq!(cmd.get_unescaped("missing"), None);
    }

    #[test]
    fn malformed_lines() {
        assert!(parse_command("select --table").is_err());
        assert!(parse_command("select t1").is_err());
        assert!(parse_command(r#"select --query "open"#).is_err());
        assert!(parse_command("   ").is_err());
    }

    #[test]
    fn unknown_options_are_reported() {
        let cmd = parse_command("status --bogus 1").unwrap();
        assert_eq!(cmd.check_options(&[]).unwrap_err().kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn batch_skips_blank_lines() {
        let lines: Vec<_> = split_batch("status\n\n  table_list \n").collect();
        assert_eq!(lines, vec!["status", "table_list"]);
    }
}
