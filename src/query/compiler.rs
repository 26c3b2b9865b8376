use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::IndexDescriptor;
use crate::query::types::{ScanKey, Strategy};

/// Appends `s` to `buf` escaped for a query string inside a double-quoted
/// command argument.
///
/// Blank, parentheses and single quote get one backslash. Double quote and
/// backslash get an escaped backslash plus their own escape, so the query
/// parser still sees them escaped after the command parser unquotes.
pub fn escape_into(buf: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            ' ' | '(' | ')' | '\'' => buf.push('\\'),
            '"' | '\\' => buf.push_str("\\\\\\"),
            _ => {}
        }
        buf.push(c);
    }
}

pub fn escape(s: &str) -> String {
    let mut buf = String::with_capacity(s.len() + 8);
    escape_into(&mut buf, s);
    buf
}

/// Leading part of every scan command, up to the query.
pub fn select_prefix(index: &IndexDescriptor) -> String {
    format!(
        "select --table {} --sortby _key --output_columns _key,_score --limit -1 ",
        index.identity.table_name()
    )
}

/// Translates scan keys into one engine `select` command.
///
/// Attribute keys become `(attr<op>value)` terms joined by `+` inside a
/// single `--query`. A free query key is appended verbatim and must be the
/// only key of the scan. Keys with a null value are dropped.
pub fn compile(index: &IndexDescriptor, keys: &[ScanKey]) -> Result<String> {
    if keys.iter().any(ScanKey::is_query) && keys.len() > 1 {
        let message = if keys.iter().all(ScanKey::is_query) {
            "cannot use multiple query keys in the same query"
        } else {
            "cannot use both query and non-query keys in the same scan"
        };
        return Err(Error::unsupported(message));
    }

    let mut command = select_prefix(index);
    let mut fragments = 0;

    for key in keys {
        let Some(value) = &key.value else {
            continue;
        };

        let attribute = index.attribute(key.attno).ok_or_else(|| {
            Error::unsupported(format!("invalid attno in scankey: {}", key.attno))
        })?;
        let strategy = Strategy::try_from(key.strategy)?;

        match strategy.operator() {
            Some(operator) => {
                command.push_str(if fragments == 0 { "--query \"(" } else { ")+(" });
                fragments += 1;

                command.push_str(&attribute.name);
                command.push_str(operator);
                escape_into(&mut command, &attribute.kind.query_literal(value)?);
            }
            None => {
                let query = value.as_str().ok_or_else(|| Error::new(
                    ErrorKind::InvalidArgument,
                    format!("query key must be text, got {:?}", value),
                ))?;
                command.push_str(query);
            }
        }
    }

    if fragments > 0 {
        command.push_str(")\"");
    }
    Ok(command)
}
