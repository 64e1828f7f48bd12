//! SQL text writer with positional parameters.
//!
//! The builder renders every statement into a [`Sql`] value: SQL text using `?`
//! placeholders plus the [`Value`]s bound to them, in placeholder order. The
//! writer only appends, so parameters of nested fragments (subqueries, raw
//! expressions) land exactly where their text lands.

use crate::value::Value;

/// An append-only SQL fragment with its bound parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sql {
    text: String,
    params: Vec<Value>,
}

impl Sql {
    /// Create a writer with an initial SQL fragment.
    pub fn new(initial_sql: impl Into<String>) -> Self {
        Self {
            text: initial_sql.into(),
            params: Vec::new(),
        }
    }

    /// Create an empty writer.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Append raw SQL (no parameters).
    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.text.push_str(sql);
        self
    }

    /// Append a `?` placeholder and bind its value.
    pub fn push_bind(&mut self, value: impl Into<Value>) -> &mut Self {
        self.text.push('?');
        self.params.push(value.into());
        self
    }

    /// Append comma separated placeholders for every value.
    pub fn push_bind_list<I>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        for (i, v) in values.into_iter().enumerate() {
            if i > 0 {
                self.text.push_str(", ");
            }
            self.push_bind(v);
        }
        self
    }

    /// Queue parameters without emitting placeholder text.
    ///
    /// Used when the surrounding text already carries the placeholders.
    pub fn bind_only<I>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.params.extend(values.into_iter().map(Into::into));
        self
    }

    /// Append a fragment together with its parameters.
    pub fn push_sql(&mut self, other: &Sql) -> &mut Self {
        self.text.push_str(&other.text);
        self.params.extend(other.params.iter().cloned());
        self
    }

    /// Append a raw fragment that already carries `?` placeholders for `params`.
    pub fn push_raw(&mut self, sql: &str, params: &[Value]) -> &mut Self {
        self.text.push_str(sql);
        self.params.extend(params.iter().cloned());
        self
    }

    /// Insert text at a byte offset (used for `TOP n` after the statement head).
    pub(crate) fn insert_text(&mut self, at: usize, text: &str) {
        self.text.insert_str(at, text);
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Current SQL text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Bound parameters, in placeholder order.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Number of `?` placeholders outside quoted literals and identifiers.
    pub fn placeholder_count(&self) -> usize {
        count_placeholders(&self.text)
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.text, self.params)
    }
}

/// Count `?` placeholders, skipping `'...'`, `"..."` and `` `...` `` quoted spans.
pub(crate) fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    let mut quote: Option<char> = None;
    for c in sql.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '?' => count += 1,
                _ => {}
            },
        }
    }
    count
}

/// Inline parameters into their placeholders for display purposes.
pub(crate) fn interpolate(sql: &str, params: &[Value]) -> String {
    let mut out = String::with_capacity(sql.len() + params.len() * 4);
    let mut quote: Option<char> = None;
    let mut params = params.iter();
    for c in sql.chars() {
        match quote {
            Some(q) if c == q => {
                quote = None;
                out.push(c);
            }
            Some(_) => out.push(c),
            None => match c {
                '\'' | '"' | '`' => {
                    quote = Some(c);
                    out.push(c);
                }
                '?' => match params.next() {
                    Some(v) => out.push_str(&v.to_sql_inline()),
                    None => out.push('?'),
                },
                _ => out.push(c),
            },
        }
    }
    out
}

/// Rewrite `?` placeholders to PostgreSQL's `$1, $2, ...`.
pub(crate) fn to_numbered(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut quote: Option<char> = None;
    let mut n = 0;
    for c in sql.chars() {
        match quote {
            Some(q) if c == q => {
                quote = None;
                out.push(c);
            }
            Some(_) => out.push(c),
            None => match c {
                '\'' | '"' | '`' => {
                    quote = Some(c);
                    out.push(c);
                }
                '?' => {
                    n += 1;
                    out.push('$');
                    out.push_str(&n.to_string());
                }
                _ => out.push(c),
            },
        }
    }
    out
}
