//! Tokenizer for the device line protocol.
//!
//! A protocol line is a leading identifier followed by either a bare scalar
//! or a sequence of `key=value` pairs:
//!
//! ```text
//! switch relay_1 state=ON
//! light porch_1 state=ON brightness=128 effect="slow fade"
//! relay_1 ON
//! ```
//!
//! Values are integers (a run of ASCII digits), double-quoted strings (no
//! escapes) or bare identifiers. Whitespace between tokens is optional.

use std::fmt;

use thiserror::Error;

/// Errors raised while tokenizing a line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenizeError {
    #[error("expected an identifier at {pos}, found {}", describe(*found))]
    ExpectedIdentifier { pos: usize, found: Option<char> },

    #[error("unterminated string starting at {pos}")]
    UnterminatedString { pos: usize },

    #[error("expected '{expected}' at {pos}, found {}", describe(*found))]
    Expected {
        expected: char,
        pos: usize,
        found: Option<char>,
    },

    #[error("integer '{digits}' at {pos} is out of range")]
    IntegerOutOfRange { pos: usize, digits: String },
}

fn describe(found: Option<char>) -> String {
    match found {
        Some(c) => format!("'{}'", c),
        None => "end of line".to_string(),
    }
}

/// A single value token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(i64),
    String(String),
    Identifier(String),
}

impl Value {
    /// JSON form of the value: integers stay numbers, everything else is a string.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::String(s) | Value::Identifier(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::String(s) | Value::Identifier(s) => f.write_str(s),
        }
    }
}

/// Everything after the leading identifiers of a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineValues {
    /// Nothing but whitespace remained.
    Empty,
    /// The trimmed remainder, which contained no `=`.
    Scalar(String),
    /// `key=value` pairs.
    Fields(Fields),
}

/// `key=value` pairs in the order the device sent them.
///
/// A repeated key keeps the position of its first occurrence and the value
/// of its last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(Vec<(String, Value)>);

impl Fields {
    pub fn insert(&mut self, key: String, value: Value) {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|(k, _)| k)
    }

    /// JSON object keeping the device order.
    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        self.iter().map(|(k, v)| (k.to_string(), v.to_json())).collect()
    }
}

impl FromIterator<(String, Value)> for Fields {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut fields = Fields::default();
        for (key, value) in iter {
            fields.insert(key, value);
        }
        fields
    }
}

/// Cursor over one protocol line.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self, c: char) {
        self.pos += c.len_utf8();
    }

    pub fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.bump(c);
        }
    }

    /// Consume the longest identifier at the cursor.
    ///
    /// Identifiers start with a letter or `_` and continue with letters,
    /// digits, `_` or `.`.
    pub fn read_identifier(&mut self) -> Result<&'a str, TokenizeError> {
        self.skip_whitespace();
        let start = self.pos;

        while let Some(c) = self.peek() {
            let legal = if self.pos == start {
                is_identifier_start(c)
            } else {
                is_identifier_continue(c)
            };
            if !legal {
                break;
            }
            self.bump(c);
        }

        if self.pos == start {
            return Err(TokenizeError::ExpectedIdentifier {
                pos: start,
                found: self.peek(),
            });
        }

        Ok(&self.input[start..self.pos])
    }

    /// Consume a quoted string, an integer, or an identifier.
    pub fn read_value(&mut self) -> Result<Value, TokenizeError> {
        self.skip_whitespace();

        match self.peek() {
            Some('"') => {
                let open = self.pos;
                self.bump('"');
                let start = self.pos;
                let len = self
                    .rest()
                    .find('"')
                    .ok_or(TokenizeError::UnterminatedString { pos: open })?;
                self.pos = start + len + 1;
                Ok(Value::String(self.input[start..start + len].to_string()))
            }
            Some(c) if c.is_ascii_digit() => {
                let start = self.pos;
                let rest = self.rest();
                let len = rest
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(rest.len());
                let digits = &rest[..len];
                self.pos += len;
                digits
                    .parse()
                    .map(Value::Integer)
                    .map_err(|_| TokenizeError::IntegerOutOfRange {
                        pos: start,
                        digits: digits.to_string(),
                    })
            }
            _ => self
                .read_identifier()
                .map(|ident| Value::Identifier(ident.to_string())),
        }
    }

    /// Consume `expected` at the cursor.
    pub fn expect(&mut self, expected: char) -> Result<(), TokenizeError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.bump(c);
                Ok(())
            }
            found => Err(TokenizeError::Expected {
                expected,
                pos: self.pos,
                found,
            }),
        }
    }

    /// Consume the rest of the line as a scalar, a mapping, or nothing.
    pub fn read_values(&mut self) -> Result<LineValues, TokenizeError> {
        self.skip_whitespace();
        if self.at_end() {
            return Ok(LineValues::Empty);
        }

        let rest = self.rest();
        if !rest.contains('=') {
            self.pos = self.input.len();
            return Ok(LineValues::Scalar(rest.trim().to_string()));
        }

        let mut fields = Fields::default();
        while !self.at_end() {
            let key = self.read_identifier()?;
            self.skip_whitespace();
            self.expect('=')?;
            let value = self.read_value()?;
            self.skip_whitespace();
            fields.insert(key.to_string(), value);
        }

        Ok(LineValues::Fields(fields))
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_identifier_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(line: &str) -> Result<LineValues, TokenizeError> {
        Lexer::new(line).read_values()
    }

    fn fields(pairs: &[(&str, Value)]) -> LineValues {
        LineValues::Fields(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_read_identifier() {
        let mut lexer = Lexer::new("  relay_1 state");
        assert_eq!(lexer.read_identifier(), Ok("relay_1"));
        assert_eq!(lexer.read_identifier(), Ok("state"));
        assert!(lexer.at_end());
    }

    #[test]
    fn test_identifier_keeps_dots() {
        let mut lexer = Lexer::new("zone.2 ON");
        assert_eq!(lexer.read_identifier(), Ok("zone.2"));
    }

    #[test]
    fn test_identifier_cannot_start_with_digit() {
        let mut lexer = Lexer::new("1relay");
        assert_eq!(
            lexer.read_identifier(),
            Err(TokenizeError::ExpectedIdentifier {
                pos: 0,
                found: Some('1')
            })
        );
    }

    #[test]
    fn test_identifier_at_end() {
        let mut lexer = Lexer::new("   ");
        assert_eq!(
            lexer.read_identifier(),
            Err(TokenizeError::ExpectedIdentifier { pos: 3, found: None })
        );
    }

    #[test]
    fn test_read_value_kinds() {
        let mut lexer = Lexer::new(r#"128 "slow fade" ON"#);
        assert_eq!(lexer.read_value(), Ok(Value::Integer(128)));
        assert_eq!(lexer.read_value(), Ok(Value::String("slow fade".to_string())));
        assert_eq!(lexer.read_value(), Ok(Value::Identifier("ON".to_string())));
    }

    #[test]
    fn test_quoted_string_has_no_escapes() {
        let mut lexer = Lexer::new(r#""a\"b""#);
        assert_eq!(lexer.read_value(), Ok(Value::String("a\\".to_string())));
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(
            values(r#"name="kitchen"#),
            Err(TokenizeError::UnterminatedString { pos: 5 })
        );
    }

    #[test]
    fn test_integer_out_of_range() {
        assert!(matches!(
            values("level=99999999999999999999"),
            Err(TokenizeError::IntegerOutOfRange { pos: 6, .. })
        ));
    }

    #[test]
    fn test_empty_remainder_is_sentinel() {
        assert_eq!(values(""), Ok(LineValues::Empty));
        assert_eq!(values("   \t "), Ok(LineValues::Empty));
    }

    #[test]
    fn test_lines_without_equals_are_scalars() {
        for line in ["ON", "  off  ", "42", "hello world", "\"quoted\"", "a.b c-d !"] {
            match values(line) {
                Ok(LineValues::Scalar(s)) => assert_eq!(s, line.trim()),
                other => panic!("{:?} parsed as {:?}", line, other),
            }
        }
    }

    #[test]
    fn test_keys_are_identifiers_before_equals() {
        let cases: [(&str, &[&str]); 4] = [
            ("state=ON", &["state"]),
            ("state=ON brightness=128", &["state", "brightness"]),
            ("a = 1 b= \"x y\" c =z", &["a", "b", "c"]),
            ("state=ON state=OFF", &["state"]),
        ];

        for (line, expected) in cases {
            match values(line) {
                Ok(LineValues::Fields(map)) => {
                    let keys: Vec<&str> = map.keys().collect();
                    assert_eq!(keys, expected, "keys of {:?}", line);
                }
                other => panic!("{:?} parsed as {:?}", line, other),
            }
        }
    }

    #[test]
    fn test_repeated_key_keeps_last_value() {
        assert_eq!(
            values("state=ON state=OFF"),
            Ok(fields(&[("state", Value::Identifier("OFF".to_string()))]))
        );
    }

    #[test]
    fn test_mixed_values() {
        assert_eq!(
            values(r#"state=ON brightness=128 effect="slow fade""#),
            Ok(fields(&[
                ("state", Value::Identifier("ON".to_string())),
                ("brightness", Value::Integer(128)),
                ("effect", Value::String("slow fade".to_string())),
            ]))
        );
    }

    #[test]
    fn test_repeated_key_keeps_first_position() {
        assert_eq!(
            values("state=ON level=3 state=OFF"),
            Ok(fields(&[
                ("state", Value::Identifier("OFF".to_string())),
                ("level", Value::Integer(3)),
            ]))
        );
    }

    #[test]
    fn test_missing_equals_after_key() {
        assert_eq!(
            values("state=ON brightness"),
            Err(TokenizeError::Expected {
                expected: '=',
                pos: 19,
                found: None
            })
        );
        assert!(matches!(
            values("state ON=1"),
            Err(TokenizeError::Expected { expected: '=', .. })
        ));
    }

    #[test]
    fn test_fields_json_keeps_device_order() {
        let fields = match values("state=ON brightness=128 color=warm") {
            Ok(LineValues::Fields(fields)) => fields,
            other => panic!("expected fields, got {:?}", other),
        };
        let json = fields.to_json();
        assert_eq!(json["state"], "ON");
        assert_eq!(json["brightness"], 128);
        assert_eq!(
            serde_json::Value::Object(json).to_string(),
            r#"{"state":"ON","brightness":128,"color":"warm"}"#
        );
    }

    #[test]
    fn test_error_messages() {
        let err = values("state=ON brightness").unwrap_err();
        assert_eq!(err.to_string(), "expected '=' at 19, found end of line");

        let err = values("state=\"ON").unwrap_err();
        assert_eq!(err.to_string(), "unterminated string starting at 6");
    }
}
