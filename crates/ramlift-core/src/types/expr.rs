//! Type expressions.
//!
//! Grammar:
//!
//! ```text
//! union   := postfix ('|' postfix)*
//! postfix := primary ('[]' | '?')*
//! primary := NAME | '(' union ')'
//! ```
//!
//! `NAME` may be qualified (`lib.Type`) and may contain `-` (`date-only`).
//! `T?` is shorthand for `T | nil`.

use std::fmt;

use crate::model::ScalarKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    Name(String),
    Array(Box<TypeExpr>),
    Union(Vec<TypeExpr>),
    Nullable(Box<TypeExpr>),
}

/// Built-in type names that are not user declarations.
pub fn is_builtin(name: &str) -> bool {
    ScalarKind::parse(name).is_some() || matches!(name, "any" | "nil" | "object" | "array")
}

/// True if the string is inline JSON/XML schema text rather than a type expression.
pub fn is_schema_text(s: &str) -> bool {
    let t = s.trim_start();
    t.starts_with('{') || t.starts_with('<')
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Name(String),
    Brackets,
    Question,
    Pipe,
    Open,
    Close,
}

fn tokenize(s: &str) -> Result<Vec<Token>, String> {
    let mut out = Vec::new();
    let mut chars = s.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '|' => {
                chars.next();
                out.push(Token::Pipe);
            }
            '(' => {
                chars.next();
                out.push(Token::Open);
            }
            ')' => {
                chars.next();
                out.push(Token::Close);
            }
            '?' => {
                chars.next();
                out.push(Token::Question);
            }
            '[' => {
                chars.next();
                if chars.next() != Some(']') {
                    return Err("expected `]` after `[`".to_string());
                }
                out.push(Token::Brackets);
            }
            c if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push(Token::Name(name));
            }
            other => return Err(format!("unexpected character `{other}`")),
        }
    }
    Ok(out)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn union(&mut self) -> Result<TypeExpr, String> {
        let mut members = vec![self.postfix()?];
        while self.peek() == Some(&Token::Pipe) {
            self.next();
            members.push(self.postfix()?);
        }
        Ok(if members.len() == 1 {
            members.remove(0)
        } else {
            TypeExpr::Union(members)
        })
    }

    fn postfix(&mut self) -> Result<TypeExpr, String> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Some(Token::Brackets) => {
                    self.next();
                    expr = TypeExpr::Array(Box::new(expr));
                }
                Some(Token::Question) => {
                    self.next();
                    expr = TypeExpr::Nullable(Box::new(expr));
                }
                _ => return Ok(expr),
            }
        }
    }

    fn primary(&mut self) -> Result<TypeExpr, String> {
        match self.next() {
            Some(Token::Name(n)) => Ok(TypeExpr::Name(n)),
            Some(Token::Open) => {
                let inner = self.union()?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err("expected `)`".to_string()),
                }
            }
            Some(other) => Err(format!("unexpected token {other:?}")),
            None => Err("unexpected end of type expression".to_string()),
        }
    }
}

impl TypeExpr {
    pub fn parse(s: &str) -> Result<Self, String> {
        let tokens = tokenize(s)?;
        if tokens.is_empty() {
            return Err("empty type expression".to_string());
        }
        let mut p = Parser { tokens, pos: 0 };
        let expr = p.union()?;
        if p.pos != p.tokens.len() {
            return Err(format!("trailing input in type expression `{s}`"));
        }
        Ok(expr)
    }

    /// Names this expression inherits from directly: the name itself, union
    /// members, nullable targets. Array item types are not inheritance.
    pub fn base_names(&self) -> Vec<&str> {
        match self {
            Self::Name(n) => vec![n.as_str()],
            Self::Nullable(inner) => inner.base_names(),
            Self::Union(members) => members.iter().flat_map(|m| m.base_names()).collect(),
            Self::Array(_) => Vec::new(),
        }
    }

    /// Same expression with every user-type name passed through `f`.
    pub fn map_names(&self, f: &mut impl FnMut(&str) -> String) -> TypeExpr {
        match self {
            Self::Name(n) if is_builtin(n) => Self::Name(n.clone()),
            Self::Name(n) => Self::Name(f(n)),
            Self::Array(inner) => Self::Array(Box::new(inner.map_names(f))),
            Self::Nullable(inner) => Self::Nullable(Box::new(inner.map_names(f))),
            Self::Union(members) => Self::Union(members.iter().map(|m| m.map_names(f)).collect()),
        }
    }

    /// Plain user-type reference (not a built-in, no operators).
    pub fn as_user_name(&self) -> Option<&str> {
        match self {
            Self::Name(n) if !is_builtin(n) => Some(n),
            _ => None,
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(n) => f.write_str(n),
            Self::Array(inner) => match **inner {
                Self::Union(_) => write!(f, "({inner})[]"),
                _ => write!(f, "{inner}[]"),
            },
            Self::Nullable(inner) => match **inner {
                Self::Union(_) => write!(f, "({inner})?"),
                _ => write!(f, "{inner}?"),
            },
            Self::Union(members) => {
                let parts: Vec<String> = members.iter().map(|m| m.to_string()).collect();
                f.write_str(&parts.join(" | "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(n: &str) -> TypeExpr {
        TypeExpr::Name(n.to_string())
    }

    #[test]
    fn parses_arrays_unions_and_groups() {
        assert_eq!(TypeExpr::parse("User[]").unwrap(), TypeExpr::Array(Box::new(name("User"))));
        assert_eq!(
            TypeExpr::parse("(lib.A | B)[]").unwrap(),
            TypeExpr::Array(Box::new(TypeExpr::Union(vec![name("lib.A"), name("B")])))
        );
        assert_eq!(
            TypeExpr::parse("date-only?").unwrap(),
            TypeExpr::Nullable(Box::new(name("date-only")))
        );
    }

    #[test]
    fn rejects_malformed() {
        assert!(TypeExpr::parse("A |").is_err());
        assert!(TypeExpr::parse("(A").is_err());
        assert!(TypeExpr::parse("A[").is_err());
        assert!(TypeExpr::parse("").is_err());
    }

    #[test]
    fn base_names_skip_array_items() {
        let e = TypeExpr::parse("A | B[] | C?").unwrap();
        assert_eq!(e.base_names(), vec!["A", "C"]);
        assert_eq!(e.to_string(), "A | B[] | C?");
    }

    #[test]
    fn map_names_skips_builtins_and_keeps_grouping() {
        let e = TypeExpr::parse("(A | string)?").unwrap();
        let mapped = e.map_names(&mut |n| format!("lib.{n}"));
        assert_eq!(mapped.to_string(), "(lib.A | string)?");
        assert_eq!(TypeExpr::parse(&mapped.to_string()).unwrap(), mapped);
    }

    #[test]
    fn builtins_and_schema_text() {
        assert!(is_builtin("datetime-only"));
        assert!(!is_builtin("User"));
        assert!(is_schema_text("  {\"type\": \"object\"}"));
        assert!(!is_schema_text("User"));
    }
}
