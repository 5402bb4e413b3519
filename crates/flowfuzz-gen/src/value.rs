use serde::{Deserialize, Serialize};

/// A concrete generated argument value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgValue {
    Int(i128),
    Float(f64),
    Bool(bool),
    Choice(String),
}

impl ArgValue {
    pub fn kind(&self) -> &'static str {
        match self {
            ArgValue::Int(_) => "int",
            ArgValue::Float(_) => "float",
            ArgValue::Bool(_) => "bool",
            ArgValue::Choice(_) => "choice",
        }
    }
}

impl std::fmt::Display for ArgValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgValue::Int(i) => write!(f, "{i}"),
            ArgValue::Float(x) => write!(f, "{x}"),
            ArgValue::Bool(b) => write!(f, "{b}"),
            ArgValue::Choice(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArgError {
    #[error("missing argument '{name}'")]
    Missing { name: String },

    #[error("argument '{name}' is {found}, expected {expected}")]
    WrongKind {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Named arguments for one flow call, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Args {
    pub entries: Vec<(String, ArgValue)>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: ArgValue) {
        self.entries.push((name.into(), value));
    }

    /// Builder-style push, handy for hand-written traces.
    pub fn with(mut self, name: impl Into<String>, value: ArgValue) -> Self {
        self.push(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn int(&self, name: &str) -> Result<i128, ArgError> {
        match self.lookup(name)? {
            ArgValue::Int(i) => Ok(*i),
            other => Err(wrong_kind(name, "int", other)),
        }
    }

    pub fn float(&self, name: &str) -> Result<f64, ArgError> {
        match self.lookup(name)? {
            ArgValue::Float(x) => Ok(*x),
            other => Err(wrong_kind(name, "float", other)),
        }
    }

    pub fn bool(&self, name: &str) -> Result<bool, ArgError> {
        match self.lookup(name)? {
            ArgValue::Bool(b) => Ok(*b),
            other => Err(wrong_kind(name, "bool", other)),
        }
    }

    pub fn choice(&self, name: &str) -> Result<&str, ArgError> {
        match self.lookup(name)? {
            ArgValue::Choice(s) => Ok(s.as_str()),
            other => Err(wrong_kind(name, "choice", other)),
        }
    }

    fn lookup(&self, name: &str) -> Result<&ArgValue, ArgError> {
        self.get(name).ok_or_else(|| ArgError::Missing {
            name: name.to_string(),
        })
    }
}

fn wrong_kind(name: &str, expected: &'static str, found: &ArgValue) -> ArgError {
    ArgError::WrongKind {
        name: name.to_string(),
        expected,
        found: found.kind(),
    }
}

impl std::fmt::Display for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_accessors() {
        let args = Args::new()
            .with("amount", ArgValue::Int(20))
            .with("percent", ArgValue::Float(0.5));

        assert_eq!(args.int("amount"), Ok(20));
        assert_eq!(args.float("percent"), Ok(0.5));
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_missing_and_wrong_kind() {
        let args = Args::new().with("amount", ArgValue::Int(20));

        assert!(matches!(args.float("percent"), Err(ArgError::Missing { .. })));
        assert_eq!(
            args.float("amount"),
            Err(ArgError::WrongKind {
                name: "amount".to_string(),
                expected: "float",
                found: "int",
            })
        );
    }

    #[test]
    fn test_display_keeps_declaration_order() {
        let args = Args::new()
            .with("b", ArgValue::Bool(true))
            .with("a", ArgValue::Choice("usdc".to_string()));
        assert_eq!(args.to_string(), "(b=true, a=usdc)");
    }
}
