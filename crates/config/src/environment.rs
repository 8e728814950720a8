use crate::error::ErrorKind;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Deployment environment a file copy belongs to.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[display("staging")]
    Staging,
    #[display("production")]
    Production,
}

impl Environment {
    pub const ALL: [Environment; 2] = [Environment::Staging, Environment::Production];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl FromStr for Environment {
    type Err = ErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "staging" => Ok(Self::Staging),
            "production" => Ok(Self::Production),
            other => Err(ErrorKind::UnknownEnvironment(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("staging", Environment::Staging)]
    #[case("production", Environment::Production)]
    fn test_round_trips_literal(#[case] literal: &str, #[case] expected: Environment) {
        let parsed: Environment = literal.parse().unwrap();
        assert_eq!(parsed, expected);
        assert_eq!(parsed.to_string(), literal);
        assert_eq!(parsed.as_str(), literal);
    }

    #[rstest]
    #[case("Staging")]
    #[case("prod")]
    #[case("")]
    fn test_rejects_unknown(#[case] literal: &str) {
        assert!(matches!(literal.parse::<Environment>(), Err(ErrorKind::UnknownEnvironment(_))));
    }
}
