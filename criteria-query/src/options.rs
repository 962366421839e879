use clap::{ArgAction, Args};
use criteria_errors::{invalid_argument, CriteriaResult};
use serde::{Deserialize, Serialize};

use crate::alias::validate_alias;

pub const DEFAULT_ALIAS_PREFIX: &str = "autoAlias";

/// Settings of the criteria query compiler.
///
/// Can be flattened into the command line options of a binary embedding the compiler, or
/// deserialized from a configuration document where missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Args)]
#[serde(default)]
pub struct CompilerOptions {
    /// Prefix of the aliases generated for selections the caller left unaliased
    #[arg(long, env = "CRITERIA_ALIAS_PREFIX", default_value = DEFAULT_ALIAS_PREFIX)]
    pub alias_prefix: String,

    /// Expand `x IN :param` into equality tests when the parameter carries a bound collection or
    /// array value
    #[arg(
        long,
        env = "CRITERIA_EXPAND_IN_PARAMETERS",
        default_value = "true",
        action = ArgAction::Set
    )]
    pub expand_bound_in_parameters: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            alias_prefix: DEFAULT_ALIAS_PREFIX.to_owned(),
            expand_bound_in_parameters: true,
        }
    }
}

impl CompilerOptions {
    pub fn validate(&self) -> CriteriaResult<()> {
        if validate_alias(&self.alias_prefix).is_err() {
            invalid_argument!(
                "alias prefix '{}' does not start a valid identifier",
                self.alias_prefix
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Opts {
        #[command(flatten)]
        compiler: CompilerOptions,
    }

    #[test]
    fn defaults_from_empty_args() {
        let opts = Opts::parse_from(["criteria"]);
        assert_eq!(opts.compiler, CompilerOptions::default());
    }

    #[test]
    fn parses_args() {
        let opts = Opts::parse_from([
            "criteria",
            "--alias-prefix",
            "gen",
            "--expand-bound-in-parameters",
            "false",
        ]);
        assert_eq!(opts.compiler.alias_prefix, "gen");
        assert!(!opts.compiler.expand_bound_in_parameters);
    }

    #[test]
    fn deserializes_with_defaults() {
        let opts: CompilerOptions =
            serde_json::from_str(r#"{"expand_bound_in_parameters": false}"#).unwrap();
        assert_eq!(opts.alias_prefix, DEFAULT_ALIAS_PREFIX);
        assert!(!opts.expand_bound_in_parameters);
    }

    #[test]
    fn rejects_bad_prefixes() {
        let opts = CompilerOptions {
            alias_prefix: "1x".into(),
            ..Default::default()
        };
        assert!(opts.validate().is_err());
        CompilerOptions::default().validate().unwrap();
    }
}
