use std::env;

const DEFAULT_INVITATIONS_TABLE: &str = "nestegg-invitations";
const DEFAULT_SAVINGS_GOALS_TABLE: &str = "nestegg-savings-goals";
const DEFAULT_LOANS_TABLE: &str = "nestegg-loans";
const DEFAULT_PUSH_TOKENS_TABLE: &str = "nestegg-push-tokens";

/// DynamoDB table names, read from the Lambda environment.
#[derive(Debug, Clone, PartialEq)]
pub struct TableConfig {
    pub invitations: String,
    pub savings_goals: String,
    pub loans: String,
    pub push_tokens: String,
}

impl TableConfig {
    pub fn from_env() -> Self {
        Self {
            invitations: env_or("INVITATIONS_TABLE", DEFAULT_INVITATIONS_TABLE),
            savings_goals: env_or("SAVINGS_GOALS_TABLE", DEFAULT_SAVINGS_GOALS_TABLE),
            loans: env_or("LOANS_TABLE", DEFAULT_LOANS_TABLE),
            push_tokens: env_or("PUSH_TOKENS_TABLE", DEFAULT_PUSH_TOKENS_TABLE),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Whether a boolean flag such as `TEST_SNS` or `REMOVE_BASE_PATH` is switched on.
pub fn flag_enabled(key: &str) -> bool {
    env::var(key)
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_falls_back_on_blank_values() {
        env::set_var("NESTEGG_CONFIG_TEST_BLANK", "  ");
        assert_eq!(env_or("NESTEGG_CONFIG_TEST_BLANK", "fallback"), "fallback");

        env::set_var("NESTEGG_CONFIG_TEST_SET", "custom-table");
        assert_eq!(env_or("NESTEGG_CONFIG_TEST_SET", "fallback"), "custom-table");

        assert_eq!(env_or("NESTEGG_CONFIG_TEST_MISSING", "fallback"), "fallback");
    }

    #[test]
    fn test_flag_enabled_is_case_insensitive() {
        env::set_var("NESTEGG_FLAG_TEST", "TRUE");
        assert!(flag_enabled("NESTEGG_FLAG_TEST"));
        env::set_var("NESTEGG_FLAG_TEST", "no");
        assert!(!flag_enabled("NESTEGG_FLAG_TEST"));
    }
}
