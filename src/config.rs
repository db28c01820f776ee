use std::env;
use std::str::FromStr;

use dotenvy::dotenv;

/// Non-secret configuration. Every field has a default; a malformed value
/// falls back to the default rather than aborting startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub region: String,
    pub db_host: String,
    pub db_port: u16,
    pub db_database: String,
    pub aws_region: String,
    pub aws_endpoint: String,
    pub s3_bucket: String,
    pub sqs_queue: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Config {
            port: env_parse_or("APP_PORT", 8080),
            region: env_or("REGION", "us-east-1"),
            db_host: env_or("DB_HOST", "cockroachdb-public"),
            db_port: env_parse_or("DB_PORT", 26257),
            db_database: env_or("DB_DATABASE", "ledger"),
            aws_region: env_or("AWS_REGION", "us-east-1"),
            aws_endpoint: env_or("AWS_ENDPOINT", "http://localhost:4566"),
            s3_bucket: env_or("S3_BUCKET", "us-east-1-audit-logs"),
            sqs_queue: env_or("SQS_QUEUE", "us-east-1-transaction-queue"),
        }
    }
}

/// Secrets have no defaults. A missing required secret is a fatal startup
/// error; it never degrades into a default.
#[derive(Debug, Clone)]
pub struct Secrets {
    pub db_user: String,
    pub db_password: String,
}

impl Secrets {
    pub fn from_env() -> anyhow::Result<Self> {
        let db_password = env::var("DB_PASSWORD").unwrap_or_default();
        if db_password.is_empty() {
            anyhow::bail!("DB_PASSWORD is required");
        }

        Ok(Secrets {
            db_user: env_or("DB_USER", "root"),
            db_password,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

fn env_parse_or<T: FromStr + Copy>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests use keys unique to each test; cargo runs tests in one
    // process, so shared keys would race.

    #[test]
    fn env_or_falls_back_to_default() {
        assert_eq!(env_or("LEDGERD_TEST_UNSET_STR", "fallback"), "fallback");

        env::set_var("LEDGERD_TEST_SET_STR", "eu-central-1");
        assert_eq!(env_or("LEDGERD_TEST_SET_STR", "us-east-1"), "eu-central-1");
    }

    #[test]
    fn env_parse_or_ignores_malformed_values() {
        assert_eq!(env_parse_or("LEDGERD_TEST_UNSET_INT", 8080u16), 8080);

        env::set_var("LEDGERD_TEST_BAD_INT", "not-a-port");
        assert_eq!(env_parse_or("LEDGERD_TEST_BAD_INT", 8080u16), 8080);

        env::set_var("LEDGERD_TEST_GOOD_INT", "9090");
        assert_eq!(env_parse_or("LEDGERD_TEST_GOOD_INT", 8080u16), 9090);
    }

    #[test]
    fn missing_password_error_names_the_variable() {
        // DB_PASSWORD is deliberately not set in the unit-test environment.
        if env::var("DB_PASSWORD").is_ok() {
            return;
        }

        let err = Secrets::from_env().unwrap_err();
        assert!(err.to_string().contains("DB_PASSWORD"));
    }
}
