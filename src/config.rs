use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, anyhow};
use tracing::info;

use crate::core::notify::DEFAULT_TOAST_DURATION;

pub const DEFAULT_DATABASE_PATH: &str = "folio.db";
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@folio.local";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_path: PathBuf,
    /// Upper bound for a single remote call. `None` waits forever.
    pub call_timeout: Option<Duration>,
    pub toast_duration: Duration,
    pub admin_email: String,
    pub admin_password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            call_timeout: None,
            toast_duration: DEFAULT_TOAST_DURATION,
            admin_email: DEFAULT_ADMIN_EMAIL.to_string(),
            admin_password: None,
        }
    }
}

impl Config {
    /// Read the configuration from the environment, falling back to defaults.
    ///
    /// `FOLIO_CALL_TIMEOUT_MS=0` disables the call timeout.
    pub fn load() -> anyhow::Result<Self> {
        let timeout_ms: u64 = try_load("FOLIO_CALL_TIMEOUT_MS", "0")?;
        let toast_ms: u64 = try_load(
            "FOLIO_TOAST_MS",
            &DEFAULT_TOAST_DURATION.as_millis().to_string(),
        )?;
        Ok(Self {
            database_path: try_load("FOLIO_DB", DEFAULT_DATABASE_PATH)?,
            call_timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
            toast_duration: Duration::from_millis(toast_ms),
            admin_email: try_load("FOLIO_ADMIN_EMAIL", DEFAULT_ADMIN_EMAIL)?,
            admin_password: optional("FOLIO_ADMIN_PASSWORD"),
        })
    }
}

/// A variable without a default. Absence is not logged.
fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    env::var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| anyhow!("{e}"))
        .with_context(|| format!("Invalid {key} value"))
}

#[cfg(test)]
mod tests {
    use std::{
        io::Write,
        sync::{Arc, Mutex},
    };

    use super::*;

    #[test]
    fn parses_values_and_reports_bad_ones() {
        // SAFETY: the variables are unique to this test.
        unsafe {
            env::set_var("FOLIO_TEST_NUMBER", "250");
            env::set_var("FOLIO_TEST_BROKEN", "soon");
        }
        assert_eq!(try_load::<u64>("FOLIO_TEST_NUMBER", "1").ok(), Some(250));
        assert_eq!(try_load::<u64>("FOLIO_TEST_MISSING", "7").ok(), Some(7));

        let err = try_load::<u64>("FOLIO_TEST_BROKEN", "1").unwrap_err();
        assert!(err.to_string().contains("FOLIO_TEST_BROKEN"));
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn missing_variables_log_once() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            assert_eq!(try_load::<u64>("FOLIO_TEST_UNSET_NUMBER", "9").ok(), Some(9));
            assert_eq!(optional("FOLIO_TEST_UNSET_SECRET"), None);
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert_eq!(output.matches("FOLIO_TEST_UNSET_NUMBER").count(), 1);
        assert!(!output.contains("FOLIO_TEST_UNSET_SECRET"));
    }
}
