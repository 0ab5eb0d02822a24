//! Tracing subscriber installation shared by the learnledger binaries.
//!
//! Console output goes to stderr so commands can keep stdout for JSON. With
//! `LEARNLEDGER_LOG_ROLL=1` lifecycle audit events (target
//! `learnledger.audit`) are also appended to a rolling file.

use std::path::PathBuf;

use once_cell::sync::OnceCell;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{
    fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

/// Target of the task lifecycle audit events, routed to the rolling audit file.
pub const AUDIT_TARGET: &str = "learnledger.audit";

static AUDIT_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

pub fn init() {
    init_with_filter("info");
}

/// Installs the global subscriber. `RUST_LOG` wins over `default_filter`.
/// Later calls are no-ops.
pub fn init_with_filter(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter);
    let registry = tracing_subscriber::registry().with(console);

    match audit_settings() {
        Some(settings) => {
            if std::fs::create_dir_all(&settings.dir).is_err() {
                tracing::warn!(directory = %settings.dir.display(), "failed to create audit log directory");
            }
            let writer = match settings.rotation {
                Rotation::Hourly => tracing_appender::rolling::hourly(&settings.dir, &settings.prefix),
                Rotation::Minutely => {
                    tracing_appender::rolling::minutely(&settings.dir, &settings.prefix)
                }
                Rotation::Daily => tracing_appender::rolling::daily(&settings.dir, &settings.prefix),
            };
            let (nb, guard) = tracing_appender::non_blocking(writer);
            let _ = AUDIT_GUARD.set(guard);
            let targets = Targets::new().with_target(AUDIT_TARGET, tracing::Level::INFO);
            let audit_layer = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(nb)
                .with_filter(targets);
            let _ = registry.with(audit_layer).try_init();
        }
        None => {
            let _ = registry.try_init();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rotation {
    Minutely,
    Hourly,
    Daily,
}

impl Rotation {
    fn from_env_value(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hourly" => Rotation::Hourly,
            "minutely" => Rotation::Minutely,
            _ => Rotation::Daily,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct AuditSettings {
    dir: PathBuf,
    prefix: String,
    rotation: Rotation,
}

fn audit_settings() -> Option<AuditSettings> {
    audit_settings_from(|name| std::env::var(name).ok())
}

fn audit_settings_from(var: impl Fn(&str) -> Option<String>) -> Option<AuditSettings> {
    if var("LEARNLEDGER_LOG_ROLL").as_deref() != Some("1") {
        return None;
    }
    Some(AuditSettings {
        dir: var("LEARNLEDGER_LOG_DIR")
            .unwrap_or_else(|| "logs".to_string())
            .into(),
        prefix: var("LEARNLEDGER_LOG_PREFIX").unwrap_or_else(|| "audit".to_string()),
        rotation: Rotation::from_env_value(&var("LEARNLEDGER_LOG_ROTATION").unwrap_or_default()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn audit_log_is_opt_in() {
        assert_eq!(audit_settings_from(env(&[])), None);
        assert_eq!(audit_settings_from(env(&[("LEARNLEDGER_LOG_ROLL", "0")])), None);
    }

    #[test]
    fn audit_settings_read_dir_and_rotation() {
        let settings = audit_settings_from(env(&[
            ("LEARNLEDGER_LOG_ROLL", "1"),
            ("LEARNLEDGER_LOG_DIR", "/tmp/ll"),
            ("LEARNLEDGER_LOG_ROTATION", "Hourly"),
        ]))
        .unwrap();
        assert_eq!(settings.dir, PathBuf::from("/tmp/ll"));
        assert_eq!(settings.prefix, "audit");
        assert_eq!(settings.rotation, Rotation::Hourly);
    }

    #[test]
    fn unknown_rotation_falls_back_to_daily() {
        assert_eq!(Rotation::from_env_value("weekly"), Rotation::Daily);
        assert_eq!(Rotation::from_env_value(" minutely "), Rotation::Minutely);
    }

    #[test]
    fn init_twice_is_harmless() {
        init_with_filter("not a [valid filter");
        init();
        tracing::info!(target: AUDIT_TARGET, "after init");
    }
}
