use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use hrflow_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let webhook_token = config
        .notifier
        .webhook_token
        .as_ref()
        .map(|token| redact_token(token.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    vec![
        Field {
            key: "database.url",
            value: config.database.url.clone(),
            env_keys: &["HRFLOW_DATABASE_URL"],
        },
        Field {
            key: "database.max_connections",
            value: config.database.max_connections.to_string(),
            env_keys: &["HRFLOW_DATABASE_MAX_CONNECTIONS"],
        },
        Field {
            key: "database.timeout_secs",
            value: config.database.timeout_secs.to_string(),
            env_keys: &["HRFLOW_DATABASE_TIMEOUT_SECS"],
        },
        Field {
            key: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["HRFLOW_SERVER_BIND_ADDRESS"],
        },
        Field {
            key: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["HRFLOW_SERVER_PORT"],
        },
        Field {
            key: "server.graceful_shutdown_secs",
            value: config.server.graceful_shutdown_secs.to_string(),
            env_keys: &["HRFLOW_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        },
        Field {
            key: "notifier.kind",
            value: format!("{:?}", config.notifier.kind),
            env_keys: &["HRFLOW_NOTIFIER_KIND"],
        },
        Field {
            key: "notifier.webhook_url",
            value: config.notifier.webhook_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            env_keys: &["HRFLOW_NOTIFIER_WEBHOOK_URL"],
        },
        Field {
            key: "notifier.webhook_token",
            value: webhook_token,
            env_keys: &["HRFLOW_NOTIFIER_WEBHOOK_TOKEN"],
        },
        Field {
            key: "notifier.timeout_secs",
            value: config.notifier.timeout_secs.to_string(),
            env_keys: &["HRFLOW_NOTIFIER_TIMEOUT_SECS"],
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["HRFLOW_LOGGING_LEVEL", "HRFLOW_LOG_LEVEL"],
        },
        Field {
            key: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["HRFLOW_LOGGING_FORMAT", "HRFLOW_LOG_FORMAT"],
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    ["hrflow.toml", "config/hrflow.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the last four characters of long tokens so operators can tell them apart.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let chars = trimmed.chars().collect::<Vec<_>>();
    if chars.len() >= 12 {
        let tail = chars[chars.len() - 4..].iter().collect::<String>();
        return format!("***{tail}");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_token};

    #[test]
    fn redaction_never_reveals_short_tokens() {
        assert_eq!(redact_token(""), "<empty>");
        assert_eq!(redact_token("abc123"), "<redacted>");
        assert_eq!(redact_token("hook-secret-0042"), "***0042");
    }

    #[test]
    fn dotted_paths_resolve_nested_tables() {
        let doc = "[notifier]\nkind = \"webhook\"\n".parse::<Value>().expect("toml");

        assert!(contains_path(&doc, "notifier.kind"));
        assert!(!contains_path(&doc, "notifier.webhook_url"));
        assert!(!contains_path(&doc, "server.port"));
    }
}
