use std::fs;

use anyhow::Context;
use serde::Deserialize;
use shared::protocol::RawTabRecord;

const SETTINGS_FILE: &str = "tab_host.toml";

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub restart_delay_ms: u64,
    /// Tab indices whose restart command is answered with a failure.
    pub failing_restarts: Vec<usize>,
    pub tabs: Vec<RawTabRecord>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8090".into(),
            restart_delay_ms: 1500,
            failing_restarts: Vec::new(),
            tabs: vec![
                RawTabRecord {
                    label: "Grafana".into(),
                    icon_url: "/icons/grafana.svg".into(),
                    iframe_url: "http://127.0.0.1:3000".into(),
                    restartable: Some(true),
                    accent_color: Some("#f46800".into()),
                },
                RawTabRecord {
                    label: "Logs".into(),
                    icon_url: "/icons/logs.svg".into(),
                    iframe_url: "http://127.0.0.1:5601".into(),
                    restartable: None,
                    accent_color: None,
                },
            ],
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileSettings {
    bind_addr: Option<String>,
    restart_delay_ms: Option<u64>,
    failing_restarts: Option<Vec<usize>>,
    tabs: Option<Vec<RawTabRecord>>,
}

pub fn load_settings() -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        apply_file_settings(&mut settings, &raw)
            .with_context(|| format!("failed to parse {SETTINGS_FILE}"))?;
    }

    if let Ok(v) = std::env::var("APP__BIND_ADDR") {
        settings.bind_addr = v;
    }
    if let Ok(v) = std::env::var("APP__RESTART_DELAY_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.restart_delay_ms = parsed;
        }
    }

    Ok(settings)
}

fn apply_file_settings(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.bind_addr {
        settings.bind_addr = v;
    }
    if let Some(v) = file_cfg.restart_delay_ms {
        settings.restart_delay_ms = v;
    }
    if let Some(v) = file_cfg.failing_restarts {
        settings.failing_restarts = v;
    }
    if let Some(v) = file_cfg.tabs {
        settings.tabs = v;
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
