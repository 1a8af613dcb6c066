use std::{
    collections::HashMap,
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use server_api::{FlowPolicy, ResponseMode};
use shared::phase::PhasePolicy;
use storage::sheets::{SheetsConfig, DEFAULT_SHEETS_API};
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "rsvp.toml";
/// Points the server at a different settings file.
pub const CONFIG_PATH_ENV: &str = "RSVP_CONFIG";
const ENV_PREFIX: &str = "APP";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind_addr: String,
    pub roster_path: PathBuf,
    pub responses_path: PathBuf,
    pub confirmations_path: PathBuf,
    pub mode: ResponseMode,
    pub enforce_seat_limit: bool,
    pub phase_policy: PhasePolicy,
    pub sheets: Option<SheetsSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".into(),
            roster_path: "./data/lista_maestra.csv".into(),
            responses_path: "./data/invitados.csv".into(),
            confirmations_path: "./data/confirmados.csv".into(),
            mode: ResponseMode::default(),
            enforce_seat_limit: false,
            phase_policy: PhasePolicy::default(),
            sheets: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SheetsSettings {
    pub spreadsheet_id: String,
    #[serde(default = "default_worksheet")]
    pub worksheet: String,
    pub access_token: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_worksheet() -> String {
    "Invitados".into()
}

fn default_api_base() -> String {
    DEFAULT_SHEETS_API.into()
}

fn default_timeout_secs() -> u64 {
    10
}

impl SheetsSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn client_config(&self) -> anyhow::Result<SheetsConfig> {
        let api_base = Url::parse(self.api_base.trim())
            .with_context(|| format!("invalid sheets api_base '{}'", self.api_base))?;
        Ok(SheetsConfig {
            api_base,
            spreadsheet_id: self.spreadsheet_id.trim().to_string(),
            worksheet: self.worksheet.trim().to_string(),
            access_token: self.access_token.trim().to_string(),
            timeout: self.timeout(),
        })
    }
}

impl Settings {
    pub fn flow_policy(&self) -> FlowPolicy {
        FlowPolicy {
            mode: self.mode,
            enforce_seat_limit: self.enforce_seat_limit,
        }
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        self.bind_addr
            .trim()
            .parse()
            .with_context(|| format!("invalid bind_addr '{}'", self.bind_addr))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.socket_addr()?;
        self.phase_policy
            .validate()
            .context("invalid phase_policy")?;

        for (name, path) in [
            ("roster_path", &self.roster_path),
            ("responses_path", &self.responses_path),
            ("confirmations_path", &self.confirmations_path),
        ] {
            if path.as_os_str().is_empty() {
                bail!("{name} must not be empty");
            }
        }
        if self.responses_path == self.confirmations_path {
            bail!("responses_path and confirmations_path must be different files");
        }

        if let Some(sheets) = &self.sheets {
            if sheets.spreadsheet_id.trim().is_empty() {
                bail!("sheets.spreadsheet_id must not be empty");
            }
            if sheets.access_token.trim().is_empty() {
                bail!("sheets.access_token must not be empty");
            }
            if sheets.timeout_secs == 0 {
                bail!("sheets.timeout_secs must be at least 1");
            }
            sheets.client_config()?;
        }
        Ok(())
    }
}

/// Defaults, then the optional settings file, then `APP__*` environment variables.
pub fn load_settings() -> anyhow::Result<Settings> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
    let settings = Config::builder()
        .add_source(File::new(&path, FileFormat::Toml).required(false))
        .add_source(environment(None))
        .build()
        .and_then(Config::try_deserialize)
        .with_context(|| format!("failed to load settings (file '{path}', env {ENV_PREFIX}__*)"))?;
    Ok(settings)
}

fn environment(vars: Option<HashMap<String, String>>) -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
        .source(vars)
}

/// Builds settings from TOML text and an explicit variable map instead of the process state.
pub fn settings_from_sources(
    toml: &str,
    vars: HashMap<String, String>,
) -> anyhow::Result<Settings> {
    Config::builder()
        .add_source(File::from_str(toml, FileFormat::Toml))
        .add_source(environment(Some(vars)))
        .build()
        .and_then(Config::try_deserialize)
        .context("failed to parse settings")
}

/// Creates the parent directory of a local data file.
pub fn prepare_data_path(path: &Path) -> anyhow::Result<()> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for '{}'",
            parent.display(),
            path.display()
        )
    })
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
