use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config_store::ConfigStore;
use crate::controller::GenerationController;
use crate::credential_store::{CredentialStore, LOCAL_STORAGE_FILE};
use crate::error::CredentialError;
use crate::generation_client::GenerationClient;
use crate::path_utils::{get_base_dir, resolve_config_path};
use crate::server::{AppServer, AppState};

pub const API_BASE_URL_ENV: &str = "IMAGEGEN_API_BASE_URL";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Args {
    pub config: Option<String>,
}

pub struct Launch {
    pub state: Arc<AppState>,
    pub server: AppServer,
}

impl Launch {
    pub fn url(&self) -> String {
        self.server.url()
    }
}

pub fn parse_args<I>(args: I) -> Args
where
    I: IntoIterator<Item = String>,
{
    let mut config = None;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(value) = args.next() {
                config = Some(value);
            }
        } else if let Some(value) = arg.strip_prefix("--config=") {
            config = Some(value.to_string());
        }
    }

    Args { config }
}

pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

pub fn prepare(args: Args) -> Result<Launch> {
    let base_dir = get_base_dir();
    let config_path = resolve_config_path(args.config, &base_dir);

    let config = ConfigStore::new(config_path.clone())
        .with_context(|| format!("config error: {}", config_path.display()))?;
    tracing::info!(path = %config_path.display(), "config loaded");

    let storage_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or(base_dir);
    let credentials = CredentialStore::new(
        storage_dir.join(LOCAL_STORAGE_FILE),
        config.credential_passphrase(),
    );
    let api_key = load_api_key(&credentials);

    let base_url = resolve_api_base_url(env::var(API_BASE_URL_ENV).ok(), &config);
    let client = GenerationClient::new(&base_url, &config.generate_path())
        .map_err(|err| anyhow!("invalid generation endpoint: {err}"))?;
    tracing::info!(endpoint = %client.endpoint(), "generation endpoint configured");

    let preferred_port = config.server_port();
    let controller = GenerationController::new(config.saved_form(), api_key);
    let state = Arc::new(AppState::new(config, credentials, controller, client));
    let server =
        AppServer::start(state.clone(), preferred_port).context("failed to start ui server")?;

    Ok(Launch { state, server })
}

pub fn run_headless(args: Args) -> Result<()> {
    let mut launch = prepare(args)?;
    tracing::info!(url = %launch.url(), "open this address in a browser");

    wait_for_shutdown()?;
    launch.server.stop();
    Ok(())
}

fn wait_for_shutdown() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build signal runtime")?;
    runtime
        .block_on(tokio::signal::ctrl_c())
        .context("failed to listen for Ctrl-C")?;
    tracing::info!("shutdown requested");
    Ok(())
}

fn resolve_api_base_url(from_env: Option<String>, config: &ConfigStore) -> String {
    from_env
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| config.api_base_url())
}

/// An undecryptable record starts the session without a key.
fn load_api_key(store: &CredentialStore) -> String {
    match store.load() {
        Ok(api_key) => api_key,
        Err(CredentialError::Decryption(reason)) => {
            tracing::warn!(
                path = %store.path().display(),
                %reason,
                "stored API key could not be decrypted; starting without one"
            );
            String::new()
        }
        Err(err) => {
            tracing::warn!(error = %err, "failed to read stored API key");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{load_api_key, parse_args, resolve_api_base_url, Args};
    use crate::config_store::ConfigStore;
    use crate::credential_store::CredentialStore;
    use std::fs;
    use std::path::PathBuf;

    fn fixture_base(name: &str) -> PathBuf {
        let mut base = std::env::temp_dir();
        base.push(format!("igu_launcher_test_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(&base).expect("mkdir fixture");
        base
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_config_flag_forms() {
        assert_eq!(parse_args(Vec::new()), Args::default());
        assert_eq!(
            parse_args(strings(&["--config", "a.toml"])).config.as_deref(),
            Some("a.toml")
        );
        assert_eq!(
            parse_args(strings(&["--verbose", "--config=b.toml"]))
                .config
                .as_deref(),
            Some("b.toml")
        );
        assert_eq!(parse_args(strings(&["--config"])).config, None);
    }

    #[test]
    fn env_base_url_overrides_config() {
        let base = fixture_base("base_url");
        let config = ConfigStore::new(base.join("config.toml")).expect("config");

        assert_eq!(
            resolve_api_base_url(Some(" https://api.example.com ".to_string()), &config),
            "https://api.example.com"
        );
        assert_eq!(
            resolve_api_base_url(Some("  ".to_string()), &config),
            "http://localhost:8787"
        );
        assert_eq!(resolve_api_base_url(None, &config), "http://localhost:8787");

        fs::remove_dir_all(base).ok();
    }

    #[test]
    fn undecryptable_key_starts_empty() {
        let base = fixture_base("key");
        let path = base.join("local_storage.json");

        CredentialStore::new(path.clone(), "first")
            .store("abc123")
            .expect("store");
        assert_eq!(load_api_key(&CredentialStore::new(path.clone(), "first")), "abc123");
        assert_eq!(load_api_key(&CredentialStore::new(path, "second")), "");

        fs::remove_dir_all(base).ok();
    }
}
