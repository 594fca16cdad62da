use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use toml::map::Map;
use toml::Value;

use crate::form_state::{
    FormState, DEFAULT_MODEL, DEFAULT_NEGATIVE_PROMPT, DEFAULT_PROMPT, DEFAULT_STEPS,
};
use crate::generation_client::{DEFAULT_API_BASE_URL, DEFAULT_GENERATE_PATH};
use crate::presets::DEFAULT_ASPECT_RATIO;

pub const DEFAULT_SERVER_PORT: u16 = 3000;

#[derive(Debug)]
pub struct ConfigStore {
    pub path: PathBuf,
    doc: Value,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let doc = if path.exists() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("failed to parse TOML: {}", path.display()))?
        } else {
            Value::Table(Map::new())
        };

        let mut store = Self { path, doc };
        store.normalize_doc();
        store.save()?;
        Ok(store)
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create config dir: {}", parent.display()))?;
        }
        let text = toml::to_string_pretty(&self.doc).context("failed to serialize TOML")?;
        fs::write(&self.path, text)
            .with_context(|| format!("failed to write config: {}", self.path.display()))
    }

    pub fn server_port(&self) -> u16 {
        self.app_table()
            .and_then(|t| t.get("server_port"))
            .and_then(value_to_i64)
            .and_then(|v| u16::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    pub fn api_base_url(&self) -> String {
        self.app_string("api_base_url")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
    }

    pub fn generate_path(&self) -> String {
        self.app_string("generate_path")
            .unwrap_or_else(|| DEFAULT_GENERATE_PATH.to_string())
    }

    pub fn credential_passphrase(&self) -> String {
        self.app_table()
            .and_then(|t| t.get("credential_passphrase"))
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .unwrap_or_default()
    }

    pub fn default_form(&self) -> FormState {
        let defaults = self.table("defaults");
        let text = |key: &str, fallback: &str| {
            defaults
                .and_then(|t| t.get(key))
                .and_then(Value::as_str)
                .map(ToOwned::to_owned)
                .unwrap_or_else(|| fallback.to_string())
        };

        let mut form = FormState {
            prompt: text("prompt", DEFAULT_PROMPT),
            negative_prompt: text("negative_prompt", DEFAULT_NEGATIVE_PROMPT),
            model: text("model", DEFAULT_MODEL),
            steps: defaults
                .and_then(|t| t.get("steps"))
                .and_then(value_to_i64)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(DEFAULT_STEPS),
            ..FormState::default()
        };
        let ratio = text("aspect_ratio", DEFAULT_ASPECT_RATIO);
        form.select_aspect_ratio(&ratio);
        form.normalized()
    }

    pub fn saved_form(&self) -> FormState {
        let Some(saved) = self
            .table("state")
            .and_then(|state| state.get("form"))
            .cloned()
        else {
            return self.default_form();
        };

        let mut form = self.default_form();
        if let Some(table) = saved.as_table() {
            overlay_form(&mut form, table);
        }
        form.normalized()
    }

    pub fn save_form(&mut self, form: &FormState) -> Result<()> {
        let value = Value::try_from(form).context("failed to encode form state")?;
        self.ensure_table_mut("state")
            .insert("form".to_string(), value);
        self.save()
    }

    fn normalize_doc(&mut self) {
        if !self.doc.is_table() {
            self.doc = Value::Table(Map::new());
        }

        {
            let app = self.ensure_table_mut("app");

            let port = app
                .get("server_port")
                .and_then(value_to_i64)
                .filter(|v| (1..=65_535).contains(v))
                .unwrap_or(i64::from(DEFAULT_SERVER_PORT));
            app.insert("server_port".to_string(), Value::Integer(port));

            for (key, fallback) in [
                ("api_base_url", DEFAULT_API_BASE_URL),
                ("generate_path", DEFAULT_GENERATE_PATH),
            ] {
                let current = app
                    .get(key)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .unwrap_or(fallback)
                    .to_string();
                app.insert(key.to_string(), Value::String(current));
            }

            if app
                .get("credential_passphrase")
                .and_then(Value::as_str)
                .is_none()
            {
                app.insert(
                    "credential_passphrase".to_string(),
                    Value::String(String::new()),
                );
            }
        }

        {
            let defaults = self.ensure_table_mut("defaults");
            for (key, fallback) in [
                ("prompt", DEFAULT_PROMPT),
                ("negative_prompt", DEFAULT_NEGATIVE_PROMPT),
                ("model", DEFAULT_MODEL),
                ("aspect_ratio", DEFAULT_ASPECT_RATIO),
            ] {
                if defaults.get(key).and_then(Value::as_str).is_none() {
                    defaults.insert(key.to_string(), Value::String(fallback.to_string()));
                }
            }

            let steps = defaults
                .get("steps")
                .and_then(value_to_i64)
                .filter(|v| (1..=50).contains(v))
                .unwrap_or(i64::from(DEFAULT_STEPS));
            defaults.insert("steps".to_string(), Value::Integer(steps));
        }

        self.ensure_table_mut("state");
    }

    fn app_table(&self) -> Option<&Map<String, Value>> {
        self.table("app")
    }

    fn app_string(&self, key: &str) -> Option<String> {
        self.app_table()
            .and_then(|t| t.get(key))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
    }

    fn table(&self, name: &str) -> Option<&Map<String, Value>> {
        self.doc
            .as_table()
            .and_then(|root| root.get(name))
            .and_then(Value::as_table)
    }

    fn root_table_mut(&mut self) -> &mut Map<String, Value> {
        if !self.doc.is_table() {
            self.doc = Value::Table(Map::new());
        }
        self.doc
            .as_table_mut()
            .expect("root should be table after normalization")
    }

    fn ensure_table_mut(&mut self, name: &str) -> &mut Map<String, Value> {
        let root = self.root_table_mut();
        let table = root
            .entry(name.to_string())
            .or_insert_with(|| Value::Table(Map::new()));
        if !table.is_table() {
            *table = Value::Table(Map::new());
        }
        table
            .as_table_mut()
            .expect("table should exist after normalization")
    }
}

fn overlay_form(form: &mut FormState, table: &Map<String, Value>) {
    let text = |key: &str| table.get(key).and_then(Value::as_str).map(ToOwned::to_owned);
    let number = |key: &str| {
        table
            .get(key)
            .and_then(value_to_i64)
            .and_then(|v| u32::try_from(v).ok())
    };

    if let Some(prompt) = text("prompt") {
        form.prompt = prompt;
    }
    if let Some(negative_prompt) = text("negative_prompt") {
        form.negative_prompt = negative_prompt;
    }
    if let Some(model) = text("model") {
        form.model = model;
    }
    if let Some(aspect_ratio) = text("aspect_ratio") {
        form.aspect_ratio = aspect_ratio;
    }
    if let Some(width) = number("width") {
        form.width = width;
    }
    if let Some(height) = number("height") {
        form.height = height;
    }
    if let Some(steps) = number("steps") {
        form.steps = steps;
    }
    if let Some(high_resolution) = table.get("high_resolution").and_then(Value::as_bool) {
        form.high_resolution = high_resolution;
    }
}

fn value_to_i64(value: &Value) -> Option<i64> {
    value
        .as_integer()
        .or_else(|| value.as_float().map(|v| v as i64))
        .or_else(|| value.as_str().and_then(|v| v.trim().parse::<i64>().ok()))
}
