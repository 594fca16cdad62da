pub mod config_store;
pub mod controller;
pub mod credential_store;
pub mod error;
pub mod form_state;
pub mod generation_client;
pub mod launcher;
pub mod main_ui_html;
pub mod path_utils;
pub mod presets;
pub mod server;
