#![cfg_attr(
    all(target_os = "windows", not(debug_assertions)),
    windows_subsystem = "windows"
)]

use image_generator_ui::launcher::{init_logging, parse_args};

#[cfg(target_os = "windows")]
mod windows_app;

#[cfg(target_os = "windows")]
fn main() -> anyhow::Result<()> {
    init_logging();
    windows_app::run(parse_args(std::env::args().skip(1)))
}

#[cfg(not(target_os = "windows"))]
fn main() -> anyhow::Result<()> {
    init_logging();
    image_generator_ui::launcher::run_headless(parse_args(std::env::args().skip(1)))
}
