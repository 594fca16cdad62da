use anyhow::{Context, Result};
use image_generator_ui::launcher::{prepare, Args};
use image_generator_ui::server::AppServer;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::windows::EventLoopBuilderExtWindows;
use winit::window::{Window, WindowId};
use wry::{WebView, WebViewBuilder};

const WINDOW_TITLE: &str = "Image Generator";

pub fn run(args: Args) -> Result<()> {
    let launch = prepare(args)?;
    let url = launch.url();
    tracing::info!(%url, "opening native window");

    let event_loop = build_event_loop().context("failed to create event loop")?;
    let mut app = DesktopApp::new(url, launch.server);
    event_loop
        .run_app(&mut app)
        .context("event loop terminated unexpectedly")?;

    Ok(())
}

struct DesktopApp {
    url: String,
    window: Option<Window>,
    webview: Option<WebView>,
    server: Option<AppServer>,
    last_logical_size: LogicalSize<f64>,
}

impl DesktopApp {
    fn new(url: String, server: AppServer) -> Self {
        Self {
            url,
            window: None,
            webview: None,
            server: Some(server),
            last_logical_size: LogicalSize::new(1280.0, 860.0),
        }
    }

    fn init_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        if self.window.is_some() {
            return Ok(());
        }

        let attrs = Window::default_attributes()
            .with_title(WINDOW_TITLE)
            .with_inner_size(self.last_logical_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create main window")?;

        let webview = WebViewBuilder::new()
            .with_url(&self.url)
            .build(&window)
            .context("failed to build webview")?;

        self.last_logical_size = window.inner_size().to_logical(window.scale_factor());
        self.webview = Some(webview);
        self.window = Some(window);
        Ok(())
    }

    fn shutdown_server(&mut self) {
        if let Some(mut server) = self.server.take() {
            server.stop();
        }
    }
}

impl ApplicationHandler for DesktopApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(err) = self.init_window(event_loop) {
            tracing::error!(error = %format!("{err:#}"), "window setup failed");
            self.shutdown_server();
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                self.shutdown_server();
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(scale_factor) = self.window.as_ref().map(Window::scale_factor) {
                    self.last_logical_size = new_size.to_logical(scale_factor);
                    tracing::trace!(
                        width = self.last_logical_size.width,
                        height = self.last_logical_size.height,
                        scale_factor,
                        "window resized"
                    );
                }
            }
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shutdown_server();
    }
}

fn build_event_loop() -> Result<EventLoop<()>> {
    let mut builder = EventLoop::builder();
    builder.with_dpi_aware(true);
    builder.build().map_err(Into::into)
}
