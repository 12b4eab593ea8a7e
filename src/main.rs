//! Swirl Search - Main Application
//! Semantic paper search over an animated flow-field background

mod background;
mod compositor;
mod config;
mod noise_field;
mod particles;
mod postprocess;
mod search;
mod session;
mod views;

use clap::Parser;
use eframe::egui;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use background::FieldRenderer;
use config::AppConfig;
use search::{HttpTransport, SearchClient};
use session::SearchSession;
use views::{NavState, Route};

/// Semantic paper search over an animated flow-field background
#[derive(Parser, Debug)]
#[command(name = "swirl-search", version, about)]
struct Args {
    /// Write the default configuration as JSON to PATH and exit
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,
}

/// Main application state
struct SwirlSearchApp {
    route: Route,
    session: SearchSession,
    background: FieldRenderer,
    snapshot_dir: PathBuf,
}

impl SwirlSearchApp {
    fn new(cc: &eframe::CreationContext<'_>, config: AppConfig, client: SearchClient) -> Self {
        // Dark theme; panels stay transparent so the field shows through
        let mut visuals = egui::Visuals::dark();
        visuals.panel_fill = egui::Color32::TRANSPARENT;
        visuals.window_fill = egui::Color32::from_rgba_unmultiplied(15, 12, 30, 235);
        visuals.hyperlink_color = egui::Color32::from_rgb(140, 190, 255);
        cc.egui_ctx.set_visuals(visuals);

        Self {
            route: Route::Query,
            session: SearchSession::new(config.search, client),
            background: FieldRenderer::new(config.field, config.glow),
            snapshot_dir: PathBuf::from(config.ui.snapshot_dir),
        }
    }

    fn show_route(&mut self, ctx: &egui::Context) {
        let next = match self.route.clone() {
            Route::Query => {
                let error = self.session.form_error().map(str::to_owned);
                if views::show_query_view(ctx, &mut self.session.form, error.as_deref()) {
                    self.submit(ctx)
                } else {
                    None
                }
            }
            Route::Results(nav) => {
                let view = views::results_view(
                    self.session.state(),
                    &self.session.config().viewer_base_url,
                );
                views::show_results_view(ctx, &nav, &view).then_some(Route::Query)
            }
        };

        if let Some(route) = next {
            self.route = route;
        }
    }

    /// Validate the form and, if it passes, move to the results screen with a
    /// request in flight.
    fn submit(&mut self, ctx: &egui::Context) -> Option<Route> {
        let params = self.session.submit_form()?;
        let route = Route::results(NavState::from(&params));

        if let Route::Results(_) = route {
            let ctx = ctx.clone();
            self.session.start(params, move || ctx.request_repaint());
        }
        Some(route)
    }
}

impl eframe::App for SwirlSearchApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Pick up finished searches (non-blocking)
        self.session.poll();

        // Background first so the panels paint over it
        self.background.frame(ctx);

        if ctx.input(|i| i.key_pressed(egui::Key::F12)) {
            if let Err(e) = self.background.save_snapshot(&self.snapshot_dir) {
                warn!("snapshot failed: {e:#}");
            }
        }

        self.show_route(ctx);

        // Continuous repaint for the animation
        if self.background.is_alive() {
            ctx.request_repaint();
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.background.teardown();
    }
}

fn setup_logging(log_level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    setup_logging("info");

    if let Some(path) = args.write_config {
        AppConfig::default().save(&path)?;
        info!(path = %path.display(), "wrote default configuration");
        return Ok(());
    }

    let config = AppConfig::from_env();
    let transport = HttpTransport::new(Duration::from_secs(config.search.timeout_secs))?;
    let client = SearchClient::new(Arc::new(transport), config.search.endpoint.clone());
    info!(endpoint = %client.endpoint(), "search endpoint configured");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([config.ui.window_width, config.ui.window_height])
            .with_title("Semantic Search")
            .with_min_inner_size([480.0, 360.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Swirl Search",
        options,
        Box::new(|cc| Box::new(SwirlSearchApp::new(cc, config, client))),
    )
    .map_err(|e| anyhow::anyhow!("window closed with error: {e}"))
}
