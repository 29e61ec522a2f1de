use std::fs::File;
use std::io::stdout;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{LevelFilter, info};
use ratatui::{Terminal, backend::CrosstermBackend};
use simplelog::{Config, WriteLogger};

use pagechat::chat::HttpChatBackend;
use pagechat::event_source::KeyboardEventSource;
use pagechat::panic_handler;
use pagechat::pdf::{WorkerConfig, default_engine_factory, init_workers};
use pagechat::screen::{CellSize, ScreenConfig, ScreenServices, ViewerChatScreen};
use pagechat::settings;
use pagechat::source::ProxySource;
use pagechat::run_screen_with_event_source;

#[derive(Parser, Debug)]
#[command(name = "pagechat", version, about = "Read a remote PDF and ask questions about the page you are on")]
struct Args {
    /// Link to the document to open
    reference: Option<String>,

    /// Proxy endpoint that fetches the document for `?url=`
    #[arg(long)]
    proxy: Option<String>,

    /// Chat endpoint receiving page-aware questions
    #[arg(long)]
    chat: Option<String>,

    /// Settings file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "pagechat.log")]
    log_file: PathBuf,

    /// Overrides `log_level` from the settings file (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    match &args.config {
        Some(path) => settings::load_settings_or_create(path),
        None => settings::load_settings(),
    }
    settings::update(|s| {
        if let Some(proxy) = &args.proxy {
            s.proxy_url.clone_from(proxy);
        }
        if let Some(chat) = &args.chat {
            s.chat_url.clone_from(chat);
        }
    });
    let config = settings::current();

    let level = args
        .log_level
        .as_deref()
        .and_then(|name| name.parse::<LevelFilter>().ok())
        .unwrap_or_else(|| config.log_level_filter());
    WriteLogger::init(
        level,
        Config::default(),
        File::create(&args.log_file)
            .with_context(|| format!("cannot create log file {}", args.log_file.display()))?,
    )?;
    info!("Starting pagechat");

    init_workers(WorkerConfig {
        threads: config.render_threads.max(1),
        ..WorkerConfig::default()
    });

    let services = ScreenServices {
        source: Arc::new(ProxySource::new(&config.proxy_url, config.http_timeout())),
        engine: default_engine_factory(),
        chat: Arc::new(HttpChatBackend::new(&config.chat_url, config.http_timeout())),
    };
    let screen_config = ScreenConfig {
        margin_px: config.margin_px,
        cell_size: CellSize::new(config.cell_width_px, config.cell_height_px),
    };

    panic_handler::initialize_panic_handler();

    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut screen = ViewerChatScreen::mount(args.reference, services, screen_config);
    let mut event_source = KeyboardEventSource;
    let res = run_screen_with_event_source(&mut terminal, &mut screen, &mut event_source);
    drop(screen);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = &res {
        log::error!("Application error: {err:?}");
    }
    info!("Shutting down");
    res
}
