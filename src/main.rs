use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use rand::Rng;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use scrollwatch::config::ScrollwatchConfig;
use scrollwatch::directive::{Binding, Element, InfiniteScroll, Node, ScrollMetrics, ScrollOptions};
use scrollwatch::timing::Throttled;

/// Height of one rendered feed item, in pixels.
const ITEM_HEIGHT: f64 = 48.0;
/// Items appended per loaded page.
const PAGE_SIZE: usize = 20;
/// Scroll events per simulated gesture.
const EVENTS_PER_GESTURE: usize = 6;
/// Interval between scroll events within a gesture (one frame).
const FRAME: Duration = Duration::from_millis(16);
/// Give up after this many gestures.
const MAX_GESTURES: usize = 500;

/// Simulated infinite-scroll feed driven by the scrollwatch directive.
#[derive(Debug, Parser)]
#[command(name = "scrollwatch", version, about)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the near-bottom threshold, in pixels
    #[arg(long)]
    threshold: Option<f64>,

    /// Override the scroll debounce delay, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Number of pages to load before exiting
    #[arg(long, default_value_t = 5)]
    pages: usize,

    /// Viewport height of the feed, in pixels
    #[arg(long, default_value_t = 600.0)]
    viewport: f64,

    /// Binding options as JSON, e.g. '{"target": ".feed", "delay": 300, "threshold": 80}'
    #[arg(long)]
    options: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    info!("Starting scrollwatch feed simulation");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = ScrollwatchConfig::load(cli.config.as_deref())?;
    if let Some(threshold) = cli.threshold {
        config.scroll.threshold = threshold;
    }
    if let Some(delay_ms) = cli.delay_ms {
        config.scroll.delay_ms = delay_ms;
    }
    info!(
        delay_ms = config.scroll.delay_ms,
        threshold = config.scroll.threshold,
        throttle_ms = config.throttle.interval_ms,
        "Configuration loaded"
    );

    let mut options: ScrollOptions = match &cli.options {
        Some(json) => serde_json::from_str(json)?,
        None => ScrollOptions::default(),
    };
    if options.target.is_none() {
        options = options.target(".feed");
    }

    let page_height = ITEM_HEIGHT * PAGE_SIZE as f64;
    let app = Node::builder("main").id("app").build();
    let feed = Node::builder("ul")
        .class("feed")
        .metrics(ScrollMetrics::new(0.0, page_height, cli.viewport))
        .build();
    app.append_child(feed.clone());

    let (tx, mut rx) = mpsc::unbounded_channel::<()>();
    let loader = Throttled::new(
        move |()| {
            let _ = tx.send(());
        },
        config.throttle.interval(),
        config.throttle.options(),
    )?;
    let binding = Binding::new(move || loader.call(())).with_options(options);

    let directive = InfiniteScroll::with_defaults(config.scroll.clone());
    // The host re-runs the hook on every update; only the first registers.
    for _ in 0..3 {
        directive.updated(app.as_ref(), &binding)?;
    }
    info!(element = %app.id(), attached = app.is_scroll_attached(), "Directive bound");

    let settle = config.scroll.delay() + config.throttle.interval() + FRAME;
    let mut loaded = 0;
    let mut gestures = 0;
    while loaded < cli.pages {
        if gestures == MAX_GESTURES {
            warn!(loaded, gestures, "Feed never reached its bottom, giving up");
            break;
        }
        gestures += 1;

        for _ in 0..EVENTS_PER_GESTURE {
            let metrics = feed.metrics();
            let step = rand::thread_rng().gen_range(20.0..120.0);
            feed.scroll_to((metrics.scroll_top + step).min(metrics.max_scroll().max(0.0)));
            feed.dispatch_scroll();
            tokio::time::sleep(FRAME).await;
        }

        let deadline = tokio::time::sleep(settle);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                Some(()) = rx.recv() => {
                    feed.extend_content(page_height);
                    loaded += 1;
                    let metrics = feed.metrics();
                    info!(
                        page = loaded,
                        scroll_top = metrics.scroll_top,
                        scroll_height = metrics.scroll_height,
                        "Loaded next page"
                    );
                }
                _ = &mut deadline => break,
            }
        }
    }

    info!(loaded, gestures, "Scrollwatch feed simulation finished");
    Ok(())
}
