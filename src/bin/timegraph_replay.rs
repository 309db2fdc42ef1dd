//! Replays one zoom over a SQLite interval store and prints the resulting
//! rows as JSON.
//!
//! `TIMEGRAPH_CONFIG` points at an optional JSON `ZoomConfig`.

use std::{env, path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use serde_json::{json, Value as JsonValue};
use tokio::runtime::Handle;

use timegraph_zoom::{
    models::{format_timestamp, ContextId, DisplayEvent, FilterSet, RowSpec},
    store::IntervalStore,
    utils::init_logging_at,
    RowRegistry, SqliteStore, Viewport, ZoomConfig, ZoomController,
};

#[derive(Parser, Debug)]
#[command(name = "timegraph-replay", version, about, long_about = None)]
struct Args {
    /// SQLite interval store to read
    store: PathBuf,

    /// Window start; defaults to the store's first timestamp
    #[arg(requires = "end", allow_negative_numbers = true)]
    start: Option<i64>,

    /// Window end; defaults to the store's current end
    #[arg(allow_negative_numbers = true)]
    end: Option<i64>,

    /// View width in pixels (default: `displayWidth` from the config)
    #[arg(short, long)]
    width: Option<i64>,

    /// Write the effective config to this path before replaying
    #[arg(long)]
    save_config: Option<PathBuf>,
}

fn event_json(event: &DisplayEvent) -> JsonValue {
    json!({
        "start": event.span.start,
        "end": event.span.end,
        "startTime": format_timestamp(event.span.start),
        "kind": event.kind,
        "payload": event.payload,
        "dimmed": event.dimmed,
        "excluded": event.excluded,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = match env::var_os("TIMEGRAPH_CONFIG") {
        Some(path) => ZoomConfig::load(&PathBuf::from(path))?,
        None => {
            let mut config = ZoomConfig::default();
            config.apply_env();
            config
        }
    };
    init_logging_at(if config.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });

    if let Some(path) = &args.save_config {
        config.save(path)?;
        info!("wrote zoom config to {}", path.display());
    }
    if !args.store.exists() {
        bail!("interval store {} does not exist", args.store.display());
    }
    let store = SqliteStore::open(args.store.clone())?;
    let attributes = store
        .attributes()
        .context("failed to list store attributes")?;

    let registry = Arc::new(RowRegistry::new());
    let context = ContextId::new();
    let store_id = registry.register_store(context, Arc::new(store.clone()));
    let specs = attributes
        .iter()
        .map(|(attribute, name)| {
            let label = name.clone().unwrap_or_else(|| format!("attribute {}", attribute.0));
            RowSpec::new(label, [*attribute])
        })
        .collect();
    let rows = registry.register_rows(context, store_id, specs);

    let (start, end) = match (args.start, args.end) {
        (Some(start), Some(end)) => (start, end),
        _ => (store.start_time(), store.current_end_time()),
    };
    let width = args.width.unwrap_or(config.display_width);
    let viewport = Viewport::for_display(start, end, width, FilterSet::none());
    info!(
        "replaying {} rows over [{}, {}] at r={}",
        rows.len(),
        format_timestamp(start),
        format_timestamp(end),
        viewport.resolution
    );

    let controller = ZoomController::new(Arc::clone(&registry), config, Handle::current());
    controller.set_viewport(viewport);
    controller.join().await;

    let state = controller.state();
    if let Some(err) = &state.last_error {
        bail!("replay incomplete, {err}");
    }

    let output: Vec<JsonValue> = rows
        .iter()
        .filter_map(|id| registry.row(*id))
        .map(|row| {
            json!({
                "row": row.label,
                "sampling": row.current_sampling,
                "events": row.current_events.iter().map(event_json).collect::<Vec<_>>(),
            })
        })
        .collect();
    let report = json!({
        "status": state.status,
        "rows": output,
        "markers": state.markers,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    store.dispose();
    Ok(())
}
