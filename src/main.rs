use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use mineset::action::{ActionRegistry, ActionSpec};
use mineset::batch::{Batch, IdSource, Selection};
use mineset::construct::Item;
use mineset::container::Source;
use mineset::datatype::FieldValue;
use mineset::record::{BlockSpec, Record, SetField};
use mineset::settings::Settings;
use mineset::track::Track;
use mineset::{MinesetError, Result};

/// A batch run read from JSON: items, the named blocks and functions the
/// actions refer to, and the pipeline itself.
#[derive(Debug, Deserialize)]
struct BatchFile {
    #[serde(default)]
    source: Option<String>,
    items: Vec<BTreeMap<String, FieldValue>>,
    #[serde(default)]
    blocks: HashMap<String, BlockSpec>,
    #[serde(default)]
    functions: HashMap<String, SetField>,
    actions: Vec<ActionSpec>,
    #[serde(default)]
    complement: bool,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Serialize)]
struct BatchReport<'a> {
    selected: Vec<Record>,
    tracks: &'a [Track],
}

fn run(batch_path: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let settings = Settings::load(config_path.as_deref())?;
    let batch: BatchFile = serde_json::from_str(&fs::read_to_string(&batch_path)?)?;

    let mut registry: ActionRegistry<Record> = ActionRegistry::new();
    for (name, block) in batch.blocks {
        registry.register_predicate(name, block.into_predicate());
    }
    for (name, function) in batch.functions {
        registry.register_transform(name, Arc::new(function));
    }
    let actions = registry.compile_all(&batch.actions)?;

    let mut stored = settings.stored_collection::<Record>()?;
    let source = match batch.source {
        Some(label) => Source::run(label),
        None => Source::file(batch_path.to_string_lossy()),
    };
    let lid = stored.new_list(Some(source), None);
    for fields in batch.items {
        let uid = stored.next_item_uid();
        stored.add_item(Record::from_fields(uid, fields), Some(lid), None);
    }
    info!(items = stored.nb_items(), actions = actions.len(), "batch loaded");

    let selection = Selection {
        source: IdSource::List(lid),
        complement: batch.complement,
        data: batch.data,
        ..Selection::default()
    };
    let selected = stored.selected_items(&actions, &selection)?;
    info!(ids = ?selected.iter().map(Item::uid).collect::<Vec<_>>(), "selected");
    let report = BatchReport { selected, tracks: stored.tracks_mut().latest() };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn main() -> ExitCode {
    let mut args = std::env::args_os().skip(1).map(PathBuf::from);
    let Some(batch_path) = args.next() else {
        eprintln!("usage: mineset <batch.json> [settings.toml]");
        return ExitCode::FAILURE;
    };
    let config_path = args.next();

    // RUST_LOG wins, the settings file decides otherwise
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let fallback = Settings::load(config_path.as_deref()).map(|s| s.logging.filter).unwrap_or_else(|_| "info".to_owned());
        EnvFilter::try_new(fallback).unwrap_or_else(|_| EnvFilter::new("info"))
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    match run(batch_path, config_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e @ MinesetError::UnknownAction(_))
        | Err(e @ MinesetError::UnknownBlock { .. })
        | Err(e @ MinesetError::UnknownFunction { .. }) => {
            error!(error = %e, "batch description refers to something unknown");
            ExitCode::from(2)
        }
        Err(e) => {
            error!(error = %e, "batch failed");
            ExitCode::FAILURE
        }
    }
}
