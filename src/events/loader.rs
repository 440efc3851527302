//! Event file loaders.
//!
//! CSV files carry one event type each (header-matched columns, numeric
//! fields as decimal strings). JSON files carry both streams in one
//! document. Malformed rows fail the whole load with their row number.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::EventError;
use crate::events::models::{LiquidityEvent, SwapEvent};

/// JSON document layout: both streams, either may be absent.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EventFile {
    #[serde(default)]
    pub liquidity_events: Vec<LiquidityEvent>,
    #[serde(default)]
    pub swap_events: Vec<SwapEvent>,
}

fn open(path: &Path) -> Result<File, EventError> {
    File::open(path).map_err(|e| EventError::Io(format!("{}: {e}", path.display())))
}

pub fn load_liquidity_events_csv(path: &Path) -> Result<Vec<LiquidityEvent>, EventError> {
    let mut reader = csv::Reader::from_reader(open(path)?);
    let mut events = Vec::new();
    for (row, record) in reader.deserialize::<LiquidityEvent>().enumerate() {
        // header is line 1, first data row line 2
        events.push(record.map_err(|e| EventError::Parse { row: row + 2, message: e.to_string() })?);
    }
    info!(count = events.len(), path = %path.display(), "loaded liquidity events");
    Ok(events)
}

pub fn load_swap_events_csv(path: &Path) -> Result<Vec<SwapEvent>, EventError> {
    let mut reader = csv::Reader::from_reader(open(path)?);
    let mut events = Vec::new();
    for (row, record) in reader.deserialize::<SwapEvent>().enumerate() {
        events.push(record.map_err(|e| EventError::Parse { row: row + 2, message: e.to_string() })?);
    }
    info!(count = events.len(), path = %path.display(), "loaded swap events");
    Ok(events)
}

pub fn load_events_json(path: &Path) -> Result<EventFile, EventError> {
    let file = open(path)?;
    let events: EventFile = serde_json::from_reader(file)
        .map_err(|e| EventError::Parse { row: e.line(), message: e.to_string() })?;
    info!(
        liquidity = events.liquidity_events.len(),
        swaps = events.swap_events.len(),
        path = %path.display(),
        "loaded event file"
    );
    Ok(events)
}
