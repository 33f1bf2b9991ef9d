//! Tile CLI commands.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use himem::{
    BoundingBox, HierarchicalMemory, LevelRange, TileFilter, TileIngestRecord, TileMeta,
    TilePayload,
};
use serde::Serialize;

use super::common::{parse_bbox, parse_level_range, parse_shape, print_json, read_json_file};
use crate::error::CliError;

/// Tile subcommands.
#[derive(Debug, Subcommand)]
pub enum TileCommands {
    /// Ingest one payload file, or a JSON batch of ingest records
    Put(PutArgs),

    /// Fetch a tile by id or by coordinate
    Get(GetArgs),

    /// List tiles in a snapshot
    List {
        snapshot_id: String,

        /// Only tiles in this stream
        #[arg(long)]
        stream: Option<String>,

        /// Only levels within MAX:MIN
        #[arg(long, value_parser = parse_level_range)]
        levels: Option<LevelRange>,

        /// Only tiles inside X,Y,W,H (repeatable; any box matches)
        #[arg(long = "bbox", value_parser = parse_bbox)]
        bboxes: Vec<BoundingBox>,
    },
}

#[derive(Debug, Args)]
pub struct PutArgs {
    /// JSON file holding an array of ingest records
    #[arg(long, conflicts_with = "payload")]
    pub batch: Option<PathBuf>,

    /// Payload file to ingest as a single tile
    #[arg(required_unless_present = "batch")]
    pub payload: Option<PathBuf>,

    #[arg(long)]
    pub snapshot: Option<String>,

    #[arg(long)]
    pub stream: Option<String>,

    #[arg(long, default_value_t = 0)]
    pub level: u32,

    #[arg(short = 'x', long, default_value_t = 0)]
    pub x: u32,

    #[arg(short = 'y', long, default_value_t = 0)]
    pub y: u32,

    /// Shape as A,B,C
    #[arg(long, value_parser = parse_shape)]
    pub shape: Option<[u32; 3]>,

    /// Content type of the payload
    #[arg(long)]
    pub dtype: Option<String>,

    #[arg(long)]
    pub halo: Option<u32>,

    /// Coarser tile this one refines
    #[arg(long)]
    pub parent: Option<String>,
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Tile id (omit to look up by coordinate)
    #[arg(required_unless_present = "snapshot")]
    pub tile_id: Option<String>,

    #[arg(long, conflicts_with = "tile_id", requires = "stream")]
    pub snapshot: Option<String>,

    #[arg(long)]
    pub stream: Option<String>,

    #[arg(long, default_value_t = 0)]
    pub level: u32,

    #[arg(short = 'x', long, default_value_t = 0)]
    pub x: u32,

    #[arg(short = 'y', long, default_value_t = 0)]
    pub y: u32,

    /// Write the payload here instead of embedding it in the output
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct FetchedTile {
    metadata: TileMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_b64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    written_to: Option<PathBuf>,
}

/// Run a tile subcommand.
pub fn run(memory: &HierarchicalMemory, command: TileCommands) -> Result<(), CliError> {
    match command {
        TileCommands::Put(args) => run_put(memory, args),
        TileCommands::Get(args) => run_get(memory, args),
        TileCommands::List {
            snapshot_id,
            stream,
            levels,
            bboxes,
        } => {
            let filter = TileFilter {
                stream,
                level_range: levels,
                bboxes: (!bboxes.is_empty()).then_some(bboxes),
            };
            print_json(&memory.tiles_for_snapshot(&snapshot_id, &filter)?)
        }
    }
}

fn run_put(memory: &HierarchicalMemory, args: PutArgs) -> Result<(), CliError> {
    let records = match (&args.batch, &args.payload) {
        (Some(batch), _) => read_json_file::<Vec<TileIngestRecord>>(batch)?,
        (None, Some(payload)) => vec![single_record(&args, payload)?],
        (None, None) => {
            return Err(CliError::Usage(
                "either a payload file or --batch is required".to_string(),
            ))
        }
    };

    let (tiles, outcome) = memory.tiles().ingest(&records)?;
    print_json(&serde_json::json!({
        "tiles": tiles,
        "outcome": outcome,
    }))
}

fn single_record(args: &PutArgs, payload: &Path) -> Result<TileIngestRecord, CliError> {
    let snapshot = args
        .snapshot
        .clone()
        .ok_or_else(|| CliError::Usage("--snapshot is required with a payload file".to_string()))?;
    let stream = args
        .stream
        .clone()
        .ok_or_else(|| CliError::Usage("--stream is required with a payload file".to_string()))?;
    let bytes = std::fs::read(payload)
        .map_err(|e| CliError::Input(format!("{}: {}", payload.display(), e)))?;

    let mut record = TileIngestRecord::new(stream, snapshot, args.level, args.x, args.y, &bytes);
    if let Some(shape) = args.shape {
        record = record.with_shape(shape);
    }
    if let Some(dtype) = &args.dtype {
        record = record.with_dtype(dtype.clone());
    }
    if let Some(halo) = args.halo {
        record = record.with_halo(halo);
    }
    if let Some(parent) = &args.parent {
        record = record.with_parent(parent.clone());
    }
    Ok(record)
}

fn run_get(memory: &HierarchicalMemory, args: GetArgs) -> Result<(), CliError> {
    let (metadata, bytes) = match (&args.tile_id, &args.snapshot, &args.stream) {
        (Some(tile_id), _, _) => memory.get_tile(tile_id)?,
        (None, Some(snapshot), Some(stream)) => {
            memory.get_tile_by_coordinate(stream, snapshot, args.level, args.x, args.y)?
        }
        _ => {
            return Err(CliError::Usage(
                "give a tile id, or --snapshot and --stream".to_string(),
            ))
        }
    };

    let fetched = match args.output {
        Some(path) => {
            std::fs::write(&path, &bytes)
                .map_err(|e| CliError::Output(format!("{}: {}", path.display(), e)))?;
            FetchedTile {
                metadata,
                payload_b64: None,
                written_to: Some(path),
            }
        }
        None => FetchedTile {
            metadata,
            payload_b64: Some(TilePayload::from_bytes(&bytes).bytes_b64),
            written_to: None,
        },
    };
    print_json(&fetched)
}
