//! Strata metabase admin CLI
//!
//! Opens a local metabase file and runs one inspection or repair command
//! against it. Results are printed as JSON on stdout, logs go to stderr.

mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use strata_common::{
    BucketName, Config, ObjectKey, ObjectLocation, ProjectId, SegmentPosition, StreamId, Version,
};
use strata_metabase::{
    ListObjectsSegments, ListSegments, ListStreamPositions, Metabase, StreamRange,
};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "strata-meta")]
#[command(about = "Strata metabase admin CLI")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/strata/meta.toml")]
    config: PathBuf,

    /// Override the data directory holding the metabase file
    #[arg(long, env = "STRATA_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (defaults to the configured one)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List committed segments of a stream
    ListSegments {
        /// Stream ID (UUID)
        stream_id: String,
        /// Start after this position (part:index)
        #[arg(long)]
        cursor: Option<String>,
        /// Page size, 0 for all
        #[arg(short, long, default_value = "0")]
        limit: i32,
    },
    /// List segment positions of a stream, optionally within a plain byte range
    StreamPositions {
        /// Stream ID (UUID)
        stream_id: String,
        /// Start after this position (part:index)
        #[arg(long)]
        cursor: Option<String>,
        /// Page size, 0 for all
        #[arg(short, long, default_value = "0")]
        limit: i32,
        /// Plain byte range (start:limit)
        #[arg(short, long)]
        range: Option<String>,
    },
    /// List committed segments of several streams
    ObjectsSegments {
        /// Stream IDs (UUID)
        #[arg(required = true)]
        stream_ids: Vec<String>,
    },
    /// Show an object
    GetObject {
        #[command(flatten)]
        location: LocationArgs,
        /// Exact version, latest committed if omitted
        #[arg(long)]
        version: Option<i64>,
    },
    /// Delete an object and its segments
    DeleteObject {
        #[command(flatten)]
        location: LocationArgs,
        /// Exact version, latest committed if omitted
        #[arg(long)]
        version: Option<i64>,
    },
    /// Abandon a pending upload
    DeletePending {
        #[command(flatten)]
        location: LocationArgs,
        /// Version of the pending object
        #[arg(long)]
        version: i64,
        /// Stream ID of the pending object
        #[arg(long)]
        stream_id: String,
    },
}

#[derive(clap::Args, Debug)]
struct LocationArgs {
    /// Project ID (UUID)
    #[arg(long)]
    project: String,
    /// Bucket name
    #[arg(long)]
    bucket: String,
    /// Encrypted object key (hex)
    #[arg(long)]
    key: String,
}

impl LocationArgs {
    fn parse(&self) -> Result<ObjectLocation> {
        let project = uuid::Uuid::parse_str(&self.project)
            .with_context(|| format!("Invalid project id '{}'", self.project))?;
        let key = hex::decode(&self.key)
            .with_context(|| format!("Invalid hex object key '{}'", self.key))?;
        Ok(ObjectLocation {
            project_id: ProjectId::from_uuid(project),
            bucket_name: BucketName::new(self.bucket.clone()),
            object_key: ObjectKey::new(key),
        })
    }
}

fn parse_stream_id(s: &str) -> Result<StreamId> {
    let uuid = uuid::Uuid::parse_str(s.trim())
        .map_err(|_| anyhow::anyhow!("Invalid stream id: '{s}'"))?;
    Ok(StreamId::from_uuid(uuid))
}

/// Parse a `part:index` position
fn parse_position(s: &str) -> Result<SegmentPosition> {
    let (part, index) = s
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("Invalid position: '{s}' (expected part:index)"))?;
    let part = part
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid position part: '{s}'"))?;
    let index = index
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid position index: '{s}'"))?;
    Ok(SegmentPosition::new(part, index))
}

/// Parse a `start:limit` plain byte range
fn parse_range(s: &str) -> Result<StreamRange> {
    let (start, limit) = s
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("Invalid range: '{s}' (expected start:limit)"))?;
    Ok(StreamRange {
        plain_start: start
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid range start: '{s}'"))?,
        plain_limit: limit
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid range limit: '{s}'"))?,
    })
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;
    if let Some(data_dir) = &args.data_dir {
        config.node.data_dir.clone_from(data_dir);
    }

    // Initialize logging
    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.log.level.clone());
    let registry = tracing_subscriber::registry().with(
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()),
    );
    if args.json_logs || config.log.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    debug!("Node {} using {}", config.node.name, config.db_path().display());
    let db = Metabase::open(&config)
        .with_context(|| format!("Failed to open metabase {}", config.db_path().display()))?;

    match args.command {
        Commands::ListSegments {
            stream_id,
            cursor,
            limit,
        } => {
            let result = db.list_segments(ListSegments {
                stream_id: parse_stream_id(&stream_id)?,
                cursor: cursor.as_deref().map(parse_position).transpose()?,
                limit,
            })?;
            print_json(&output::segments(&result.segments, Some(result.more)))?;
        }
        Commands::StreamPositions {
            stream_id,
            cursor,
            limit,
            range,
        } => {
            let result = db.list_stream_positions(ListStreamPositions {
                stream_id: parse_stream_id(&stream_id)?,
                cursor: cursor.as_deref().map(parse_position).transpose()?,
                limit,
                range: range.as_deref().map(parse_range).transpose()?,
            })?;
            print_json(&output::positions(&result))?;
        }
        Commands::ObjectsSegments { stream_ids } => {
            let stream_ids = stream_ids
                .iter()
                .map(|s| parse_stream_id(s))
                .collect::<Result<Vec<_>>>()?;
            let result = db.list_objects_segments(ListObjectsSegments { stream_ids })?;
            print_json(&output::segments(&result.segments, None))?;
        }
        Commands::GetObject { location, version } => {
            let location = location.parse()?;
            let object = match version {
                Some(v) => db.get_object_exact_version(&location, Version::new(v))?,
                None => db.get_object_latest_version(&location)?,
            };
            print_json(&output::object(&object))?;
        }
        Commands::DeleteObject { location, version } => {
            let location = location.parse()?;
            let result = match version {
                Some(v) => db.delete_object_exact_version(&location, Version::new(v))?,
                None => db.delete_object_latest_version(&location)?,
            };
            info!(
                "Deleted {} objects, {} segments to reclaim",
                result.objects.len(),
                result.segments.len()
            );
            print_json(&output::deleted(&result))?;
        }
        Commands::DeletePending {
            location,
            version,
            stream_id,
        } => {
            let stream = location
                .parse()?
                .with_version(Version::new(version), parse_stream_id(&stream_id)?);
            let result = db.delete_pending_object(&stream)?;
            info!(
                "Abandoned upload {}, {} segments to reclaim",
                stream,
                result.segments.len()
            );
            print_json(&output::deleted(&result))?;
        }
    }

    Ok(())
}
