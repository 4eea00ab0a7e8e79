//! AtlasDBM CLI
//!
//! Command-line interface for reading and editing a database file.

use std::io::Write;
use std::process::ExitCode;

use atlasdbm::{Database, DatabaseConfig, OpenMode};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// AtlasDBM CLI
#[derive(Parser, Debug)]
#[command(name = "atlasdbm")]
#[command(about = "Read and edit an AtlasDBM database file")]
#[command(version)]
struct Args {
    /// Database file
    #[arg(short, long)]
    file: String,

    /// Access mode: r, w, c or n (default: r for reads, c for writes)
    #[arg(short, long)]
    mode: Option<String>,

    /// Block size hint for a newly created file (0 = filesystem default)
    #[arg(short, long, default_value = "0")]
    block_size: u32,

    /// Permission bits for a newly created file, in octal
    #[arg(short, long, default_value = "666", value_parser = parse_octal)]
    permissions: u32,

    /// Sync to disk after every write
    #[arg(short, long)]
    sync: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Insert a new key (fails if it exists)
    Insert {
        /// The key to insert
        key: String,

        /// The value to store
        value: String,
    },

    /// Insert or overwrite a key
    Replace {
        /// The key to set
        key: String,

        /// The value to store
        value: String,
    },

    /// Print the value for a key
    Fetch {
        /// The key to fetch
        key: String,
    },

    /// Check whether a key exists (exit status 1 if not)
    Exists {
        /// The key to check
        key: String,
    },

    /// Delete a key
    Delete {
        /// The key to delete
        key: String,
    },

    /// List all keys
    Keys,

    /// Print the number of records
    Count,

    /// Compact the file
    Reorganize,

    /// Flush the file to disk
    Sync,
}

impl Commands {
    fn default_mode(&self) -> OpenMode {
        match self {
            Commands::Insert { .. }
            | Commands::Replace { .. }
            | Commands::Delete { .. }
            | Commands::Reorganize
            | Commands::Sync => OpenMode::WriteCreate,
            Commands::Fetch { .. } | Commands::Exists { .. } | Commands::Keys | Commands::Count => {
                OpenMode::Reader
            }
        }
    }
}

fn parse_octal(s: &str) -> Result<u32, String> {
    u32::from_str_radix(s.trim_start_matches("0o"), 8)
        .map_err(|e| format!("invalid octal permissions {:?}: {}", s, e))
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> atlasdbm::Result<ExitCode> {
    let mode = match &args.mode {
        Some(letter) => letter.parse()?,
        None => args.command.default_mode(),
    };

    let config = DatabaseConfig::builder(mode)
        .block_size(args.block_size)
        .permissions(args.permissions)
        .sync_writes(args.sync)
        .build();

    let db = Database::open_with_config(&args.file, config)?;
    tracing::debug!("Running {:?} against {}", args.command, args.file);

    let code = execute(&db, args.command)?;
    db.close()?;
    Ok(code)
}

fn execute(db: &Database, command: Commands) -> atlasdbm::Result<ExitCode> {
    let mut stdout = std::io::stdout().lock();

    match command {
        Commands::Insert { key, value } => db.insert(key, value)?,
        Commands::Replace { key, value } => db.replace(key, value)?,
        Commands::Fetch { key } => {
            let value = db.fetch(key)?;
            print_bytes(&mut stdout, &value);
        }
        Commands::Exists { key } => {
            let found = db.exists(key);
            let answer: &[u8] = if found { b"true" } else { b"false" };
            print_bytes(&mut stdout, answer);
            if !found {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Delete { key } => db.delete(key)?,
        Commands::Keys => {
            for key in db.keys() {
                print_bytes(&mut stdout, &key);
            }
        }
        Commands::Count => print_bytes(&mut stdout, db.len().to_string().as_bytes()),
        Commands::Reorganize => db.reorganize()?,
        Commands::Sync => db.sync()?,
    }

    Ok(ExitCode::SUCCESS)
}

/// Write raw bytes followed by a newline; a closed stdout is not an error
fn print_bytes(out: &mut impl Write, bytes: &[u8]) {
    let _ = out.write_all(bytes).and_then(|_| out.write_all(b"\n"));
}
