//! `export-artist-data <index_dir> <out_dir>`: emits the flat
//! `artist_data.txt` / `stupid_artist_data.txt` files consumed by a separate
//! lookup front-end.
//!
//! Record layout, little-endian, concatenated: `<u32 id><u32 text_len>
//! <text_len bytes: UTF-8>`. `artist_data.txt` holds the canonical
//! `encode`; `stupid_artist_data.txt` holds `encode_loose`, so artists whose
//! name is pure punctuation (e.g. `"!!!"`) still get an entry.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use rusqlite::Connection;

use fuzzy_mapping_index::normalize::{encode, encode_loose};

/// Export the flat artist-data lookup files from a mapping database.
#[derive(Parser)]
#[command(name = "export-artist-data")]
#[command(about = "Export artist_data.txt / stupid_artist_data.txt from mapping.db")]
struct Args {
    /// Directory containing `mapping.db`.
    index_dir: PathBuf,

    /// Directory the two output files are written into.
    out_dir: PathBuf,
}

fn write_record(out: &mut impl Write, id: u32, text: &str) -> Result<()> {
    out.write_all(&id.to_le_bytes())?;
    let bytes = text.as_bytes();
    out.write_all(&(bytes.len() as u32).to_le_bytes())?;
    out.write_all(bytes)?;
    Ok(())
}

fn run(args: Args) -> Result<()> {
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating output directory {}", args.out_dir.display()))?;

    let db_path = args.index_dir.join("mapping.db");
    let conn = Connection::open(&db_path)
        .with_context(|| format!("opening mapping database at {}", db_path.display()))?;

    let mut stmt = conn.prepare(
        "SELECT DISTINCT artist_credit_id, artist_credit_name FROM mapping
         ORDER BY artist_credit_id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("reading distinct artist credits")?;

    let normal_path = args.out_dir.join("artist_data.txt");
    let loose_path = args.out_dir.join("stupid_artist_data.txt");
    let mut normal_out = BufWriter::new(
        File::create(&normal_path)
            .with_context(|| format!("creating {}", normal_path.display()))?,
    );
    let mut loose_out = BufWriter::new(
        File::create(&loose_path)
            .with_context(|| format!("creating {}", loose_path.display()))?,
    );

    let mut normal_count = 0u64;
    let mut loose_count = 0u64;
    for (artist_credit_id, artist_credit_name) in &rows {
        if let Some(text) = encode(artist_credit_name) {
            write_record(&mut normal_out, *artist_credit_id, &text)?;
            normal_count += 1;
        }
        if let Some(text) = encode_loose(artist_credit_name) {
            write_record(&mut loose_out, *artist_credit_id, &text)?;
            loose_count += 1;
        }
    }

    normal_out.flush()?;
    loose_out.flush()?;

    eprintln!(
        "export-artist-data: {normal_count} entries -> {}, {loose_count} entries -> {}",
        normal_path.display(),
        loose_path.display()
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("export-artist-data: fatal: {err:#}");
            ExitCode::FAILURE
        }
    }
}
