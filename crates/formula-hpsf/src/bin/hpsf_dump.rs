use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use serde::Serialize;

use formula_hpsf::codepage::DEFAULT_CODEPAGE;
use formula_hpsf::{is_property_set_stream, ParseOptions, PropertySet, Value};

const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

#[derive(Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Dump the property sets (`SummaryInformation` and friends) of a compound file.
#[derive(Parser)]
#[command(about = "List the property-set streams of an OLE compound file.")]
struct Args {
    /// Compound file, or a file holding a bare property-set stream.
    input: PathBuf,

    /// Only dump this stream (for example `\u0005SummaryInformation`, or `SummaryInformation`).
    #[arg(long)]
    stream: Option<String>,

    /// Codepage for sections that do not declare one.
    #[arg(long, default_value_t = DEFAULT_CODEPAGE)]
    fallback_codepage: u16,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Serialize)]
struct JsonStream<'a> {
    stream: &'a str,
    property_set: &'a PropertySet,
}

/// `(stream path, bytes)` for every property-set stream in the input.
fn read_streams(args: &Args) -> Result<Vec<(String, Vec<u8>)>> {
    let path = &args.input;
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    if !bytes.starts_with(&OLE_MAGIC) {
        return Ok(vec![(path.display().to_string(), bytes)]);
    }

    let mut comp = cfb::CompoundFile::open(std::io::Cursor::new(bytes))
        .with_context(|| format!("open compound file {}", path.display()))?;
    let wanted = args
        .stream
        .as_deref()
        .map(|s| s.trim_start_matches('/').trim_start_matches('\u{5}'));
    let candidates: Vec<String> = comp
        .walk()
        .filter(|entry| entry.is_stream())
        .filter(|entry| match wanted {
            Some(wanted) => entry.name().trim_start_matches('\u{5}') == wanted,
            // Property-set stream names start with U+0005 by convention.
            None => entry.name().starts_with('\u{5}'),
        })
        .map(|entry| entry.path().to_string_lossy().into_owned())
        .collect();

    let mut out = Vec::new();
    for candidate in candidates {
        let mut stream = comp
            .open_stream(&candidate)
            .with_context(|| format!("open stream {candidate:?}"))?;
        let mut data = Vec::new();
        stream
            .read_to_end(&mut data)
            .with_context(|| format!("read stream {candidate:?}"))?;
        if is_property_set_stream(&data) {
            out.push((candidate, data));
        } else {
            log::debug!("skipping {candidate:?}: not a property-set stream");
        }
    }
    Ok(out)
}

fn describe(value: &Value) -> String {
    match value {
        Value::FileTime(ticks) => match value.as_datetime(&Utc) {
            Some(when) => when.to_rfc3339(),
            None => format!("FILETIME({ticks})"),
        },
        Value::Lpstr(s) | Value::Lpwstr(s) => format!("{s:?}"),
        Value::Blob(bytes) | Value::ClipboardData(bytes) => format!("<{} bytes>", bytes.len()),
        other => format!("{other:?}"),
    }
}

fn dump_text(name: &str, set: &PropertySet, out: &mut impl Write) -> Result<()> {
    writeln!(out, "{}", name.escape_debug())?;
    writeln!(
        out,
        "  os version 0x{:08X}, class id {}",
        set.os_version, set.class_id
    )?;
    for section in set.sections() {
        writeln!(out, "  section {}", section.format_id())?;
        if let Some(codepage) = section.codepage() {
            writeln!(out, "    codepage {codepage}")?;
        }
        if let Some(dictionary) = section.dictionary() {
            for (id, entry) in dictionary {
                writeln!(out, "    dictionary {id:>10} = {entry:?}")?;
            }
        }
        for (id, value) in section.properties() {
            let name = section.property_name(id).unwrap_or("?");
            writeln!(out, "    {id:>10}  {name:<24} {}", describe(value))?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let options = ParseOptions {
        fallback_codepage: args.fallback_codepage,
    };

    let mut sets = Vec::new();
    for (name, bytes) in read_streams(&args)? {
        let set = PropertySet::parse_with(&bytes, &options)
            .with_context(|| format!("parse property set {:?}", name))?;
        sets.push((name, set));
    }
    if sets.is_empty() {
        anyhow::bail!("no property-set streams found");
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match args.format {
        OutputFormat::Text => {
            for (name, set) in &sets {
                dump_text(name, set, &mut out)?;
            }
        }
        OutputFormat::Json => {
            let entries: Vec<JsonStream<'_>> = sets
                .iter()
                .map(|(stream, property_set)| JsonStream {
                    stream,
                    property_set,
                })
                .collect();
            serde_json::to_writer_pretty(&mut out, &entries)?;
            writeln!(out)?;
        }
    }
    Ok(())
}
