use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;

use formula_biff_records::framing::{substream_offsets, PhysicalRecordIter};
use formula_biff_records::registry::record_name;
use formula_biff_records::{
    DecodeOptions, DecodePolicy, Record, RecordStreamDecoder, SubstreamRecords,
};
use formula_binio::LeReader;

const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

#[derive(Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Dump the BIFF8 records of a legacy `.xls` workbook (or a raw workbook stream).
#[derive(Parser)]
#[command(about = "List the records of a BIFF8 workbook stream.")]
struct Args {
    /// `.xls` compound file, or a file holding a bare workbook stream.
    input: PathBuf,

    /// List physical frames instead of decoded logical records.
    #[arg(long)]
    physical: bool,

    /// Keep records that fail to decode as raw bytes instead of stopping.
    #[arg(long)]
    degrade: bool,

    /// Stop after the first EOF record.
    #[arg(long)]
    stop_at_eof: bool,

    /// Walk only the N-th substream (0 is the workbook globals), keeping whatever decodes.
    #[arg(long, value_name = "N", conflicts_with = "physical")]
    substream: Option<usize>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    offset: u64,
    sid: u16,
    name: &'static str,
    size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<&'a Record>,
}

fn read_workbook_stream(path: &PathBuf) -> Result<Vec<u8>> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    if !bytes.starts_with(&OLE_MAGIC) {
        return Ok(bytes);
    }

    let mut comp = cfb::CompoundFile::open(std::io::Cursor::new(bytes))
        .with_context(|| format!("open compound file {}", path.display()))?;
    for candidate in ["/Workbook", "/Book"] {
        if let Ok(mut stream) = comp.open_stream(candidate) {
            let mut out = Vec::new();
            stream
                .read_to_end(&mut out)
                .with_context(|| format!("read {candidate} stream"))?;
            return Ok(out);
        }
    }
    anyhow::bail!("missing workbook stream (expected `Workbook` or `Book`)")
}

fn dump_physical(stream: &[u8], format: &OutputFormat, out: &mut impl Write) -> Result<()> {
    let mut entries = Vec::new();
    for frame in PhysicalRecordIter::new(stream) {
        let frame = frame?;
        let name = record_name(frame.sid).unwrap_or("UNKNOWN");
        match format {
            OutputFormat::Text => writeln!(
                out,
                "{:>10}  0x{:04X}  {:<16} {:>5} bytes",
                frame.offset,
                frame.sid,
                name,
                frame.data.len()
            )?,
            OutputFormat::Json => entries.push(JsonRecord {
                offset: frame.offset as u64,
                sid: frame.sid,
                name,
                size: frame.data.len(),
                record: None,
            }),
        }
    }
    if matches!(format, OutputFormat::Json) {
        serde_json::to_writer_pretty(&mut *out, &entries)?;
        writeln!(out)?;
    }
    Ok(())
}

fn dump_logical(stream: &[u8], args: &Args, out: &mut impl Write) -> Result<()> {
    let options = DecodeOptions {
        policy: if args.degrade {
            DecodePolicy::Degrade
        } else {
            DecodePolicy::Strict
        },
        stop_at_eof: args.stop_at_eof,
        ..DecodeOptions::default()
    };
    let mut decoder = RecordStreamDecoder::with_options(LeReader::new(stream), options);

    let mut records = Vec::new();
    while let Some(record) = decoder.next() {
        let offset = decoder.record_offset();
        let record = record.with_context(|| format!("decode record after offset {offset}"))?;
        records.push((offset, record));
    }
    print_records(&records, &args.format, out)
}

fn dump_substream(
    stream: &[u8],
    index: usize,
    format: &OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let offsets = substream_offsets(stream);
    let Some(&start) = offsets.get(index) else {
        anyhow::bail!("substream {index} not found ({} BOF records)", offsets.len());
    };
    let mut walk = SubstreamRecords::new(stream, start)?;
    let mut records = Vec::new();
    while let Some(record) = walk.next() {
        records.push((walk.record_offset(), record));
    }
    print_records(&records, format, out)
}

fn print_records(
    records: &[(u64, Record)],
    format: &OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for (offset, record) in records {
                writeln!(
                    out,
                    "{:>10}  0x{:04X}  {:<16} {:?}",
                    offset,
                    record.sid(),
                    record.name(),
                    record
                )?;
            }
        }
        OutputFormat::Json => {
            let entries: Vec<JsonRecord<'_>> = records
                .iter()
                .map(|(offset, record)| JsonRecord {
                    offset: *offset,
                    sid: record.sid(),
                    name: record.name(),
                    size: record.payload().len(),
                    record: Some(record),
                })
                .collect();
            serde_json::to_writer_pretty(&mut *out, &entries)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let stream = read_workbook_stream(&args.input)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if args.physical {
        dump_physical(&stream, &args.format, &mut out)
    } else if let Some(index) = args.substream {
        dump_substream(&stream, index, &args.format, &mut out)
    } else {
        dump_logical(&stream, &args, &mut out)
    }
}
