use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use serde_json::{Map, Value};
use workoutfit::decode::{FitFile, decode};
use workoutfit::interpret::interpret;

/// Dumps the messages of a FIT file as JSON
///
/// Useful for comparing what a device or planning app wrote against what the
/// library makes of it.
#[derive(Parser)]
struct Cli {
    /// FIT file to dump
    input: PathBuf,

    /// Print fields by profile name instead of raw field number
    #[clap(long, short, action)]
    named: bool,
}

#[derive(Serialize)]
struct NamedMessage {
    message: String,
    fields: Map<String, Value>,
}

fn named_messages(file: &FitFile) -> Vec<NamedMessage> {
    file.messages
        .iter()
        .map(|m| NamedMessage {
            message: m
                .kind()
                .map(|k| k.to_string())
                .unwrap_or_else(|| m.global_message_number.to_string()),
            fields: interpret(m)
                .iter()
                .map(|(key, reading)| (key.to_string(), Value::String(reading.to_string())))
                .collect(),
        })
        .collect()
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let bytes = std::fs::read(&args.input).context("Reading the FIT input file")?;
    let file = decode(&bytes).context("Decoding the FIT input file")?;

    let json = if args.named {
        serde_json::to_string_pretty(&named_messages(&file))?
    } else {
        serde_json::to_string_pretty(&file)?
    };
    println!("{json}");
    Ok(())
}
