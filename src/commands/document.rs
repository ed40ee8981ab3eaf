//! `read` and `write` commands.

use super::output_error;
use crate::cli::{ReadArgs, WriteArgs};
use safejson::config::Config;
use safejson::error::{Result, StoreError};
use serde_json::{Map, Value};
use std::io::{Read, Write};

pub(super) fn cmd_read(config: &Config, args: ReadArgs, out: &mut dyn Write) -> Result<()> {
    let default = match args.default.as_deref() {
        Some(text) => parse_document(text, "--default")?,
        None => Value::Object(Map::new()),
    };

    let value = config.store().read_or(&args.path, default);
    let rendered = serde_json::to_string_pretty(&value)?;
    writeln!(out, "{}", rendered).map_err(output_error)
}

pub(super) fn cmd_write(config: &Config, args: WriteArgs, out: &mut dyn Write) -> Result<()> {
    let text = match args.json {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| StoreError::io("failed to read document from stdin", e))?;
            buf
        }
    };
    let value = parse_document(&text, "input")?;

    let mut store = config.store();
    if let Some(indent) = args.indent {
        store = store.with_indent(indent);
    }
    store.try_write(&args.path, &value)?;

    writeln!(out, "Wrote {}", args.path.display()).map_err(output_error)
}

fn parse_document(text: &str, source: &str) -> Result<Value> {
    serde_json::from_str(text)
        .map_err(|e| StoreError::Json(format!("{} is not valid JSON: {}", source, e)))
}
