use crate::output::print_json;
use crate::{KeyArgs, OutputFormat};
use anyhow::Context;
use ripple_pipeline::ObjectKey;
use serde::Serialize;

#[derive(Debug, Serialize, PartialEq)]
pub struct KeyView {
    pub stage: u32,
    pub run: String,
    pub timestamp: f64,
    pub shard: String,
    pub bin: String,
    pub file_id: u32,
    pub suffix: String,
    pub ext: String,
    pub format: Option<String>,
}

impl From<&ObjectKey> for KeyView {
    fn from(key: &ObjectKey) -> Self {
        Self {
            stage: key.stage,
            run: key.run.to_string(),
            timestamp: key.run.timestamp(),
            shard: key.shard.to_string(),
            bin: key.bin.to_string(),
            file_id: key.file_id,
            suffix: key.suffix.clone(),
            ext: key.ext.clone(),
            format: key.format().map(|tag| tag.name().to_string()),
        }
    }
}

pub fn handle(args: KeyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let key: ObjectKey = args
        .key
        .parse()
        .with_context(|| format!("parsing {:?}", args.key))?;
    let view = KeyView::from(&key);
    // Text output is JSON too; a key has no better plain rendition
    if !print_json(&view, format)? {
        print_json(&view, OutputFormat::JsonPretty)?;
    }
    Ok(())
}
