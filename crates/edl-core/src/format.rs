use crate::error::{EdlError, Result};
use crate::types::Indicator;
use csv::QuoteStyle;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Key under which the JSON encoding stores its single aggregated fragment.
pub const JSON_LIST_KEY: &str = "iocs_list";

/// Wire encoding of the served list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// One indicator value per line.
    #[default]
    Text,
    /// Header line, then one double-quoted CSV row per indicator.
    Csv,
    /// A single JSON array holding every indicator object.
    Json,
    /// One compact JSON object per line.
    JsonSeq,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::JsonSeq => "json-seq",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Json => "application/json",
            _ => "text/plain",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = EdlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            "json-seq" | "json_seq" => Ok(OutputFormat::JsonSeq),
            other => Err(EdlError::Format(format!(
                "Unknown output format \"{}\". Must be one of: text, csv, json, json-seq",
                other
            ))),
        }
    }
}

pub fn text_fragment(ioc: &Indicator) -> String {
    ioc.value().to_string()
}

pub fn json_seq_fragment(ioc: &Indicator) -> Result<String> {
    Ok(serde_json::to_string(&ioc.to_json())?)
}

/// CSV header built from the first indicator's field names.
pub fn csv_header(first: &Indicator) -> Result<String> {
    csv_line(first.field_names(), QuoteStyle::Necessary)
}

/// One CSV row with the indicator's values for `columns`, every field quoted.
pub fn csv_row(ioc: &Indicator, columns: &[String]) -> Result<String> {
    let fields: Vec<String> = columns
        .iter()
        .map(|c| ioc.field(c).as_ref().map(field_text).unwrap_or_default())
        .collect();
    csv_line(fields, QuoteStyle::Always)
}

/// Every indicator object as one JSON array, indented by four spaces.
pub fn json_list(iocs: &[Indicator]) -> Result<String> {
    let values: Vec<Value> = iocs.iter().map(Indicator::to_json).collect();
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    values.serialize(&mut ser)?;
    String::from_utf8(buf).map_err(|e| EdlError::Format(e.to_string()))
}

fn field_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn csv_line<I, T>(fields: I, style: QuoteStyle) -> Result<String>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .quote_style(style)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(fields)?;
    let bytes = writer
        .into_inner()
        .map_err(|e| EdlError::Format(e.to_string()))?;
    let line = String::from_utf8(bytes).map_err(|e| EdlError::Format(e.to_string()))?;
    Ok(line.trim_end_matches('\n').to_string())
}
