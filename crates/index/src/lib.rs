use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

/// One RFP posting as read from the corpus JSONL: a flat mapping of field
/// name to value. `description` is the embedding subject; everything else is
/// metadata carried through untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct RfpRecord {
    pub fields: Map<String, Value>,
}

pub const DESCRIPTION_FIELD: &str = "description";
pub const POSTING_ID_FIELD: &str = "postingId";

impl RfpRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn description(&self) -> Option<&str> {
        self.fields.get(DESCRIPTION_FIELD).and_then(Value::as_str)
    }

    /// Records without a non-empty description are not eligible for indexing.
    pub fn has_description(&self) -> bool {
        self.description()
            .map(|text| !text.trim().is_empty())
            .unwrap_or(false)
    }

    pub fn posting_id(&self) -> Option<&str> {
        self.fields
            .get(POSTING_ID_FIELD)
            .and_then(Value::as_str)
            .filter(|id| !id.trim().is_empty())
    }

    /// The identifier this record is stored under in the vector index and
    /// looked up by when scoring. Defaults to the posting id; records without
    /// one fall back to their zero-based corpus position, which makes the
    /// corpus snapshot part of the identity contract.
    pub fn stable_key(&self, position: usize) -> String {
        match self.posting_id() {
            Some(id) => id.to_string(),
            None => position.to_string(),
        }
    }

    /// All fields except the description.
    pub fn metadata(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .filter(|(key, _)| key.as_str() != DESCRIPTION_FIELD)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

/// A capability statement used as a retrieval probe against the corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillSet {
    pub text: String,
    #[serde(flatten, default)]
    pub extra: Map<String, Value>,
}

/// One retrieved match, resolved back to the corpus record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchEntry {
    pub vector_id: String,
    pub posting_id: String,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Top-k result for one skill-set probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeMatches {
    pub probe_index: usize,
    pub skills: String,
    pub matches: Vec<MatchEntry>,
}

/// Output row of a respond run: the original metadata plus the aggregated
/// score and the generated response slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredRfp {
    pub score: f32,
    pub response: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

pub struct JsonlWriter<W> {
    writer: W,
}

impl<W: Write> JsonlWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write_record<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let mut buf = serde_json::to_vec(record)?;
        buf.push(b'\n');
        self.writer.write_all(&buf)?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: T = serde_json::from_str(&line).context("invalid jsonl entry")?;
        records.push(record);
    }
    Ok(records)
}

/// Reads a JSONL file skipping malformed lines instead of failing the run.
/// Returns the parsed records and the 1-based line numbers that were skipped
/// so the caller can log them.
pub fn read_jsonl_lossy<T: DeserializeOwned>(path: &Path) -> Result<(Vec<T>, Vec<usize>)> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();
    let mut skipped = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(&line) {
            Ok(record) => records.push(record),
            Err(_) => skipped.push(number + 1),
        }
    }
    Ok((records, skipped))
}
