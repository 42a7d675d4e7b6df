use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};

use rfpmatch_index::{read_jsonl_lossy, JsonlWriter, RfpRecord};
use rfpmatch_llm::{LlmClient, LlmRequest};

use crate::config::PipelineConfig;
use crate::logging;

const CLASSIFIER_SYSTEM_PROMPT: &str = "You are a classifier that determines if a RFP \
description is related to the utility industry (electricity, water, gas, etc.). \
Reply with only 'yes' or 'no'.";

pub fn run(input: String, output: String, classify: bool, config: &PipelineConfig) -> Result<()> {
    let input_path = PathBuf::from(&input);
    let (records, malformed): (Vec<RfpRecord>, Vec<usize>) = read_jsonl_lossy(&input_path)
        .with_context(|| format!("failed to read corpus from {input}"))?;
    for line in &malformed {
        logging::stage("extract", format!("skipping malformed record at line {line}"));
    }
    logging::info(format!("loaded {} records from {input}", records.len()));

    let classifier = if classify {
        Some(config.llm_client()?)
    } else {
        None
    };

    let file = File::create(&output).with_context(|| format!("failed to create {output}"))?;
    let mut writer = JsonlWriter::new(BufWriter::new(file));
    let mut kept = 0usize;
    let mut dropped_empty = 0usize;
    let mut dropped_classifier = 0usize;
    for (position, record) in records.iter().enumerate() {
        if !record.has_description() {
            dropped_empty += 1;
            logging::verbose(format!("record {position} has no description, skipping"));
            continue;
        }
        if let Some(client) = &classifier {
            let description = record.description().unwrap_or_default();
            if !is_utility_industry(client, description, position) {
                dropped_classifier += 1;
                continue;
            }
        }
        writer.write_record(record)?;
        kept += 1;
    }
    logging::stage(
        "extract",
        format!(
            "kept {kept} records ({dropped_empty} without description, {dropped_classifier} rejected by classifier, {} malformed)",
            malformed.len()
        ),
    );
    logging::info(format!("filtered corpus written to {output}"));
    Ok(())
}

/// A classification error counts as "no": the record is excluded and the
/// failure logged, but the run continues.
fn is_utility_industry(client: &LlmClient, description: &str, position: usize) -> bool {
    let request = LlmRequest {
        system: Some(CLASSIFIER_SYSTEM_PROMPT.to_string()),
        user: description.to_string(),
        temperature: Some(0.0),
    };
    match client.chat_blocking(&request) {
        Ok(response) => response.content.trim().to_lowercase() == "yes",
        Err(err) => {
            logging::stage(
                "extract",
                format!("classifier call failed for record {position}: {err}"),
            );
            false
        }
    }
}
