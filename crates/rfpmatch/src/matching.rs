use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};

use rfpmatch_index::{
    read_jsonl, read_jsonl_lossy, JsonlWriter, MatchEntry, ProbeMatches, RfpRecord, SkillSet,
};
use rfpmatch_vector::Matcher;

use crate::config::PipelineConfig;
use crate::logging;

pub fn run(
    corpus: String,
    skills: String,
    namespace: String,
    top_k: usize,
    output: String,
    index_dir: String,
    config: &PipelineConfig,
) -> Result<()> {
    let (records, malformed): (Vec<RfpRecord>, Vec<usize>) =
        read_jsonl_lossy(&PathBuf::from(&corpus))
            .with_context(|| format!("failed to read corpus from {corpus}"))?;
    for line in &malformed {
        logging::stage("match", format!("skipping malformed record at line {line}"));
    }
    let probes: Vec<SkillSet> = read_jsonl(&PathBuf::from(&skills))
        .with_context(|| format!("failed to read skill sets from {skills}"))?;
    logging::info(format!(
        "matching {} probes against namespace '{}' (top_k={})",
        probes.len(),
        namespace,
        top_k
    ));

    let embeddings = config.embedding_client()?;
    let index = config.vector_index(&index_dir)?;
    let matcher = Matcher::new(&embeddings, index.as_ref());
    let lookup = corpus_lookup(&records);

    // collected in memory and serialized once at the end of the run
    let mut report: Vec<ProbeMatches> = Vec::new();
    for (probe_index, probe) in probes.iter().enumerate() {
        let matches = match matcher.top_k(&probe.text, &namespace, top_k) {
            Ok(matches) => matches,
            Err(err) => {
                logging::stage(
                    "match",
                    format!("probe {probe_index} failed, skipping: {err}"),
                );
                continue;
            }
        };
        let entries: Vec<MatchEntry> = matches
            .into_iter()
            .map(|hit| {
                let record = lookup.get(hit.id.as_str());
                MatchEntry {
                    posting_id: record
                        .and_then(|r| r.posting_id())
                        .unwrap_or(&hit.id)
                        .to_string(),
                    description: record.and_then(|r| r.description()).map(str::to_string),
                    vector_id: hit.id,
                    score: hit.score,
                }
            })
            .collect();
        for (rank, entry) in entries.iter().enumerate() {
            logging::stage(
                "match",
                format!(
                    "{}-{}. posting {} similarity {:.4}",
                    probe_index + 1,
                    rank + 1,
                    entry.posting_id,
                    entry.score
                ),
            );
        }
        report.push(ProbeMatches {
            probe_index,
            skills: probe.text.clone(),
            matches: entries,
        });
    }

    let file = File::create(&output).with_context(|| format!("failed to create {output}"))?;
    let mut writer = JsonlWriter::new(BufWriter::new(file));
    for probe_matches in &report {
        writer.write_record(probe_matches)?;
    }
    logging::info(format!(
        "match report for {} probe(s) written to {output}",
        report.len()
    ));
    Ok(())
}

/// Index the corpus snapshot by the same stable key used at ingest time.
fn corpus_lookup(records: &[RfpRecord]) -> HashMap<String, &RfpRecord> {
    records
        .iter()
        .enumerate()
        .map(|(position, record)| (record.stable_key(position), record))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn local_config() -> PipelineConfig {
        PipelineConfig {
            embedding_provider: "hash".to_string(),
            embedding_model: "hash".to_string(),
            vector_backend: "jsonl".to_string(),
            llm_provider: rfpmatch_llm::LlmProvider::Local,
            llm_model: "local".to_string(),
            llm_max_tokens: 2000,
            openai_api_key: None,
            anthropic_api_key: None,
            pinecone_api_key: None,
            pinecone_host: None,
            retry: rfpmatch_core::RetryPolicy::new(1, std::time::Duration::ZERO),
        }
    }

    #[test]
    fn match_run_writes_one_report_line_per_probe() {
        let dir = tempdir().unwrap();
        let corpus = dir.path().join("corpus.jsonl");
        let skills = dir.path().join("skills.jsonl");
        let output = dir.path().join("matches.jsonl");
        let index_dir = dir.path().join("index");
        std::fs::write(
            &corpus,
            concat!(
                "{\"postingId\":\"P-0\",\"description\":\"hydro plant turbine overhaul\"}\n",
                "{\"postingId\":\"P-1\",\"description\":\"billing system modernization\"}\n",
            ),
        )
        .unwrap();
        std::fs::write(
            &skills,
            "{\"text\":\"turbine maintenance\"}\n{\"text\":\"billing software\"}\n",
        )
        .unwrap();
        let config = local_config();
        crate::ingest::run(
            corpus.to_string_lossy().into_owned(),
            "rfp".to_string(),
            100,
            index_dir.to_string_lossy().into_owned(),
            &config,
        )
        .unwrap();
        run(
            corpus.to_string_lossy().into_owned(),
            skills.to_string_lossy().into_owned(),
            "rfp".to_string(),
            1,
            output.to_string_lossy().into_owned(),
            index_dir.to_string_lossy().into_owned(),
            &config,
        )
        .unwrap();
        let report: Vec<ProbeMatches> = read_jsonl(&output).unwrap();
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].matches.len(), 1);
        assert_eq!(report[0].matches[0].posting_id, "P-0");
        assert_eq!(report[1].matches[0].posting_id, "P-1");
    }

    #[test]
    fn corpus_lookup_uses_stable_keys() {
        let records: Vec<RfpRecord> = vec![
            serde_json::from_str("{\"postingId\":\"P-9\",\"description\":\"x\"}").unwrap(),
            serde_json::from_str("{\"description\":\"y\"}").unwrap(),
        ];
        let lookup = corpus_lookup(&records);
        assert!(lookup.contains_key("P-9"));
        assert!(lookup.contains_key("1"));
    }
}
