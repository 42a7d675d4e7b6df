use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};

use rfpmatch_core::{rank_by_score, top_fraction_count, RetryPolicy};
use rfpmatch_index::{read_jsonl, read_jsonl_lossy, JsonlWriter, RfpRecord, ScoredRfp, SkillSet};
use rfpmatch_llm::{LlmClient, LlmRequest};
use rfpmatch_vector::{aggregate_scores, Matcher};

use crate::config::PipelineConfig;
use crate::logging;

const RESPONSE_TEMPLATE: &str = "\nGiven the Summary of Amplytics, write an RFP response that describes how Amplytics can address the requirements. \nThe response should follow the predefined template.\n\nSummary of Amplytics:\n{summary}\n\nPredefined Template:\n'''\nSubject: Response to [RFP Title / Reference Number]\n\nDear [Recipient Name],\n\nWe are pleased to submit our response to [RFP Title / Reference Number]. Amplytics, a consulting firm specializing in data-driven decision-making, offers innovative solutions tailored to the utilities industry. With over [X years] of experience, we have successfully helped utilities optimize their operations and achieve sustainable growth through advanced data analytics, machine learning, and digital transformation.\n\nIntroduction & Company Overview:\nAmplytics transforms utilities businesses into data-powered organizations by integrating robust analytics, strategic advisory, and cutting-edge technology. Our core capabilities include: \n[RFP-Specific Capabilities \u{2013} Adjust as needed]\n\nUnderstanding of RFP Scope and Requirements:\nWe understand that [Agency/Organization Name] seeks [Brief Summary of RFP Requirements]. Our team is well-equipped to address the challenges presented, including:\n\u{2022} [Key Requirement 1 \u{2013} From RFP]\n\u{2022} [Key Requirement 2 \u{2013} From RFP]\n\u{2022} [Key Requirement 3 \u{2013} From RFP]\n\nProposed Approach & Methodology:\nOur phased approach ensures efficient implementation and alignment with your organizational goals:\n[Customize Phases Based on RFP Requirements]\n\nAmplytics' Value Proposition:\n[Reiterate Skills & Expertise Relevant to RFP]\n\nRelevant Experience & Past Performance:\n[Insert Relevant Case Studies Related to RFP]\n\nDeliverables Summary:\n[Summarize Key Deliverables Aligned with RFP]\n\nTeam & Capabilities:\n[Insert Team Member Profiles \u{2013} Adjust as Needed]\n\nConclusion:\nWe are confident that Amplytics is the ideal partner for [Agency/Organization Name]'s [RFP Objective]. Our expertise and tailored solutions will ensure your objectives are achieved efficiently and effectively.\n\nPlease feel free to reach out with any questions or further information.\n\nBest regards,\n[Your Full Name]\n[Your Title]\nAmplytics\n[Contact Information]\n'''\n\nOnly generate the RFP response.\n";

const NO_DESCRIPTION_RESPONSE: &str =
    "No valid description available for response generation.";

#[allow(clippy::too_many_arguments)]
pub fn run(
    corpus: String,
    skills: String,
    namespace: String,
    top_fraction: f64,
    top_k: Option<usize>,
    delay_ms: u64,
    output: String,
    index_dir: String,
    config: &PipelineConfig,
) -> Result<()> {
    let (records, malformed): (Vec<RfpRecord>, Vec<usize>) =
        read_jsonl_lossy(&PathBuf::from(&corpus))
            .with_context(|| format!("failed to read corpus from {corpus}"))?;
    for line in &malformed {
        logging::stage("respond", format!("skipping malformed record at line {line}"));
    }
    let probes: Vec<SkillSet> = read_jsonl(&PathBuf::from(&skills))
        .with_context(|| format!("failed to read skill sets from {skills}"))?;
    logging::info(format!(
        "scoring {} records against {} skill sets in namespace '{}'",
        records.len(),
        probes.len(),
        namespace
    ));

    let embeddings = config.embedding_client()?;
    let index = config.vector_index(&index_dir)?;
    let matcher = Matcher::new(&embeddings, index.as_ref());
    let retrieval_depth = top_k.unwrap_or_else(|| records.len().max(1));
    let board = aggregate_scores(&probes, &matcher, &namespace, retrieval_depth, |idx, err| {
        logging::stage("respond", format!("probe {idx} failed, skipping: {err}"))
    });
    logging::info(format!("aggregated scores for {} records", board.len()));

    let ranked = rank_by_score(&records, &board);
    let respond_count = top_fraction_count(records.len(), top_fraction);
    logging::info(format!(
        "drafting responses for the top {} of {} records ({:.1}%)",
        respond_count,
        records.len(),
        top_fraction * 100.0
    ));

    let llm = config.llm_client()?;
    let mut responses: HashMap<usize, String> = HashMap::new();
    for (position, entry) in ranked.iter().take(respond_count).enumerate() {
        let record = &records[entry.corpus_index];
        logging::stage(
            "respond",
            format!("drafting response for {} (score {:.4})", entry.key, entry.score),
        );
        let response = match record.description().filter(|d| !d.trim().is_empty()) {
            Some(description) => draft_response(&llm, description, &config.retry),
            None => NO_DESCRIPTION_RESPONSE.to_string(),
        };
        responses.insert(entry.corpus_index, response);
        // pace remote calls; no reason to wait after the final draft
        if position + 1 < respond_count && delay_ms > 0 {
            thread::sleep(Duration::from_millis(delay_ms));
        }
    }

    let file = File::create(&output).with_context(|| format!("failed to create {output}"))?;
    let mut writer = JsonlWriter::new(BufWriter::new(file));
    for entry in &ranked {
        let row = ScoredRfp {
            score: entry.score,
            response: responses.remove(&entry.corpus_index).unwrap_or_default(),
            fields: records[entry.corpus_index].fields.clone(),
        };
        writer.write_record(&row)?;
    }
    log_score_summary(&ranked);
    logging::info(format!(
        "{} record(s) written to {output}, {} with generated responses",
        ranked.len(),
        respond_count
    ));
    Ok(())
}

fn draft_response(llm: &LlmClient, description: &str, retry: &RetryPolicy) -> String {
    let request = LlmRequest {
        system: None,
        user: RESPONSE_TEMPLATE.replace("{summary}", description),
        temperature: Some(0.7),
    };
    let outcome = retry.run(
        || llm.chat_blocking(&request),
        |attempt, err| {
            logging::stage(
                "respond",
                format!("generation attempt {attempt} failed: {err}"),
            )
        },
    );
    match outcome {
        Ok(reply) => {
            logging::verbose(format!("draft consumed {} token(s)", reply.total_tokens()));
            reply.content.trim().to_string()
        }
        Err(err) => format!("Error generating response: {err}"),
    }
}

fn log_score_summary(ranked: &[rfpmatch_core::RankedRfp]) {
    if ranked.is_empty() {
        return;
    }
    let highest = ranked.first().map(|r| r.score).unwrap_or(0.0);
    let lowest = ranked.last().map(|r| r.score).unwrap_or(0.0);
    let mean = ranked.iter().map(|r| r.score as f64).sum::<f64>() / ranked.len() as f64;
    let positive = ranked.iter().filter(|r| r.score > 0.0).count();
    logging::info(format!(
        "score statistics: highest {:.4}, lowest {:.4}, mean {:.4}, above zero {}",
        highest, lowest, mean, positive
    ));
    for entry in ranked.iter().take(5) {
        logging::verbose(format!("top match {} scored {:.4}", entry.key, entry.score));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfpmatch_index::read_jsonl as read_rows;
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
            retry: RetryPolicy::new(1, Duration::ZERO),
        }
    }

    fn write_fixtures(dir: &std::path::Path) -> (String, String) {
        let corpus = dir.join("corpus.jsonl");
        let skills = dir.join("skills.jsonl");
        std::fs::write(
            &corpus,
            concat!(
                "{\"postingId\":\"P-0\",\"description\":\"electric grid maintenance and repair\"}\n",
                "{\"postingId\":\"P-1\",\"description\":\"school cafeteria catering\"}\n",
                "{\"postingId\":\"P-2\",\"description\":\"substation grid maintenance upgrade\"}\n",
                "{\"postingId\":\"P-3\",\"description\":\"landscaping for city parks\"}\n",
            ),
        )
        .unwrap();
        std::fs::write(&skills, "{\"text\":\"grid maintenance analytics\"}\n").unwrap();
        (
            corpus.to_string_lossy().into_owned(),
            skills.to_string_lossy().into_owned(),
        )
    }

    #[test]
    fn respond_writes_every_record_and_drafts_only_the_top_fraction() {
        let dir = tempdir().unwrap();
        let (corpus, skills) = write_fixtures(dir.path());
        let index_dir = dir.path().join("index").to_string_lossy().into_owned();
        let output = dir.path().join("responses.jsonl").to_string_lossy().into_owned();
        let config = local_config();
        crate::ingest::run(corpus.clone(), "rfp".to_string(), 100, index_dir.clone(), &config)
            .unwrap();
        run(
            corpus,
            skills,
            "rfp".to_string(),
            0.25,
            None,
            0,
            output.clone(),
            index_dir,
            &config,
        )
        .unwrap();
        let rows: Vec<ScoredRfp> = read_rows(&PathBuf::from(&output)).unwrap();
        assert_eq!(rows.len(), 4);
        // ceil(4 * 0.25) = 1 draft, the best-scoring record, written first
        assert!(rows[0].response.starts_with("Subject:"));
        assert!(rows.iter().skip(1).all(|row| row.response.is_empty()));
        assert!(rows.windows(2).all(|pair| pair[0].score >= pair[1].score));
    }

    #[test]
    fn record_without_description_gets_the_placeholder_response() {
        let config = local_config();
        let llm = config.llm_client().unwrap();
        // blank description short-circuits before any provider call
        let record: RfpRecord = serde_json::from_str("{\"description\":\"   \"}").unwrap();
        let response = match record.description().filter(|d| !d.trim().is_empty()) {
            Some(description) => draft_response(&llm, description, &config.retry),
            None => NO_DESCRIPTION_RESPONSE.to_string(),
        };
        assert_eq!(response, NO_DESCRIPTION_RESPONSE);
    }

    #[test]
    fn template_embeds_the_description() {
        let filled = RESPONSE_TEMPLATE.replace("{summary}", "ten-year analytics roadmap");
        assert!(filled.contains("ten-year analytics roadmap"));
        assert!(!filled.contains("{summary}"));
        assert!(filled.contains("Only generate the RFP response."));
    }
}
