//! Prompt templates for generation.

use radmem_core::{truncate_chars, KnowledgeRecord, ScanRecord};
use radmem_db::Scored;

use crate::strategy::Prompt;

/// System context for every radiology generation call.
pub const RADIOLOGY_SYSTEM: &str = "You are a radiology assistant. Ground every statement in the \
reference cases provided. Be concise, note uncertainty, and remind the reader that findings \
must be confirmed by a qualified radiologist.";

fn case_line(idx: usize, case: &KnowledgeRecord) -> String {
    match &case.diagnosis {
        Some(d) => format!("Case {} [{}]: {}", idx + 1, d, case.report_text),
        None => format!("Case {}: {}", idx + 1, case.report_text),
    }
}

/// Reference cases found by image similarity, annotated with their scores.
pub fn scored_context(hits: &[Scored<KnowledgeRecord>]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| format!("{} (similarity {:.2})", case_line(i, &hit.record), hit.score))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reference cases found by text similarity.
pub fn plain_context(hits: &[Scored<KnowledgeRecord>]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| case_line(i, &hit.record))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn diagnose_prompt(context: &str, question: &str) -> Prompt {
    let context = if context.is_empty() {
        "No similar reference cases were found."
    } else {
        context
    };
    Prompt {
        system: RADIOLOGY_SYSTEM.to_string(),
        user: format!(
            "Similar reference cases:\n{}\n\nPatient question: {}\n\n\
             Explain the likely findings in plain language.",
            context, question
        ),
    }
}

/// Report texts of supporting cases, joined and bounded.
pub fn narrative(hits: &[Scored<KnowledgeRecord>], max_chars: usize) -> String {
    let joined = hits
        .iter()
        .map(|h| h.record.report_text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    truncate_chars(&joined, max_chars)
}

pub fn compare_prompt(
    current: &ScanRecord,
    current_narrative: &str,
    previous: &ScanRecord,
    previous_narrative: &str,
    question: &str,
) -> Prompt {
    Prompt {
        system: RADIOLOGY_SYSTEM.to_string(),
        user: format!(
            "Current scan ({}, {}):\nNotes: {}\nSimilar cases: {}\n\n\
             Previous scan ({}, {}):\nNotes: {}\nSimilar cases: {}\n\n\
             Patient question: {}\n\n\
             Describe the differences between the two scans, whether the condition has \
             improved or progressed, the clinical significance, and a follow-up recommendation.",
            current.scan_type,
            current.scan_date,
            current.report_text,
            current_narrative,
            previous.scan_type,
            previous.scan_date,
            previous.report_text,
            previous_narrative,
            question
        ),
    }
}

pub fn analysis_prompt(scan: &ScanRecord, context: &str) -> Prompt {
    Prompt {
        system: RADIOLOGY_SYSTEM.to_string(),
        user: format!(
            "A {} scan was uploaded with notes: {}\n\nMost similar reference cases:\n{}\n\n\
             Write a short preliminary analysis of the uploaded scan.",
            scan.scan_type, scan.report_text, context
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn hit(text: &str, diagnosis: Option<&str>, score: f32) -> Scored<KnowledgeRecord> {
        Scored {
            record: KnowledgeRecord {
                id: Uuid::new_v4(),
                report_text: text.to_string(),
                diagnosis: diagnosis.map(str::to_string),
                scan_type: None,
                image_path: None,
            },
            score,
        }
    }

    #[test]
    fn test_scored_context_includes_scores() {
        let ctx = scored_context(&[hit("Effusion.", Some("effusion"), 0.912), hit("Clear.", None, 0.5)]);
        assert_eq!(
            ctx,
            "Case 1 [effusion]: Effusion. (similarity 0.91)\nCase 2: Clear. (similarity 0.50)"
        );
    }

    #[test]
    fn test_plain_context_has_no_scores() {
        let ctx = plain_context(&[hit("Effusion.", None, 0.9)]);
        assert_eq!(ctx, "Case 1: Effusion.");
    }

    #[test]
    fn test_narrative_is_bounded() {
        let long = "x".repeat(1000);
        assert_eq!(narrative(&[hit(&long, None, 1.0)], 400).chars().count(), 400);
    }

    #[test]
    fn test_diagnose_prompt_without_cases() {
        let p = diagnose_prompt("", "is this bad?");
        assert!(p.user.contains("No similar reference cases"));
        assert!(p.user.contains("is this bad?"));
    }
}
