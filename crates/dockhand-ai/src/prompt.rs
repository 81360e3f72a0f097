//! Prompt construction shared by all providers.

use crate::AnalyzeRequest;

/// System instruction for document analysis.
pub const SYSTEM_PROMPT: &str = "You are a document analysis assistant. Analyze the provided document text and suggest:
1. Tags that categorize this document (e.g., invoice, receipt, contract, medical, insurance, tax, bank)
2. The correspondent (sender/recipient organization or person)

IMPORTANT:
- Prefer existing tags/correspondents when they match
- Only suggest new ones if no existing option fits well
- Assign confidence scores (0.0-1.0) based on how certain you are
- Provide brief reasoning for each suggestion
- Suggest 1-5 tags maximum, focusing on the most relevant
- Suggest exactly one correspondent (or omit if unclear)

Your response must be valid JSON matching the schema.";

/// Build the user prompt with taxonomy context and document text.
pub fn build_prompt(request: &AnalyzeRequest) -> String {
    let mut prompt = String::new();

    prompt.push_str("## Existing Tags\n");
    if request.existing_tags.is_empty() {
        prompt.push_str("(none yet)\n");
    } else {
        for tag in &request.existing_tags {
            prompt.push_str("- ");
            prompt.push_str(tag);
            prompt.push('\n');
        }
    }

    prompt.push_str("\n## Existing Correspondents\n");
    if request.correspondents.is_empty() {
        prompt.push_str("(none yet)\n");
    } else {
        for correspondent in &request.correspondents {
            prompt.push_str("- ");
            prompt.push_str(correspondent);
            prompt.push('\n');
        }
    }

    prompt.push_str("\n## Document Text (first pages)\n");
    prompt.push_str(&request.text_content);

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_build_prompt_with_taxonomy() {
        let mut request = AnalyzeRequest::new(Uuid::new_v4(), "Invoice #42".to_string());
        request.existing_tags = vec!["invoice".into(), "tax".into()];
        request.correspondents = vec!["Acme".into()];

        let prompt = build_prompt(&request);
        assert!(prompt.contains("- invoice\n"));
        assert!(prompt.contains("- tax\n"));
        assert!(prompt.contains("- Acme\n"));
        assert!(prompt.ends_with("Invoice #42"));
        assert!(!prompt.contains("(none yet)"));
    }

    #[test]
    fn test_build_prompt_empty_taxonomy() {
        let request = AnalyzeRequest::new(Uuid::new_v4(), "text".to_string());
        let prompt = build_prompt(&request);
        assert_eq!(prompt.matches("(none yet)").count(), 2);
    }
}
