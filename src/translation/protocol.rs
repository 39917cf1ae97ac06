/*!
 * Wire contract between the pipeline and translation backends.
 *
 * Requests carry the run context, the target language and the chunk's
 * `(index, content)` pairs. Responses map each index to its ordered lines.
 * Matching is always by index, never by position in the response.
 */

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::errors::{ProviderError, ValidationError};

/// One subtitle block as sent to a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceBlock {
    pub index: usize,
    pub content: String,
}

/// Translation request for a single chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRequest {
    /// Shared description of the source material, may be empty
    pub context: String,
    /// Target language name
    pub target_language: String,
    pub blocks: Vec<SourceBlock>,
}

impl TranslationRequest {
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.blocks.iter().map(|b| b.index)
    }
}

/// One translated block as returned by a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedBlock {
    pub index: usize,
    pub lines: Vec<String>,
}

/// Backend answer for a single chunk
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TranslationResponse {
    pub translations: Vec<TranslatedBlock>,
}

/// Check a response against the request it answers.
///
/// The response index set must equal the request index set, each index must
/// appear once and carry at least one line.
pub fn validate_response(
    request: &TranslationRequest,
    response: TranslationResponse,
) -> Result<BTreeMap<usize, Vec<String>>, ValidationError> {
    let expected: BTreeSet<usize> = request.indices().collect();
    let mut translations = BTreeMap::new();

    for block in response.translations {
        if translations.contains_key(&block.index) {
            return Err(ValidationError::DuplicateIndex(block.index));
        }
        translations.insert(block.index, block.lines);
    }

    let unexpected: Vec<usize> = translations
        .keys()
        .filter(|i| !expected.contains(i))
        .copied()
        .collect();
    if !unexpected.is_empty() {
        return Err(ValidationError::UnexpectedIndices(unexpected));
    }

    let missing: Vec<usize> = expected
        .iter()
        .filter(|i| !translations.contains_key(i))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingIndices(missing));
    }

    if let Some((index, _)) = translations
        .iter()
        .find(|(_, lines)| lines.iter().all(|l| l.trim().is_empty()))
    {
        return Err(ValidationError::EmptyTranslation(*index));
    }

    Ok(translations)
}

const CONTEXT_INSTRUCTIONS: &str = r#"You are helping to translate the subtitles of a film or series.
Read the subtitle excerpts below and describe, in a few sentences, the kind of
material it is (genre, setting, tone), who the main characters are and how they
address each other, and any recurring names or terms a translator must keep
consistent. Answer with plain text only."#;

const TRANSLATION_INSTRUCTIONS: &str = r#"You are an expert subtitle translator. Translate every subtitle below into {target_language}.

## Rules
- Keep each translation short enough to be read in the time the subtitle is shown
- Preserve formatting tags, [sound effects] and (parentheticals)
- Never merge or split subtitles: answer exactly once for every index
- A subtitle may span several lines; return its translation as a list of lines

## Output
Return ONLY valid JSON of the form:
{"translations": [{"index": <index>, "lines": ["<line>", "..."]}]}"#;

/// Prompt asking a backend to describe the material from sampled chunks
pub fn build_context_prompt(chunks: &[Vec<SourceBlock>]) -> String {
    let mut prompt = String::from(CONTEXT_INSTRUCTIONS);
    for (i, chunk) in chunks.iter().enumerate() {
        prompt.push_str(&format!("\n\n### Excerpt {}\n", i + 1));
        for block in chunk {
            prompt.push_str(&block.content.replace('\n', " "));
            prompt.push('\n');
        }
    }
    prompt
}

/// Prompt asking a backend to translate one chunk
pub fn build_translation_prompt(request: &TranslationRequest) -> Result<String, ProviderError> {
    let mut prompt = TRANSLATION_INSTRUCTIONS.replace("{target_language}", &request.target_language);

    if !request.context.trim().is_empty() {
        prompt.push_str("\n\n## Context\n");
        prompt.push_str(request.context.trim());
    }

    let payload = serde_json::to_string_pretty(&request.blocks)
        .map_err(|e| ProviderError::ParseError(format!("Failed to encode request: {}", e)))?;
    prompt.push_str("\n\n## Subtitles\n");
    prompt.push_str(&payload);

    Ok(prompt)
}

/// Extract the JSON object from a model answer that may wrap it in prose or a code fence
pub fn extract_json(response: &str) -> Option<&str> {
    let trimmed = response.trim();

    if trimmed.starts_with('{') {
        return Some(trimmed);
    }

    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_fence[body_start..];
        if let Some(end) = body.find("```") {
            let json = body[..end].trim();
            if json.starts_with('{') {
                return Some(json);
            }
        }
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => Some(&trimmed[start..=end]),
        _ => None,
    }
}

/// Parse the text answer of a model into a translation response
pub fn parse_translation_response(text: &str) -> Result<TranslationResponse, ProviderError> {
    let json = extract_json(text)
        .ok_or_else(|| ProviderError::ParseError("Could not extract JSON from response".to_string()))?;

    serde_json::from_str(json)
        .map_err(|e| ProviderError::ParseError(format!("Failed to parse translation response: {}", e)))
}
