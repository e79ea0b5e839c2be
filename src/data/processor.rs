// ============================================================
// Layer 4 — Requirements Processor
// ============================================================
// Turns a document into a supervised (prompt, target) sample.
//
//   prompt = instructions + document type/title + document text
//   target = the document itself for "requirements" documents,
//            otherwise the four-section markdown skeleton
//
// Token layout (see domain::batch):
//
//   input_ids: [BOS] prompt…(≤ max_prompt_len) target… [EOS]
//   labels:    [PAD] [PAD]…                    target… [EOS]
//
// The whole row is capped at max_length; the target is cut
// first, the prompt never pushes EOS out.

use anyhow::Result;

use crate::data::dataset::SpinSample;
use crate::domain::document::RequirementsDocument;
use crate::domain::error::{SpinError, SpinResult};
use crate::infra::tokenizer_store::{TextCodec, BOS_ID, EOS_ID, PAD_ID};

pub const DEFAULT_MAX_LENGTH:     usize = 512;
pub const DEFAULT_MAX_PROMPT_LEN: usize = 256;

pub const TEMPLATE_TARGET: &str = "# Requirements Document

## Functional Requirements
[Extracted functional requirements]

## Non-Functional Requirements
[Extracted non-functional requirements]

## User Stories
[Extracted user stories]

## Acceptance Criteria
[Extracted acceptance criteria]";

pub struct RequirementsProcessor {
    max_length:     usize,
    max_prompt_len: usize,
}

impl RequirementsProcessor {
    /// `max_prompt_len` counts BOS; at least one target token and
    /// EOS must still fit in `max_length`.
    pub fn new(max_length: usize, max_prompt_len: usize) -> SpinResult<Self> {
        if max_prompt_len < 2 || max_prompt_len + 2 > max_length {
            return Err(SpinError::config(format!(
                "max_prompt_len ({max_prompt_len}) must be in 2..={}",
                max_length.saturating_sub(2)
            )));
        }
        Ok(Self { max_length, max_prompt_len })
    }

    pub fn create_prompt(&self, doc: &RequirementsDocument) -> String {
        format!(
            "Extract software requirements from the following document.
Document Type: {}
Document Title: {}

Document Content:
{}

Please extract and format the requirements in the following structure:
1. Functional Requirements
2. Non-Functional Requirements
3. User Stories
4. Acceptance Criteria

Format the output in markdown.",
            doc.metadata.kind_or_unknown(),
            doc.metadata.title_or_untitled(),
            doc.text,
        )
    }

    pub fn create_target(&self, doc: &RequirementsDocument) -> String {
        if doc.metadata.is_requirements() {
            doc.text.clone()
        } else {
            TEMPLATE_TARGET.to_string()
        }
    }

    /// Every text the tokenizer vocabulary should cover.
    pub fn corpus_texts(&self, docs: &[RequirementsDocument]) -> Vec<String> {
        docs.iter()
            .flat_map(|d| [self.create_prompt(d), self.create_target(d)])
            .collect()
    }

    pub fn process(&self, doc: &RequirementsDocument, codec: &TextCodec) -> Result<SpinSample> {
        let mut prompt_ids = codec.encode(&self.create_prompt(doc))?;
        prompt_ids.truncate(self.max_prompt_len - 1);

        let mut input_ids = Vec::with_capacity(self.max_length);
        input_ids.push(BOS_ID);
        input_ids.extend(prompt_ids);
        let prompt_len = input_ids.len();

        let mut target_ids = codec.encode(&self.create_target(doc))?;
        if target_ids.is_empty() {
            return Err(SpinError::data(format!("document '{}' has an empty target", doc.source)).into());
        }
        target_ids.truncate(self.max_length - prompt_len - 1);
        target_ids.push(EOS_ID);

        let mut labels = vec![PAD_ID; prompt_len];
        labels.extend_from_slice(&target_ids);
        input_ids.extend(target_ids);

        Ok(SpinSample { input_ids, labels, prompt_len })
    }

    /// Process every document, skipping (and logging) the ones that fail.
    pub fn process_all(&self, docs: &[RequirementsDocument], codec: &TextCodec) -> Vec<SpinSample> {
        docs.iter()
            .filter_map(|doc| match self.process(doc, codec) {
                Ok(sample) => Some(sample),
                Err(e) => {
                    tracing::warn!("Skipping '{}': {e:#}", doc.source);
                    None
                }
            })
            .collect()
    }
}
