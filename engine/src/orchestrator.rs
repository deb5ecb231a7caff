//! Orchestrator: outline, draft and polish calls against the collaborator.
//!
//! Each call is one request and one response. Nothing here retries or checks
//! the quality of what comes back; a response that cannot be unwrapped into
//! the expected shape aborts the run.

use std::fmt;
use std::fmt::Write as _;

use serde::Deserialize;
use thiserror::Error;

use reverie_providers::{
    GenerationError, GenerationRequest, Generator, ResponseError, unwrap_json, unwrap_text,
};
use reverie_types::{ClientContext, GenerationContract, PatternAnalysis};

use crate::directives::{Directives, emergence_instruction};

/// Output tokens requested for the outline call, before the configured cap.
const OUTLINE_TOKENS: u32 = 4_000;
/// Rough tokens per word of English prose, with headroom.
const TOKENS_PER_WORD: u32 = 2;
const MIN_SCRIPT_TOKENS: u32 = 1_024;

/// A step of the generation pipeline that calls the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Outline,
    Draft,
    Polish,
    SinglePass,
    Repair,
}

impl PipelineStage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Outline => "outline",
            Self::Draft => "draft",
            Self::Polish => "polish",
            Self::SinglePass => "single_pass",
            Self::Repair => "repair",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{stage} call failed: {source}")]
    Generation {
        stage: PipelineStage,
        #[source]
        source: GenerationError,
    },
    #[error("{stage} response unusable: {source}")]
    Response {
        stage: PipelineStage,
        #[source]
        source: ResponseError,
    },
}

impl PipelineError {
    #[must_use]
    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::Generation { stage, .. } | Self::Response { stage, .. } => *stage,
        }
    }
}

/// The four structural phases, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Induction,
    Deepening,
    Work,
    Emergence,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Induction, Phase::Deepening, Phase::Work, Phase::Emergence];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Induction => "Induction",
            Self::Deepening => "Deepening",
            Self::Work => "Work",
            Self::Emergence => "Emergence",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutlinePhase {
    pub phase: String,
    pub plan: String,
}

/// A validated four-phase plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outline {
    phases: Vec<OutlinePhase>,
}

#[derive(Deserialize)]
struct RawOutline {
    phases: Vec<OutlinePhase>,
}

impl Outline {
    /// Parse the collaborator's outline response and check it has exactly the
    /// four phases in order, each with a non-empty plan.
    pub fn parse(raw: &str) -> Result<Self, ResponseError> {
        let RawOutline { phases } = unwrap_json(raw)?;
        if phases.len() != Phase::ALL.len() {
            return Err(ResponseError::Shape(format!(
                "expected {} phases, got {}",
                Phase::ALL.len(),
                phases.len()
            )));
        }
        for (expected, got) in Phase::ALL.iter().zip(&phases) {
            if !got.phase.trim().eq_ignore_ascii_case(expected.as_str()) {
                return Err(ResponseError::Shape(format!(
                    "expected phase '{}', got '{}'",
                    expected.as_str(),
                    got.phase
                )));
            }
            if got.plan.trim().is_empty() {
                return Err(ResponseError::Shape(format!(
                    "phase '{}' has an empty plan",
                    expected.as_str()
                )));
            }
        }
        Ok(Self { phases })
    }

    #[must_use]
    pub fn phases(&self) -> &[OutlinePhase] {
        &self.phases
    }

    #[must_use]
    pub fn render(&self) -> String {
        self.phases
            .iter()
            .zip(Phase::ALL)
            .fold(String::new(), |mut out, (phase, name)| {
                let _ = writeln!(out, "{}: {}", name.as_str(), phase.plan.trim());
                out
            })
    }
}

/// Drives one run's collaborator calls.
pub struct Orchestrator<'a> {
    generator: &'a dyn Generator,
    directives: &'a Directives,
    context: &'a ClientContext,
    contract: &'a GenerationContract,
    max_output_tokens: u32,
}

impl fmt::Debug for Orchestrator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("target_words", &self.contract.target_words)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish_non_exhaustive()
    }
}

impl<'a> Orchestrator<'a> {
    #[must_use]
    pub fn new(
        generator: &'a dyn Generator,
        directives: &'a Directives,
        context: &'a ClientContext,
        contract: &'a GenerationContract,
        max_output_tokens: u32,
    ) -> Self {
        Self {
            generator,
            directives,
            context,
            contract,
            max_output_tokens,
        }
    }

    fn script_tokens(&self) -> u32 {
        self.contract
            .target_words
            .saturating_mul(TOKENS_PER_WORD)
            .max(MIN_SCRIPT_TOKENS)
            .min(self.max_output_tokens)
    }

    async fn call(
        &self,
        stage: PipelineStage,
        user_prompt: &str,
        max_output_tokens: u32,
    ) -> Result<String, PipelineError> {
        tracing::info!(stage = stage.as_str(), "Calling generation collaborator");
        let request = GenerationRequest::new(
            &self.directives.system_preamble,
            user_prompt,
            max_output_tokens,
        );
        self.generator
            .generate(request)
            .await
            .map_err(|source| PipelineError::Generation { stage, source })
    }

    pub async fn outline(&self) -> Result<Outline, PipelineError> {
        let stage = PipelineStage::Outline;
        let raw = self
            .call(stage, &self.outline_prompt(), OUTLINE_TOKENS.min(self.max_output_tokens))
            .await?;
        Outline::parse(&raw).map_err(|source| PipelineError::Response { stage, source })
    }

    pub async fn draft(&self, outline: &Outline) -> Result<String, PipelineError> {
        let stage = PipelineStage::Draft;
        let raw = self
            .call(stage, &self.draft_prompt(outline), self.script_tokens())
            .await?;
        unwrap_text(&raw).map_err(|source| PipelineError::Response { stage, source })
    }

    /// Revise `draft`; `diversity` is the draft's pattern analysis, cited so
    /// flagged phrases get their configured alternatives.
    pub async fn polish(
        &self,
        draft: &str,
        diversity: &PatternAnalysis,
    ) -> Result<String, PipelineError> {
        let stage = PipelineStage::Polish;
        let raw = self
            .call(stage, &self.polish_prompt(draft, diversity), self.script_tokens())
            .await?;
        unwrap_text(&raw).map_err(|source| PipelineError::Response { stage, source })
    }

    /// The whole script in one call, skipping outline and polish.
    pub async fn single_pass(&self) -> Result<String, PipelineError> {
        let stage = PipelineStage::SinglePass;
        let raw = self
            .call(stage, &self.single_pass_prompt(), self.script_tokens())
            .await?;
        unwrap_text(&raw).map_err(|source| PipelineError::Response { stage, source })
    }

    fn journey_section(&self) -> String {
        let mut section = String::new();
        for (index, stage) in self.contract.stages.iter().enumerate() {
            let _ = write!(
                section,
                "{}. {} (about {} words, ending near word {})",
                index + 1,
                stage.arc.name,
                stage.word_budget,
                stage.cumulative_word_target
            );
            if !stage.arc.prompt_integration.is_empty() {
                let _ = write!(section, ": {}", stage.arc.prompt_integration);
            }
            if !stage.arc.key_language.is_empty() {
                let _ = write!(section, " Key language: {}.", stage.arc.key_language.join(", "));
            }
            if let Some(goal) = &stage.transition_goal {
                let _ = write!(section, " Transition toward: {goal}.");
            }
            if let Some(overrides) = stage.dimension_overrides.filter(|o| !o.is_empty()) {
                if let Some(level) = overrides.symbolic_level {
                    let _ = write!(section, " Symbolic level here: {level}/100.");
                }
                if let Some(level) = overrides.trance_depth {
                    let _ = write!(section, " Trance depth here: {level}/100.");
                }
            }
            section.push('\n');
        }
        section
    }

    fn outline_prompt(&self) -> String {
        let emergence = emergence_instruction(self.context.emergence);
        format!(
            "Plan a {words}-word guided relaxation script in four phases: Induction, Deepening, Work, Emergence.\n\n\
             Journey stages, in order:\n{journey}\n\
             Instructions:\n{instructions}\n\
             For the Emergence phase: {emergence}\n\n\
             Respond with only a JSON object of the form \
             {{\"phases\": [{{\"phase\": \"Induction\", \"plan\": \"...\"}}, \
             {{\"phase\": \"Deepening\", \"plan\": \"...\"}}, \
             {{\"phase\": \"Work\", \"plan\": \"...\"}}, \
             {{\"phase\": \"Emergence\", \"plan\": \"...\"}}]}}",
            words = self.contract.target_words,
            journey = self.journey_section(),
            instructions = self.directives.render_instructions(),
        )
    }

    fn draft_prompt(&self, outline: &Outline) -> String {
        format!(
            "Write the complete script, about {words} words, following this outline:\n\n{outline}\n\
             Give each journey stage roughly its word budget:\n{journey}\n\
             Instructions:\n{instructions}\n\
             Keep the metaphors introduced early consistent through to the end.\n\n\
             Quality reminders:\n{reminders}",
            words = self.contract.target_words,
            outline = outline.render(),
            journey = self.journey_section(),
            instructions = self.directives.render_instructions(),
            reminders = self.directives.render_reminders(),
        )
    }

    fn polish_prompt(&self, draft: &str, diversity: &PatternAnalysis) -> String {
        let mut prompt = format!(
            "Revise the script below. Keep its structure, length (about {words} words) and closing. \
             Check it against the principles, then:\n\
             - Keep directive to permissive language between 1:2 and 1:3.\n\
             - Vary sentence subjects; do not start consecutive sentences the same way.\n\
             - Replace commands that assume visualization (\"see\", \"picture\", \"look at\") with \
             sensory language any listener can follow.\n\
             - {emergence}\n",
            words = self.contract.target_words,
            emergence = emergence_instruction(self.context.emergence),
        );
        prompt.push_str(&rewrite_guidance(diversity));
        let _ = write!(
            prompt,
            "\nQuality reminders:\n{}\nReturn only the revised script.\n\n---\n{}",
            self.directives.render_reminders(),
            draft.trim()
        );
        prompt
    }

    fn single_pass_prompt(&self) -> String {
        format!(
            "Write a complete guided relaxation script of about {words} words with four phases \
             (Induction, Deepening, Work, Emergence) flowing without headings.\n\n\
             Journey stages, in order:\n{journey}\n\
             Instructions:\n{instructions}\n\
             Quality reminders:\n{reminders}\n\
             Return only the script.",
            words = self.contract.target_words,
            journey = self.journey_section(),
            instructions = self.directives.render_instructions(),
            reminders = self.directives.render_reminders(),
        )
    }
}

/// Prompt lines asking for flagged phrases to be replaced, citing alternatives.
#[must_use]
pub fn rewrite_guidance(diversity: &PatternAnalysis) -> String {
    let mut guidance = String::new();
    for pattern in diversity.needing_rewrite() {
        let _ = write!(
            guidance,
            "- \"{}\" appears {} times (limit {}); replace most uses",
            pattern.pattern, pattern.count, pattern.threshold
        );
        if pattern.alternatives.is_empty() {
            guidance.push_str(".\n");
        } else {
            let _ = writeln!(guidance, ", e.g. with \"{}\".", pattern.alternatives.join("\", \""));
        }
    }
    guidance
}
