//! Directive Builder: client context to prompt instructions.
//!
//! Pure configuration assembly. The same context and rule set always produce
//! the same directives.

use std::fmt::Write as _;

use reverie_config::RuleSet;
use reverie_types::{ClientContext, ClientLevel, EmergenceType};

/// Metaphor guidance is only given above this symbolic level.
pub const METAPHOR_SYMBOLIC_LEVEL: u8 = 40;
/// Trance depth below this is a light session.
pub const LIGHT_TRANCE_BELOW: u8 = 30;
/// Trance depth above this is a deep session.
pub const DEEP_TRANCE_ABOVE: u8 = 70;

const PREAMBLE: &str = "You are an experienced clinical hypnotherapist writing a guided relaxation script \
to be read aloud slowly. Write in second person, present tense, in plain spoken English. \
Output only the script: no headings, stage directions, bracketed notes or commentary.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranceTier {
    Light,
    Medium,
    Deep,
}

impl TranceTier {
    #[must_use]
    pub fn for_depth(depth: u8) -> Self {
        if depth < LIGHT_TRANCE_BELOW {
            Self::Light
        } else if depth > DEEP_TRANCE_ABOVE {
            Self::Deep
        } else {
            Self::Medium
        }
    }
}

/// Everything the Orchestrator tells the collaborator about style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directives {
    pub system_preamble: String,
    pub instructions: Vec<String>,
    pub reminders: Vec<String>,
}

impl Directives {
    /// Numbered instruction list for inclusion in a prompt.
    #[must_use]
    pub fn render_instructions(&self) -> String {
        numbered(&self.instructions)
    }

    #[must_use]
    pub fn render_reminders(&self) -> String {
        self.reminders.iter().fold(String::new(), |mut out, reminder| {
            let _ = writeln!(out, "- {reminder}");
            out
        })
    }
}

fn numbered(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .fold(String::new(), |mut out, (index, item)| {
            let _ = writeln!(out, "{}. {item}", index + 1);
            out
        })
}

fn percent(share: f64) -> u32 {
    (share * 100.0).round() as u32
}

#[derive(Debug, Clone, Copy)]
pub struct DirectiveBuilder<'r> {
    rules: &'r RuleSet,
}

impl<'r> DirectiveBuilder<'r> {
    #[must_use]
    pub fn new(rules: &'r RuleSet) -> Self {
        Self { rules }
    }

    #[must_use]
    pub fn build(&self, context: &ClientContext) -> Directives {
        Directives {
            system_preamble: self.preamble(),
            instructions: self.instructions(context),
            reminders: self.reminders(),
        }
    }

    fn preamble(&self) -> String {
        let mut preamble = String::from(PREAMBLE);
        if !self.rules.principles.is_empty() {
            preamble.push_str("\n\nFollow these principles throughout:\n");
            for (index, principle) in self.rules.principles.iter().enumerate() {
                let _ = writeln!(
                    preamble,
                    "{}. {}: {}",
                    index + 1,
                    principle.name,
                    principle.rationale
                );
            }
        }
        preamble.trim_end().to_string()
    }

    fn instructions(&self, context: &ClientContext) -> Vec<String> {
        let mut instructions = vec![safety_instruction(context.client_level)];

        let symbolic = context.symbolic_level.get();
        if symbolic > METAPHOR_SYMBOLIC_LEVEL {
            let families: Vec<&str> = self
                .rules
                .metaphors
                .families
                .iter()
                .map(|family| family.name.as_str())
                .collect();
            let mut guidance = format!(
                "Carry one central metaphor through the script, drawn mainly from a single family ({}). \
                 Introduce at most {} families in total and let the dominant one hold at least {}% of the imagery.",
                families.join(", "),
                self.rules.quality.max_mixed_families,
                percent(self.rules.quality.dominant_family_share),
            );
            if symbolic > DEEP_TRANCE_ABOVE {
                guidance.push_str(" Rich, layered symbolism is welcome here.");
            }
            instructions.push(guidance);
        } else {
            instructions.push(
                "Keep the language literal and body-based; avoid extended metaphors.".to_string(),
            );
        }

        instructions.push(match TranceTier::for_depth(context.trance_depth.get()) {
            TranceTier::Light => "Keep the deepening brief and conversational; the listener stays lightly relaxed and aware of the room.".to_string(),
            TranceTier::Medium => "Use a moderate deepening: a slow countdown or gradual descent paced with the breath.".to_string(),
            TranceTier::Deep => "Use an extended deepening with fractionation: deepen, lighten slightly, then deepen further, with long pauses between suggestions.".to_string(),
        });

        instructions.push(emergence_instruction(context.emergence).to_string());

        match context.sensory_preferences.as_slice() {
            [] => instructions.push(
                "Balance sound, touch, temperature and movement; never rely on visualization alone.".to_string(),
            ),
            senses => instructions.push(format!(
                "Favor {} language, while leaving other senses available.",
                senses.join(" and ")
            )),
        }

        if let Some(goal) = context.goal.as_deref().map(str::trim).filter(|g| !g.is_empty()) {
            instructions.push(format!(
                "Orient the work phase toward the listener's own goal: \"{goal}\"."
            ));
        }
        if let Some(name) = context
            .preferred_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
        {
            instructions.push(format!(
                "Address the listener as {name} two or three times, never at the start of consecutive sentences."
            ));
        }

        instructions
    }

    fn reminders(&self) -> Vec<String> {
        let rules = self.rules;
        let quality = &rules.quality;
        let mut reminders = Vec::new();

        let examples: Vec<&str> = rules
            .suggestions
            .phrases
            .iter()
            .take(5)
            .map(String::as_str)
            .collect();
        reminders.push(format!(
            "Include at least {} permissive suggestions (e.g. \"{}\").",
            rules.suggestions.minimum,
            examples.join("\", \"")
        ));

        reminders.push(format!(
            "Vary sentence openings: no three-word opener may start more than {}% of sentences.",
            percent(quality.max_opener_share)
        ));

        if !rules.diversity.phrases.is_empty() {
            let limits: Vec<String> = rules
                .diversity
                .phrases
                .iter()
                .map(|rule| format!("\"{}\" under {}", rule.phrase, rule.threshold))
                .collect();
            reminders.push(format!("Keep repeated phrases rare: {}.", limits.join(", ")));
        }

        reminders.push(
            "Give body nouns an article or possessive (\"your chest rises\", not \"chest rises\").".to_string(),
        );
        if !rules.naturalness.awkward_phrases.is_empty() {
            reminders.push(format!(
                "Avoid hedging filler such as \"{}\".",
                rules.naturalness.awkward_phrases.join("\", \"")
            ));
        }

        reminders.push(format!(
            "Stay within {}% of the target word count.",
            percent(quality.word_count_tolerance)
        ));
        reminders.push(format!(
            "Mention the dominant metaphor family at most {} times ({} in scripts of {}+ words).",
            quality.short_text_metaphor_cap, quality.long_text_metaphor_cap, quality.long_text_words
        ));

        reminders
    }
}

fn safety_instruction(level: ClientLevel) -> String {
    match level {
        ClientLevel::Beginner => "This listener is new to hypnosis: offer a safety or control reminder about every 150 words, and keep directive to permissive language near 1:3.",
        ClientLevel::Intermediate => "This listener has some experience: offer a safety or control reminder about every 250 words, and keep directive to permissive language near 1:2.",
        ClientLevel::Advanced => "This listener is experienced: a safety or control reminder about every 400 words is enough, and directive to permissive language may approach 1:2.",
    }
    .to_string()
}

/// Closing instruction; the two modes never mix.
#[must_use]
pub fn emergence_instruction(emergence: EmergenceType) -> &'static str {
    match emergence {
        EmergenceType::Regular => {
            "End by counting up from one to five, bringing the listener back to full alertness, refreshed and wide awake with eyes open."
        }
        EmergenceType::Sleep => {
            "End by letting the listener drift into natural sleep: slow the pacing, lengthen the pauses, and never count up, wake them, or suggest alertness or opening the eyes."
        }
    }
}
