//! Shared test utilities and fixtures

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use reverie_analysis::text::word_count;
use reverie_providers::{GenerateFut, GenerationError, GenerationRequest, Generator};
use reverie_types::{Journey, Stage};

/// A regular-emergence script that passes every built-in check.
pub const PASSING_SCRIPT: &str = "\
Settle into the chair and let the room fade a little, as you breathe out slowly. \
You might feel your shoulders soften, and you can let them rest. \
Perhaps you notice the weight of your hands. \
Maybe you sense the floor supporting your feet. \
I wonder if your breathing has already slowed. \
It's okay to let your thoughts come and go. \
Whenever you're ready, allow yourself to sink a bit further. \
Each exhale can carry a little tension away, if you like. \
Somewhere inside, you could begin to feel calmer. \
Your jaw loosens, and you may find your tongue resting easily. \
There is nothing to do right now, so let yourself be still. \
Sounds around you can simply come and go. \
Noticing the quiet, you might rest here for a while. \
Every part of you is allowed to be comfortable. \
In a moment I will count from one to five. \
One, two, three, returning to the room. \
Four, taking a deeper breath and stretching a little. \
Five, eyes open, wide awake and feeling clear.";

/// Fails at least the emergence and suggestion checks.
pub const FAILING_SCRIPT: &str = "Rest here quietly now.";

pub const OUTLINE_JSON: &str = r#"Here is the outline:
```json
{"phases": [
  {"phase": "Induction", "plan": "Settle into the chair and the breath."},
  {"phase": "Deepening", "plan": "Slow countdown from ten."},
  {"phase": "Work", "plan": "Let tension leave the shoulders and jaw."},
  {"phase": "Emergence", "plan": "Count up from one to five."}
]}
```"#;

/// Word count of [`PASSING_SCRIPT`], used as the target so the word count check passes.
pub fn passing_target() -> u32 {
    word_count(PASSING_SCRIPT) as u32
}

pub fn two_stage_journey() -> Journey {
    Journey::new(vec![
        Stage::new("breath-anchor", 40),
        Stage::new("release", 60).with_transition_goal("lighter"),
    ])
}

/// Replays canned responses in order and records every request.
///
/// Once the script runs out, further calls fail with `GenerationError::Other`.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<String, GenerationError>>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new(responses: impl IntoIterator<Item = Result<String, GenerationError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn replying(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|text| Ok((*text).to_string())))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Generator for ScriptedGenerator {
    fn generate<'a>(&'a self, request: GenerationRequest<'a>) -> GenerateFut<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap()
            .push(request.user_prompt.to_string());
        let next = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::Other("no scripted response left".to_string())));
        Box::pin(async move { next })
    }
}

pub fn collaborator_down() -> GenerationError {
    GenerationError::Other("collaborator unavailable".to_string())
}
