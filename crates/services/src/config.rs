use std::env;
use std::time::Duration;

const DEFAULT_ADVANCE_DELAY_MS: u64 = 2_000;

/// Behaviour knobs for `SessionOrchestrator`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Pause after a passed quiz so the learner can read the feedback.
    pub advance_delay: Duration,
    /// When false, the learner may move on without passing the step quiz.
    pub require_quiz: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            advance_delay: Duration::from_millis(DEFAULT_ADVANCE_DELAY_MS),
            require_quiz: true,
        }
    }
}

impl OrchestratorConfig {
    /// Reads `TUTOR_ADVANCE_DELAY_MS` and `TUTOR_REQUIRE_QUIZ`, keeping the
    /// defaults for unset or unparseable values.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let advance_delay = lookup("TUTOR_ADVANCE_DELAY_MS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(defaults.advance_delay, Duration::from_millis);
        let require_quiz = lookup("TUTOR_REQUIRE_QUIZ")
            .and_then(|v| parse_flag(&v))
            .unwrap_or(defaults.require_quiz);
        Self {
            advance_delay,
            require_quiz,
        }
    }

    /// No display pause; useful for tests and non-interactive front ends.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            advance_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_require_quiz(mut self, require_quiz: bool) -> Self {
        self.require_quiz = require_quiz;
        self
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
