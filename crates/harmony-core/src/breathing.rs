//! Guided breathing: a countdown through a mode's fixed sequence of steps.

/// One timed phase of a breathing pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub label: &'static str,
    /// Whole seconds, always at least 1.
    pub seconds: u32,
}

#[derive(Debug, PartialEq, Eq)]
pub struct BreathingMode {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// Never empty.
    pub steps: &'static [Step],
}

impl BreathingMode {
    pub fn find(key: &str) -> Option<&'static BreathingMode> {
        MODES.iter().find(|m| m.key == key)
    }

    pub fn default_mode() -> &'static BreathingMode {
        &MODES[0]
    }

    /// Seconds for one pass through every step.
    pub fn cycle_seconds(&self) -> u32 {
        self.steps.iter().map(|s| s.seconds).sum()
    }
}

const fn step(label: &'static str, seconds: u32) -> Step {
    Step { label, seconds }
}

pub static MODES: &[BreathingMode] = &[
    BreathingMode {
        key: "relax",
        name: "Relax & Unwind",
        description: "4-7-8 Breathing: Inhale 4s, Hold 7s, Exhale 8s.",
        steps: &[step("Inhale", 4), step("Hold", 7), step("Exhale", 8)],
    },
    BreathingMode {
        key: "focus",
        name: "Focus",
        description: "Box Breathing: Inhale 4s, Hold 4s, Exhale 4s, Hold 4s.",
        steps: &[step("Inhale", 4), step("Hold", 4), step("Exhale", 4), step("Hold", 4)],
    },
    BreathingMode {
        key: "energize",
        name: "Energize",
        description: "Fast Breathing: Inhale 2s, Exhale 2s.",
        steps: &[step("Inhale", 2), step("Exhale", 2)],
    },
    BreathingMode {
        key: "mindful-minute",
        name: "Mindful Minute",
        description: "One minute of calm, steady breathing.",
        steps: &[step("Breathe", 60)],
    },
];

/// What a single `tick` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Session not running; nothing changed.
    Idle,
    /// One second elapsed within the current step.
    Counting,
    /// The current step ran out and the next one began.
    StepAdvanced,
    /// The last step ran out; back at step 0 and stopped.
    Completed,
}

#[derive(Debug, Clone)]
pub struct BreathingSession {
    mode: &'static BreathingMode,
    step_index: usize,
    seconds_remaining: u32,
    running: bool,
}

impl BreathingSession {
    pub fn new(mode: &'static BreathingMode) -> Self {
        Self {
            mode,
            step_index: 0,
            seconds_remaining: mode.steps[0].seconds,
            running: false,
        }
    }

    pub fn select_mode(&mut self, mode: &'static BreathingMode) {
        *self = Self::new(mode);
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn reset(&mut self) {
        self.running = false;
        self.step_index = 0;
        self.seconds_remaining = self.mode.steps[0].seconds;
    }

    /// Advance one elapsed second. Single-shot: finishing the last step
    /// rewinds to the first and stops rather than looping.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.running {
            return TickOutcome::Idle;
        }

        self.seconds_remaining = self.seconds_remaining.saturating_sub(1);
        if self.seconds_remaining > 0 {
            return TickOutcome::Counting;
        }

        if self.step_index + 1 < self.mode.steps.len() {
            self.step_index += 1;
            self.seconds_remaining = self.mode.steps[self.step_index].seconds;
            TickOutcome::StepAdvanced
        } else {
            self.reset();
            TickOutcome::Completed
        }
    }

    pub fn mode(&self) -> &'static BreathingMode {
        self.mode
    }

    pub fn current_step(&self) -> &'static Step {
        &self.mode.steps[self.step_index]
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn seconds_remaining(&self) -> u32 {
        self.seconds_remaining
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Fraction of the current step already elapsed, in [0, 1].
    pub fn progress(&self) -> f64 {
        let total = self.current_step().seconds;
        f64::from(total - self.seconds_remaining) / f64::from(total)
    }
}

impl Default for BreathingSession {
    fn default() -> Self {
        Self::new(BreathingMode::default_mode())
    }
}
