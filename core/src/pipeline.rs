//! Ordered derivation steps that follow a write.
//!
//! The write itself (a logged meal, a saved recipe) either happens or the
//! operation fails. The derived data that depends on it is then refreshed
//! step by step; a failed step is recorded in the [`WriteReport`] instead of
//! undoing the write, and can be re-run later since every step is a full,
//! idempotent recomputation.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum DeriveStep {
    /// Create a staple for every ingredient of the recipe that lacks one.
    EnsureStaples { recipe_id: i64 },
    /// Downgrade staples used by the recipe according to meal counts.
    Depletion { recipe_id: i64 },
    /// Recompute every staple's frequency rank.
    FrequencyRanks,
}

impl fmt::Display for DeriveStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnsureStaples { recipe_id } => write!(f, "staples for recipe {recipe_id}"),
            Self::Depletion { recipe_id } => write!(f, "depletion for recipe {recipe_id}"),
            Self::FrequencyRanks => f.write_str("frequency ranks"),
        }
    }
}

pub trait StepRunner {
    fn run_step(&self, step: DeriveStep) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    #[serde(flatten)]
    pub step: DeriveStep,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepOutcome {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// The stored record plus how each derivation went.
#[derive(Debug, Clone, Serialize)]
pub struct WriteReport<T> {
    pub record: T,
    pub derived: Vec<StepOutcome>,
}

impl<T> WriteReport<T> {
    /// True when every derived step succeeded.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.derived.iter().all(StepOutcome::succeeded)
    }

    #[must_use]
    pub fn failed_steps(&self) -> Vec<DeriveStep> {
        self.derived
            .iter()
            .filter(|o| !o.succeeded())
            .map(|o| o.step)
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    steps: Vec<DeriveStep>,
}

impl Pipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn then(mut self, step: DeriveStep) -> Self {
        self.steps.push(step);
        self
    }

    #[must_use]
    pub fn steps(&self) -> &[DeriveStep] {
        &self.steps
    }

    /// Run every step in order. A failing step does not stop later ones.
    pub fn run<T>(&self, runner: &dyn StepRunner, record: T) -> WriteReport<T> {
        let derived = self
            .steps
            .iter()
            .map(|&step| match runner.run_step(step) {
                Ok(()) => {
                    tracing::debug!(%step, "derived");
                    StepOutcome { step, error: None }
                }
                Err(e) => {
                    tracing::warn!(%step, error = %format!("{e:#}"), "derive step failed");
                    StepOutcome {
                        step,
                        error: Some(format!("{e:#}")),
                    }
                }
            })
            .collect();
        WriteReport { record, derived }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        ran: RefCell<Vec<DeriveStep>>,
        failing: Vec<DeriveStep>,
    }

    impl StepRunner for Recorder {
        fn run_step(&self, step: DeriveStep) -> anyhow::Result<()> {
            self.ran.borrow_mut().push(step);
            if self.failing.contains(&step) {
                anyhow::bail!("store unavailable");
            }
            Ok(())
        }
    }

    fn meal_pipeline() -> Pipeline {
        Pipeline::new()
            .then(DeriveStep::Depletion { recipe_id: 7 })
            .then(DeriveStep::FrequencyRanks)
    }

    #[test]
    fn test_runs_steps_in_order() {
        let runner = Recorder::default();
        let report = meal_pipeline().run(&runner, "meal");
        assert!(report.is_consistent());
        assert_eq!(report.record, "meal");
        assert_eq!(*runner.ran.borrow(), meal_pipeline().steps());
    }

    #[test]
    fn test_failure_is_recorded_and_later_steps_still_run() {
        let runner = Recorder {
            failing: vec![DeriveStep::Depletion { recipe_id: 7 }],
            ..Recorder::default()
        };
        let report = meal_pipeline().run(&runner, 1);
        assert!(!report.is_consistent());
        assert_eq!(
            report.failed_steps(),
            vec![DeriveStep::Depletion { recipe_id: 7 }]
        );
        assert_eq!(report.derived[0].error.as_deref(), Some("store unavailable"));
        assert!(report.derived[1].succeeded());
        assert_eq!(runner.ran.borrow().len(), 2);
    }

    #[test]
    fn test_empty_pipeline_is_consistent() {
        let report = Pipeline::new().run(&Recorder::default(), ());
        assert!(report.derived.is_empty());
        assert!(report.is_consistent());
    }

    #[test]
    fn test_report_serializes_step_tags() {
        let runner = Recorder {
            failing: vec![DeriveStep::FrequencyRanks],
            ..Recorder::default()
        };
        let report = meal_pipeline().run(&runner, 3);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["derived"][0]["step"], "depletion");
        assert_eq!(json["derived"][0]["recipe_id"], 7);
        assert!(json["derived"][0].get("error").is_none());
        assert_eq!(json["derived"][1]["error"], "store unavailable");
    }
}
