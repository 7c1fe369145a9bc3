use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record of one repair cycle. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonLearned {
    objective: String,
    problem: String,
    solution: String,
    timestamp: DateTime<Utc>,
    cycle: u32,
}

impl LessonLearned {
    pub fn new(
        objective: impl Into<String>,
        problem: impl Into<String>,
        solution: impl Into<String>,
        cycle: u32,
    ) -> Self {
        Self {
            objective: objective.into(),
            problem: problem.into(),
            solution: solution.into(),
            timestamp: Utc::now(),
            cycle,
        }
    }

    pub fn objective(&self) -> &str {
        &self.objective
    }

    pub fn problem(&self) -> &str {
        &self.problem
    }

    pub fn solution(&self) -> &str {
        &self.solution
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn cycle(&self) -> u32 {
        self.cycle
    }
}
