use std::fmt;

/// Which part of the run a schedule slot belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    WarmUp,
    Measure,
}

/// Lifecycle of a run.
///
/// `Created -> WarmingUp -> Measuring -> Draining -> Completed | Aborted`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Created,
    WarmingUp,
    Measuring,
    Draining,
    Completed,
    Aborted,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Aborted)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Created => "created",
            RunState::WarmingUp => "warming-up",
            RunState::Measuring => "measuring",
            RunState::Draining => "draining",
            RunState::Completed => "completed",
            RunState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}
