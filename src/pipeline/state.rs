//! Output lifecycle state machine.

/// Lifecycle of a file output.
///
/// `start()` moves an idle output to `WaitingForStart`: streams and the
/// container are open but no video frame has been seen, so the shared
/// start timestamp is unset and audio is not admitted. The first video
/// frame moves it to `Active`. `stop()` moves it through `Stopped`
/// (teardown in progress, no further frames accepted) to the terminal
/// `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputState {
    /// Constructed but never started.
    Idle,
    /// Streams open, waiting for the first video frame.
    WaitingForStart,
    /// Start timestamp set, frames flow.
    Active,
    /// Teardown in progress.
    Stopped,
    /// Finalized; terminal.
    Closed,
}

impl OutputState {
    /// Check whether this state transition is valid.
    pub fn can_transition_to(&self, target: &OutputState) -> bool {
        use OutputState::*;

        match (self, target) {
            (Idle, WaitingForStart) => true,
            (WaitingForStart, Active) => true,
            // stop() can arrive before any video frame was seen.
            (WaitingForStart, Stopped) => true,
            (Active, Stopped) => true,
            (Stopped, Closed) => true,

            // Self-transitions
            (a, b) if a == b => true,

            _ => false,
        }
    }

    /// Whether delivery callbacks may still admit frames.
    pub fn accepts_frames(&self) -> bool {
        matches!(self, OutputState::WaitingForStart | OutputState::Active)
    }

    pub fn description(&self) -> &'static str {
        match self {
            OutputState::Idle => "Idle",
            OutputState::WaitingForStart => "WaitingForStart",
            OutputState::Active => "Active",
            OutputState::Stopped => "Stopped",
            OutputState::Closed => "Closed",
        }
    }
}

impl std::fmt::Display for OutputState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}
