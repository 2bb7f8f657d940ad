use std::fmt;

use serde::Serialize;

/// Capture session state machine.
///
/// State transitions:
/// ```text
/// uninitialized → configured → running → stopped
///                      └───────────────────↑
/// ```
/// `stopped` is terminal. Capturing again needs a new engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureState {
    #[default]
    Uninitialized,
    Configured,
    Running,
    Stopped,
}

impl CaptureState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    pub fn can_start(&self) -> bool {
        matches!(self, Self::Configured)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Configured => "configured",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_configured_can_start() {
        assert!(CaptureState::Configured.can_start());
        assert!(!CaptureState::Uninitialized.can_start());
        assert!(!CaptureState::Running.can_start());
        assert!(!CaptureState::Stopped.can_start());
    }

    #[test]
    fn stopped_is_terminal() {
        assert!(CaptureState::Stopped.is_terminal());
        assert!(!CaptureState::Running.is_terminal());
        assert_eq!(CaptureState::default(), CaptureState::Uninitialized);
    }
}
