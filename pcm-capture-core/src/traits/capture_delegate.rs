use crate::models::error::CaptureError;
use crate::models::state::CaptureState;

/// Event delegate for capture session notifications.
///
/// Methods are called from the dispatch thread, inside the completion
/// callback for errors. Keep them short and non-blocking.
pub trait CaptureDelegate: Send + Sync {
    /// Called after the session state changes.
    fn on_state_changed(&self, state: CaptureState);

    /// Called for every error the engine recovers from on its own, such as
    /// a failed sink write or a refused re-submission.
    fn on_error(&self, error: &CaptureError);
}
