//! Application mode state machine
//!
//! The viewer's interaction state is three orthogonal modes plus a
//! generation counter for in-flight description requests:
//! - viewing: whether pointer/pose selects are marking the model
//! - placement: whether the model has been placed in the session's space
//! - session: desktop orbit viewing or an active AR-style session
//!
//! Replaces the ad-hoc boolean flags of earlier revisions with explicit
//! enumerations so every transition is a named operation.

/// Whether selects mark the model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewingMode {
    #[default]
    Idle,
    Marking,
}

/// Whether the model has been placed in the session's space
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlacementMode {
    Unplaced,
    /// Desktop sessions start placed, with the model at the origin
    #[default]
    Placed,
}

/// The kind of session driving the viewer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionMode {
    #[default]
    Desktop,
    ArActive,
}

/// What a pose select should do in the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectAction {
    /// Place the model at the select pose
    PlaceModel,
    /// Cast the pose ray and mark the hit point
    CastForMark,
    /// Nothing to do
    Ignore,
}

/// Combined application state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppState {
    pub viewing: ViewingMode,
    pub placement: PlacementMode,
    pub session: SessionMode,
    describe_generation: u64,
}

impl AppState {
    /// Toggle marking mode and return the new mode
    pub fn toggle_marking(&mut self) -> ViewingMode {
        self.viewing = match self.viewing {
            ViewingMode::Idle => ViewingMode::Marking,
            ViewingMode::Marking => ViewingMode::Idle,
        };
        self.viewing
    }

    /// A successful mark leaves marking mode
    pub fn finish_mark(&mut self) {
        self.viewing = ViewingMode::Idle;
    }

    pub fn is_marking(&self) -> bool {
        self.viewing == ViewingMode::Marking
    }

    /// Orbit input is ignored while marking or in an AR session
    pub fn can_orbit(&self) -> bool {
        self.viewing == ViewingMode::Idle && self.session == SessionMode::Desktop
    }

    /// Enter an AR-style session: the model waits to be placed
    pub fn enter_ar(&mut self) {
        self.session = SessionMode::ArActive;
        self.placement = PlacementMode::Unplaced;
    }

    /// Leave the AR-style session and restore desktop defaults
    pub fn exit_ar(&mut self) {
        self.session = SessionMode::Desktop;
        self.placement = PlacementMode::Placed;
    }

    /// Record that a pose select placed the model
    pub fn place_model(&mut self) {
        self.placement = PlacementMode::Placed;
    }

    /// Reset the view; in an AR session the model returns to unplaced
    pub fn reset_view(&mut self) {
        if self.session == SessionMode::ArActive {
            self.placement = PlacementMode::Unplaced;
        }
    }

    /// Dispatch a pose select against the current state
    pub fn select_action(&self) -> SelectAction {
        match (self.placement, self.viewing) {
            (PlacementMode::Unplaced, _) => SelectAction::PlaceModel,
            (PlacementMode::Placed, ViewingMode::Marking) => SelectAction::CastForMark,
            _ => SelectAction::Ignore,
        }
    }

    /// Start a new description request, invalidating any in-flight one
    pub fn begin_describe(&mut self) -> u64 {
        self.describe_generation += 1;
        self.describe_generation
    }

    /// True when a result for `generation` is still the latest request
    pub fn is_current_describe(&self, generation: u64) -> bool {
        generation == self.describe_generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desktop_defaults() {
        let state = AppState::default();
        assert_eq!(state.viewing, ViewingMode::Idle);
        assert_eq!(state.placement, PlacementMode::Placed);
        assert_eq!(state.session, SessionMode::Desktop);
        assert!(state.can_orbit());
    }

    #[test]
    fn test_marking_toggle_and_auto_exit() {
        let mut state = AppState::default();
        assert_eq!(state.toggle_marking(), ViewingMode::Marking);
        assert!(!state.can_orbit());
        assert_eq!(state.select_action(), SelectAction::CastForMark);

        state.finish_mark();
        assert_eq!(state.viewing, ViewingMode::Idle);
        assert!(state.can_orbit());
        assert_eq!(state.select_action(), SelectAction::Ignore);
    }

    #[test]
    fn test_ar_place_then_mark_flow() {
        let mut state = AppState::default();
        state.enter_ar();
        assert_eq!(state.placement, PlacementMode::Unplaced);
        assert!(!state.can_orbit());
        assert_eq!(state.select_action(), SelectAction::PlaceModel);

        state.place_model();
        assert_eq!(state.select_action(), SelectAction::Ignore);

        state.toggle_marking();
        assert_eq!(state.select_action(), SelectAction::CastForMark);

        state.reset_view();
        assert_eq!(state.placement, PlacementMode::Unplaced);

        state.exit_ar();
        assert_eq!(state.session, SessionMode::Desktop);
        assert_eq!(state.placement, PlacementMode::Placed);
    }

    #[test]
    fn test_reset_view_on_desktop_keeps_placement() {
        let mut state = AppState::default();
        state.reset_view();
        assert_eq!(state.placement, PlacementMode::Placed);
    }

    #[test]
    fn test_describe_generation_invalidates_older_requests() {
        let mut state = AppState::default();
        let first = state.begin_describe();
        assert!(state.is_current_describe(first));

        let second = state.begin_describe();
        assert!(!state.is_current_describe(first));
        assert!(state.is_current_describe(second));
    }
}
