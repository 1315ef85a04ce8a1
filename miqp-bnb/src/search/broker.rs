//! Objective cutoff and status reporting.

use crate::model::{SearchStatus, StatusDescription, StopReason};
use crate::settings::BbSettings;

/// Owner of the objective cutoff.
///
/// The cutoff is the smaller of the user seed and the best objective known
/// to this worker (its own solutions plus peer broadcasts). The learned part
/// only improves until solutions are discarded.
#[derive(Debug, Clone)]
pub struct BoundBroker {
    user_cutoff: Option<f64>,
    learned: f64,
}

impl BoundBroker {
    /// Create a broker with an optional user cutoff.
    pub fn new(user_cutoff: Option<f64>) -> Self {
        Self {
            user_cutoff,
            learned: f64::INFINITY,
        }
    }

    /// Current cutoff.
    pub fn cutoff(&self) -> f64 {
        self.learned.min(self.user_cutoff.unwrap_or(f64::INFINITY))
    }

    /// User seed.
    pub fn user_cutoff(&self) -> Option<f64> {
        self.user_cutoff
    }

    /// Replace the user cutoff. Returns true if the cutoff can only have
    /// decreased.
    pub fn set_user_cutoff(&mut self, value: f64) -> bool {
        let tighter = value <= self.user_cutoff.unwrap_or(f64::INFINITY);
        self.user_cutoff = Some(value);
        tighter
    }

    /// Fold in a known objective. Returns true if the cutoff improved.
    pub fn improve(&mut self, objective: f64) -> bool {
        let before = self.cutoff();
        if objective < self.learned {
            self.learned = objective;
        }
        self.cutoff() < before
    }

    /// Forget learned objectives (after solutions were discarded) and
    /// re-learn from the remaining ones.
    pub fn relearn<I: IntoIterator<Item = f64>>(&mut self, objectives: I) {
        self.learned = objectives.into_iter().fold(f64::INFINITY, f64::min);
    }

    /// Build a status from the search state.
    ///
    /// `frontier_bound` is the frontier's lowest bound, or None when the
    /// frontier is empty.
    pub fn status(
        obj_up_b: f64,
        frontier_bound: Option<f64>,
        explored_nodes: u64,
        solve_time: f64,
        stop_reason: Option<StopReason>,
        settings: &BbSettings,
    ) -> SearchStatus {
        let has_solution = obj_up_b.is_finite();
        let obj_lo_b = match frontier_bound {
            None => obj_up_b,
            Some(b) => b.min(obj_up_b),
        };
        let abs_gap = SearchStatus::compute_abs_gap(obj_up_b, obj_lo_b);
        let rel_gap = SearchStatus::compute_gap(obj_up_b, obj_lo_b);
        let gap_closed = has_solution
            && (abs_gap <= settings.absolute_gap_tolerance
                || rel_gap <= settings.relative_gap_tolerance);

        let description = match (frontier_bound.is_none(), has_solution) {
            (true, true) => StatusDescription::OptimalSolutionFound,
            (true, false) => StatusDescription::Infeasible,
            (false, true) if gap_closed => StatusDescription::OptimalSolutionFound,
            (false, true) => StatusDescription::SuboptimalSolutionFound,
            (false, false) => StatusDescription::Unknown,
        };

        SearchStatus {
            description,
            obj_up_b,
            obj_lo_b,
            abs_gap,
            rel_gap,
            explored_nodes,
            solve_time,
            stop_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cutoff_only_improves() {
        let mut broker = BoundBroker::new(None);
        assert_eq!(broker.cutoff(), f64::INFINITY);
        assert!(broker.improve(10.0));
        assert!(!broker.improve(12.0));
        assert!(broker.improve(8.0));
        assert_eq!(broker.cutoff(), 8.0);
    }

    #[test]
    fn test_user_cutoff() {
        let mut broker = BoundBroker::new(Some(5.0));
        assert_eq!(broker.cutoff(), 5.0);
        assert!(!broker.improve(7.0));
        assert_eq!(broker.cutoff(), 5.0);

        assert!(!broker.set_user_cutoff(9.0));
        assert_eq!(broker.cutoff(), 7.0);
        assert!(broker.set_user_cutoff(1.0));
        assert_eq!(broker.cutoff(), 1.0);
    }

    #[test]
    fn test_relearn() {
        let mut broker = BoundBroker::new(None);
        broker.improve(3.0);
        broker.relearn(Vec::new());
        assert_eq!(broker.cutoff(), f64::INFINITY);
        broker.relearn(vec![4.0, 2.0]);
        assert_eq!(broker.cutoff(), 2.0);
    }

    #[test]
    fn test_status_descriptions() {
        let s = BbSettings::default();
        let inf = f64::INFINITY;

        let st = BoundBroker::status(inf, Some(0.0), 0, 0.0, None, &s);
        assert_eq!(st.description, StatusDescription::Unknown);

        let st = BoundBroker::status(inf, None, 4, 0.0, None, &s);
        assert_eq!(st.description, StatusDescription::Infeasible);

        let st = BoundBroker::status(2.0, None, 4, 0.0, None, &s);
        assert_eq!(st.description, StatusDescription::OptimalSolutionFound);
        assert_eq!(st.obj_lo_b, 2.0);

        let st = BoundBroker::status(2.0, Some(1.0), 4, 0.0, Some(StopReason::TimeLimit), &s);
        assert_eq!(st.description, StatusDescription::SuboptimalSolutionFound);
        assert_eq!(st.abs_gap, 1.0);

        let st = BoundBroker::status(2.0, Some(2.0 - 1e-7), 4, 0.0, None, &s);
        assert_eq!(st.description, StatusDescription::OptimalSolutionFound);
    }
}
