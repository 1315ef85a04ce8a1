//! Cutoff and solution exchange between workers.

use super::transport::{Message, Transport};
use crate::model::Solution;

/// What a search loop needs from its peers.
///
/// Polling never blocks; publishing is fire-and-forget.
pub trait PeerLink {
    /// Best peer objective received since the last poll.
    fn poll(&mut self) -> Option<f64>;

    /// Announce a solution that improved the local cutoff.
    fn publish(&mut self, solution: &Solution);

    /// Called after every processed node with the local cutoff.
    fn node_processed(&mut self, cutoff: f64);

    /// Announce that the local search loop returned.
    fn finish(&mut self, explored: u64);
}

/// Link for a worker running alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPeers;

impl PeerLink for NoPeers {
    fn poll(&mut self) -> Option<f64> {
        None
    }

    fn publish(&mut self, _solution: &Solution) {}

    fn node_processed(&mut self, _cutoff: f64) {}

    fn finish(&mut self, _explored: u64) {}
}

/// Latest state learned from peers.
#[derive(Debug, Clone, Default)]
pub struct GlobalView {
    /// Best cutoff seen from any peer.
    pub cutoff: Option<f64>,

    /// Best solution seen from any peer.
    pub best_solution: Option<Solution>,

    /// Workers that reported the end of their loop, with their node counts.
    pub finished: Vec<(usize, u64)>,
}

impl GlobalView {
    /// Fold another worker's view into this one.
    pub fn absorb(&mut self, other: GlobalView) {
        if let Some(value) = other.cutoff {
            self.fold_cutoff(value);
        }
        if let Some(solution) = other.best_solution {
            self.fold_solution(solution);
        }
        for entry in other.finished {
            if !self.finished.contains(&entry) {
                self.finished.push(entry);
            }
        }
        self.finished.sort_unstable();
    }

    fn merge(&mut self, message: Message) -> Option<f64> {
        match message {
            Message::Cutoff { value, .. } => {
                self.fold_cutoff(value);
                Some(value)
            }
            Message::Solution { solution, .. } => {
                let value = solution.objective;
                self.fold_cutoff(value);
                self.fold_solution(solution);
                Some(value)
            }
            Message::Finished { from, explored } => {
                self.finished.push((from, explored));
                None
            }
        }
    }

    fn fold_cutoff(&mut self, value: f64) {
        if self.cutoff.map_or(true, |c| value < c) {
            self.cutoff = Some(value);
        }
    }

    fn fold_solution(&mut self, solution: Solution) {
        let better = self
            .best_solution
            .as_ref()
            .map_or(true, |b| solution.objective < b.objective);
        if better {
            self.best_solution = Some(solution);
        }
    }
}

/// Per-worker coordinator: broadcasts the cutoff every `sync_frequency`
/// nodes and every improving solution immediately, and merges peer messages
/// into a [`GlobalView`].
pub struct WorkerCoordinator<T: Transport> {
    transport: T,
    sync_frequency: u64,
    since_sync: u64,
    last_sent: f64,
    global: GlobalView,
}

impl<T: Transport> WorkerCoordinator<T> {
    /// Create a coordinator over a transport.
    pub fn new(transport: T, sync_frequency: u64) -> Self {
        Self {
            transport,
            sync_frequency: sync_frequency.max(1),
            since_sync: 0,
            last_sent: f64::INFINITY,
            global: GlobalView::default(),
        }
    }

    /// Id of the local worker.
    pub fn worker(&self) -> usize {
        self.transport.id()
    }

    /// State merged from peers so far.
    pub fn global_view(&self) -> &GlobalView {
        &self.global
    }

    /// Merge every message still queued and return the view.
    pub fn into_view(mut self) -> GlobalView {
        self.poll();
        self.global
    }

    fn send_all(&mut self, message: Message) {
        if let Err(e) = self.transport.broadcast(&message) {
            log::debug!("worker {}: broadcast failed: {}", self.transport.id(), e);
        }
    }
}

impl<T: Transport> PeerLink for WorkerCoordinator<T> {
    fn poll(&mut self) -> Option<f64> {
        let mut best: Option<f64> = None;
        while let Some(message) = self.transport.try_recv() {
            if let Some(value) = self.global.merge(message) {
                best = Some(best.map_or(value, |b| b.min(value)));
            }
        }
        best
    }

    fn publish(&mut self, solution: &Solution) {
        self.last_sent = self.last_sent.min(solution.objective);
        self.since_sync = 0;
        self.send_all(Message::Solution {
            from: self.transport.id(),
            solution: solution.clone(),
        });
    }

    fn node_processed(&mut self, cutoff: f64) {
        self.since_sync += 1;
        if self.since_sync < self.sync_frequency {
            return;
        }
        self.since_sync = 0;
        if cutoff < self.last_sent {
            self.last_sent = cutoff;
            self.send_all(Message::Cutoff {
                from: self.transport.id(),
                value: cutoff,
            });
        }
    }

    fn finish(&mut self, explored: u64) {
        self.send_all(Message::Finished {
            from: self.transport.id(),
            explored,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::ChannelTransport;

    fn solution(objective: f64) -> Solution {
        Solution {
            point: vec![objective],
            objective,
            node_id: 1,
            worker: 0,
        }
    }

    #[test]
    fn test_solution_broadcast_and_merge() {
        let mut mesh = ChannelTransport::mesh(2).into_iter();
        let mut a = WorkerCoordinator::new(mesh.next().unwrap(), 5);
        let mut b = WorkerCoordinator::new(mesh.next().unwrap(), 5);

        a.publish(&solution(4.0));
        a.publish(&solution(3.0));
        assert_eq!(b.poll(), Some(3.0));
        assert_eq!(b.poll(), None);
        assert_eq!(b.global_view().cutoff, Some(3.0));
        assert_eq!(
            b.global_view().best_solution.as_ref().map(|s| s.objective),
            Some(3.0)
        );
    }

    #[test]
    fn test_periodic_cutoff_sync() {
        let mut mesh = ChannelTransport::mesh(2).into_iter();
        let mut a = WorkerCoordinator::new(mesh.next().unwrap(), 3);
        let mut b = WorkerCoordinator::new(mesh.next().unwrap(), 3);

        a.node_processed(7.0);
        a.node_processed(7.0);
        assert_eq!(b.poll(), None);
        a.node_processed(7.0);
        assert_eq!(b.poll(), Some(7.0));

        // Unchanged cutoff is not re-sent
        for _ in 0..3 {
            a.node_processed(7.0);
        }
        assert_eq!(b.poll(), None);

        a.finish(6);
        assert_eq!(b.poll(), None);
        assert_eq!(b.global_view().finished, vec![(0, 6)]);
    }

    #[test]
    fn test_no_peers() {
        let mut link = NoPeers;
        link.publish(&solution(1.0));
        link.node_processed(1.0);
        assert_eq!(link.poll(), None);
    }

    #[test]
    fn test_views_merge_across_workers() {
        let mut mesh = ChannelTransport::mesh(3).into_iter();
        let mut a = WorkerCoordinator::new(mesh.next().unwrap(), 5);
        let mut b = WorkerCoordinator::new(mesh.next().unwrap(), 5);
        let c = WorkerCoordinator::new(mesh.next().unwrap(), 5);

        a.publish(&solution(4.0));
        b.publish(&solution(2.5));
        a.finish(3);
        b.finish(7);

        // a only hears from b and the other way round; c hears both
        let mut merged = a.into_view();
        assert_eq!(merged.cutoff, Some(2.5));
        merged.absorb(b.into_view());
        merged.absorb(c.into_view());

        assert_eq!(merged.cutoff, Some(2.5));
        assert_eq!(
            merged.best_solution.as_ref().map(|s| s.objective),
            Some(2.5)
        );
        assert_eq!(merged.finished, vec![(0, 3), (1, 7)]);
    }
}
