//! Consensus gathering over repeated single-shot sightings.
//!
//! Sightings are expressed in the working frame through a fresh transform
//! each time and voted into a [`ClusterSet`].  The first cluster to reach
//! `min_count` members wins.  Gathering issues no motion, so it takes no
//! motion lock, but it honours cancellation and its own attempt budget.

use mantis_hal::RobotPort;
use mantis_kernel::IterationGuard;
use mantis_perception::{Cluster, ClusterSet};
use mantis_types::{Point, Sighting};
use tracing::{debug, info, instrument, warn};

use crate::controller::Controller;
use crate::error::{ControlError, ControlResult};

/// A consensus target location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsensusReport {
    /// Centroid of the winning cluster, in the working frame.
    pub position: Point,
    pub count: usize,
    /// Sampling attempts used, misses included.
    pub attempts: usize,
    /// Clusters formed along the way.
    pub clusters: usize,
}

impl<R: RobotPort> Controller<R> {
    /// Gather sightings until one cluster holds `min_count` of them, within
    /// the configured iteration budget.
    pub fn gather_consensus(&self, min_count: usize) -> ControlResult<ConsensusReport> {
        self.accumulate_until_consensus(min_count, self.config.max_iterations)
    }

    /// Gather sightings until one cluster holds `min_count` of them.
    ///
    /// # Errors
    ///
    /// - [`ControlError::NoTarget`] once the source reports no target visible.
    /// - [`ControlError::NoConsensus`] when `max_attempts` (or the wall-clock
    ///   budget) runs out first.
    /// - [`ControlError::Unavailable`] when sampling or the transform fails.
    #[instrument(skip(self))]
    pub fn accumulate_until_consensus(&self, min_count: usize, max_attempts: usize) -> ControlResult<ConsensusReport> {
        let cfg = &self.config;
        let mut guard = IterationGuard::new(max_attempts, cfg.max_duration());
        let mut clusters = ClusterSet::new(cfg.cluster_radius_sq);

        loop {
            if self.is_cancelled() {
                return Err(ControlError::Cancelled);
            }
            let Ok(attempt) = guard.tick() else {
                let best_count = clusters.best().map_or(0, Cluster::count);
                warn!(attempts = guard.iterations(), best_count, "no consensus");
                return Err(ControlError::NoConsensus {
                    attempts: guard.iterations(),
                    best_count,
                });
            };

            let point = match self.robot.sample_detection()? {
                Sighting::Seen(point) if point.valid => point,
                Sighting::Seen(_) => {
                    debug!(attempt, "invalid observation rejected");
                    continue;
                }
                Sighting::Missed => {
                    debug!(attempt, "transient miss");
                    continue;
                }
                Sighting::Absent => {
                    info!(attempt, "no target visible");
                    return Err(ControlError::NoTarget);
                }
            };

            let working = self
                .robot
                .transform(&cfg.working_frame, &cfg.base_frame)?
                .apply(&point);
            clusters.insert(working);

            if let Some(winner) = clusters.consensus(min_count) {
                let report = ConsensusReport {
                    position: winner.position(),
                    count: winner.count(),
                    attempts: attempt,
                    clusters: clusters.len(),
                };
                info!(
                    x = report.position.x,
                    y = report.position.y,
                    count = report.count,
                    attempts = attempt,
                    "consensus reached"
                );
                return Ok(report);
            }
        }
    }

    /// A single confirmed sighting in the working frame.
    pub fn glance(&self) -> ControlResult<Point> {
        Ok(self.gather_consensus(1)?.position)
    }
}
