//! Observation clustering by proximity vote.
//!
//! Single-frame detections are noisy.  [`ClusterSet`] accumulates repeated
//! observations of the same object into spatial clusters; the cluster with the
//! most members is taken as the consensus location.  This is a greedy online
//! approximation, not a probabilistic filter.
//!
//! # Merge rule
//!
//! A new point joins the cluster whose centroid is *strictly* closest to it,
//! provided the squared distance is below the radius threshold (`0.01` by
//! default, i.e. ≈0.1 m).  Among equally close clusters the first one created
//! wins.  Otherwise the point starts a new cluster.  Clusters are never merged
//! or removed.
//!
//! # Example
//!
//! ```rust
//! use mantis_perception::consensus::ClusterSet;
//! use mantis_types::Point;
//!
//! let mut set = ClusterSet::default();
//! set.insert(Point::planar(1.00, 0.00));
//! set.insert(Point::planar(1.02, 0.01));
//! set.insert(Point::planar(3.00, 0.00));
//!
//! assert_eq!(set.len(), 2);
//! let best = set.consensus(2).unwrap();
//! assert_eq!(best.count(), 2);
//! assert!((best.position().x - 1.01).abs() < 1e-5);
//! ```

use mantis_types::Point;

/// Default squared merge radius.
pub const DEFAULT_RADIUS_SQ: f32 = 0.01;

// ────────────────────────────────────────────────────────────────────────────
// Cluster
// ────────────────────────────────────────────────────────────────────────────

/// A bag of observations believed to be the same object.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    centroid: Point,
    members: Vec<Point>,
}

impl Cluster {
    fn new(point: Point) -> Self {
        Self {
            centroid: Point::new(point.x, point.y, point.z),
            members: vec![point],
        }
    }

    fn absorb(&mut self, point: Point) {
        self.members.push(point);
        let n = self.members.len() as f32;
        // Running mean.
        self.centroid = Point::new(
            self.centroid.x + (point.x - self.centroid.x) / n,
            self.centroid.y + (point.y - self.centroid.y) / n,
            self.centroid.z + (point.z - self.centroid.z) / n,
        );
    }

    /// Representative position: the running centroid of every member.
    pub fn position(&self) -> Point {
        self.centroid
    }

    /// Number of merged observations.
    pub fn count(&self) -> usize {
        self.members.len()
    }

    pub fn members(&self) -> &[Point] {
        &self.members
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ClusterSet
// ────────────────────────────────────────────────────────────────────────────

/// The growing set of clusters for one consensus-gathering call.
#[derive(Debug, Clone)]
pub struct ClusterSet {
    radius_sq: f32,
    clusters: Vec<Cluster>,
}

impl Default for ClusterSet {
    fn default() -> Self {
        Self::new(DEFAULT_RADIUS_SQ)
    }
}

impl ClusterSet {
    /// Create an empty set merging points closer than `sqrt(radius_sq)`.
    pub fn new(radius_sq: f32) -> Self {
        Self {
            radius_sq,
            clusters: Vec::new(),
        }
    }

    /// Merge `point` into the nearest qualifying cluster, or start a new one.
    ///
    /// Returns the index of the cluster that received the point, or `None`
    /// when the point is invalid and was rejected.
    pub fn insert(&mut self, point: Point) -> Option<usize> {
        if !point.valid {
            return None;
        }

        let mut nearest: Option<usize> = None;
        let mut min_d = self.radius_sq;
        for (idx, cluster) in self.clusters.iter().enumerate() {
            let d = cluster.centroid.distance_sq(&point);
            if d >= min_d {
                continue;
            }
            nearest = Some(idx);
            min_d = d;
        }

        match nearest {
            Some(idx) => {
                self.clusters[idx].absorb(point);
                Some(idx)
            }
            None => {
                self.clusters.push(Cluster::new(point));
                Some(self.clusters.len() - 1)
            }
        }
    }

    /// The cluster with the highest count; the earliest one on ties.
    pub fn best(&self) -> Option<&Cluster> {
        let mut best: Option<&Cluster> = None;
        for cluster in &self.clusters {
            if best.is_none_or(|b| cluster.count() > b.count()) {
                best = Some(cluster);
            }
        }
        best
    }

    /// The best cluster, if it has at least `min_count` members.
    pub fn consensus(&self, min_count: usize) -> Option<&Cluster> {
        self.best().filter(|c| c.count() >= min_count)
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert_n(set: &mut ClusterSet, point: Point, n: usize) {
        for _ in 0..n {
            set.insert(point);
        }
    }

    #[test]
    fn same_point_twice_makes_one_cluster_of_two() {
        let mut set = ClusterSet::default();
        let p = Point::new(0.5, 0.2, 0.1);
        assert_eq!(set.insert(p), Some(0));
        assert_eq!(set.insert(p), Some(0));
        assert_eq!(set.len(), 1);
        assert_eq!(set.clusters()[0].count(), 2);
    }

    #[test]
    fn points_beyond_radius_are_separate() {
        let mut set = ClusterSet::default();
        set.insert(Point::planar(0.0, 0.0));
        // 0.11² = 0.0121 > 0.01
        set.insert(Point::planar(0.11, 0.0));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn boundary_distance_does_not_merge() {
        let mut set = ClusterSet::new(0.25);
        set.insert(Point::planar(0.0, 0.0));
        // Exactly on the threshold: d == radius_sq is rejected.
        set.insert(Point::planar(0.5, 0.0));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn merges_into_strictly_closest_cluster() {
        let mut set = ClusterSet::new(1.0);
        set.insert(Point::planar(0.0, 0.0));
        set.insert(Point::planar(1.5, 0.0));
        // Within range of both; closer to the second.
        assert_eq!(set.insert(Point::planar(0.9, 0.0)), Some(1));
    }

    #[test]
    fn ties_go_to_first_cluster() {
        let mut set = ClusterSet::new(1.0);
        set.insert(Point::planar(0.0, 0.0));
        set.insert(Point::planar(1.2, 0.0));
        assert_eq!(set.insert(Point::planar(0.6, 0.0)), Some(0));
    }

    #[test]
    fn invalid_points_are_rejected() {
        let mut set = ClusterSet::default();
        assert_eq!(set.insert(Point::planar(0.0, 0.0).invalidated()), None);
        assert!(set.is_empty());
    }

    #[test]
    fn centroid_is_running_mean() {
        let mut set = ClusterSet::default();
        set.insert(Point::planar(1.00, 0.0));
        set.insert(Point::planar(1.02, 0.0));
        set.insert(Point::planar(1.06, 0.0));
        let c = &set.clusters()[0];
        assert!((c.position().x - (1.00 + 1.02 + 1.06) / 3.0).abs() < 1e-5);
        assert_eq!(c.members().len(), 3);
    }

    #[test]
    fn consensus_picks_highest_count() {
        let mut set = ClusterSet::default();
        insert_n(&mut set, Point::planar(0.0, 0.0), 3);
        insert_n(&mut set, Point::planar(1.0, 0.0), 7);
        insert_n(&mut set, Point::planar(2.0, 0.0), 2);

        let best = set.consensus(7).unwrap();
        assert_eq!(best.count(), 7);
        assert!((best.position().x - 1.0).abs() < 1e-6);
        assert!(set.consensus(5).is_some());
        assert!(set.consensus(8).is_none());
    }

    #[test]
    fn best_prefers_earliest_on_equal_counts() {
        let mut set = ClusterSet::default();
        insert_n(&mut set, Point::planar(0.0, 0.0), 2);
        insert_n(&mut set, Point::planar(5.0, 0.0), 2);
        assert!(set.best().unwrap().position().x.abs() < 1e-6);
    }

    #[test]
    fn empty_set_has_no_best() {
        let set = ClusterSet::default();
        assert!(set.best().is_none());
        assert!(set.consensus(0).is_none());
    }
}
