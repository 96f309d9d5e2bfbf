//! Deterministic one-dimensional k-means (k = 2 or 3) used to rank factor performance.

use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::utils::maths_utils::percentile_index;

/// Largest supported k; also the number of cluster labels.
pub const MAX_K: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Cluster {
    Low,
    Avg,
    Top,
}

/// Result of partitioning a set of values.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// One label per input value, in input order
    pub labels: Vec<Cluster>,
    /// Mean of each label's members (`None` when the label is unused)
    pub means: [Option<f64>; MAX_K],
}

impl Partition {
    pub fn mean_of(&self, cluster: Cluster) -> Option<f64> {
        self.means[cluster as usize]
    }

    /// Input positions carrying `cluster`, ascending.
    pub fn members(&self, cluster: Cluster) -> impl Iterator<Item = usize> + '_ {
        self.labels
            .iter()
            .enumerate()
            .filter(move |(_, label)| **label == cluster)
            .map(|(i, _)| i)
    }
}

/// Split `values` into `k` groups (2 or 3, clamped) labelled by ascending cluster mean.
///
/// Values are first sorted by (value, input position), centroids start at the
/// 25th/50th/75th percentiles (the first `k` of them) and ties in assignment go to the
/// lower centroid, so the result only depends on the values and their positions. With
/// one distinct group everything is TOP; with two, LOW and TOP.
pub fn partition(values: &[f64], k: usize, max_iterations: usize) -> Partition {
    let n = values.len();
    if n == 0 {
        return Partition {
            labels: Vec::new(),
            means: [None; MAX_K],
        };
    }
    let k = k.clamp(2, MAX_K);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]).then(a.cmp(&b)));
    let sorted: Vec<f64> = order.iter().map(|&i| values[i]).collect();

    let mut centroids: Vec<f64> = [25.0, 50.0, 75.0][..k]
        .iter()
        .map(|&pct| sorted[percentile_index(n, pct)])
        .collect();
    let mut assignment = vec![usize::MAX; n];

    for _ in 0..max_iterations.max(1) {
        let mut changed = false;
        for (slot, &value) in assignment.iter_mut().zip(&sorted) {
            let nearest = nearest_centroid(&centroids, value);
            if *slot != nearest {
                *slot = nearest;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let (sums, counts) = group_sums(&assignment, &sorted);
        for c in 0..k {
            // Empty clusters keep their centroid
            if counts[c] > 0 {
                centroids[c] = sums[c] / counts[c] as f64;
            }
        }
    }

    let (sums, counts) = group_sums(&assignment, &sorted);
    let mut used: Vec<(usize, f64)> = (0..k)
        .filter(|&c| counts[c] > 0)
        .map(|c| (c, sums[c] / counts[c] as f64))
        .collect();
    used.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

    let names: &[Cluster] = match used.len() {
        1 => &[Cluster::Top],
        2 => &[Cluster::Low, Cluster::Top],
        _ => &[Cluster::Low, Cluster::Avg, Cluster::Top],
    };
    let mut label_of = [Cluster::Top; MAX_K];
    let mut means = [None; MAX_K];
    for (&(c, mean), &name) in used.iter().zip(names) {
        label_of[c] = name;
        means[name as usize] = Some(mean);
    }

    let mut labels = vec![Cluster::Top; n];
    for (&input_pos, &c) in order.iter().zip(&assignment) {
        labels[input_pos] = label_of[c];
    }
    Partition { labels, means }
}

fn group_sums(assignment: &[usize], sorted: &[f64]) -> ([f64; MAX_K], [usize; MAX_K]) {
    let mut sums = [0.0; MAX_K];
    let mut counts = [0usize; MAX_K];
    for (&c, &value) in assignment.iter().zip(sorted) {
        sums[c] += value;
        counts[c] += 1;
    }
    (sums, counts)
}

fn nearest_centroid(centroids: &[f64], value: f64) -> usize {
    let mut best = 0;
    let mut best_dist = (value - centroids[0]).abs();
    for (c, centroid) in centroids.iter().enumerate().skip(1) {
        let dist = (value - centroid).abs();
        if dist < best_dist {
            best = c;
            best_dist = dist;
        }
    }
    best
}
