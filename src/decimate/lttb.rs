use crate::domain::LinePoint;

/// Largest-Triangle-Three-Buckets downsampling for line series.
///
/// Returns the input unchanged when `budget >= points.len()`. Otherwise the output has
/// exactly `budget` points with the first and last kept; a budget below 3 keeps only
/// those two.
pub fn lttb(points: &[LinePoint], budget: usize) -> Vec<LinePoint> {
    let n = points.len();
    if budget >= n {
        return points.to_vec();
    }
    if budget < 3 {
        // n >= 2 here since budget < n
        return vec![points[0], points[n - 1]];
    }

    let bucket_size = (n - 2) as f64 / (budget - 2) as f64;
    let mut sampled = Vec::with_capacity(budget);
    sampled.push(points[0]);

    // Index of the point picked in the previous bucket
    let mut a = 0usize;
    for i in 0..(budget - 2) {
        let start = (i as f64 * bucket_size).floor() as usize + 1;
        let end = ((i + 1) as f64 * bucket_size).floor() as usize + 1;

        // Centroid of the next bucket; the last bucket looks at the final point
        let next_start = end;
        let next_end = (((i + 2) as f64 * bucket_size).floor() as usize + 1).min(n);
        let next = &points[next_start..next_end.max(next_start + 1)];
        let count = next.len() as f64;
        let avg_x = next.iter().map(|p| p.time as f64).sum::<f64>() / count;
        let avg_y = next.iter().map(|p| p.value).sum::<f64>() / count;

        let (a_x, a_y) = (points[a].time as f64, points[a].value);
        let mut max_area = -1.0;
        let mut max_idx = start;
        for (k, p) in points.iter().enumerate().take(end.max(start + 1)).skip(start) {
            let area = ((a_x - avg_x) * (p.value - a_y) - (a_x - p.time as f64) * (avg_y - a_y)).abs();
            if area > max_area {
                max_area = area;
                max_idx = k;
            }
        }
        sampled.push(points[max_idx]);
        a = max_idx;
    }

    sampled.push(points[n - 1]);
    sampled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saw(n: usize) -> Vec<LinePoint> {
        (0..n)
            .map(|i| LinePoint::new(i as i64 * 60, ((i * 7) % 13) as f64 - 6.0))
            .collect()
    }

    #[test]
    fn test_budget_at_least_len_is_identity() {
        let points = saw(50);
        assert_eq!(lttb(&points, 50), points);
        assert_eq!(lttb(&points, 500), points);
    }

    #[test]
    fn test_output_length_and_endpoints() {
        let points = saw(1000);
        for budget in [3, 10, 99, 500, 999] {
            let out = lttb(&points, budget);
            assert_eq!(out.len(), budget, "budget {}", budget);
            assert_eq!(out[0], points[0]);
            assert_eq!(out[budget - 1], points[999]);
            assert!(out.windows(2).all(|w| w[0].time < w[1].time), "output must stay ordered");
        }
    }

    #[test]
    fn test_tiny_budget_keeps_endpoints() {
        let points = saw(10);
        assert_eq!(lttb(&points, 2), vec![points[0], points[9]]);
        assert_eq!(lttb(&points, 0), vec![points[0], points[9]]);
    }

    #[test]
    fn test_keeps_spike() {
        let mut points: Vec<LinePoint> = (0..100).map(|i| LinePoint::new(i, 0.0)).collect();
        points[50].value = 100.0;
        let out = lttb(&points, 10);
        assert!(out.iter().any(|p| p.value == 100.0), "spike should survive");
    }
}
