/// argmax returns the index of the maximum value in the array x. On ties the first index wins.
pub fn argmax<T: std::cmp::PartialOrd + std::marker::Copy>(x: &[T]) -> usize {
    let mut idx_max = 0;
    let mut val_max = x[0];

    for (i, &val) in x.iter().enumerate().skip(1) {
        if val > val_max {
            val_max = val;
            idx_max = i;
        }
    }

    idx_max
}

#[derive(Debug, Clone, Copy)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// argsort returns the indices that would sort an array. The sort is stable, i.e. equal values
/// keep their original order.
pub fn argsort<T: std::cmp::PartialOrd>(x: &[T], order: SortOrder) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..x.len()).collect();
    match order {
        SortOrder::Ascending => indices.sort_by(|&a, &b| {
            x[a].partial_cmp(&x[b]).unwrap_or(std::cmp::Ordering::Equal)
        }),
        SortOrder::Descending => indices.sort_by(|&a, &b| {
            x[b].partial_cmp(&x[a]).unwrap_or(std::cmp::Ordering::Equal)
        }),
    }
    indices
}

/// approach moves cur a fraction of the way towards target (one step of an exponential
/// smoothing filter). factor is clamped to [0.0, 1.0].
pub fn approach(cur: f64, target: f64, factor: f64) -> f64 {
    cur + (target - cur) * factor.clamp(0.0, 1.0)
}

/// lin_interp returns the linearly interpolated value at x for given discrete data points xp, fp.
/// xp must be increasing. Inspired by numpy.interp.
pub fn lin_interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    if xp.len() != fp.len() {
        panic!("Number of items in xp and fp must be equal!")
    }

    if x <= xp[0] {
        return fp[0];
    }

    for i in 1..xp.len() {
        if x <= xp[i] {
            return fp[i - 1] + (x - xp[i - 1]) * (fp[i] - fp[i - 1]) / (xp[i] - xp[i - 1]);
        }
    }

    *fp.last().unwrap()
}
