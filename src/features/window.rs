//! Grouped and windowed accumulators
//!
//! All feature columns are built from a handful of ordered passes over the
//! sorted shot table: whole-group totals, running totals, a trailing row
//! window, and a partitioned shift followed by a forward fill.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// Ratio that resolves an empty denominator to zero
#[inline]
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Makes and attempts for some group of shots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShotTally {
    pub makes: u32,
    pub attempts: u32,
}

impl ShotTally {
    pub fn record(&mut self, made: bool) {
        self.attempts += 1;
        if made {
            self.makes += 1;
        }
    }

    /// Make percentage (0-1), zero when nothing was attempted
    pub fn percentage(&self) -> f64 {
        ratio(self.makes as f64, self.attempts as f64)
    }
}

/// Totals over every row sharing a key.
///
/// Returns one tally per input row, equal to the full tally of that row's
/// group (a grouped transform rather than a running sum).
pub fn group_totals<K: Eq + Hash>(keys: &[K], made: &[bool]) -> Vec<ShotTally> {
    let mut totals: HashMap<&K, ShotTally> = HashMap::new();
    for (key, made) in keys.iter().zip(made) {
        totals.entry(key).or_default().record(*made);
    }
    keys.iter()
        .map(|key| totals.get(key).copied().unwrap_or_default())
        .collect()
}

/// Running tally per group, inclusive of the current row
pub fn running_totals<K: Eq + Hash>(keys: &[K], made: &[bool]) -> Vec<ShotTally> {
    let mut running: HashMap<&K, ShotTally> = HashMap::new();
    keys.iter()
        .zip(made)
        .map(|(key, made)| {
            let tally = running.entry(key).or_default();
            tally.record(*made);
            *tally
        })
        .collect()
}

/// Running sum of an integer column per group, inclusive of the current row
pub fn running_sum<K: Eq + Hash>(keys: &[K], values: &[u32]) -> Vec<u32> {
    let mut running: HashMap<&K, u32> = HashMap::new();
    keys.iter()
        .zip(values)
        .map(|(key, value)| {
            let sum = running.entry(key).or_insert(0);
            *sum += *value;
            *sum
        })
        .collect()
}

/// Trailing window over the last `size` rows of each group
pub struct TrailingWindow<K> {
    size: usize,
    recent: HashMap<K, VecDeque<bool>>,
}

impl<K: Eq + Hash> TrailingWindow<K> {
    pub fn new(size: usize) -> Self {
        TrailingWindow {
            size: size.max(1),
            recent: HashMap::new(),
        }
    }

    /// Push a row into its group and return the tally of the window ending
    /// at that row. A group's first rows use however many rows exist.
    pub fn push(&mut self, key: K, made: bool) -> ShotTally {
        let window = self.recent.entry(key).or_default();
        window.push_back(made);
        if window.len() > self.size {
            window.pop_front();
        }
        ShotTally {
            makes: window.iter().filter(|m| **m).count() as u32,
            attempts: window.len() as u32,
        }
    }
}

/// Trailing `size`-row tally per group
pub fn trailing_totals<K: Eq + Hash + Clone>(
    keys: &[K],
    made: &[bool],
    size: usize,
) -> Vec<ShotTally> {
    let mut window = TrailingWindow::new(size);
    keys.iter()
        .zip(made)
        .map(|(key, made)| window.push(key.clone(), *made))
        .collect()
}

/// Shift a column by one position within each partition.
///
/// Rows whose partition key is `None` are outside the subset being shifted
/// and receive `None`, as does the first row of every partition.
pub fn shift_within<K: Eq + Hash>(keys: &[Option<K>], values: &[u32]) -> Vec<Option<u32>> {
    let mut previous: HashMap<&K, u32> = HashMap::new();
    keys.iter()
        .zip(values)
        .map(|(key, value)| match key {
            Some(k) => previous.insert(k, *value),
            None => None,
        })
        .collect()
}

/// Forward-fill across the whole sequence, then replace leading gaps
pub fn forward_fill(values: &[Option<u32>], leading: u32) -> Vec<u32> {
    let mut last = None;
    values
        .iter()
        .map(|value| {
            if value.is_some() {
                last = *value;
            }
            last.unwrap_or(leading)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_zero_denominator() {
        assert_eq!(ratio(3.0, 0.0), 0.0);
        assert_eq!(ratio(0.0, 0.0), 0.0);
        assert_eq!(ShotTally::default().percentage(), 0.0);
        assert!((ratio(1.0, 4.0) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_group_totals_cover_whole_group() {
        let keys = [1, 2, 1, 1];
        let made = [true, false, false, true];
        let totals = group_totals(&keys, &made);
        assert_eq!(totals[0], ShotTally { makes: 2, attempts: 3 });
        assert_eq!(totals[3], totals[0]);
        assert_eq!(totals[1], ShotTally { makes: 0, attempts: 1 });
    }

    #[test]
    fn test_running_totals() {
        let keys = [1, 2, 1, 1];
        let made = [true, true, false, true];
        let running = running_totals(&keys, &made);
        assert_eq!(running[0], ShotTally { makes: 1, attempts: 1 });
        assert_eq!(running[2], ShotTally { makes: 1, attempts: 2 });
        assert_eq!(running[3], ShotTally { makes: 2, attempts: 3 });
        assert_eq!(running[1], ShotTally { makes: 1, attempts: 1 });
    }

    #[test]
    fn test_trailing_window_drops_oldest() {
        let made = [true, false, false, false, false, false];
        let keys = ["a"; 6];
        let tallies = trailing_totals(&keys, &made, 5);
        assert_eq!(tallies[0], ShotTally { makes: 1, attempts: 1 });
        assert_eq!(tallies[4], ShotTally { makes: 1, attempts: 5 });
        // Row 1 has left the window
        assert_eq!(tallies[5], ShotTally { makes: 0, attempts: 5 });
    }

    #[test]
    fn test_running_sum_per_group() {
        let keys = ["us", "them", "us", "us"];
        let points = [2, 3, 0, 3];
        assert_eq!(running_sum(&keys, &points), vec![2, 3, 2, 5]);
    }

    #[test]
    fn test_shift_and_fill() {
        let keys = [Some(1), None, Some(1), Some(2), None];
        let values = [2, 9, 5, 3, 9];
        let shifted = shift_within(&keys, &values);
        assert_eq!(shifted, vec![None, None, Some(2), None, None]);

        let filled = forward_fill(&shifted, 0);
        assert_eq!(filled, vec![0, 0, 2, 2, 2]);
    }
}
