//! Combination utilities over lists of candidates: cartesian iteration
//! with running cost, prefix-filtered combination search, and min-sorting.

use crate::cost::Cost;

/// Verdict of a combination filter on one appended element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComboResult {
    /// Reject this element; siblings may still work.
    RejectThis,
    /// Reject this element and every later sibling at this position.
    RejectAfter,
    Accept,
}

/// A stateful filter driven through combinations one element at a time.
/// Rejecting a prefix rejects every combination extending it.
pub trait ComboIter<T> {
    type Out;

    /// Offers the next element of the current combination.
    fn append(&mut self, x: &T) -> ComboResult;

    /// Removes the most recently accepted element.
    fn backtrack(&mut self);

    /// Produces the output for the current complete combination.
    fn finalize(&mut self) -> Self::Out;
}

/// Runs `iter` over every combination drawn one element from each queue,
/// skipping all extensions of any rejected prefix. Returns the outputs
/// of the accepted complete combinations.
pub fn filter_combos<T, I: ComboIter<T>>(queues: &[Vec<T>], mut iter: I) -> Vec<I::Out> {
    let n = queues.len();
    let mut out = Vec::new();
    if n == 0 || queues.iter().any(|q| q.is_empty()) {
        return out;
    }

    let mut inds: Vec<usize> = vec![0];
    loop {
        let i = inds.len() - 1;
        let flag = iter.append(&queues[i][inds[i]]);

        if flag == ComboResult::Accept {
            if i + 1 == n {
                // a full combination; emit and keep scanning this place
                out.push(iter.finalize());
                iter.backtrack();
            } else {
                inds.push(0);
                continue;
            }
        }

        if flag != ComboResult::RejectAfter {
            let last = inds.len() - 1;
            inds[last] += 1;
            if inds[last] < queues[last].len() {
                continue;
            }
        }

        // current place exhausted; backtrack to the next prefix
        inds.pop();
        while !inds.is_empty() {
            let last = inds.len() - 1;
            inds[last] += 1;
            if inds[last] < queues[last].len() {
                break;
            }
            iter.backtrack();
            inds.pop();
        }
        if inds.is_empty() {
            return out;
        }
    }
}

/// Calls `f` with each index combination over the queues.
pub fn for_each_combo<T>(queues: &[Vec<T>], mut f: impl FnMut(&[usize])) {
    if queues.is_empty() || queues.iter().any(|q| q.is_empty()) {
        return;
    }
    let mut inds = vec![0usize; queues.len()];
    loop {
        f(&inds);
        let mut i = queues.len() - 1;
        loop {
            if inds[i] + 1 < queues[i].len() {
                inds[i] += 1;
                break;
            }
            if i == 0 {
                return;
            }
            inds[i] = 0;
            i -= 1;
        }
    }
}

/// Eagerly merges the queues into every valid combination, tracking the
/// summed cost incrementally. Output order is unspecified.
pub fn unsorted_eager_merge<T: Clone>(
    queues: &[Vec<T>],
    cost_of: impl Fn(&T) -> Cost,
    valid: impl Fn(&[Vec<T>], &[usize]) -> bool,
) -> Vec<(Cost, Vec<T>)> {
    let mut out = Vec::new();
    if queues.is_empty() || queues.iter().any(|q| q.is_empty()) {
        return out;
    }

    let mut inds = vec![0usize; queues.len()];
    let mut k = queues
        .iter()
        .fold(Cost::zero(), |acc, q| acc + cost_of(&q[0]));

    loop {
        if valid(queues, &inds) {
            let combo: Vec<T> = queues.iter().zip(&inds).map(|(q, &j)| q[j].clone()).collect();
            out.push((k, combo));
        }

        let mut i = queues.len() - 1;
        loop {
            let j = inds[i];
            if j + 1 < queues[i].len() {
                k = k + cost_of(&queues[i][j + 1]) - cost_of(&queues[i][j]);
                inds[i] = j + 1;
                break;
            }
            if i == 0 {
                return out;
            }
            k = k + cost_of(&queues[i][0]) - cost_of(&queues[i][j]);
            inds[i] = 0;
            i -= 1;
        }
    }
}

/// Reorders the slice so every minimum element (by `lt`) is at the
/// front; returns the index of the last minimum.
pub fn sort_mins<T>(v: &mut [T], mut lt: impl FnMut(&T, &T) -> bool) -> usize {
    let mut min_pos = 0;
    for i in 1..v.len() {
        if lt(&v[i], &v[min_pos]) {
            min_pos = 0;
            v.swap(min_pos, i);
        } else if !lt(&v[min_pos], &v[i]) {
            min_pos += 1;
            v.swap(min_pos, i);
        }
    }
    min_pos
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Collects combinations whose running sum stays below a limit.
    struct BoundedSum {
        limit: i32,
        crnt: Vec<i32>,
    }

    impl ComboIter<i32> for BoundedSum {
        type Out = Vec<i32>;

        fn append(&mut self, x: &i32) -> ComboResult {
            if self.crnt.iter().sum::<i32>() + x > self.limit {
                return ComboResult::RejectThis;
            }
            self.crnt.push(*x);
            ComboResult::Accept
        }

        fn backtrack(&mut self) {
            self.crnt.pop();
        }

        fn finalize(&mut self) -> Vec<i32> {
            self.crnt.clone()
        }
    }

    #[test]
    fn filter_combos_prunes_prefixes() {
        let queues = vec![vec![1, 5], vec![1, 2]];
        let out = filter_combos(&queues, BoundedSum { limit: 3, crnt: Vec::new() });
        assert_eq!(out, vec![vec![1, 1], vec![1, 2]]);
    }

    #[test]
    fn filter_combos_empty_queue_yields_nothing() {
        let queues: Vec<Vec<i32>> = vec![vec![1], vec![]];
        let out = filter_combos(&queues, BoundedSum { limit: 10, crnt: Vec::new() });
        assert!(out.is_empty());
    }

    #[test]
    fn for_each_combo_visits_product() {
        let queues = vec![vec!['a', 'b'], vec!['x', 'y', 'z']];
        let mut seen = 0;
        for_each_combo(&queues, |_| seen += 1);
        assert_eq!(seen, 6);
    }

    #[test]
    fn eager_merge_tracks_costs() {
        let queues = vec![
            vec![Cost::zero(), Cost::from_safe(1)],
            vec![Cost::from_safe(2)],
        ];
        let mut out = unsorted_eager_merge(&queues, |c| *c, |_, _| true);
        out.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].0, Cost::from_safe(2));
        assert_eq!(out[1].0, Cost::from_safe(3));
    }

    #[test]
    fn eager_merge_respects_validator() {
        let queues = vec![vec![1, 2], vec![3, 4]];
        let out = unsorted_eager_merge(
            &queues,
            |_| Cost::zero(),
            |qs, inds| qs[0][inds[0]] + qs[1][inds[1]] != 5,
        );
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn sort_mins_groups_minima_in_front() {
        let mut v = vec![3, 1, 2, 1, 1];
        let last_min = sort_mins(&mut v, |a, b| a < b);
        assert_eq!(last_min, 2);
        assert_eq!(&v[..=last_min], &[1, 1, 1]);

        let mut single = vec![5];
        assert_eq!(sort_mins(&mut single, |a, b| a < b), 0);
    }
}
