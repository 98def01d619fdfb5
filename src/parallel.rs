//! Load balancing and parallel materialization.
//!
//! Splitting work is a pure function, [`balance`], that turns per-array
//! weights into disjoint groups.  Running the groups is the job of a
//! [`LoadExecutor`].  Every worker opens its own [`ArrayReader`], so readers
//! never share a file cursor, and decoded payloads are handed back to the
//! caller instead of being written into the directory.
//!
//! # Balancing
//! Each array weighs `length * 8` bytes for DOUB/CHAR and `length * 4` for
//! the rest.  If the heaviest array is more than `1/threads` of the total it
//! cannot share a worker: it gets a group of its own and the thread count
//! becomes the smallest `m >= 2` with `1/m <= fraction`.  The remaining
//! arrays are then packed greedily, in input order, moving to the next group
//! once the running fraction passes `1/m`.

use std::path::Path;

use tracing::debug;

use crate::array::ArrayData;
use crate::error::{EclError, Result};
use crate::header::FileFormat;
use crate::index::Directory;
use crate::io_stream::ArrayReader;

/// Result of [`balance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadPlan {
    /// Disjoint, non-empty index groups.
    pub groups:   Vec<Vec<usize>>,
    /// Number of workers the plan needs.
    pub threads:  usize,
    /// Array that was given an exclusive group, if any.
    pub dominant: Option<usize>,
}

/// Partition `(index, weight)` pairs into at most `threads` groups (more
/// never, fewer when a dominant array forces a smaller count).
pub fn balance(weights: &[(usize, u64)], threads: usize) -> LoadPlan {
    let threads = threads.max(1);
    let total: u64 = weights.iter().map(|&(_, w)| w).sum();

    if total == 0 || weights.len() < 2 || threads == 1 {
        let groups: Vec<Vec<usize>> = if weights.is_empty() {
            Vec::new()
        } else {
            vec![weights.iter().map(|&(i, _)| i).collect()]
        };
        return LoadPlan { threads: groups.len(), groups, dominant: None };
    }

    let fractions: Vec<(usize, f64)> = weights
        .iter()
        .map(|&(i, w)| (i, w as f64 / total as f64))
        .collect();

    // First maximum wins on ties.
    let (heaviest, max_frac) = fractions
        .iter()
        .enumerate()
        .fold((0, f64::MIN), |best, (pos, &(_, f))| if f > best.1 { (pos, f) } else { best });

    let mut groups: Vec<Vec<usize>>;
    let mut rest = fractions;
    let mut dominant = None;
    let group_count;

    if max_frac > 1.0 / threads as f64 {
        let mut m = 2usize;
        while 1.0 / (m as f64) > max_frac {
            m += 1;
        }
        let (index, _) = rest.remove(heaviest);
        dominant    = Some(index);
        group_count = m;
        groups      = vec![vec![index]];
        groups.resize(m, Vec::new());
    } else {
        group_count = threads;
        groups      = vec![Vec::new(); threads];
    }

    let rel_size = 1.0 / group_count as f64;
    let mut t    = usize::from(dominant.is_some());
    let mut sum  = 0.0;
    for (index, frac) in rest {
        groups[t].push(index);
        sum += frac;
        if sum > rel_size && t + 1 < groups.len() {
            t  += 1;
            sum = 0.0;
        }
    }

    groups.retain(|g| !g.is_empty());
    LoadPlan { threads: groups.len(), groups, dominant }
}

/// Clamp a requested thread count to the hardware, keeping one core free.
pub fn cap_threads(requested: usize) -> usize {
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    requested.min(available.saturating_sub(1))
}

/// Runs a [`LoadPlan`] against a file and returns every decoded payload.
pub trait LoadExecutor: Send + Sync {
    fn execute(
        &self,
        path:      &Path,
        format:    FileFormat,
        directory: &Directory,
        plan:      &LoadPlan,
    ) -> Result<Vec<(usize, ArrayData)>>;
}

/// One reader, groups in order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialExecutor;

impl LoadExecutor for SequentialExecutor {
    fn execute(
        &self,
        path:      &Path,
        format:    FileFormat,
        directory: &Directory,
        plan:      &LoadPlan,
    ) -> Result<Vec<(usize, ArrayData)>> {
        let mut reader = ArrayReader::open(path, format)?;
        let mut out = Vec::new();
        for group in &plan.groups {
            out.extend(reader.read_batch(directory, group)?);
        }
        Ok(out)
    }
}

/// One worker per group.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadedExecutor;

fn load_group(path: &Path, format: FileFormat, directory: &Directory, group: &[usize])
    -> Result<Vec<(usize, ArrayData)>>
{
    ArrayReader::open(path, format)?.read_batch(directory, group)
}

impl LoadExecutor for ThreadedExecutor {
    #[cfg(feature = "parallel")]
    fn execute(
        &self,
        path:      &Path,
        format:    FileFormat,
        directory: &Directory,
        plan:      &LoadPlan,
    ) -> Result<Vec<(usize, ArrayData)>> {
        use rayon::prelude::*;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(plan.groups.len().max(1))
            .build()
            .map_err(|e| EclError::ThreadPool(e.to_string()))?;

        let per_group: Vec<Vec<(usize, ArrayData)>> = pool.install(|| {
            plan.groups
                .par_iter()
                .map(|group| load_group(path, format, directory, group))
                .collect::<Result<Vec<_>>>()
        })?;
        Ok(per_group.into_iter().flatten().collect())
    }

    #[cfg(not(feature = "parallel"))]
    fn execute(
        &self,
        path:      &Path,
        format:    FileFormat,
        directory: &Directory,
        plan:      &LoadPlan,
    ) -> Result<Vec<(usize, ArrayData)>> {
        std::thread::scope(|s| {
            let handles: Vec<_> = plan.groups
                .iter()
                .map(|group| s.spawn(move || load_group(path, format, directory, group)))
                .collect();

            let mut out = Vec::new();
            for handle in handles {
                let loaded = handle
                    .join()
                    .map_err(|_| EclError::ThreadPool("load worker panicked".into()))??;
                out.extend(loaded);
            }
            Ok(out)
        })
    }
}

/// Log a plan once it has been computed.
pub(crate) fn log_plan(requested: usize, plan: &LoadPlan) {
    debug!(
        requested,
        used = plan.threads,
        dominant = ?plan.dominant,
        "load balanced"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn dominant_array_gets_its_own_group() {
        // 80% in index 2
        let w = [(0, 50), (1, 50), (2, 800), (3, 50), (4, 50)];
        let plan = balance(&w, 4);
        assert_eq!(plan.dominant, Some(2));
        assert_eq!(plan.threads, 2);
        assert_eq!(plan.groups, vec![vec![2], vec![0, 1, 3, 4]]);
    }

    #[test]
    fn dominant_thread_count_is_smallest_fit() {
        // 40%: 1/2 > 0.4, 1/3 <= 0.4
        let w = [(0, 40), (1, 20), (2, 20), (3, 20)];
        let plan = balance(&w, 8);
        assert_eq!(plan.dominant, Some(0));
        assert!(plan.threads <= 3);
        assert_eq!(plan.groups[0], vec![0]);
    }

    #[test]
    fn even_weights_fill_groups_in_order() {
        let w: Vec<(usize, u64)> = (0..8).map(|i| (i, 10)).collect();
        let plan = balance(&w, 4);
        assert_eq!(plan.dominant, None);
        assert_eq!(plan.groups, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6, 7]]);
    }

    #[test]
    fn zero_total_is_one_group() {
        let plan = balance(&[(0, 0), (1, 0), (2, 0)], 4);
        assert_eq!(plan.groups, vec![vec![0, 1, 2]]);
        assert_eq!(plan.threads, 1);
        assert!(balance(&[], 4).groups.is_empty());
    }

    #[test]
    fn cap_leaves_one_core() {
        let available = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        assert_eq!(cap_threads(usize::MAX), available - 1);
        assert_eq!(cap_threads(0), 0);
    }

    proptest! {
        #[test]
        fn groups_partition_the_input(
            weights in prop::collection::vec(0u64..10_000, 0..60),
            threads in 1usize..16,
        ) {
            let input: Vec<(usize, u64)> = weights.iter().copied().enumerate().collect();
            let plan = balance(&input, threads);

            let mut seen: Vec<usize> = plan.groups.iter().flatten().copied().collect();
            seen.sort_unstable();
            prop_assert_eq!(seen, (0..input.len()).collect::<Vec<_>>());
            prop_assert!(plan.groups.iter().all(|g| !g.is_empty()));
            prop_assert_eq!(plan.threads, plan.groups.len());
            if let Some(d) = plan.dominant {
                prop_assert_eq!(&plan.groups[0], &vec![d]);
            }
        }
    }
}
