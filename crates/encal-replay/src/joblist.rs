//! Command-list generation for replay batches
//!
//! Each builder turns a run selection into the analyzer invocations for
//! one batch, plus an optional followup command run once the batch has
//! drained (typically the aggregate/summary pass over the whole range).

/// Octet replays per processing pass
pub const OCTET_COUNT: i32 = 60;

/// Octet index that triggers the aggregate pass in the analyzer
const OCTET_SUMMARY_INDEX: i32 = 1000;

/// A batch of analyzer commands to fan out through `parallel`
#[derive(Debug, Clone)]
pub struct JobBatch {
    /// Short batch label, used in logs and list file names
    pub name: &'static str,
    /// One shell command per job
    pub commands: Vec<String>,
    /// Command run serially after the whole batch completes
    pub followup: Option<String>,
    /// Bounded worker count; `None` lets `parallel` pick one per core
    pub workers: Option<usize>,
    /// CPU niceness applied to every job
    pub niceness: u8,
}

impl JobBatch {
    /// Render the newline-delimited list consumed by `parallel`
    pub fn list_text(&self) -> String {
        let mut text = self.commands.join("\n");
        text.push('\n');
        text
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Octet replay batch: one `pr oct` command per octet index.
///
/// Simulation batches use negated indices (the analyzer's convention for
/// "simulate octet n") and are throttled to 3 workers; data replays run
/// unbounded. The followup triggers the aggregate pass.
pub fn octet_batch(analyzer: &str, sim: bool) -> JobBatch {
    let cmd = |index: i32| format!("{} pr oct {} x x", analyzer, index);

    let commands = (0..OCTET_COUNT)
        .map(|i| if sim { cmd(-i - 1) } else { cmd(i) })
        .collect();

    let summary = if sim {
        -OCTET_SUMMARY_INDEX
    } else {
        OCTET_SUMMARY_INDEX
    };

    JobBatch {
        name: if sim { "simocts" } else { "octets" },
        commands,
        followup: Some(cmd(summary)),
        workers: if sim { Some(3) } else { None },
        niceness: 10,
    }
}

/// Source replay batch: one `sr` command per source run inside any of the
/// given (first, last) source groups, clipped to the inclusive
/// [`run_min`, `run_max`] range.
pub fn source_batch(
    analyzer: &str,
    groups: &[(i32, i32)],
    run_min: i32,
    run_max: i32,
) -> JobBatch {
    let mut commands = Vec::new();
    for &(first, last) in groups {
        for run in first..=last {
            if run_min <= run && run <= run_max {
                commands.push(format!("{} sr {} {} x", analyzer, run, run));
            }
        }
    }

    JobBatch {
        name: "sources",
        commands,
        followup: None,
        workers: None,
        niceness: 10,
    }
}

/// Xenon position-map batch: one `pmap gen` command per run, then a
/// followup generating the map over the full range. Map generation is
/// memory-hungry, so it is capped at 3 workers.
pub fn xenon_map_batch(analyzer: &str, run_min: i32, run_max: i32) -> JobBatch {
    let cmd = |first: i32, last: i32| format!("{} pmap gen {} {} 12 x x", analyzer, first, last);

    JobBatch {
        name: "xenon",
        commands: (run_min..=run_max).map(|r| cmd(r, r)).collect(),
        followup: Some(cmd(run_min, run_max)),
        workers: Some(3),
        niceness: 15,
    }
}

/// Xenon position-map simulation batch: one `pmap sim` command per run
/// over the full range, then a followup with run 0 to close out the map.
pub fn xenon_sim_batch(analyzer: &str, run_min: i32, run_max: i32) -> JobBatch {
    let cmd = |run: i32| format!("{} pmap sim {} {} {} x x", analyzer, run_min, run_max, run);

    JobBatch {
        name: "xesim",
        commands: (run_min..=run_max).map(|r| cmd(r)).collect(),
        followup: Some(cmd(0)),
        workers: None,
        niceness: 15,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANALYZER: &str = "./analyzer";

    #[test]
    fn octet_batch_covers_all_indices() {
        let batch = octet_batch(ANALYZER, false);

        assert_eq!(batch.len(), 60);
        assert_eq!(batch.commands[0], "./analyzer pr oct 0 x x");
        assert_eq!(batch.commands[59], "./analyzer pr oct 59 x x");
        assert_eq!(batch.followup.as_deref(), Some("./analyzer pr oct 1000 x x"));
        assert_eq!(batch.workers, None);
        assert_eq!(batch.niceness, 10);
    }

    #[test]
    fn octet_sim_negates_indices_and_bounds_workers() {
        let batch = octet_batch(ANALYZER, true);

        assert_eq!(batch.len(), 60);
        assert_eq!(batch.commands[0], "./analyzer pr oct -1 x x");
        assert_eq!(batch.commands[59], "./analyzer pr oct -60 x x");
        assert_eq!(
            batch.followup.as_deref(),
            Some("./analyzer pr oct -1000 x x")
        );
        assert_eq!(batch.workers, Some(3));
    }

    #[test]
    fn source_batch_intersects_groups_with_range() {
        let groups = [(100, 105), (200, 202)];
        let batch = source_batch(ANALYZER, &groups, 103, 201);

        assert_eq!(
            batch.commands,
            vec![
                "./analyzer sr 103 103 x",
                "./analyzer sr 104 104 x",
                "./analyzer sr 105 105 x",
                "./analyzer sr 200 200 x",
                "./analyzer sr 201 201 x",
            ]
        );
        assert!(batch.followup.is_none());
    }

    #[test]
    fn source_batch_outside_range_is_empty() {
        let batch = source_batch(ANALYZER, &[(100, 105)], 500, 600);
        assert!(batch.is_empty());
    }

    #[test]
    fn xenon_map_batch_runs_per_run_then_full_range() {
        let batch = xenon_map_batch(ANALYZER, 10, 12);

        assert_eq!(
            batch.commands,
            vec![
                "./analyzer pmap gen 10 10 12 x x",
                "./analyzer pmap gen 11 11 12 x x",
                "./analyzer pmap gen 12 12 12 x x",
            ]
        );
        assert_eq!(
            batch.followup.as_deref(),
            Some("./analyzer pmap gen 10 12 12 x x")
        );
        assert_eq!(batch.workers, Some(3));
        assert_eq!(batch.niceness, 15);
    }

    #[test]
    fn xenon_sim_batch_keeps_full_range_per_command() {
        let batch = xenon_sim_batch(ANALYZER, 10, 11);

        assert_eq!(
            batch.commands,
            vec![
                "./analyzer pmap sim 10 11 10 x x",
                "./analyzer pmap sim 10 11 11 x x",
            ]
        );
        assert_eq!(
            batch.followup.as_deref(),
            Some("./analyzer pmap sim 10 11 0 x x")
        );
    }

    #[test]
    fn list_text_is_newline_delimited_and_terminated() {
        let batch = xenon_sim_batch(ANALYZER, 1, 2);
        let text = batch.list_text();

        assert!(text.ends_with('\n'));
        assert_eq!(text.lines().count(), 2);
    }
}
