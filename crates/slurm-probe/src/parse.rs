//! Pure parsers for the pinned `sinfo`/`squeue` `-o` format strings (§4.E, §4.G).
//!
//! These take pre-captured command output and return structured values; they perform
//! no I/O of their own, which is what lets them be exhaustively unit tested against
//! golden text fixtures instead of a real scheduler.

/// A scheduler-reported job state, as returned by the per-job status probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Waiting,
    Running,
}

fn gpus_per_node(gres: &str) -> u32 {
    match gres.strip_prefix("gpu:") {
        Some(rest) => rest.rsplit(':').next().and_then(|n| n.parse().ok()).unwrap_or(0),
        None => 0,
    }
}

fn strip_default_marker(partition: &str) -> &str {
    partition.trim_end_matches('*')
}

/// Parses `sinfo -o "%G %.3D %.6t %P"` output, summing idle GPU capacity
/// (`gpus_per_node * node_count`) across rows in state `idle` for `partition`.
/// The header line (always present, since `-h` is never passed) is skipped.
pub fn parse_idle_gpus(output: &str, partition: &str) -> u32 {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 4 {
                return None;
            }
            let (gres, node_count, state, row_partition) = (fields[0], fields[1], fields[2], fields[3]);
            if state != "idle" || strip_default_marker(row_partition) != partition {
                return None;
            }
            let node_count: u32 = node_count.parse().ok()?;
            Some(gpus_per_node(gres) * node_count)
        })
        .sum()
}

/// Parses `sinfo -o "%C %.3D %.6t %P"` output, summing the idle component of the
/// `allocated/idle/other/total` CPU tuple across rows in state `idle` or `mix` for
/// `partition`.
pub fn parse_idle_cpus(output: &str, partition: &str) -> u32 {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 4 {
                return None;
            }
            let (cpu_tuple, _node_count, state, row_partition) = (fields[0], fields[1], fields[2], fields[3]);
            if !(state == "idle" || state == "mix") || strip_default_marker(row_partition) != partition {
                return None;
            }
            let idle: u32 = cpu_tuple.split('/').nth(1)?.parse().ok()?;
            Some(idle)
        })
        .sum()
}

/// Parses `squeue -o "%j %R %u"` output, counting rows belonging to `user` whose job
/// name ends with `_CLAG` and whose reason code begins with `(` but not `(launch`.
/// The reason field may itself contain spaces (e.g. `(launch failed)`), so only the
/// first (name) and last (user) tokens are fixed; everything between is the reason.
pub fn parse_backlog(output: &str, user: &str) -> u32 {
    output
        .lines()
        .skip(1)
        .filter(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 3 {
                return false;
            }
            let name = fields[0];
            let row_user = fields[fields.len() - 1];
            let reason = fields[1..fields.len() - 1].join(" ");
            row_user == user
                && name.ends_with("_CLAG")
                && reason.starts_with('(')
                && !reason.starts_with("(launch")
        })
        .count() as u32
}

/// Parses `squeue -o "%i %R"` output for a single `backend_id`, returning its current
/// state or `None` if the job is not present (already terminated or not yet visible).
pub fn parse_job_state(output: &str, backend_id: &str) -> Option<SchedulerState> {
    output.lines().skip(1).find_map(|line| {
        let mut fields = line.split_whitespace();
        let id = fields.next()?;
        if id != backend_id {
            return None;
        }
        let reason = fields.next().unwrap_or("");
        Some(if reason.starts_with('(') {
            SchedulerState::Waiting
        } else {
            SchedulerState::Running
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SINFO_GPU: &str = "\
GRES NODES STATE PARTITION
gpu:4 2 idle gpu*
gpu:4 1 mix gpu*
gpu:v100:8 3 idle gpu*
(null) 5 idle cpu
";

    #[test]
    fn idle_gpus_sums_gres_times_node_count_for_matching_partition() {
        // (4*2) + (8*3) = 32; the mix row and the cpu-partition row are excluded.
        assert_eq!(parse_idle_gpus(SINFO_GPU, "gpu"), 32);
    }

    #[test]
    fn idle_gpus_is_zero_for_unknown_partition() {
        assert_eq!(parse_idle_gpus(SINFO_GPU, "nonexistent"), 0);
    }

    const SINFO_CPU: &str = "\
CPUS(A/I/O/T) NODES STATE PARTITION
4/12/0/16 4 idle cpu*
8/4/0/12 2 mix cpu*
0/64/0/64 8 idle gpu
";

    #[test]
    fn idle_cpus_sums_the_idle_field_for_matching_rows() {
        assert_eq!(parse_idle_cpus(SINFO_CPU, "cpu"), 16);
    }

    const SQUEUE_BACKLOG: &str = "\
NAME REASON USER
job1_CLAG (Priority) alice
job2_CLAG (launch failed) alice
job3_OTHER (Resources) alice
job4_CLAG (Resources) bob
";

    #[test]
    fn backlog_counts_only_matching_user_suffix_and_reason() {
        // job1 counts; job2 is excluded by the `(launch` prefix; job3 lacks the
        // _CLAG suffix; job4 belongs to a different user.
        assert_eq!(parse_backlog(SQUEUE_BACKLOG, "alice"), 1);
    }

    const SQUEUE_STATE: &str = "\
JOBID REASON
1001 (Resources)
1002 None
";

    #[test]
    fn job_state_waiting_when_reason_is_parenthesized() {
        assert_eq!(parse_job_state(SQUEUE_STATE, "1001"), Some(SchedulerState::Waiting));
    }

    #[test]
    fn job_state_running_when_reason_is_not_parenthesized() {
        assert_eq!(parse_job_state(SQUEUE_STATE, "1002"), Some(SchedulerState::Running));
    }

    #[test]
    fn job_state_none_when_job_is_absent() {
        assert_eq!(parse_job_state(SQUEUE_STATE, "9999"), None);
    }
}
