//! Child-PID discovery over the OS process table

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use crate::child::Process;
use crate::error::Result;
use crate::shell::ShellRunner;

/// Targets for bulk process operations: a raw PID, a spawned handle, or a
/// collection of either. Resolved once at the boundary into a plain PID list.
#[derive(Debug)]
pub enum PidSelector<'a> {
    /// A raw process ID
    Pid(u32),
    /// A spawned process handle
    Proc(&'a Process),
    /// Any mix of the above
    Group(Vec<PidSelector<'a>>),
}

impl PidSelector<'_> {
    /// Resolve to a deduplicated PID list, in the order given.
    pub fn pids(&self) -> Vec<u32> {
        let mut out = Vec::new();
        self.collect_into(&mut out);
        out
    }

    fn collect_into(&self, out: &mut Vec<u32>) {
        match self {
            PidSelector::Pid(pid) => {
                if !out.contains(pid) {
                    out.push(*pid);
                }
            }
            PidSelector::Proc(process) => {
                let pid = process.pid();
                if !out.contains(&pid) {
                    out.push(pid);
                }
            }
            PidSelector::Group(items) => {
                for item in items {
                    item.collect_into(out);
                }
            }
        }
    }
}

impl From<u32> for PidSelector<'_> {
    fn from(pid: u32) -> Self {
        PidSelector::Pid(pid)
    }
}

impl<'a> From<&'a Process> for PidSelector<'a> {
    fn from(process: &'a Process) -> Self {
        PidSelector::Proc(process)
    }
}

impl From<Vec<u32>> for PidSelector<'_> {
    fn from(pids: Vec<u32>) -> Self {
        PidSelector::Group(pids.into_iter().map(PidSelector::Pid).collect())
    }
}

impl From<&[u32]> for PidSelector<'_> {
    fn from(pids: &[u32]) -> Self {
        PidSelector::Group(pids.iter().copied().map(PidSelector::Pid).collect())
    }
}

impl<'a> From<Vec<&'a Process>> for PidSelector<'a> {
    fn from(processes: Vec<&'a Process>) -> Self {
        PidSelector::Group(processes.into_iter().map(PidSelector::Proc).collect())
    }
}

/// Find the child PIDs of the given seed PIDs.
///
/// Pops one PID at a time off a work queue and asks the process table for its
/// direct children; newly seen PIDs are collected and, when `recursive`, fed
/// back into the queue. The parent/child relation of a live process tree is
/// acyclic and finite, so the sweep terminates. The seeds themselves are not
/// part of the result.
pub fn child_pids<R: ShellRunner>(shell: &R, seeds: &[u32], recursive: bool) -> Result<Vec<u32>> {
    debug!(?seeds, recursive, "discovering child PIDs");

    let mut queue: VecDeque<u32> = seeds.iter().copied().collect();
    let mut seen: HashSet<u32> = HashSet::new();
    let mut found = Vec::new();

    while let Some(pid) = queue.pop_front() {
        let out = shell.run(&format!("ps --ppid {pid} -o pid="))?;
        if !out.success() {
            // ps reports a non-zero status for a childless PID
            continue;
        }
        for line in &out.lines {
            let Ok(child) = line.trim().parse::<u32>() else {
                continue;
            };
            if seen.insert(child) {
                found.push(child);
                if recursive {
                    queue.push_back(child);
                }
            }
        }
    }
    Ok(found)
}
