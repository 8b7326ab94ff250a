/// Cooperative read-job scheduling.
///
/// The queue never spawns threads. A host loop calls [`JobQueue::tick`]
/// repeatedly; each tick runs the head job once. Local directory jobs list
/// a whole directory per call, the cache replay job handles a bounded
/// number of lines and yields, and remote jobs go to the back of the queue
/// whenever their listing has nothing ready.
use super::remote::DirectoryService;
use super::ScanSettings;
use crate::cache::{CacheReadJob, CacheReader};
use crate::events::TreeEvent;
use crate::exclude::ExcludeRules;
use crate::model::{DirTree, NodeIndex};
use std::collections::VecDeque;
use tracing::{debug, info};

/// What a job wants after one `read()` call.
#[derive(Debug)]
pub enum JobStatus {
    /// More work remains; run this job again on the next tick.
    Yield,
    /// Nothing was ready yet; let the other queued jobs run first.
    Waiting,
    /// The job's directory level is done.
    Finished,
    /// A matching cache file was found: drop the job's directory and replay
    /// the cache in its place.
    UseCache(CacheReader),
}

/// Whether the queue still has work after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    Busy,
    Idle,
}

/// A unit of work that materialises one directory's children.
pub trait ReadJob {
    /// Directory whose pending-job counter this job holds, if any.
    fn dir(&self) -> Option<NodeIndex>;

    fn read(&mut self, ctx: &mut JobContext<'_>) -> JobStatus;

    /// The job is dropped by an abort before it finished.
    fn abort(&mut self, tree: &mut DirTree) {
        if let Some(dir) = self.dir() {
            tree.read_job_aborted(dir);
        }
    }
}

/// Everything a job may touch while it runs.
pub struct JobContext<'a> {
    pub tree: &'a mut DirTree,
    pub rules: &'a ExcludeRules,
    pub settings: &'a ScanSettings,
    pub service: Option<&'a mut (dyn DirectoryService + 'static)>,
    spawned: Vec<Box<dyn ReadJob>>,
}

impl<'a> JobContext<'a> {
    pub fn new(
        tree: &'a mut DirTree,
        rules: &'a ExcludeRules,
        settings: &'a ScanSettings,
        service: Option<&'a mut (dyn DirectoryService + 'static)>,
    ) -> Self {
        Self {
            tree,
            rules,
            settings,
            service,
            spawned: Vec::new(),
        }
    }

    /// Queue a follow-up job. It is counted as pending right away and runs
    /// after everything already queued.
    pub fn enqueue(&mut self, job: Box<dyn ReadJob>) {
        if let Some(dir) = job.dir() {
            self.tree.read_job_added(dir);
        }
        self.spawned.push(job);
    }

    fn into_spawned(self) -> Vec<Box<dyn ReadJob>> {
        self.spawned
    }
}

/// FIFO of pending read jobs.
#[derive(Default)]
pub struct JobQueue {
    jobs: VecDeque<Box<dyn ReadJob>>,
    running: bool,
    /// Consecutive ticks whose job was waiting.
    waiting_streak: usize,
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("jobs", &self.jobs.len())
            .field("running", &self.running)
            .field("waiting_streak", &self.waiting_streak)
            .finish()
    }
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// `true` once every queued job has reported [`JobStatus::Waiting`]
    /// since anything last made progress.
    pub fn is_stalled(&self) -> bool {
        !self.jobs.is_empty() && self.waiting_streak >= self.jobs.len()
    }

    /// Append a job. Going from idle to busy emits [`TreeEvent::StartingReading`].
    pub fn enqueue(&mut self, tree: &mut DirTree, job: Box<dyn ReadJob>) {
        if let Some(dir) = job.dir() {
            tree.read_job_added(dir);
        }
        self.jobs.push_back(job);
        self.waiting_streak = 0;
        self.mark_running(tree);
    }

    fn mark_running(&mut self, tree: &mut DirTree) {
        if !self.running {
            self.running = true;
            debug!("Job queue started");
            tree.emit(TreeEvent::StartingReading);
        }
    }

    /// Run the head job once.
    pub fn tick(
        &mut self,
        tree: &mut DirTree,
        rules: &ExcludeRules,
        settings: &ScanSettings,
        service: Option<&mut (dyn DirectoryService + 'static)>,
    ) -> TickStatus {
        let Some(mut job) = self.jobs.pop_front() else {
            return self.finish_if_drained(tree);
        };

        let mut ctx = JobContext::new(tree, rules, settings, service);
        let status = job.read(&mut ctx);
        let spawned = ctx.into_spawned();
        if matches!(status, JobStatus::Waiting) && spawned.is_empty() {
            self.waiting_streak += 1;
        } else {
            self.waiting_streak = 0;
        }

        match status {
            JobStatus::Yield => {
                self.jobs.push_front(job);
                self.jobs.extend(spawned);
            }
            JobStatus::Waiting => {
                self.jobs.extend(spawned);
                self.jobs.push_back(job);
            }
            JobStatus::Finished => {
                if let Some(dir) = job.dir() {
                    tree.read_job_finished(dir);
                }
                self.jobs.extend(spawned);
            }
            JobStatus::UseCache(reader) => {
                self.jobs.extend(spawned);
                if let Some(dir) = job.dir() {
                    self.replace_with_cache(tree, dir, reader);
                }
            }
        }

        self.finish_if_drained(tree)
    }

    fn finish_if_drained(&mut self, tree: &mut DirTree) -> TickStatus {
        if !self.jobs.is_empty() {
            return TickStatus::Busy;
        }
        if self.running {
            self.running = false;
            info!("Reading finished");
            tree.emit(TreeEvent::FinishedReading);
        }
        TickStatus::Idle
    }

    /// Throw away `dir` and whatever was read of it so far, then replay the
    /// cache attached to the same parent.
    fn replace_with_cache(&mut self, tree: &mut DirTree, dir: NodeIndex, reader: CacheReader) {
        info!("Replacing {} with cache {}", tree.full_path(dir), reader.path().display());
        tree.read_job_finished(dir);
        self.kill_all(tree, dir);
        let parent = tree.parent(dir);
        tree.delete_subtree(dir);
        self.enqueue(tree, Box::new(CacheReadJob::new(reader, parent)));
    }

    /// Drop every queued job whose directory lies in `subtree`, releasing
    /// its pending count without marking anything aborted.
    pub fn kill_all(&mut self, tree: &mut DirTree, subtree: NodeIndex) {
        let before = self.jobs.len();
        let jobs = std::mem::take(&mut self.jobs);
        for job in jobs {
            match job.dir() {
                Some(dir) if tree.is_in_subtree(dir, subtree) => tree.read_job_finished(dir),
                _ => self.jobs.push_back(job),
            }
        }
        let killed = before - self.jobs.len();
        if killed > 0 {
            debug!("Killed {killed} queued jobs below {}", tree.full_path(subtree));
        }
    }

    /// Drop every queued job, telling each target it was aborted.
    pub fn abort(&mut self, tree: &mut DirTree) {
        if !self.running && self.jobs.is_empty() {
            return;
        }
        let jobs = std::mem::take(&mut self.jobs);
        let count = jobs.len();
        for mut job in jobs {
            job.abort(tree);
        }
        self.running = false;
        self.waiting_streak = 0;
        info!("Reading aborted, {count} queued jobs dropped");
        tree.emit(TreeEvent::AbortedReading);
    }
}
