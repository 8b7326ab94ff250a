/// Remote read job: entries arrive asynchronously from a listing service.
///
/// The service hands back a channel per listed URL. The job drains whatever
/// is ready on each tick and reports itself waiting while the listing has
/// nothing new.
use super::local::child_path;
use super::queue::{JobContext, JobStatus, ReadJob};
use crate::model::{EntryStat, FileNode, FileType, NodeIndex, ReadState};
use crossbeam_channel::{Receiver, TryRecvError};
use tracing::{debug, warn};

/// Listing events drained per tick.
const EVENTS_PER_TICK: usize = 500;

/// One entry reported by a remote listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub stat: EntryStat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingEvent {
    Entry(RemoteEntry),
    /// The listing completed normally.
    Finished,
    /// The listing failed; entries already delivered stay in the tree.
    Failed(String),
}

/// Source of remote directory listings.
pub trait DirectoryService {
    /// Start listing `url`. Events may arrive at any later time.
    fn list(&mut self, url: &str) -> Receiver<ListingEvent>;
}

pub struct RemoteDirReadJob {
    dir: NodeIndex,
    url: String,
    listing: Option<Receiver<ListingEvent>>,
}

impl RemoteDirReadJob {
    pub fn new(dir: NodeIndex, url: impl Into<String>) -> Self {
        Self {
            dir,
            url: url.into(),
            listing: None,
        }
    }

    fn add_entry(&self, ctx: &mut JobContext<'_>, entry: RemoteEntry) {
        let mut node = if entry.stat.file_type == FileType::Directory {
            FileNode::new_dir(entry.name.as_str(), entry.stat)
        } else {
            FileNode::new_file(entry.name.as_str(), entry.stat)
        };
        node.is_local = false;
        let is_dir = node.is_dir();
        let child = ctx.tree.insert_child(self.dir, node);
        if !is_dir {
            return;
        }

        let url = child_path(&self.url, &entry.name);
        if ctx.rules.matches(&url) {
            debug!("Excluding {url}");
            ctx.tree.set_excluded(child, true);
            ctx.tree.set_read_state(child, ReadState::OnRequestOnly);
            ctx.tree.finalize_local(child);
        } else {
            ctx.enqueue(Box::new(RemoteDirReadJob::new(child, url)));
        }
    }

    fn finish(&self, ctx: &mut JobContext<'_>, state: ReadState) -> JobStatus {
        ctx.tree.set_read_state(self.dir, state);
        ctx.tree.finalize_local(self.dir);
        JobStatus::Finished
    }
}

impl ReadJob for RemoteDirReadJob {
    fn dir(&self) -> Option<NodeIndex> {
        Some(self.dir)
    }

    fn read(&mut self, ctx: &mut JobContext<'_>) -> JobStatus {
        if !ctx.tree.contains(self.dir) {
            return JobStatus::Finished;
        }

        let listing = match &self.listing {
            Some(listing) => listing.clone(),
            None => {
                let Some(service) = ctx.service.as_deref_mut() else {
                    warn!("No directory service for {}", self.url);
                    return self.finish(ctx, ReadState::Error);
                };
                let listing = service.list(&self.url);
                ctx.tree.set_read_state(self.dir, ReadState::Reading);
                ctx.tree.progress(format!("Reading {}", self.url));
                self.listing = Some(listing.clone());
                listing
            }
        };

        for received in 0..EVENTS_PER_TICK {
            match listing.try_recv() {
                Ok(ListingEvent::Entry(entry)) => self.add_entry(ctx, entry),
                Ok(ListingEvent::Finished) => return self.finish(ctx, ReadState::Finished),
                Ok(ListingEvent::Failed(message)) => {
                    warn!("Listing {} failed: {message}", self.url);
                    return self.finish(ctx, ReadState::Error);
                }
                Err(TryRecvError::Empty) if received == 0 => return JobStatus::Waiting,
                Err(TryRecvError::Empty) => return JobStatus::Yield,
                Err(TryRecvError::Disconnected) => {
                    warn!("Listing {} ended without a result", self.url);
                    return self.finish(ctx, ReadState::Error);
                }
            }
        }
        JobStatus::Yield
    }
}
