/// Tree notifications, delivered synchronously to every observer registered
/// on a [`DirTree`](crate::model::DirTree).
///
/// Observers run on the scanning thread inside the mutation that caused
/// the event, so they must not try to reach back into the tree.
use crate::model::NodeIndex;

/// A change in the scanned tree or the job queue driving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    /// A node was inserted and is now visible (also sent for the fresh
    /// dot-entry of every new directory).
    ChildAdded(NodeIndex),
    /// The node and its whole subtree are about to be removed. Handles
    /// into the subtree are still valid while this is delivered.
    DeletingChild(NodeIndex),
    /// A directory's own listing is complete. Sent before dot-entry cleanup.
    Finalized(NodeIndex),
    /// Advisory progress text.
    Progress(String),
    /// The current selection was replaced.
    SelectionChanged(Vec<NodeIndex>),
    /// The job queue went from empty to non-empty.
    StartingReading,
    /// The job queue drained normally.
    FinishedReading,
    /// The job queue was drained by an abort.
    AbortedReading,
}

/// Boxed observer callback.
pub type Observer = Box<dyn FnMut(&TreeEvent)>;
