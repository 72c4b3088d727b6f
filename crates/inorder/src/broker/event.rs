/// A finished job: the submitted key paired with the callback's output.
///
/// This is the item type of the broker's results stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion<K, R> {
    /// Key the job was submitted under.
    pub key: K,
    /// Value produced by the processing callback.
    pub result: R,
}

/// Messages consumed by the reorder dispatcher.
pub(crate) enum Event<K, R> {
    /// A worker finished a job.
    Completed(Completion<K, R>),
    /// One-shot shutdown sentinel sent by `Broker::finalize`.
    Finalize,
}
