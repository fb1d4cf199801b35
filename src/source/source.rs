use crate::{ArchiveEntry, AssetKind, ResourceHandle};

/**
 * Handle to a load operation issued to an [`AsyncSource`].
 * Only meaningful to the source that issued it.
 */
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct OperationId(pub u64);

/**
 * In-process store that produces resources synchronously.
 * IE: an editor database, or a stub used by tooling.
 */
pub trait DirectSource {
    /// Fetches the resource at `path`, or None if it's missing or not of the declared kind.
    fn fetch(&mut self, path: &str, kind: &AssetKind) -> Option<ResourceHandle>;
    /// Called once the last reference to a fetched resource goes away.
    fn release(&mut self, path: &str, resource: &ResourceHandle);
}

/**
 * Store that loads resources in the background and is polled for completion.
 * Must never block.
 */
pub trait AsyncSource {
    /// What the store looks resources up by.
    type Key: ?Sized;

    /// Starts loading the resource at `key`.
    fn issue(&mut self, key: &Self::Key, kind: &AssetKind) -> OperationId;

    /// True once the operation has finished, successfully or not.
    fn poll_done(&mut self, operation: OperationId) -> bool;

    /**
     * Takes the resource produced by a finished operation.
     * None if loading failed, or the resource was not of the declared kind.
     */
    fn take_result(&mut self, operation: OperationId) -> Option<ResourceHandle>;

    /// Called exactly once per issued operation, after its requester is done with it.
    fn release(&mut self, key: &Self::Key, resource: Option<&ResourceHandle>);
}

/**
 * [`AsyncSource`] that reads entries out of bundled archives.
 */
pub trait ArchiveSource: AsyncSource<Key = ArchiveEntry> {
    /// Closes a bundle once no asset loaded from it is in use.
    fn close_bundle(&mut self, bundle: &str);
}

/**
 * [`AsyncSource`] that reads individual files keyed by relative path.
 */
pub trait LooseSource: AsyncSource<Key = str> {}
impl<S: AsyncSource<Key = str>> LooseSource for S {}

/**
 * The backing stores an [`AssetManager`](crate::AssetManager) loads through.
 * Any of them may be absent, in which case assets resolving to it fail to load.
 */
#[derive(Default)]
pub struct Sources {
    pub direct: Option<Box<dyn DirectSource>>,
    pub archive: Option<Box<dyn ArchiveSource>>,
    pub loose: Option<Box<dyn LooseSource>>,
}

impl Sources {
    pub fn new() -> Self {
        Self::default()
    }
}
