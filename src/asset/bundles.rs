use crate::HashMap;

/**
 * Number of assets loading or loaded out of each open bundle.
 * A bundle may only be closed once its count drops back to zero.
 */
#[derive(Default, Debug)]
pub struct BundleHandles {
    counts: HashMap<String, u32>,
}

impl BundleHandles {

    /// Registers one more asset using `bundle`, and returns the new count.
    pub(crate) fn open(&mut self, bundle: &str) -> u32 {
        let count = self.counts.entry(bundle.into()).or_insert(0);
        *count += 1;
        *count
    }

    /// Unregisters an asset using `bundle`. True if that was the last one.
    pub(crate) fn close(&mut self, bundle: &str) -> bool {
        let Some(count) = self.counts.get_mut(bundle) else {
            log::error!("Closed bundle '{bundle}' more times than it was opened");
            return false
        };
        *count -= 1;
        if *count > 0 {
            return false
        }
        self.counts.remove(bundle);
        true
    }

    pub fn count(&self, bundle: &str) -> u32 {
        self.counts.get(bundle).copied().unwrap_or(0)
    }

    /// Bundles with at least one asset in use.
    pub fn open_bundles(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }
}
