use std::fmt;
use std::sync::Arc;
use derive_more::*;
use crate::{AssetPath, BundleDescriptor, HashMap, Manifest, ManifestError};

/**
 * Location of an asset inside an archive.
 */
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct ArchiveEntry {
    pub bundle: String,
    pub entry: String,
}

impl ArchiveEntry {
    pub fn new(bundle: impl Into<String>, entry: impl Into<String>) -> Self {
        Self {
            bundle: bundle.into(),
            entry: entry.into(),
        }
    }
}

impl fmt::Display for ArchiveEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.bundle, self.entry)
    }
}

/**
 * Backing store a logical path is served from.
 */
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum BackingKind {
    /// In-process pass-through, ready as soon as it's admitted.
    Direct,
    /// Entry of a bundled archive.
    Archive(ArchiveEntry),
    /// Key into the loose-file store.
    Loose(String),
}

/**
 * Options that change how paths resolve, independent of the manifest's content.
 */
#[derive(Clone, Eq, PartialEq, Default, Debug)]
pub struct ResolveOptions {
    /// Paths containing this marker are loose files keyed by whatever follows it.
    pub loose_root: Option<String>,
    /// Serves bundled paths in-process instead of through the archive store.
    pub simulate_bundles: bool,
}

#[derive(Error, Debug, Display, Clone, Eq, PartialEq)]
#[display(fmt="Asset '{}' is not in the manifest", path)]
pub struct ResolutionError {
    pub path: String,
}

/// Immutable lookup table built from one [`Manifest`].
#[derive(Default, Debug)]
struct PathTable {
    paths: HashMap<String, TableEntry>,
    bundles: Vec<BundleDescriptor>,
    bundle_indices: HashMap<String, usize>,
}

#[derive(Clone, Debug)]
enum TableEntry {
    Bundled { bundle: usize, entry: String },
    Loose,
}

impl PathTable {

    fn build(manifest: &Manifest) -> Result<Self, ManifestError> {
        let mut table = PathTable::default();
        for bundle in &manifest.bundles {
            if bundle.name.is_empty() {
                return Err(ManifestError::EmptyBundleName);
            }
            let bundle_index = table.bundles.len();
            table.bundle_indices.insert(bundle.name.clone(), bundle_index);
            table.bundles.push(bundle.clone());
            for path in &bundle.assets {
                let entry = AssetPath::parse(path).file_name();
                table.insert(path, TableEntry::Bundled { bundle: bundle_index, entry }, &bundle.name)?;
            }
        }
        for path in &manifest.loose {
            table.insert(path, TableEntry::Loose, "<loose>")?;
        }
        Ok(table)
    }

    fn insert(&mut self, path: &str, entry: TableEntry, owner: &str) -> Result<(), ManifestError> {
        if let Some(existing) = self.paths.get(path) {
            let first = match existing {
                TableEntry::Bundled { bundle, .. } => self.bundles[*bundle].name.clone(),
                TableEntry::Loose => String::from("<loose>"),
            };
            return Err(ManifestError::DuplicatePath {
                path: path.into(),
                first,
                second: owner.into(),
            });
        }
        self.paths.insert(path.into(), entry);
        Ok(())
    }
}

/**
 * Maps logical asset paths to the backing store that serves them.
 * Rebuilding swaps in a complete new table, so lookups never see a partial one.
 */
#[derive(Debug)]
pub struct PathResolver {
    table: Arc<PathTable>,
    options: ResolveOptions,
}

impl PathResolver {

    pub fn new(manifest: &Manifest, options: ResolveOptions) -> Result<Self, ManifestError> {
        Ok(Self {
            table: Arc::new(PathTable::build(manifest)?),
            options,
        })
    }

    /// Resolver that knows no paths.
    pub fn empty(options: ResolveOptions) -> Self {
        Self {
            table: Arc::default(),
            options,
        }
    }

    /**
     * Replaces the lookup table with one built from `manifest`.
     * On error, the previous table stays in place.
     */
    pub fn rebuild(&mut self, manifest: &Manifest) -> Result<(), ManifestError> {
        let table = PathTable::build(manifest)?;
        self.table = Arc::new(table);
        log::debug!("Rebuilt path table with {} paths", self.table.paths.len());
        Ok(())
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Resolves the backing store that serves `path`.
    pub fn resolve(&self, path: &str) -> Result<BackingKind, ResolutionError> {
        if let Some(loose_root) = self.options.loose_root.as_deref() {
            if let Some(key) = AssetPath::after_marker(path, loose_root) {
                return Ok(BackingKind::Loose(key.into()));
            }
        }
        let entry = match self.table.paths.get(path) {
            Some(entry) => entry,
            None => return Err(ResolutionError { path: path.into() }),
        };
        match entry {
            TableEntry::Loose => Ok(BackingKind::Loose(path.into())),
            TableEntry::Bundled { .. } if self.options.simulate_bundles => Ok(BackingKind::Direct),
            TableEntry::Bundled { bundle, entry } => Ok(BackingKind::Archive(ArchiveEntry {
                bundle: self.table.bundles[*bundle].name.clone(),
                entry: entry.clone(),
            })),
        }
    }

    /// Name of the bundle containing `path`, if it's bundled.
    pub fn bundle_of(&self, path: &str) -> Option<&str> {
        match self.table.paths.get(path)? {
            TableEntry::Bundled { bundle, .. } => Some(&self.table.bundles[*bundle].name),
            TableEntry::Loose => None,
        }
    }

    pub fn bundle(&self, name: &str) -> Option<&BundleDescriptor> {
        let index = *self.table.bundle_indices.get(name)?;
        self.table.bundles.get(index)
    }

    pub fn bundles(&self) -> impl Iterator<Item = &BundleDescriptor> {
        self.table.bundles.iter()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.table.paths.contains_key(path)
    }
}
