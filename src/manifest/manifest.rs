use derive_more::*;
use serde::{Deserialize, Serialize};
use crate::HashMap;

/**
 * Named archive containing a fixed set of assets.
 */
#[derive(Clone, Eq, PartialEq, Default, Debug, Serialize, Deserialize)]
pub struct BundleDescriptor {
    pub name: String,                   // Identifier the archive source opens the bundle by.
    pub assets: Vec<String>,            // Logical paths stored in the bundle, in build order.
    #[serde(default)]
    pub hash: String,                   // Content hash of the built archive.
    #[serde(default)]
    pub version: u32,                   // Bumped by the build whenever the hash changes.
}

impl BundleDescriptor {
    pub fn new(name: impl Into<String>, assets: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            assets: assets.into_iter().map(Into::into).collect(),
            hash: String::new(),
            version: 0,
        }
    }

    pub fn with_hash(mut self, hash: impl Into<String>, version: u32) -> Self {
        self.hash = hash.into();
        self.version = version;
        self
    }
}

/**
 * Deserialized description of every asset that can be requested by path.
 */
#[derive(Clone, Eq, PartialEq, Default, Debug, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub bundles: Vec<BundleDescriptor>,
    #[serde(default)]
    pub loose: Vec<String>,             // Paths served by the loose-file store.
}

impl Manifest {

    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml(source: &str) -> Result<Self, ManifestError> {
        let manifest = serde_yaml::from_str(source)?;
        Ok(manifest)
    }

    pub fn bundle(mut self, bundle: BundleDescriptor) -> Self {
        self.bundles.push(bundle);
        self
    }

    pub fn loose_file(mut self, path: impl Into<String>) -> Self {
        self.loose.push(path.into());
        self
    }

    /**
     * Names of bundles in `remote` that are missing from `local`, or whose content hash differs.
     * Order follows `remote`.
     */
    pub fn changed_bundles(remote: &Manifest, local: &Manifest) -> Vec<String> {
        let local_hashes: HashMap<&str, &str> = local.bundles
            .iter()
            .map(|bundle| (bundle.name.as_str(), bundle.hash.as_str()))
            .collect();
        remote.bundles
            .iter()
            .filter(|bundle| local_hashes.get(bundle.name.as_str()) != Some(&bundle.hash.as_str()))
            .map(|bundle| bundle.name.clone())
            .collect()
    }
}

#[derive(Error, Debug, Display, From)]
pub enum ManifestError {
    #[display(fmt="Malformed manifest: {}", _0)]
    Yaml(serde_yaml::Error),
    #[display(fmt="Asset '{}' is listed by both '{}' and '{}'", path, first, second)]
    #[from(ignore)]
    DuplicatePath { path: String, first: String, second: String },
    #[display(fmt="Bundle with an empty name")]
    #[from(ignore)]
    EmptyBundleName,
}


#[cfg(test)]
mod test {
    use super::{BundleDescriptor, Manifest};

    const MANIFEST: &str = "
bundles:
  - name: ui
    assets: [/ui/icon.png, /ui/frame.png]
    hash: 9f2c
    version: 3
  - name: levels
    assets: [/levels/one.tmx]
loose:
  - /loose/credits.txt
";

    #[test]
    fn parse_yaml() {
        let manifest = Manifest::from_yaml(MANIFEST).unwrap();
        assert_eq!(2, manifest.bundles.len());
        assert_eq!("ui", manifest.bundles[0].name);
        assert_eq!(vec!["/ui/icon.png", "/ui/frame.png"], manifest.bundles[0].assets);
        assert_eq!("9f2c", manifest.bundles[0].hash);
        assert_eq!(3, manifest.bundles[0].version);
        assert_eq!("", manifest.bundles[1].hash);
        assert_eq!(0, manifest.bundles[1].version);
        assert_eq!(vec!["/loose/credits.txt"], manifest.loose);
    }

    #[test]
    fn parse_malformed_yaml() {
        assert!(Manifest::from_yaml("bundles: [ {name: 4").is_err());
    }

    #[test]
    fn changed_bundles() {
        let local = Manifest::new()
            .bundle(BundleDescriptor::new("ui", ["/ui/icon.png"]).with_hash("aa", 1))
            .bundle(BundleDescriptor::new("audio", ["/audio/hit.ogg"]).with_hash("bb", 1))
            .bundle(BundleDescriptor::new("gone", ["/gone/x.bin"]).with_hash("cc", 1));
        let remote = Manifest::new()
            .bundle(BundleDescriptor::new("ui", ["/ui/icon.png"]).with_hash("aa", 1))
            .bundle(BundleDescriptor::new("audio", ["/audio/hit.ogg"]).with_hash("b2", 2))
            .bundle(BundleDescriptor::new("levels", ["/levels/one.tmx"]).with_hash("dd", 1));
        assert_eq!(vec!["audio", "levels"], Manifest::changed_bundles(&remote, &local));
        assert!(Manifest::changed_bundles(&local, &local).is_empty());
    }
}
