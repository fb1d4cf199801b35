use std::fmt;

/**
 * Deconstructed logical path to an asset.
 * IE: "/ui/icons/sword.png" has parent "/ui/icons", stem "sword" and extension "png".
 */
#[derive(Clone, Eq, PartialEq, Default, Debug, Hash)]
pub struct AssetPath {
    pub parent: Option<String>,
    pub stem: String,
    pub extension: Option<String>,
}

impl AssetPath {

    pub fn parse(path: &str) -> Self {
        let (parent, file_name) = match path.rsplit_once('/') {
            Some((left, right)) => (Some(left), right),
            None => (None, path),
        };

        // Leading dots mark hidden files, not extensions.
        let (stem, extension) = match file_name.rsplit_once('.') {
            Some((left, right)) if !left.is_empty() => (left, Some(right)),
            _ => (file_name, None),
        };

        Self {
            parent: parent.map(String::from),
            stem: stem.into(),
            extension: extension.map(String::from),
        }
    }

    /// Stem and extension. No parent directories.
    pub fn file_name(&self) -> String {
        match self.extension.as_deref() {
            Some(extension) => format!("{}.{}", self.stem, extension),
            None => self.stem.clone(),
        }
    }

    /// Remainder of `path` after the first occurrence of `marker`.
    /// None if the marker does not occur or nothing follows it.
    pub fn after_marker<'a>(path: &'a str, marker: &str) -> Option<&'a str> {
        let (_, remainder) = path.split_once(marker)?;
        if remainder.is_empty() {
            return None
        }
        Some(remainder)
    }
}

impl fmt::Display for AssetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = self.parent.as_deref() {
            write!(f, "{parent}/")?;
        }
        f.write_str(&self.file_name())
    }
}
