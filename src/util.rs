use fxhash::FxHashMap;

/**
 * Hash map keyed by paths and small ids, with a fast non-cryptographically secure hash function.
 */
pub type HashMap<K, V> = FxHashMap<K, V>;
