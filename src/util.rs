use std::hash::Hash;

use indexmap::IndexMap;

/// Builds a map with the same keys, in the same order, and each value passed through `f`.
pub fn map_values<K, T, U, F>(map: &IndexMap<K, T>, mut f: F) -> IndexMap<K, U>
where
    K: Clone + Eq + Hash,
    F: FnMut(&T) -> U,
{
    map.iter().map(|(key, value)| (key.clone(), f(value))).collect()
}

/// Like [`map_values`], stopping at the first error.
pub fn try_map_values<K, T, U, E, F>(map: &IndexMap<K, T>, mut f: F) -> Result<IndexMap<K, U>, E>
where
    K: Clone + Eq + Hash,
    F: FnMut(&T) -> Result<U, E>,
{
    map.iter()
        .map(|(key, value)| Ok((key.clone(), f(value)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_values_keeps_keys_and_order() {
        let source = IndexMap::from([("b", 2), ("a", 1), ("c", 3)]);
        let doubled = map_values(&source, |value| value * 2);
        assert_eq!(
            doubled.into_iter().collect::<Vec<_>>(),
            vec![("b", 4), ("a", 2), ("c", 6)]
        );
    }

    #[test]
    fn try_map_values_stops_at_first_error() {
        let source = IndexMap::from([("ok", "1"), ("bad", "x"), ("late", "y")]);
        let mut seen = Vec::new();
        let result = try_map_values(&source, |value| {
            seen.push(*value);
            value.parse::<i32>()
        });
        assert!(result.is_err());
        assert_eq!(seen, vec!["1", "x"]);
    }

    #[test]
    fn empty_map_stays_empty() {
        let source = IndexMap::<String, i32>::new();
        assert!(map_values(&source, |value| value + 1).is_empty());
    }
}
