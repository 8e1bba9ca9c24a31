//! Hit/miss metadata for cached reads.

/// Result of a cached read, carrying where the value came from.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    was_cache_hit: bool,
}

impl<T> CacheRead<T> {
    pub fn from_cache(value: T) -> Self {
        Self {
            value,
            was_cache_hit: true,
        }
    }

    /// A value fetched from storage, memoized or not.
    pub fn from_storage(value: T) -> Self {
        Self {
            value,
            was_cache_hit: false,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }

    pub fn was_cache_miss(&self) -> bool {
        !self.was_cache_hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_storage_is_a_miss() {
        let read = CacheRead::from_storage(7);
        assert!(read.was_cache_miss());
        assert!(!read.was_cache_hit());
        assert_eq!(read.into_value(), 7);
    }

    #[test]
    fn test_from_cache_is_a_hit() {
        let read = CacheRead::from_cache("draft");
        assert!(read.was_cache_hit());
        assert_eq!(read.into_value(), "draft");
    }
}
