//! Cache Tag Registry
//!
//! Derives the canonical cache tags for every entity type in three scopes:
//!
//! | Scope    | Meaning                                        | Format                              |
//! |----------|------------------------------------------------|-------------------------------------|
//! | global   | any instance of the type may have changed      | `<type>:global`                     |
//! | id       | the instance with this key may have changed    | `<type>:id:<key>`                   |
//! | relation | the instances related to `<related>` changed   | `<type>:<related>:<key>`            |
//!
//! `<key>` is one or more length-prefixed parts, `<byte-len>#<part>`, so a
//! composite key `(a, b)` encodes as `len(a)#a len(b)#b` with nothing in
//! between. The encoding is prefix-free: ids may contain `:`, `#` or `-`
//! without two distinct keys ever producing the same tag.
//!
//! Type and related-type names come from closed enums. None of them contains
//! `:` and no related-type name is `global` or `id`, so the three scopes can
//! never produce the same string.
//!
//! Derivation is pure. Invalidation is performed by the cache store
//! (`jobboard-storage::cache`); this module only computes *which* tags a read
//! depends on ([`reads`]) and which tags a write must invalidate
//! ([`CacheTagged`]).

mod contract;
pub mod reads;

pub use contract::{moved_write_tags, CacheTagged, JobListingCascade, OrganizationCascade, UserCascade};

use crate::{
    ApplicationKey, EntityType, JobListingId, OrganizationId, OrganizationUserKey, RelatedEntity,
    UserId,
};
use std::collections::BTreeSet;
use std::fmt;

// ============================================================================
// TAG
// ============================================================================

/// A cache invalidation scope.
///
/// Only constructible through [`global_tag`], [`id_tag`] and
/// [`relation_tag`], so every tag in the system has the canonical format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(String);

impl Tag {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Tag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// KEY ENCODING
// ============================================================================

/// Appends length-prefixed key parts to a tag under construction.
pub struct KeyEncoder<'a> {
    out: &'a mut String,
}

impl KeyEncoder<'_> {
    pub fn part(&mut self, part: &str) {
        self.out.push_str(&part.len().to_string());
        self.out.push('#');
        self.out.push_str(part);
    }
}

/// A value usable as the key of an id or relation tag.
pub trait TagKey {
    fn encode_key(&self, key: &mut KeyEncoder<'_>);
}

/// The length-prefixed form of `key`, as it appears at the end of an id or
/// relation tag.
pub fn encode_tag_key(key: &impl TagKey) -> String {
    let mut out = String::with_capacity(32);
    key.encode_key(&mut KeyEncoder { out: &mut out });
    out
}

impl<K: TagKey + ?Sized> TagKey for &K {
    fn encode_key(&self, key: &mut KeyEncoder<'_>) {
        (**self).encode_key(key)
    }
}

impl TagKey for UserId {
    fn encode_key(&self, key: &mut KeyEncoder<'_>) {
        key.part(self.as_str());
    }
}

impl TagKey for OrganizationId {
    fn encode_key(&self, key: &mut KeyEncoder<'_>) {
        key.part(self.as_str());
    }
}

impl TagKey for JobListingId {
    fn encode_key(&self, key: &mut KeyEncoder<'_>) {
        key.part(&self.as_uuid().hyphenated().to_string());
    }
}

impl TagKey for ApplicationKey {
    fn encode_key(&self, key: &mut KeyEncoder<'_>) {
        self.job_listing_id.encode_key(key);
        self.user_id.encode_key(key);
    }
}

impl TagKey for OrganizationUserKey {
    fn encode_key(&self, key: &mut KeyEncoder<'_>) {
        self.user_id.encode_key(key);
        self.organization_id.encode_key(key);
    }
}

// ============================================================================
// DERIVATION
// ============================================================================

/// "Any instance of `entity_type` may have changed."
pub fn global_tag(entity_type: EntityType) -> Tag {
    Tag(format!("{}:global", entity_type.as_str()))
}

/// "The instance of `entity_type` identified by `id` may have changed."
pub fn id_tag(entity_type: EntityType, id: &impl TagKey) -> Tag {
    scoped(entity_type, "id", id)
}

/// "The instances of `entity_type` related to `related_id` of type
/// `related` may have changed."
pub fn relation_tag(entity_type: EntityType, related: RelatedEntity, related_id: &impl TagKey) -> Tag {
    scoped(entity_type, related.as_str(), related_id)
}

fn scoped(entity_type: EntityType, scope: &str, key: &impl TagKey) -> Tag {
    let mut out = String::with_capacity(64);
    out.push_str(entity_type.as_str());
    out.push(':');
    out.push_str(scope);
    out.push(':');
    key.encode_key(&mut KeyEncoder { out: &mut out });
    Tag(out)
}

// ============================================================================
// TAG SET
// ============================================================================

/// A non-empty, ordered, de-duplicated set of tags.
///
/// Cached reads and write invalidations both take a `TagSet`, so neither can
/// be expressed without naming at least one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSet {
    tags: BTreeSet<Tag>,
}

impl TagSet {
    pub fn new(first: Tag) -> Self {
        let mut tags = BTreeSet::new();
        tags.insert(first);
        Self { tags }
    }

    /// Builder-style insert.
    pub fn with(mut self, tag: Tag) -> Self {
        self.tags.insert(tag);
        self
    }

    pub fn insert(&mut self, tag: Tag) -> bool {
        self.tags.insert(tag)
    }

    pub fn union(mut self, other: TagSet) -> Self {
        self.tags.extend(other.tags);
        self
    }

    pub fn contains(&self, tag: &Tag) -> bool {
        self.tags.contains(tag)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Always false; present for API symmetry with std collections.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter()
    }

    /// Builds a set from an iterator, returning `None` when it yields nothing.
    pub fn try_from_iter(iter: impl IntoIterator<Item = Tag>) -> Option<Self> {
        let tags: BTreeSet<Tag> = iter.into_iter().collect();
        if tags.is_empty() {
            None
        } else {
            Some(Self { tags })
        }
    }
}

impl From<Tag> for TagSet {
    fn from(tag: Tag) -> Self {
        TagSet::new(tag)
    }
}

impl Extend<Tag> for TagSet {
    fn extend<I: IntoIterator<Item = Tag>>(&mut self, iter: I) {
        self.tags.extend(iter);
    }
}

impl IntoIterator for TagSet {
    type Item = Tag;
    type IntoIter = std::collections::btree_set::IntoIter<Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.into_iter()
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a Tag;
    type IntoIter = std::collections::btree_set::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, tag) in self.tags.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(tag.as_str())?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_formats() {
        let listing = JobListingId::from_uuid(Uuid::nil());
        assert_eq!(global_tag(EntityType::JobListings).as_str(), "jobListings:global");
        assert_eq!(
            id_tag(EntityType::JobListings, &listing).as_str(),
            "jobListings:id:36#00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(
            relation_tag(
                EntityType::JobListingApplications,
                RelatedEntity::JobListing,
                &listing
            )
            .as_str(),
            "jobListingApplications:jobListing:36#00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_composite_keys_do_not_collide_on_shared_delimiters() {
        let a = OrganizationUserKey::new(UserId::new("a-b"), OrganizationId::new("c"));
        let b = OrganizationUserKey::new(UserId::new("a"), OrganizationId::new("b-c"));
        assert_ne!(
            id_tag(EntityType::OrganizationUserSettings, &a),
            id_tag(EntityType::OrganizationUserSettings, &b)
        );

        let c = OrganizationUserKey::new(UserId::new("1#x"), OrganizationId::new(""));
        let d = OrganizationUserKey::new(UserId::new(""), OrganizationId::new("1#x"));
        assert_ne!(
            id_tag(EntityType::OrganizationUserSettings, &c),
            id_tag(EntityType::OrganizationUserSettings, &d)
        );
    }

    #[test]
    fn test_global_is_not_an_id_named_global() {
        let tag = id_tag(EntityType::Users, &UserId::new("global"));
        assert_ne!(tag, global_tag(EntityType::Users));
    }

    #[test]
    fn test_tag_set_deduplicates() {
        let t = global_tag(EntityType::Users);
        let set = TagSet::new(t.clone()).with(t.clone());
        assert_eq!(set.len(), 1);
        assert!(set.contains(&t));
        assert!(!set.is_empty());
    }

    #[test]
    fn test_try_from_iter_rejects_empty() {
        assert!(TagSet::try_from_iter(Vec::new()).is_none());
        let set = TagSet::try_from_iter(vec![global_tag(EntityType::Users)])
            .expect("non-empty iterator should build a set");
        assert_eq!(set.len(), 1);
    }
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn entity_type() -> impl Strategy<Value = EntityType> {
        prop::sample::select(EntityType::ALL.to_vec())
    }

    fn related_entity() -> impl Strategy<Value = RelatedEntity> {
        prop::sample::select(RelatedEntity::ALL.to_vec())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Deriving the same tag twice yields the same string.
        #[test]
        fn prop_id_tag_is_deterministic(t in entity_type(), id in ".*") {
            let id = UserId::new(id);
            prop_assert_eq!(id_tag(t, &id), id_tag(t, &id));
        }

        /// Distinct entity types never share an id tag, even for equal raw ids.
        #[test]
        fn prop_no_cross_type_collision(
            t1 in entity_type(),
            t2 in entity_type(),
            x in ".*",
            y in ".*",
        ) {
            prop_assume!(t1 != t2);
            prop_assert_ne!(
                id_tag(t1, &UserId::new(x)),
                id_tag(t2, &UserId::new(y))
            );
        }

        /// Global, id and relation scopes of one type never coincide.
        #[test]
        fn prop_no_cross_scope_collision(
            t in entity_type(),
            r in related_entity(),
            x in ".*",
            y in ".*",
        ) {
            let global = global_tag(t);
            let id = id_tag(t, &UserId::new(x));
            let relation = relation_tag(t, r, &OrganizationId::new(y));
            prop_assert_ne!(&global, &id);
            prop_assert_ne!(&global, &relation);
            prop_assert_ne!(&id, &relation);
        }

        /// Composite keys are injective in both components.
        #[test]
        fn prop_composite_keys_are_unambiguous(
            a in "[a-z:#0-9-]{0,8}",
            b in "[a-z:#0-9-]{0,8}",
            c in "[a-z:#0-9-]{0,8}",
            d in "[a-z:#0-9-]{0,8}",
        ) {
            prop_assume!((a.as_str(), b.as_str()) != (c.as_str(), d.as_str()));
            let left = OrganizationUserKey::new(UserId::new(a), OrganizationId::new(b));
            let right = OrganizationUserKey::new(UserId::new(c), OrganizationId::new(d));
            prop_assert_ne!(
                id_tag(EntityType::OrganizationUserSettings, &left),
                id_tag(EntityType::OrganizationUserSettings, &right)
            );
        }

        /// Relation tags for different related types never collide.
        #[test]
        fn prop_relation_scopes_are_distinct(
            t in entity_type(),
            r1 in related_entity(),
            r2 in related_entity(),
            x in ".*",
        ) {
            prop_assume!(r1 != r2);
            let id = UserId::new(x);
            prop_assert_ne!(relation_tag(t, r1, &id), relation_tag(t, r2, &id));
        }
    }
}
