//! Job board core
//!
//! Entity model, identifiers, error taxonomy and the cache tag registry.
//! This crate performs no I/O; storage and caching live in
//! `jobboard-storage`.

pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;
pub mod tags;

pub use entities::*;
pub use enums::*;
pub use error::*;
pub use identity::*;
pub use tags::{
    encode_tag_key, global_tag, id_tag, moved_write_tags, relation_tag, CacheTagged,
    JobListingCascade, KeyEncoder, OrganizationCascade, Tag, TagKey, TagSet, UserCascade,
};
