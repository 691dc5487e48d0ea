//! Repository directory maps and per-directory workspace registration

pub mod create;
pub mod mapping;
pub mod source;

pub use mapping::RepoMapping;
pub use source::RepoTarget;
