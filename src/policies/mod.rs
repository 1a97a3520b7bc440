//! Built-in policies.
//!
//! Each policy is constructed from its [`PolicyConfig`](crate::config::PolicyConfig)
//! entry and registered in file order by
//! [`PolicyRegistry::from_config`](crate::traits::PolicyRegistry::from_config).

pub mod child_xref;
pub mod communication;
pub mod date_range;
pub mod domains;
pub mod entities;
pub mod exclude;
pub mod pdf_split;
pub mod pulldown;
pub mod store_binary;
pub mod tags;

pub use child_xref::ChildXref;
pub use communication::AppendRecipients;
pub use date_range::{CommunicationYearFilter, DateRangeFilter};
pub use domains::DateRangeDomainFilter;
pub use entities::NamedEntities;
pub use exclude::{ExcludeExtensions, ExcludeMimeTypes};
pub use pdf_split::SplitPdfPages;
pub use pulldown::ParentPulldown;
pub use store_binary::StoreBinaryByAncestor;
pub use tags::{DigestTags, MimeTypeTags};
