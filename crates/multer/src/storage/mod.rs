//! Local disk storage for file parts.
//!
//! - [`DestinationResolver`]: which directory a request's files go to, created on demand
//! - [`FileNameStrategy`]: the on-disk name of each file
//! - [`FileWriter`]: streams a part's content into the file

mod destination;
mod naming;
mod writer;

pub use destination::ChangeDest;
pub use destination::DestinationResolver;
pub use destination::create_dir_if_absent;
pub use naming::FileNameStrategy;
pub use naming::Rename;
pub(crate) use naming::extension;
pub use writer::FileWriter;
pub(crate) use writer::StoredFilesGuard;
pub use writer::WrittenFile;
