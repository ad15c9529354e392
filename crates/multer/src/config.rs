//! Middleware configuration.
//!
//! A [`MulterConfig`] is assembled once through [`MulterConfigBuilder`] and frozen
//! inside a [`Multer`]. Every request served by that middleware reads the same
//! configuration, nothing in it changes per request.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use http::request::Parts;

use crate::Multer;
use crate::protocol::{BoxError, ConfigError};
use crate::storage::{ChangeDest, DestinationResolver, FileNameStrategy};

/// Size and count limits applied while decoding a request.
///
/// Exceeding any limit fails the request with a `LimitExceeded` parse error, except
/// `file_size`: a file larger than that is cut at the limit and reported as truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Max length of a field name in bytes
    pub field_name_size: usize,
    /// Max size of a field value in bytes
    pub field_size: usize,
    /// Max number of field parts
    pub fields: Option<usize>,
    /// Max size of a single file in bytes
    pub file_size: Option<u64>,
    /// Max number of file parts
    pub files: Option<usize>,
    /// Max number of parts, fields and files together
    pub parts: Option<usize>,
}

impl Default for Limits {
    fn default() -> Self {
        Self { field_name_size: 100, field_size: 1024 * 1024, fields: None, file_size: None, files: None, parts: None }
    }
}

/// How files are recorded when a field name is seen once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArrayPolicy {
    /// A single file stays a single value, repeated names become a sequence
    #[default]
    Auto,
    /// Files are always recorded as a sequence
    ForcedArray,
}

/// The immutable configuration shared by every request of a [`Multer`].
#[derive(Debug)]
pub struct MulterConfig {
    destination: DestinationResolver,
    naming: FileNameStrategy,
    array_policy: ArrayPolicy,
    include_empty_fields: bool,
    limits: Limits,
}

impl MulterConfig {
    pub fn builder() -> MulterConfigBuilder {
        MulterConfigBuilder::new()
    }

    pub fn destination(&self) -> &DestinationResolver {
        &self.destination
    }

    pub fn naming(&self) -> &FileNameStrategy {
        &self.naming
    }

    pub fn array_policy(&self) -> ArrayPolicy {
        self.array_policy
    }

    pub fn include_empty_fields(&self) -> bool {
        self.include_empty_fields
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }
}

pub struct MulterConfigBuilder {
    dest: Option<PathBuf>,
    change_dest: Option<Arc<dyn ChangeDest>>,
    naming: FileNameStrategy,
    put_single_files_in_array: bool,
    include_empty_fields: bool,
    limits: Limits,
}

impl fmt::Debug for MulterConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MulterConfigBuilder")
            .field("dest", &self.dest)
            .field("change_dest", &self.change_dest.is_some())
            .field("naming", &self.naming)
            .field("put_single_files_in_array", &self.put_single_files_in_array)
            .field("include_empty_fields", &self.include_empty_fields)
            .field("limits", &self.limits)
            .finish()
    }
}

impl MulterConfigBuilder {
    fn new() -> Self {
        Self {
            dest: None,
            change_dest: None,
            naming: FileNameStrategy::default(),
            put_single_files_in_array: false,
            include_empty_fields: false,
            limits: Limits::default(),
        }
    }

    /// The base directory uploaded files are written to.
    pub fn dest(mut self, dest: impl Into<PathBuf>) -> Self {
        self.dest = Some(dest.into());
        self
    }

    /// Names stored files with `f(field_name, original_name)` instead of a unique token.
    pub fn rename<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str) -> String + Send + Sync + 'static,
    {
        self.naming = FileNameStrategy::custom(f);
        self
    }

    /// Computes the destination per request with `f(dest, request)`.
    ///
    /// The returned directory is created if it doesn't exist yet, an error returned by
    /// `f` fails the request.
    pub fn change_dest<F>(mut self, f: F) -> Self
    where
        F: Fn(&Path, &Parts) -> Result<PathBuf, BoxError> + Send + Sync + 'static,
    {
        self.change_dest = Some(Arc::new(f));
        self
    }

    /// Like [`Self::change_dest`], for a prepared [`ChangeDest`] implementation.
    pub fn change_dest_with(mut self, change_dest: impl ChangeDest + 'static) -> Self {
        self.change_dest = Some(Arc::new(change_dest));
        self
    }

    pub fn put_single_files_in_array(mut self, enabled: bool) -> Self {
        self.put_single_files_in_array = enabled;
        self
    }

    /// Keeps fields with an empty value, they are dropped by default.
    pub fn include_empty_fields(mut self, enabled: bool) -> Self {
        self.include_empty_fields = enabled;
        self
    }

    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn build(self) -> Result<Multer, ConfigError> {
        let dest = self.dest.ok_or(ConfigError::MissingDest)?;
        if dest.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDest);
        }

        // a missing directory is created on the first upload
        if let Ok(metadata) = fs::metadata(&dest)
            && !metadata.is_dir()
        {
            return Err(ConfigError::DestNotDirectory { path: dest });
        }

        if self.limits.field_name_size == 0 {
            return Err(ConfigError::InvalidLimit { name: "field_name_size" });
        }
        if self.limits.field_size == 0 {
            return Err(ConfigError::InvalidLimit { name: "field_size" });
        }

        let destination = match self.change_dest {
            Some(change_dest) => DestinationResolver::Custom { base: dest, change_dest },
            None => DestinationResolver::Fixed(dest),
        };

        let array_policy = if self.put_single_files_in_array { ArrayPolicy::ForcedArray } else { ArrayPolicy::Auto };

        Ok(Multer::new(MulterConfig {
            destination,
            naming: self.naming,
            array_policy,
            include_empty_fields: self.include_empty_fields,
            limits: self.limits,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dest() {
        let result = MulterConfig::builder().build();
        assert!(matches!(result, Err(ConfigError::MissingDest)));
    }

    #[test]
    fn empty_dest() {
        let result = MulterConfig::builder().dest("").build();
        assert!(matches!(result, Err(ConfigError::EmptyDest)));
    }

    #[test]
    fn dest_is_a_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let result = MulterConfig::builder().dest(file.path()).build();
        assert!(matches!(result, Err(ConfigError::DestNotDirectory { .. })));
    }

    #[test]
    fn zero_limit() {
        let dir = tempfile::tempdir().unwrap();
        let limits = Limits { field_size: 0, ..Limits::default() };
        let result = MulterConfig::builder().dest(dir.path()).limits(limits).build();
        assert!(matches!(result, Err(ConfigError::InvalidLimit { name: "field_size" })));
    }

    #[test]
    fn defaults() {
        let dir = tempfile::tempdir().unwrap();
        let multer = MulterConfig::builder().dest(dir.path().join("not-yet")).build().unwrap();
        let config = multer.config();

        assert_eq!(config.array_policy(), ArrayPolicy::Auto);
        assert!(!config.include_empty_fields());
        assert_eq!(config.limits(), &Limits::default());
        assert_eq!(config.destination().base(), dir.path().join("not-yet"));
        assert!(!dir.path().join("not-yet").exists());
    }

    #[test]
    fn forced_array() {
        let dir = tempfile::tempdir().unwrap();
        let multer = MulterConfig::builder().dest(dir.path()).put_single_files_in_array(true).build().unwrap();
        assert_eq!(multer.config().array_policy(), ArrayPolicy::ForcedArray);
    }
}
