use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::ensure;
use crate::protocol::DestinationError;

/// Longest original extension carried over to a generated name.
const MAX_EXTENSION_LEN: usize = 16;

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Names a stored file from `(field_name, original_name)`.
///
/// The result is used verbatim, two parts mapping to the same name overwrite each other.
pub trait Rename: Send + Sync {
    fn rename(&self, field_name: &str, original_name: &str) -> String;
}

impl<F> Rename for F
where
    F: Fn(&str, &str) -> String + Send + Sync,
{
    fn rename(&self, field_name: &str, original_name: &str) -> String {
        (self)(field_name, original_name)
    }
}

/// How the on-disk name of an uploaded file is chosen.
#[derive(Clone, Default)]
pub enum FileNameStrategy {
    /// A random token unique within the process, keeping the original extension
    #[default]
    Unique,
    Custom(Arc<dyn Rename>),
}

impl FileNameStrategy {
    pub fn custom(rename: impl Rename + 'static) -> Self {
        FileNameStrategy::Custom(Arc::new(rename))
    }

    /// Computes the file name, rejecting names that would leave the destination directory.
    pub fn file_name(&self, field_name: &str, original_name: &str) -> Result<String, DestinationError> {
        let name = match self {
            FileNameStrategy::Unique => unique_name(original_name),
            FileNameStrategy::Custom(rename) => rename.rename(field_name, original_name),
        };

        ensure!(is_plain_file_name(&name), DestinationError::invalid_file_name(name));
        Ok(name)
    }
}

impl fmt::Debug for FileNameStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileNameStrategy::Unique => f.write_str("Unique"),
            FileNameStrategy::Custom(_) => f.write_str("Custom"),
        }
    }
}

fn unique_name(original_name: &str) -> String {
    let token = format!("{:016x}{:04x}", rand::random::<u64>(), COUNTER.fetch_add(1, Ordering::Relaxed) & 0xffff);

    match extension(original_name) {
        Some(ext) if ext.len() <= MAX_EXTENSION_LEN && ext.bytes().all(|b| b.is_ascii_alphanumeric()) => {
            format!("{token}.{ext}")
        }
        _ => token,
    }
}

/// The extension of `name` without the dot.
pub(crate) fn extension(name: &str) -> Option<&str> {
    Path::new(name).extension().and_then(|ext| ext.to_str())
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn unique_keeps_extension() {
        let name = FileNameStrategy::Unique.file_name("avatar", "me.png").unwrap();
        assert!(name.ends_with(".png"));
        assert_eq!(name.len(), 20 + ".png".len());
    }

    #[test]
    fn unique_drops_odd_extension() {
        let name = FileNameStrategy::Unique.file_name("avatar", "me.p g").unwrap();
        assert!(!name.contains('.'));

        let name = FileNameStrategy::Unique.file_name("avatar", "README").unwrap();
        assert!(!name.contains('.'));
    }

    #[test]
    fn unique_names_differ() {
        let names = (0..1000)
            .map(|_| FileNameStrategy::Unique.file_name("f", "a.txt").unwrap())
            .collect::<HashSet<_>>();
        assert_eq!(names.len(), 1000);
    }

    #[test]
    fn custom_is_verbatim() {
        let strategy = FileNameStrategy::custom(|field_name: &str, original_name: &str| format!("{field_name}{original_name}"));
        assert_eq!(strategy.file_name("small0", "small0.dat").unwrap(), "small0small0.dat");
    }

    #[test]
    fn custom_rejects_escaping_names() {
        for bad in ["", ".", "..", "../etc/passwd", "a/b", "a\\b"] {
            let strategy = FileNameStrategy::custom(move |_: &str, _: &str| bad.to_string());
            let result = strategy.file_name("f", "a.txt");
            assert!(matches!(result, Err(DestinationError::InvalidFileName { .. })), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn extension_of() {
        assert_eq!(extension("a.tar.gz"), Some("gz"));
        assert_eq!(extension(".hidden"), None);
        assert_eq!(extension("plain"), None);
    }
}
