use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use http::request::Parts;
use tokio::fs;
use tracing::debug;

use crate::protocol::{BoxError, DestinationError};

/// Computes the directory a request's files are written to.
///
/// `dest` is the configured base directory. Returning an error fails the request
/// with [`DestinationError::Callback`].
#[cfg_attr(test, mockall::automock)]
pub trait ChangeDest: Send + Sync {
    fn change_dest(&self, dest: &Path, req: &Parts) -> Result<PathBuf, BoxError>;
}

impl<F> ChangeDest for F
where
    F: Fn(&Path, &Parts) -> Result<PathBuf, BoxError> + Send + Sync,
{
    fn change_dest(&self, dest: &Path, req: &Parts) -> Result<PathBuf, BoxError> {
        (self)(dest, req)
    }
}

/// Resolves the destination directory of a request and makes sure it exists.
#[derive(Clone)]
pub enum DestinationResolver {
    /// Every file goes to the same directory
    Fixed(PathBuf),
    /// The directory is computed per request from the base directory
    Custom { base: PathBuf, change_dest: Arc<dyn ChangeDest> },
}

impl DestinationResolver {
    /// The configured base directory.
    pub fn base(&self) -> &Path {
        match self {
            DestinationResolver::Fixed(path) => path,
            DestinationResolver::Custom { base, .. } => base,
        }
    }

    /// Returns the absolute directory for this request, created if it was absent.
    ///
    /// Relative directories are resolved against the current working directory.
    pub async fn resolve(&self, req: &Parts) -> Result<PathBuf, DestinationError> {
        let dest = match self {
            DestinationResolver::Fixed(path) => path.clone(),
            DestinationResolver::Custom { base, change_dest } => {
                change_dest.change_dest(base, req).map_err(DestinationError::callback)?
            }
        };
        let dest = std::path::absolute(&dest).map_err(|e| DestinationError::io(&dest, e))?;

        ensure_dir(&dest).await?;
        Ok(dest)
    }
}

impl fmt::Debug for DestinationResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestinationResolver::Fixed(path) => f.debug_tuple("Fixed").field(path).finish(),
            DestinationResolver::Custom { base, .. } => f.debug_struct("Custom").field("base", base).finish_non_exhaustive(),
        }
    }
}

/// Creates `path` and its parents unless it already is a directory.
///
/// Another request creating the same directory concurrently is not an error: whoever
/// loses the race observes the directory and carries on. An existing inode of another
/// type fails with [`DestinationError::NotADirectory`].
async fn ensure_dir(path: &Path) -> Result<(), DestinationError> {
    match fs::metadata(path).await {
        Ok(metadata) if metadata.is_dir() => return Ok(()),
        Ok(_) => return Err(DestinationError::not_a_directory(path)),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(DestinationError::io(path, e)),
    }

    match fs::create_dir_all(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "created destination directory");
            Ok(())
        }
        Err(e) => match fs::metadata(path).await {
            Ok(metadata) if metadata.is_dir() => Ok(()),
            Ok(_) => Err(DestinationError::not_a_directory(path)),
            Err(_) => Err(DestinationError::io(path, e)),
        },
    }
}

/// Blocking variant of the directory check for [`ChangeDest`] callbacks.
///
/// Follows the same policy as the resolver: an existing directory is fine, a missing
/// one is created, anything else at `path` is an error.
pub fn create_dir_if_absent(path: impl AsRef<Path>) -> Result<(), DestinationError> {
    let path = path.as_ref();
    match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => return Ok(()),
        Ok(_) => return Err(DestinationError::not_a_directory(path)),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(DestinationError::io(path, e)),
    }

    match std::fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) => match std::fs::metadata(path) {
            Ok(metadata) if metadata.is_dir() => Ok(()),
            Ok(_) => Err(DestinationError::not_a_directory(path)),
            Err(_) => Err(DestinationError::io(path, e)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;

    use crate::test_util::relative_to_cwd;

    fn parts(uri: &str) -> Parts {
        Request::builder().uri(uri).body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn fixed_creates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a").join("b");
        let resolver = DestinationResolver::Fixed(dest.clone());

        let resolved = resolver.resolve(&parts("/upload")).await.unwrap();
        assert_eq!(resolved, dest);
        assert!(dest.is_dir());
    }

    #[tokio::test]
    async fn relative_dest_is_made_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let relative = relative_to_cwd(&dir.path().join("uploads"));
        let resolver = DestinationResolver::Fixed(relative);

        let resolved = resolver.resolve(&parts("/upload")).await.unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.is_dir());
        assert!(dir.path().join("uploads").is_dir());
    }

    #[tokio::test]
    async fn custom_appends_user_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut change_dest = MockChangeDest::new();
        change_dest.expect_change_dest().times(1).returning(|dest, _| {
            let path = dest.join("user1");
            create_dir_if_absent(&path)?;
            Ok(path)
        });

        let resolver = DestinationResolver::Custom { base: dir.path().to_path_buf(), change_dest: Arc::new(change_dest) };
        let resolved = resolver.resolve(&parts("/upload")).await.unwrap();

        assert_eq!(resolved, dir.path().join("user1"));
        assert!(resolved.is_dir());
    }

    #[tokio::test]
    async fn custom_sees_the_request() {
        let dir = tempfile::tempdir().unwrap();
        let change_dest = |dest: &Path, req: &Parts| -> Result<PathBuf, BoxError> {
            let user = req.uri.path().trim_start_matches("/upload/");
            Ok(dest.join(user))
        };

        let resolver = DestinationResolver::Custom { base: dir.path().to_path_buf(), change_dest: Arc::new(change_dest) };
        let resolved = resolver.resolve(&parts("/upload/alice")).await.unwrap();
        assert_eq!(resolved, dir.path().join("alice"));
    }

    #[tokio::test]
    async fn callback_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut change_dest = MockChangeDest::new();
        change_dest.expect_change_dest().returning(|_, _| Err("no user".into()));

        let resolver = DestinationResolver::Custom { base: dir.path().to_path_buf(), change_dest: Arc::new(change_dest) };
        let result = resolver.resolve(&parts("/upload")).await;
        assert!(matches!(result, Err(DestinationError::Callback { .. })));
    }

    #[tokio::test]
    async fn file_in_the_way() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("taken");
        std::fs::write(&file, b"x").unwrap();

        let resolver = DestinationResolver::Fixed(file.clone());
        let result = resolver.resolve(&parts("/upload")).await;
        assert!(matches!(result, Err(DestinationError::NotADirectory { .. })));

        assert!(matches!(create_dir_if_absent(&file), Err(DestinationError::NotADirectory { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creation() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("shared").join("nested");
        let resolver = Arc::new(DestinationResolver::Fixed(dest.clone()));

        let tasks = (0..16)
            .map(|_| {
                let resolver = Arc::clone(&resolver);
                tokio::spawn(async move { resolver.resolve(&parts("/upload")).await })
            })
            .collect::<Vec<_>>();

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), dest);
        }
        assert!(dest.is_dir());
    }

    #[test]
    fn create_dir_if_absent_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x");
        create_dir_if_absent(&path).unwrap();
        create_dir_if_absent(&path).unwrap();
        assert!(path.is_dir());
    }
}
