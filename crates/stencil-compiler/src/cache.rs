/// Artifact cache keyed by template path and modification time
///
/// Every template compiles to one artifact file in a flat cache directory.
/// An artifact is fresh while it is at least as new as its template; the
/// engine recompiles whenever [`is_stale`] says otherwise.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tempfile::NamedTempFile;

use crate::error::{CompileError, Result};
use crate::include::identity_of;

/// File extension of every compiled artifact
pub const ARTIFACT_SUFFIX: &str = "stc";

/// Flattened path stems are cut to this many bytes so artifact names stay
/// within common file-name limits. The digest keeps truncated names unique.
const MAX_STEM_LEN: usize = 160;

/// Hex digits of the path digest kept in artifact names
const DIGEST_LEN: usize = 16;

/// Flat directory of compiled artifacts
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the cache directory if needed and open it up to every user.
    ///
    /// Permission changes are best effort.
    pub fn ensure_directory(&self) -> Result<PathBuf> {
        if !self.dir.is_dir() {
            fs::create_dir_all(&self.dir).map_err(|e| CompileError::write_failed(&self.dir, e))?;
            tracing::debug!(dir = %self.dir.display(), "created cache directory");
        }
        set_mode_best_effort(&self.dir, 0o777);
        Ok(self.dir.clone())
    }

    /// Deterministic artifact location for a template.
    ///
    /// The template path is canonicalized when it exists, flattened into a
    /// single file name, and suffixed with a digest of the exact path so two
    /// different paths never share an artifact.
    pub fn artifact_path_for(&self, source: &Path) -> PathBuf {
        let identity = identity_of(source);
        let raw = identity.to_string_lossy();

        let mut stem = flatten_path(&raw);
        if stem.len() > MAX_STEM_LEN {
            let mut cut = stem.len() - MAX_STEM_LEN;
            while !stem.is_char_boundary(cut) {
                cut += 1;
            }
            stem = stem[cut..].to_string();
        }

        let digest = blake3::hash(identity.as_os_str().as_encoded_bytes());
        let digest = hex::encode(&digest.as_bytes()[..DIGEST_LEN / 2]);

        self.dir.join(format!("{}.{}.{}", stem, digest, ARTIFACT_SUFFIX))
    }

    /// Persist an artifact; a failed write is fatal, permissions are best effort.
    ///
    /// The code goes to a temporary file in the cache directory which is then
    /// renamed over the artifact, so readers see either the old artifact or
    /// the new one, never a partial write.
    pub fn write(&self, artifact: &Path, code: &str) -> Result<()> {
        let dir = artifact.parent().unwrap_or(&self.dir);
        let mut staged = NamedTempFile::new_in(dir).map_err(|e| CompileError::write_failed(artifact, e))?;
        staged
            .write_all(code.as_bytes())
            .map_err(|e| CompileError::write_failed(artifact, e))?;
        staged
            .persist(artifact)
            .map_err(|e| CompileError::write_failed(artifact, e.error))?;
        set_mode_best_effort(artifact, 0o666);
        tracing::debug!(artifact = %artifact.display(), bytes = code.len(), "wrote artifact");
        Ok(())
    }

    pub fn read(&self, artifact: &Path) -> Result<String> {
        fs::read_to_string(artifact).map_err(|e| CompileError::source_not_found(artifact, e))
    }

    /// Delete every artifact in the cache directory, returning how many
    /// were removed. Files that disappear meanwhile are not errors.
    pub fn clear(&self) -> Result<usize> {
        let dir = self.ensure_directory()?;
        let mut removed = 0;

        for entry in fs::read_dir(&dir)? {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if path.extension().is_none_or(|ext| ext != ARTIFACT_SUFFIX) || !path.is_file() {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        tracing::debug!(dir = %dir.display(), removed, "cleared artifact cache");
        Ok(removed)
    }
}

/// Whether the artifact must be rebuilt.
///
/// True when the template is missing, caching is off, the artifact is
/// missing, or the artifact is older than the template. Unreadable
/// modification times count as infinitely old.
pub fn is_stale(source: &Path, artifact: &Path, caching_enabled: bool) -> bool {
    if !source.exists() || !caching_enabled || !artifact.exists() {
        return true;
    }
    mtime_or_epoch(artifact) < mtime_or_epoch(source)
}

/// Get the modification time of a file
///
/// Returns `None` if the file doesn't exist or mtime cannot be read
pub fn get_mtime(path: &Path) -> Option<SystemTime> {
    path.metadata().and_then(|m| m.modified()).ok()
}

fn mtime_or_epoch(path: &Path) -> SystemTime {
    get_mtime(path).unwrap_or(SystemTime::UNIX_EPOCH)
}

/// Flatten a path into one file-name-safe string, losslessly.
///
/// `_` doubles as the escape character: `_` becomes `__`, separators and
/// drive colons get two-character codes, anything else outside a small
/// portable set becomes `_x` plus its hex code point.
fn flatten_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 8);
    for c in path.chars() {
        match c {
            '_' => out.push_str("__"),
            '/' => out.push_str("_s"),
            '\\' => out.push_str("_b"),
            ':' => out.push_str("_c"),
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+' | '@' | ',' | '=') => {
                out.push(c)
            }
            c => out.push_str(&format!("_x{:x}_", c as u32)),
        }
    }
    out
}

#[cfg(unix)]
fn set_mode_best_effort(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;

    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(mode)) {
        tracing::warn!(path = %path.display(), error = %e, "could not set permissions");
    }
}

#[cfg(not(unix))]
fn set_mode_best_effort(_path: &Path, _mode: u32) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn set_mtime(path: &Path, time: SystemTime) {
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    #[test]
    fn test_flatten_is_lossless_for_underscores() {
        assert_ne!(flatten_path("/a/b_c"), flatten_path("/a_b/c"));
        assert_eq!(flatten_path("/a/b_c"), "_sa_sb__c");
        assert_eq!(flatten_path("C:\\x y"), "C_c_bx_x20_y");
    }

    #[test]
    fn test_ensure_directory_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path().join("nested/cache"));
        let first = store.ensure_directory().unwrap();
        let second = store.ensure_directory().unwrap();
        assert_eq!(first, second);
        assert!(first.is_dir());
    }

    #[test]
    fn test_artifact_paths_are_distinct() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path().join("cache"));

        let a = store.artifact_path_for(Path::new("/srv/a/b_c.tpl"));
        let b = store.artifact_path_for(Path::new("/srv/a_b/c.tpl"));
        let upper = store.artifact_path_for(Path::new("/srv/Page.tpl"));
        let lower = store.artifact_path_for(Path::new("/srv/page.tpl"));

        assert_ne!(a, b);
        assert_ne!(upper.to_string_lossy().to_lowercase(), lower.to_string_lossy().to_lowercase());
        assert_eq!(a.parent(), Some(store.dir()));
        assert_eq!(a.extension().and_then(|e| e.to_str()), Some(ARTIFACT_SUFFIX));
    }

    #[test]
    fn test_artifact_path_is_deterministic() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path());
        let source = tmp.path().join("t.tpl");
        fs::write(&source, "x").unwrap();
        assert_eq!(store.artifact_path_for(&source), store.artifact_path_for(&source));
    }

    #[test]
    fn test_long_paths_are_truncated() {
        let store = CacheStore::new("/cache");
        let long = format!("/{}", "segment/".repeat(60));
        let artifact = store.artifact_path_for(Path::new(&long));
        let name = artifact.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.len() <= MAX_STEM_LEN + DIGEST_LEN + ARTIFACT_SUFFIX.len() + 2);
    }

    #[test]
    fn test_is_stale_rules() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("page.tpl");
        let artifact = tmp.path().join("page.stc");

        assert!(is_stale(&source, &artifact, true), "missing source");

        fs::write(&source, "x").unwrap();
        assert!(is_stale(&source, &artifact, true), "missing artifact");

        fs::write(&artifact, "x").unwrap();
        let now = SystemTime::now();
        set_mtime(&source, now);
        set_mtime(&artifact, now);
        assert!(!is_stale(&source, &artifact, true), "same mtime is fresh");
        assert!(is_stale(&source, &artifact, false), "caching disabled");

        set_mtime(&source, now + Duration::from_secs(5));
        assert!(is_stale(&source, &artifact, true), "source newer");
    }

    #[test]
    fn test_write_replaces_and_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path());
        let artifact = store.artifact_path_for(Path::new("/x/page.tpl"));

        store.write(&artifact, "first").unwrap();
        store.write(&artifact, "second").unwrap();

        assert_eq!(store.read(&artifact).unwrap(), "second");
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_unwritable_cache_dir_names_the_path() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let store = CacheStore::new(blocker.join("cache"));
        match store.ensure_directory().unwrap_err() {
            CompileError::WriteFailed { path, .. } => assert_eq!(path, blocker.join("cache")),
            other => panic!("Expected WriteFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_artifact_read_names_the_path() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path());
        let artifact = tmp.path().join("gone.stc");
        match store.read(&artifact).unwrap_err() {
            CompileError::SourceNotFound { path, .. } => assert_eq!(path, artifact),
            other => panic!("Expected SourceNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_clear_removes_only_artifacts() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path());
        let artifact = store.artifact_path_for(Path::new("/x/page.tpl"));
        store.write(&artifact, "code").unwrap();
        fs::write(tmp.path().join("notes.txt"), "keep").unwrap();

        assert_eq!(store.clear().unwrap(), 1);
        assert!(!artifact.exists());
        assert!(tmp.path().join("notes.txt").exists());
        assert_eq!(store.clear().unwrap(), 0);
    }
}
