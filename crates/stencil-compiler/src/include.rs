/// Include and extend resolution
///
/// This module handles:
/// - Reading template sources and following `include`/`extend` directives
/// - Resolving include paths relative to the including template
/// - Detecting include cycles and runaway nesting

use std::path::{Path, PathBuf};

use regex::Captures;

use crate::directive::INCLUDE_RE;
use crate::error::{CompileError, Result};

/// Expands include directives recursively, one top-level compile at a time
pub struct IncludeResolver {
    /// Maximum nesting of includes below the entry template
    max_depth: usize,
    /// Templates currently being expanded, outermost first (for cycle detection)
    stack: Vec<PathBuf>,
    /// Every template read, in the order first read
    visited: Vec<PathBuf>,
}

impl IncludeResolver {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            stack: Vec::new(),
            visited: Vec::new(),
        }
    }

    /// Templates read so far, entry template first
    pub fn visited(&self) -> &[PathBuf] {
        &self.visited
    }

    /// Read `path` and replace every include directive with the
    /// include-resolved text of the referenced template
    pub fn resolve(&mut self, path: &Path) -> Result<String> {
        let identity = identity_of(path);

        if self.stack.contains(&identity) {
            let mut chain = self.stack.clone();
            chain.push(identity);
            return Err(CompileError::IncludeCycle(chain));
        }

        // The entry template sits at depth zero
        if self.stack.len() > self.max_depth {
            return Err(CompileError::IncludeDepthExceeded {
                path: path.to_path_buf(),
                limit: self.max_depth,
            });
        }

        let code = std::fs::read_to_string(path)
            .map_err(|e| CompileError::source_not_found(path, e))?;

        if !self.visited.contains(&identity) {
            self.visited.push(identity.clone());
        }
        self.stack.push(identity);
        let expanded = self.expand(&code, path);
        self.stack.pop();

        expanded
    }

    fn expand(&mut self, code: &str, current: &Path) -> Result<String> {
        let mut out = String::with_capacity(code.len());
        let mut last = 0;

        for caps in INCLUDE_RE.captures_iter(code) {
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&code[last..whole.start()]);
            last = whole.end();

            let target = include_target(&caps);
            if target.is_empty() {
                tracing::debug!(file = %current.display(), "dropping include without a path");
                continue;
            }

            let included = self.locate(target, current);
            tracing::debug!(from = %current.display(), include = %included.display(), "resolving include");
            out.push_str(&self.resolve(&included)?);
        }

        out.push_str(&code[last..]);
        Ok(out)
    }

    /// Relative includes resolve against the including template's directory
    /// first, then against the path as written.
    fn locate(&self, target: &str, current: &Path) -> PathBuf {
        let target = Path::new(target);
        if target.is_relative() {
            if let Some(dir) = current.parent() {
                let sibling = dir.join(target);
                if sibling.is_file() {
                    return sibling;
                }
            }
        }
        target.to_path_buf()
    }
}

fn include_target<'c>(caps: &'c Captures) -> &'c str {
    caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default()
}

/// Canonical path when the file exists, the path as given otherwise
pub(crate) fn identity_of(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_nested_includes_resolve_recursively() {
        let dir = TempDir::new().unwrap();
        write(&dir, "c.tpl", "C");
        write(&dir, "b.tpl", "B[{{@ include 'c.tpl' }}]");
        let a = write(&dir, "a.tpl", "A[{{@ include 'b.tpl' }}]");

        let mut resolver = IncludeResolver::new(8);
        assert_eq!(resolver.resolve(&a).unwrap(), "A[B[C]]");
        assert_eq!(resolver.visited().len(), 3);
    }

    #[test]
    fn test_extend_quotes_optional_and_case_insensitive() {
        let dir = TempDir::new().unwrap();
        write(&dir, "layout.tpl", "L");
        let page = write(&dir, "page.tpl", "{{@EXTEND layout.tpl}}|{{@ Include \"layout.tpl\" }}");

        let mut resolver = IncludeResolver::new(8);
        assert_eq!(resolver.resolve(&page).unwrap(), "L|L");
    }

    #[test]
    fn test_include_relative_to_including_file() {
        let dir = TempDir::new().unwrap();
        write(&dir, "partials/footer.tpl", "footer");
        write(&dir, "partials/wrap.tpl", "<{{@ include 'footer.tpl' }}>");
        let page = write(&dir, "page.tpl", "{{@ include 'partials/wrap.tpl' }}");

        let mut resolver = IncludeResolver::new(8);
        assert_eq!(resolver.resolve(&page).unwrap(), "<footer>");
    }

    #[test]
    fn test_same_partial_twice_is_not_a_cycle() {
        let dir = TempDir::new().unwrap();
        write(&dir, "hr.tpl", "-");
        let page = write(&dir, "page.tpl", "{{@ include 'hr.tpl' }}x{{@ include 'hr.tpl' }}");

        let mut resolver = IncludeResolver::new(8);
        assert_eq!(resolver.resolve(&page).unwrap(), "-x-");
    }

    #[test]
    fn test_cycle_detected() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.tpl", "{{@ include 'b.tpl' }}");
        write(&dir, "b.tpl", "{{@ include 'a.tpl' }}");

        let mut resolver = IncludeResolver::new(8);
        let err = resolver.resolve(&dir.path().join("a.tpl")).unwrap_err();
        match err {
            CompileError::IncludeCycle(chain) => assert_eq!(chain.len(), 3),
            other => panic!("Expected IncludeCycle, got {:?}", other),
        }
    }

    #[test]
    fn test_depth_limit() {
        let dir = TempDir::new().unwrap();
        write(&dir, "d2.tpl", "end");
        write(&dir, "d1.tpl", "{{@ include 'd2.tpl' }}");
        let top = write(&dir, "d0.tpl", "{{@ include 'd1.tpl' }}");

        assert_eq!(IncludeResolver::new(2).resolve(&top).unwrap(), "end");
        assert!(matches!(
            IncludeResolver::new(1).resolve(&top),
            Err(CompileError::IncludeDepthExceeded { limit: 1, .. })
        ));
    }

    #[test]
    fn test_missing_include_is_source_not_found() {
        let dir = TempDir::new().unwrap();
        let page = write(&dir, "page.tpl", "{{@ include 'nope.tpl' }}");

        let err = IncludeResolver::new(8).resolve(&page).unwrap_err();
        assert!(matches!(err, CompileError::SourceNotFound { .. }), "got {:?}", err);
    }

    #[test]
    fn test_empty_include_is_dropped() {
        let dir = TempDir::new().unwrap();
        let page = write(&dir, "page.tpl", "a{{@ include }}b");
        assert_eq!(IncludeResolver::new(8).resolve(&page).unwrap(), "ab");
    }
}
