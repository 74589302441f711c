//! Breakable lines of a source file.

use lru::LruCache;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Source of breakable line sets.
pub trait BreakableLines: Send {
    /// Return lines where execution may stop, `None` if the file is missing or can't be parsed.
    fn breakable_lines(&mut self, path: &Path) -> Option<BTreeSet<u32>>;
}

/// Statements that never generate a line event on their own.
static HEADER_ONLY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(else|try|finally)\s*:\s*(#.*)?$").expect("valid regex")
});

/// Statement that is a bare string literal (docstrings and the like).
static STRING_STATEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^(?i:[rbuf]{0,2})["']"#).expect("valid regex"));

/// Heuristic scanner for python sources.
///
/// A line is breakable if it starts a statement and the statement is neither a bare string
/// literal nor an `else:`/`try:`/`finally:` header. Unbalanced brackets or unterminated
/// strings make the whole file unparseable.
pub fn scan_python(source: &str) -> Option<BTreeSet<u32>> {
    let mut result = BTreeSet::new();
    let mut depth: i32 = 0;
    let mut triple: Option<char> = None;
    let mut continuation = false;

    for (idx, line) in source.lines().enumerate() {
        let starts_statement = depth == 0 && triple.is_none() && !continuation;
        let trimmed = line.trim();
        if starts_statement
            && !trimmed.is_empty()
            && !trimmed.starts_with('#')
            && !STRING_STATEMENT.is_match(trimmed)
            && !HEADER_ONLY.is_match(trimmed)
        {
            result.insert(idx as u32 + 1);
        }

        continuation = false;
        let chars: Vec<char> = line.chars().collect();
        let is_triple = |i: usize, q: char| {
            chars.get(i) == Some(&q) && chars.get(i + 1) == Some(&q) && chars.get(i + 2) == Some(&q)
        };
        let mut quote: Option<char> = None;
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if let Some(q) = triple {
                if c == '\\' {
                    i += 2;
                    continue;
                }
                if is_triple(i, q) {
                    triple = None;
                    i += 3;
                    continue;
                }
                i += 1;
                continue;
            }
            if let Some(q) = quote {
                if c == '\\' {
                    i += 2;
                    continue;
                }
                if c == q {
                    quote = None;
                }
                i += 1;
                continue;
            }

            match c {
                '#' => break,
                '"' | '\'' if is_triple(i, c) => {
                    triple = Some(c);
                    i += 3;
                    continue;
                }
                '"' | '\'' => quote = Some(c),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => {
                    depth -= 1;
                    if depth < 0 {
                        return None;
                    }
                }
                '\\' if i + 1 == chars.len() => continuation = true,
                _ => {}
            }
            i += 1;
        }

        if quote.is_some() && !continuation {
            return None;
        }
    }

    if depth != 0 || triple.is_some() {
        return None;
    }
    Some(result)
}

/// Read and scan python files from disk.
#[derive(Default)]
pub struct PythonLines;

impl BreakableLines for PythonLines {
    fn breakable_lines(&mut self, path: &Path) -> Option<BTreeSet<u32>> {
        let source = fs::read_to_string(path).ok()?;
        scan_python(&source)
    }
}

struct CacheEntry {
    modified: SystemTime,
    len: u64,
    lines: Option<BTreeSet<u32>>,
}

/// LRU cache in front of another source, entries are invalidated by file size and mtime.
pub struct CachedLines<S> {
    inner: S,
    cache: LruCache<PathBuf, CacheEntry>,
}

impl<S: BreakableLines> CachedLines<S> {
    const DEFAULT_CAPACITY: usize = 128;

    pub fn new(inner: S) -> Self {
        Self::with_capacity(inner, Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(inner: S, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: LruCache::new(capacity),
        }
    }
}

impl<S: BreakableLines> BreakableLines for CachedLines<S> {
    fn breakable_lines(&mut self, path: &Path) -> Option<BTreeSet<u32>> {
        let meta = fs::metadata(path).ok()?;
        let modified = meta.modified().ok()?;
        let len = meta.len();

        if let Some(entry) = self.cache.get(path) {
            if entry.modified == modified && entry.len == len {
                return entry.lines.clone();
            }
        }

        let lines = self.inner.breakable_lines(path);
        self.cache.put(
            path.to_path_buf(),
            CacheEntry {
                modified,
                len,
                lines: lines.clone(),
            },
        );
        lines
    }
}
