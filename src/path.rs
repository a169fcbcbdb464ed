//! Path representation: a bounded stack of interned path components
//! (spec.md §3's `Path`).

use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::interner::{Interner, StringId};

/// A `/`-separated path, tokenized into interned components. `SmallVec`
/// keeps the common case (a handful of path segments) on the stack, the
/// same trade-off spec.md's reference design makes with a fixed-size
/// on-stack array, without hard-capping depth at the inline size — depth
/// is instead bounded explicitly by [`crate::config::MAX_PATH_DEPTH`].
pub type Path = SmallVec<[StringId; 8]>;

/// Split `path` on `/`, intern each non-empty component, and reject paths
/// deeper than `max_depth` (spec.md §3: "Maximum depth is a fixed bound").
pub fn tokenize(interner: &mut Interner, path: &str, max_depth: usize) -> Result<Path> {
    let mut out: Path = SmallVec::new();
    for component in path.split('/').filter(|c| !c.is_empty()) {
        if out.len() >= max_depth {
            return Err(Error::PathTooDeep {
                depth: out.len() + 1,
                max: max_depth,
            });
        }
        out.push(interner.intern(component)?);
    }
    Ok(out)
}

/// Render `path` back to a `/`-separated string, for diagnostics and for
/// the emitter interface (spec.md §6).
pub fn render(interner: &Interner, path: &[StringId]) -> String {
    let mut out = String::new();
    for (i, id) in path.iter().enumerate() {
        if i > 0 {
            out.push('/');
        }
        out.push_str(interner.fetch(*id));
    }
    out
}

/// A reusable path buffer that the diff engine pushes/pops components onto
/// as it recurses, so it never allocates a fresh `Path` per directory
/// level (spec.md §4.5's `PathStack`).
#[derive(Debug, Default)]
pub struct PathStack {
    components: Path,
}

impl PathStack {
    pub fn new() -> Self {
        PathStack {
            components: SmallVec::new(),
        }
    }

    pub fn push(&mut self, id: StringId, max_depth: usize) -> Result<()> {
        if self.components.len() >= max_depth {
            return Err(Error::PathTooDeep {
                depth: self.components.len() + 1,
                max: max_depth,
            });
        }
        self.components.push(id);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<StringId> {
        self.components.pop()
    }

    pub fn as_slice(&self) -> &[StringId] {
        &self.components
    }

    pub fn render(&self, interner: &Interner) -> String {
        render(interner, &self.components)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_round_trips_through_render() {
        let mut interner = Interner::default();
        let path = tokenize(&mut interner, "trunk/src/main.rs", 1000).unwrap();
        assert_eq!(render(&interner, &path), "trunk/src/main.rs");
    }

    #[test]
    fn tokenize_ignores_leading_and_trailing_slashes() {
        let mut interner = Interner::default();
        let path = tokenize(&mut interner, "/trunk/src//main.rs/", 1000).unwrap();
        assert_eq!(render(&interner, &path), "trunk/src/main.rs");
    }

    #[test]
    fn tokenize_rejects_paths_past_max_depth() {
        let mut interner = Interner::default();
        let deep = (0..10).map(|i| format!("d{i}")).collect::<Vec<_>>().join("/");
        let err = tokenize(&mut interner, &deep, 5).unwrap_err();
        assert!(matches!(err, Error::PathTooDeep { max: 5, .. }));
    }

    #[test]
    fn path_stack_push_pop() {
        let mut interner = Interner::default();
        let mut stack = PathStack::new();
        let a = interner.intern("trunk").unwrap();
        let b = interner.intern("src").unwrap();
        stack.push(a, 1000).unwrap();
        stack.push(b, 1000).unwrap();
        assert_eq!(stack.render(&interner), "trunk/src");
        assert_eq!(stack.pop(), Some(b));
        assert_eq!(stack.render(&interner), "trunk");
    }
}
