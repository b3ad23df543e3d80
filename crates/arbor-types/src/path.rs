//! Immutable navigation addresses into an object graph.
//!
//! A [`Path`] is created fresh at the root of every save/load traversal and
//! extended one segment at a time as the translators recurse. Extension is
//! O(1): each path shares its prefix with the path it was extended from.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// One step in a [`Path`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Segment {
    /// A named field or map entry.
    Field(String),
    /// A synthetic position inside a collection.
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Field(name) => f.write_str(name),
            Segment::Index(i) => write!(f, "{i}"),
        }
    }
}

/// Dot-separated navigation address (`field.subfield.2`).
///
/// Two paths are equal iff their segment sequences are equal.
#[derive(Clone, Default)]
pub struct Path {
    node: Option<Arc<PathNode>>,
}

struct PathNode {
    parent: Path,
    segment: Segment,
    depth: usize,
}

impl Path {
    /// The empty path at the root of a traversal.
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from field names.
    pub fn from_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        fields
            .into_iter()
            .fold(Self::root(), |path, name| path.extend(name))
    }

    /// A new path with a field segment appended.
    pub fn extend(&self, name: impl Into<String>) -> Self {
        self.push(Segment::Field(name.into()))
    }

    /// A new path with a collection-index segment appended.
    pub fn extend_index(&self, index: usize) -> Self {
        self.push(Segment::Index(index))
    }

    fn push(&self, segment: Segment) -> Self {
        Self {
            node: Some(Arc::new(PathNode {
                parent: self.clone(),
                segment,
                depth: self.depth() + 1,
            })),
        }
    }

    /// Returns `true` for the empty root path.
    pub fn is_root(&self) -> bool {
        self.node.is_none()
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.node.as_ref().map_or(0, |n| n.depth)
    }

    /// The last segment, if any.
    pub fn last(&self) -> Option<&Segment> {
        self.node.as_ref().map(|n| &n.segment)
    }

    /// The path without its last segment.
    pub fn parent(&self) -> Option<&Path> {
        self.node.as_ref().map(|n| &n.parent)
    }

    /// All segments, root first.
    pub fn segments(&self) -> Vec<Segment> {
        let mut out = Vec::with_capacity(self.depth());
        let mut current = self;
        while let Some(node) = &current.node {
            out.push(node.segment.clone());
            current = &node.parent;
        }
        out.reverse();
        out
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        if self.depth() != other.depth() {
            return false;
        }
        let (mut a, mut b) = (self, other);
        loop {
            match (&a.node, &b.node) {
                (None, None) => return true,
                (Some(x), Some(y)) => {
                    if Arc::ptr_eq(x, y) {
                        return true;
                    }
                    if x.segment != y.segment {
                        return false;
                    }
                    a = &x.parent;
                    b = &y.parent;
                }
                _ => return false,
            }
        }
    }
}

impl Eq for Path {}

impl Hash for Path {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.segments().hash(state);
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments().iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_empty() {
        let root = Path::root();
        assert!(root.is_root());
        assert_eq!(root.depth(), 0);
        assert_eq!(root.to_string(), "");
        assert!(root.last().is_none());
        assert!(root.parent().is_none());
    }

    #[test]
    fn extend_does_not_mutate() {
        let base = Path::root().extend("pets");
        let tag = base.extend_index(2).extend("tag");
        assert_eq!(base.to_string(), "pets");
        assert_eq!(tag.to_string(), "pets.2.tag");
        assert_eq!(tag.depth(), 3);
        assert_eq!(tag.last(), Some(&Segment::Field("tag".into())));
        assert_eq!(tag.parent().unwrap().last(), Some(&Segment::Index(2)));
    }

    #[test]
    fn equality_is_structural() {
        let a = Path::root().extend("a").extend("b");
        let b = Path::from_fields(["a", "b"]);
        assert_eq!(a, b);
        assert_ne!(a, Path::from_fields(["a", "c"]));
        assert_ne!(a, Path::from_fields(["a"]));
        // A field named "0" is not the same as index 0.
        assert_ne!(Path::root().extend("0"), Path::root().extend_index(0));
    }

    #[test]
    fn hash_agrees_with_eq() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(Path::from_fields(["x", "y"]));
        assert!(set.contains(&Path::root().extend("x").extend("y")));
    }

    #[test]
    fn segments_are_root_first() {
        let path = Path::root().extend("a").extend_index(1).extend("b");
        assert_eq!(
            path.segments(),
            vec![
                Segment::Field("a".into()),
                Segment::Index(1),
                Segment::Field("b".into())
            ]
        );
    }
}
