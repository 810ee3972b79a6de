use std::collections::HashSet;

use crate::catalog::CatalogStore;

/// Lazily enumerates the positions matched by a tag query.
///
/// - match-any yields the first-seen union: the first tag's positions in
///   index order, then positions of later tags not seen before.
/// - match-all yields the positions present under every tag, in the first
///   tag's index order. An empty tag list matches every position.
///
/// No position is yielded twice.
pub struct TagSelection<'a> {
    inner: Inner<'a>,
}

enum Inner<'a> {
    Any {
        lists: Vec<&'a [usize]>,
        list: usize,
        index: usize,
        seen: HashSet<usize>,
    },
    All(std::vec::IntoIter<usize>),
}

impl<'a> TagSelection<'a> {
    pub fn any<S: AsRef<str>>(store: &'a CatalogStore, tags: &[S]) -> Self {
        let lists = tags
            .iter()
            .map(|tag| store.positions_for_tag(tag.as_ref()))
            .collect();
        Self {
            inner: Inner::Any {
                lists,
                list: 0,
                index: 0,
                seen: HashSet::new(),
            },
        }
    }

    pub fn all<S: AsRef<str>>(store: &'a CatalogStore, tags: &[S]) -> Self {
        let Some((first, rest)) = tags.split_first() else {
            let universe: Vec<usize> = store.positions().collect();
            return Self {
                inner: Inner::All(universe.into_iter()),
            };
        };

        let mut seen = HashSet::new();
        let mut selection: Vec<usize> = store
            .positions_for_tag(first.as_ref())
            .iter()
            .copied()
            .filter(|&p| p < store.len() && seen.insert(p))
            .collect();

        for tag in rest {
            if selection.is_empty() {
                break;
            }
            let members: HashSet<usize> = store
                .positions_for_tag(tag.as_ref())
                .iter()
                .copied()
                .collect();
            selection.retain(|p| members.contains(p));
        }

        Self {
            inner: Inner::All(selection.into_iter()),
        }
    }

    pub fn new<S: AsRef<str>>(store: &'a CatalogStore, tags: &[S], match_all: bool) -> Self {
        if match_all {
            Self::all(store, tags)
        } else {
            Self::any(store, tags)
        }
    }
}

impl Iterator for TagSelection<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        match &mut self.inner {
            Inner::All(positions) => positions.next(),
            Inner::Any {
                lists,
                list,
                index,
                seen,
            } => {
                while let Some(current) = lists.get(*list) {
                    match current.get(*index) {
                        Some(&position) => {
                            *index += 1;
                            if seen.insert(position) {
                                return Some(position);
                            }
                        }
                        None => {
                            *list += 1;
                            *index = 0;
                        }
                    }
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::fixture;

    fn any(tags: &[&str]) -> Vec<usize> {
        TagSelection::any(&fixture(), tags).collect()
    }

    fn all(tags: &[&str]) -> Vec<usize> {
        TagSelection::all(&fixture(), tags).collect()
    }

    #[test]
    fn test_any_is_first_seen_union() {
        assert_eq!(any(&["tag1", "tag4"]), vec![0, 1, 2]);
        assert_eq!(any(&["tag7", "tag2"]), vec![0, 2, 1]);
        assert_eq!(any(&["tag6", "tag3"]), vec![3, 0, 2, 1]);
    }

    #[test]
    fn test_all_keeps_first_tag_order() {
        assert_eq!(all(&["tag2", "tag3"]), vec![1, 2]);
        assert_eq!(all(&["tag3", "tag2"]), vec![2, 1]);
        assert_eq!(all(&["tag1", "tag4"]), Vec::<usize>::new());
    }

    #[test]
    fn test_empty_tag_lists() {
        assert_eq!(all(&[]), vec![0, 1, 2, 3]);
        assert!(any(&[]).is_empty());
    }

    #[test]
    fn test_unknown_tags() {
        assert!(any(&["nope"]).is_empty());
        assert!(all(&["tag2", "nope"]).is_empty());
        assert!(all(&["nope", "tag2"]).is_empty());
    }

    #[test]
    fn test_any_is_lazy() {
        let store = fixture();
        let mut selection = TagSelection::any(&store, &["tag6", "tag2"]);
        assert_eq!(selection.next(), Some(3));
        assert_eq!(selection.next(), Some(0));
    }
}
