//! Recognition optimizer.
//!
//! # Responsibilities
//! - Reduce route paths and request paths to the same plain token form
//! - Group routes by shared literal prefixes in a tree
//! - Find the first route that could possibly match a request path
//!
//! # Design Decisions
//! - The tree only prunes: routes are still tried linearly from the index it
//!   returns, so the tree never changes which route wins
//! - Children are appended only when they differ from the last child, which
//!   keeps every subtree's routes a contiguous index range in declaration order
//! - A failed branch falls through to the next sibling

use once_cell::sync::Lazy;
use regex::Regex;

use crate::routing::route::Route;

static PLAIN_SEPARATORS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\.[^/]+/+|/+|\.[^/]+\z").expect("separator pattern is valid")
});

/// One plain token of a route path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeToken {
    Literal(String),
    /// Any single token, or nothing.
    Dynamic,
    /// Anything from here on; pruning stops.
    Glob,
    /// End of path.
    End,
}

/// Split a path into plain tokens: outer slashes stripped, extensions dropped.
pub fn to_plain_segments(path: &str) -> Vec<&str> {
    let trimmed = path.trim_matches('/');
    let mut pieces: Vec<&str> = PLAIN_SEPARATORS.split(trimmed).collect();
    while pieces.last().is_some_and(|p| p.is_empty()) {
        pieces.pop();
    }
    pieces
}

/// Tree tokens for a route's tree source, terminated by `End`.
pub fn tree_tokens(source: &str) -> Vec<TreeToken> {
    let mut tokens: Vec<TreeToken> = to_plain_segments(source)
        .into_iter()
        .map(classify)
        .collect();
    tokens.push(TreeToken::End);
    tokens
}

fn classify(piece: &str) -> TreeToken {
    if let Some(key) = piece.strip_prefix(':') {
        if !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return TreeToken::Dynamic;
        }
    }
    if piece.contains(':') || piece.contains('*') {
        TreeToken::Glob
    } else {
        TreeToken::Literal(piece.to_string())
    }
}

#[derive(Debug, Clone)]
struct Node {
    token: TreeToken,
    /// Index of the first route that reached this node.
    first: usize,
    children: Vec<Node>,
}

impl Node {
    fn new(token: TreeToken, first: usize) -> Self {
        Self {
            token,
            first,
            children: Vec::new(),
        }
    }

    fn lookup(&self, tokens: &[&str], pos: usize) -> Option<usize> {
        let next = match &self.token {
            TreeToken::Literal(text) => {
                if tokens.get(pos) != Some(&text.as_str()) {
                    return None;
                }
                pos + 1
            }
            TreeToken::Dynamic => (pos + 1).min(tokens.len()),
            TreeToken::Glob => return Some(self.first),
            TreeToken::End => {
                if pos < tokens.len() {
                    return None;
                }
                pos
            }
        };
        if self.children.is_empty() {
            return Some(self.first);
        }
        lookup_children(&self.children, tokens, next)
    }
}

fn lookup_children(children: &[Node], tokens: &[&str], pos: usize) -> Option<usize> {
    children.iter().find_map(|child| child.lookup(tokens, pos))
}

/// Discrimination tree over a route list.
#[derive(Debug, Clone, Default)]
pub struct SegmentTree {
    children: Vec<Node>,
}

impl SegmentTree {
    pub fn build(routes: &[Route]) -> Self {
        let mut tree = SegmentTree::default();
        for (index, route) in routes.iter().enumerate() {
            tree.insert(index, route.tree_tokens());
        }
        tree
    }

    fn insert(&mut self, index: usize, tokens: &[TreeToken]) {
        let mut children = &mut self.children;
        for token in tokens {
            let reuse = children.last().is_some_and(|node| node.token == *token);
            if !reuse {
                children.push(Node::new(token.clone(), index));
            }
            let last = children.len() - 1;
            children = &mut children[last].children;
        }
    }

    /// Index of the first route that could match `path`, or `None` when no
    /// route can.
    pub fn lookup(&self, path: &str) -> Option<usize> {
        let tokens = to_plain_segments(path);
        lookup_children(&self.children, &tokens, 0)
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::builder::RouteBuilder;
    use crate::routing::options::RouteOptions;

    fn routes(paths: &[&str]) -> Vec<Route> {
        let builder = RouteBuilder::default();
        paths
            .iter()
            .map(|p| builder.build(p, &RouteOptions::new().controller("c")).unwrap())
            .collect()
    }

    #[test]
    fn test_plain_segments() {
        assert_eq!(to_plain_segments("/posts/5.json"), vec!["posts", "5"]);
        assert_eq!(to_plain_segments("//posts//new/"), vec!["posts", "new"]);
        assert_eq!(to_plain_segments("/a.b/c"), vec!["a", "c"]);
        assert!(to_plain_segments("/").is_empty());
    }

    #[test]
    fn test_tree_tokens() {
        assert_eq!(
            tree_tokens("/posts/:id/"),
            vec![
                TreeToken::Literal("posts".into()),
                TreeToken::Dynamic,
                TreeToken::End
            ]
        );
        assert_eq!(
            tree_tokens("/files/*path/"),
            vec![
                TreeToken::Literal("files".into()),
                TreeToken::Glob,
                TreeToken::End
            ]
        );
        assert_eq!(tree_tokens("/"), vec![TreeToken::End]);
    }

    #[test]
    fn test_lookup_prunes_unknown_prefix() {
        let tree = SegmentTree::build(&routes(&["posts/new", "posts/:id", "users"]));
        assert_eq!(tree.lookup("/posts/new"), Some(0));
        assert_eq!(tree.lookup("/posts/5"), Some(1));
        assert_eq!(tree.lookup("/users"), Some(2));
        assert_eq!(tree.lookup("/comments"), None);
        assert_eq!(tree.lookup("/users/1/extra"), None);
    }

    #[test]
    fn test_lookup_backtracks_to_sibling() {
        let tree = SegmentTree::build(&routes(&["posts/new", ":x/:y", "posts/:id"]));
        assert_eq!(tree.lookup("/posts/new"), Some(0));
        assert_eq!(tree.lookup("/posts/5"), Some(1));
        assert_eq!(tree.lookup("/a/b/c"), None);
    }

    #[test]
    fn test_dynamic_matches_absent_token() {
        let tree = SegmentTree::build(&routes(&["posts/:page"]));
        assert_eq!(tree.lookup("/posts"), Some(0));
    }

    #[test]
    fn test_glob_stops_pruning() {
        let tree = SegmentTree::build(&routes(&["files/*path"]));
        assert_eq!(tree.lookup("/files/a/b/c"), Some(0));
        assert_eq!(tree.lookup("/other"), None);
    }
}
