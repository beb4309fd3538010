// ============================================================================
// flare-signals - Link Management
// Edge creation with dedup fast paths, edge removal, dependency pruning
// ============================================================================
//
// `link` is called once per dependency access during a recompute, so the
// fast paths matter: the common case is a recompute that touches the same
// dependencies in the same order as the previous run, which must not
// allocate or splice anything.
// ============================================================================

use tracing::trace;

use crate::core::node::{Link, LinkKey, NodeKey};
use crate::runtime::Runtime;

impl Runtime {
    /// Record that `sub` depends on `dep` during the current recompute.
    ///
    /// Fast paths, in order:
    /// (a) `sub`'s last-confirmed dependency is already `dep` - repeated
    ///     access inside the same recompute, nothing to do;
    /// (b) the next candidate edge after the tracking cursor is `dep` -
    ///     same access order as the previous run, so the existing edge is
    ///     re-stamped and the cursor advances;
    /// (c) `dep`'s newest subscriber edge already targets `sub` with the
    ///     current stamp - the same dependency pair was linked through
    ///     another path this cycle.
    /// Otherwise a new edge is spliced onto the tails of both lists.
    pub(crate) fn link(&mut self, dep: NodeKey, sub: NodeKey, version: u64) {
        // (a) repeated access in the same recompute
        let prev_dep = self.nodes[sub].deps_tail;
        if let Some(pd) = prev_dep {
            if self.links[pd].dep == dep {
                return;
            }
        }

        // (b) same dependency order as the previous run
        let next_dep = match prev_dep {
            Some(pd) => self.links[pd].next_dep,
            None => self.nodes[sub].deps,
        };
        if let Some(nd) = next_dep {
            if self.links[nd].dep == dep {
                self.links[nd].version = version;
                self.nodes[sub].deps_tail = Some(nd);
                return;
            }
        }

        // (c) already linked through another path this cycle
        let prev_sub = self.nodes[dep].subs_tail;
        if let Some(ps) = prev_sub {
            let link = &self.links[ps];
            if link.version == version && link.sub == sub {
                return;
            }
        }

        let new_link = self.links.insert(Link {
            version,
            dep,
            sub,
            prev_dep,
            next_dep,
            prev_sub,
            next_sub: None,
        });
        trace!(?dep, ?sub, "link");

        self.nodes[sub].deps_tail = Some(new_link);
        self.nodes[dep].subs_tail = Some(new_link);

        if let Some(nd) = next_dep {
            self.links[nd].prev_dep = Some(new_link);
        }
        match prev_dep {
            Some(pd) => self.links[pd].next_dep = Some(new_link),
            None => self.nodes[sub].deps = Some(new_link),
        }
        match prev_sub {
            Some(ps) => self.links[ps].next_sub = Some(new_link),
            None => self.nodes[dep].subs = Some(new_link),
        }

        self.probe(|i| i.edge_linked(dep, sub));
    }

    /// Remove one edge from both adjacency lists.
    ///
    /// When the removal empties `dep`'s subscriber list, the dependency has
    /// no consumers left and `unwatched` tears it down or marks it for lazy
    /// revival. Returns the next edge in `sub`'s dependency list so callers
    /// can iterate while removing.
    pub(crate) fn unlink(&mut self, link: LinkKey, sub: NodeKey) -> Option<LinkKey> {
        let Some(&Link {
            dep,
            prev_dep,
            next_dep,
            prev_sub,
            next_sub,
            ..
        }) = self.links.get(link)
        else {
            return None;
        };
        self.links.remove(link);
        trace!(?dep, ?sub, "unlink");

        match next_dep {
            Some(nd) => self.links[nd].prev_dep = prev_dep,
            None => {
                if let Some(node) = self.nodes.get_mut(sub) {
                    node.deps_tail = prev_dep;
                }
            }
        }
        match prev_dep {
            Some(pd) => self.links[pd].next_dep = next_dep,
            None => {
                if let Some(node) = self.nodes.get_mut(sub) {
                    node.deps = next_dep;
                }
            }
        }

        match next_sub {
            Some(ns) => self.links[ns].prev_sub = prev_sub,
            None => {
                if let Some(node) = self.nodes.get_mut(dep) {
                    node.subs_tail = prev_sub;
                }
            }
        }
        match prev_sub {
            Some(ps) => self.links[ps].next_sub = next_sub,
            None => {
                if let Some(node) = self.nodes.get_mut(dep) {
                    node.subs = next_sub;
                    if next_sub.is_none() {
                        self.probe(|i| i.edge_unlinked(dep, sub));
                        self.unwatched(dep);
                        return next_dep;
                    }
                }
            }
        }

        self.probe(|i| i.edge_unlinked(dep, sub));
        next_dep
    }

    /// Whether `check` is still part of `sub`'s confirmed dependency list
    /// (the portion from the head through the tracking cursor).
    pub(crate) fn is_valid_link(&self, check: LinkKey, sub: NodeKey) -> bool {
        let Some(node) = self.nodes.get(sub) else {
            return false;
        };
        let Some(tail) = node.deps_tail else {
            return false;
        };
        let mut link = node.deps;
        while let Some(l) = link {
            if l == check {
                return true;
            }
            if l == tail {
                break;
            }
            link = self.links[l].next_dep;
        }
        false
    }

    /// Drop every dependency edge of `sub` that was not reconfirmed during
    /// the current recompute (everything after the tracking cursor).
    ///
    /// This is how stale conditional dependencies disappear: once a branch
    /// stops reading a node, the next recompute leaves its edge beyond the
    /// cursor and it is unlinked here.
    pub(crate) fn purge_deps(&mut self, sub: NodeKey) {
        let Some(node) = self.nodes.get(sub) else {
            return;
        };
        let mut to_remove = match node.deps_tail {
            Some(tail) => self.links.get(tail).and_then(|l| l.next_dep),
            None => node.deps,
        };
        while let Some(link) = to_remove {
            to_remove = self.unlink(link, sub);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
