// ============================================================================
// flare-signals - Propagation
// Push-phase marking, single-level fan-out, and lazy pull resolution
// ============================================================================
//
// All three traversals are iterative with explicit stacks so the call depth
// is bounded regardless of graph depth. Termination on cyclic graphs (an
// effect writing a signal it also reads) comes from the RECURSED_CHECK /
// RECURSED bits, which bound how often a node can be revisited within one
// pass.
// ============================================================================

use smallvec::SmallVec;
use tracing::trace;

use crate::core::flags::Flags;
use crate::core::node::{LinkKey, NodeKey};
use crate::runtime::Runtime;

impl Runtime {
    /// Push phase: walk the subscriber graph from a changed node's first
    /// subscriber edge, marking downstream nodes possibly-stale and queueing
    /// watching consumers.
    ///
    /// Each visited subscriber goes through the transition below (first
    /// match wins); `effective` decides what happens afterwards: a
    /// `WATCHING` bit queues the node, a `MUTABLE` bit descends into the
    /// node's own subscribers.
    pub(crate) fn propagate(&mut self, start: LinkKey) {
        trace!(?start, "propagate");
        let mut link = start;
        let mut next = self.links[link].next_sub;
        let mut stack: SmallVec<[Option<LinkKey>; 8]> = SmallVec::new();

        'top: loop {
            let sub = self.links[link].sub;
            let mut flags = self.nodes[sub].flags;

            if flags.intersects(Flags::MUTABLE | Flags::WATCHING) {
                if !flags.intersects(Flags::RECURSED_MASK | Flags::STALE_MASK) {
                    // First visit this pass: mark possibly-stale, keep going.
                    self.nodes[sub].flags = flags | Flags::PENDING;
                } else if !flags.intersects(Flags::RECURSED_MASK) {
                    // Already fully marked by an earlier path (diamond):
                    // nothing left to do below this node.
                    flags = Flags::empty();
                } else if !flags.contains(Flags::RECURSED_CHECK) {
                    // Revisit after its recompute finished: consume the
                    // RECURSED marker and mark possibly-stale again.
                    self.nodes[sub].flags = (flags - Flags::RECURSED) | Flags::PENDING;
                } else if !flags.intersects(Flags::STALE_MASK) && self.is_valid_link(link, sub) {
                    // Revisit while the node is mid-recompute through an
                    // edge it has already confirmed: record the re-entry,
                    // but only cascade through the part of the graph that
                    // can have dependents of its own.
                    self.nodes[sub].flags = flags | Flags::RECURSED | Flags::PENDING;
                    flags &= Flags::MUTABLE;
                } else {
                    // Mid-recompute revisit through a stale edge: stop.
                    flags = Flags::empty();
                }

                if flags.contains(Flags::WATCHING) {
                    self.notify(sub);
                }
                if flags.contains(Flags::MUTABLE) {
                    if let Some(sub_subs) = self.nodes[sub].subs {
                        link = sub_subs;
                        let branch_next = self.links[link].next_sub;
                        if branch_next.is_some() {
                            // More than one subscriber below: remember where
                            // to resume the current list.
                            stack.push(next);
                            next = branch_next;
                        }
                        continue 'top;
                    }
                }
            }

            if let Some(n) = next {
                link = n;
                next = self.links[link].next_sub;
                continue 'top;
            }

            while let Some(slot) = stack.pop() {
                if let Some(l) = slot {
                    link = l;
                    next = self.links[link].next_sub;
                    continue 'top;
                }
            }
            break;
        }
    }

    /// Single-level fan-out: flip possibly-stale subscribers to known-stale
    /// and queue the watching ones, without descending further.
    ///
    /// Used after a recompute resolves a value as definitely changed; the
    /// deeper marking already happened during the push phase.
    pub(crate) fn shallow_propagate(&mut self, start: LinkKey) {
        let mut link = Some(start);
        while let Some(l) = link {
            let sub = self.links[l].sub;
            let flags = self.nodes[sub].flags;
            if flags & Flags::STALE_MASK == Flags::PENDING {
                self.nodes[sub].flags = flags | Flags::DIRTY;
                if flags.contains(Flags::WATCHING) {
                    self.notify(sub);
                }
            }
            link = self.links[l].next_sub;
        }
    }

    /// Pull phase: resolve whether a possibly-stale `sub` is actually stale
    /// by walking *up* its dependency chain from `start`.
    ///
    /// Known-stale dependencies are recomputed on the spot; possibly-stale
    /// ones are descended into first (laziness: nothing recomputes until a
    /// changed value forces it). On the way back up, a branch that resolved
    /// dirty recomputes the node that owns it and fans the change out to
    /// that node's other subscribers; a branch that resolved clean just
    /// clears the possibly-stale bit.
    pub(crate) fn check_dirty(&mut self, start: LinkKey, start_sub: NodeKey) -> bool {
        let mut link = start;
        let mut sub = start_sub;
        let mut stack: SmallVec<[LinkKey; 8]> = SmallVec::new();
        let mut check_depth = 0usize;

        'top: loop {
            let Some(&link_data) = self.links.get(link) else {
                // The edge went away under us (a recompute below disposed
                // part of the graph); treat the branch as resolved-clean.
                return false;
            };
            let dep = link_data.dep;
            let dep_flags = self.nodes.get(dep).map_or(Flags::empty(), |n| n.flags);

            let mut dirty = false;

            if self
                .nodes
                .get(sub)
                .is_some_and(|n| n.flags.contains(Flags::DIRTY))
            {
                dirty = true;
            } else if dep_flags.contains(Flags::MUTABLE | Flags::DIRTY) {
                // A known-stale dependency: force its recompute now.
                if self.update_node(dep) {
                    if let Some(subs) = self.nodes.get(dep).and_then(|n| n.subs) {
                        if self.links[subs].next_sub.is_some() {
                            self.shallow_propagate(subs);
                        }
                    }
                    dirty = true;
                }
            } else if dep_flags.contains(Flags::MUTABLE | Flags::PENDING) {
                // A possibly-stale dependency: check its own deps before
                // deciding anything.
                if let Some(dep_deps) = self.nodes[dep].deps {
                    if link_data.next_sub.is_some() || link_data.prev_sub.is_some() {
                        stack.push(link);
                    }
                    link = dep_deps;
                    sub = dep;
                    check_depth += 1;
                    continue 'top;
                }
            }

            if !dirty {
                if let Some(nd) = self.links.get(link).and_then(|l| l.next_dep) {
                    link = nd;
                    continue 'top;
                }
            }

            // Unwind: resolve the nodes whose dependency lists we finished.
            while check_depth > 0 {
                check_depth -= 1;

                let Some(first_sub) = self.nodes.get(sub).and_then(|n| n.subs) else {
                    return dirty;
                };
                let has_multiple_subs = self.links[first_sub].next_sub.is_some();
                link = if has_multiple_subs {
                    stack.pop().expect("check stack tracks multi-subscriber descents")
                } else {
                    first_sub
                };

                if dirty {
                    if self.update_node(sub) {
                        if has_multiple_subs {
                            self.shallow_propagate(first_sub);
                        }
                        sub = self.links[link].sub;
                        continue;
                    }
                    // The recompute produced an equal value: this branch is
                    // clean after all.
                    dirty = false;
                } else if let Some(node) = self.nodes.get_mut(sub) {
                    node.flags.remove(Flags::PENDING);
                }

                sub = self.links[link].sub;
                if let Some(nd) = self.links.get(link).and_then(|l| l.next_dep) {
                    link = nd;
                    continue 'top;
                }
            }

            return dirty;
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
