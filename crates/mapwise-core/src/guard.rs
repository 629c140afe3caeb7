//! Cycle guard for recursive mapping
//!
//! One guard lives for one top-level mapping call. Every recursive descent is
//! bracketed by [`CycleGuard::enter`] and [`CycleGuard::exit`]; a blocked
//! descent leaves the guard untouched and the caller skips that branch.

use std::collections::HashSet;

/// Why a descent was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    /// The configured maximum depth would be exceeded
    DepthLimit,
    /// The allocation is already on the current path
    Cycle,
}

/// Proof of a successful [`CycleGuard::enter`], consumed by [`CycleGuard::exit`]
#[derive(Debug)]
#[must_use = "an entered guard must be exited"]
pub struct GuardToken {
    tracked: Option<usize>,
}

/// Depth counter plus the set of pointer identities on the current path
#[derive(Debug)]
pub struct CycleGuard {
    max_depth: usize,
    depth: usize,
    visited: HashSet<usize>,
}

impl CycleGuard {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            depth: 0,
            visited: HashSet::new(),
        }
    }

    /// Descend one level
    ///
    /// `address` is the identity of a non-nil pointer being followed; plain
    /// values pass `None` and only count towards the depth.
    pub fn enter(&mut self, address: Option<usize>) -> Result<GuardToken, BlockReason> {
        if self.depth >= self.max_depth {
            return Err(BlockReason::DepthLimit);
        }
        if let Some(address) = address {
            if !self.visited.insert(address) {
                return Err(BlockReason::Cycle);
            }
        }
        self.depth += 1;
        Ok(GuardToken { tracked: address })
    }

    /// Whether descending `levels` more levels, the last of them through
    /// `address`, would be refused; the guard is not changed
    pub fn would_block(&self, address: Option<usize>, levels: usize) -> Option<BlockReason> {
        if self.depth + levels > self.max_depth {
            return Some(BlockReason::DepthLimit);
        }
        match address {
            Some(address) if self.visited.contains(&address) => Some(BlockReason::Cycle),
            _ => None,
        }
    }

    /// Ascend one level, forgetting the identity recorded by the matching enter
    pub fn exit(&mut self, token: GuardToken) {
        self.depth = self.depth.saturating_sub(1);
        if let Some(address) = token.tracked {
            self.visited.remove(&address);
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Whether `address` is on the current path
    pub fn is_visiting(&self, address: usize) -> bool {
        self.visited.contains(&address)
    }
}
