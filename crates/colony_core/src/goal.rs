//! Goal deciders narrow a path search to the best destination.
//!
//! A [`GoalDecider`] is offered every node a search reaches. It keeps its
//! own notion of the best path so far and may stop the search early. The
//! state lives only for the duration of one search.

use crate::pathfinding::Path;
use crate::unit::Unit;
use crate::world::World;

/// Score that is never accepted.
pub const INVALID_SCORE: i32 = i32::MIN;

/// Search-time strategy that picks a destination.
pub trait GoalDecider {
    /// Inspect a candidate path. Returning `true` ends the search.
    fn check(&mut self, world: &World, unit: &Unit, path: &Path) -> bool;

    /// The chosen path, if any. Called once when the search ends.
    fn take_goal(&mut self) -> Option<Path>;
}

/// Keeps the single highest scoring path.
///
/// A candidate replaces the current best only if its score is strictly
/// higher, so among equal scores the first one found (the one with the
/// fewest turns) wins. [`INVALID_SCORE`] is never accepted.
pub struct BestPathDecider<F> {
    score: F,
    best: Option<(i32, Path)>,
}

impl<F> BestPathDecider<F>
where
    F: FnMut(&World, &Unit, &Path) -> i32,
{
    /// Decider scoring paths with `score`.
    pub fn new(score: F) -> Self {
        Self { score, best: None }
    }

    /// Best score seen so far.
    #[must_use]
    pub fn best_score(&self) -> Option<i32> {
        self.best.as_ref().map(|(score, _)| *score)
    }
}

impl<F> GoalDecider for BestPathDecider<F>
where
    F: FnMut(&World, &Unit, &Path) -> i32,
{
    fn check(&mut self, world: &World, unit: &Unit, path: &Path) -> bool {
        let score = (self.score)(world, unit, path);
        if score != INVALID_SCORE && self.best.as_ref().map_or(true, |(best, _)| score > *best) {
            self.best = Some((score, path.clone()));
        }
        false
    }

    fn take_goal(&mut self) -> Option<Path> {
        self.best.take().map(|(_, path)| path)
    }
}

/// Accepts the first path matching a predicate and stops.
pub struct FirstMatchDecider<F> {
    accept: F,
    goal: Option<Path>,
}

impl<F> FirstMatchDecider<F>
where
    F: FnMut(&World, &Unit, &Path) -> bool,
{
    /// Decider accepting the first path for which `accept` holds.
    pub fn new(accept: F) -> Self {
        Self { accept, goal: None }
    }
}

impl<F> GoalDecider for FirstMatchDecider<F>
where
    F: FnMut(&World, &Unit, &Path) -> bool,
{
    fn check(&mut self, world: &World, unit: &Unit, path: &Path) -> bool {
        if (self.accept)(world, unit, path) {
            self.goal = Some(path.clone());
            return true;
        }
        false
    }

    fn take_goal(&mut self) -> Option<Path> {
        self.goal.take()
    }
}
