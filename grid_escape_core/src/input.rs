use std::collections::VecDeque;

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::Direction;

/// Produces at most one directional request per frame.
pub trait InputSource {
    /// `None` means no input this frame.
    fn next_direction(&mut self) -> Option<Direction>;
}

/// Replays a fixed list of moves, then goes quiet.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    moves: VecDeque<Direction>,
}

impl ScriptedInput {
    pub fn new(moves: impl IntoIterator<Item = Direction>) -> Self {
        ScriptedInput {
            moves: moves.into_iter().collect(),
        }
    }

    /// Builds a script from `(direction, repeat)` runs.
    pub fn from_runs(runs: &[(Direction, usize)]) -> Self {
        Self::new(
            runs.iter()
                .flat_map(|&(dir, count)| std::iter::repeat_n(dir, count)),
        )
    }

    pub fn remaining(&self) -> usize {
        self.moves.len()
    }
}

impl InputSource for ScriptedInput {
    fn next_direction(&mut self) -> Option<Direction> {
        self.moves.pop_front()
    }
}

/// Seeded random walk, used for the unattended demo mode.
#[derive(Debug)]
pub struct RandomInput {
    rng: StdRng,
}

impl RandomInput {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl InputSource for RandomInput {
    fn next_direction(&mut self) -> Option<Direction> {
        let index = self.rng.random_range(0..Direction::ALL.len());
        Some(Direction::ALL[index])
    }
}
