//! Authored puzzle data.
//!
//! A puzzle file describes the board once and then lists its levels in play
//! order:
//!
//! ```toml
//! [grid]
//! cols = 6
//! rows = 7
//! cell_size = 1.0
//! origin = { x = 0.0, y = 0.0 }
//!
//! [barriers]
//! kind = "obstacles"     # or "edges" / "none"
//! thickness = 0.1
//! walls = [[{ col = 1, row = 3 }, { col = 2, row = 3 }]]
//!
//! [[levels]]
//! start = { col = 0, row = 0 }
//! key = { col = 2, row = 3 }
//! exit = { col = 5, row = 6 }
//! key_color = { r = 255, g = 235, b = 4 }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    Cell, Rgba, WorldPos,
    agent::{Agent, LevelConfig},
    barrier::{BarrierQuery, EdgeBarriers, NoBarriers, Obstacle, ObstacleLayer},
    map::{CoordinateMapper, GridBounds, GridError},
    sequencer::LevelSequencer,
    visual::{AgentVisuals, ProgressVisuals},
};

/// Errors raised while reading or validating a puzzle definition.
#[derive(Debug, thiserror::Error)]
pub enum LevelLoadError {
    #[error("Failed to read puzzle file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid puzzle file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("Level {level}: {label} cell is invalid: {source}")]
    CellOutOfBounds {
        level: usize,
        label: &'static str,
        source: GridError,
    },
    #[error("Level {level}: {label} cell ({}, {}) is blocked", .cell.col, .cell.row)]
    OnBlockedCell {
        level: usize,
        label: &'static str,
        cell: Cell,
    },
    #[error("Wall between ({}, {}) and ({}, {}) does not join adjacent cells", .a.col, .a.row, .b.col, .b.row)]
    WallNotAdjacent { a: Cell, b: Cell },
    #[error("Wall cell is invalid: {0}")]
    WallOutOfBounds(GridError),
    #[error("Wall thickness {thickness} must be greater than 0 and less than the cell size {cell_size}")]
    InvalidThickness { thickness: f32, cell_size: f32 },
}

/// Board geometry shared by every level of a puzzle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub cols: u32,
    pub rows: u32,
    #[serde(default = "default_cell_size")]
    pub cell_size: f32,
    #[serde(default)]
    pub origin: WorldPos,
}

fn default_cell_size() -> f32 {
    1.0
}

fn default_thickness() -> f32 {
    0.1
}

/// How barriers are authored. One strategy covers every level of a puzzle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BarrierSpec {
    #[default]
    None,
    /// Explicit list of blocked cell edges.
    Edges { walls: Vec<[Cell; 2]> },
    /// Scene geometry probed between cell centres. `walls` are converted to
    /// thin obstacles; `rects` are taken as-is in world units.
    Obstacles {
        #[serde(default = "default_thickness")]
        thickness: f32,
        #[serde(default)]
        walls: Vec<[Cell; 2]>,
        #[serde(default)]
        rects: Vec<Obstacle>,
    },
}

impl BarrierSpec {
    fn walls(&self) -> &[[Cell; 2]] {
        match self {
            BarrierSpec::None => &[],
            BarrierSpec::Edges { walls } | BarrierSpec::Obstacles { walls, .. } => walls,
        }
    }
}

/// A complete authored puzzle: board, barriers and ordered levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PuzzleDefinition {
    pub grid: GridSpec,
    #[serde(default)]
    pub barriers: BarrierSpec,
    /// Number of pattern overlays; defaults to one per level.
    #[serde(default)]
    pub pattern_slots: Option<usize>,
    #[serde(default)]
    pub levels: Vec<LevelConfig>,
}

impl PuzzleDefinition {
    pub fn from_toml_str(source: &str) -> Result<Self, LevelLoadError> {
        let puzzle: PuzzleDefinition = toml::from_str(source)?;
        puzzle.validate()?;
        Ok(puzzle)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LevelLoadError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| LevelLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let puzzle = Self::from_toml_str(&source)?;
        info!(path = %path.display(), levels = puzzle.levels.len(), "puzzle_loaded");
        Ok(puzzle)
    }

    /// The three-level puzzle shipped with the game: a 7x6 board with
    /// invisible walls.
    pub fn builtin() -> Self {
        let walls = [
            (Cell::new(1, 0), Cell::new(1, 1)),
            (Cell::new(2, 1), Cell::new(3, 1)),
            (Cell::new(3, 2), Cell::new(3, 3)),
            (Cell::new(4, 3), Cell::new(5, 3)),
            (Cell::new(1, 4), Cell::new(2, 4)),
            (Cell::new(5, 1), Cell::new(5, 2)),
        ];
        PuzzleDefinition {
            grid: GridSpec {
                cols: 7,
                rows: 6,
                cell_size: 1.0,
                origin: WorldPos::default(),
            },
            barriers: BarrierSpec::Obstacles {
                thickness: default_thickness(),
                walls: walls.iter().map(|&(a, b)| [a, b]).collect(),
                rects: Vec::new(),
            },
            pattern_slots: None,
            levels: vec![
                LevelConfig::new(Cell::new(0, 0), Cell::new(3, 0), Cell::new(6, 5))
                    .with_key_color(Rgba::YELLOW),
                LevelConfig::new(Cell::new(6, 0), Cell::new(0, 5), Cell::new(3, 3))
                    .with_key_color(Rgba::CYAN)
                    .with_blocked([Cell::new(4, 4)]),
                LevelConfig::new(Cell::new(3, 5), Cell::new(6, 2), Cell::new(0, 0))
                    .with_key_color(Rgba::GREEN)
                    .with_blocked([Cell::new(2, 2)]),
            ],
        }
    }

    pub fn mapper(&self) -> Result<CoordinateMapper, GridError> {
        let bounds = GridBounds::new(self.grid.cols, self.grid.rows)?;
        CoordinateMapper::new(bounds, self.grid.origin, self.grid.cell_size)
    }

    /// Checks every authored cell against the board.
    pub fn validate(&self) -> Result<(), LevelLoadError> {
        let mapper = self.mapper()?;
        let bounds = mapper.bounds();

        // A wall as thick as a cell reaches the probe segments of the
        // neighbouring edges.
        if let BarrierSpec::Obstacles { thickness, .. } = self.barriers {
            let cell_size = mapper.cell_size();
            if !thickness.is_finite() || thickness <= 0.0 || thickness >= cell_size {
                return Err(LevelLoadError::InvalidThickness {
                    thickness,
                    cell_size,
                });
            }
        }

        for &[a, b] in self.barriers.walls() {
            bounds.check(a).map_err(LevelLoadError::WallOutOfBounds)?;
            bounds.check(b).map_err(LevelLoadError::WallOutOfBounds)?;
            if !a.is_adjacent(b) {
                return Err(LevelLoadError::WallNotAdjacent { a, b });
            }
        }

        for (level, config) in self.levels.iter().enumerate() {
            let labelled = [("start", config.start), ("key", config.key), ("exit", config.exit)];
            for (label, cell) in labelled {
                bounds
                    .check(cell)
                    .map_err(|source| LevelLoadError::CellOutOfBounds { level, label, source })?;
                if config.is_blocked(cell) {
                    return Err(LevelLoadError::OnBlockedCell { level, label, cell });
                }
            }
            for &cell in &config.blocked {
                bounds.check(cell).map_err(|source| LevelLoadError::CellOutOfBounds {
                    level,
                    label: "blocked",
                    source,
                })?;
            }
        }
        Ok(())
    }

    /// Barrier capability for this puzzle's board.
    pub fn barrier_query(&self, mapper: &CoordinateMapper) -> Box<dyn BarrierQuery> {
        match &self.barriers {
            BarrierSpec::None => Box::new(NoBarriers),
            BarrierSpec::Edges { walls } => {
                Box::new(walls.iter().map(|&[a, b]| (a, b)).collect::<EdgeBarriers>())
            }
            BarrierSpec::Obstacles {
                thickness,
                walls,
                rects,
            } => {
                let mut obstacles: Vec<Obstacle> = walls
                    .iter()
                    .filter_map(|&[a, b]| Obstacle::between(mapper, a, b, *thickness))
                    .collect();
                obstacles.extend(
                    rects
                        .iter()
                        .map(|rect| Obstacle::from_corners(rect.min, rect.max)),
                );
                Box::new(ObstacleLayer::new(*mapper, obstacles))
            }
        }
    }

    /// Wires an agent and a sequencer for this puzzle. The sequencer is
    /// returned unstarted.
    pub fn build(
        &self,
        default_color: Rgba,
        agent_visuals: Option<Box<dyn AgentVisuals>>,
        progress_visuals: Option<Box<dyn ProgressVisuals>>,
    ) -> Result<LevelSequencer, LevelLoadError> {
        self.validate()?;
        let mapper = self.mapper()?;

        let mut agent =
            Agent::new(mapper, self.barrier_query(&mapper)).with_default_color(default_color);
        if let Some(visuals) = agent_visuals {
            agent = agent.with_visuals(visuals);
        }

        let mut sequencer = LevelSequencer::new(self.levels.clone()).with_agent(agent);
        if let Some(slots) = self.pattern_slots {
            sequencer = sequencer.with_pattern_slots(slots);
        }
        if let Some(visuals) = progress_visuals {
            sequencer = sequencer.with_visuals(visuals);
        }
        Ok(sequencer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Direction,
        agent::MoveOutcome,
        input::{InputSource, ScriptedInput},
    };

    use Direction::{Down, Left, Right, Up};

    const SAMPLE: &str = r#"
[grid]
cols = 6
rows = 7
origin = { x = -2.5, y = 3.0 }

[barriers]
kind = "edges"
walls = [[{ col = 1, row = 3 }, { col = 2, row = 3 }]]

[[levels]]
start = { col = 0, row = 0 }
key = { col = 2, row = 3 }
exit = { col = 5, row = 6 }

[[levels]]
start = { col = 5, row = 6 }
key = { col = 0, row = 6 }
exit = { col = 0, row = 0 }
key_color = { r = 0, g = 128, b = 255 }
blocked = [{ col = 3, row = 6 }]
"#;

    fn play(sequencer: &mut LevelSequencer, runs: &[(Direction, usize)]) -> Vec<MoveOutcome> {
        let mut input = ScriptedInput::from_runs(runs);
        let mut outcomes = Vec::new();
        while let Some(dir) = input.next_direction() {
            outcomes.push(sequencer.step(dir));
        }
        outcomes
    }

    #[test]
    fn parses_sample_file() {
        let puzzle = PuzzleDefinition::from_toml_str(SAMPLE).unwrap();
        assert_eq!(puzzle.grid.cols, 6);
        assert_eq!(puzzle.grid.cell_size, 1.0);
        assert_eq!(puzzle.levels.len(), 2);
        assert_eq!(puzzle.levels[0].key_color, Rgba::YELLOW);
        assert_eq!(puzzle.levels[1].key_color, Rgba { r: 0, g: 128, b: 255, a: 255 });
        assert_eq!(puzzle.levels[1].blocked, vec![Cell::new(3, 6)]);

        let mapper = puzzle.mapper().unwrap();
        let barrier = puzzle.barrier_query(&mapper);
        assert!(barrier.has_barrier(Cell::new(2, 3), Cell::new(1, 3)));
    }

    #[test]
    fn reports_out_of_bounds_level_cells() {
        let broken = SAMPLE.replace("exit = { col = 5, row = 6 }", "exit = { col = 6, row = 6 }");
        let err = PuzzleDefinition::from_toml_str(&broken).unwrap_err();
        assert!(matches!(
            err,
            LevelLoadError::CellOutOfBounds { level: 0, label: "exit", .. }
        ));
    }

    #[test]
    fn reports_bad_walls() {
        let diagonal = SAMPLE.replace(
            "[[{ col = 1, row = 3 }, { col = 2, row = 3 }]]",
            "[[{ col = 1, row = 3 }, { col = 2, row = 4 }]]",
        );
        assert!(matches!(
            PuzzleDefinition::from_toml_str(&diagonal),
            Err(LevelLoadError::WallNotAdjacent { .. })
        ));

        let outside = SAMPLE.replace(
            "[[{ col = 1, row = 3 }, { col = 2, row = 3 }]]",
            "[[{ col = 6, row = 3 }, { col = 5, row = 3 }]]",
        );
        assert!(matches!(
            PuzzleDefinition::from_toml_str(&outside),
            Err(LevelLoadError::WallOutOfBounds(_))
        ));
    }

    fn with_obstacles(thickness: &str) -> String {
        SAMPLE.replace(
            "kind = \"edges\"",
            &format!("kind = \"obstacles\"\nthickness = {thickness}"),
        )
    }

    #[test]
    fn rejects_oversized_grids() {
        let huge = SAMPLE.replace("cols = 6", "cols = 3000000000");
        assert!(matches!(
            PuzzleDefinition::from_toml_str(&huge),
            Err(LevelLoadError::Grid(GridError::TooLarge { .. }))
        ));
    }

    #[test]
    fn rejects_walls_as_thick_as_a_cell() {
        for thickness in ["1.0", "1.2", "0.0", "-0.1", "nan", "inf"] {
            assert!(
                matches!(
                    PuzzleDefinition::from_toml_str(&with_obstacles(thickness)),
                    Err(LevelLoadError::InvalidThickness { .. })
                ),
                "thickness {thickness} was accepted"
            );
        }
    }

    #[test]
    fn thick_walls_stay_on_their_own_edge() {
        let puzzle = PuzzleDefinition::from_toml_str(&with_obstacles("0.9")).unwrap();
        let mapper = puzzle.mapper().unwrap();
        let barrier = puzzle.barrier_query(&mapper);
        assert!(barrier.has_barrier(Cell::new(1, 3), Cell::new(2, 3)));
        assert!(!barrier.has_barrier(Cell::new(2, 3), Cell::new(2, 2)));
        assert!(!barrier.has_barrier(Cell::new(1, 3), Cell::new(1, 4)));
    }

    #[test]
    fn authored_rects_accept_corners_in_any_order() {
        let source = SAMPLE.replace(
            "kind = \"edges\"\nwalls = [[{ col = 1, row = 3 }, { col = 2, row = 3 }]]",
            "kind = \"obstacles\"\nrects = [{ min = { x = -0.9, y = 0.45 }, max = { x = -1.1, y = -0.45 } }]",
        );
        let puzzle = PuzzleDefinition::from_toml_str(&source).unwrap();
        let mapper = puzzle.mapper().unwrap();
        let barrier = puzzle.barrier_query(&mapper);
        assert!(barrier.has_barrier(Cell::new(1, 3), Cell::new(2, 3)));
        assert!(!barrier.has_barrier(Cell::new(1, 2), Cell::new(2, 2)));
    }

    #[test]
    fn rejects_key_on_blocked_cell() {
        let mut puzzle = PuzzleDefinition::builtin();
        let key = puzzle.levels[0].key;
        puzzle.levels[0].blocked.push(key);
        assert!(matches!(
            puzzle.validate(),
            Err(LevelLoadError::OnBlockedCell { level: 0, label: "key", .. })
        ));
    }

    #[test]
    fn reports_syntax_and_grid_errors() {
        assert!(matches!(
            PuzzleDefinition::from_toml_str("[grid\ncols = 3"),
            Err(LevelLoadError::Parse(_))
        ));
        assert!(matches!(
            PuzzleDefinition::from_toml_str("[grid]\ncols = 0\nrows = 3"),
            Err(LevelLoadError::Grid(GridError::ZeroSized { .. }))
        ));
        assert!(matches!(
            PuzzleDefinition::load("definitely/not/here.toml"),
            Err(LevelLoadError::Io { .. })
        ));
    }

    #[test]
    fn sample_file_plays_through() {
        let puzzle = PuzzleDefinition::from_toml_str(SAMPLE).unwrap();
        let mut seq = puzzle.build(Rgba::WHITE, None, None).unwrap();
        seq.start(0);

        let outcomes = play(&mut seq, &[(Right, 2), (Down, 6), (Right, 3)]);
        assert_eq!(outcomes.last(), Some(&MoveOutcome::ExitReached));
        assert_eq!(seq.current_index(), 1);

        // (3, 6) is blocked on the second level.
        assert_eq!(seq.step(Left), MoveOutcome::Moved);
        assert_eq!(seq.step(Left), MoveOutcome::Blocked);
        play(&mut seq, &[(Up, 1), (Left, 4), (Down, 1)]);
        assert!(seq.agent().unwrap().has_key());
        let outcomes = play(&mut seq, &[(Up, 6)]);
        assert_eq!(outcomes.last(), Some(&MoveOutcome::ExitReached));
        assert!(seq.all_solved());
    }

    #[test]
    fn builtin_levels_are_solvable() {
        let puzzle = PuzzleDefinition::builtin();
        puzzle.validate().unwrap();
        let mut seq = puzzle.build(Rgba::WHITE, None, None).unwrap();
        seq.start(0);

        play(&mut seq, &[(Right, 6), (Down, 5)]);
        assert_eq!(seq.current_index(), 1);
        play(&mut seq, &[(Down, 5), (Left, 6), (Up, 2), (Right, 3)]);
        assert_eq!(seq.current_index(), 2);
        play(&mut seq, &[(Right, 3), (Up, 5), (Left, 6)]);
        assert!(seq.all_solved());
    }

    #[test]
    fn builtin_walls_send_the_agent_home() {
        let mut seq = PuzzleDefinition::builtin().build(Rgba::WHITE, None, None).unwrap();
        seq.start(0);
        assert_eq!(seq.step(Right), MoveOutcome::Moved);
        assert_eq!(seq.step(Down), MoveOutcome::Reset);
        assert_eq!(seq.agent().unwrap().current_cell(), Cell::new(0, 0));
    }

    #[test]
    fn toml_round_trip_of_builtin() {
        let puzzle = PuzzleDefinition::builtin();
        let text = toml::to_string(&puzzle).unwrap();
        assert_eq!(PuzzleDefinition::from_toml_str(&text).unwrap(), puzzle);
    }
}
