use std::sync::mpsc::{self, Receiver, Sender};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    Cell, Direction, Rgba, WorldPos, barrier::BarrierQuery, map::CoordinateMapper,
    visual::AgentVisuals,
};

/// One authored level: where the agent starts, where the key lies and where
/// the exit is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelConfig {
    pub start: Cell,
    pub key: Cell,
    pub exit: Cell,
    #[serde(default = "default_key_color")]
    pub key_color: Rgba,
    /// Cells that can never be entered. Walking into one leaves the agent in place.
    #[serde(default)]
    pub blocked: Vec<Cell>,
}

fn default_key_color() -> Rgba {
    Rgba::YELLOW
}

impl LevelConfig {
    pub fn new(start: Cell, key: Cell, exit: Cell) -> Self {
        LevelConfig {
            start,
            key,
            exit,
            key_color: default_key_color(),
            blocked: Vec::new(),
        }
    }

    pub fn with_key_color(mut self, color: Rgba) -> Self {
        self.key_color = color;
        self
    }

    pub fn with_blocked(mut self, blocked: impl IntoIterator<Item = Cell>) -> Self {
        self.blocked.extend(blocked);
        self
    }

    pub fn is_blocked(&self, cell: Cell) -> bool {
        self.blocked.contains(&cell)
    }
}

/// Notifications pushed to every subscriber of an [`Agent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentEvent {
    /// The agent stood on the exit while holding the key.
    ///
    /// `level_serial` identifies the level instance the event belongs to; it
    /// changes every time a level is applied.
    ExitReached { level_serial: u64, cell: Cell },
}

/// What a single [`Agent::try_move`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Input is frozen or no level has been applied.
    Disabled,
    /// The step would leave the grid; nothing changed.
    OutOfBounds,
    /// The target cell can't be entered; nothing changed.
    Blocked,
    /// A barrier was crossed and the level restarted.
    Reset,
    Moved,
    KeyAcquired,
    ExitReached,
}

/// Handle returned by [`Agent::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// The player token walking the grid.
///
/// Owns its cell and the key latch. Barrier detection and presentation are
/// injected capabilities; without visuals every display update is a no-op.
pub struct Agent {
    mapper: CoordinateMapper,
    barrier: Box<dyn BarrierQuery>,
    visuals: Option<Box<dyn AgentVisuals>>,
    default_color: Rgba,

    config: Option<LevelConfig>,
    level_serial: u64,
    current: Cell,
    has_key: bool,
    exit_notified: bool,
    color: Rgba,
    enabled: bool,

    subscribers: Vec<(SubscriberId, Sender<AgentEvent>)>,
    next_subscriber: u64,
}

impl Agent {
    pub fn new(mapper: CoordinateMapper, barrier: Box<dyn BarrierQuery>) -> Self {
        Agent {
            mapper,
            barrier,
            visuals: None,
            default_color: Rgba::WHITE,
            config: None,
            level_serial: 0,
            current: Cell::default(),
            has_key: false,
            exit_notified: false,
            color: Rgba::WHITE,
            enabled: true,
            subscribers: Vec::new(),
            next_subscriber: 0,
        }
    }

    pub fn with_visuals(mut self, visuals: Box<dyn AgentVisuals>) -> Self {
        self.visuals = Some(visuals);
        self
    }

    /// Color restored whenever the key latch is cleared.
    pub fn with_default_color(mut self, color: Rgba) -> Self {
        self.default_color = color;
        self.color = color;
        self
    }

    pub fn current_cell(&self) -> Cell {
        self.current
    }

    pub fn has_key(&self) -> bool {
        self.has_key
    }

    pub fn color(&self) -> Rgba {
        self.color
    }

    pub fn config(&self) -> Option<&LevelConfig> {
        self.config.as_ref()
    }

    pub fn level_serial(&self) -> u64 {
        self.level_serial
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    pub fn barrier(&self) -> &dyn BarrierQuery {
        self.barrier.as_ref()
    }

    pub fn world_position(&self) -> WorldPos {
        self.mapper.cell_to_world(self.current)
    }

    /// Debug probe: the cell nearest to `position`, clamped into the grid.
    pub fn locate(&self, position: WorldPos) -> Cell {
        self.mapper.world_to_cell(position)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Freezes (`false`) or resumes (`true`) input handling.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Registers a new observer. Events are queued on the returned receiver.
    pub fn subscribe(&mut self) -> (SubscriberId, Receiver<AgentEvent>) {
        let id = SubscriberId(self.next_subscriber);
        self.next_subscriber += 1;
        let (tx, rx) = mpsc::channel();
        self.subscribers.push((id, tx));
        (id, rx)
    }

    /// Removes an observer. Returns `false` if `id` was not registered.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Binds a new level instance and puts the agent on its start cell.
    pub fn apply_level(&mut self, config: LevelConfig) {
        let bounds = self.mapper.bounds();
        for (label, cell) in [("start", config.start), ("key", config.key), ("exit", config.exit)] {
            if !bounds.contains(cell) {
                warn!(label, col = cell.col, row = cell.row, "level_cell_out_of_bounds");
            }
        }

        self.config = Some(config);
        self.level_serial += 1;
        if let Some(visuals) = self.visuals.as_mut() {
            visuals.set_agent_visible(true);
        }
        self.reset_to_start();
    }

    /// Returns to the level start, dropping the key. Idempotent.
    pub fn reset_to_start(&mut self) {
        let Some(config) = self.config.as_ref() else {
            return;
        };
        self.current = config.start;
        self.has_key = false;
        self.exit_notified = false;
        self.color = self.default_color;

        let position = self.world_position();
        if let Some(visuals) = self.visuals.as_mut() {
            visuals.set_agent_color(self.default_color);
            visuals.set_agent_position(position);
        }
    }

    /// Handles one directional input.
    pub fn try_move(&mut self, direction: Direction) -> MoveOutcome {
        if !self.enabled {
            return MoveOutcome::Disabled;
        }
        let Some(config) = self.config.as_ref() else {
            debug!("move_ignored_no_level");
            return MoveOutcome::Disabled;
        };

        let next = self.current.offset(direction);
        if !self.mapper.in_bounds(next) {
            return MoveOutcome::OutOfBounds;
        }

        if self.barrier.has_barrier(self.current, next) {
            debug!(
                from_col = self.current.col,
                from_row = self.current.row,
                to_col = next.col,
                to_row = next.row,
                "barrier_crossed_reset"
            );
            self.reset_to_start();
            return MoveOutcome::Reset;
        }

        if config.is_blocked(next) {
            return MoveOutcome::Blocked;
        }

        let (key_cell, exit_cell, key_color) = (config.key, config.exit, config.key_color);

        self.current = next;
        let position = self.world_position();
        if let Some(visuals) = self.visuals.as_mut() {
            visuals.set_agent_position(position);
        }

        let mut outcome = MoveOutcome::Moved;

        if !self.has_key && self.current == key_cell {
            self.has_key = true;
            self.color = key_color;
            if let Some(visuals) = self.visuals.as_mut() {
                visuals.set_agent_color(key_color);
            }
            debug!(col = next.col, row = next.row, "key_acquired");
            outcome = MoveOutcome::KeyAcquired;
        }

        if self.has_key && self.current == exit_cell && !self.exit_notified {
            self.exit_notified = true;
            info!(
                level_serial = self.level_serial,
                col = next.col,
                row = next.row,
                "exit_reached"
            );
            self.notify(AgentEvent::ExitReached {
                level_serial: self.level_serial,
                cell: next,
            });
            outcome = MoveOutcome::ExitReached;
        }

        outcome
    }

    fn notify(&mut self, event: AgentEvent) {
        // Receivers that were dropped without unsubscribing are pruned here.
        self.subscribers.retain(|(_, tx)| tx.send(event).is_ok());
    }
}
