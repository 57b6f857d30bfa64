use std::sync::mpsc::Receiver;

use tracing::{debug, info, warn};

use crate::{
    Direction, IndicatorState,
    agent::{Agent, AgentEvent, LevelConfig, MoveOutcome, SubscriberId},
    visual::ProgressVisuals,
};

/// Drives an [`Agent`] through an ordered list of levels.
///
/// Each exit notification for the active level advances to the next one.
/// After the last level the agent is frozen and [`all_solved`](Self::all_solved)
/// turns true. Missing collaborators make the sequencer inert rather than
/// failing.
pub struct LevelSequencer {
    levels: Vec<LevelConfig>,
    agent: Option<Agent>,
    visuals: Option<Box<dyn ProgressVisuals>>,
    pattern_slots: usize,

    current: usize,
    active_serial: Option<u64>,
    subscription: Option<(SubscriberId, Receiver<AgentEvent>)>,
    all_solved: bool,
}

impl LevelSequencer {
    pub fn new(levels: Vec<LevelConfig>) -> Self {
        let pattern_slots = levels.len();
        LevelSequencer {
            levels,
            agent: None,
            visuals: None,
            pattern_slots,
            current: 0,
            active_serial: None,
            subscription: None,
            all_solved: false,
        }
    }

    pub fn with_agent(mut self, agent: Agent) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn with_visuals(mut self, visuals: Box<dyn ProgressVisuals>) -> Self {
        self.visuals = Some(visuals);
        self
    }

    /// Number of pattern overlays in the scene (defaults to one per level).
    pub fn with_pattern_slots(mut self, slots: usize) -> Self {
        self.pattern_slots = slots;
        self
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// True once the final level's exit has been reached.
    pub fn all_solved(&self) -> bool {
        self.all_solved
    }

    pub fn agent(&self) -> Option<&Agent> {
        self.agent.as_ref()
    }

    pub fn agent_mut(&mut self) -> Option<&mut Agent> {
        self.agent.as_mut()
    }

    /// Lock state for `level`, or `None` past the end of the list.
    pub fn indicator(&self, level: usize) -> Option<IndicatorState> {
        if level >= self.levels.len() {
            return None;
        }
        Some(if self.all_solved {
            IndicatorState::Open
        } else {
            Self::indicator_for(level, self.current)
        })
    }

    fn indicator_for(level: usize, current: usize) -> IndicatorState {
        match level.cmp(&current) {
            std::cmp::Ordering::Less => IndicatorState::Open,
            std::cmp::Ordering::Equal => IndicatorState::Lit,
            std::cmp::Ordering::Greater => IndicatorState::Closed,
        }
    }

    /// Begins play at `index`, clamped into the level list.
    pub fn start(&mut self, index: usize) {
        if self.levels.is_empty() {
            warn!("sequencer_start_without_levels");
            return;
        }
        let Some(agent) = self.agent.as_mut() else {
            warn!("sequencer_start_without_agent");
            return;
        };
        if self.subscription.is_none() {
            self.subscription = Some(agent.subscribe());
        }

        self.current = index.min(self.levels.len() - 1);
        self.all_solved = false;

        if let Some(visuals) = self.visuals.as_mut() {
            for slot in 0..self.pattern_slots {
                visuals.set_pattern_overlay_visible(slot, slot == 0);
            }
            visuals.set_final_object_visible(false);
        }

        info!(level = self.current, total = self.levels.len(), "sequencer_started");
        self.enter_current_level();
    }

    /// Restarts the active level from its start cell.
    pub fn restart_level(&mut self) {
        if self.all_solved {
            return;
        }
        if let Some(agent) = self.agent.as_mut() {
            agent.reset_to_start();
        }
    }

    /// Feeds one input to the agent and settles any resulting progression
    /// before returning.
    pub fn step(&mut self, direction: Direction) -> MoveOutcome {
        let Some(agent) = self.agent.as_mut() else {
            return MoveOutcome::Disabled;
        };
        let outcome = agent.try_move(direction);
        self.pump_events();
        outcome
    }

    /// Handles every notification the agent has queued.
    pub fn pump_events(&mut self) {
        let pending: Vec<AgentEvent> = match self.subscription.as_ref() {
            Some((_, rx)) => rx.try_iter().collect(),
            None => return,
        };
        for event in pending {
            match event {
                AgentEvent::ExitReached { level_serial, .. } => self.on_exit_reached(level_serial),
            }
        }
    }

    fn on_exit_reached(&mut self, level_serial: u64) {
        if self.all_solved || self.active_serial != Some(level_serial) {
            debug!(level_serial, "stale_exit_notification_ignored");
            return;
        }

        let next = self.current + 1;
        if next < self.pattern_slots {
            if let Some(visuals) = self.visuals.as_mut() {
                visuals.set_pattern_overlay_visible(next, true);
            }
        }

        if next >= self.levels.len() {
            self.finish();
            return;
        }

        self.current = next;
        info!(level = self.current, "level_advanced");
        self.enter_current_level();
    }

    fn enter_current_level(&mut self) {
        self.refresh_indicators();
        if let Some(agent) = self.agent.as_mut() {
            agent.apply_level(self.levels[self.current].clone());
            agent.set_enabled(true);
            self.active_serial = Some(agent.level_serial());
        }
    }

    fn finish(&mut self) {
        self.all_solved = true;
        self.active_serial = None;
        if let Some(visuals) = self.visuals.as_mut() {
            for level in 0..self.levels.len() {
                visuals.set_indicator(level, IndicatorState::Open);
            }
            visuals.set_final_object_visible(true);
        }
        if let Some(agent) = self.agent.as_mut() {
            agent.set_enabled(false);
        }
        info!(total = self.levels.len(), "all_levels_solved");
    }

    fn refresh_indicators(&mut self) {
        let current = self.current;
        if let Some(visuals) = self.visuals.as_mut() {
            for level in 0..self.levels.len() {
                visuals.set_indicator(level, Self::indicator_for(level, current));
            }
        }
    }

    /// Tears the sequencer down and hands back its agent, unsubscribed.
    pub fn into_agent(mut self) -> Option<Agent> {
        let mut agent = self.agent.take()?;
        if let Some((id, _)) = self.subscription.take() {
            agent.unsubscribe(id);
        }
        Some(agent)
    }
}

impl Drop for LevelSequencer {
    fn drop(&mut self) {
        if let (Some(agent), Some((id, _))) = (self.agent.as_mut(), self.subscription.take()) {
            agent.unsubscribe(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Cell, WorldPos,
        barrier::NoBarriers,
        map::{CoordinateMapper, GridBounds},
        visual::SceneVisuals,
    };

    use Direction::{Down, Right};

    fn agent() -> Agent {
        let mapper =
            CoordinateMapper::new(GridBounds::new(4, 4).unwrap(), WorldPos::default(), 1.0)
                .unwrap();
        Agent::new(mapper, Box::new(NoBarriers))
    }

    // Key one step right of the start, exit one step below the key.
    fn short_level(row: i32) -> LevelConfig {
        LevelConfig::new(Cell::new(0, row), Cell::new(1, row), Cell::new(1, row + 1))
    }

    fn solve_short(seq: &mut LevelSequencer) -> MoveOutcome {
        seq.step(Right);
        seq.step(Down)
    }

    #[test]
    fn inert_without_levels_or_agent() {
        let mut empty = LevelSequencer::new(Vec::new()).with_agent(agent());
        empty.start(0);
        assert_eq!(empty.step(Right), MoveOutcome::Disabled);
        assert!(!empty.all_solved());

        let mut no_agent = LevelSequencer::new(vec![short_level(0)]);
        no_agent.start(0);
        assert_eq!(no_agent.step(Right), MoveOutcome::Disabled);
        assert_eq!(no_agent.indicator(0), Some(IndicatorState::Lit));
    }

    #[test]
    fn start_index_is_clamped() {
        let visuals = SceneVisuals::shared();
        let mut seq = LevelSequencer::new(vec![short_level(0), short_level(1), short_level(2)])
            .with_agent(agent())
            .with_visuals(Box::new(visuals.clone()));
        seq.start(10);
        assert_eq!(seq.current_index(), 2);
        assert_eq!(
            visuals.borrow().indicators,
            vec![IndicatorState::Open, IndicatorState::Open, IndicatorState::Lit]
        );
        assert_eq!(visuals.borrow().pattern_overlays, vec![true, false, false]);
        assert_eq!(seq.agent().unwrap().current_cell(), Cell::new(0, 2));
    }

    #[test]
    fn advancing_reconfigures_the_agent() {
        let mut seq =
            LevelSequencer::new(vec![short_level(0), short_level(1)]).with_agent(agent());
        seq.start(0);
        assert_eq!(solve_short(&mut seq), MoveOutcome::ExitReached);
        assert_eq!(seq.current_index(), 1);
        let agent = seq.agent().unwrap();
        assert_eq!(agent.current_cell(), Cell::new(0, 1));
        assert!(!agent.has_key());
        assert_eq!(seq.indicator(0), Some(IndicatorState::Open));
        assert_eq!(seq.indicator(1), Some(IndicatorState::Lit));
        assert_eq!(seq.indicator(2), None);
    }

    #[test]
    fn stale_notifications_do_not_advance() {
        let mut seq =
            LevelSequencer::new(vec![short_level(0), short_level(1), short_level(2)])
                .with_agent(agent());
        seq.start(0);

        // Reach the exit by driving the agent directly, then swap the level
        // before the sequencer sees the queued event.
        let agent = seq.agent_mut().unwrap();
        agent.try_move(Right);
        agent.try_move(Down);
        agent.apply_level(short_level(0));
        seq.pump_events();
        assert_eq!(seq.current_index(), 0);
    }

    #[test]
    fn final_level_freezes_the_agent() {
        let visuals = SceneVisuals::shared();
        let mut seq = LevelSequencer::new(vec![short_level(0), short_level(1)])
            .with_agent(agent())
            .with_visuals(Box::new(visuals.clone()))
            .with_pattern_slots(2);
        seq.start(0);
        solve_short(&mut seq);
        solve_short(&mut seq);

        assert!(seq.all_solved());
        assert_eq!(seq.current_index(), 1);
        assert!(visuals.borrow().final_object_visible);
        assert_eq!(
            visuals.borrow().indicators,
            vec![IndicatorState::Open, IndicatorState::Open]
        );
        // No third overlay slot exists, so only two were ever touched.
        assert_eq!(visuals.borrow().pattern_overlays, vec![true, true]);

        let frozen_at = seq.agent().unwrap().current_cell();
        assert_eq!(seq.step(Right), MoveOutcome::Disabled);
        assert_eq!(seq.agent().unwrap().current_cell(), frozen_at);

        seq.restart_level();
        assert_eq!(seq.agent().unwrap().current_cell(), frozen_at);
    }

    #[test]
    fn restart_after_all_solved_reopens_play() {
        let visuals = SceneVisuals::shared();
        let mut seq = LevelSequencer::new(vec![short_level(0)])
            .with_agent(agent())
            .with_visuals(Box::new(visuals.clone()));
        seq.start(0);
        solve_short(&mut seq);
        assert!(seq.all_solved());

        seq.start(0);
        assert!(!seq.all_solved());
        assert!(!visuals.borrow().final_object_visible);
        assert!(seq.agent().unwrap().is_enabled());
        assert_eq!(seq.agent().unwrap().subscriber_count(), 1);
    }

    #[test]
    fn teardown_unsubscribes_from_the_agent() {
        let mut seq = LevelSequencer::new(vec![short_level(0)]).with_agent(agent());
        seq.start(0);
        assert_eq!(seq.agent().unwrap().subscriber_count(), 1);

        let agent = seq.into_agent().unwrap();
        assert_eq!(agent.subscriber_count(), 0);
    }
}
