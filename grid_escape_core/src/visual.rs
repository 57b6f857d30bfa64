use std::{cell::RefCell, rc::Rc};

use crate::{IndicatorState, Rgba, WorldPos};

/// Presentation hooks driven by the agent.
pub trait AgentVisuals {
    fn set_agent_color(&mut self, color: Rgba);
    fn set_agent_visible(&mut self, visible: bool);
    fn set_agent_position(&mut self, position: WorldPos);
}

/// Presentation hooks driven by the level sequencer.
pub trait ProgressVisuals {
    fn set_indicator(&mut self, level: usize, state: IndicatorState);
    fn set_pattern_overlay_visible(&mut self, index: usize, visible: bool);
    fn set_final_object_visible(&mut self, visible: bool);
}

/// Retained copy of everything the puzzle asked to display.
///
/// Front-ends render from it; tests inspect it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneVisuals {
    pub agent_color: Option<Rgba>,
    pub agent_visible: bool,
    pub agent_position: Option<WorldPos>,
    pub indicators: Vec<IndicatorState>,
    pub pattern_overlays: Vec<bool>,
    pub final_object_visible: bool,
}

/// Single-threaded handle shared between the agent and the sequencer.
pub type SharedVisuals = Rc<RefCell<SceneVisuals>>;

impl SceneVisuals {
    pub fn shared() -> SharedVisuals {
        Rc::new(RefCell::new(SceneVisuals::default()))
    }

    pub fn indicator(&self, level: usize) -> Option<IndicatorState> {
        self.indicators.get(level).copied()
    }

    pub fn pattern_visible(&self, index: usize) -> bool {
        self.pattern_overlays.get(index).copied().unwrap_or(false)
    }
}

// Grows `slots` so that `index` is addressable.
fn slot<T: Default + Clone>(slots: &mut Vec<T>, index: usize) -> &mut T {
    if slots.len() <= index {
        slots.resize(index + 1, T::default());
    }
    &mut slots[index]
}

impl AgentVisuals for SceneVisuals {
    fn set_agent_color(&mut self, color: Rgba) {
        self.agent_color = Some(color);
    }

    fn set_agent_visible(&mut self, visible: bool) {
        self.agent_visible = visible;
    }

    fn set_agent_position(&mut self, position: WorldPos) {
        self.agent_position = Some(position);
    }
}

impl ProgressVisuals for SceneVisuals {
    fn set_indicator(&mut self, level: usize, state: IndicatorState) {
        *slot(&mut self.indicators, level) = state;
    }

    fn set_pattern_overlay_visible(&mut self, index: usize, visible: bool) {
        *slot(&mut self.pattern_overlays, index) = visible;
    }

    fn set_final_object_visible(&mut self, visible: bool) {
        self.final_object_visible = visible;
    }
}

impl AgentVisuals for SharedVisuals {
    fn set_agent_color(&mut self, color: Rgba) {
        self.borrow_mut().set_agent_color(color);
    }

    fn set_agent_visible(&mut self, visible: bool) {
        self.borrow_mut().set_agent_visible(visible);
    }

    fn set_agent_position(&mut self, position: WorldPos) {
        self.borrow_mut().set_agent_position(position);
    }
}

impl ProgressVisuals for SharedVisuals {
    fn set_indicator(&mut self, level: usize, state: IndicatorState) {
        self.borrow_mut().set_indicator(level, state);
    }

    fn set_pattern_overlay_visible(&mut self, index: usize, visible: bool) {
        self.borrow_mut().set_pattern_overlay_visible(index, visible);
    }

    fn set_final_object_visible(&mut self, visible: bool) {
        self.borrow_mut().set_final_object_visible(visible);
    }
}
