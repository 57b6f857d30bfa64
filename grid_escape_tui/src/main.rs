use anyhow::{Context, Result};
use clap::Parser;
use grid_escape_core::{
    Cell, Direction, IndicatorState, Rgba,
    agent::MoveOutcome,
    input::{InputSource, RandomInput},
    levels::PuzzleDefinition,
    sequencer::LevelSequencer,
    visual::{SceneVisuals, SharedVisuals},
};
use ratatui::{
    crossterm::{
        self,
        event::{self, Event, KeyCode, KeyEventKind},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    layout::Direction as LayoutDirection,
    prelude::*,
    widgets::*,
};
use std::{
    fs::File,
    io::{self, Stdout},
    path::{Path, PathBuf},
    sync::Mutex,
    time::{Duration, Instant},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Puzzle file to load (TOML). Uses the built-in puzzle when omitted.
    #[arg(short, long, value_name = "PUZZLE_FILE")]
    levels: Option<PathBuf>,

    /// Level to begin on (clamped to the available levels)
    #[arg(short, long, default_value_t = 0)]
    start_level: usize,

    /// Draw the normally invisible walls
    #[arg(long)]
    show_walls: bool,

    /// Let a seeded random walker play instead of the keyboard
    #[arg(long, value_name = "SEED")]
    autoplay: Option<u64>,

    /// Where diagnostics are written (RUST_LOG controls the level)
    #[arg(long, value_name = "LOG_FILE", default_value = "grid_escape.log")]
    log_file: PathBuf,
}

struct App {
    /// Drives the agent through the puzzle's levels.
    sequencer: LevelSequencer,
    /// Everything the puzzle asked to display.
    visuals: SharedVisuals,
    /// Random walker used in autoplay mode.
    autoplay: Option<RandomInput>,
    show_walls: bool,
    /// Last message shown in the status bar.
    status: String,
    /// Flag to control the main loop.
    should_quit: bool,
}

impl App {
    fn new(args: &Args) -> Result<Self> {
        let puzzle = match &args.levels {
            Some(path) => PuzzleDefinition::load(path)
                .with_context(|| format!("Failed to load puzzle {}", path.display()))?,
            None => PuzzleDefinition::builtin(),
        };

        let visuals = SceneVisuals::shared();
        let mut sequencer = puzzle.build(
            Rgba::WHITE,
            Some(Box::new(visuals.clone())),
            Some(Box::new(visuals.clone())),
        )?;
        sequencer.start(args.start_level);

        Ok(App {
            sequencer,
            visuals,
            autoplay: args.autoplay.map(RandomInput::new),
            show_walls: args.show_walls,
            status: String::from("Find the key, then the exit."),
            should_quit: false,
        })
    }

    /// Applies one directional input.
    fn handle_move(&mut self, direction: Direction) {
        let level = self.sequencer.current_index();
        let outcome = self.sequencer.step(direction);
        self.status = match outcome {
            MoveOutcome::Disabled if self.sequencer.all_solved() => "All locks are open.".into(),
            MoveOutcome::Disabled => "The board is not accepting input.".into(),
            MoveOutcome::OutOfBounds => "That's the edge of the board.".into(),
            MoveOutcome::Blocked => "Something solid is in the way.".into(),
            MoveOutcome::Reset => "You fell back to the beginning!".into(),
            MoveOutcome::Moved => return,
            MoveOutcome::KeyAcquired => "You picked up the key.".into(),
            MoveOutcome::ExitReached if self.sequencer.all_solved() => {
                "Every lock is open. Well done!".into()
            }
            MoveOutcome::ExitReached => format!("Lock {} opened.", level + 1),
        };
    }

    /// Handles one frame of autoplay.
    fn tick(&mut self) {
        if self.sequencer.all_solved() {
            return;
        }
        if let Some(direction) = self.autoplay.as_mut().and_then(|input| input.next_direction()) {
            self.handle_move(direction);
        }
    }

    /// Reports the cell under the agent's on-screen position.
    fn locate(&mut self) {
        let Some(agent) = self.sequencer.agent() else {
            return;
        };
        let position = self
            .visuals
            .borrow()
            .agent_position
            .unwrap_or_else(|| agent.world_position());
        let cell = agent.locate(position);
        info!(col = cell.col, row = cell.row, x = position.x, y = position.y, "locate");
        self.status = format!(
            "Cell = ({}, {})  World = ({:.2}, {:.2})",
            cell.col, cell.row, position.x, position.y
        );
    }

    fn restart(&mut self) {
        self.sequencer.restart_level();
        self.status = String::from("Level restarted.");
    }

    /// Sets the quit flag.
    fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();
    init_tracing(&args.log_file)?;
    info!("=== Grid Escape Startup ===");

    // Build the puzzle before touching the terminal so load errors print normally
    let mut app = App::new(&args)?;

    // Set up the terminal
    let mut terminal = setup_terminal()?;

    // Run the main application loop
    let result = run_app(&mut terminal, &mut app);

    // Restore the terminal state
    restore_terminal(&mut terminal)?;

    result
}

/// Sends diagnostics to a file so they don't corrupt the terminal UI.
fn init_tracing(log_file: &Path) -> Result<()> {
    let file = File::create(log_file)
        .with_context(|| format!("Failed to create log file {}", log_file.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn key_direction(code: KeyCode) -> Option<Direction> {
    match code {
        KeyCode::Char('w') | KeyCode::Char('W') | KeyCode::Up => Some(Direction::Up),
        KeyCode::Char('s') | KeyCode::Char('S') | KeyCode::Down => Some(Direction::Down),
        KeyCode::Char('a') | KeyCode::Char('A') | KeyCode::Left => Some(Direction::Left),
        KeyCode::Char('d') | KeyCode::Char('D') | KeyCode::Right => Some(Direction::Right),
        _ => None,
    }
}

/// Runs the main loop of the TUI application.
fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    let tick_rate = Duration::from_millis(150);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        // One key press is one move; held keys don't repeat.
        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                        KeyCode::Char('r') => app.restart(),
                        KeyCode::Char('c') => app.locate(),
                        code => {
                            if let Some(direction) = key_direction(code) {
                                if app.autoplay.is_none() {
                                    app.handle_move(direction);
                                }
                            }
                        }
                    }
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick();
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

fn to_color(rgba: Rgba) -> Color {
    Color::Rgb(rgba.r, rgba.g, rgba.b)
}

/// Renders the user interface.
fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(LayoutDirection::Vertical)
        .constraints([
            Constraint::Min(10),   // Board and progress
            Constraint::Length(3), // Status
            Constraint::Length(2), // Help
        ])
        .split(frame.area());

    let top = Layout::default()
        .direction(LayoutDirection::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(main_layout[0]);

    render_board(frame, top[0], app);
    render_progress(frame, top[1], app);

    let status = Paragraph::new(app.status.as_str())
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Status"));
    frame.render_widget(status, main_layout[1]);

    let help_text = Paragraph::new("WASD / arrows: move   r: restart   c: locate   q / Esc: quit")
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[2]);
}

/// Renders the grid, the agent and the current level's key and exit.
fn render_board(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default().title("Grid Escape").borders(Borders::ALL);
    let Some(agent) = app.sequencer.agent() else {
        frame.render_widget(Paragraph::new("No agent bound.").block(block), area);
        return;
    };
    let visuals = app.visuals.borrow();
    let bounds = agent.mapper().bounds();
    let barrier = agent.barrier();
    let config = agent.config();
    let wall_style = Style::default().fg(Color::DarkGray);

    let mut lines: Vec<Line> = Vec::with_capacity(bounds.rows() as usize * 2);
    for row in 0..bounds.rows() as i32 {
        let mut spans: Vec<Span> = Vec::with_capacity(bounds.cols() as usize * 2);
        let mut under: Vec<Span> = Vec::with_capacity(bounds.cols() as usize * 2);

        for col in 0..bounds.cols() as i32 {
            let cell = Cell::new(col, row);
            let span = if visuals.agent_visible && agent.current_cell() == cell {
                let color = visuals.agent_color.unwrap_or(agent.color());
                Span::styled(" @ ", Style::default().fg(to_color(color)).bold())
            } else if let Some(config) = config {
                if config.is_blocked(cell) {
                    Span::styled("###", wall_style)
                } else if cell == config.key && !agent.has_key() {
                    Span::styled(" k ", Style::default().fg(to_color(config.key_color)))
                } else if cell == config.exit {
                    let exit_color = if agent.has_key() { Color::Green } else { Color::DarkGray };
                    Span::styled(" E ", Style::default().fg(exit_color))
                } else {
                    Span::raw(" . ")
                }
            } else {
                Span::raw(" . ")
            };
            spans.push(span);

            let right = Cell::new(col + 1, row);
            let wall_right = app.show_walls && bounds.contains(right) && barrier.has_barrier(cell, right);
            spans.push(Span::styled(if wall_right { "|" } else { " " }, wall_style));

            let below = Cell::new(col, row + 1);
            let wall_below = app.show_walls && bounds.contains(below) && barrier.has_barrier(cell, below);
            under.push(Span::styled(if wall_below { "---" } else { "   " }, wall_style));
            under.push(Span::raw(" "));
        }
        lines.push(Line::from(spans));
        lines.push(Line::from(under));
    }

    let board = Paragraph::new(lines)
        .block(block)
        .alignment(Alignment::Center);
    frame.render_widget(board, area);
}

/// Renders lock indicators, pattern overlays and the completion banner.
fn render_progress(frame: &mut Frame, area: Rect, app: &App) {
    let visuals = app.visuals.borrow();
    let mut items: Vec<ListItem> = Vec::new();

    for (level, state) in visuals.indicators.iter().enumerate() {
        let (label, color) = match state {
            IndicatorState::Closed => ("closed", Color::Red),
            IndicatorState::Lit => ("lit", Color::Yellow),
            IndicatorState::Open => ("open", Color::Green),
        };
        items.push(ListItem::from(Line::from(vec![
            Span::raw(format!("Lock {}: ", level + 1)),
            Span::styled(label, Style::default().fg(color).bold()),
        ])));
    }

    items.push(ListItem::from(Line::raw("")));
    for (index, shown) in visuals.pattern_overlays.iter().enumerate() {
        let text = if *shown {
            Span::styled(format!("Pattern {}: revealed", index + 1), Style::default().fg(Color::Cyan))
        } else {
            Span::styled(format!("Pattern {}: ???", index + 1), Style::default().fg(Color::DarkGray))
        };
        items.push(ListItem::from(Line::from(text)));
    }

    if visuals.final_object_visible {
        items.push(ListItem::from(Line::raw("")));
        items.push(ListItem::from(Line::from(Span::styled(
            "*** ALL SOLVED ***",
            Style::default().fg(Color::Green).bold(),
        ))));
    }

    let title = format!(
        "Level {}/{}",
        app.sequencer.current_index() + 1,
        app.sequencer.level_count()
    );
    let progress = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(progress, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(extra: &[&str]) -> App {
        let args = Args::parse_from(std::iter::once("grid_escape_tui").chain(extra.iter().copied()));
        App::new(&args).unwrap()
    }

    #[test]
    fn wasd_and_arrows_map_to_moves() {
        assert_eq!(key_direction(KeyCode::Char('w')), Some(Direction::Up));
        assert_eq!(key_direction(KeyCode::Left), Some(Direction::Left));
        assert_eq!(key_direction(KeyCode::Char('D')), Some(Direction::Right));
        assert_eq!(key_direction(KeyCode::Char('x')), None);
    }

    #[test]
    fn status_reports_resets_and_progress() {
        let mut app = app(&[]);
        app.handle_move(Direction::Up);
        assert_eq!(app.status, "That's the edge of the board.");
        app.handle_move(Direction::Right);
        app.handle_move(Direction::Down);
        assert_eq!(app.status, "You fell back to the beginning!");

        for _ in 0..6 {
            app.handle_move(Direction::Right);
        }
        for _ in 0..5 {
            app.handle_move(Direction::Down);
        }
        assert_eq!(app.status, "Lock 1 opened.");
        assert_eq!(app.sequencer.current_index(), 1);
    }

    #[test]
    fn start_level_is_clamped_and_locate_reports_the_cell() {
        let mut app = app(&["--start-level", "9"]);
        assert_eq!(app.sequencer.current_index(), 2);
        app.locate();
        assert!(app.status.starts_with("Cell = (3, 5)"));
    }
}
