//! Ratatui-based terminal UI.
//!
//! The TUI provides a settings panel for the optimization method and the
//! per-parameter search box, then renders observed and fitted HRR.
//! Fits run on demand (Enter); a failed fit keeps the previous one on screen.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
};

use crate::domain::{FitConfig, FitMethod, ParamName, RenderedCurve};
use crate::error::AppError;
use crate::fit::FitEngine;
use crate::io::ingest::{ExperimentFile, load_experiment};

mod plotters_chart;

use plotters_chart::HrrPlottersChart;

/// Where `e` writes the result when `--export-result` was not given.
const DEFAULT_EXPORT_PATH: &str = "pyro-result.json";

/// Observed samples highlighted as outliers in the chart.
const HIGHLIGHTED_RESIDUALS: usize = 5;

/// Start the TUI.
///
/// The experiment file is resolved before the terminal is taken over, so the
/// interactive picker can still prompt on a plain terminal.
pub fn run(config: FitConfig) -> Result<(), AppError> {
    let path = crate::app::pipeline::resolve_input_path(&config)?;
    let data = load_experiment(&path)?;
    let heating_rate = data.resolve_heating_rate(config.heating_rate)?;

    let mut app = App::new(config, data, heating_rate);
    app.refit();

    let _guard = TerminalGuard::new()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(4, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(4, format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

/// Editable column of a parameter row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Min,
    Max,
    Guess,
}

impl Column {
    fn next(self) -> Self {
        match self {
            Column::Min => Column::Max,
            Column::Max => Column::Guess,
            Column::Guess => Column::Min,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Column::Min => "min",
            Column::Max => "max",
            Column::Guess => "guess",
        }
    }
}

/// Settings rows: the method, then one row per parameter.
const SETTINGS_ROWS: usize = 1 + ParamName::ALL.len();

struct App {
    config: FitConfig,
    data: ExperimentFile,
    engine: FitEngine,
    curve: Option<RenderedCurve>,
    selected_row: usize,
    selected_column: Column,
    status: String,
}

impl App {
    fn new(config: FitConfig, data: ExperimentFile, heating_rate: f64) -> Self {
        let engine = FitEngine::new(data.series.clone(), heating_rate).with_seed(config.seed);
        Self {
            config,
            data,
            engine,
            curve: None,
            selected_row: 0,
            selected_column: Column::Min,
            status: "Press Enter to fit.".to_string(),
        }
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::new(4, format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::new(4, format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns `true` when the app should quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Up => {
                self.selected_row = self.selected_row.saturating_sub(1);
            }
            KeyCode::Down => {
                if self.selected_row + 1 < SETTINGS_ROWS {
                    self.selected_row += 1;
                }
            }
            KeyCode::Tab => {
                self.selected_column = self.selected_column.next();
            }
            KeyCode::Left => self.adjust_selected(-1),
            KeyCode::Right => self.adjust_selected(1),
            KeyCode::Char('m') => {
                self.config.method = self.config.method.next();
                self.status = format!("method: {} (Enter to refit)", self.config.method);
            }
            KeyCode::Enter => self.refit(),
            KeyCode::Char('e') => self.export(),
            _ => {}
        }
        false
    }

    fn selected_param(&self) -> Option<ParamName> {
        self.selected_row
            .checked_sub(1)
            .and_then(|i| ParamName::ALL.get(i).copied())
    }

    fn adjust_selected(&mut self, delta: i32) {
        let Some(name) = self.selected_param() else {
            self.config.method = cycle_method(self.config.method, delta);
            self.status = format!("method: {} (Enter to refit)", self.config.method);
            return;
        };

        let value = match self.selected_column {
            Column::Min => {
                let (lo, hi) = self.config.bounds.get(name);
                let lo = step_value(name, lo, delta);
                self.config.bounds.set(name, (lo, hi));
                lo
            }
            Column::Max => {
                let (lo, hi) = self.config.bounds.get(name);
                let hi = step_value(name, hi, delta);
                self.config.bounds.set(name, (lo, hi));
                hi
            }
            Column::Guess => {
                let v = step_value(name, self.config.guess.get(name), delta);
                self.config.guess.set(name, v);
                v
            }
        };
        self.status = format!(
            "{} {}: {} (Enter to refit)",
            name.key(),
            self.selected_column.label(),
            fmt_param(name, value)
        );
    }

    fn refit(&mut self) {
        let method = self.config.method;
        let outcome = self
            .engine
            .fit(method, &self.config.bounds, self.config.guess)
            .map(|r| (r.quality.sse, r.quality.r_squared, r.solver.converged));

        match outcome {
            Ok((sse, r_squared, converged)) => match self.engine.render() {
                Ok(curve) => {
                    self.curve = Some(curve);
                    self.status = format!(
                        "{method}: SSE={sse:.6} R²={r_squared:.4}{}",
                        if converged { "" } else { " (not converged)" }
                    );
                }
                Err(err) => self.status = format!("Render failed: {err}"),
            },
            Err(err) => self.status = format!("Fit failed: {err}"),
        }
    }

    fn export(&mut self) {
        let (Some(result), Some(curve)) = (self.engine.result(), self.curve.as_ref()) else {
            self.status = "Nothing to export yet; press Enter to fit.".to_string();
            return;
        };
        let path = self
            .config
            .export_result
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_PATH));
        let file = crate::io::result::build_result_file(
            self.data.source.as_deref(),
            self.engine.heating_rate(),
            result,
            curve,
        );
        self.status = match crate::io::result::write_result_json(&path, &file) {
            Ok(()) => format!("Wrote {}", path.display()),
            Err(err) => format!("Export failed: {err}"),
        };
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(5), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(vec![
            Span::styled("pyro", Style::default().fg(Color::Cyan)),
            Span::raw(format!(" - {}", self.data.display_name())),
        ]));

        lines.push(Line::from(Span::styled(
            format!(
                "heating rate: {} | method: {} | n={}",
                self.engine.heating_rate(),
                self.config.method,
                self.engine.series().len(),
            ),
            Style::default().fg(Color::Gray),
        )));

        if let Some(result) = self.engine.result() {
            lines.push(Line::from(Span::styled(
                format!(
                    "fit ({}): sse={:.6} | rmse={:.4} | R²={:.4} | Ea={:.4e} J/mol",
                    result.method,
                    result.quality.sse,
                    result.quality.rmse,
                    result.quality.r_squared,
                    result.parameters.ea,
                ),
                Style::default().fg(Color::Gray),
            )));
        }

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(SETTINGS_ROWS as u16 + 2)])
            .split(area);

        self.draw_chart(frame, chunks[0]);
        self.draw_settings(frame, chunks[1]);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default().title("Heat release rate").borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let Some(curve) = &self.curve else {
            let msg = Paragraph::new("No fit yet.")
                .style(Style::default().fg(Color::Yellow))
                .block(Block::default());
            frame.render_widget(msg, inner);
            return;
        };

        let series = chart_series(curve);
        let (chart_rect, insets) = chart_layout(inner);
        let widget = HrrPlottersChart {
            fitted: &series.fitted,
            observed: &series.observed,
            outliers: &series.outliers,
            x_bounds: series.x_bounds,
            y_bounds: series.y_bounds,
            x_label: X_LABEL,
            y_label: Y_LABEL,
            fmt_x: fmt_axis_x,
            fmt_y: fmt_axis_y,
        };

        frame.render_widget(widget, chart_rect);
        if let Some(insets) = insets {
            draw_axis_ticks(frame, inner, chart_rect, insets, series.x_bounds, series.y_bounds);
        }
    }

    fn draw_settings(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut items = Vec::with_capacity(SETTINGS_ROWS);
        items.push(ListItem::new(format!("Method: {}", self.config.method)));
        for name in ParamName::ALL {
            items.push(ListItem::new(self.param_row(name)));
        }

        let list = List::new(items)
            .block(
                Block::default()
                    .title(format!("Settings (editing: {})", self.selected_column.label()))
                    .borders(Borders::ALL),
            )
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");

        let mut state = ratatui::widgets::ListState::default();
        state.select(Some(self.selected_row));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn param_row(&self, name: ParamName) -> String {
        let (lo, hi) = self.config.bounds.get(name);
        let guess = self.config.guess.get(name);
        let cells = [(Column::Min, lo), (Column::Max, hi), (Column::Guess, guess)].map(|(col, v)| {
            let text = fmt_param(name, v);
            if self.selected_param() == Some(name) && self.selected_column == col {
                format!("[{text:>10}]")
            } else {
                format!(" {text:>10} ")
            }
        });
        format!(
            "{:<9} min{} max{} guess{}",
            name.key(),
            cells[0],
            cells[1],
            cells[2]
        )
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "↑/↓ select  Tab column  ←/→ adjust  m method  Enter fit  e export  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

fn cycle_method(method: FitMethod, delta: i32) -> FitMethod {
    let len = FitMethod::ALL.len() as i32;
    let idx = FitMethod::ALL.iter().position(|&m| m == method).unwrap_or(0) as i32;
    FitMethod::ALL[(idx + delta).rem_euclid(len) as usize]
}

/// One arrow-key step for a parameter value.
///
/// `A` spans decades, so it moves by a factor of `10^0.1`; the others move
/// additively.
fn step_value(name: ParamName, value: f64, delta: i32) -> f64 {
    let d = f64::from(delta);
    match name {
        ParamName::A => value * 10f64.powf(0.1 * d),
        ParamName::LogEa | ParamName::N | ParamName::M => value + 0.1 * d,
        ParamName::AlphaZv => value + 0.05 * d,
    }
}

fn fmt_param(name: ParamName, value: f64) -> String {
    match name {
        ParamName::A => format!("{value:.3e}"),
        _ => format!("{value:.3}"),
    }
}

const X_LABEL: &str = "T (°C)";
const Y_LABEL: &str = "HRR (W/g)";

struct ChartSeries {
    fitted: Vec<(f64, f64)>,
    observed: Vec<(f64, f64)>,
    outliers: Vec<(f64, f64)>,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
}

/// Build chart series for Plotters.
fn chart_series(curve: &RenderedCurve) -> ChartSeries {
    let finite = |(&x, &y): (&f64, &f64)| (x.is_finite() && y.is_finite()).then_some((x, y));
    let observed: Vec<(f64, f64)> = curve
        .temperature_c
        .iter()
        .zip(curve.actual_hrr.iter())
        .filter_map(finite)
        .collect();
    let fitted: Vec<(f64, f64)> = curve
        .temperature_c
        .iter()
        .zip(curve.predicted_hrr.iter())
        .filter_map(finite)
        .collect();
    let outliers = crate::report::largest_residuals(curve, HIGHLIGHTED_RESIDUALS)
        .into_iter()
        .filter(|r| r.temperature_c.is_finite() && r.actual.is_finite())
        .map(|r| (r.temperature_c, r.actual))
        .collect();

    let (mut x_min, mut x_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for &(x, _) in &observed {
        x_min = x_min.min(x);
        x_max = x_max.max(x);
    }
    if !x_min.is_finite() || !x_max.is_finite() || x_max <= x_min {
        x_min = 0.0;
        x_max = 1.0;
    }

    let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for &(_, y) in observed.iter().chain(fitted.iter()) {
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }
    if !y_min.is_finite() || !y_max.is_finite() || y_max <= y_min {
        y_min = 0.0;
        y_max = 1.0;
    }
    let pad = ((y_max - y_min).abs() * 0.05).max(1e-12);

    ChartSeries {
        fitted,
        observed,
        outliers,
        x_bounds: [x_min, x_max],
        y_bounds: [y_min - pad, y_max + pad],
    }
}

fn fmt_axis_x(v: f64) -> String {
    format!("{v:.0}")
}

fn fmt_axis_y(v: f64) -> String {
    format!("{v:.2}")
}

#[derive(Debug, Clone, Copy)]
struct AxisInsets {
    left: u16,
    right: u16,
    top: u16,
    bottom: u16,
}

fn chart_layout(inner: Rect) -> (Rect, Option<AxisInsets>) {
    let insets = AxisInsets {
        left: 8,
        right: 2,
        top: 1,
        bottom: 2,
    };

    if inner.width <= insets.left + insets.right + 10 || inner.height <= insets.top + insets.bottom + 5 {
        return (inner, None);
    }

    let rect = Rect {
        x: inner.x + insets.left,
        y: inner.y + insets.top,
        width: inner.width - insets.left - insets.right,
        height: inner.height - insets.top - insets.bottom,
    };

    (rect, Some(insets))
}

fn draw_axis_ticks(
    frame: &mut ratatui::Frame<'_>,
    inner: Rect,
    chart: Rect,
    insets: AxisInsets,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
) {
    let ticks = 5usize;
    let style = Style::default().fg(Color::Gray);

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let x_val = x_bounds[0] + u * (x_bounds[1] - x_bounds[0]);
        let x = chart.x + ((chart.width - 1) as f64 * u).round() as u16;
        let label = fmt_axis_x(x_val);
        let label_len = label.len() as u16;
        let start = x.saturating_sub(label_len / 2);
        let y = chart.y + chart.height;
        if y >= inner.y + inner.height - 1 {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let y_val = y_bounds[0] + u * (y_bounds[1] - y_bounds[0]);
        let y = chart.y + (chart.height - 1) - ((chart.height - 1) as f64 * u).round() as u16;
        let label = fmt_axis_y(y_val);
        let label_len = label.len() as u16;
        let x = inner.x + insets.left.saturating_sub(1);
        let start = x.saturating_sub(label_len);
        if start < inner.x {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    let x_label = Paragraph::new(X_LABEL)
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Gray));
    let x_rect = Rect {
        x: chart.x,
        y: chart.y + chart.height + 1,
        width: chart.width,
        height: 1,
    };
    if x_rect.y < inner.y + inner.height {
        frame.render_widget(x_label, x_rect);
    }

    let y_label = Paragraph::new(Y_LABEL).style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD));
    let y_rect = Rect {
        x: inner.x,
        y: inner.y,
        width: insets.left.saturating_sub(1),
        height: 1,
    };
    frame.render_widget(y_label, y_rect);
}
