use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crossterm::event::{
    self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEventKind, KeyModifiers,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Terminal;
use tracing::debug;

use psdrazor::core::batch::split_paths;
use psdrazor::core::cue::{CompletionCue, TerminalBell};
use psdrazor::core::error::RazorError;
use psdrazor::core::event::RunEvent;
use psdrazor::core::formatter::{file_name, format_verdict, ALREADY_RUNNING_LINE};
use psdrazor::core::picker::pick_images;
use psdrazor::core::progress::BatchProgress;
use psdrazor::core::runner::{BatchRunner, RunnerConfig};
use psdrazor::core::summary::BatchReport;

pub struct Options {
    pub tool: Result<PathBuf, RazorError>,
    pub inputs: Vec<PathBuf>,
    pub config: RunnerConfig,
    pub bell: bool,
}

fn term_err(err: io::Error) -> RazorError {
    RazorError::Terminal {
        message: err.to_string(),
    }
}

struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self, RazorError> {
        enable_raw_mode().map_err(term_err)?;
        let mut stdout = io::stdout();
        stdout.execute(EnterAlternateScreen).map_err(term_err)?;
        stdout.execute(EnableBracketedPaste).map_err(term_err)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        let _ = stdout.execute(DisableBracketedPaste);
        let _ = disable_raw_mode();
        let _ = stdout.execute(LeaveAlternateScreen);
    }
}

#[derive(Debug)]
struct AppState {
    input: String,
    history: Vec<String>,
    /// Output text after the last newline, not yet a full history line.
    partial: String,
    files: Vec<PathBuf>,
    tool: Option<PathBuf>,
    progress: BatchProgress,
    last_report: Option<BatchReport>,
    running: bool,
    should_quit: bool,
    scroll_offset: usize,
    view_lines: usize,
    tick: u64,
    bell: bool,
}

const MAX_LINES: usize = 2000;

impl AppState {
    fn new(options: &Options) -> Self {
        let mut app = Self {
            input: String::new(),
            history: Vec::new(),
            partial: String::new(),
            files: options.inputs.clone(),
            tool: options.tool.as_ref().ok().cloned(),
            progress: BatchProgress::default(),
            last_report: None,
            running: false,
            should_quit: false,
            scroll_offset: 0,
            view_lines: 1,
            tick: 0,
            bell: options.bell,
        };
        app.push_history("Drop PSD files here (paste paths) or type 'help'.");
        match &options.tool {
            Ok(path) => app.push_history(format!("Tool: {}", path.display())),
            Err(err) => app.push_history(format!("Error: {err}")),
        }
        if !app.files.is_empty() {
            app.push_history(format!("{} file(s) selected.", app.files.len()));
        }
        app
    }

    fn push_history(&mut self, line: impl Into<String>) {
        if self.history.len() >= MAX_LINES {
            let drain_count = self.history.len().saturating_sub(MAX_LINES - 1);
            self.history.drain(0..drain_count);
        }
        self.history.push(line.into());
        self.clamp_scroll();
    }

    /// Split streamed output into history lines, keeping the unterminated tail.
    fn push_output(&mut self, text: &str) {
        for ch in text.chars() {
            match ch {
                '\n' => {
                    let line = std::mem::take(&mut self.partial);
                    self.push_history(line);
                }
                '\r' => {}
                other => self.partial.push(other),
            }
        }
    }

    fn flush_partial(&mut self) {
        if !self.partial.is_empty() {
            let line = std::mem::take(&mut self.partial);
            self.push_history(line);
        }
    }

    fn reset_output(&mut self) {
        self.history.clear();
        self.partial.clear();
        self.scroll_bottom();
    }

    fn set_view_lines(&mut self, lines: usize) {
        self.view_lines = lines.max(1);
        self.clamp_scroll();
    }

    fn scroll_up(&mut self, lines: usize) {
        let max_scroll = self.max_scroll();
        self.scroll_offset = (self.scroll_offset + lines).min(max_scroll);
    }

    fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    fn scroll_top(&mut self) {
        self.scroll_offset = self.max_scroll();
    }

    fn scroll_bottom(&mut self) {
        self.scroll_offset = 0;
    }

    fn max_scroll(&self) -> usize {
        self.history.len().saturating_sub(self.view_lines)
    }

    fn clamp_scroll(&mut self) {
        let max_scroll = self.max_scroll();
        if self.scroll_offset > max_scroll {
            self.scroll_offset = max_scroll;
        }
    }

    fn apply(&mut self, event: RunEvent) {
        self.progress.apply(&event);
        match event {
            RunEvent::Started { .. } => {
                self.reset_output();
                self.running = true;
                self.last_report = None;
            }
            RunEvent::Output(text) => self.push_output(&text),
            RunEvent::FileStarted { .. } | RunEvent::FileFinished { .. } => {}
            RunEvent::Finished(report) => {
                self.flush_partial();
                self.running = false;
                self.push_history(format_verdict(&report));
                if self.bell {
                    TerminalBell.notify(&report);
                }
                self.last_report = Some(report);
            }
        }
    }
}

pub fn run(options: Options) -> Result<(), RazorError> {
    let _guard = TerminalGuard::enter()?;
    let stdout = io::stdout();
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).map_err(term_err)?;

    let (mut runner, event_rx) = BatchRunner::new(options.config);
    let mut app = AppState::new(&options);

    loop {
        while let Ok(event) = event_rx.try_recv() {
            app.apply(event);
        }

        let size = terminal.size().map_err(term_err)?;
        let history_height = size.height.saturating_sub(8).max(3) as usize;
        let view_lines = history_height.saturating_sub(2).max(1);
        app.set_view_lines(view_lines);

        app.tick = app.tick.wrapping_add(1);

        terminal
            .draw(|frame| {
                let layout = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([
                        Constraint::Length(5),
                        Constraint::Min(3),
                        Constraint::Length(3),
                    ])
                    .split(frame.size());

                let header = render_header(&app, layout[0].width as usize);
                frame.render_widget(header, layout[0]);

                let history = render_history(&app, layout[1].height as usize);
                frame.render_widget(history, layout[1]);

                let input = Paragraph::new(app.input.as_str())
                    .block(Block::default().title("Command").borders(Borders::ALL))
                    .wrap(Wrap { trim: false });
                frame.render_widget(input, layout[2]);
                frame.set_cursor(layout[2].x + 1 + app.input.len() as u16, layout[2].y + 1);
            })
            .map_err(term_err)?;

        if event::poll(Duration::from_millis(50)).map_err(term_err)? {
            match event::read().map_err(term_err)? {
                Event::Paste(text) => handle_drop(&mut app, &runner, &text),
                Event::Key(key) if key.kind != KeyEventKind::Release => match key.code {
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        app.should_quit = true;
                    }
                    KeyCode::Char(ch) => {
                        app.input.push(ch);
                    }
                    KeyCode::Backspace => {
                        app.input.pop();
                    }
                    KeyCode::Enter => {
                        let line = app.input.trim().to_string();
                        app.input.clear();
                        if !line.is_empty() {
                            handle_line(&mut app, &mut runner, &line);
                        }
                    }
                    KeyCode::PageUp => {
                        let step = app.view_lines.saturating_sub(1).max(1);
                        app.scroll_up(step);
                    }
                    KeyCode::PageDown => {
                        let step = app.view_lines.saturating_sub(1).max(1);
                        app.scroll_down(step);
                    }
                    KeyCode::Up => app.scroll_up(1),
                    KeyCode::Down => app.scroll_down(1),
                    KeyCode::Home => app.scroll_top(),
                    KeyCode::End => app.scroll_bottom(),
                    KeyCode::Esc => {
                        app.should_quit = true;
                    }
                    _ => {}
                },
                _ => {}
            }
        }

        if app.should_quit {
            break;
        }
    }

    // Dropping the runner kills an in-flight invocation.
    drop(runner);
    Ok(())
}

/// Pasted text replaces the selection, like dropping files on a window.
fn handle_drop(app: &mut AppState, runner: &BatchRunner, text: &str) {
    if app.running {
        app.push_history("A batch is running; wait for it or 'stop' it first.");
        return;
    }
    match split_paths(text) {
        Ok(paths) if !paths.is_empty() => {
            replace_selection(app, runner, paths);
            app.push_history(format!("{} file(s) selected.", app.files.len()));
        }
        Ok(_) => {}
        Err(err) => app.push_history(format!("error: {err}")),
    }
}

/// A new selection starts from an empty log, same as a new run.
fn replace_selection(app: &mut AppState, runner: &BatchRunner, paths: Vec<PathBuf>) {
    runner.clear();
    app.reset_output();
    app.files = paths;
}

fn handle_line(app: &mut AppState, runner: &mut BatchRunner, line: &str) {
    app.push_history(format!(">> {line}"));
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    match command.to_ascii_lowercase().as_str() {
        "quit" | "exit" => {
            app.should_quit = true;
        }
        "help" => {
            app.push_history("Commands:");
            app.push_history("  add <paths...>   add files to the selection");
            app.push_history("  pick <dir>       select the images in a directory");
            app.push_history("  files            list the selection");
            app.push_history("  run              process the selection");
            app.push_history("  stop             kill the running file and skip the rest");
            app.push_history("  clear            empty the selection and the output");
            app.push_history("  quit");
            app.push_history("Pasting paths or picking a directory replaces the selection.");
        }
        "add" => match split_paths(rest) {
            Ok(paths) if !paths.is_empty() => {
                app.files.extend(paths);
                app.push_history(format!("{} file(s) selected.", app.files.len()));
            }
            Ok(_) => app.push_history("error: add needs at least one path"),
            Err(err) => app.push_history(format!("error: {err}")),
        },
        "pick" => {
            let dir = split_paths(rest)
                .ok()
                .and_then(|mut paths| paths.pop())
                .unwrap_or_else(|| PathBuf::from("."));
            if app.running {
                app.push_history("A batch is running; wait for it or 'stop' it first.");
                return;
            }
            match pick_images(&dir) {
                Ok(paths) => {
                    replace_selection(app, runner, paths);
                    app.push_history(format!(
                        "Picked {} image(s) from '{}'.",
                        app.files.len(),
                        dir.display()
                    ));
                }
                Err(err) => app.push_history(format!("error: {err}")),
            }
        }
        "files" => {
            if app.files.is_empty() {
                app.push_history("No files selected.");
            }
            let listing: Vec<String> = app
                .files
                .iter()
                .enumerate()
                .map(|(idx, path)| format!("  {}. {}", idx + 1, path.display()))
                .collect();
            for entry in listing {
                app.push_history(entry);
            }
        }
        "run" => match app.tool.clone() {
            Some(tool) => {
                match runner.run(&tool, &app.files) {
                    Ok(()) => {}
                    // The worker owns the output log, so this goes to history.
                    Err(RazorError::RunAlreadyActive) => {
                        app.push_history(ALREADY_RUNNING_LINE.trim_end())
                    }
                    Err(err) => debug!(err = %err, "batch not started"),
                }
            }
            None => app.push_history("Error: 'psd_ockham' not found. Restart with --tool <PATH>."),
        },
        "stop" => {
            if !runner.stop() {
                app.push_history("Nothing is running.");
            }
        }
        "clear" => {
            if app.running {
                app.push_history("A batch is running; 'stop' it first.");
                return;
            }
            runner.clear();
            app.files.clear();
            app.reset_output();
        }
        other => app.push_history(format!("error: unknown command '{other}'")),
    }
}

fn render_header(app: &AppState, width: usize) -> Paragraph<'static> {
    let status = match (&app.last_report, app.running) {
        (_, true) => "Processing...",
        (None, false) => "Idle",
        (Some(report), false) if report.all_succeeded() => "Done",
        (Some(report), false) if report.cancelled => "Stopped",
        (Some(_), false) => "Failed",
    };

    let selection = match app.files.len() {
        0 => "no files selected".to_string(),
        1 => file_name(&app.files[0]),
        n => format!("{n} files selected"),
    };

    let current = match &app.progress.current {
        Some(path) => format!(
            "file {} of {}: {}",
            app.progress.completed + 1,
            app.progress.total,
            file_name(path)
        ),
        None if app.progress.total > 0 => format!(
            "{}/{} done, {} failed",
            app.progress.completed, app.progress.total, app.progress.failed
        ),
        None => String::new(),
    };

    let bar_width = width.saturating_sub(30).clamp(10, 40);
    let progress_bar = render_progress_bar(app, bar_width);

    let text = vec![
        Line::from(vec![Span::raw("Status: "), Span::raw(status)]),
        Line::from(vec![Span::raw("Input:  "), Span::raw(selection)]),
        Line::from(vec![Span::raw(progress_bar), Span::raw(" "), Span::raw(current)]),
    ];

    Paragraph::new(text)
        .block(Block::default().title("psdrazor").borders(Borders::ALL))
        .wrap(Wrap { trim: true })
}

fn render_progress_bar(app: &AppState, width: usize) -> String {
    let width = width.max(10);
    let mut bar = String::with_capacity(width + 2);
    bar.push('[');

    if !app.running && app.progress.total == 0 {
        for _ in 0..width {
            bar.push(' ');
        }
        bar.push(']');
        return bar;
    }

    let ratio = app.progress.ratio();
    if ratio > 0.0 || !app.running {
        let filled = ((ratio * width as f64).round() as usize).min(width);
        for idx in 0..width {
            if idx < filled {
                bar.push('=');
            } else if idx == filled && filled < width && app.running {
                bar.push('>');
            } else {
                bar.push(' ');
            }
        }
        bar.push(']');
        return bar;
    }

    let pos = (app.tick as usize) % width;
    for idx in 0..width {
        if idx == pos {
            bar.push('>');
        } else if idx < pos {
            bar.push('=');
        } else {
            bar.push(' ');
        }
    }
    bar.push(']');
    bar
}

fn render_history(app: &AppState, height: usize) -> Paragraph<'static> {
    let max_lines = height.saturating_sub(2).max(1);
    let end = app.history.len().saturating_sub(app.scroll_offset);
    let mut lines: Vec<Line> = Vec::with_capacity(max_lines + 1);
    let show_partial = app.scroll_offset == 0 && !app.partial.is_empty();
    let budget = if show_partial { max_lines - 1 } else { max_lines };
    let start = end.saturating_sub(budget);

    lines.extend(app.history[start..end].iter().map(|line| Line::from(line.clone())));
    if show_partial {
        lines.push(Line::from(app.partial.clone()));
    }

    Paragraph::new(lines)
        .block(Block::default().title("Output").borders(Borders::ALL))
        .wrap(Wrap { trim: false })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> AppState {
        AppState::new(&Options {
            tool: Ok(PathBuf::from("/opt/psd_ockham")),
            inputs: Vec::new(),
            config: RunnerConfig::default(),
            bell: false,
        })
    }

    #[test]
    fn output_chunks_become_lines() {
        let mut app = app();
        app.apply(RunEvent::Started { total: 1 });
        app.apply(RunEvent::Output("par".to_string()));
        app.apply(RunEvent::Output("tial\r\nnext".to_string()));

        assert_eq!(app.history, vec!["partial".to_string()]);
        assert_eq!(app.partial, "next");

        app.apply(RunEvent::Finished(BatchReport::default()));
        assert_eq!(app.history[1], "next");
        assert!(!app.running);
    }

    #[test]
    fn history_is_bounded() {
        let mut app = app();
        for idx in 0..(MAX_LINES + 10) {
            app.push_history(format!("line {idx}"));
        }
        assert_eq!(app.history.len(), MAX_LINES);
        assert_eq!(app.history.last().map(String::as_str), Some("line 2009"));
    }

    #[test]
    fn paste_replaces_selection() {
        let (runner, _rx) = BatchRunner::new(RunnerConfig::default());
        let mut app = app();
        app.files = vec![PathBuf::from("/old.psd")];

        handle_drop(&mut app, &runner, "'/new one.psd' /two.psd");

        assert_eq!(
            app.files,
            vec![PathBuf::from("/new one.psd"), PathBuf::from("/two.psd")]
        );
    }

    #[test]
    fn pick_replaces_selection_with_directory_images() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["b.PNG", "a.psd", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").expect("write");
        }
        let (mut runner, _rx) = BatchRunner::new(RunnerConfig::default());
        let mut app = app();
        app.files = vec![PathBuf::from("/old.psd")];

        let command = format!("pick {}", dir.path().display());
        handle_line(&mut app, &mut runner, &command);

        assert_eq!(
            app.files,
            vec![dir.path().join("a.psd"), dir.path().join("b.PNG")]
        );
        assert!(app
            .history
            .last()
            .is_some_and(|line| line.starts_with("Picked 2 image(s)")));
    }

    #[test]
    fn run_without_tool_reports_error() {
        let (mut runner, _rx) = BatchRunner::new(RunnerConfig::default());
        let mut app = app();
        app.tool = None;

        handle_line(&mut app, &mut runner, "run");

        assert!(app
            .history
            .last()
            .is_some_and(|line| line.contains("not found")));
        assert!(!runner.is_running());
    }
}
