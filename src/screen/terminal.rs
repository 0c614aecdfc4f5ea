use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::Paragraph,
    Terminal,
};
use ratatui_image::picker::Picker;
use ratatui_image::protocol::StatefulProtocol;
use ratatui_image::StatefulImage;
use std::io::{self, Stdout};
use std::time::Duration;

use super::{viewer, Hud, Key, Screen};
use crate::video::Frame;

/// Full-screen video in the terminal with a one-line status bar.
/// Raw mode and the alternate screen are restored on drop.
pub struct TerminalScreen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    picker: Picker,
    protocol: Option<StatefulProtocol>,
    title: String,
}

impl TerminalScreen {
    pub fn open(title: &str, force_protocol: Option<&str>) -> Result<Self> {
        // Graphics detection talks to the terminal, so it goes first
        let picker = viewer::create_picker(force_protocol);

        enable_raw_mode().context("failed to enable raw mode")?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            picker,
            protocol: None,
            title: title.to_string(),
        })
    }
}

impl Screen for TerminalScreen {
    fn render(&mut self, frame: &Frame, hud: &Hud) -> Result<()> {
        self.protocol = Some(viewer::frame_protocol(&mut self.picker, frame));

        let Self {
            terminal,
            protocol,
            title,
            ..
        } = self;
        let status = format!("{}  │  {}", title, hud.status_line());
        let status_style = if hud.recording {
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        terminal.draw(|f| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Min(1),    // Frame area
                    Constraint::Length(1), // Status bar
                ])
                .split(f.area());

            // No border around the image: borders make ratatui clear the area,
            // which flickers with Sixel/Kitty
            if let Some(protocol) = protocol.as_mut() {
                let image_widget = StatefulImage::default();
                f.render_stateful_widget(image_widget, chunks[0], protocol);
            }
            f.render_widget(Paragraph::new(status).style(status_style), chunks[1]);
        })?;
        Ok(())
    }

    fn poll_key(&mut self, timeout: Duration) -> Result<Option<Key>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                // Raw mode swallows SIGINT; treat Ctrl+C like Esc
                if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c')
                {
                    return Ok(Some(Key::Esc));
                }
                Ok(Key::from_code(key.code))
            }
            _ => Ok(None),
        }
    }
}

impl Drop for TerminalScreen {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}
