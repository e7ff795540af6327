//! Line-oriented output shared by the view, the overlay surface and the shell.

use std::fmt::Display;
use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use owo_colors::OwoColorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Dim,
    Success,
    Error,
    Heading,
}

/// Cheaply cloneable handle to one output stream.
#[derive(Clone)]
pub struct Console {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
    color: bool,
}

impl Console {
    pub fn new(out: Box<dyn Write + Send>, color: bool) -> Self {
        Self {
            out: Arc::new(Mutex::new(out)),
            color,
        }
    }

    pub fn stdout(color: bool) -> Self {
        Self::new(Box::new(std::io::stdout()), color)
    }

    pub fn line(&self, text: impl Display) {
        self.styled(Tone::Plain, text);
    }

    pub fn styled(&self, tone: Tone, text: impl Display) {
        let text = self.paint(tone, text.to_string());
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        // A closed stdout leaves nothing useful to report to.
        let _ = writeln!(out, "{text}");
        let _ = out.flush();
    }

    fn paint(&self, tone: Tone, text: String) -> String {
        if !self.color {
            return text;
        }
        match tone {
            Tone::Plain => text,
            Tone::Dim => text.dimmed().to_string(),
            Tone::Success => text.green().to_string(),
            Tone::Error => text.red().bold().to_string(),
            Tone::Heading => text.bold().to_string(),
        }
    }
}

/// In-memory sink for tests.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct Captured(Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
impl Captured {
    pub(crate) fn console(&self) -> Console {
        Console::new(Box::new(self.clone()), false)
    }

    pub(crate) fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
