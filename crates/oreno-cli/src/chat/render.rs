use std::io::{self, Write};

use oreno_core::{TurnKind, TurnRecord};

use super::view::ViewUpdate;

pub(super) const PLACEHOLDER: &str = "Where should we begin? Ask me anything!";

fn header(kind: TurnKind) -> &'static str {
    match kind {
        TurnKind::Prompt => "you ›",
        TurnKind::MessageDelta => "oreno ›",
        TurnKind::ReasoningDelta => "reasoning ›",
        TurnKind::ToolCall => "tool use ›",
        TurnKind::Error => "error ›",
    }
}

/// Plain-text transcript writer. Consecutive deltas of the same kind are
/// written inline so a streamed answer reads as one block.
pub(super) struct Printer<W: Write> {
    out: W,
    last: Option<TurnKind>,
}

impl<W: Write> Printer<W> {
    pub(super) fn new(out: W) -> Self {
        Self { out, last: None }
    }

    pub(super) fn banner(&mut self, model: &str, tools: &str) -> io::Result<()> {
        writeln!(self.out, "oreno · {model}")?;
        if !tools.is_empty() {
            writeln!(self.out, "tools: {tools}")?;
        }
        writeln!(self.out, "/stop cancels the current answer, /quit exits. End a line with \\ to continue it.")?;
        writeln!(self.out)?;
        writeln!(self.out, "{PLACEHOLDER}")?;
        self.out.flush()
    }

    pub(super) fn render(&mut self, update: &ViewUpdate) -> io::Result<()> {
        match update {
            ViewUpdate::Truncated { len } => {
                self.break_line()?;
                writeln!(self.out, "-- transcript reset to {len} entries --")?;
                self.last = None;
            }
            ViewUpdate::Appended { record, .. } => self.append(record)?,
            ViewUpdate::Changed { index, record } => {
                self.break_line()?;
                writeln!(self.out, "-- entry {index} changed --")?;
                self.last = None;
                self.append(record)?;
            }
        }
        Ok(())
    }

    pub(super) fn notice(&mut self, message: &str) -> io::Result<()> {
        self.break_line()?;
        writeln!(self.out, "({message})")?;
        self.last = None;
        self.out.flush()
    }

    /// Session token totals, printed when a turn ends.
    pub(super) fn usage(&mut self, input: u32, output: u32) -> io::Result<()> {
        self.notice(&format!("tokens: {input} in / {output} out"))
    }

    pub(super) fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub(super) fn finish(&mut self) -> io::Result<()> {
        self.break_line()?;
        self.out.flush()
    }

    fn append(&mut self, record: &TurnRecord) -> io::Result<()> {
        let kind = record.kind();
        let streaming = matches!(kind, TurnKind::MessageDelta | TurnKind::ReasoningDelta);
        if !(streaming && self.last == Some(kind)) {
            if self.last.is_some() {
                writeln!(self.out)?;
                writeln!(self.out)?;
            }
            write!(self.out, "{} ", header(kind))?;
        }
        write!(self.out, "{}", record.text())?;
        self.last = Some(kind);
        Ok(())
    }

    fn break_line(&mut self) -> io::Result<()> {
        if self.last.is_some() {
            writeln!(self.out)?;
        }
        Ok(())
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}
