//! Interactive yes/no confirmations.

use std::io::{self, BufRead, Cursor, Stdin, Stdout, Write};

use crate::error::Result;

/// Source of operator confirmations.
pub trait Confirm {
    /// Ask `message` and return whether the operator agreed.
    fn confirm(&mut self, message: &str) -> Result<bool>;
}

/// Line-by-line operator input.
///
/// Implementors hand out one line per call and leave the rest unread, so
/// several readers can take turns on the same input.
pub trait LineInput {
    /// Append the next line, newline included, to `buf`. Returns 0 at end of
    /// input.
    fn next_line(&mut self, buf: &mut String) -> io::Result<usize>;
}

/// Reads through the process-wide stdin buffer.
impl LineInput for Stdin {
    fn next_line(&mut self, buf: &mut String) -> io::Result<usize> {
        Stdin::read_line(self, buf)
    }
}

impl<T: AsRef<[u8]>> LineInput for Cursor<T> {
    fn next_line(&mut self, buf: &mut String) -> io::Result<usize> {
        BufRead::read_line(self, buf)
    }
}

impl<I: LineInput + ?Sized> LineInput for &mut I {
    fn next_line(&mut self, buf: &mut String) -> io::Result<usize> {
        (**self).next_line(buf)
    }
}

/// Console prompt reading answers line by line.
///
/// Only `y` (any case, surrounding whitespace ignored) counts as agreement.
pub struct ConsolePrompt<R, W> {
    input: R,
    output: W,
}

impl ConsolePrompt<Stdin, Stdout> {
    /// Prompt on the process stdin/stdout.
    pub fn stdio() -> Self {
        Self::new(io::stdin(), io::stdout())
    }
}

impl<R: LineInput, W: Write> ConsolePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

impl<R: LineInput, W: Write> Confirm for ConsolePrompt<R, W> {
    fn confirm(&mut self, message: &str) -> Result<bool> {
        write!(self.output, "{} (y = yes, n = no): ", message)?;
        self.output.flush()?;

        let mut answer = String::new();
        self.input.next_line(&mut answer)?;
        Ok(is_yes(&answer))
    }
}

fn is_yes(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}
