//! Operator prompts
//!
//! Reads answers line by line. Generic over the reader and writer so the
//! command flows can be driven from a script in tests.

use anyhow::{Result, bail};
use std::io::{self, BufRead, Write};

pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl Prompter<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_answer(&mut self) -> Result<String> {
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            bail!("Input closed before an answer was given");
        }
        Ok(line.trim().to_string())
    }

    /// Ask a question; an empty answer yields `default` (or an empty string)
    pub fn ask(&mut self, question: &str, default: Option<&str>) -> Result<String> {
        match default {
            Some(d) if !d.is_empty() => write!(self.output, "{} [{}]: ", question, d)?,
            _ => write!(self.output, "{}: ", question)?,
        }
        let answer = self.read_answer()?;
        if answer.is_empty() {
            Ok(default.unwrap_or_default().to_string())
        } else {
            Ok(answer)
        }
    }

    /// Ask until a non-empty answer is given
    pub fn ask_required(&mut self, question: &str, default: Option<&str>) -> Result<String> {
        loop {
            let answer = self.ask(question, default)?;
            if !answer.is_empty() {
                return Ok(answer);
            }
            writeln!(self.output, "  A value is required.")?;
        }
    }

    /// Ask a question where an empty answer means "not set"
    pub fn ask_optional(&mut self, question: &str) -> Result<Option<String>> {
        let answer = self.ask(question, None)?;
        Ok(if answer.is_empty() { None } else { Some(answer) })
    }

    /// Ask a yes/no question
    pub fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        let hint = if default { "Y/n" } else { "y/N" };
        loop {
            write!(self.output, "{} [{}]: ", question, hint)?;
            let answer = self.read_answer()?.to_lowercase();
            match answer.as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => writeln!(self.output, "  Please answer y or n.")?,
            }
        }
    }

    /// Ask for a number until one parses
    pub fn ask_number<T: std::str::FromStr + ToString>(
        &mut self,
        question: &str,
        default: T,
    ) -> Result<T> {
        let default = default.to_string();
        loop {
            let answer = self.ask(question, Some(&default))?;
            match answer.parse::<T>() {
                Ok(value) => return Ok(value),
                Err(_) => writeln!(self.output, "  '{}' is not a number.", answer)?,
            }
        }
    }

    pub fn say(&mut self, line: &str) -> Result<()> {
        writeln!(self.output, "{}", line)?;
        Ok(())
    }
}
