/**
 * The command-line user interface: output macros, the line-input prompt, and
 * the `CmdUI` struct that presents questions and results.
 */
use colored::*;
use rustyline::error::ReadlineError;

use super::common::{QuizError, Result};
use super::quiz::{QuizResult, LETTERS};


#[macro_export]
macro_rules! my_println {
    ($($arg:tt)*) => ({
        use ::std::io::Write;
        writeln!(::std::io::stdout(), $($arg)*).map_err($crate::common::QuizError::Io)
    });
}

#[macro_export]
macro_rules! my_print {
    ($($arg:tt)*) => ({
        use ::std::io::Write;
        write!(::std::io::stdout(), $($arg)*).map_err($crate::common::QuizError::Io)
    });
}


/// Display a prompt and read a line from standard input continually until the
/// user enters a line with at least one non-whitespace character. If the user
/// presses Ctrl+D then `Ok(None)` is returned. If the user presses Ctrl+C
/// then `Err(QuizError::ReadlineInterrupted)` is returned. Otherwise
/// `Ok(Some(line))` is returned, with surrounding whitespace removed.
pub fn prompt(message: &str) -> Result<Option<String>> {
    let mut rl = rustyline::Editor::<()>::new();
    loop {
        let result = rl.readline(message);
        match result {
            Ok(response) => {
                let response = response.trim();
                if response.len() > 0 {
                    return Ok(Some(response.to_string()));
                }
            }
            // Return immediately if the user hits Ctrl+D or Ctrl+C.
            Err(ReadlineError::Interrupted) => {
                return Err(QuizError::ReadlineInterrupted);
            }
            Err(ReadlineError::Eof) => {
                return Ok(None);
            }
            _ => {}
        }
    }
}


/// Print `message` to standard output, breaking lines according to the
/// current width of the terminal. Prepend `prefix` to the first line and
/// indent all subsequent lines by its length.
pub fn prettyprint(message: &str, prefix: &str) -> Result<()> {
    prettyprint_colored(message, prefix, None, None)
}


pub fn prettyprint_colored(
    message: &str,
    prefix: &str,
    message_color: Option<Color>,
    prefix_color: Option<Color>,
) -> Result<()> {
    let width = textwrap::termwidth() - prefix.len();
    let mut lines = textwrap::wrap_iter(message, width);

    if let Some(first_line) = lines.next() {
        let colored_prefix = color_optional(&prefix, prefix_color);
        let colored_line = color_optional(&first_line, message_color);
        my_println!("{}{}", colored_prefix, colored_line)?;
    }

    let indent = " ".repeat(prefix.len());
    for line in lines {
        let colored_line = color_optional(&line, message_color);
        my_println!("{}{}", indent, colored_line)?;
    }
    Ok(())
}


fn color_optional(text: &str, color: Option<Color>) -> ColoredString {
    if let Some(color) = color {
        text.color(color)
    } else {
        text.normal()
    }
}


pub struct CmdUI {
    number: usize,
    total: usize,
}


impl CmdUI {
    pub fn new() -> Self {
        Self { number: 0, total: 0 }
    }

    /// Start a quiz of `total` questions.
    pub fn begin(&mut self, total: usize) {
        self.number = 0;
        self.total = total;
    }

    pub fn next(&mut self) {
        self.number += 1;
    }

    pub fn text(&mut self, text: &str) -> Result<()> {
        my_print!("\n")?;
        let prefix = format!("  ({}/{}) ", self.number, self.total);
        prettyprint_colored(&text, &prefix, None, Some(Color::Cyan))?;
        my_print!("\n")
    }

    /// Show the question's formula as plain text. No rendering is attempted.
    pub fn formula(&mut self, formula: &str) -> Result<()> {
        prettyprint_colored(
            &format!("Use this formula: {}", formula),
            "  ",
            Some(Color::BrightBlue),
            None,
        )?;
        my_print!("\n")
    }

    /// Show the answer alternatives, lettered in authored order.
    pub fn choices(&mut self, choices: &[String]) -> Result<()> {
        for (letter, choice) in LETTERS.chars().zip(choices.iter()) {
            let prefix = format!("     ({}) ", letter);
            prettyprint(choice, &prefix)?;
        }
        my_print!("\n")
    }

    pub fn prompt(&mut self) -> Result<Option<String>> {
        prompt("> ")
    }

    pub fn bad_choice(&mut self) -> Result<()> {
        my_println!("Please enter a letter.")
    }

    pub fn correct(&mut self) -> Result<()> {
        prettyprint(&format!("{}", "Correct!".green()), "")
    }

    pub fn incorrect(&mut self, correction: &str) -> Result<()> {
        let message = format!(
            "{} The correct answer was {}.",
            "Incorrect.".red(),
            correction.green(),
        );
        prettyprint(&message, "")
    }

    pub fn status(&mut self, text: &str) -> Result<()> {
        my_println!("{}", text)
    }

    pub fn results(&mut self, results: &QuizResult) -> Result<()> {
        if results.total > 0 {
            let score_as_str = format!("{:.1}%", results.score);

            my_print!("\n\n")?;
            my_print!("Score: ")?;
            my_print!("{}", score_as_str.cyan())?;
            my_print!(" out of ")?;
            my_print!("{}", format!("{}", results.total).cyan())?;
            if results.total == 1 {
                my_println!(" question")?;
            } else {
                my_println!(" questions")?;
            }
            my_print!("  {}", format!("{}", results.total_correct).green())?;
            my_print!(" correct\n")?;
            my_print!("  {}", format!("{}", results.total_incorrect).red())?;
            my_print!(" incorrect\n")?;
            my_print!("Grade: ")?;
            my_println!("{}", format!("{}", results.grade).cyan())?;
        }
        Ok(())
    }
}
