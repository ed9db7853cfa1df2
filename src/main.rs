/**
 * Take adaptive multiple-choice quizzes from the command line.
 */
#[macro_use]
mod ui;
mod common;
mod persistence;
mod quiz;
mod repetition;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Command;

use chrono::Local;
use colored::*;
use structopt::StructOpt;

use common::{QuizError, Result};
use quiz::Quiz;
use ui::CmdUI;


fn main() {
    pretty_env_logger::init();
    let options = parse_options();

    if options.no_color || unsafe { libc::isatty(libc::STDOUT_FILENO) } == 0 {
        colored::control::set_override(false);
    }

    let directory = options.directory;
    let result = match options.cmd {
        common::Command::Take(options) => {
            main_take(directory.as_ref(), options)
        },
        common::Command::Count(options) => {
            main_count(directory.as_ref(), options)
        },
        common::Command::Results(options) => {
            main_results(directory.as_ref(), options)
        },
        common::Command::History(options) => {
            main_history(directory.as_ref(), options)
        },
        common::Command::Search(options) => {
            main_search(directory.as_ref(), options)
        },
        common::Command::Import(options) => {
            main_import(directory.as_ref(), options)
        },
        common::Command::Edit(options) => {
            main_edit(directory.as_ref(), options)
        },
        common::Command::Ls => {
            main_ls(directory.as_ref())
        },
    };

    if let Err(e) = result {
        if !common::is_broken_pipe(&e) {
            eprintln!("{}: {}", "Error".red(), e);
            ::std::process::exit(2);
        }
    }
}


/// The main function for the `take` subcommand.
fn main_take(directory: Option<&PathBuf>, options: common::TakeOptions) -> Result<()> {
    let path = persistence::resolve_bank(directory, &options.name)?;
    let quiz = persistence::load_bank(&path)?;
    let mut record = persistence::load_user_record(&path, &options.user)?;

    let mut ui = CmdUI::new();
    match quiz.take(&mut ui, &record.stats, &options)? {
        Some(result) => {
            ui.results(&result)?;
            if !options.no_save {
                record.record(&result);
                persistence::save_user_record(&path, &options.user, &record)?;
            }
        },
        None => {
            ui.status("\nQuiz abandoned; nothing was recorded.")?;
        },
    }
    Ok(())
}


/// The main function for the `count` subcommand.
fn main_count(directory: Option<&PathBuf>, options: common::CountOptions) -> Result<()> {
    let path = persistence::resolve_bank(directory, &options.name)?;
    let quiz = persistence::load_bank(&path)?;
    if options.list_categories {
        list_categories(&quiz)?;
    } else {
        let filtered = quiz.filter_questions(&options.filter_opts);
        my_println!("{}", filtered.len())?;
    }
    Ok(())
}


/// Print each category with its question count.
fn list_categories(quiz: &Quiz) -> Result<()> {
    let mut categories = HashMap::<&str, u32>::new();
    for question in quiz.questions.iter() {
        if let Some(n) = categories.get(question.category.as_str()) {
            categories.insert(question.category.as_str(), n + 1);
        } else {
            categories.insert(question.category.as_str(), 1);
        }
    }

    if categories.len() == 0 {
        my_println!("No categories found.")?;
    } else {
        my_println!("Available categories:")?;

        let mut categories_in_order: Vec<(&str, u32)> = categories.into_iter().collect();
        categories_in_order.sort();
        for (category, count) in categories_in_order.iter() {
            my_println!("  {} ({})", category, count)?;
        }
    }
    Ok(())
}


/// The main function for the `results` subcommand.
fn main_results(directory: Option<&PathBuf>, options: common::ResultsOptions) -> Result<()> {
    let path = persistence::resolve_bank(directory, &options.name)?;
    let quiz = persistence::load_bank(&path)?;
    let record = persistence::load_user_record(&path, &options.user)?;

    if record.stats.len() == 0 {
        my_println!("No results have been recorded for this bank.")?;
        return Ok(());
    }

    let mut aggregated: Vec<CmpQuestionResult> = Vec::new();
    for (id, stats) in record.stats.iter() {
        let text = match quiz.question_by_id(*id) {
            Some(question) => format!("[{}] {}", id, question.text),
            None => format!("[{}] (no longer in the bank)", id),
        };
        aggregated.push((100.0 * stats.accuracy(), stats.attempts(), text));
    }

    if options.sort == "best" {
        aggregated.sort_by(cmp_results_best);
    } else if options.sort == "worst" {
        aggregated.sort_by(cmp_results_worst);
    } else if options.sort == "most" {
        aggregated.sort_by(cmp_results_most);
    } else if options.sort == "least" {
        aggregated.sort_by(cmp_results_least);
    } else {
    }

    if let Some(n) = options.num_to_show {
        aggregated.truncate(n);
    }

    for (score, attempts, question) in aggregated.iter() {
        let first_prefix = format!("{:>5.1}%  of {:>2}   ", score, attempts);
        ui::prettyprint_colored(&question, &first_prefix, None, Some(Color::Cyan))?;
    }

    Ok(())
}


/// The main function for the `history` subcommand.
fn main_history(directory: Option<&PathBuf>, options: common::HistoryOptions) -> Result<()> {
    let path = persistence::resolve_bank(directory, &options.name)?;
    let record = persistence::load_user_record(&path, &options.user)?;

    if record.sittings.len() == 0 {
        my_println!("No quizzes have been taken from this bank.")?;
        return Ok(());
    }

    let num_to_show = options.num_to_show.unwrap_or(record.sittings.len());
    for sitting in record.sittings.iter().rev().take(num_to_show) {
        let when = sitting.taken_at.with_timezone(&Local).format("%Y-%m-%d %H:%M");
        my_println!(
            "{}  {}  {}   {}/{} correct",
            when,
            format!("{:>5.1}%", sitting.score).cyan(),
            sitting.grade,
            sitting.total_correct,
            sitting.total
        )?;
    }
    Ok(())
}


/// The main function for the `search` subcommand.
fn main_search(directory: Option<&PathBuf>, options: common::SearchOptions) -> Result<()> {
    let path = persistence::resolve_bank(directory, &options.name)?;
    let quiz = persistence::load_bank(&path)?;

    let mut total = 0;
    for question in quiz.questions.iter() {
        if question.matches(&options.term) {
            let prefix = format!("[{}] ", question.id);
            ui::prettyprint_colored(&question.text, &prefix, None, Some(Color::Cyan))?;
            total += 1;
        }
    }

    if total == 0 {
        my_println!("No questions matched.")?;
    }
    Ok(())
}


/// The main function for the `import` subcommand.
fn main_import(directory: Option<&PathBuf>, options: common::ImportOptions) -> Result<()> {
    let imported = persistence::read_bank_file(&options.file)?;
    let path = persistence::resolve_or_create_bank(directory, &options.name)?;

    let mut questions = if path.exists() {
        persistence::read_bank_file(&path)?
    } else {
        Vec::new()
    };

    for question in imported.iter() {
        if questions.iter().any(|q| q.id == question.id) {
            return Err(QuizError::DuplicateId(question.id));
        }
    }

    let count = imported.len();
    questions.extend(imported);
    persistence::write_bank(&path, &questions)?;

    if count == 1 {
        my_println!("Imported 1 question into {}.", path.display())?;
    } else {
        my_println!("Imported {} questions into {}.", count, path.display())?;
    }
    Ok(())
}


/// The main function for the `edit` subcommand.
fn main_edit(directory: Option<&PathBuf>, options: common::EditOptions) -> Result<()> {
    let path = persistence::resolve_or_create_bank(directory, &options.name)?;

    loop {
        launch_editor(&path)?;

        if path.exists() {
            // Parse it again to make sure it's okay.
            if let Err(e) = persistence::read_bank_file(&path) {
                eprintln!("{}: {}", "Error".red(), e);
                if !confirm("Keep the file anyway? ") {
                    continue;
                }
            }
        }
        break;
    }
    Ok(())
}


/// Spawn an editor in a child process.
fn launch_editor(path: &PathBuf) -> Result<()> {
    let editor = ::std::env::var("EDITOR").unwrap_or(String::from("nano"));
    let mut cmd = Command::new(&editor);
    cmd.arg(&path);

    let mut child = cmd.spawn().or(Err(QuizError::CannotOpenEditor))?;
    child.wait().or(Err(QuizError::CannotOpenEditor))?;
    Ok(())
}


/// The main function for the `ls` subcommand.
fn main_ls(directory: Option<&PathBuf>) -> Result<()> {
    let dirpath = persistence::bank_dir_path(directory)?;

    let mut names = Vec::new();
    if let Ok(iter) = dirpath.read_dir() {
        for entry in iter {
            if let Ok(entry) = entry {
                let path = entry.path();
                if path.extension().map(|ext| ext == "csv").unwrap_or(false) {
                    if let Some(stem) = path.file_stem() {
                        names.push(String::from(stem.to_string_lossy()));
                    }
                }
            }
        }
    }

    if names.len() > 0 {
        names.sort();
        my_println!("Available banks:")?;
        for name in names.iter() {
            my_println!("  {}", name)?;
        }
    } else {
        my_println!("No banks found.")?;
    }
    Ok(())
}


/// Parse command-line arguments.
fn parse_options() -> common::Options {
    let options = common::Options::from_args();

    if let common::Command::Results(options) = &options.cmd {
        let s = &options.sort;
        if s != "most" && s != "least" && s != "best" && s != "worst" {
            eprintln!("{}: unknown value `{}` for --sort.", "Error".red(), s);
            ::std::process::exit(2);
        }
    }

    options
}


/// Prompt the user with a yes-no question and return `true` if they enter yes.
fn confirm(message: &str) -> bool {
    match ui::prompt(message) {
        Ok(Some(response)) => {
            response.trim_start().to_lowercase().starts_with("y")
        },
        _ => false
    }
}


/// Alias for the rows of the results table: accuracy, attempts, label.
type CmpQuestionResult = (f64, u32, String);


/// Sort the results table so that the highest accuracies come first.
fn cmp_results_best(a: &CmpQuestionResult, b: &CmpQuestionResult) -> Ordering {
    if a.0 < b.0 {
        return Ordering::Greater;
    } else if a.0 > b.0 {
        return Ordering::Less;
    } else {
        return cmp_results_most(a, b);
    }
}


/// Sort the results table so that the lowest accuracies come first.
fn cmp_results_worst(a: &CmpQuestionResult, b: &CmpQuestionResult) -> Ordering {
    return cmp_results_best(a, b).reverse();
}


/// Sort the results table so that the most-attempted questions come first.
fn cmp_results_most(a: &CmpQuestionResult, b: &CmpQuestionResult) -> Ordering {
    if a.1 < b.1 {
        return Ordering::Greater;
    } else if a.1 > b.1 {
        return Ordering::Less;
    } else {
        return Ordering::Equal;
    }
}


/// Sort the results table so that the least-attempted questions come first.
fn cmp_results_least(a: &CmpQuestionResult, b: &CmpQuestionResult) -> Ordering {
    return cmp_results_most(a, b).reverse();
}
