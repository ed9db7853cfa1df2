/**
 * Definitions shared by the rest of the crate: the `QuizError` type, the
 * crate-wide `Result` alias, and the structs that hold command-line
 * arguments.
 */
use std::error;
use std::fmt;
use std::io;
use std::path::PathBuf;

use structopt::StructOpt;


pub type Result<T> = ::std::result::Result<T, QuizError>;

#[derive(Debug)]
pub enum QuizError {
    /// For when the user requests a question bank that does not exist.
    BankNotFound(String),
    /// For CSV errors while reading or writing a bank.
    Csv(csv::Error),
    /// For JSON errors in the user record file.
    Json(serde_json::Error),
    /// For rows that parse as CSV but do not describe a valid question.
    BadQuestion { path: PathBuf, line: u64, message: String },
    CannotMakeAppDir,
    CannotOpenEditor,
    CannotWriteToFile(PathBuf),
    /// For when an imported question collides with an id already in the bank.
    DuplicateId(i64),
    Io(io::Error),
    ReadlineInterrupted,
    EmptyQuiz,
}


impl fmt::Display for QuizError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            QuizError::BankNotFound(ref name) => {
                write!(f, "could not find a question bank named '{}'", name)
            },
            QuizError::Csv(ref err) => {
                write!(f, "could not read question bank ({})", err)
            },
            QuizError::Json(ref err) => {
                write!(f, "could not parse user record ({})", err)
            },
            QuizError::BadQuestion { ref path, line, ref message } => {
                write!(
                    f,
                    "bad question on line {} of '{}' ({})",
                    line,
                    path.to_string_lossy(),
                    message
                )
            },
            QuizError::CannotMakeAppDir => {
                write!(f, "unable to create application directory")
            },
            QuizError::CannotOpenEditor => {
                write!(f, "unable to open text editor")
            },
            QuizError::CannotWriteToFile(ref path) => {
                write!(f, "cannot write to file '{}'", path.to_string_lossy())
            },
            QuizError::DuplicateId(id) => {
                write!(f, "question id {} already exists in the bank", id)
            },
            QuizError::Io(ref err) => {
                write!(f, "IO error ({})", err)
            },
            QuizError::EmptyQuiz => {
                write!(f, "no questions to ask")
            },
            QuizError::ReadlineInterrupted => {
                Ok(())
            },
        }
    }
}


impl error::Error for QuizError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            QuizError::Csv(ref err) => Some(err),
            QuizError::Json(ref err) => Some(err),
            QuizError::Io(ref err) => Some(err),
            _ => None,
        }
    }
}


/// Returns true if the error is due to a broken pipe, e.g. from piping output
/// into `head`. Broken pipes are not reported to the user.
pub fn is_broken_pipe(e: &QuizError) -> bool {
    if let QuizError::Io(e) = e {
        if let io::ErrorKind::BrokenPipe = e.kind() {
            return true;
        }
    }
    false
}


/// Holds the command-line configuration for the application.
#[derive(StructOpt)]
#[structopt(name = "cram", about = "Take adaptive multiple-choice quizzes from the command line.")]
pub struct Options {
    /// Look for question banks in a particular directory.
    #[structopt(short = "d", long = "directory")]
    pub directory: Option<PathBuf>,
    /// Do not emit colorized output.
    #[structopt(long = "no-color")]
    pub no_color: bool,
    #[structopt(subcommand)]
    pub cmd: Command,
}

#[derive(StructOpt)]
pub enum Command {
    /// Take a quiz.
    #[structopt(name = "take")]
    Take(TakeOptions),
    /// Count questions or categories.
    #[structopt(name = "count")]
    Count(CountOptions),
    /// Report per-question results of previous attempts.
    #[structopt(name = "results")]
    Results(ResultsOptions),
    /// List finished quizzes, newest first.
    #[structopt(name = "history")]
    History(HistoryOptions),
    /// Search questions for a keyword.
    #[structopt(name = "search")]
    Search(SearchOptions),
    /// Import questions from a CSV file into a bank.
    #[structopt(name = "import")]
    Import(ImportOptions),
    /// Edit a question bank in $EDITOR.
    #[structopt(name = "edit")]
    Edit(EditOptions),
    /// List available question banks.
    #[structopt(name = "ls")]
    Ls,
}

#[derive(StructOpt)]
pub struct TakeOptions {
    /// Name of the question bank to draw from.
    #[structopt(default_value = "main")]
    pub name: String,
    /// User to track results for.
    #[structopt(short = "u", long = "user", default_value = "default")]
    pub user: String,
    /// Ask the questions sorted by question id instead of shuffled.
    #[structopt(long = "in-order")]
    pub in_order: bool,
    /// Limit the total number of questions.
    #[structopt(short = "n", default_value = "20")]
    pub num_to_ask: usize,
    /// Do not record the results of this quiz.
    #[structopt(long = "no-save")]
    pub no_save: bool,
    #[structopt(flatten)]
    pub filter_opts: FilterOptions,
}

#[derive(StructOpt)]
pub struct CountOptions {
    /// Name of the question bank to count.
    #[structopt(default_value = "main")]
    pub name: String,
    /// List categories instead of counting questions.
    #[structopt(long = "list-categories")]
    pub list_categories: bool,
    #[structopt(flatten)]
    pub filter_opts: FilterOptions,
}

/// These filtering options are shared between the `take` and `count` subcommands.
#[derive(StructOpt)]
pub struct FilterOptions {
    /// Exclude questions in the given category.
    #[structopt(long = "exclude")]
    pub exclude: Vec<String>,
    /// Only include questions in the given category.
    #[structopt(long = "category")]
    pub categories: Vec<String>,
}

#[derive(StructOpt)]
pub struct ResultsOptions {
    /// The name of the question bank for which to fetch the results.
    #[structopt(default_value = "main")]
    pub name: String,
    /// User whose results to show.
    #[structopt(short = "u", long = "user", default_value = "default")]
    pub user: String,
    /// Only show the first `n` results.
    #[structopt(short = "n")]
    pub num_to_show: Option<usize>,
    /// One of 'best', 'worst', 'most' or 'least'. Defaults to 'best'.
    #[structopt(short = "s", long = "sort", default_value = "best")]
    pub sort: String,
}

#[derive(StructOpt)]
pub struct HistoryOptions {
    /// The name of the question bank whose history to show.
    #[structopt(default_value = "main")]
    pub name: String,
    /// User whose history to show.
    #[structopt(short = "u", long = "user", default_value = "default")]
    pub user: String,
    /// Only show the most recent `n` quizzes.
    #[structopt(short = "n")]
    pub num_to_show: Option<usize>,
}

#[derive(StructOpt)]
pub struct SearchOptions {
    /// The name of the question bank.
    pub name: String,
    /// The term to search for.
    pub term: String,
}

#[derive(StructOpt)]
pub struct ImportOptions {
    /// Path to the CSV file to import questions from.
    pub file: PathBuf,
    /// Name of the question bank to import into.
    #[structopt(default_value = "main")]
    pub name: String,
}

#[derive(StructOpt)]
pub struct EditOptions {
    /// Name of the question bank to edit.
    #[structopt(default_value = "main")]
    pub name: String,
}


impl TakeOptions {
    #[allow(dead_code)]
    pub fn new() -> Self {
        TakeOptions {
            name: String::new(), user: String::from("default"), num_to_ask: 20,
            no_save: false, in_order: false, filter_opts: FilterOptions::new(),
        }
    }
}


impl FilterOptions {
    #[allow(dead_code)]
    pub fn new() -> Self {
        FilterOptions {
            categories: Vec::new(), exclude: Vec::new(),
        }
    }
}
