use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fern::colors::{Color, ColoredLevelConfig};
use log::{debug, LevelFilter};

mod config;
mod console;
mod datetime;
mod directive;
mod entry;
mod error;
mod invoice;
mod ledger;
mod logfile;
mod mutators;
mod parser;

use console::{JsonPresenter, LogPresenter, RegisterPresenter};
use invoice::{CsvInvoice, HtmlInvoice, InvoiceArgs};
use ledger::{FileLedger, LedgerStore};
use logfile::LogFile;
use mutators::{Mutator, Outcome};

/// plain-textのledgerで作業時間を記録するためのCLIアプリケーション。
///
/// # Examples
/// ```
/// $ timcol start Acme "Write report"
/// $ timcol stop
/// $ timcol reg
/// $ timcol csv --rate 40
/// ```
#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    #[clap(
        short = 'f',
        long = "file",
        global = true,
        help = "Location of the ledger file"
    )]
    file: Option<PathBuf>,

    #[clap(
        short = 'v',
        long = "verbose",
        global = true,
        parse(from_occurrences),
        help = "Show diagnostics on stderr (-vv for debug output)"
    )]
    verbose: u64,

    #[clap(subcommand)]
    subcommand: SubCommands,
}

/// サブコマンドを表す列挙型。
#[derive(Debug, Subcommand)]
enum SubCommands {
    #[clap(about = "Check in to a new task")]
    Start(StartArgs),
    #[clap(about = "Check out of the pending task")]
    Stop,
    #[clap(about = "Check out of the pending task and check in to a new one")]
    Swap(StartArgs),
    #[clap(about = "Check in again to the most recently completed task")]
    Resume,
    #[clap(about = "Remove the pending check-in")]
    Cancel,
    #[clap(about = "Human friendly register of all entries")]
    Reg,
    #[clap(about = "CSV invoice of all completed entries")]
    Csv(InvoiceArgs),
    #[clap(about = "HTML invoice of all completed entries")]
    Html(InvoiceArgs),
    #[clap(about = "All entries as JSON")]
    Json,
    #[clap(about = "Open the ledger in $VISUAL or $EDITOR")]
    Edit,
}

/// `start`、`swap`サブコマンドの引数。
#[derive(Debug, clap::Args)]
struct StartArgs {
    #[clap(help = "Account to bill the task to")]
    account: String,

    #[clap(help = "Description of the task")]
    description: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    setup_logger(args.verbose)?;

    let path = config::resolve_ledger_path(args.file.as_deref())?;
    let ledger = FileLedger::new(path);

    run(args.subcommand, &ledger)
}

/// ログの出力先をstderrに設定する。
fn setup_logger(verbose: u64) -> Result<()> {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(io::stderr())
        .apply()
        .context("Failed to set up logger")?;

    Ok(())
}

fn run(subcommand: SubCommands, ledger: &FileLedger) -> Result<()> {
    let mutator = Mutator::new(ledger);
    let mut stdout = io::stdout().lock();

    match subcommand {
        SubCommands::Start(start) => report(mutator.start(&start.account, &start.description)?),
        SubCommands::Stop => report(mutator.stop()?),
        SubCommands::Swap(start) => report(mutator.swap(&start.account, &start.description)?),
        SubCommands::Resume => report(mutator.resume()?),
        SubCommands::Cancel => report(mutator.cancel()?),
        SubCommands::Reg => show(ledger, &mut RegisterPresenter::new(&mut stdout))?,
        SubCommands::Csv(invoice) => show(ledger, &mut CsvInvoice::new(&mut stdout, invoice))?,
        SubCommands::Html(invoice) => show(ledger, &mut HtmlInvoice::new(&mut stdout, invoice))?,
        SubCommands::Json => show(ledger, &mut JsonPresenter::new(&mut stdout))?,
        SubCommands::Edit => edit(ledger.path())?,
    }

    Ok(())
}

/// 操作の結果をユーザーに表示する。矛盾する操作はメッセージを表示するだけで成功とする。
fn report(outcome: Outcome) {
    match outcome {
        Outcome::Appended(line) => println!("+{}", line),
        Outcome::Removed(line) => println!("-{}", line),
        Outcome::Conflict(conflict) => println!("{}", conflict),
    }
}

fn read_log(ledger: &FileLedger) -> Result<LogFile> {
    let contents = ledger.read()?;
    let log = parser::parse_str(&contents)
        .with_context(|| format!("Failed to parse ledger: {}", ledger.path().display()))?;
    if log.is_empty() {
        debug!("Ledger {} has no entries", ledger.path().display());
    }

    Ok(log)
}

fn show(ledger: &FileLedger, presenter: &mut dyn LogPresenter) -> Result<()> {
    let log = read_log(ledger)?;
    presenter.show_log(&log)
}

/// エディタでledgerを開く。
fn edit(path: &Path) -> Result<()> {
    let editor = config::editor();
    let status = Command::new(&editor)
        .arg(path)
        .status()
        .with_context(|| format!("Failed to launch editor {:?}", editor))?;
    if !status.success() {
        bail!("Editor {:?} exited with {}", editor, status);
    }

    Ok(())
}
