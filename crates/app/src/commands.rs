use anyhow::{anyhow, bail, Context};
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use serde::Serialize;
use spendscan_core::{
    breakdown_by_category, breakdown_by_source, Category, Expense, ExpenseId, ExpenseStats, Money,
    Month, NewExpense, Source, ValidatedExpense,
};
use spendscan_ocr::{
    accepted_expenses, Extractor, OcrBackend, OcrError, ParseResult, ReceiptPipeline, ReviewItem,
};
use spendscan_storage::{DbPool, ExpenseFilter};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;

use crate::config::{AppConfig, OcrConfig};

// ── Arguments ─────────────────────────────────────────────────────────────────

/// Review flags shared by `parse` and `scan`.
#[derive(Debug, Default, Args)]
pub struct ReviewArgs {
    /// Save the accepted items as expenses
    #[arg(long)]
    pub save: bool,

    /// Category for every item (defaults to the configured one)
    #[arg(long)]
    pub category: Option<Category>,

    /// Per-item category, e.g. `--set 2=transport` (items are numbered from 1)
    #[arg(long = "set", value_name = "N=CATEGORY", value_parser = parse_assignment)]
    pub overrides: Vec<(usize, Category)>,

    /// Leave item N out when saving
    #[arg(long = "reject", value_name = "N")]
    pub rejected: Vec<usize>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ParseArgs {
    /// Text file holding the receipt; reads stdin when omitted
    pub file: Option<PathBuf>,

    #[command(flatten)]
    pub review: ReviewArgs,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Receipt image (PNG, JPEG, ...)
    pub image: PathBuf,

    /// Print the raw recognized text
    #[arg(long)]
    pub show_text: bool,

    #[command(flatten)]
    pub review: ReviewArgs,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    #[arg(short, long)]
    pub description: String,

    #[arg(short, long, value_parser = parse_money)]
    pub amount: Money,

    #[arg(short, long)]
    pub category: Option<Category>,

    /// Expense date (YYYY-MM-DD); today when omitted
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only these categories (repeatable)
    #[arg(long = "category")]
    pub categories: Vec<Category>,

    /// Only these sources: manual or ocr (repeatable)
    #[arg(long = "source")]
    pub sources: Vec<Source>,

    /// Only expenses dated in this month (YYYY-MM)
    #[arg(long)]
    pub month: Option<Month>,

    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Show the configuration file path
    Path,
}

fn parse_assignment(s: &str) -> Result<(usize, Category), String> {
    let (n, category) = s
        .split_once('=')
        .ok_or_else(|| format!("expected N=CATEGORY, got '{s}'"))?;
    let n: usize = n.trim().parse().map_err(|_| format!("invalid item number '{n}'"))?;
    Ok((n, category.parse()?))
}

fn parse_money(s: &str) -> Result<Money, String> {
    Money::parse(s).ok_or_else(|| format!("invalid amount '{s}'"))
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

async fn open_db(config: &AppConfig) -> anyhow::Result<DbPool> {
    let path = config.database_path()?;
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating data directory {}", dir.display()))?;
    }
    Ok(spendscan_storage::create_db(&path).await?)
}

// ── Receipt review ────────────────────────────────────────────────────────────

/// Apply the review flags to the parsed items.
pub fn review_rows(
    parsed: &ParseResult,
    default_category: Category,
    review: &ReviewArgs,
) -> anyhow::Result<Vec<ReviewItem>> {
    let mut rows = parsed.review(review.category.unwrap_or(default_category));
    for &n in &review.rejected {
        row_mut(&mut rows, n)?.include = false;
    }
    for &(n, category) in &review.overrides {
        row_mut(&mut rows, n)?.category = category;
    }
    Ok(rows)
}

fn row_mut(rows: &mut [ReviewItem], number: usize) -> anyhow::Result<&mut ReviewItem> {
    let count = rows.len();
    number
        .checked_sub(1)
        .and_then(|i| rows.get_mut(i))
        .ok_or_else(|| anyhow!("no item #{number} (found {count} items)"))
}

#[derive(Serialize)]
struct ReviewOutput<'a> {
    #[serde(flatten)]
    parsed: &'a ParseResult,
    review: &'a [ReviewItem],
}

async fn review_and_save(
    parsed: &ParseResult,
    config: &AppConfig,
    review: &ReviewArgs,
) -> anyhow::Result<()> {
    if parsed.is_empty() && !review.json {
        println!("No items found in text");
        println!("Total: {}", parsed.total);
        return Ok(());
    }

    let rows = review_rows(parsed, config.review.default_category, review)?;
    if review.json {
        let out = ReviewOutput { parsed, review: &rows };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_review(parsed, &rows);
    }

    if !review.save {
        return Ok(());
    }
    let expenses = accepted_expenses(rows, today())?;
    if expenses.is_empty() {
        println!("Nothing selected to save");
        return Ok(());
    }
    let pool = open_db(config).await?;
    let ids = spendscan_storage::insert_expenses(&pool, &expenses).await?;
    println!("Saved {} expenses!", ids.len());
    Ok(())
}

fn print_review(parsed: &ParseResult, rows: &[ReviewItem]) {
    println!("Found {} items ({})", rows.len(), parsed.strategy);
    for (i, row) in rows.iter().enumerate() {
        let mark = if row.include { "" } else { "  [rejected]" };
        println!(
            "{:>3}. {:<50} {:>10}  {}{}",
            i + 1,
            row.description,
            row.amount.to_string(),
            row.category,
            mark
        );
    }
    println!("Items: {}", parsed.items_sum());
    println!("Total: {}", parsed.total);
}

// ── Commands ──────────────────────────────────────────────────────────────────

pub async fn parse(args: ParseArgs, config: &AppConfig) -> anyhow::Result<()> {
    let text = match &args.file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).context("reading stdin")?;
            buf
        }
    };

    let parsed = Extractor::extract(&text);
    review_and_save(&parsed, config, &args.review).await
}

pub async fn scan(args: ScanArgs, config: &AppConfig) -> anyhow::Result<()> {
    let pipeline = ReceiptPipeline::new(ocr_backend(&config.ocr)?).with_max_width(config.ocr.max_width);
    let result = pipeline.process_file(&args.image).await?;

    if args.show_text {
        println!("── Raw extracted text ──");
        println!("{}", result.ocr_text);
        println!("────────────────────────");
    }
    review_and_save(&result.parsed, config, &args.review).await
}

#[cfg(feature = "tesseract")]
fn ocr_backend(config: &OcrConfig) -> Result<Box<dyn OcrBackend>, OcrError> {
    use spendscan_ocr::recognizer::tesseract_backend::TesseractRecognizer;
    let mut recognizer = TesseractRecognizer::new(config.language.as_str());
    if let Some(dir) = &config.tessdata_path {
        recognizer = recognizer.with_tessdata(dir);
    }
    Ok(Box::new(recognizer))
}

#[cfg(not(feature = "tesseract"))]
fn ocr_backend(_config: &OcrConfig) -> Result<Box<dyn OcrBackend>, OcrError> {
    Err(OcrError::NotAvailable)
}

pub async fn add(args: AddArgs, config: &AppConfig) -> anyhow::Result<()> {
    let expense = ValidatedExpense::validate(NewExpense {
        description: args.description,
        amount: args.amount,
        category: args.category,
        date: args.date.unwrap_or_else(today),
        source: Source::Manual,
    })?;
    let pool = open_db(config).await?;
    let id = spendscan_storage::insert_expense(&pool, &expense).await?;
    println!("Expense added (#{id})");
    Ok(())
}

pub async fn list(args: ListArgs, config: &AppConfig) -> anyhow::Result<()> {
    let pool = open_db(config).await?;
    let filter = ExpenseFilter {
        categories: args.categories,
        sources: args.sources,
        range: args.month.map(Month::range),
    };
    let expenses = spendscan_storage::get_expenses(&pool, &filter).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&expenses)?);
        return Ok(());
    }

    let total = spendscan_storage::count_expenses(&pool).await?;
    if total == 0 {
        println!("No expenses yet");
        return Ok(());
    }
    if filter.is_empty() {
        println!("{total} expenses");
    } else {
        println!("Showing {} of {} expenses", expenses.len(), total);
    }
    for e in &expenses {
        print_expense(e);
    }
    Ok(())
}

fn print_expense(e: &Expense) {
    println!(
        "{:>5}  {}  {:<40} {:<13} {:>10}  {}",
        e.id.to_string(),
        e.date,
        e.description,
        e.category.to_string(),
        e.amount.to_string(),
        e.source
    );
}

pub async fn delete(id: i64, config: &AppConfig) -> anyhow::Result<()> {
    let pool = open_db(config).await?;
    if !spendscan_storage::delete_expense(&pool, ExpenseId(id)).await? {
        bail!("no expense with id {id}");
    }
    println!("Deleted expense #{id}");
    Ok(())
}

#[derive(Serialize)]
struct StatsOutput {
    #[serde(flatten)]
    stats: ExpenseStats,
    by_category: BTreeMap<String, Money>,
    by_source: BTreeMap<String, Money>,
}

pub async fn stats(json: bool, config: &AppConfig) -> anyhow::Result<()> {
    let pool = open_db(config).await?;
    let expenses = spendscan_storage::get_expenses(&pool, &ExpenseFilter::default()).await?;
    let out = StatsOutput {
        stats: ExpenseStats::compute(&expenses, today()),
        by_category: breakdown_by_category(&expenses)
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
        by_source: breakdown_by_source(&expenses)
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Total:        {}", out.stats.total);
    println!("This month:   {}", out.stats.month);
    println!("Avg / day:    {}", out.stats.avg_daily);
    println!("Transactions: {}", out.stats.count);
    if expenses.is_empty() {
        println!("Add expenses to see a breakdown");
        return Ok(());
    }
    println!("\nBy category:");
    for (k, v) in &out.by_category {
        println!("  {k:<14} {v:>10}");
    }
    println!("\nBy source:");
    for (k, v) in &out.by_source {
        println!("  {k:<14} {v:>10}");
    }
    Ok(())
}

pub fn config(args: ConfigArgs, path: &std::path::Path, config: &AppConfig) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => print!("{}", config.to_toml_string()?),
        ConfigCommand::Path => println!("{}", path.display()),
        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                bail!(
                    "config file already exists at {}. Use --force to overwrite.",
                    path.display()
                );
            }
            AppConfig::default().save(path)?;
            println!("Created configuration file at {}", path.display());
        }
    }
    Ok(())
}
