// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use school_finder::compare::{comparison_rows, format_distance, format_rating};
use school_finder::{
    BookmarkStore, CatalogHandle, CompareSet, FilterConfig, FinderConfig, JsonFileProvider,
    School, SchoolFinder, SearchRequest, SearchSession, SortKey, ViewConfig, DEFAULT_RESOURCE_TOPIC,
};

/// Find special-needs-friendly schools: local catalog + provider results
#[derive(Parser, Debug)]
#[command(name = "school-finder", version)]
struct Cli {
    /// School catalog (delimited text) [env: SCHOOL_FINDER_CATALOG]
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Bookmark database [env: SCHOOL_FINDER_DB]
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "school_finder=debug" [env: SCHOOL_FINDER_LOG]
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reconcile a saved provider response and print the display list
    Search {
        #[command(flatten)]
        search: SearchArgs,

        #[command(flatten)]
        view: ViewArgs,

        #[arg(long, value_enum, default_value_t = Format::Table)]
        format: Format,
    },
    /// Side-by-side comparison of up to 4 schools from a search
    Compare {
        #[command(flatten)]
        search: SearchArgs,

        /// School ids to compare
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,
    },
    /// Keyword search over the local catalog only
    Catalog {
        /// Empty = whole catalog
        #[arg(default_value = "")]
        query: String,

        #[command(flatten)]
        view: ViewArgs,

        #[arg(long, value_enum, default_value_t = Format::Table)]
        format: Format,
    },
    /// Manage bookmarked school ids
    Bookmarks {
        #[command(subcommand)]
        action: BookmarkAction,
    },
    /// Articles and guides for parents on a topic
    Resources {
        /// Saved provider answer (markdown or JSON)
        #[arg(long)]
        results: PathBuf,

        #[arg(default_value = DEFAULT_RESOURCE_TOPIC)]
        topic: String,

        #[arg(long, value_enum, default_value_t = Format::Table)]
        format: Format,
    },
    /// Interactive terminal browser over a search
    Browse {
        #[command(flatten)]
        search: SearchArgs,

        #[command(flatten)]
        view: ViewArgs,
    },
}

#[derive(Subcommand, Debug)]
enum BookmarkAction {
    List,
    Add { id: String },
    Remove { id: String },
    Toggle { id: String },
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Saved provider response (markdown or JSON)
    #[arg(long)]
    results: PathBuf,

    #[arg(short, long)]
    query: String,

    #[arg(short, long)]
    location: String,
}

#[derive(Args, Debug)]
struct ViewArgs {
    #[arg(long, default_value = "rating", value_parser = parse_sort_key)]
    sort: SortKey,

    #[arg(long, default_value_t = 0)]
    min_tuition: u64,

    #[arg(long, default_value_t = 20_000)]
    max_tuition: u64,

    #[arg(long, default_value_t = 30)]
    max_class_size: u32,

    #[arg(long)]
    adhd: bool,

    #[arg(long)]
    iep: bool,

    #[arg(long)]
    therapists: bool,

    #[arg(long)]
    sensory: bool,

    /// Repeatable; empty = any approach
    #[arg(long = "approach")]
    approaches: Vec<String>,

    /// Only bookmarked schools
    #[arg(long)]
    bookmarks_only: bool,
}

impl ViewArgs {
    fn to_view(&self) -> ViewConfig {
        ViewConfig {
            filters: FilterConfig {
                tuition: (self.min_tuition, self.max_tuition),
                max_class_size: self.max_class_size,
                adhd_support: self.adhd,
                therapists: self.therapists,
                iep: self.iep,
                sensory_friendly: self.sensory,
                educational_approaches: self.approaches.clone(),
            },
            sort: self.sort,
            bookmarks_only: self.bookmarks_only,
        }
    }
}

fn parse_sort_key(s: &str) -> std::result::Result<SortKey, String> {
    s.parse()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Table,
    Json,
    Csv,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = FinderConfig::from_env();
    if let Some(path) = &cli.catalog {
        config.catalog_path = path.clone();
    }
    if let Some(path) = &cli.db {
        config.bookmarks_db = path.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }

    init_tracing(&config.log_level);
    info!("School Finder v{}", school_finder::VERSION);

    match cli.command {
        Command::Search { search, view, format } => run_search(&config, &search, &view, format),
        Command::Compare { search, ids } => run_compare(&config, &search, &ids),
        Command::Catalog { query, view, format } => run_catalog(&config, &query, &view, format),
        Command::Bookmarks { action } => run_bookmarks(&config, action),
        Command::Resources { results, topic, format } => run_resources(&config, &results, &topic, format),
        Command::Browse { search, view } => run_ui_mode(&config, &search, &view),
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // Logs go to stderr so stdout stays clean for json/csv output
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn build_finder(config: &FinderConfig, results: &Path) -> SchoolFinder {
    let catalog = Arc::new(CatalogHandle::from_path(&config.catalog_path));
    SchoolFinder::new(catalog, Box::new(JsonFileProvider::new(results))).with_matcher(config.matcher())
}

fn open_bookmarks(config: &FinderConfig) -> Result<BookmarkStore> {
    BookmarkStore::open(&config.bookmarks_db).with_context(|| {
        format!("Failed to open bookmark database: {}", config.bookmarks_db.display())
    })
}

fn run_session(config: &FinderConfig, args: &SearchArgs) -> Result<(SchoolFinder, SearchSession)> {
    let finder = build_finder(config, &args.results);
    let session = finder.search(SearchRequest::new(&args.query, &args.location))?;
    info!(session = %session.id, "{}", session.report.summary());
    Ok((finder, session))
}

fn run_search(config: &FinderConfig, args: &SearchArgs, view: &ViewArgs, format: Format) -> Result<()> {
    let (finder, session) = run_session(config, args)?;
    let bookmarks = open_bookmarks(config)?.load();
    let schools = finder.view(&session, &view.to_view(), &bookmarks);

    print_schools(&schools, &bookmarks, format)?;

    if format == Format::Table && !session.sources.is_empty() {
        println!("\nSources:");
        for source in &session.sources {
            println!("  {} <{}>", source.title, source.uri);
        }
    }
    Ok(())
}

fn run_compare(config: &FinderConfig, args: &SearchArgs, ids: &[String]) -> Result<()> {
    let (_, session) = run_session(config, args)?;

    let mut compare = CompareSet::new();
    for id in ids {
        compare.toggle(id)?;
    }

    let schools = compare.selected(&session.schools);
    if schools.is_empty() {
        println!("None of the requested schools are in the search results.");
        return Ok(());
    }

    print!("{:<22}", "Feature");
    for school in &schools {
        print!(" | {:<30}", truncate(&school.name, 30));
    }
    println!();
    for row in comparison_rows(&schools) {
        print!("{:<22}", row.label);
        for value in &row.values {
            print!(" | {:<30}", truncate(value, 30));
        }
        println!();
    }
    Ok(())
}

fn run_catalog(config: &FinderConfig, query: &str, view: &ViewArgs, format: Format) -> Result<()> {
    let catalog = CatalogHandle::from_path(&config.catalog_path).get();
    let bookmarks = open_bookmarks(config)?.load();

    let matches = catalog.search(query);
    let schools = school_finder::display_list(&matches, &view.to_view(), &bookmarks);
    print_schools(&schools, &bookmarks, format)
}

fn run_bookmarks(config: &FinderConfig, action: BookmarkAction) -> Result<()> {
    let store = open_bookmarks(config)?;

    match action {
        BookmarkAction::List => {
            for id in store.load() {
                println!("{}", id);
            }
        }
        BookmarkAction::Add { id } => {
            store.add(&id);
            println!("★ {}", id);
        }
        BookmarkAction::Remove { id } => {
            store.remove(&id);
            println!("  {}", id);
        }
        BookmarkAction::Toggle { id } => {
            let mark = if store.toggle(&id) { "★" } else { " " };
            println!("{} {}", mark, id);
        }
    }
    Ok(())
}

fn run_resources(config: &FinderConfig, results: &Path, topic: &str, format: Format) -> Result<()> {
    let finder = build_finder(config, results);
    let response = finder.resources(topic)?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&response)?),
        Format::Csv => {
            let mut writer = csv::Writer::from_writer(io::stdout());
            for article in &response.articles {
                writer.serialize(article)?;
            }
            writer.flush()?;
        }
        Format::Table => {
            println!("📚 Resources: {}\n", topic.trim());
            for article in &response.articles {
                println!("  {}", article.title);
                println!("    {}", article.link);
                if !article.snippet.is_empty() {
                    println!("    {}", truncate(&article.snippet, 100));
                }
            }
            println!("\n{} articles", response.articles.len());
            for source in &response.sources {
                println!("  {} <{}>", source.title, source.uri);
            }
        }
    }
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &FinderConfig, args: &SearchArgs, view: &ViewArgs) -> Result<()> {
    let (_, session) = run_session(config, args)?;
    let store = open_bookmarks(config)?;

    let mut app = ui::App::new(session, view.to_view(), store);
    ui::run_ui(&mut app)?;

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &FinderConfig, _args: &SearchArgs, _view: &ViewArgs) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the web API: cargo run --bin finder-server --features server");
    std::process::exit(1);
}

// ============================================================================
// OUTPUT
// ============================================================================

#[derive(Serialize)]
struct ExportRow<'a> {
    id: &'a str,
    name: &'a str,
    rating: String,
    tuition: &'a str,
    distance: String,
    class_size: u32,
    approach: &'a str,
    adhd_support: bool,
    offers_iep: bool,
    therapists: bool,
    sensory_friendly: bool,
    autism_support: &'a str,
    enrollment_status: &'a str,
    bookmarked: bool,
}

impl<'a> ExportRow<'a> {
    fn new(school: &'a School, bookmarked: bool) -> Self {
        ExportRow {
            id: &school.id,
            name: &school.name,
            rating: format_rating(school),
            tuition: &school.tuition_range,
            distance: format_distance(school),
            class_size: school.average_class_size,
            approach: &school.educational_approach,
            adhd_support: school.adhd_support,
            offers_iep: school.offers_iep,
            therapists: school.has_on_site_therapists,
            sensory_friendly: school.has_sensory_friendly_facilities,
            autism_support: school.autism_support.label(),
            enrollment_status: school.enrollment_status.as_str(),
            bookmarked,
        }
    }
}

fn print_schools(
    schools: &[School],
    bookmarks: &std::collections::BTreeSet<String>,
    format: Format,
) -> Result<()> {
    match format {
        Format::Json => {
            println!("{}", serde_json::to_string_pretty(schools)?);
        }
        Format::Csv => {
            let mut writer = csv::Writer::from_writer(io::stdout());
            for school in schools {
                writer.serialize(ExportRow::new(school, bookmarks.contains(&school.id)))?;
            }
            writer.flush()?;
        }
        Format::Table => {
            println!(
                "  {:<36} {:>6} {:<38} {:>12} {:>5}  {}",
                "School", "Rating", "Tuition", "Distance", "Class", "Approach"
            );
            println!("{}", "━".repeat(120));
            for school in schools {
                let mark = if bookmarks.contains(&school.id) { "★" } else { " " };
                println!(
                    "{} {:<36} {:>6} {:<38} {:>12} {:>5}  {}",
                    mark,
                    truncate(&school.name, 36),
                    format_rating(school),
                    truncate(&school.tuition_range, 38),
                    format_distance(school),
                    school.average_class_size,
                    school.educational_approach
                );
            }
            println!("\n{} schools", schools.len());
        }
    }
    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
