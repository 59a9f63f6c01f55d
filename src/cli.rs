use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use atty::Stream;
use clap::{Parser, Subcommand, ValueEnum};
use menu_search::layout::{is_cyrillic_key, is_latin_key, latin_to_ru, ru_to_latin};
use menu_search::{Catalog, MenuEntry, MenuSearch, ScoredEntry, SearchConfig, SearchSession};
use serde_json::json;
use termimad::{FmtText, MadSkin, terminal_size};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "menu-search", about = "Search the print shop menu", version)]
pub struct Cli {
    /// Emit JSON instead of human-readable tables.
    #[arg(long, global = true)]
    json: bool,

    /// Load the catalog from a JSON file instead of the built-in one.
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Minimum trigram similarity for fuzzy matches.
    #[arg(long, global = true)]
    threshold: Option<f32>,

    /// Maximum number of results (1 to 8; larger values are clamped).
    #[arg(long, global = true)]
    limit: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rank menu entries against a query.
    Search {
        /// Free-text query, in either keyboard layout.
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// List catalog entries in menu order.
    Catalog {
        /// Only show entries of this category key.
        #[arg(long)]
        category: Option<String>,
    },
    /// List categories with their colors.
    Categories,
    /// Convert text between the Russian and Latin keyboard layouts.
    Translit {
        text: Vec<String>,
        #[arg(long, value_enum, default_value_t = Direction::Auto)]
        to: Direction,
    },
    /// Interactive dropdown session reading queries from stdin.
    Browse,
    /// Serve the HTTP API and search page.
    #[cfg(feature = "web")]
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: std::net::SocketAddr,
        /// Public base URL used in rendered links.
        #[arg(long)]
        base_url: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Direction {
    Auto,
    Latin,
    Ru,
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing();
    let search = build_search(&cli)?;
    match cli.command {
        Command::Search { query } => handle_search(&search, &query.join(" "), cli.json),
        Command::Catalog { category } => handle_catalog(&search, category.as_deref(), cli.json),
        Command::Categories => handle_categories(&search, cli.json),
        Command::Translit { text, to } => handle_translit(&text.join(" "), to, cli.json),
        Command::Browse => handle_browse(&search),
        #[cfg(feature = "web")]
        Command::Serve { addr, base_url } => handle_serve(search, addr, base_url),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn build_search(cli: &Cli) -> Result<MenuSearch, Box<dyn Error>> {
    let catalog = match &cli.catalog {
        Some(path) => Catalog::from_path(path)?,
        None => Catalog::builtin().clone(),
    };
    let config = search_config(cli.threshold, cli.limit)?;
    Ok(MenuSearch::with_config(catalog, config))
}

/// Applies CLI overrides; `--limit` can only lower the default cap.
fn search_config(
    threshold: Option<f32>,
    limit: Option<usize>,
) -> Result<SearchConfig, Box<dyn Error>> {
    let mut config = SearchConfig::default();
    if let Some(threshold) = threshold {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(format!("Threshold must be within 0..=1, got {threshold}").into());
        }
        config.threshold = threshold;
    }
    if let Some(limit) = limit {
        config.limit = limit.clamp(1, config.limit);
    }
    Ok(config)
}

fn handle_search(search: &MenuSearch, query: &str, as_json: bool) -> Result<(), Box<dyn Error>> {
    let hits = search.rank_scored(query);
    if as_json {
        let payload = json!({
            "query": query,
            "limit": search.config().limit,
            "results": hits.iter().map(hit_json).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if hits.is_empty() {
        println!("No menu entries match \"{query}\".");
    } else {
        println!("Matches for \"{query}\":");
        print_entries(hits.iter().map(|hit| (hit.entry, hit.score)));
    }
    Ok(())
}

fn handle_catalog(
    search: &MenuSearch,
    category: Option<&str>,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let entries: Vec<&MenuEntry> = match category {
        Some(key) => search.catalog().by_category(key).collect(),
        None => search.catalog().entries().iter().collect(),
    };
    if as_json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        println!("No entries found.");
    } else {
        print_entries(entries.into_iter().map(|entry| (entry, None)));
    }
    Ok(())
}

fn handle_categories(search: &MenuSearch, as_json: bool) -> Result<(), Box<dyn Error>> {
    let rows: Vec<_> = search
        .catalog()
        .categories()
        .into_iter()
        .map(|(key, name)| {
            let count = search.catalog().by_category(key).count();
            (key, name, search.category_color(key), count)
        })
        .collect();
    if as_json {
        let payload: Vec<_> = rows
            .iter()
            .map(|(key, name, color, count)| {
                json!({ "key": key, "name": name, "color": color, "entries": count })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }
    let mut table = String::from("|Key|Name|Color|Entries|\n|-|-|-|-:|\n");
    for (key, name, color, count) in &rows {
        table.push_str(&format!("|{key}|{name}|`{color}`|{count}|\n"));
    }
    render_markdown(&table);
    Ok(())
}

fn handle_translit(text: &str, to: Direction, as_json: bool) -> Result<(), Box<dyn Error>> {
    let direction = match to {
        Direction::Auto => auto_direction(text),
        other => other,
    };
    let converted = match direction {
        Direction::Latin => ru_to_latin(text),
        _ => latin_to_ru(text),
    };
    if as_json {
        let payload = json!({ "input": text, "output": converted });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("{converted}");
    }
    Ok(())
}

/// Converts towards whichever layout the text mostly was not typed in.
fn auto_direction(text: &str) -> Direction {
    let cyrillic = text.chars().filter(|&ch| is_cyrillic_key(ch)).count();
    let latin = text.chars().filter(|&ch| is_latin_key(ch)).count();
    if cyrillic > latin {
        Direction::Latin
    } else {
        Direction::Ru
    }
}

fn handle_browse(search: &MenuSearch) -> Result<(), Box<dyn Error>> {
    let mut session = SearchSession::new(search);
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    println!("Type a query; :next, :prev, :enter, :close, :clear, :quit to navigate.");
    write!(stdout, "> ")?;
    stdout.flush()?;
    for line in stdin.lock().lines() {
        let line = line?;
        match line.trim() {
            ":quit" | ":q" => break,
            ":next" | ":n" => session.move_next(),
            ":prev" | ":p" => session.move_previous(),
            ":close" => session.close(),
            ":clear" => session.clear_highlight(),
            ":enter" | ":e" => match session.confirm_selection() {
                Some(entry) => {
                    let link = entry.link.as_deref().unwrap_or("<no page yet>");
                    println!("Selected {} ({}) -> {link}", entry.text, entry.id);
                }
                None => println!("Nothing to select."),
            },
            _ => session.set_query(line.as_str()),
        }
        print_session(&session);
        write!(stdout, "> ")?;
        stdout.flush()?;
    }
    Ok(())
}

fn print_session(session: &SearchSession<'_>) {
    if let Some(id) = session.highlighted_id() {
        println!("[highlighted: {id}]");
    }
    if !session.is_dropdown_open() {
        return;
    }
    let results = session.results();
    if results.is_empty() {
        println!("  (no matches)");
    }
    for (index, entry) in results.iter().enumerate() {
        let marker = if session.selected_index() == Some(index) {
            '>'
        } else {
            ' '
        };
        println!("{marker} {} · {}", entry.text, entry.category);
    }
}

#[cfg(feature = "web")]
fn handle_serve(
    search: MenuSearch,
    addr: std::net::SocketAddr,
    base_url: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let config = menu_search::web::WebConfig {
        addr,
        base_url: base_url.unwrap_or_else(|| format!("http://{addr}")),
    };
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(menu_search::web::serve(search, config))?;
    Ok(())
}

fn print_entries<'a, I>(rows: I)
where
    I: IntoIterator<Item = (&'a MenuEntry, Option<f32>)>,
{
    let mut table = String::from("|ID|Entry|Category|Score|Link|\n|-|-|-|-:|-|\n");
    for (entry, score) in rows {
        let score = score
            .map(|value| format!("{value:.3}"))
            .unwrap_or_else(|| "—".to_string());
        let link = entry.link.as_deref().unwrap_or("");
        table.push_str(&format!(
            "|{}|{}|{}|{score}|{link}|\n",
            entry.id,
            escape_cell(&entry.text),
            entry.category
        ));
    }
    render_markdown(&table);
}

fn hit_json(hit: &ScoredEntry<'_>) -> serde_json::Value {
    json!({
        "id": hit.entry.id,
        "text": hit.entry.text,
        "category": hit.entry.category,
        "category_key": hit.entry.category_key,
        "color": hit.entry.color(),
        "link": hit.entry.link,
        "score": hit.score,
    })
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}

fn render_markdown(markdown: &str) {
    if stdout_is_tty() {
        let skin = MadSkin::default();
        let formatted = FmtText::from(&skin, markdown, Some(markdown_width()));
        println!("{formatted}");
    } else {
        print!("{markdown}");
    }
}
