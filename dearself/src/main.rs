// Dear Self - local journaling companion
// Command line entry point

use anyhow::{anyhow, Context};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use dearself::app::AppState;
use dearself::services::entries::group_by_month;
use dearself::services::favorites::FavoriteInput;
use dearself::services::preferences::{apply_to_host, CssHost, NavMove, NavTab};
use dearself::services::streak::badge_visible;
use dearself::services::undo::{DeletionTarget, UndoDeleteController};
use dearself::services::usage::notifier_from_env;
use dearself::services::{
    paginate, AffirmationPool, EntryPatch, EntryQuery, EntrySort, FavoriteQuery, FavoriteSort, ListView,
    StylePatch,
};
use serde::Serialize;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use tokio::sync::oneshot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dearself")]
#[command(about = "Daily affirmations, journal entries and streaks, kept on this device")]
struct Cli {
    /// Directory holding the local database (defaults to the user data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// JSON file with the affirmation pool to use instead of the built-in one
    #[arg(long, global = true)]
    pool: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show today's affirmation
    Today,

    /// Pick a different affirmation for today
    Regenerate,

    /// Write a journal entry
    Write {
        /// Entry text
        content: String,
        #[command(flatten)]
        style: StyleArgs,
    },

    /// List journal entries
    Entries {
        /// Only entries containing this text
        #[arg(long, short)]
        search: Option<String>,
        /// Only entries whose paper key starts with this
        #[arg(long)]
        theme: Option<String>,
        /// Only entries written on this day (YYYY-MM-DD)
        #[arg(long)]
        day: Option<NaiveDate>,
        /// newest, oldest, theme-az or theme-za
        #[arg(long, default_value = "newest")]
        sort: EntrySort,
        #[arg(long, default_value_t = 1)]
        page: usize,
        /// Remember a new page size (12, 24, 50, 75 or 100)
        #[arg(long)]
        page_size: Option<usize>,
        /// Group the page by month
        #[arg(long)]
        by_month: bool,
    },

    /// Edit a journal entry
    Edit {
        id: String,
        /// Replacement text
        #[arg(long)]
        content: Option<String>,
        #[command(flatten)]
        style: StyleArgs,
    },

    /// Delete a journal entry, with a chance to undo
    Delete { id: String },

    /// Toggle today's affirmation as a favorite
    Favorite,

    /// List favorites
    Favorites {
        #[arg(long)]
        category: Option<String>,
        /// newest, oldest, category-az or category-za
        #[arg(long, default_value = "newest")]
        sort: FavoriteSort,
        #[arg(long, default_value_t = 1)]
        page: usize,
        /// Remember a new page size (12, 24, 50, 75 or 100)
        #[arg(long)]
        page_size: Option<usize>,
    },

    /// Remove a favorite by key, with a chance to undo
    Unfavorite { key: String },

    /// Show the current writing streak
    Streak,

    /// Show or change preferences
    Prefs {
        #[command(subcommand)]
        action: Option<PrefsAction>,
    },

    /// Print the CSS the current preferences apply
    ThemeCss,

    /// Print preferences whenever they change
    Watch,

    /// List the available papers
    Papers,
}

#[derive(Subcommand)]
enum PrefsAction {
    /// Print the current preferences
    Show,
    /// Deep-merge a JSON patch, e.g. '{"brandTheme": "blush"}'
    Set { patch: String },
    /// Move a navigation tab one place
    MoveNav {
        tab: NavTab,
        #[arg(value_enum)]
        direction: Direction,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Direction {
    Up,
    Down,
}

#[derive(Args, Default)]
struct StyleArgs {
    /// Paper key, e.g. whimsical3
    #[arg(long)]
    paper: Option<String>,
    #[arg(long)]
    font: Option<String>,
    #[arg(long)]
    color: Option<String>,
    #[arg(long)]
    date_color: Option<String>,
    #[arg(long)]
    size: Option<u32>,
    #[arg(long)]
    bold: Option<bool>,
    #[arg(long)]
    italic: Option<bool>,
}

impl From<StyleArgs> for StylePatch {
    fn from(args: StyleArgs) -> Self {
        StylePatch {
            theme_key: args.paper,
            font_family: args.font,
            font_color: args.color,
            date_color: args.date_color,
            font_size: args.size,
            bold: args.bold,
            italic: args.italic,
            ..StylePatch::default()
        }
    }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Resolves once a line is read from `input`. End of input drops the sender
/// instead, so a closed or empty stdin never asks for an undo.
fn enter_pressed(input: impl Read + Send + 'static) -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    // A plain thread so a pending read never holds up shutdown.
    std::thread::spawn(move || {
        let mut line = String::new();
        if matches!(BufReader::new(input).read_line(&mut line), Ok(n) if n > 0) {
            let _ = tx.send(());
        }
    });
    rx
}

/// Run a deletion through the undo window; Enter before it elapses undoes it
async fn delete_with_undo<D: DeletionTarget>(controller: UndoDeleteController<D>, id: &str) -> anyhow::Result<()> {
    let Some(pending) = controller.request_delete(id).await else {
        println!("Nothing found for {}", id);
        return Ok(());
    };

    println!(
        "Deleted {}. Press Enter within {:.1}s to undo.",
        id,
        controller.window().as_secs_f64()
    );

    let rx = enter_pressed(std::io::stdin());

    tokio::select! {
        Ok(()) = rx => {
            if controller.cancel().await.is_some() {
                println!("Undone.");
                return Ok(());
            }
            println!("Too late to undo.");
        }
        _ = tokio::time::sleep_until(pending.deadline) => {
            controller.flush().await;
            println!("Deleted for good.");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dearself=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let data_dir = cli
        .data_dir
        .or_else(|| dirs::data_dir().map(|dir| dir.join("dearself")))
        .ok_or_else(|| anyhow!("No data directory available, pass --data-dir"))?;

    let pool = match &cli.pool {
        Some(path) => AffirmationPool::from_json_file(path)
            .with_context(|| format!("Failed to load affirmation pool from {:?}", path))?,
        None => AffirmationPool::builtin(),
    };

    let state = AppState::initialize(&data_dir, pool, notifier_from_env())
        .await
        .context("Failed to initialize local storage")?;

    match cli.command {
        Commands::Today => print_json(&state.affirmations.ensure_today().await)?,
        Commands::Regenerate => print_json(&state.affirmations.regenerate().await)?,
        Commands::Write { content, style } => {
            let entry = state.entries.add(content, style.into()).await;
            print_json(&entry)?;
            let streak = state.streak().await;
            if badge_visible(streak) {
                println!("{} day streak", streak);
            }
        }
        Commands::Entries {
            search,
            theme,
            day,
            sort,
            page,
            page_size,
            by_month,
        } => {
            if let Some(size) = page_size {
                if !state.page_sizes.set(ListView::PastEntries, size).await {
                    return Err(anyhow!("Page size must be one of 12, 24, 50, 75, 100"));
                }
            }
            let query = EntryQuery {
                text: search,
                theme_prefix: theme,
                day,
                sort,
            };
            let entries = state.entries.query(&query).await;
            let page = paginate(entries, page, state.page_sizes.get(ListView::PastEntries).await);

            if by_month {
                for group in group_by_month(&page.items) {
                    println!("== {} ==", group.label);
                    print_json(&group.entries)?;
                }
                println!("Page {} of {}", page.page, page.total_pages);
            } else {
                print_json(&page)?;
            }
        }
        Commands::Edit { id, content, style } => {
            let patch = EntryPatch {
                content,
                style: Some(style.into()),
            };
            match state.entries.update(&id, patch).await {
                Some(entry) => print_json(&entry)?,
                None => println!("No entry with id {}", id),
            }
        }
        Commands::Delete { id } => delete_with_undo(state.entry_undo().await, &id).await?,
        Commands::Favorite => {
            let card = state.affirmations.ensure_today().await;
            let item = FavoriteInput::from(&card);
            state.favorites.toggle(item.clone()).await;
            if state.favorites.is_favorite(&item).await {
                println!("Saved to favorites: {}", card.text);
            } else {
                println!("Removed from favorites: {}", card.text);
            }
        }
        Commands::Favorites {
            category,
            sort,
            page,
            page_size,
        } => {
            if let Some(size) = page_size {
                if !state.page_sizes.set(ListView::Favorites, size).await {
                    return Err(anyhow!("Page size must be one of 12, 24, 50, 75, 100"));
                }
            }
            let favorites = state.favorites.query(&FavoriteQuery { category, sort }).await;
            let size = state.page_sizes.get(ListView::Favorites).await;
            print_json(&paginate(favorites, page, size))?;
        }
        Commands::Unfavorite { key } => delete_with_undo(state.favorite_undo().await, &key).await?,
        Commands::Streak => {
            let streak = state.streak().await;
            println!("{}", streak);
        }
        Commands::Prefs { action } => match action.unwrap_or(PrefsAction::Show) {
            PrefsAction::Show => print_json(&state.preferences.load().await)?,
            PrefsAction::Set { patch } => {
                let patch: serde_json::Value = serde_json::from_str(&patch).context("Patch is not valid JSON")?;
                print_json(&state.preferences.save(patch).await?)?;
            }
            PrefsAction::MoveNav { tab, direction } => {
                let direction = match direction {
                    Direction::Up => NavMove::Up,
                    Direction::Down => NavMove::Down,
                };
                print_json(&state.preferences.move_nav(tab, direction).await.nav_order)?;
            }
        },
        Commands::ThemeCss => {
            let mut host = CssHost::new();
            apply_to_host(&state.preferences.load().await, &mut host);
            println!("/* <body {}> */", host.body_attributes());
            println!("{}", host.to_css());
        }
        Commands::Watch => {
            let mut watcher = state.preferences.watch();
            println!("Watching preferences, Ctrl-C to stop");
            loop {
                tokio::select! {
                    changed = watcher.changed() => match changed {
                        Some(prefs) => print_json(&prefs)?,
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
        Commands::Papers => print_json(&state.papers.groups())?,
    }

    if state.store.is_degraded().await {
        tracing::warn!("Some changes were kept in memory only and are now lost");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_enter_asks_for_undo() {
        let rx = enter_pressed(std::io::Cursor::new(b"\n".to_vec()));
        assert!(rx.await.is_ok());
    }

    #[tokio::test]
    async fn test_end_of_input_never_asks_for_undo() {
        let rx = enter_pressed(std::io::empty());
        assert!(rx.await.is_err());
    }
}
