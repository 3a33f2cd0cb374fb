use blog_banner::config::{self, BannerConfig};
use blog_banner::photos::{PhotoSource, UnsplashSource};
use blog_banner::types::{CategoryField, NewPost};
use blog_banner::{output, pipeline};
use clap::{CommandFactory, Parser, Subcommand};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "blog-banner")]
#[command(about = "Fetch a stock banner photo for a blog post and add it to the front-matter")]
#[command(long_about = "\
Fetch a stock banner photo for a blog post and add it to the front-matter

  blog-banner \"dynamic programming.md\"          query from the file name
  blog-banner \"new post.md\" 算法                 keywords of a known category
  blog-banner \"new post.md\" \"misty forest\"     free-text query

The photo is saved to source/img/banners/<slug>.jpg and the post gets:

  top_img: /img/banners/<slug>.jpg
  cover: /img/banners/<slug>.jpg

Requires UNSPLASH_ACCESS_KEY in the environment or in a .env file.
Run 'blog-banner categories' to list category keywords, and
'blog-banner gen-config' for a documented banner.toml.")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Blog root (holds banner.toml, .env and the source directory)
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Post file name inside the posts directory
    post: Option<String>,

    /// Category name or free-text search query
    query: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the new-post hook (for generator integration; always exits 0)
    Hook(HookArgs),
    /// Copy top_img into cover for posts that lack a cover
    Backfill,
    /// List category → keyword mappings
    Categories,
    /// Print a stock banner.toml with all options documented
    GenConfig,
}

#[derive(clap::Args)]
struct HookArgs {
    /// Read the event as JSON from a file, or `-` for stdin
    #[arg(long, conflicts_with_all = ["title", "slug", "path", "category"])]
    json: Option<PathBuf>,

    /// Post title
    #[arg(long, default_value = "")]
    title: String,

    /// Post slug (defaults to the file stem of --path)
    #[arg(long)]
    slug: Option<String>,

    /// Post file, absolute or relative to --root
    #[arg(long, required_unless_present = "json")]
    path: Option<PathBuf>,

    /// Post category (repeatable; the first one is used)
    #[arg(long)]
    category: Vec<String>,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    load_dotenv(&cli.root);
    init_tracing();

    match cli.command {
        Some(Command::GenConfig) => {
            print!("{}", config::stock_config_toml());
        }
        Some(Command::Categories) => {
            let config = config::load_config(&cli.root)?;
            output::print_categories(&config);
        }
        Some(Command::Backfill) => {
            let config = config::load_config(&cli.root)?;
            let report = pipeline::backfill_covers(&config, &cli.root)?;
            output::print_backfill_report(&report);
        }
        Some(Command::Hook(args)) => {
            run_hook(&cli.root, args);
        }
        None => {
            let Some(post) = cli.post else {
                Cli::command().print_help()?;
                println!();
                return Ok(ExitCode::SUCCESS);
            };
            let config = config::load_config(&cli.root)?;
            return Ok(run_add(&config, &cli.root, &post, cli.query.as_deref()));
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Load `.env` from the blog root, falling back to the usual lookup from the
/// working directory. Variables already set win.
fn load_dotenv(root: &Path) {
    let local = root.join(".env");
    // A missing .env is normal: the key may already be exported.
    if local.is_file() {
        dotenvy::from_path(&local).ok();
    } else {
        dotenvy::dotenv().ok();
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .init();
}

/// `blog-banner <post> [query]`: fetch and patch, non-zero exit on failure.
fn run_add(config: &BannerConfig, root: &Path, post: &str, query: Option<&str>) -> ExitCode {
    let source = match UnsplashSource::from_env(&config.api) {
        Ok(source) => source,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    match pipeline::add_banner(config, root, &source, post, query) {
        Ok(report) => {
            output::print_banner_report(&report, root);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

/// `blog-banner hook ...`: every failure is logged, never propagated.
fn run_hook(root: &Path, args: HookArgs) {
    let event = match read_hook_event(args) {
        Ok(event) => event,
        Err(err) => {
            error!("could not read new-post event: {err}");
            return;
        }
    };
    let config = match config::load_config(root) {
        Ok(config) => config,
        Err(err) => {
            error!("could not load config: {err}");
            return;
        }
    };

    let source = match UnsplashSource::from_env(&config.api) {
        Ok(source) => Some(source),
        Err(err) => {
            debug!(error = %err, "photo source unavailable");
            None
        }
    };
    let outcome = pipeline::on_new_post(
        &config,
        root,
        source.as_ref().map(|s| s as &dyn PhotoSource),
        &event,
    );
    output::print_hook_outcome(&outcome, root);
}

fn read_hook_event(args: HookArgs) -> Result<NewPost, Box<dyn std::error::Error>> {
    if let Some(json) = args.json {
        let event = if json.as_os_str() == "-" {
            serde_json::from_reader(std::io::stdin().lock())?
        } else {
            serde_json::from_reader(std::io::BufReader::new(std::fs::File::open(&json)?))?
        };
        return Ok(event);
    }

    Ok(NewPost {
        title: args.title,
        slug: args.slug,
        path: args.path.ok_or("--path is required")?,
        category: None,
        categories: (!args.category.is_empty()).then(|| CategoryField::Many(args.category)),
    })
}
