use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use x_writing::analyze::{extract_topics, generate_advice};
use x_writing::config::Config;
use x_writing::env_files::load_env_files;
use x_writing::x_client::api::{Feed, Post, TopicResearch};
use x_writing::x_client::auth::Auth;
use x_writing::x_client::{start_time_days_ago, FetchWindow, Identity, XClient};

#[derive(Parser, Debug)]
#[command(author, version, about = "X writing system CLI", long_about = None)]
struct Cli {
    /// Optional .env file(s) to load. Can be passed multiple times.
    #[arg(long = "env-file", global = true)]
    env_files: Vec<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch recent posts
    Fetch(FetchArgs),
    /// Generate writing suggestions
    Advise(AdviseArgs),
}

#[derive(clap::Args, Debug)]
struct AccountArgs {
    #[arg(long, default_value_t = 30, allow_negative_numbers = true)]
    days: i64,
    #[arg(long, default_value_t = 100, allow_negative_numbers = true)]
    max_results: i64,
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    user_id: Option<String>,
}

#[derive(clap::Args, Debug)]
struct FetchArgs {
    #[command(flatten)]
    account: AccountArgs,
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long)]
    print_start_time: bool,
}

#[derive(clap::Args, Debug)]
struct AdviseArgs {
    #[arg(long)]
    draft: Option<String>,
    #[arg(long)]
    draft_file: Option<PathBuf>,
    /// A file written by `fetch --out`, or a bare JSON list of posts
    #[arg(long)]
    posts: Option<PathBuf>,
    #[command(flatten)]
    account: AccountArgs,
    /// Comma-separated topic overrides
    #[arg(long)]
    topics: Option<String>,
    /// Max extracted topics from draft
    #[arg(long, default_value_t = 5)]
    max_topics: usize,
    /// Lookback days for topic research
    #[arg(long, default_value_t = 7, allow_negative_numbers = true)]
    topic_days: i64,
    /// Per-topic X search result cap
    #[arg(long, default_value_t = 25, allow_negative_numbers = true)]
    topic_max_results: i64,
    #[arg(long)]
    no_topic_research: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // NB: logs go to stderr; stdout is reserved for JSON and advice
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "x_writing=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let loaded = load_env_files(&cli.env_files);
    debug!(?loaded, "loaded env files");
    let config = Config::from_env();

    match cli.command {
        Command::Fetch(args) => fetch(&config, args).await,
        Command::Advise(args) => advise(&config, args).await,
    }
}

async fn fetch_feed(config: &Config, account: &AccountArgs) -> x_writing::Result<Feed> {
    let client = XClient::new(Auth::select(config)?);
    let identity = Identity::choose(
        account.user_id.as_deref(),
        account.username.as_deref(),
        config,
    )?;
    let window = FetchWindow {
        days: account.days,
        max_results: account.max_results,
    };
    client.fetch_recent_posts(&window, &identity).await
}

async fn fetch(config: &Config, args: FetchArgs) -> Result<()> {
    if args.print_start_time {
        let window = FetchWindow {
            days: args.account.days,
            max_results: args.account.max_results,
        };
        println!("{}", start_time_days_ago(window.clamped_days()));
        return Ok(());
    }

    let feed = fetch_feed(config, &args.account).await?;
    let json = serde_json::to_string_pretty(&feed)?;

    match args.out {
        Some(out) => {
            if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Could not create {}", parent.display()))?;
            }
            fs::write(&out, json).with_context(|| format!("Could not write {}", out.display()))?;
            println!("Wrote {} posts to {}", feed.meta.post_count, out.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn read_draft(args: &AdviseArgs) -> Result<String> {
    if let Some(draft) = &args.draft {
        return Ok(draft.clone());
    }
    if let Some(path) = &args.draft_file {
        return fs::read_to_string(path)
            .with_context(|| format!("Could not read draft from {}", path.display()));
    }
    bail!("Provide --draft or --draft-file")
}

fn load_posts(path: &Path) -> Result<Vec<Post>> {
    let payload = fs::read_to_string(path)
        .with_context(|| format!("Could not read posts from {}", path.display()))?;
    let payload: Value = serde_json::from_str(&payload)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    Ok(match payload {
        Value::Array(posts) => posts,
        Value::Object(mut envelope) => match envelope.remove("data") {
            Some(Value::Array(posts)) => posts,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    })
}

fn resolve_topics(args: &AdviseArgs, draft: &str) -> Vec<String> {
    match &args.topics {
        Some(topics) => topics
            .split(',')
            .map(str::trim)
            .filter(|topic| !topic.is_empty())
            .map(String::from)
            .collect(),
        None => extract_topics(draft, args.max_topics),
    }
}

/// Account fetch and topic research fail independently; either failure becomes a note in the
/// report instead of aborting it.
async fn advise(config: &Config, args: AdviseArgs) -> Result<()> {
    let draft = read_draft(&args)?;

    let (posts, account_fetch_error) = match &args.posts {
        Some(path) => (load_posts(path)?, None),
        None => match fetch_feed(config, &args.account).await {
            Ok(feed) => (feed.data, None),
            Err(e) => {
                warn!(error = %e, "account fetch failed");
                (Vec::new(), Some(e.to_string()))
            }
        },
    };

    let topics = resolve_topics(&args, &draft);

    let topic_research = if args.no_topic_research || topics.is_empty() {
        None
    } else {
        Some(match Auth::select(config) {
            Ok(auth) => {
                XClient::new(auth)
                    .search_topic_posts(&topics, args.topic_days, args.topic_max_results)
                    .await
            }
            Err(e) => {
                warn!(error = %e, "topic research unavailable");
                TopicResearch::failed(&e.to_string())
            }
        })
    };

    let advice = generate_advice(
        &draft,
        &posts,
        topic_research.as_ref(),
        &topics,
        account_fetch_error.as_deref(),
    );
    println!("{advice}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use x_writing::x_client::search_lookback_days;

    #[test]
    fn test_parse_advise() {
        let cli = Cli::parse_from([
            "x-writing",
            "advise",
            "--draft",
            "hello",
            "--topics",
            " rust, ,AI tools ",
            "--topic-days",
            "30",
            "--env-file",
            "a.env",
            "--env-file",
            "b.env",
        ]);
        assert_eq!(cli.env_files, vec![PathBuf::from("a.env"), PathBuf::from("b.env")]);
        let Command::Advise(args) = cli.command else {
            panic!("expected advise");
        };
        assert_eq!(args.account.days, 30);
        assert_eq!(args.account.max_results, 100);
        assert_eq!(args.topic_days, 30);
        assert_eq!(args.topic_max_results, 25);
        assert_eq!(resolve_topics(&args, "ignored"), vec!["rust", "AI tools"]);
        assert_eq!(read_draft(&args).unwrap(), "hello");
    }

    #[test]
    fn test_parse_fetch() {
        let cli = Cli::parse_from([
            "x-writing",
            "fetch",
            "--max-results",
            "-1",
            "--username",
            "jack",
            "--print-start-time",
        ]);
        let Command::Fetch(args) = cli.command else {
            panic!("expected fetch");
        };
        assert_eq!(args.account.max_results, -1);
        assert_eq!(args.account.username.as_deref(), Some("jack"));
        assert!(args.print_start_time);
        assert!(args.out.is_none());
    }

    #[test]
    fn test_load_posts_accepts_envelope_and_list() {
        let dir = std::env::temp_dir().join(format!("x-writing-posts-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let envelope = dir.join("envelope.json");
        fs::write(&envelope, r#"{"meta":{},"data":[{"id":"1"},{"id":"2"}]}"#).unwrap();
        assert_eq!(load_posts(&envelope).unwrap().len(), 2);

        let list = dir.join("list.json");
        fs::write(&list, r#"[{"id":"1"}]"#).unwrap();
        assert_eq!(load_posts(&list).unwrap().len(), 1);

        let other = dir.join("other.json");
        fs::write(&other, r#"{"meta":{}}"#).unwrap();
        assert!(load_posts(&other).unwrap().is_empty());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_negative_lookbacks_are_clamped() {
        let cli = Cli::parse_from([
            "x-writing",
            "advise",
            "--draft",
            "x",
            "--topic-days",
            "-3",
            "--days",
            "-2",
        ]);
        let Command::Advise(args) = cli.command else {
            panic!("expected advise");
        };
        assert_eq!(args.topic_days, -3);
        assert_eq!(search_lookback_days(args.topic_days), 1);

        let window = FetchWindow {
            days: args.account.days,
            max_results: args.account.max_results,
        };
        assert_eq!(window.clamped_days(), 0);
    }

    #[test]
    fn test_draft_required() {
        let cli = Cli::parse_from(["x-writing", "advise"]);
        let Command::Advise(args) = cli.command else {
            panic!("expected advise");
        };
        assert!(read_draft(&args).is_err());
    }
}
