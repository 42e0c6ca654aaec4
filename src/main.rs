use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use newsdesk::article::{
    Action, Actor, Article, ArticleFields, ArticleId, CategoryId, ReviewQueue, Role, UserId,
};
use newsdesk::config::Config;
use newsdesk::fetcher::PageLoad;
use newsdesk::gateway::HttpGateway;
use newsdesk::logging::init_tracing;
use newsdesk::moderation::{ModerationAction, Outcome};
use newsdesk::session::{NewsroomSession, Performed};
use newsdesk::store::ListFilter;

/// Newsdesk: article moderation client for the news portal
#[derive(Parser, Debug)]
#[command(name = "newsdesk", version)]
#[command(about = "Article moderation client for the news portal", long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/newsdesk/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Act as <role>:<user-id>, e.g. admin:1 or editor:3
    #[arg(long = "as", global = true, value_name = "ROLE:ID")]
    actor: Option<Actor>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show an admin review queue
    Queue {
        #[arg(value_enum, default_value = "new")]
        queue: QueueArg,

        /// Load every page instead of just the first
        #[arg(long)]
        all: bool,
    },
    /// List articles
    List {
        /// Only articles by this author
        #[arg(long, conflicts_with = "published")]
        author: Option<i64>,

        /// Only published articles
        #[arg(long)]
        published: bool,

        /// Narrow published articles to a category
        #[arg(long, requires = "published")]
        category: Option<i64>,

        /// Load every page instead of just the first
        #[arg(long)]
        all: bool,
    },
    /// Show one article and what the current actor may do with it
    Show { id: i64 },
    /// Perform a moderation action
    Act {
        id: i64,

        /// submit, approve, reject, request-edit, approve-change, reject-change,
        /// request-deletion, confirm-deletion, reject-deletion, resubmit, unpublish
        action: Action,

        /// New title (request-edit, resubmit)
        #[arg(long)]
        title: Option<String>,

        /// New content (request-edit, resubmit)
        #[arg(long)]
        content: Option<String>,
    },
    /// Create a draft
    Create {
        #[arg(long)]
        title: String,

        #[arg(long)]
        content: String,

        #[arg(long)]
        category: Option<i64>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum QueueArg {
    New,
    Changes,
}

impl From<QueueArg> for ReviewQueue {
    fn from(arg: QueueArg) -> Self {
        match arg {
            QueueArg::New => ReviewQueue::NewContent,
            QueueArg::Changes => ReviewQueue::ChangeRequests,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load config")?;

    let gateway = Arc::new(HttpGateway::new(&config).context("Failed to set up HTTP client")?);
    tracing::debug!(base_url = gateway.base_url(), "Gateway ready");
    let session = NewsroomSession::with_config(gateway, &config);

    let result = run(&session, &cli).await;
    session.close();
    result
}

async fn run(session: &NewsroomSession<HttpGateway>, cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Queue { queue, all } => {
            let queue = ReviewQueue::from(*queue);
            show_list(session, ListFilter::Review(queue), *all).await
        }
        Commands::List {
            author,
            published,
            category,
            all,
        } => {
            let filter = match (author, published) {
                (Some(author), _) => ListFilter::ByAuthor(UserId(*author)),
                (None, true) => ListFilter::Published {
                    category: category.map(CategoryId),
                },
                (None, false) => ListFilter::All,
            };
            show_list(session, filter, *all).await
        }
        Commands::Show { id } => {
            let id = ArticleId(*id);
            let article = session.article(id).await?;
            print_detail(&article);
            if let Some(actor) = cli.actor {
                let caps = session.capabilities(id, actor.role).await?;
                println!("locked:     {}", caps.locked);
                let actions: Vec<&str> = caps.actions.iter().map(Action::as_str).collect();
                println!(
                    "actions:    {}",
                    if actions.is_empty() {
                        "-".to_string()
                    } else {
                        actions.join(", ")
                    }
                );
            }
            Ok(())
        }
        Commands::Act {
            id,
            action,
            title,
            content,
        } => {
            let actor = require_actor(cli)?;
            let id = ArticleId(*id);
            let fields = match (title, content) {
                (None, None) => None,
                _ => {
                    let current = session.article(id).await?.fields();
                    Some(ArticleFields {
                        title: title.clone().unwrap_or(current.title),
                        content: content.clone().unwrap_or(current.content),
                        ..current
                    })
                }
            };
            let action = ModerationAction::from_kind(*action, fields)
                .ok_or_else(|| anyhow!("{} needs --title and/or --content", action))?;
            let performed = session.perform(&action, id, &actor).await?;
            report(&performed);
            Ok(())
        }
        Commands::Create {
            title,
            content,
            category,
        } => {
            let actor = require_actor(cli)?;
            let mut fields = ArticleFields::new(title.clone(), content.clone());
            if let Some(category) = category {
                fields = fields.with_category(CategoryId(*category));
            }
            let performed = session.create(fields, &actor).await?;
            report(&performed);
            Ok(())
        }
    }
}

fn require_actor(cli: &Cli) -> Result<Actor> {
    match cli.actor {
        Some(actor) if actor.role != Role::User => Ok(actor),
        Some(_) => bail!("readers cannot moderate articles"),
        None => bail!("--as <role>:<user-id> is required for this command"),
    }
}

async fn show_list(
    session: &NewsroomSession<HttpGateway>,
    filter: ListFilter,
    all: bool,
) -> Result<()> {
    session.open(filter).await?;
    if all {
        while let PageLoad::Loaded { .. } = session.load_more(filter).await? {}
    }

    let articles = session.store().window(&filter);
    for article in &articles {
        println!(
            "{:>6}  {:<16}  author {:<6}  {}",
            article.id.0,
            article.status.as_str(),
            article.author_id.0,
            article.title
        );
    }
    let total = session
        .fetcher()
        .total_count(&filter)
        .unwrap_or(articles.len() as u64);
    println!("{} ({} of {})", filter, articles.len(), total);
    Ok(())
}

fn print_detail(article: &Article) {
    println!("id:         {}", article.id);
    println!("title:      {}", article.title);
    println!("status:     {}", article.status);
    println!("author:     {}", article.author_id);
    println!("views:      {}", article.views);
    println!("updated:    {}", article.updated_at);
    if let Some(revision) = &article.pending_revision {
        println!("proposed:   {}", revision.title);
    }
    println!();
    println!("{}", article.content);
}

fn report(performed: &Performed) {
    match &performed.outcome {
        Outcome::Created(article) => {
            println!("created article {} ({})", article.id, article.status)
        }
        Outcome::Updated { previous, article } => println!(
            "article {}: {} -> {}",
            article.id, previous.status, article.status
        ),
        Outcome::Removed(article) => println!("article {} deleted", article.id),
    }
    for err in &performed.refresh_errors {
        eprintln!("warning: {}", err);
    }
}
