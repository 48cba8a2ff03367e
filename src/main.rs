mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use segmentator::config::SegmentatorConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "segmentator", version, about = "User segmentation engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage the segment catalog
    Segment {
        #[command(subcommand)]
        action: SegmentAction,
    },
    /// Manage the mirrored user store
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Assign segments to users
    Assign {
        /// User id (repeatable)
        #[arg(short, long = "user", required = true)]
        users: Vec<i64>,
        /// Segment slug (repeatable)
        #[arg(short, long = "segment", required = true)]
        segments: Vec<String>,
    },
    /// Remove segments from users
    Unassign {
        #[arg(short, long = "user", required = true)]
        users: Vec<i64>,
        #[arg(short, long = "segment", required = true)]
        segments: Vec<String>,
    },
    /// Assign and unassign segments for one user in one transaction
    Update {
        user_id: i64,
        /// Segment slug to assign (repeatable)
        #[arg(long = "add")]
        assign: Vec<String>,
        /// Segment slug to unassign (repeatable)
        #[arg(long = "remove")]
        unassign: Vec<String>,
    },
    /// Show the active segments of a user
    Segments { user_id: i64 },
    /// Roll a segment out to a percentage of active users
    AutoAssign {
        /// Percentage of active users, 1-100
        fraction: u32,
        slug: String,
    },
    /// Export a user's membership history for a month range (yyyy-mm)
    History {
        user_id: i64,
        start: String,
        end: String,
    },
    /// Run database diagnostics
    Doctor,
}

#[derive(Subcommand)]
enum SegmentAction {
    /// Create a segment, or reactivate a deleted one
    Create { slug: String },
    /// Soft-delete a segment and unassign it from everyone
    Delete { slug: String },
    /// List segments
    List {
        /// Include deleted segments
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Add a user or update its active flag
    Add {
        user_id: i64,
        #[arg(long)]
        inactive: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config (for log level)
    let config = SegmentatorConfig::load()?;

    // Log to stderr so stdout stays clean for JSON output.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Command::Doctor = cli.command {
        return cli::doctor::doctor(&config);
    }

    let service = segmentator::service::SegmentService::open(&config)?;
    let ctx = segmentator::segment::Context::background();

    match cli.command {
        Command::Segment { action } => match action {
            SegmentAction::Create { slug } => {
                service.insert_segment(&ctx, &slug).await?;
                cli::print_json(&serde_json::json!({ "created": slug }))?;
            }
            SegmentAction::Delete { slug } => {
                service.delete_segment(&ctx, &slug).await?;
                cli::print_json(&serde_json::json!({ "deleted": slug }))?;
            }
            SegmentAction::List { all } => {
                cli::print_json(&service.list_segments(&ctx, all).await?)?;
            }
        },
        Command::User { action } => match action {
            UserAction::Add { user_id, inactive } => {
                service.register_user(&ctx, user_id, !inactive).await?;
                cli::print_json(&serde_json::json!({ "user_id": user_id, "is_active": !inactive }))?;
            }
        },
        Command::Assign { users, segments } => {
            cli::print_json(&service.assign_segments(&ctx, users, segments).await?)?;
        }
        Command::Unassign { users, segments } => {
            cli::print_json(&service.unassign_segments(&ctx, users, segments).await?)?;
        }
        Command::Update { user_id, assign, unassign } => {
            cli::print_json(&service.update_user_segments(&ctx, user_id, assign, unassign).await?)?;
        }
        Command::Segments { user_id } => {
            cli::print_json(&service.get_user_segments(&ctx, user_id).await?)?;
        }
        Command::AutoAssign { fraction, slug } => {
            cli::print_json(&service.auto_assign(&ctx, fraction, &slug).await?)?;
        }
        Command::History { user_id, start, end } => {
            cli::history::history(&service, &ctx, user_id, &start, &end).await?;
        }
        Command::Doctor => {}
    }

    Ok(())
}
