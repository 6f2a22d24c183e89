use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "shopsync")]
#[command(about = "Synchronize a local product catalog with a remote storefront")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run and inspect catalog syncs
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    /// Manage the manual conflict review queue
    Review {
        #[command(subcommand)]
        command: ReviewCommands,
    },
    /// Inspect locally stored products
    Products {
        #[command(subcommand)]
        command: ProductCommands,
    },
    /// Manage vendors
    Vendors {
        #[command(subcommand)]
        command: VendorCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Run a sync for one vendor
    Run {
        /// Vendor id to sync
        #[arg(long)]
        vendor: String,
        /// Job id grouping related runs (defaults to a fresh id)
        #[arg(long)]
        job: Option<String>,
        /// Sync direction
        #[arg(long, value_enum, default_value_t = DirectionArg::RemoteToLocal)]
        direction: DirectionArg,
        /// Remote page size
        #[arg(long, default_value = "50")]
        batch_size: u32,
        /// Safety bound on remote pagination
        #[arg(long, default_value = "20")]
        max_pages: u32,
        /// Classify everything, write nothing
        #[arg(long)]
        dry_run: bool,
        /// Side that wins vendor-priority decisions
        #[arg(long, value_enum)]
        vendor_priority: Option<PriorityArg>,
        /// Keep local pricing when accepting remote data
        #[arg(long)]
        preserve_pricing: bool,
        /// Keep local inventory when accepting remote data
        #[arg(long)]
        preserve_inventory: bool,
        /// Resolve simultaneous concurrent edits by field-group merge
        #[arg(long)]
        auto_merge: bool,
        /// Never park conflicts for manual review
        #[arg(long)]
        no_manual_review: bool,
        /// Also process products whose signatures are unchanged
        #[arg(long)]
        include_unchanged: bool,
        /// Count any per-product failure as overall failure
        #[arg(long)]
        strict: bool,
        /// Output the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recent sync runs
    Runs {
        /// Number of runs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the event ledger for one run
    Events {
        /// Run id
        run_id: String,
        /// Number of events to show
        #[arg(short, long, default_value = "100")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Retry a prior run under a new run id
    Retry {
        /// Run id to retry
        run_id: String,
        /// Output the run report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum ReviewCommands {
    /// List pending review items, oldest first
    List {
        /// Number of items to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve one pending review item
    Resolve {
        /// Review item id
        id: String,
        /// Decision: accept_local, accept_remote, or custom
        #[arg(long)]
        decision: String,
        /// JSON update payload for custom decisions
        #[arg(long)]
        data: Option<String>,
    },
    /// Expire pending items older than the given number of days
    Expire {
        /// Age threshold in days
        #[arg(long)]
        older_than_days: i64,
    },
}

#[derive(Subcommand)]
pub enum ProductCommands {
    /// List a vendor's products
    List {
        /// Vendor id
        #[arg(long)]
        vendor: String,
        /// Number of products to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum VendorCommands {
    /// Register or update a vendor
    Add {
        /// Vendor id (slug or external id)
        id: String,
        /// Display name, used for remote product matching
        name: String,
        /// Remote store id
        #[arg(long)]
        store: Option<String>,
    },
    /// List registered vendors
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum DirectionArg {
    RemoteToLocal,
    LocalToRemote,
    Bidirectional,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PriorityArg {
    Local,
    Remote,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    Powershell,
    Elvish,
}
