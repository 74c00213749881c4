//! webpush-dispatch CLI - send VAPID-signed web push batches.
//!
//! This is the main binary entry point. See the `webpush_dispatch` library
//! for the core functionality.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use tokio_util::sync::CancellationToken;

use webpush_dispatch::dispatch::PushTarget;
use webpush_dispatch::{
    Config, Dispatcher, FileSubscriptionStore, HttpTransport, NotificationPayload,
    PushSubscription, SubscriptionFilter, SubscriptionStore, VapidKeys,
};

/// Global allocator configured per M-MIMALLOC-APPS guideline.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "webpush-dispatch")]
#[command(about = "Send VAPID-signed web push notifications", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new VAPID key pair
    Keygen,
    /// Add or update a push subscription
    Subscribe {
        /// Push service endpoint URL
        #[arg(long)]
        endpoint: String,
        /// Browser P-256 ECDH public key (base64url)
        #[arg(long)]
        p256dh: String,
        /// Browser auth secret (base64url)
        #[arg(long)]
        auth: String,
        /// Owning user
        #[arg(long)]
        user: Option<String>,
    },
    /// Remove a push subscription
    Unsubscribe {
        /// Push service endpoint URL
        #[arg(long)]
        endpoint: String,
    },
    /// List stored subscriptions
    List {
        /// Only subscriptions owned by this user
        #[arg(long)]
        user: Option<String>,
    },
    /// Send a notification (to everyone unless a target is given)
    Send {
        /// Notification title
        #[arg(long)]
        title: String,
        /// Notification body
        #[arg(long)]
        body: String,
        /// Click destination
        #[arg(long)]
        link: Option<String>,
        /// Icon URL
        #[arg(long)]
        icon: Option<String>,
        /// Badge URL
        #[arg(long)]
        badge: Option<String>,
        /// Only this user's subscriptions
        #[arg(long, conflicts_with = "endpoint")]
        user: Option<String>,
        /// Only this endpoint
        #[arg(long)]
        endpoint: Option<String>,
    },
    /// Print the VAPID token for an endpoint's origin
    Token {
        /// Push service endpoint URL
        #[arg(long)]
        endpoint: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen => {
            let keys = VapidKeys::generate();
            println!("WEBPUSH_VAPID_PUBLIC_KEY={}", keys.public_key_base64url());
            println!("WEBPUSH_VAPID_PRIVATE_KEY={}", keys.private_key_base64url());
        }
        Commands::Subscribe {
            endpoint,
            p256dh,
            auth,
            user,
        } => {
            PushTarget::parse(&endpoint)?;
            let store = open_store(&Config::load()?)?;
            let mut subscription = PushSubscription::new(endpoint, p256dh, auth);
            subscription.user_id = user;
            store.upsert(subscription).await?;
            println!("Subscription saved to {}", store.path().display());
        }
        Commands::Unsubscribe { endpoint } => {
            let store = open_store(&Config::load()?)?;
            if store.remove(&endpoint).await? {
                println!("Subscription removed.");
            } else {
                println!("No subscription for that endpoint.");
            }
        }
        Commands::List { user } => {
            let store = open_store(&Config::load()?)?;
            let filter = user.map_or(SubscriptionFilter::Broadcast, SubscriptionFilter::User);
            let subscriptions = store.list_subscriptions(&filter).await?;
            println!("{}", serde_json::to_string_pretty(&subscriptions)?);
        }
        Commands::Send {
            title,
            body,
            link,
            icon,
            badge,
            user,
            endpoint,
        } => {
            let payload = NotificationPayload {
                link,
                icon,
                badge,
                ..NotificationPayload::new(title, body)
            };
            let filter = match (user, endpoint) {
                (Some(user), _) => SubscriptionFilter::User(user),
                (None, Some(endpoint)) => SubscriptionFilter::Endpoint(endpoint),
                (None, None) => SubscriptionFilter::Broadcast,
            };
            run_send(&payload, &filter).await?;
        }
        Commands::Token { endpoint } => {
            let config = Config::load()?;
            let target = PushTarget::parse(&endpoint)?;
            let token = config.signer()?.sign(&target.audience)?;
            println!("{token}");
        }
    }

    Ok(())
}

fn open_store(config: &Config) -> Result<FileSubscriptionStore> {
    FileSubscriptionStore::open(&config.subscriptions_path)
}

async fn run_send(payload: &NotificationPayload, filter: &SubscriptionFilter) -> Result<()> {
    let config = Config::load()?;
    // Key problems stop here, before any request is made.
    let signer = config.signer()?;
    let transport = HttpTransport::with_timeout(config.request_timeout())
        .context("Failed to create HTTP client")?;
    let dispatcher = Dispatcher::new(signer, transport)
        .with_max_concurrency(config.max_concurrency)
        .with_request_timeout(config.request_timeout());
    let store = open_store(&config)?;

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupted; finishing in-flight sends");
                cancel.cancel();
            }
        })
    };

    let report = dispatcher
        .dispatch_to_store(&store, filter, payload, &cancel)
        .await;
    ctrl_c.abort();

    println!("{}", serde_json::to_string_pretty(&report?)?);
    Ok(())
}
