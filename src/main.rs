use clap::{ArgAction, Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use shopsync::api::{ApiClient, RequestOptions, Transport};
use shopsync::basket::{BasketMode, BasketStore, LineId, ProductId, ProductRef, UserId};
use shopsync::cache::ResponseCache;
use shopsync::config::Config;
use shopsync::logging::{self, LogTarget};
use shopsync::session::ClientContext;
use shopsync::store::{KeyValueStore, MemoryStore, SqliteStore};

#[derive(Parser, Debug)]
#[command(name = "shopsync")]
#[command(about = "Storefront client: cached API reads and a basket that follows you through login")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/shopsync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Keep all client state in memory for this run only
  #[arg(long)]
  ephemeral: bool,

  /// Increase log verbosity (-v, -vv)
  #[arg(short, long, action = ArgAction::Count)]
  verbose: u8,

  /// Log to stderr instead of the log file
  #[arg(long)]
  log_stderr: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Inspect or change the basket
  Basket {
    #[command(subcommand)]
    action: BasketAction,
  },
  /// Log in and merge the guest basket into the user's basket
  Login {
    user: String,
    #[arg(long)]
    token: String,
  },
  /// Forget the logged-in user and start a fresh guest basket
  Logout,
  /// Inspect the response cache
  Cache {
    #[command(subcommand)]
    action: CacheAction,
  },
}

#[derive(Subcommand, Debug)]
enum BasketAction {
  Show,
  Add {
    product: u64,
    #[arg(short, long, default_value_t = 1)]
    quantity: u32,
  },
  Update {
    line: String,
    #[arg(allow_negative_numbers = true)]
    quantity: i64,
  },
  Remove {
    line: String,
  },
  Clear,
}

#[derive(Subcommand, Debug)]
enum CacheAction {
  Stats,
  Clear,
  /// Drop every entry whose key starts with PREFIX (e.g. GET_/api/products)
  Invalidate {
    prefix: String,
  },
  /// Print a live cached response
  Get {
    key: String,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let target = if args.log_stderr {
    LogTarget::Stderr
  } else {
    LogTarget::default_file()?
  };
  let _guard = logging::init(&target, args.verbose)?;

  let config = Config::load(args.config.as_deref())?;

  let store: Arc<dyn KeyValueStore> = if args.ephemeral {
    Arc::new(MemoryStore::new())
  } else {
    match &config.storage.path {
      Some(path) => Arc::new(SqliteStore::open(path)?),
      None => Arc::new(SqliteStore::open_default()?),
    }
  };

  let context = ClientContext::new(config.cache.clone(), store);
  let warmed = context.cache().warm_start().await;
  info!(entries = warmed, "Response cache warmed");

  let auth = context.restore().await;
  if context.credential().get().is_none() {
    if let Some(token) = Config::env_token() {
      context.credential().set(Some(token));
    }
  }

  let client = Arc::new(ApiClient::new(&config.api, &context)?);
  let api: Arc<dyn Transport> = client.clone();
  let basket = BasketStore::with_api_root(&context, Arc::clone(&api), &auth, &config.api.root);

  match args.command {
    Command::Basket { action } => {
      // Start from the backing so the printed basket is complete
      basket.load().await?;
      run_basket(action, &basket, api.as_ref(), &config.api.root).await?;
      print_basket(&basket);
    }
    Command::Login { user, token } => {
      let user = UserId::new(user);
      if let BasketMode::Remote { user: current } = basket.mode() {
        info!(from = %current, to = %user, "Switching user");
        basket.logout().await;
      }
      context.login(user.clone(), token).await;
      println!("Logged in as {}", user);

      // The login stands even when the basket could not be merged
      match basket.merge(user).await {
        Ok(_) => print_basket(&basket),
        Err(e) => {
          warn!(error = %e, "Basket merge failed");
          eprintln!("Could not merge your basket: {}", e);
        }
      }
    }
    Command::Logout => {
      context.logout().await;
      basket.logout().await;
      println!("Logged out");
    }
    Command::Cache { action } => run_cache(action, client.cache()).await?,
  }

  Ok(())
}

async fn run_basket(
  action: BasketAction,
  basket: &BasketStore,
  api: &dyn Transport,
  root: &str,
) -> Result<()> {
  match action {
    BasketAction::Show => {}
    BasketAction::Add { product, quantity } => {
      let product = fetch_product(api, root, ProductId(product)).await?;
      let line = basket.add_line(product, quantity).await?;
      println!("Added: {} x{}", product_label(&line.product), line.quantity);
    }
    BasketAction::Update { line, quantity } => {
      let line = basket.update_quantity(&LineId::new(line), quantity).await?;
      println!("Updated: {} x{}", product_label(&line.product), line.quantity);
    }
    BasketAction::Remove { line } => basket.remove_line(&LineId::new(line)).await?,
    BasketAction::Clear => basket.clear().await?,
  }
  Ok(())
}

async fn fetch_product(api: &dyn Transport, root: &str, id: ProductId) -> Result<ProductRef> {
  let path = format!("{}/products/{}", root.trim_end_matches('/'), id);
  let body = api.request(&path, RequestOptions::get()).await?;
  serde_json::from_value(body).map_err(|e| eyre!("Unexpected product response for {}: {}", id, e))
}

async fn run_cache(action: CacheAction, cache: &ResponseCache) -> Result<()> {
  match action {
    CacheAction::Stats => {
      let stats = cache.stats();
      let config = cache.config();
      println!("enabled:       {}", config.enabled);
      println!("ttl:           {}s", config.ttl_secs);
      println!("entries:       {}/{}", stats.entries, config.max_size);
      println!("hits:          {}", stats.hits);
      println!("misses:        {}", stats.misses);
      println!("sets:          {}", stats.sets);
      println!("evictions:     {}", stats.evictions);
      println!("invalidations: {}", stats.invalidations);
    }
    CacheAction::Clear => {
      cache.clear().await;
      println!("Cache cleared");
    }
    CacheAction::Invalidate { prefix } => {
      let removed = cache.invalidate(&prefix).await;
      println!("Removed {} entries", removed);
    }
    CacheAction::Get { key } => match cache.get(&key).await {
      Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
      None => println!("Not cached: {}", key),
    },
  }
  Ok(())
}

fn product_label(product: &ProductRef) -> String {
  product
    .name
    .clone()
    .unwrap_or_else(|| format!("product {}", product.id))
}

fn print_basket(basket: &BasketStore) {
  let lines = basket.lines();
  match basket.mode() {
    BasketMode::Local => println!("Guest basket"),
    BasketMode::Remote { user } => println!("Basket of user {}", user),
  }
  if lines.is_empty() {
    println!("  (empty)");
    return;
  }
  for line in &lines {
    let price = line
      .product
      .price
      .map(|p| format!("{:.2}", p))
      .unwrap_or_else(|| "-".to_string());
    println!(
      "  {:<24} {:<32} {:>4} x {:>8} = {:>9.2}",
      line.id.as_str(),
      product_label(&line.product),
      line.quantity,
      price,
      line.subtotal()
    );
  }
  println!("  Total: {:.2}", basket.total());
}
