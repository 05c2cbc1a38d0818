//! CLI command handlers

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use vibe_core::auth::{Account, AccountProvider, StaticAccountProvider, UserIdentity};
use vibe_core::environment::{self, EnvironmentSnapshot};
use vibe_core::mode::{self, ClientMode};
use vibe_core::models::AppConfig;
use vibe_core::schema::{app_schema, create_initial_app_state, App};
use vibe_core::services::logging;
use vibe_core::session::{SessionHandle, SessionTarget};
use vibe_core::startup::StartupFlow;
use vibe_core::status::SessionHeader;

const DEFAULT_CONFIG_FILE: &str = "~/.config/vibe/config.toml";

/// Options of the 'start' command
#[derive(Debug, Default)]
pub struct StartOptions {
    pub client: Option<String>,
    pub container: Option<String>,
    pub user_name: Option<String>,
    pub user_id: Option<String>,
    pub timeout: Option<u64>,
    pub config_file: String,
}

fn snapshot_with_client(client: Option<String>) -> EnvironmentSnapshot {
    environment::probe().with_requested_client(client)
}

/// Handle the 'mode' command
pub fn handle_mode(client: Option<String>, json: bool) -> Result<()> {
    let snapshot = snapshot_with_client(client);
    let selection = mode::select_mode(snapshot.requested_client(), &snapshot);
    let missing: Vec<&str> = selection.missing.iter().map(|k| k.var_name()).collect();

    if json {
        let output = serde_json::json!({
            "mode": selection.mode,
            "fell_back": selection.fell_back,
            "requested": snapshot.requested_client(),
            "missing": missing,
            "timestamp": selection.determined_at.to_rfc3339(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("🔌 Client mode: {}", selection.mode);
    if selection.fell_back {
        println!("⚠️  Falling back to local client; missing: {}", missing.join(", "));
    } else if selection.mode == ClientMode::Local {
        println!("ℹ️  Local client requested explicitly");
    }
    Ok(())
}

/// Expand `~/` and map the default path to the platform config directory
fn resolve_config_path(config_file: &str) -> Result<PathBuf> {
    if config_file == DEFAULT_CONFIG_FILE {
        return AppConfig::default_config_path()
            .map_err(|e| anyhow::anyhow!("Failed to get default config path: {}", e));
    }

    if let Some(rest) = config_file.strip_prefix("~/") {
        let home = std::env::var("HOME")
            .map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        return Ok(PathBuf::from(home).join(rest));
    }

    Ok(PathBuf::from(config_file))
}

fn load_config(config_file: &str) -> Result<AppConfig> {
    let path = resolve_config_path(config_file)?;
    let config = AppConfig::load_from_file(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load config {}: {}", path.display(), e))?;

    if let Err(errors) = config.validate() {
        return Err(anyhow::anyhow!(
            "Invalid configuration in {}:\n  {}",
            path.display(),
            errors.join("\n  ")
        ));
    }
    Ok(config)
}

/// Identity of the signed-in account, when a user name or id was given.
///
/// An id without a name signs in under the id as username.
async fn signed_in_identity(
    user_name: Option<String>,
    user_id: Option<String>,
) -> Result<Option<UserIdentity>> {
    let account = match (user_name, user_id) {
        (None, None) => return Ok(None),
        (Some(name), id) => Account {
            home_account_id: id.unwrap_or_else(|| derived_user_id(&name)),
            username: name.clone(),
            name: Some(name),
        },
        (None, Some(id)) => Account {
            home_account_id: id.clone(),
            username: id,
            name: None,
        },
    };
    let provider = StaticAccountProvider::new(vec![account]);
    provider.sign_in().await.context("Sign-in failed")?;

    Ok(provider.active_account().await.as_ref().map(UserIdentity::from))
}

fn derived_user_id(name: &str) -> String {
    format!("{}-{}", name.to_lowercase().replace(' ', "-"), std::process::id())
}

/// Handle the 'start' command
pub async fn handle_start(options: StartOptions) -> Result<()> {
    let config = load_config(&options.config_file)?;
    if let Err(e) = logging::init_logging(config.log_level) {
        eprintln!("Warning: logging already initialized: {}", e);
    }

    let identity = signed_in_identity(
        options.user_name.or(config.user_name),
        options.user_id.or(config.user_id),
    )
    .await?;

    let mut flow = StartupFlow::new(snapshot_with_client(options.client));
    let selection = flow.select_mode()?;
    logging::log_startup_event("select_mode", &selection.mode.to_string(), None);

    if selection.mode == ClientMode::Remote {
        if let Some(settings) = flow.snapshot().auth_settings() {
            tracing::debug!(
                client_id = %settings.client_id,
                tenant_id = %settings.tenant_id,
                "Identity settings available"
            );
        }
    }

    flow.build_config(identity)
        .context("Failed to build connection config")?;

    let schema = app_schema();
    let target = SessionTarget::from_id(options.container);
    let timeout_secs = options.timeout.unwrap_or(config.connect_timeout_seconds);

    println!("🔌 Connecting ({} client)...", selection.mode);
    let connect = flow.connect(create_initial_app_state, &schema, target);
    let result = if timeout_secs > 0 {
        match tokio::time::timeout(Duration::from_secs(timeout_secs), connect).await {
            Ok(result) => result,
            Err(_) => {
                logging::log_error("connect timed out", Some(&selection.mode.to_string()));
                return Err(anyhow::anyhow!(
                    "Timed out after {}s opening the session",
                    timeout_secs
                ));
            }
        }
    } else {
        connect.await
    };

    let handle: SessionHandle<App> = match result {
        Ok(handle) => handle,
        Err(e) => {
            logging::log_error(&e.to_string(), Some("session bootstrap"));
            return Err(e).context("Failed to open session");
        }
    };
    logging::log_startup_event("connect", "connected", Some(handle.container_id()));

    println!("✅ Session ready");
    println!("📄 Container: {}", handle.container_id());
    if let Some(tagline) = &handle.view().read().await.metadata.tagline {
        println!("💬 {}", tagline);
    }
    println!("{}", SessionHeader::from_session(&handle).await);
    println!("Press Ctrl-C to leave the session");

    watch_session(&handle).await?;

    handle.dispose();
    println!("👋 Session closed");
    Ok(())
}

/// Reprint the header on every container event until Ctrl-C
async fn watch_session(handle: &SessionHandle<App>) -> Result<()> {
    let mut events = handle.container().subscribe();

    loop {
        tokio::select! {
            result = signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                return Ok(());
            }
            event = events.recv() => {
                match event {
                    Some(event) => {
                        tracing::debug!(?event, "Container event");
                        println!("{}", SessionHeader::from_session(handle).await);
                    }
                    None => return Ok(()),
                }
            }
        }
    }
}

/// Handle the 'config --init' command
pub fn handle_config_init(config_file: String) -> Result<()> {
    println!("⚙️  Initializing vibe configuration");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config_path = resolve_config_path(&config_file)?;
    println!("📄 Config file: {}", config_path.display());

    let config = if config_path.exists() {
        println!("⚠️  Configuration file already exists. Keeping existing values...");
        AppConfig::load_from_file(&config_path)
            .map_err(|e| anyhow::anyhow!("Failed to load existing config: {}", e))?
    } else {
        println!("✨ Creating new configuration with defaults...");
        AppConfig::default()
    };

    println!("\n🔍 Validating configuration...");
    if let Err(errors) = config.validate() {
        println!("❌ Configuration validation failed:");
        for error in &errors {
            println!("  - {}", error);
        }
        return Err(anyhow::anyhow!("Configuration validation failed"));
    }
    println!("✅ Configuration is valid");

    config
        .save_to_file(&config_path)
        .map_err(|e| anyhow::anyhow!("Failed to save config: {}", e))?;
    println!("💾 Configuration saved to {}", config_path.display());
    Ok(())
}
