//! asset_migrator CLI - Copy Earth Engine asset trees between accounts.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use asset_migrator::client::DEFAULT_API_BASE;
use asset_migrator::credentials::default_credentials_path;
use asset_migrator::{
    change_tree_permissions, copy_asset_tree, delete_asset_tree, get_tree, Acl, BatchReport,
    Confirm, ConsolePrompt, CredentialManager, EarthEngineClient, EarthEngineSessions, OAuthApp,
    OAuthFlow, SessionFactory, TokenStore,
};

/// CLI tool for migrating Earth Engine assets between repositories.
#[derive(Parser)]
#[command(name = "asset_migrator")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding one credential file per account.
    #[arg(long, env = "EE_TOKEN_DIR")]
    token_dir: PathBuf,

    /// OAuth client ID used for sign-in and refresh tokens.
    #[arg(long, env = "EE_CLIENT_ID")]
    client_id: String,

    /// OAuth client secret.
    #[arg(long, env = "EE_CLIENT_SECRET", hide_env_values = true)]
    client_secret: String,

    /// Earth Engine REST API base URL.
    #[arg(long, env = "EE_API_URL", default_value = DEFAULT_API_BASE)]
    api_url: String,

    /// Default credential file written by the sign-in flow.
    #[arg(long, env = "EE_CREDENTIALS_SLOT")]
    credentials_slot: Option<PathBuf>,

    /// Seconds to wait for the browser redirect before asking for the code.
    #[arg(long, env = "EE_SIGN_IN_TIMEOUT", default_value_t = 300)]
    sign_in_timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

/// Permissions to apply.
#[derive(Args)]
struct AclArgs {
    /// Principal granted read access (user:, group:, serviceAccount: or domain: prefix).
    #[arg(long = "reader")]
    readers: Vec<String>,

    /// Principal granted write access.
    #[arg(long = "writer")]
    writers: Vec<String>,

    /// Make the assets publicly readable.
    #[arg(long)]
    all_users_can_read: bool,
}

impl AclArgs {
    fn to_acl(&self) -> Result<Acl> {
        Ok(Acl::new(
            self.readers.clone(),
            self.writers.clone(),
            self.all_users_can_read,
        )?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Copy a tree to another account, optionally deleting the source.
    Migrate {
        /// Root to copy from.
        source: String,

        /// Root to copy to.
        destination: String,

        /// Principal granted read access on the source tree.
        #[arg(long)]
        source_reader: Vec<String>,

        /// Principal granted write access on the source tree.
        #[arg(long)]
        source_writer: Vec<String>,

        /// Make the source tree publicly readable.
        #[arg(long)]
        source_all_users_can_read: bool,

        /// Replace the ACL of every copied asset.
        #[arg(long)]
        change_destination_permissions: bool,

        /// Principal granted read access on the copies.
        #[arg(long)]
        destination_reader: Vec<String>,

        /// Principal granted write access on the copies.
        #[arg(long)]
        destination_writer: Vec<String>,

        /// Make the copies publicly readable.
        #[arg(long)]
        destination_all_users_can_read: bool,

        /// Delete the source tree afterwards (asks twice).
        #[arg(long)]
        delete_source: bool,
    },

    /// Print every asset under a root.
    Tree {
        root: String,
    },

    /// Copy a tree within one account.
    Copy {
        from: String,

        to: String,

        /// Replace the ACL of every copied asset.
        #[arg(long)]
        change_permissions: bool,

        #[command(flatten)]
        acl: AclArgs,
    },

    /// Replace the ACL of a root and everything below it.
    Permissions {
        root: String,

        #[command(flatten)]
        acl: AclArgs,
    },

    /// Delete everything below a root (asks twice).
    Delete {
        root: String,
    },

    /// Print the credential file that can write to a root.
    Credentials {
        root: String,
    },

    /// Refresh the cached asset roots of a credential file.
    AddRoots {
        token: PathBuf,
    },
}

type Manager = CredentialManager<EarthEngineSessions, OAuthFlow>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let app = OAuthApp::new(cli.client_id, cli.client_secret);
    let sessions = EarthEngineSessions::with_base_url(app.clone(), cli.api_url);
    let slot = match cli.credentials_slot {
        Some(slot) => slot,
        None => default_credentials_path().context("Cannot locate the home directory")?,
    };
    let manager = CredentialManager::new(
        TokenStore::new(&cli.token_dir),
        sessions,
        OAuthFlow::new(app).with_timeout(Duration::from_secs(cli.sign_in_timeout)),
        slot,
    );
    let mut prompt = ConsolePrompt::stdio();

    match cli.command {
        Commands::Migrate {
            source,
            destination,
            source_reader,
            source_writer,
            source_all_users_can_read,
            change_destination_permissions,
            destination_reader,
            destination_writer,
            destination_all_users_can_read,
            delete_source,
        } => {
            let source_acl = Acl::new(source_reader, source_writer, source_all_users_can_read)?;
            let destination_acl = if change_destination_permissions {
                Some(Acl::new(
                    destination_reader,
                    destination_writer,
                    destination_all_users_can_read,
                )?)
            } else {
                None
            };

            // Step 1: one credential per side
            let (source_token, destination_token) = manager
                .setup_credentials_for_migration(&source, &destination, &mut prompt)
                .await
                .context("Failed to set up credentials")?;

            // Step 2: let the destination account read the source
            if source_acl != Acl::default() {
                let session = manager.sessions().initialize_from_token(&source_token)?;
                let report = change_tree_permissions(&session, &source, &source_acl)
                    .await
                    .with_context(|| format!("Failed to walk {}", source))?;
                print_batch("Source permissions", &report);
            }

            // Step 3: copy as the destination account
            let session = manager.sessions().initialize_from_token(&destination_token)?;
            let report = copy_asset_tree(&session, &source, &destination, destination_acl.as_ref())
                .await
                .with_context(|| format!("Failed to walk {}", source))?;
            print_batch("Copy", &report.copy);
            if let Some(permissions) = &report.permissions {
                print_batch("Destination permissions", permissions);
            }

            // Step 4: optional cleanup as the source account
            if delete_source {
                let session = manager.sessions().initialize_from_token(&source_token)?;
                match delete_asset_tree(&session, &source, &mut prompt).await? {
                    Some(report) => print_batch("Delete", &report),
                    None => println!("Nothing deleted."),
                }
            }
        }

        Commands::Tree { root } => {
            let session = session_for(&manager, &root, &mut prompt).await?;
            let tree = get_tree(&session, &root, &root)
                .await
                .with_context(|| format!("Failed to walk {}", root))?;

            println!("{:<18} {}", "TYPE", "NAME");
            println!("{}", "-".repeat(100));
            for entry in tree {
                println!("{:<18} {}", entry.asset_type.to_string(), entry.source);
            }
        }

        Commands::Copy {
            from,
            to,
            change_permissions,
            acl,
        } => {
            let acl = if change_permissions {
                Some(acl.to_acl()?)
            } else {
                None
            };
            let session = session_for(&manager, &to, &mut prompt).await?;
            let report = copy_asset_tree(&session, &from, &to, acl.as_ref())
                .await
                .with_context(|| format!("Failed to walk {}", from))?;
            print_batch("Copy", &report.copy);
            if let Some(permissions) = &report.permissions {
                print_batch("Permissions", permissions);
            }
        }

        Commands::Permissions { root, acl } => {
            let acl = acl.to_acl()?;
            let session = session_for(&manager, &root, &mut prompt).await?;
            let report = change_tree_permissions(&session, &root, &acl)
                .await
                .with_context(|| format!("Failed to walk {}", root))?;
            print_batch("Permissions", &report);
        }

        Commands::Delete { root } => {
            let session = session_for(&manager, &root, &mut prompt).await?;
            match delete_asset_tree(&session, &root, &mut prompt).await? {
                Some(report) => print_batch("Delete", &report),
                None => println!("Nothing deleted."),
            }
        }

        Commands::Credentials { root } => {
            let token = manager.smart_get_credentials(&root, &mut prompt).await?;
            println!("{}", token.display());
        }

        Commands::AddRoots { token } => {
            manager
                .add_roots(&token)
                .await
                .with_context(|| format!("Failed to add roots to {:?}", token))?;
            println!("Done.");
        }
    }

    Ok(())
}

/// Open a session with a credential that can write to `root`.
async fn session_for<C: Confirm>(
    manager: &Manager,
    root: &str,
    prompt: &mut C,
) -> Result<EarthEngineClient> {
    let token = manager
        .smart_get_credentials(root, prompt)
        .await
        .with_context(|| format!("No credential for {}", root))?;
    Ok(manager.sessions().initialize_from_token(&token)?)
}

fn print_batch(label: &str, report: &BatchReport) {
    println!(
        "{}: {}/{} succeeded",
        label,
        report.succeeded(),
        report.attempted
    );
    for failure in &report.failures {
        eprintln!("  FAILED {}: {}", failure.path, failure.error);
    }
}
