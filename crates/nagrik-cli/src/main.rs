//! Nagrik CLI — command shell for the citizen-services components.
//!
//! Backend selection comes from the environment: `NAGRIK_BACKEND`
//! (memory|postgres), `DATABASE_URL`, `NAGRIK_STORAGE_ROOT`,
//! `NAGRIK_DOCUMENTS_BUCKET`. The in-memory backend lives for one process
//! only, so it is mostly useful through `nagrik demo`.

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use nagrik_backend::{create_backend, AuthApi, Backend, DocumentStore, MemoryBackend, MessageStore};
use nagrik_cli::{init_tracing, truncate_string};
use nagrik_client::{
    Dispose, MessageFeed, ProfileView, SelectedFile, SessionGate, SupportWidget, UploadTracker,
};
use nagrik_core::models::{AuthUser, PreferredLanguage, ProfileUpdate};
use nagrik_core::AppConfig;

#[derive(Parser)]
#[command(name = "nagrik", about = "Citizen services portal CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Upload a document and optionally watch its processing status
    Upload {
        /// Path to the file to upload
        file: PathBuf,
        /// Document type (e.g. identity, income, ration)
        #[arg(long = "type")]
        document_type: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Follow processing status events until a terminal state
        #[arg(long)]
        watch: bool,
    },
    /// List uploaded documents
    Documents {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Community chat
    Chat {
        #[command(subcommand)]
        sub: ChatCommands,
    },
    /// Profile operations
    Profile {
        #[command(subcommand)]
        sub: ProfileCommands,
    },
    /// Run a scripted end-to-end demo on the in-memory backend
    Demo,
}

#[derive(Subcommand)]
enum ChatCommands {
    /// Send a message
    Send {
        body: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Follow the live feed until interrupted
    Tail {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Show the stored profile
    Show {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Update profile fields
    Set {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        /// Preferred language code: en, hi, bn, te, ta
        #[arg(long)]
        language: Option<String>,
    },
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

async fn sign_in(backend: &Backend, email: &str, password: &str) -> Result<AuthUser> {
    backend
        .auth
        .sign_in(email, password)
        .await
        .context("Sign-in failed")
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if matches!(cli.command, Commands::Demo) {
        return run_demo().await;
    }

    let config = AppConfig::from_env().context("Invalid configuration")?;
    let backend = create_backend(&config)
        .await
        .context("Failed to construct backend")?;

    match cli.command {
        Commands::Demo => unreachable!("handled above"),

        Commands::Signup { email, password } => {
            let user = backend
                .auth
                .sign_up(&email, &password)
                .await
                .context("Sign-up failed")?;
            println!("Account created: {} ({})", user.email, user.id);
        }

        Commands::Upload {
            file,
            document_type,
            email,
            password,
            watch,
        } => {
            let user = sign_in(&backend, &email, &password).await?;
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read file: {}", file.display()))?;
            let file_name = file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("document")
                .to_string();

            let mut tracker = UploadTracker::new(
                user.id,
                document_type.as_str(),
                config.documents_bucket.as_str(),
                backend.files.clone(),
                backend.documents.clone(),
            )?;
            tracker.select_file(Some(SelectedFile {
                content_type: content_type_for(&file).to_string(),
                file_name,
                data: Bytes::from(data),
            }));

            let document_id = tracker.upload().await?;
            println!("Uploaded document {}", document_id);

            if watch {
                println!("Waiting for processing...");
                let mut events = backend.documents.subscribe_status().await?;
                while let Some(item) = events.next().await {
                    let event = item?;
                    if event.document_id != document_id {
                        continue;
                    }
                    tracker.note_remote_status(&event);
                    println!("status: {}", event.status);
                    if event.status.is_terminal() {
                        break;
                    }
                }
            }
        }

        Commands::Documents { email, password } => {
            let user = sign_in(&backend, &email, &password).await?;
            let documents = backend.documents.list_for_owner(user.id).await?;
            if documents.is_empty() {
                println!("No documents uploaded yet.");
            }
            for doc in documents {
                println!(
                    "{}  {:<12} {:<10} {}",
                    doc.id, doc.document_type, doc.status, doc.created_at
                );
            }
        }

        Commands::Chat { sub } => match sub {
            ChatCommands::Send {
                body,
                email,
                password,
            } => {
                let user = sign_in(&backend, &email, &password).await?;
                let feed = MessageFeed::new(backend.messages.clone(), Some(user.id));
                feed.send(&body).await?;
                println!("Sent.");
            }
            ChatCommands::Tail { email, password } => {
                let user = sign_in(&backend, &email, &password).await?;
                tail_feed(&backend, user).await?;
            }
        },

        Commands::Profile { sub } => match sub {
            ProfileCommands::Show { email, password } => {
                let user = sign_in(&backend, &email, &password).await?;
                let mut view = ProfileView::new(backend.profiles.clone(), user.id);
                let profile = view.load().await?;
                println!("Full name:  {}", profile.full_name.as_deref().unwrap_or("-"));
                println!(
                    "Phone:      {}",
                    profile.phone_number.as_deref().unwrap_or("-")
                );
                println!("Language:   {}", profile.preferred_language.display_name());
            }
            ProfileCommands::Set {
                email,
                password,
                full_name,
                phone,
                language,
            } => {
                let user = sign_in(&backend, &email, &password).await?;
                let mut view = ProfileView::new(backend.profiles.clone(), user.id);
                let current = view.load().await?.clone();

                let preferred_language = match language {
                    Some(code) => code.parse::<PreferredLanguage>()?,
                    None => current.preferred_language,
                };
                let profile = view
                    .submit(ProfileUpdate {
                        full_name: full_name.or(current.full_name),
                        phone_number: phone.or(current.phone_number),
                        preferred_language,
                    })
                    .await?;
                println!(
                    "Saved: {} / {}",
                    profile.full_name.as_deref().unwrap_or("-"),
                    profile.preferred_language.display_name()
                );
            }
        },
    }

    Ok(())
}

async fn tail_feed(backend: &Backend, user: AuthUser) -> Result<()> {
    let feed = Arc::new(MessageFeed::new(backend.messages.clone(), Some(user.id)));
    feed.initialize().await?;

    let gate = SessionGate::new(backend.auth.watch_session());
    let _guard = gate.guard(vec![feed.clone() as Arc<dyn Dispose>]);

    let mut updates = feed.watch_updates();
    let mut printed = 0;
    println!("Following chat (ctrl-c to stop)...");

    loop {
        let snapshot = feed.snapshot();
        for entry in &snapshot[printed..] {
            let who = if entry.mine { "you" } else { "citizen" };
            println!(
                "[{}] {}: {}",
                entry.message.created_at.format("%H:%M:%S"),
                who,
                truncate_string(&entry.message.body, 200)
            );
        }
        printed = snapshot.len();

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                feed.dispose();
                break;
            }
        }
    }
    Ok(())
}

/// Scripted walkthrough of every component against the in-process backend.
async fn run_demo() -> Result<()> {
    use nagrik_core::models::{NewMessage, ProcessingStatus};

    println!("== Nagrik demo (in-memory backend) ==");
    let backend = MemoryBackend::new();
    backend.resolve_session();

    let mut gate = SessionGate::new(backend.watch_session());
    let state = gate.resolved().await;
    anyhow::ensure!(state.user.is_none(), "fresh backend must start signed out");

    backend
        .sign_up("asha@example.org", "demo-password")
        .await?;
    let asha = backend.sign_in("asha@example.org", "demo-password").await?;
    println!("Signed in as {}", asha.email);

    // Profile tab.
    let mut profile = ProfileView::new(backend.clone(), asha.id);
    profile.load().await?;
    let saved = profile
        .submit(ProfileUpdate {
            full_name: Some("Asha Rao".to_string()),
            phone_number: Some("+91 98765 43210".to_string()),
            preferred_language: PreferredLanguage::Te,
        })
        .await?;
    println!(
        "Profile saved: {} ({})",
        saved.full_name.as_deref().unwrap_or("-"),
        saved.preferred_language.display_name()
    );

    // Document upload with a simulated OCR collaborator.
    let mut tracker = UploadTracker::new(
        asha.id,
        "identity",
        "documents",
        backend.clone(),
        backend.clone(),
    )?;
    tracker.select_file(Some(SelectedFile {
        file_name: "passport.pdf".to_string(),
        content_type: "application/pdf".to_string(),
        data: Bytes::from_static(b"%PDF-1.4 demo"),
    }));
    let document_id = tracker.upload().await?;
    println!("Uploaded document {} ({:?})", document_id, tracker.state());

    let mut status_events = backend.subscribe_status().await?;
    for status in [ProcessingStatus::Processing, ProcessingStatus::Complete] {
        backend.set_document_status(document_id, status).await?;
        if let Some(Ok(event)) = status_events.next().await {
            tracker.note_remote_status(&event);
            println!("OCR reported {} -> tracker {:?}", event.status, tracker.state());
        }
    }

    // Community chat with a concurrent writer.
    let feed = Arc::new(MessageFeed::new(backend.clone(), Some(asha.id)));
    feed.initialize().await?;
    let guard = gate.guard(vec![feed.clone() as Arc<dyn Dispose>]);

    feed.send("Namaste! Is my passport verified yet?").await?;
    backend
        .insert(NewMessage {
            sender_id: uuid::Uuid::new_v4(),
            body: "Yes, it shows as complete on my side.".to_string(),
        })
        .await?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    for entry in feed.snapshot() {
        let who = if entry.mine { "asha" } else { "clerk" };
        println!("chat [{}] {}", who, entry.message.body);
    }

    // Support widget.
    let widget = SupportWidget::with_reply_delay(Duration::from_millis(50));
    widget.send("How do I apply for a housing scheme?")?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    for message in widget.transcript() {
        let who = if message.from_user { "asha" } else { "assistant" };
        println!("support [{}] {}", who, truncate_string(&message.body, 80));
    }

    // Sign-out tears the feed down.
    backend.sign_out().await?;
    guard.await?;
    anyhow::ensure!(feed.is_disposed(), "feed must be disposed on sign-out");
    println!("Signed out; feed disposed. Demo complete.");
    Ok(())
}
