use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

use crlink::broker;
use crlink::common::config::PairConfig;
use crlink::common::errors::PairError;
use crlink::common::security;
use crlink::desktop::{OutgoingDocument, PdfSender, PhotoInbox, PhotoSink, ReceivedPhoto};
use crlink::invite::{Invite, PairMode};
use crlink::mobile::{self, PhotoShutter};
use crlink::qr;
use crlink::rendezvous::RendezvousClient;

#[derive(Parser)]
#[command(name = "crlink")]
#[command(about = "QR pairing and direct transfer for operative reports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the rendezvous broker peers use to find each other
    Broker {
        #[arg(long, default_value = "127.0.0.1:9473")]
        listen: SocketAddr,
    },

    /// Show a QR invitation and collect photos from the paired phone
    Photos {
        #[arg(long, default_value = "photos", help = "Directory for received photos")]
        out: PathBuf,
    },

    /// Show a QR invitation and hand a finished report to the phone
    Send {
        #[arg(help = "Path to the report PDF")]
        path: PathBuf,
        #[arg(long, default_value = "Patient")]
        patient: String,
    },

    /// Act as the phone: join a session from a scanned invitation URL
    Join {
        url: String,
        #[arg(long = "photo", help = "JPEG file(s) standing in for the shutter")]
        photos: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Broker { listen } => run_broker(listen).await,
        Commands::Photos { out } => run_photos(load_config()?, out).await,
        Commands::Send { path, patient } => run_send(load_config()?, path, patient).await,
        Commands::Join { url, photos } => run_join(load_config()?, url, photos).await,
    }
}

fn load_config() -> Result<PairConfig> {
    PairConfig::load().context("invalid crlink configuration")
}

/// Setup-time failures are terminal: tell the operator how to recover
/// instead of looping against a dead broker or a stale code.
fn rescan_hint(err: PairError) -> anyhow::Error {
    anyhow::anyhow!(
        "{err}\n{}",
        style("Connection failed. Close this session and scan a fresh QR code.").yellow()
    )
}

async fn run_broker(listen: SocketAddr) -> Result<()> {
    let (addr, handle) = broker::serve(listen).await?;
    println!("rendezvous broker on {addr}");
    handle.await?;
    Ok(())
}

async fn run_photos(config: PairConfig, out: PathBuf) -> Result<()> {
    tokio::fs::create_dir_all(&out)
        .await
        .with_context(|| format!("cannot create {}", out.display()))?;

    let client = RendezvousClient::new(config.clone());
    let dir = out.clone();
    let sink: PhotoSink = Arc::new(move |photo: ReceivedPhoto| {
        let path = dir.join(format!("photo-{:03}.jpg", photo.index));
        match std::fs::write(&path, &photo.bytes) {
            Ok(()) => println!("  {} {}", style("saved").green(), path.display()),
            Err(err) => eprintln!("  {} {}: {err}", style("failed").red(), path.display()),
        }
    });

    let inbox = PhotoInbox::open(&client, sink).await.map_err(rescan_hint)?;
    qr::print_invite(&inbox.invite().to_url(&config.app_origin))?;
    println!("{}", style("Scan with the phone to send photos here.").dim());

    let serve_loop = async {
        loop {
            inbox.serve_once().await.map_err(rescan_hint)?;
            println!(
                "{} ({} photo(s) so far, same code stays valid)",
                style("Phone disconnected").dim(),
                inbox.received()
            );
        }
    };

    let outcome: Result<()> = tokio::select! {
        outcome = serve_loop => outcome,
        _ = tokio::signal::ctrl_c() => Ok(()),
    };

    println!("\n{} photo(s) received", inbox.received());
    inbox.close().await;
    outcome
}

async fn run_send(config: PairConfig, path: PathBuf, patient: String) -> Result<()> {
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("compte-rendu.pdf")
        .to_string();

    let client = RendezvousClient::new(config.clone());
    let sender = PdfSender::open(
        &client,
        OutgoingDocument {
            bytes,
            filename,
            patient_label: patient,
        },
    )
    .await
    .map_err(rescan_hint)?;

    qr::print_invite(&sender.invite().to_url(&config.app_origin))?;
    println!("{}", style("Scan with the phone to receive the report.").dim());

    let channel = sender.serve().await.map_err(rescan_hint)?;
    println!(
        "{}",
        style("Report sent. Leave this open until the phone finishes sharing, then Ctrl-C.")
            .green()
    );

    let _ = tokio::signal::ctrl_c().await;
    channel.close();
    sender.close().await;
    Ok(())
}

async fn run_join(config: PairConfig, url: String, photos: Vec<PathBuf>) -> Result<()> {
    let invite = Invite::parse(&url).context("not a pairing invitation URL")?;
    let client = RendezvousClient::new(config);
    let channel = mobile::connect(&client, &invite).await.map_err(rescan_hint)?;

    match invite.mode() {
        PairMode::Photo => {
            if photos.is_empty() {
                bail!("photo mode needs at least one --photo file to send");
            }
            let shutter = PhotoShutter::new(channel);
            for path in &photos {
                let jpeg = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("cannot read {}", path.display()))?;
                let count = shutter.send_photo(&jpeg)?;
                println!("{count} photo(s) sent");
            }
            shutter.close();
        }
        PairMode::Pdf => {
            println!("{}", style("Waiting for the report…").dim());
            let document = mobile::receive_document(&channel).await.map_err(rescan_hint)?;
            let name = if security::validate_filename(&document.filename).is_ok() {
                document.filename.clone()
            } else {
                crlink::mobile::receive::DEFAULT_FILENAME.to_string()
            };
            tokio::fs::write(&name, &document.bytes)
                .await
                .with_context(|| format!("cannot write {name}"))?;
            println!(
                "Saved {} for {} ({} bytes)",
                style(&name).bold(),
                document.patient_label,
                document.bytes.len()
            );
            channel.close();
        }
    }

    Ok(())
}
