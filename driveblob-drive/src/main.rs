use std::path::PathBuf;

use anyhow::{bail, Context};
use bytes::Bytes;
use tracing::info;
use tracing_subscriber::EnvFilter;

use driveblob_common::backend::content_ref;
use driveblob_common::Storage;
use driveblob_drive::{DriveConfig, DriveStorage};

const USAGE: &str = "usage: driveblob <config.toml> <command> [args]

commands:
  put <file> [ref]     upload a file (ref defaults to its SHA-256)
  get <ref> [out]      download to a file, or stdout
  delete <ref>         remove a stored object
  cleanup <fragment>   remove every object whose name contains fragment";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (Some(config_path), Some(command)) = (args.first(), args.get(1)) else {
        bail!("{}", USAGE);
    };
    let rest = &args[2..];

    let config = DriveConfig::load(&PathBuf::from(config_path))?;
    let storage = DriveStorage::from_config(&config)?;

    match (command.as_str(), rest) {
        ("put", [file, reference @ ..]) if reference.len() <= 1 => {
            let data = tokio::fs::read(file)
                .await
                .with_context(|| format!("Failed to read {}", file))?;
            let reference = reference
                .first()
                .cloned()
                .unwrap_or_else(|| content_ref(&data));
            let size = data.len();
            storage.put(&reference, Bytes::from(data)).await?;
            info!(reference = %reference, size, "Stored");
            println!("{}", reference);
        }
        ("get", [reference, out @ ..]) if out.len() <= 1 => {
            let data = storage.download(reference).await?;
            match out.first() {
                Some(path) => tokio::fs::write(path, &data)
                    .await
                    .with_context(|| format!("Failed to write {}", path))?,
                None => {
                    use tokio::io::AsyncWriteExt;
                    let mut stdout = tokio::io::stdout();
                    stdout.write_all(&data).await?;
                    stdout.flush().await?;
                }
            }
        }
        ("delete", [reference]) => {
            storage.delete(reference).await?;
            info!(reference = %reference, "Deleted");
        }
        ("cleanup", [fragment]) => {
            let deleted = storage.cleanup(fragment).await?;
            println!("{}", deleted);
        }
        _ => bail!("{}", USAGE),
    }

    Ok(())
}
