use std::{
    cell::OnceCell,
    error::Error,
    io::Write,
    path::{Path, PathBuf},
    process::ExitCode,
    str::FromStr,
};

use clap::{
    builder::{PossibleValuesParser, TypedValueParser},
    Parser,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use ubuntu_iso_download::{
    default_keyring_path, download, Architecture, Client, EventHandler, ManifestEntry,
    MetaRelease, ReleaseCatalogue, Sha256Digest, Transport, TrustedKey, UnknownName, Variant,
    VariantKind,
};

/// Download and verify Ubuntu ISO images.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Product to download.
    #[arg(value_parser = names::<VariantKind>(VariantKind::NAMES))]
    flavor: VariantKind,

    /// Release codename (like `noble`) or version (like `24.04`).
    ///
    /// If omitted, the latest LTS release is used.
    release: Option<String>,

    /// CPU architecture of the image.
    #[arg(short, long, default_value = "amd64", value_parser = names::<Architecture>(Architecture::NAMES))]
    arch: Architecture,

    /// Mirror of releases.ubuntu.com. Only used for Desktop and Server
    /// images of supported releases.
    #[arg(short, long)]
    mirror: Option<String>,

    /// Keyring with the Ubuntu CD signing key.
    ///
    /// Default is /usr/share/keyrings/ubuntu-archive-keyring.gpg.
    #[arg(short, long)]
    keyring: Option<PathBuf>,

    /// Directory to write the image.
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Print the URL of the image, but don't download it.
    #[arg(long)]
    dry_run: bool,

    /// With --dry-run, print all locations of the image as JSON.
    #[arg(long, requires = "dry_run")]
    json: bool,

    /// Show debug messages.
    #[arg(long)]
    debug: bool,
}

/// Parser for values in a closed set of names.
fn names<T>(valid: &'static [&'static str]) -> impl TypedValueParser<Value = T>
where
    T: FromStr<Err = UnknownName> + Clone + Send + Sync + 'static,
{
    PossibleValuesParser::new(valid.iter().copied()).try_map(|s| s.parse::<T>())
}

#[derive(Default)]
struct Logger {
    progress: OnceCell<ProgressBar>,
}

impl Logger {
    fn progress_bar(length: Option<u64>) -> ProgressBar {
        match length {
            Some(length) => ProgressBar::new(length).with_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            ),

            None => ProgressBar::new_spinner().with_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {bytes} ({bytes_per_sec})")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            ),
        }
    }
}

impl EventHandler for Logger {
    fn http_request(&self, url: &str) {
        debug!(url, "GET");
    }

    fn signature_verified(&self, manifest_url: &str) {
        info!("GPG signature verified for {manifest_url}");
    }

    fn checksum_selected(&self, entry: &ManifestEntry) {
        debug!(filename = %entry.filename, digest = %entry.digest, "Expected SHA-256");
    }

    fn checksum_not_found(&self, manifest_url: &str) {
        error!("No ISO hash found in {manifest_url}");
    }

    fn download_start(&self, url: &str, length: Option<u64>) {
        info!("Downloading {url}");
        self.progress.get_or_init(|| Self::progress_bar(length));
    }

    fn download_progress_bytes(&self, bytes: usize) {
        if let Some(bar) = self.progress.get() {
            bar.inc(bytes as u64);
        }
    }

    fn download_finished(&self, path: &Path) {
        if let Some(bar) = self.progress.get() {
            bar.finish_and_clear();
        }

        info!("Verifying SHA-256 of {}", path.display());
    }

    fn local_digest(&self, digest: &Sha256Digest) {
        debug!(%digest, "Local SHA-256");
    }

    fn artifact_removed(&self, path: &Path) {
        error!("Removed {}", path.display());
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Oops: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let logger = Logger::default();
    let client = Client::new(&logger);

    run_with(args, &client, &logger, &mut std::io::stdout().lock())
}

/// Resolve the image selected in `args`, and download it with
/// `transport`.
///
/// With `--dry-run`, the location of the image is written to `out`, and
/// neither the keyring nor the checksum manifest are read.
fn run_with<E: EventHandler>(
    args: &Args,
    transport: &impl Transport,
    event_handler: &E,
    out: &mut impl Write,
) -> Result<(), Box<dyn Error>> {
    let catalogue = MetaRelease::fetch(transport)?;
    let release = catalogue.resolve(args.release.as_deref())?;

    let variant = Variant::new(args.flavor, release, args.arch, args.mirror.as_deref())?;
    let target = variant.target();

    if args.dry_run {
        if args.json {
            serde_json::to_writer_pretty(&mut *out, &target)?;
            writeln!(out)?;
        } else {
            writeln!(out, "{}", target.artifact_url)?;
        }

        return Ok(());
    }

    let keyring = args.keyring.clone().unwrap_or_else(default_keyring_path);
    let key = TrustedKey::load(&keyring).map_err(ubuntu_iso_download::Error::TrustKeyMissing)?;

    info!("Selected {variant}");

    let path = download(&target, transport, &key, event_handler, &args.output)?;

    info!("Download complete and successfully verified: {}", path.display());

    Ok(())
}
