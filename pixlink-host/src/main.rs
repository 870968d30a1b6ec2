//! CLI for the pixlink serial display link.

#![allow(clippy::print_stderr)]

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pixlink_host::link::Link;
use pixlink_host::{
    codec, Config, Emulator, FdLink, RateShaper, RgbImage, SerialLink, Transmitter,
};
use pixlink_protocol::rle::PIXEL_RECORD_LEN;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pixlink", version, about = "Send bitmaps to a serial display")]
struct Cli {
    /// Configuration file (TOML).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Raise log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Transfer a raw RGB image, then refresh the display.
    ///
    /// Without --port the link is stdin/stdout, e.g.
    /// `pixlink send img.rgb > /dev/ttyAMA0 < /dev/ttyAMA0`.
    Send(SendArgs),

    /// Run-length encode stdin to stdout.
    Encode {
        /// Bytes per record; only the first is compared.
        #[arg(long, default_value_t = PIXEL_RECORD_LEN)]
        record_len: usize,
    },

    /// Expand a run-length stream from stdin to stdout.
    Decode {
        /// Bytes per output record.
        #[arg(long, default_value_t = PIXEL_RECORD_LEN)]
        record_len: usize,

        /// Byte value used for lit records.
        #[arg(long, default_value_t = 0xFF)]
        on_value: u8,
    },

    /// Copy stdin to stdout at serial-line pace.
    Shape {
        /// Fixed inter-byte delay in microseconds.
        #[arg(long)]
        delay_us: Option<u64>,
    },

    /// Act as the display device on stdin/stdout, drawing to stderr.
    Emulate,
}

#[derive(Args)]
struct SendArgs {
    /// Raw RGB image, width * height * 3 bytes.
    image: PathBuf,

    /// Serial device to open instead of using stdin/stdout.
    #[arg(short, long)]
    port: Option<String>,

    /// Line speed for --port.
    #[arg(long)]
    baud: Option<u32>,

    /// Total transmissions allowed per frame.
    #[arg(long)]
    attempts: Option<u8>,

    /// Reply timeout in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Colour channel (0-2) whose non-zero value lights a pixel.
    #[arg(long)]
    channel: Option<usize>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(e) = cli.dispatch() {
        eprintln!("pixlink: {e:#}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

impl Cli {
    fn dispatch(self) -> Result<()> {
        let config = load_config(self.config.as_deref())?;
        match self.command {
            Command::Send(args) => send(config, args),
            Command::Encode { record_len } => {
                codec::encode_stream(io::stdin().lock(), io::stdout().lock(), record_len)?;
                Ok(())
            }
            Command::Decode {
                record_len,
                on_value,
            } => {
                codec::decode_stream(io::stdin().lock(), io::stdout().lock(), record_len, on_value)?;
                Ok(())
            }
            Command::Shape { delay_us } => shape(config, delay_us),
            Command::Emulate => emulate(&config),
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn send(mut config: Config, args: SendArgs) -> Result<()> {
    if let Some(port) = args.port {
        config.link.port = Some(port);
    }
    if let Some(baud) = args.baud {
        config.link.baud = baud;
    }
    if let Some(attempts) = args.attempts {
        config.retry.attempts = attempts;
    }
    if let Some(ms) = args.timeout_ms {
        config.link.reply_timeout_ms = ms;
    }
    if let Some(channel) = args.channel {
        config.display.channel = channel;
    }

    let geometry = config.geometry()?;
    let image = RgbImage::load(&args.image, geometry)
        .with_context(|| format!("failed to load image {}", args.image.display()))?;

    match config.link.port.clone() {
        Some(port) => {
            let link = SerialLink::open(&port, &config.serial())
                .with_context(|| format!("failed to open serial port {port}"))?;
            transfer(link, &config, &image)
        }
        None => transfer(FdLink::stdio()?, &config, &image),
    }
}

fn transfer<L: Link>(link: L, config: &Config, image: &RgbImage) -> Result<()> {
    let mut transmitter =
        Transmitter::new(link, config.retry_policy())?.with_channel(config.channel()?)?;
    let stats = transmitter.send_image(image)?;
    info!(
        rows = stats.rows,
        frames = stats.frames_sent,
        naks = stats.naks,
        timeouts = stats.timeouts,
        "done"
    );
    Ok(())
}

fn shape(config: Config, delay_us: Option<u64>) -> Result<()> {
    let shaper = match delay_us {
        Some(us) => RateShaper::new(Duration::from_micros(us)),
        None => RateShaper::new(config.shaper_delay()),
    };
    shaper.run(io::stdin().lock(), io::stdout().lock())?;
    Ok(())
}

fn emulate(config: &Config) -> Result<()> {
    let mut emulator = Emulator::new(config.geometry()?)?;
    emulator.run_stdio()?;
    Ok(())
}
