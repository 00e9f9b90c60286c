use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use veilchain::progress::{Phase, SinkFn};
use veilchain::{calculate_capacity, PixelGrid, VeilchainStego};

/// Veilchain - pointer-chain image steganography
#[derive(Parser)]
#[command(name = "veilchain")]
#[command(version)]
#[command(about = "Hide an encrypted message in an image as a keyed pixel chain", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed a secret message into an image and print the extraction key
    Embed {
        /// Input cover image path
        #[arg(short, long)]
        input: PathBuf,

        /// Output stego image path (lossless format required)
        #[arg(short, long)]
        output: PathBuf,

        /// Secret message (text)
        #[arg(short, long, conflicts_with = "file")]
        message: Option<String>,

        /// Secret message file path
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Alias count: expected pointer values per chain pixel
        #[arg(short, long, default_value_t = veilchain::DEFAULT_ALIAS)]
        alias: u16,

        /// Report quality metrics (PSNR, MAE) against the cover
        #[arg(short = 'q', long)]
        quality: bool,
    },
    /// Extract a hidden message using the key printed at embed time
    Extract {
        /// Stego image with hidden data
        #[arg(short, long)]
        stego: PathBuf,

        /// Extraction key (hex string)
        #[arg(short, long)]
        key: String,

        /// Output file for the extracted message (stdout if omitted)
        #[arg(short = 'O', long)]
        output: Option<PathBuf>,
    },
    /// Show how much an image can carry
    Info {
        /// Image file path
        #[arg(short, long)]
        image: PathBuf,
    },
}

/// Refuse output formats that would destroy the chain.
fn validate_lossless_format(path: &Path) -> anyhow::Result<()> {
    let ext = path
        .extension()
        .ok_or_else(|| anyhow!("output file must have an extension (e.g. .png)"))?;
    match ext.to_string_lossy().to_lowercase().as_str() {
        "jpg" | "jpeg" => Err(anyhow!(
            "JPEG is lossy and will destroy the hidden chain; use PNG, BMP or TIFF"
        )),
        "png" | "bmp" | "tif" | "tiff" => Ok(()),
        other => {
            eprintln!("warning: unknown format '.{other}', make sure it is lossless");
            Ok(())
        }
    }
}

/// Peak signal-to-noise ratio over the colour channels.
fn calculate_psnr(before: &[u8], after: &[u8]) -> f64 {
    let mut mse = 0.0;
    let mut count = 0usize;
    for (a, b) in before.chunks_exact(4).zip(after.chunks_exact(4)) {
        for i in 0..3 {
            let diff = a[i] as f64 - b[i] as f64;
            mse += diff * diff;
            count += 1;
        }
    }
    mse /= count as f64;
    if mse == 0.0 {
        f64::INFINITY
    } else {
        20.0 * (255.0_f64).log10() - 10.0 * mse.log10()
    }
}

/// Mean absolute error over the colour channels.
fn calculate_mae(before: &[u8], after: &[u8]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for (a, b) in before.chunks_exact(4).zip(after.chunks_exact(4)) {
        for i in 0..3 {
            sum += (a[i] as f64 - b[i] as f64).abs();
            count += 1;
        }
    }
    sum / count as f64
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Embed {
            input,
            output,
            message,
            file,
            alias,
            quality,
        } => {
            validate_lossless_format(&output)?;

            let carrier = image::open(&input)
                .with_context(|| format!("cannot load cover image {}", input.display()))?;
            let mut grid = PixelGrid::from_image(&carrier);
            let (w, h) = (grid.width(), grid.height());
            let capacity = calculate_capacity(grid.pixel_count());
            println!("cover: {} ({w}x{h}, capacity {capacity} bytes)", input.display());

            let message_bytes = match (message, file) {
                (Some(text), _) => text.into_bytes(),
                (None, Some(path)) => fs::read(&path)
                    .with_context(|| format!("cannot read message file {}", path.display()))?,
                (None, None) => return Err(anyhow!("provide --message or --file")),
            };
            if message_bytes.is_empty() {
                return Err(anyhow!("message is empty"));
            }
            if message_bytes.len() > capacity {
                return Err(anyhow!(
                    "message too large: {} bytes, capacity {} bytes",
                    message_bytes.len(),
                    capacity
                ));
            }
            println!(
                "message: {} bytes ({:.1}% of capacity)",
                message_bytes.len(),
                100.0 * message_bytes.len() as f64 / capacity as f64
            );

            let before = quality.then(|| grid.as_bytes().to_vec());

            let engine = VeilchainStego::with_alias(alias);
            let mut last_phase: Option<Phase> = None;
            let mut sink = SinkFn(|_: f64, phase: Phase| {
                if last_phase != Some(phase) {
                    println!("  [{phase}]");
                    last_phase = Some(phase);
                }
            });
            let start_time = std::time::Instant::now();
            let outcome = engine.embed(&mut grid, &message_bytes, &mut sink)?;
            let elapsed = start_time.elapsed();

            let stats = &outcome.stats;
            println!(
                "chain: {} positions, {} pixels changed ({} channels, {:.3}% of image), {:.2}s",
                stats.chain_len,
                stats.pixels_modified,
                stats.channels_modified,
                stats.percent_modified,
                elapsed.as_secs_f64()
            );

            if let Some(before) = before {
                let psnr = calculate_psnr(&before, grid.as_bytes());
                let mae = calculate_mae(&before, grid.as_bytes());
                println!("quality: PSNR {psnr:.2} dB, MAE {mae:.6}");
            }

            grid.into_image()
                .save(&output)
                .with_context(|| format!("cannot save stego image {}", output.display()))?;
            println!("stego image written to {}", output.display());
            println!();
            println!("extraction key (keep it safe, it cannot be recovered):");
            println!("{}", outcome.key);
        }

        Commands::Extract { stego, key, output } => {
            let stego_image = image::open(&stego)
                .with_context(|| format!("cannot load stego image {}", stego.display()))?;
            let grid = PixelGrid::from_image(&stego_image);
            println!(
                "stego: {} ({}x{})",
                stego.display(),
                grid.width(),
                grid.height()
            );

            let engine = VeilchainStego::new();
            let extracted = engine.extract(&grid, &key)?;

            match output {
                Some(path) => {
                    fs::write(&path, &extracted)
                        .with_context(|| format!("cannot write {}", path.display()))?;
                    println!("extracted {} bytes to {}", extracted.len(), path.display());
                }
                None => match String::from_utf8(extracted) {
                    Ok(text) => println!("{text}"),
                    Err(err) => {
                        println!(
                            "binary data ({} bytes), use --output to save it",
                            err.as_bytes().len()
                        );
                    }
                },
            }
        }

        Commands::Info { image } => {
            let img = image::open(&image)
                .with_context(|| format!("cannot load image {}", image.display()))?;
            let grid = PixelGrid::from_image(&img);
            let pixels = grid.pixel_count();
            let capacity = calculate_capacity(pixels);
            println!("image: {} ({}x{})", image.display(), grid.width(), grid.height());
            println!("pixels: {pixels}");
            println!(
                "capacity: {} bytes ({:.2} KB) at any alias setting",
                capacity,
                capacity as f64 / 1024.0
            );
        }
    }

    Ok(())
}
