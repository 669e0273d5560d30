use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use rampgen::cli::Args;
use rampgen::color::DEFAULT_SEED;
use rampgen::config::Config;
use rampgen::service::{GenerateOptions, PaletteService};
use rampgen::theme::Palette;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    rampgen::log::init(args.verbose);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("rampgen: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    args.apply(&mut config);
    Ok(config)
}

fn emit(args: &Args, palette: &Palette, index: u32) -> Result<()> {
    match &args.output {
        Some(path) if args.count > 1 => {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("palette");
            let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("json");
            palette.write_to(&path.with_file_name(format!("{stem}-{index}.{ext}")))?;
        }
        Some(path) => palette.write_to(path)?,
        None => println!("{}", palette.to_json()?),
    }
    if args.preview {
        rampgen::tui::preview(palette)?;
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    if args.init_config {
        let path = Config::init()?;
        println!("{}", path.display());
        return Ok(());
    }

    let config = load_config(&args)?;
    let service = if args.offline {
        PaletteService::offline(&config)
    } else {
        PaletteService::from_config(&config)
    }
    .context("Failed to start palette service")?;

    let result = generate_all(&service, &args).await;
    service.shutdown().await;
    result
}

async fn generate_all(service: &PaletteService, args: &Args) -> Result<()> {
    let seed = args
        .seed
        .clone()
        .unwrap_or_else(|| DEFAULT_SEED.to_string());
    let options = GenerateOptions {
        harmonized: args.harmonized,
    };

    for index in 1..=args.count {
        let palette = service
            .generate_palette(&seed, args.scheme, options)
            .await
            .with_context(|| format!("request {index} of {} failed", args.count))?;
        emit(args, &palette, index)?;
    }
    Ok(())
}
