use anyhow::{Context, Result};
use clap::Parser;
use image::ImageReader;
use log::info;
use pixel_sampler::{palette, PixelBuffer, PixelSource, Sample, SamplingParams, Strategy};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(about = "Pick representative colored samples from an image")]
pub struct Options {
    #[arg(long, short)]
    input: PathBuf,

    /// JSON output; suffixed with the strategy name when several are given.
    #[arg(long, short)]
    output: PathBuf,

    /// Optional SVG preview, suffixed like the output.
    #[arg(long)]
    svg: Option<PathBuf>,

    #[arg(long, short, default_value = "20000")]
    num_samples: usize,

    #[arg(long, short, default_value = "importance")]
    strategy: Vec<Strategy>,

    /// JSON file with sampling parameters; missing keys keep their defaults.
    #[arg(long, short)]
    params: Option<PathBuf>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value = "4")]
    dominant_colors: usize,
}

#[derive(Serialize)]
struct Output<'a> {
    width: u32,
    height: u32,
    strategy: &'a str,
    samples: Vec<OutputSample>,
}

#[derive(Serialize)]
struct OutputSample {
    x: u32,
    y: u32,
    color: [f32; 4],
}

impl From<&Sample> for OutputSample {
    fn from(s: &Sample) -> Self {
        OutputSample {
            x: s.x,
            y: s.y,
            color: s.color.to_array(),
        }
    }
}

fn suffixed(path: &Path, strategy: Strategy, several: bool) -> PathBuf {
    if !several {
        return path.to_path_buf();
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("samples");
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}-{strategy}.{ext}"),
        None => format!("{stem}-{strategy}"),
    };

    path.with_file_name(name)
}

fn load_params(opt: &Options) -> Result<SamplingParams> {
    let params = match &opt.params {
        Some(path) => {
            let fh = std::fs::File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            serde_json::from_reader(fh)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        }
        None => SamplingParams::default(),
    };

    Ok(match opt.seed {
        Some(seed) => params.with_seed(seed),
        None => params,
    })
}

fn write_output(
    path: &Path,
    strategy: Strategy,
    samples: &[Sample],
    source: &PixelBuffer,
) -> Result<()> {
    let output = Output {
        width: source.width(),
        height: source.height(),
        strategy: strategy.name(),
        samples: samples.iter().map(OutputSample::from).collect(),
    };

    let fh = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer(fh, &output)?;

    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let opt = Options::parse();
    let params = load_params(&opt)?;

    let img = ImageReader::open(&opt.input)?.decode()?;
    let source = PixelBuffer::from(&img);
    let (width, height) = (source.width(), source.height());

    info!("Extract dominant colors");
    let dominant = palette::dominant_colors(&source, opt.dominant_colors);

    let several = opt.strategy.len() > 1;

    info!("Sample {} points with {} strategies", opt.num_samples, opt.strategy.len());
    let results = opt
        .strategy
        .par_iter()
        .map(|&strategy| {
            pixel_sampler::sample(
                strategy,
                width,
                height,
                opt.num_samples,
                &params,
                &source,
                &dominant,
            )
            .map(|samples| (strategy, samples))
            .with_context(|| format!("{strategy} sampling failed"))
        })
        .collect::<Result<Vec<_>>>()?;

    for (strategy, samples) in &results {
        let path = suffixed(&opt.output, *strategy, several);
        info!("Write {} samples to {}", samples.len(), path.display());
        write_output(&path, *strategy, samples, &source)?;

        if let Some(svg) = &opt.svg {
            let path = suffixed(svg, *strategy, several);
            pixel_sampler::svg::write_samples(&path, samples, width, height)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
    }

    Ok(())
}
