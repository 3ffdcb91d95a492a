use std::path::PathBuf;

use clap::Parser;
use larvacut_models::CutterConfig;

#[derive(Debug, Parser)]
#[command(
    name = "larvacut",
    about = "Cut fish larvae videos into fixed-size per-larva clips",
    disable_help_subcommand = true
)]
pub struct CliArgs {
    /// Video to cut (.seq, or any container OpenCV can open)
    #[arg(value_name = "VIDEO")]
    pub video: PathBuf,

    /// Folder under which the per-video output folder is created
    #[arg(short = 'o', long = "output-dir", default_value = ".")]
    pub output_dir: PathBuf,

    /// Half side length of the square crop window
    #[arg(long = "padding", value_parser = clap::value_parser!(u32).range(1..))]
    pub padding: Option<u32>,

    /// Frame rate of the written clips
    #[arg(long = "fps")]
    pub fps: Option<f64>,

    /// Minimum blob width in pixels
    #[arg(long = "min-width")]
    pub min_width: Option<u32>,

    /// Minimum blob height in pixels
    #[arg(long = "min-height")]
    pub min_height: Option<u32>,

    /// Brightness added before background subtraction (0-255)
    #[arg(long = "brighten")]
    pub brighten: Option<u8>,

    /// Also brighten the frames written into clips
    #[arg(long = "apply-brightness")]
    pub apply_brightness: bool,

    /// Gaussian blur kernel for preprocessing, 0 disables
    #[arg(long = "blur")]
    pub blur: Option<u32>,

    /// Frames per clip
    #[arg(long = "clip-length", value_parser = clap::value_parser!(u32).range(1..))]
    pub clip_length: Option<u32>,

    /// Rescan cadence as a fraction of the clip length
    #[arg(long = "rescan-fraction")]
    pub rescan_fraction: Option<f64>,

    /// Frames used to train the background model
    #[arg(long = "train-frames")]
    pub train_frames: Option<u32>,

    /// Delete clips whose sharpness falls this far below the running mean
    #[arg(long = "quality-drop")]
    pub quality_drop: Option<f64>,

    /// Print the run summary as JSON on stdout
    #[arg(long = "report-json")]
    pub report_json: bool,
}

impl CliArgs {
    /// Overlay the flags given on the command line onto `config`.
    pub fn apply_to(&self, mut config: CutterConfig) -> CutterConfig {
        if let Some(padding) = self.padding {
            config.padding = padding;
        }
        if let Some(fps) = self.fps {
            config.fps_out = fps;
        }
        if let Some(min_width) = self.min_width {
            config.min_width = min_width;
        }
        if let Some(min_height) = self.min_height {
            config.min_height = min_height;
        }
        if let Some(brighten) = self.brighten {
            config.brighten = brighten;
        }
        if self.apply_brightness {
            config.apply_brightness = true;
        }
        if let Some(blur) = self.blur {
            config.blur = blur;
        }
        if let Some(clip_length) = self.clip_length {
            config.target_length = clip_length;
        }
        if let Some(fraction) = self.rescan_fraction {
            config.rescan_fraction = fraction;
        }
        if let Some(frames) = self.train_frames {
            config.training_frame_count = frames;
        }
        if let Some(drop) = self.quality_drop {
            config.quality_drop = drop;
        }
        config
    }
}
