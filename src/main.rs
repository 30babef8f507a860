mod bbox;
mod config;
mod error;
mod imaging;
mod openai;
mod tools;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{Config, Credentials};
use imaging::{ChannelOrder, Image};
use openai::OpenAiSettings;
use std::path::{Path, PathBuf};
use tools::{
    CountGivenObject, CountRequest, ImageDescription, RegionAttributeDescription, RegionRequest,
    Tool,
};

#[derive(Parser, Debug)]
#[command(
    name = "vision-tools",
    about = "Image description, object counting and region description over the OpenAI vision API",
    version
)]
struct Args {
    /// Path to the TOML configuration file (optional)
    #[arg(long, short = 'c', default_value = "config.toml")]
    config: PathBuf,

    /// Channel order the input file's pixels are stored in
    #[arg(long, value_enum, default_value_t = ChannelOrder::Rgb)]
    channel_order: ChannelOrder,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the available tools
    List,
    /// Describe a whole image
    Describe {
        /// Image file to describe
        image: PathBuf,
    },
    /// Count a kind of object in an image
    Count {
        /// Image file to inspect
        image: PathBuf,
        /// The object description in English
        object: String,
        /// Restrict counting to a region, format `(x1, y1, x2, y2)`
        #[arg(long, short = 'b')]
        bbox: Option<String>,
    },
    /// Describe an attribute of a region of an image
    Region {
        /// Image file to inspect
        image: PathBuf,
        /// Region, format `(x1, y1, x2, y2)`
        bbox: String,
        /// The attribute to describe
        attribute: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    pretty_env_logger::init();

    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let args = Args::parse();

    let config = load_config(&args.config)?;

    match args.command {
        Command::List => {
            let settings = match openai_settings(&config) {
                Ok(settings) => Some(settings),
                Err(e) => {
                    log::warn!("Tools cannot be set up: {:#}", e);
                    None
                }
            };
            let configured = settings.is_some();
            let settings = settings.unwrap_or_else(|| OpenAiSettings::new(""));

            print_tool(ImageDescription::new(settings.clone()), configured)?;
            print_tool(CountGivenObject::new(settings.clone()), configured)?;
            print_tool(RegionAttributeDescription::new(settings), configured)?;
        }
        Command::Describe { image } => {
            let mut tool = ImageDescription::new(openai_settings(&config)?);
            tool.setup()?;
            let description = tool.apply(open_image(&image, args.channel_order)?).await?;
            println!("{}", description);
        }
        Command::Count {
            image,
            object,
            bbox,
        } => {
            let mut tool = CountGivenObject::new(openai_settings(&config)?);
            tool.setup()?;
            let count = tool
                .apply(CountRequest {
                    image: open_image(&image, args.channel_order)?,
                    object,
                    bbox,
                })
                .await?;
            println!("{}", count);
        }
        Command::Region {
            image,
            bbox,
            attribute,
        } => {
            let mut tool = RegionAttributeDescription::new(openai_settings(&config)?);
            tool.setup()?;
            let description = tool
                .apply(RegionRequest {
                    image: open_image(&image, args.channel_order)?,
                    bbox,
                    attribute,
                })
                .await?;
            println!("{}", description);
        }
    }

    Ok(())
}

/// Read the config file if present, otherwise fall back to defaults.
fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let config = Config::from_file(path)?;
        log::info!("Configuration loaded from {}", path.display());
        Ok(config)
    } else {
        log::info!("No config file at {}, using defaults", path.display());
        Ok(Config::default())
    }
}

/// Resolve the API key and build the client settings.
fn openai_settings(config: &Config) -> Result<OpenAiSettings> {
    let credentials = Credentials::load(config.credentials_path())?;
    let settings = config.openai_settings(&credentials)?;
    log::info!("Client settings: {:?}", settings);
    Ok(settings)
}

fn open_image(path: &Path, order: ChannelOrder) -> Result<Image> {
    let image = Image::open(path, order)
        .with_context(|| format!("Failed to open image {}", path.display()))?;
    log::info!(
        "Opened {} ({}x{}, {:?})",
        path.display(),
        image.width(),
        image.height(),
        image.order()
    );
    Ok(image)
}

/// Print one line per tool, setting it up first when a key is available.
fn print_tool<T: Tool>(mut tool: T, configured: bool) -> Result<()> {
    if configured {
        tool.setup()?;
    }
    let status = if tool.is_ready() { "ready" } else { "no API key" };
    println!("{:<30} {:<12} {}", tool.name(), status, tool.description());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::CannedInferencer;
    use image::{Rgb, RgbImage};
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_channel_order_defaults_to_rgb() {
        let args = Args::try_parse_from(["vision-tools", "describe", "photo.jpg"]).unwrap();
        assert_eq!(args.channel_order, ChannelOrder::Rgb);
    }

    #[tokio::test]
    async fn test_bgr_input_reaches_api_as_rgb() {
        let dir = std::env::temp_dir().join(format!("vision-tools-main-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("frame.png");
        RgbImage::from_pixel(4, 4, Rgb([255, 0, 0])).save(&path).unwrap();

        let args = Args::try_parse_from([
            "vision-tools",
            "--channel-order",
            "bgr",
            "describe",
            path.to_str().unwrap(),
        ])
        .unwrap();
        let Command::Describe { image } = args.command else {
            panic!("expected describe subcommand");
        };

        let canned = Arc::new(CannedInferencer::new(
            json!({"choices": [{"pred_answer": "a blue square"}]}),
        ));
        let tool = ImageDescription::with_inferencer(Box::new(canned.clone()));
        let answer = tool
            .apply(open_image(&image, args.channel_order).unwrap())
            .await
            .unwrap();
        assert_eq!(answer, "a blue square");

        // Stored [255, 0, 0] read as BGR is blue once reordered.
        let seen = canned.seen.lock().unwrap();
        assert_eq!(seen[0].3, [0, 0, 255]);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
