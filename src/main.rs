use blazy::imaging::RustBackend;
use blazy::render::BlazyManager;
use blazy::types::{ItemSettings, RenderContext};
use blazy::{config, lightbox, output, placeholder};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn version_string() -> &'static str {
    let on_tag = env!("BLAZY_ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("BLAZY_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "blazy")]
#[command(about = "Lazy-load attributes for images, iframes and lightboxes")]
#[command(long_about = "\
Lazy-load attributes for images, iframes and lightboxes

Reads item settings as JSON and resolves, for each element, the file URL,
image style dimensions, aspect ratios, placeholder, data-* lazy attributes
and lightbox descriptor.

Item settings (all optional):

  {
    \"uri\": \"public://2024/dawn.jpg\",   # or \"url\" for external files
    \"width\": 2000, \"height\": 1000,
    \"image_style\": \"large\",
    \"responsive_image_style\": \"hero\",
    \"loading\": \"lazy\",                  # lazy | eager | unlazy | defer | slider
    \"ratio\": \"fluid\",
    \"media_switch\": \"colorbox\",
    \"box_style\": \"large\", \"box_caption\": \"alt\"
  }

Image styles, breakpoints and lightboxes come from blazy.toml in the config
directory. Run 'blazy gen-config' to print a documented one.

Logging goes to stderr and follows RUST_LOG (default: blazy=info).")]
#[command(version = version_string())]
struct Cli {
    /// Directory holding blazy.toml
    #[arg(long, default_value = ".", global = true)]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// Human-readable summary
    Summary,
    /// Attribute maps and final settings as JSON
    Json,
    /// Element markup
    Html,
}

#[derive(Subcommand)]
enum Command {
    /// Render a JSON file of item settings (an array, or a single object)
    Render {
        items: PathBuf,
        /// Render as an AMP page (no lazy loading)
        #[arg(long)]
        amp: bool,
        /// Render as an editor preview (no lazy loading)
        #[arg(long)]
        preview: bool,
        /// Render inside a sandboxed embed (no lazy loading, no effects)
        #[arg(long)]
        sandboxed: bool,
        #[arg(long, value_enum, default_value = "summary")]
        format: Format,
    },
    /// Print the SVG placeholder data URI for a size
    Placeholder { width: u32, height: u32 },
    /// Print an embed URL with autoplay forced on
    Autoplay { url: String },
    /// Load and validate blazy.toml without rendering
    Check,
    /// Print a stock blazy.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Render {
            items,
            amp,
            preview,
            sandboxed,
            format,
        } => {
            let config = config::load_config(&cli.config_dir)?;
            init_thread_pool(&config.processing);
            let items = read_items(&items)?;
            let ctx = RenderContext {
                is_amp: amp,
                is_preview: preview,
                is_sandboxed: sandboxed,
            };

            let manager = BlazyManager::new(config, RustBackend::new());
            tracing::info!(items = items.len(), "rendering");
            let rendered = manager.render_all(&ctx, items);

            match format {
                Format::Summary => output::print_render_output(&rendered, &manager.cache().stats()),
                Format::Json => println!("{}", serde_json::to_string_pretty(&rendered)?),
                Format::Html => {
                    for element in &rendered {
                        let preloads = element.preload_markup().into_string();
                        if !preloads.is_empty() {
                            println!("{preloads}");
                        }
                        println!("{}", element.to_markup().into_string());
                    }
                }
            }
        }
        Command::Placeholder { width, height } => {
            println!("{}", placeholder::generate(Some(width), Some(height)));
        }
        Command::Autoplay { url } => {
            println!("{}", lightbox::add_autoplay(&url));
        }
        Command::Check => {
            let config = config::load_config(&cli.config_dir)?;
            output::print_check_output(&config);
            println!("==> Config is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr so stdout stays clean for JSON and HTML output.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("blazy=info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; config can only lower it.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Items from a JSON file holding either one item or an array of them.
fn read_items(path: &Path) -> Result<Vec<ItemSettings>, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&content)?;
    let items = match value {
        serde_json::Value::Array(_) => serde_json::from_value(value)?,
        single => vec![serde_json::from_value(single)?],
    };
    Ok(items)
}
