use std::{str::FromStr, sync::Arc};

use clap::Parser;
use tracing_subscriber::{
    EnvFilter, Layer as _, filter::Directive, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt as _,
};

use solar_formfill::{
    assets::FormAssets,
    extract::{DEFAULT_MAX_ATTEMPTS, VisionExtractor},
    gemini::GeminiModel,
    prelude::*,
    server::{self, AppState},
};

/// Serve the solar-subsidy form-fill API.
#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    after_help = r#"
Environment Variables:
  - GEMINI_API_KEY: The Gemini API key to use.
  - PORT (optional): Override the listen port.
  - GEMINI_MODEL (optional): Override the vision model.

  These variables may be set in a standard `.env` file.
"#
)]
struct Opts {
    /// The port to listen on.
    #[clap(long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// Directory holding the PDF template, the field list, and (optionally)
    /// a Unicode font.
    #[clap(long, default_value = "assets")]
    assets_dir: PathBuf,

    /// The vision model to use for photo extraction.
    #[clap(long, env = "GEMINI_MODEL", default_value = "gemini-flash-lite-latest")]
    model: String,

    /// Maximum model attempts per image while the service is overloaded.
    #[clap(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,
}

/// Our entry point, which can return an error. [`anyhow::Result`] will
/// automatically print a nice error message with optional backtrace.
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing.
    let directive =
        Directive::from_str("info").expect("built-in directive should be valid");
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_filter(env_filter);

    // We can stack multiple layers here if we need to.
    tracing_subscriber::registry().with(subscriber).init();

    // Call our real `main` function now that logging is set up.
    real_main().await
}

/// Our real entry point.
#[instrument(level = "debug", name = "main", skip_all)]
async fn real_main() -> Result<()> {
    // Load environment variables from a `.env` file, if it exists.
    dotenvy::dotenv().ok();

    // Parse command-line arguments.
    let opts = Opts::parse();
    debug!("Parsed options: {:?}", opts);

    let model = Arc::new(GeminiModel::new(&opts.model));
    let state = AppState {
        assets: FormAssets::new(&opts.assets_dir),
        extractor: Arc::new(VisionExtractor::new(model, opts.max_attempts)),
    };
    server::serve(state, opts.port).await
}
