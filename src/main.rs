use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "pdf-overlay-translator",
    version,
    about = "Translate OCR'd page images and typeset the translation over the original text"
)]
struct Cli {
    /// Directory holding per-page OCR JSON results (searched recursively)
    #[arg(long = "json-dir")]
    json_dir: Option<String>,

    /// Directory holding the page images (searched recursively)
    #[arg(long = "image-dir")]
    image_dir: Option<String>,

    /// Directory the translated page images are written to
    #[arg(long = "output-dir")]
    output_dir: Option<String>,

    /// Target language (default from settings: en)
    #[arg(short = 'l', long = "lang")]
    lang: Option<String>,

    /// Source language. Use "auto" to detect from the OCR text.
    #[arg(short = 'L', long = "source-lang")]
    source_lang: Option<String>,

    /// API key (overrides the environment variable named in settings)
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Show supported languages and exit
    #[arg(long = "show-languages")]
    show_languages: bool,

    /// Print the run summary as JSON
    #[arg(long = "json")]
    json: bool,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    pdf_overlay_translator::logging::init(cli.verbose)?;

    let config = pdf_overlay_translator::Config {
        lang: cli.lang,
        source_lang: cli.source_lang,
        key: cli.key,
        settings_path: cli.read_settings,
        json_dir: cli.json_dir,
        image_dir: cli.image_dir,
        output_dir: cli.output_dir,
        show_languages: cli.show_languages,
        json_summary: cli.json,
    };
    let output = pdf_overlay_translator::run(config).await?;
    println!("{}", output);
    Ok(())
}
