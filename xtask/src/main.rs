//! Build automation tasks for aisync
//!
//! - Generating the CLI reference from the clap definitions
//! - Checking that the committed reference is current

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for aisync", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in Markdown
    GenerateCliDocs {
        /// Output file for generated documentation
        #[arg(short, long, default_value = "docs/cli.md")]
        output: String,

        /// Fail instead of writing if the file is out of date
        #[arg(long)]
        check: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output, check } => generate_cli_docs(&output, check)?,
    }

    Ok(())
}

fn render_cli_docs() -> String {
    let markdown = clap_markdown::help_markdown::<aisync_ingest::cli::Cli>();

    format!(
        r#"# aisync-ingest CLI Reference

Mirrors NOAA's yearly AIS archives (https://coast.noaa.gov/htdata/CMSP/AISDataHandler/)
into object storage, one year at a time.

## Quick Start

```bash
# Mirror 2020 into an S3 bucket
export S3_BUCKET=ais-raw
aisync-ingest run --year-start 2020 --year-end 2020

# Resume 2020 after a given day, into a local directory
aisync-ingest run --year-start 2020 --year-end 2021 \
  --resume-from AIS_2020_06_30.zip --local-store ./mirror

# What has been recorded?
aisync-ingest status --id AIS_2020_01_01.zip
```

## Commands

{}

## Environment Variables

- `AISYNC_LISTING_URL` - listing URL template containing `{{year}}`
- `AISYNC_KEY_PREFIX` - object key prefix (default: `raw_data`)
- `AISYNC_LEDGER_PATH` - processed-set ledger (default: `processed_files.txt`)
- `AISYNC_WORK_DIR`, `AISYNC_SCRATCH_ROOT` - scratch locations
- `AISYNC_CONCURRENCY`, `AISYNC_TIMEOUT_SECS`, `AISYNC_MAX_ATTEMPTS`, `AISYNC_RETRY_BASE_DELAY_MS`
- `AISYNC_STORAGE_BACKEND` - `s3` (default) or `gcs`
- `S3_BUCKET`, `S3_ENDPOINT`, `S3_REGION`, `S3_ACCESS_KEY`, `S3_SECRET_KEY`, `S3_PATH_STYLE` - object storage
- `AISYNC_LOG_LEVEL`, `AISYNC_LOG_OUTPUT`, `AISYNC_LOG_FORMAT`, `AISYNC_LOG_DIR` - logging

---

*Generated from the CLI source code. To update, run `cargo xtask generate-cli-docs`.*
"#,
        markdown
    )
}

fn generate_cli_docs(output: &str, check: bool) -> anyhow::Result<()> {
    let content = render_cli_docs();
    let file_path = PathBuf::from(output);

    if check {
        let current = fs::read_to_string(&file_path).unwrap_or_default();
        if current != content {
            anyhow::bail!(
                "{} is out of date; run `cargo xtask generate-cli-docs`",
                file_path.display()
            );
        }
        println!("CLI documentation is up to date");
        return Ok(());
    }

    if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&file_path, content)?;

    println!("Generated CLI documentation at: {}", file_path.display());

    Ok(())
}
