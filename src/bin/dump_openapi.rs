use std::fs;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "Write the project-desk OpenAPI document to a file", long_about = None)]
struct Args {
    /// Output path
    #[arg(default_value = "openapi.json")]
    output: std::path::PathBuf,
    /// Port advertised in the `servers` entry
    #[arg(long, default_value_t = 8000)]
    port: u16,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let doc = project_desk::docs::build_openapi(args.port);
    fs::write(&args.output, serde_json::to_string_pretty(&doc)?)?;
    println!("wrote {}", args.output.display());
    Ok(())
}
