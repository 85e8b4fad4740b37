use anyhow::Result;
use serde::Serialize;

use crate::cli::OutputFormat;

/// Print a serializable result in the requested format.
pub fn print<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(value)?),
        OutputFormat::Pretty => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

/// Print an error the way the selected format expects.
pub fn print_error(err: &anyhow::Error, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let body = serde_json::json!({
                "status": "error",
                "message": format!("{err:#}"),
            });
            println!("{body}");
        }
        OutputFormat::Pretty => eprintln!("Error: {err:#}"),
    }
}
