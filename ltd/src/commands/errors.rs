use anyhow::{Result, bail};
use ltd_common::errors::ErrorCode;

/// Print the whole catalog grouped by category, or one entry in full.
pub fn show(code: Option<&str>) -> Result<u8> {
    match code {
        Some(code) => {
            let Some(found) = ErrorCode::from_code_string(code) else {
                bail!("unknown error code '{code}', run `ltd errors` for the list");
            };
            print!("{}", found.entry().format_full());
        }
        None => {
            let mut category = None;
            for code in ErrorCode::all() {
                if category != Some(code.category()) {
                    category = Some(code.category());
                    println!("{}:", code.category());
                }
                println!("  {}", code.entry().format_brief());
            }
        }
    }
    Ok(0)
}
