use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use dglab_codec::status::{describe, StatusCode, KNOWN_CODES};
use serde::Serialize;

use crate::cmd::CodesArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct CodeEntry {
    code: StatusCode,
    description: &'static str,
}

pub fn run(_args: CodesArgs, format: OutputFormat) -> CliResult<i32> {
    let entries: Vec<CodeEntry> = KNOWN_CODES
        .iter()
        .map(|&code| CodeEntry {
            code,
            description: describe(code),
        })
        .collect();

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&entries).unwrap_or_else(|_| "[]".to_string())
        ),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CODE", "DESCRIPTION"]);
            for entry in &entries {
                table.add_row(vec![entry.code.to_string(), entry.description.to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for entry in &entries {
                println!("{}  {}", entry.code, entry.description);
            }
        }
    }
    Ok(SUCCESS)
}
