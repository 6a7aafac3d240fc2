//! Model inspection command

use anyhow::Result;
use colored::Colorize;
use pricer_lib::PriceService;
use tabled::Tabled;

use crate::output::{
    color_label, format_timestamp, print_heading, print_info, print_json, print_table,
    print_warning, OutputFormat,
};

/// Row for the category table
#[derive(Tabled)]
struct CategoryRow {
    #[tabled(rename = "Code")]
    code: u32,
    #[tabled(rename = "Category")]
    label: String,
}

/// Show the serving model and encoder state
pub fn inspect(service: &PriceService, format: OutputFormat) -> Result<()> {
    let status = service.status();

    match format {
        OutputFormat::Json => print_json(&status)?,
        OutputFormat::Table => {
            print_heading("Price Model");
            println!("Version:                {}", status.model_version.cyan());
            println!("Origin:                 {}", color_label(&status.origin));
            if let Some(generation) = status.generation {
                println!("Generation:             {}", generation);
            }
            if let Some(trained_at) = status.trained_at {
                println!("Trained at:             {}", format_timestamp(trained_at));
            }
            if let Some(rows) = status.training_rows {
                println!("Training rows:          {}", rows);
            }
            println!("Encoder version:        {}", status.encoder_version);
            println!();

            let rows: Vec<CategoryRow> = status
                .categories
                .into_iter()
                .map(|c| CategoryRow {
                    code: c.code,
                    label: c.label,
                })
                .collect();
            print_table(&rows);
            println!();

            if status.origin == "bootstrapped" {
                print_warning("Serving the default seed model; train on real data to replace it");
            }
            print_info(&format!("Model file: {}", status.model_path.display()));
        }
    }

    Ok(())
}
