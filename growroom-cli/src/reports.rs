use anyhow::Result;
use colored::Colorize;
use std::io::Write;

use growroom_engine::{StrainUsage, UsageSummary};

fn tables_label(usage: &StrainUsage) -> String {
    usage
        .tables_spanned
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn generate_console_report(
    out: &mut dyn Write,
    room_name: &str,
    summary: &UsageSummary,
) -> Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "{}",
        format!("🌱 Usage Summary: {room_name}").bright_green().bold()
    )?;
    writeln!(out, "{}", "=".repeat(30).green())?;
    writeln!(out, "Plants per light: {}", summary.plants_per_light)?;
    writeln!(out, "Total plants: {}", summary.total_plants())?;
    writeln!(out)?;

    if summary.strains.is_empty() {
        writeln!(out, "{}", "No strains distributed.".yellow())?;
        return Ok(());
    }

    for strain in &summary.strains {
        writeln!(out, "{}", strain.name.bold())?;
        writeln!(out, "   Plants: {}", strain.total_plants.to_string().green())?;
        writeln!(out, "   Lights won: {}", strain.lights_spanned)?;
        writeln!(out, "   Tables: {}", tables_label(strain))?;
        for entry in &strain.by_table {
            writeln!(
                out,
                "     • table {}: {} plants (~{} lights)",
                entry.table, entry.plants, entry.lights_estimate
            )?;
        }
        writeln!(out)?;
    }

    writeln!(out, "{}", "💡 Tables".bright_yellow().bold())?;
    writeln!(out, "{}", "=========".yellow())?;
    for table in &summary.tables {
        writeln!(
            out,
            "Table {}: {} plants, {} IDs, {}/{} lights used",
            table.table, table.plants, table.assigned_ids, table.lights_used, table.lights_available
        )?;
    }
    Ok(())
}

pub fn generate_json_report(out: &mut dyn Write, summary: &UsageSummary) -> Result<()> {
    let json_output = serde_json::to_string_pretty(summary)?;
    writeln!(out, "{json_output}")?;
    Ok(())
}

pub fn generate_markdown_report(
    out: &mut dyn Write,
    room_name: &str,
    summary: &UsageSummary,
) -> Result<()> {
    writeln!(out, "# Usage Summary: {room_name}\n")?;
    writeln!(out, "- **Plants per light**: {}", summary.plants_per_light)?;
    writeln!(out, "- **Total plants**: {}\n", summary.total_plants())?;

    writeln!(out, "## Strains\n")?;
    if summary.strains.is_empty() {
        writeln!(out, "_No strains distributed._\n")?;
    } else {
        writeln!(out, "| Strain | Plants | Lights won | Tables |")?;
        writeln!(out, "| --- | ---: | ---: | --- |")?;
        for strain in &summary.strains {
            writeln!(
                out,
                "| {} | {} | {} | {} |",
                strain.name,
                strain.total_plants,
                strain.lights_spanned,
                tables_label(strain)
            )?;
        }
        writeln!(out)?;
    }

    writeln!(out, "## Tables\n")?;
    writeln!(out, "| Table | Plants | IDs | Lights used |")?;
    writeln!(out, "| ---: | ---: | ---: | ---: |")?;
    for table in &summary.tables {
        writeln!(
            out,
            "| {} | {} | {} | {}/{} |",
            table.table, table.plants, table.assigned_ids, table.lights_used, table.lights_available
        )?;
    }
    Ok(())
}
