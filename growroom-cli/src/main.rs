mod reports;
mod store;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::fs::{self, File};
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};

use growroom_engine::constants::{
    DEFAULT_LIGHTS_PER_TABLE, DEFAULT_PLANTS_PER_LIGHT, DEFAULT_TABLE_COUNT,
};
use growroom_engine::{
    CellStatus, DistributionOutcome, DistributionPolicy, EditSession, RoomConfig, RoomEngine,
    RowGroup, RowGuidance, ValidationReport, WriteMode, load_strain_batch, row_guidance,
};
use store::FileRoomStore;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Half a slot per edit, chosen with --group
    TwoRows,
    /// Every cell of the slot
    FullSlot,
}

impl From<ModeArg> for WriteMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::TwoRows => Self::TwoRows,
            ModeArg::FullSlot => Self::FullSlot,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GroupArg {
    First,
    Second,
}

impl From<GroupArg> for RowGroup {
    fn from(group: GroupArg) -> Self {
        match group {
            GroupArg::First => Self::First,
            GroupArg::Second => Self::Second,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "growroom", version)]
#[command(about = "Grow-room slot allocation, plant ID assignment and usage reports")]
struct Args {
    /// JSON file holding every room
    #[arg(long, global = true, default_value = "growroom-rooms.json")]
    store: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List stored rooms
    Rooms,
    /// Create an empty room
    Create {
        name: String,
        #[arg(long, default_value_t = DEFAULT_TABLE_COUNT)]
        tables: u32,
        /// Lights on every table
        #[arg(long, default_value_t = DEFAULT_LIGHTS_PER_TABLE, conflicts_with = "lights_per_table")]
        lights: u32,
        /// Lights per table (comma-separated), overrides --tables
        #[arg(long, value_delimiter = ',')]
        lights_per_table: Vec<u32>,
        #[arg(long, default_value_t = DEFAULT_PLANTS_PER_LIGHT)]
        plants_per_light: u32,
    },
    /// Delete a room
    Delete { name: String },
    /// Replace a room's strain mapping from `Name: count` lines
    Distribute {
        #[arg(long)]
        room: Option<String>,
        /// One `Name: count` entry (repeatable)
        #[arg(long = "strain")]
        strains: Vec<String>,
        /// File with one `Name: count` entry per line
        #[arg(long, conflicts_with = "strains")]
        file: Option<PathBuf>,
        /// Drop plant IDs already entered instead of refusing
        #[arg(long)]
        discard_ids: bool,
    },
    /// Clear a room's strain mapping
    Reset {
        #[arg(long)]
        room: Option<String>,
        #[arg(long)]
        discard_ids: bool,
    },
    /// Validate and commit plant IDs into one slot
    Assign {
        #[arg(long)]
        room: Option<String>,
        #[arg(long)]
        table: u32,
        #[arg(long)]
        light: u32,
        #[arg(long, value_enum, default_value_t = ModeArg::TwoRows)]
        mode: ModeArg,
        #[arg(long, value_enum, default_value_t = GroupArg::First)]
        group: GroupArg,
        /// IDs in buffer order (comma-separated, blank entries leave cells empty)
        #[arg(long, value_delimiter = ',')]
        ids: Vec<String>,
        /// File with one ID per line
        #[arg(long, conflicts_with = "ids")]
        batch: Option<PathBuf>,
    },
    /// Check a batch of IDs reserved for one strain against its plant count
    StrainIds {
        #[arg(long)]
        room: Option<String>,
        #[arg(long)]
        strain: String,
        #[arg(long)]
        batch: PathBuf,
    },
    /// Per-strain and per-table usage
    Usage {
        #[arg(long)]
        room: Option<String>,
        /// Output report format
        #[arg(long, default_value = "console")]
        #[arg(value_parser = ["json", "markdown", "console"])]
        report: String,
        /// Optional path to write the report output instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Find the slot holding a plant ID
    Find {
        id: String,
        #[arg(long)]
        room: Option<String>,
    },
    /// List every assigned plant ID
    Ids {
        #[arg(long)]
        room: Option<String>,
    },
}

type Engine = RoomEngine<FileRoomStore>;

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let engine = RoomEngine::new(FileRoomStore::new(&args.store));
    match args.command {
        Command::Rooms => list_rooms(&engine),
        Command::Create {
            name,
            tables,
            lights,
            lights_per_table,
            plants_per_light,
        } => {
            let config = if lights_per_table.is_empty() {
                RoomConfig::uniform(tables, lights, plants_per_light)?
            } else {
                RoomConfig::per_table(lights_per_table, plants_per_light)?
            };
            engine.create_room(&name, config)?;
            println!("✅ Created room {}", name.trim().green());
            Ok(())
        }
        Command::Delete { name } => {
            if !engine.list_rooms()?.contains(&name) {
                bail!("unknown room `{name}`");
            }
            let next = engine.delete_room(&name)?;
            println!("🗑️  Deleted room {name}");
            if let Some(next) = next {
                println!("Active room: {}", next.green());
            }
            Ok(())
        }
        Command::Distribute {
            room,
            strains,
            file,
            discard_ids,
        } => {
            let name = resolve_room(&engine, room)?;
            let text = match file {
                Some(path) => read_text(&path)?,
                None => strains.join("\n"),
            };
            let outcome = engine.distribute(&name, &text, policy(discard_ids))?;
            print_distribution(&name, &outcome);
            Ok(())
        }
        Command::Reset { room, discard_ids } => {
            let name = resolve_room(&engine, room)?;
            let discarded = engine.reset_strains(&name, policy(discard_ids))?;
            println!("♻️  Cleared strain mapping of {name}");
            if discarded > 0 {
                println!("{}", format!("Discarded {discarded} plant IDs").yellow());
            }
            Ok(())
        }
        Command::Assign {
            room,
            table,
            light,
            mode,
            group,
            ids,
            batch,
        } => {
            let name = resolve_room(&engine, room)?;
            let mut session = open_session(&engine, &name, table, light, mode, group)?;
            let dropped = if let Some(path) = batch {
                session.load_batch(&read_text(&path)?).dropped
            } else {
                stage_inline(&mut session, &ids)?
            };
            if dropped > 0 {
                eprintln!(
                    "⚠️  {dropped} IDs did not fit; only the first {} are used",
                    session.capacity()
                );
            }
            assign(&engine, &name, &session)
        }
        Command::StrainIds {
            room,
            strain,
            batch,
        } => {
            let name = resolve_room(&engine, room)?;
            let summary = engine.usage(&name)?;
            let available = summary
                .strain(&strain)
                .with_context(|| format!("strain `{strain}` has no plants in {name}"))?
                .total_plants;
            let loaded = load_strain_batch(
                &strain,
                &read_text(&batch)?,
                usize::try_from(available).unwrap_or(usize::MAX),
            );
            println!(
                "{}: {} of {available} IDs loaded",
                strain.bold(),
                loaded.ids.len()
            );
            if loaded.dropped > 0 {
                eprintln!(
                    "⚠️  {} IDs dropped; only the first {available} are used for {strain}",
                    loaded.dropped
                );
            }
            Ok(())
        }
        Command::Usage {
            room,
            report,
            output,
        } => {
            let name = resolve_room(&engine, room)?;
            let summary = engine.usage(&name)?;
            let mut output_target = OutputTarget::new(output)?;
            match report.as_str() {
                "json" => reports::generate_json_report(output_target.writer(), &summary)?,
                "markdown" => {
                    reports::generate_markdown_report(output_target.writer(), &name, &summary)?;
                }
                _ => reports::generate_console_report(output_target.writer(), &name, &summary)?,
            }
            output_target.flush_inner()?;
            Ok(())
        }
        Command::Find { id, room } => {
            let name = resolve_room(&engine, room)?;
            let room = engine.require_room(&name)?;
            let Some(location) = room.locate_plant(&id) else {
                bail!("plant `{}` is not assigned in {name}", id.trim());
            };
            println!(
                "{} → slot {}, position {} ({})",
                id.trim().bold(),
                location.slot,
                location.position,
                location.strain.as_deref().unwrap_or("no strain")
            );
            Ok(())
        }
        Command::Ids { room } => {
            let name = resolve_room(&engine, room)?;
            let room = engine.require_room(&name)?;
            let ids = room.all_plant_ids();
            if ids.is_empty() {
                println!("No plant IDs assigned in {name}.");
            }
            for (slot, position, id) in ids {
                println!("{slot}\t{position}\t{id}");
            }
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

const fn policy(discard_ids: bool) -> DistributionPolicy {
    if discard_ids {
        DistributionPolicy::DiscardIdentifiers
    } else {
        DistributionPolicy::RefuseIfAssigned
    }
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn resolve_room(engine: &Engine, room: Option<String>) -> Result<String> {
    match room {
        Some(name) => Ok(name),
        None => engine
            .active_room()?
            .context("no rooms yet; create one with `growroom create <NAME>`"),
    }
}

fn list_rooms(engine: &Engine) -> Result<()> {
    let rooms = engine.list_rooms()?;
    if rooms.is_empty() {
        println!("No rooms stored in {}.", engine.store().path().display());
        return Ok(());
    }
    let active = engine.active_room()?;
    for name in rooms {
        if active.as_ref() == Some(&name) {
            println!("* {}", name.green());
        } else {
            println!("  {name}");
        }
    }
    Ok(())
}

fn print_distribution(name: &str, outcome: &DistributionOutcome) {
    println!("{}", format!("🌿 Distribution for {name}").bright_green().bold());
    for total in &outcome.totals {
        let mut line = format!(
            "  {:20} requested {:>5}  placed {:>5}  slots {:>3}",
            total.name, total.requested, total.allocated, total.slots
        );
        if total.shortfall() > 0 {
            line.push_str(&format!("  {}", format!("short {}", total.shortfall()).red()));
        } else if total.over_allocation() > 0 {
            line.push_str(&format!(
                "  {}",
                format!("+{} spare", total.over_allocation()).yellow()
            ));
        }
        println!("{line}");
    }
    println!(
        "Slots used: {}/{}",
        outcome.slots_used, outcome.slots_available
    );
    if outcome.discarded_identifiers > 0 {
        println!(
            "{}",
            format!("Discarded {} plant IDs", outcome.discarded_identifiers).yellow()
        );
    }
}

fn open_session(
    engine: &Engine,
    name: &str,
    table: u32,
    light: u32,
    mode: ModeArg,
    group: GroupArg,
) -> Result<EditSession> {
    let room = engine.require_room(name)?;
    let mut session = EditSession::new(room.config(), table, light, mode.into())?;
    session.set_row_group(group.into());
    Ok(session)
}

/// Stage inline IDs in order, returning how many did not fit in the slot.
fn stage_inline(session: &mut EditSession, ids: &[String]) -> Result<usize> {
    let capacity = session.capacity();
    for (index, id) in ids.iter().take(capacity).enumerate() {
        session.set_cell(index, id)?;
    }
    Ok(ids.len().saturating_sub(capacity))
}

fn describe(status: &CellStatus) -> String {
    match status {
        CellStatus::Empty => "empty".dimmed().to_string(),
        CellStatus::Valid => "ok".green().to_string(),
        CellStatus::DuplicateInBuffer { first } => {
            format!("duplicate of cell {first}").red().to_string()
        }
        CellStatus::UsedElsewhere { slot, position } => {
            format!("already in slot {slot} at position {position}")
                .red()
                .to_string()
        }
        CellStatus::DuplicateInSlot { position } => {
            format!("already in this slot at position {position}")
                .red()
                .to_string()
        }
        CellStatus::PastSlotEnd { position } => {
            format!("position {position} is past the end of the slot")
                .red()
                .to_string()
        }
    }
}

fn print_guidance(guidance: &RowGuidance) {
    let render = |counts: &[(String, u32)]| {
        counts
            .iter()
            .map(|(strain, count)| format!("{count}×{strain}"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    if !guidance.first.is_empty() {
        println!("Suggested first rows: {}", render(&guidance.first));
    }
    if !guidance.second.is_empty() {
        println!("Suggested second rows: {}", render(&guidance.second));
    }
}

fn print_validation(session: &EditSession, report: &ValidationReport) {
    let offset = session.window().offset;
    for (index, (id, status)) in session.buffer().iter().zip(&report.cells).enumerate() {
        if matches!(status, CellStatus::Empty) {
            continue;
        }
        println!("  [{:>2}] {:16} {}", offset + index, id, describe(status));
    }
    println!(
        "Progress: {}/{} cells filled",
        session.filled_count(),
        session.write_count()
    );
}

fn assign(engine: &Engine, name: &str, session: &EditSession) -> Result<()> {
    let room = engine.require_room(name)?;
    let target = session.target();
    println!("{}", format!("🏷️  Slot {target} in {name}").bright_cyan().bold());
    print_guidance(&row_guidance(&room, target)?);

    let report = session.validate(&room);
    print_validation(session, &report);
    if !report.is_committable() {
        let invalid = report.cells.iter().filter(|s| !s.is_valid()).count();
        eprintln!("❌ {invalid} invalid IDs; nothing was saved");
        std::process::exit(1);
    }

    let outcome = engine.commit_edit(name, session)?;
    println!(
        "✅ Committed {} IDs to slot {}",
        outcome.written, outcome.slot
    );
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_parse_assign_with_inline_ids() {
        let args = Args::try_parse_from([
            "growroom", "assign", "--table", "1", "--light", "2", "--mode", "full-slot", "--ids",
            "P1,,P3",
        ])
        .unwrap();
        let Command::Assign {
            table,
            light,
            mode,
            ids,
            ..
        } = args.command
        else {
            panic!("expected assign");
        };
        assert_eq!((table, light), (1, 2));
        assert_eq!(WriteMode::from(mode), WriteMode::FullSlot);
        assert_eq!(ids, ["P1", "", "P3"]);
        assert_eq!(args.store, PathBuf::from("growroom-rooms.json"));
    }

    #[test]
    fn args_reject_ids_with_batch() {
        let parsed = Args::try_parse_from([
            "growroom", "assign", "--table", "0", "--light", "0", "--ids", "A", "--batch", "x.txt",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn inline_ids_beyond_the_slot_are_dropped_like_a_batch() {
        let config = RoomConfig::uniform(1, 1, 5).unwrap();
        let mut session = EditSession::new(&config, 0, 0, WriteMode::TwoRows).unwrap();
        session.set_row_group(RowGroup::Second);
        let ids: Vec<String> = ["D", "", "F", "G"].map(String::from).to_vec();
        assert_eq!(stage_inline(&mut session, &ids).unwrap(), 2);
        assert_eq!(session.buffer(), ["D", "", ""]);

        let mut inline = EditSession::new(&config, 0, 0, WriteMode::FullSlot).unwrap();
        let mut batched = inline.clone();
        let many: Vec<String> = (0..7).map(|n| format!("P{n}")).collect();
        let inline_dropped = stage_inline(&mut inline, &many).unwrap();
        let batch_dropped = batched.load_batch(&many.join("\n")).dropped;
        assert_eq!(inline_dropped, 2);
        assert_eq!(inline_dropped, batch_dropped);
        assert_eq!(inline.buffer(), batched.buffer());
    }

    #[test]
    fn policy_follows_flag() {
        assert_eq!(policy(false), DistributionPolicy::RefuseIfAssigned);
        assert_eq!(policy(true), DistributionPolicy::DiscardIdentifiers);
    }

    #[test]
    fn output_target_writes_file() {
        let path = std::env::temp_dir().join(format!(
            "growroom-output-{}.txt",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        let mut target = OutputTarget::new(Some(path.clone())).unwrap();
        writeln!(target.writer(), "hello").unwrap();
        target.flush_inner().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello\n");
        let _ = fs::remove_file(path);
    }
}
