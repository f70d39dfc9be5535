//! blocktree - a Git-backed hierarchical content block store
//!
//! This is the main entry point for the blocktree command-line interface.

use std::path::PathBuf;
use std::process::ExitCode;

use blocktree::block::{BlockNode, CreateBlock, Language, LocalizedText, UpdateBlock};
use blocktree::hierarchy::{HierarchyManager, TreeConfig};
use blocktree::storage::BlockId;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    // Parse simple command line args.
    let mut path = PathBuf::from(".blocktree");
    let mut verbose = false;
    let mut command: Vec<String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-d" | "--database" => {
                i += 1;
                if i < args.len() {
                    path = PathBuf::from(&args[i]);
                }
            }
            "-v" | "--verbose" => {
                verbose = true;
            }
            "-h" | "--help" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            "--version" => {
                println!("blocktree v0.1.0");
                return ExitCode::SUCCESS;
            }
            arg => {
                // Everything else belongs to the subcommand.
                command.push(arg.to_string());
            }
        }
        i += 1;
    }

    if command.is_empty() {
        print_help();
        return ExitCode::FAILURE;
    }

    // Open store.
    let config = TreeConfig::new(&path)
        .create_if_missing(true)
        .verbose(verbose);

    let manager = match HierarchyManager::open_with(config) {
        Ok(manager) => manager,
        Err(e) => {
            eprintln!("Error opening store: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run_command(&manager, &command) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_help() {
    println!("blocktree - a Git-backed hierarchical content block store");
    println!();
    println!("Usage: blocktree [OPTIONS] COMMAND [ARGS]");
    println!();
    println!("Options:");
    println!("  -d, --database PATH    Path to store directory (default: .blocktree)");
    println!("  -v, --verbose          Enable verbose output");
    println!("  -h, --help             Show this help message");
    println!("  --version              Show version");
    println!();
    println!("Commands:");
    println!("  add TITLE [--parent ID] [--en T] [--ar T] [--desc T]");
    println!("                         Create a block (TITLE is the ru title)");
    println!("  show ID                Print one block as JSON");
    println!("  set ID [--ru T] [--en T] [--ar T] [--desc-ru T] [--desc-en T] [--desc-ar T]");
    println!("                         Update titles/descriptions; pass '-' to clear a slot");
    println!("  rm ID                  Delete a block and its whole subtree");
    println!("  ls [PARENT]            List root blocks, or children of PARENT");
    println!("  tree [ID]              Print the nested tree (all roots, or the children of ID)");
    println!("  log [N]                Show the last N mutations (default: 20)");
    println!();
    println!("Examples:");
    println!("  blocktree add 'О компании' --en 'About'");
    println!("  blocktree add 'Команда' --parent 01arz3ndektsv4rrffq69g5fav");
    println!("  blocktree tree");
}

fn run_command(
    manager: &HierarchyManager,
    command: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    match command[0].as_str() {
        "add" => cmd_add(manager, &command[1..]),
        "show" => cmd_show(manager, &command[1..]),
        "set" => cmd_set(manager, &command[1..]),
        "rm" => cmd_rm(manager, &command[1..]),
        "ls" => cmd_ls(manager, &command[1..]),
        "tree" => cmd_tree(manager, &command[1..]),
        "log" => cmd_log(manager, &command[1..]),
        other => Err(format!("unknown command: {}", other).into()),
    }
}

/// consume the value following a flag
fn flag_value<'a>(args: &'a [String], i: &mut usize) -> Result<&'a str, Box<dyn std::error::Error>> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("missing value for {}", args[*i - 1]).into())
}

fn parse_id(raw: &str) -> Result<BlockId, Box<dyn std::error::Error>> {
    Ok(BlockId::new(raw)?)
}

fn cmd_add(
    manager: &HierarchyManager,
    args: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let mut title = LocalizedText::default();
    let mut description = LocalizedText::default();
    let mut parent: Option<String> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--parent" | "-p" => parent = Some(flag_value(args, &mut i)?.to_string()),
            "--en" => title.set(Language::En, Some(flag_value(args, &mut i)?.to_string())),
            "--ar" => title.set(Language::Ar, Some(flag_value(args, &mut i)?.to_string())),
            "--desc" => description.set(Language::Ru, Some(flag_value(args, &mut i)?.to_string())),
            arg if !arg.starts_with('-') => title.set(Language::Ru, Some(arg.to_string())),
            arg => return Err(format!("unknown option: {}", arg).into()),
        }
        i += 1;
    }

    let mut payload = CreateBlock::new(title).with_description(description);
    if let Some(parent) = parent {
        payload = payload.with_parent(parent);
    }

    let block = manager.create(payload)?;
    println!("created {}", block.id);
    Ok(())
}

fn cmd_show(
    manager: &HierarchyManager,
    args: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let id = parse_id(args.first().ok_or("usage: show ID")?)?;
    let block = manager.get(&id)?;
    println!("{}", serde_json::to_string_pretty(&block)?);
    Ok(())
}

fn cmd_set(
    manager: &HierarchyManager,
    args: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let id = parse_id(args.first().ok_or("usage: set ID [--ru T] ...")?)?;

    // '-' clears a slot, any other value replaces it
    fn slot(value: &str) -> Option<String> {
        if value == "-" {
            None
        } else {
            Some(value.to_string())
        }
    }

    let mut patch = UpdateBlock::default();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--ru" => patch = patch.title(Language::Ru, slot(flag_value(args, &mut i)?)),
            "--en" => patch = patch.title(Language::En, slot(flag_value(args, &mut i)?)),
            "--ar" => patch = patch.title(Language::Ar, slot(flag_value(args, &mut i)?)),
            "--desc-ru" => patch = patch.description(Language::Ru, slot(flag_value(args, &mut i)?)),
            "--desc-en" => patch = patch.description(Language::En, slot(flag_value(args, &mut i)?)),
            "--desc-ar" => patch = patch.description(Language::Ar, slot(flag_value(args, &mut i)?)),
            arg => return Err(format!("unknown option: {}", arg).into()),
        }
        i += 1;
    }

    if patch.is_empty() {
        return Err("nothing to update".into());
    }

    let block = manager.update(&id, patch)?;
    println!("updated {} (version {})", block.id, block.version);
    Ok(())
}

fn cmd_rm(
    manager: &HierarchyManager,
    args: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let id = parse_id(args.first().ok_or("usage: rm ID")?)?;
    manager.delete(&id)?;
    println!("deleted {}", id);
    Ok(())
}

fn cmd_ls(
    manager: &HierarchyManager,
    args: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let blocks = match args.first() {
        Some(raw) => manager.children(&parse_id(raw)?)?,
        None => manager.roots()?,
    };

    if blocks.is_empty() {
        println!("(0 blocks)");
        return Ok(());
    }

    for block in &blocks {
        println!(
            "{}\t{}\t({} children)",
            block.id,
            block.title.get(Language::DEFAULT).unwrap_or(""),
            block.children_ids.len()
        );
    }
    println!("({} blocks)", blocks.len());
    Ok(())
}

fn cmd_tree(
    manager: &HierarchyManager,
    args: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let parent = match args.first() {
        Some(raw) => Some(parse_id(raw)?),
        None => None,
    };

    let forest = manager.fetch_tree(parent.as_ref())?;
    if forest.is_empty() {
        println!("(empty)");
        return Ok(());
    }

    for node in &forest {
        print_node(node, 0);
    }
    Ok(())
}

fn print_node(node: &BlockNode, depth: usize) {
    println!(
        "{}{} [{}]",
        "  ".repeat(depth),
        node.title.get(Language::DEFAULT).unwrap_or("(untitled)"),
        node.id
    );
    for child in &node.children {
        print_node(child, depth + 1);
    }
}

fn cmd_log(
    manager: &HierarchyManager,
    args: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let limit = match args.first() {
        Some(raw) => raw.parse::<usize>()?,
        None => 20,
    };

    for info in manager.history(Some(limit))? {
        println!(
            "{}  {}  {}",
            info.id.short(),
            info.timestamp.format("%Y-%m-%d %H:%M:%S"),
            info.summary()
        );
    }
    Ok(())
}
