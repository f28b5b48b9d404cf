//! Simple CLI for exercising the index end to end.
//!
//! Usage:
//!   bptree_cli <file> put <key> <value>
//!   bptree_cli <file> get <key>
//!   bptree_cli <file> delete <key>
//!   bptree_cli <file> scan
//!   bptree_cli <file> levels
//!   bptree_cli <file> stats
//!   bptree_cli <file> export
//!   bptree_cli <file> bulk_insert <count>
//!
//! The tree is deserialized from <file> when it exists and serialized back
//! after every mutating command, so each run also drives the binary
//! persistence path.

use std::env;
use std::fs::File;
use std::path::Path;
use std::process::exit;

use bptree_index::{Index, InsertOutcome, RemoveOutcome, TreeConfig};

fn load(path: &str, config: TreeConfig) -> Index<String, String> {
    if !Path::new(path).exists() {
        return Index::new(config);
    }

    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("ERROR: Failed to open {path}: {e}");
            exit(1);
        }
    };
    match Index::deserialize_from(&mut file, config) {
        Ok(index) => index,
        Err(e) => {
            eprintln!("ERROR: Failed to load index: {e}");
            exit(1);
        }
    }
}

fn save(index: &Index<String, String>, path: &str) {
    let result = File::create(path)
        .map_err(bptree_index::IndexError::from)
        .and_then(|mut file| index.serialize_to(&mut file));
    if let Err(e) = result {
        eprintln!("ERROR: Failed to save index: {e}");
        exit(1);
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: bptree_cli <file> <command> [args...]");
        eprintln!("Commands:");
        eprintln!("  put <key> <value>   - Insert or update a key-value pair");
        eprintln!("  get <key>           - Get value for a key");
        eprintln!("  delete <key>        - Delete a key");
        eprintln!("  scan                - List all entries in key order");
        eprintln!("  levels              - Show keys grouped by tree level");
        eprintln!("  stats               - Show index statistics");
        eprintln!("  export              - Dump the tree structure as JSON");
        eprintln!("  bulk_insert <count> - Insert count test records");
        exit(1);
    }

    let path = &args[1];
    let command = &args[2];

    let config = TreeConfig::default();
    let index = load(path, config);

    match command.as_str() {
        "put" => {
            if args.len() < 5 {
                eprintln!("Usage: bptree_cli <file> put <key> <value>");
                exit(1);
            }
            match index.insert(args[3].clone(), args[4].clone()) {
                InsertOutcome::Inserted => println!("INSERTED"),
                InsertOutcome::Updated => println!("UPDATED"),
            }
            save(&index, path);
        }

        "get" => {
            if args.len() < 4 {
                eprintln!("Usage: bptree_cli <file> get <key>");
                exit(1);
            }
            match index.get(&args[3]) {
                Some(value) => println!("{value}"),
                None => println!("NOT_FOUND"),
            }
        }

        "delete" => {
            if args.len() < 4 {
                eprintln!("Usage: bptree_cli <file> delete <key>");
                exit(1);
            }
            match index.remove(&args[3]) {
                RemoveOutcome::Removed => println!("DELETED"),
                RemoveOutcome::NotFound => println!("NOT_FOUND"),
            }
            save(&index, path);
        }

        "scan" => {
            let entries = index.scan();
            println!("COUNT: {}", entries.len());
            for (key, value) in entries {
                println!("{key} -> {value}");
            }
        }

        "levels" => {
            for (depth, level) in index.levels().iter().enumerate() {
                let groups: Vec<String> = level
                    .iter()
                    .map(|node| {
                        node.iter()
                            .map(String::as_str)
                            .collect::<Vec<_>>()
                            .join(" ")
                    })
                    .collect();
                println!("level {depth}: {}", groups.join(" | "));
            }
        }

        "stats" => {
            let stats = index.stats();
            println!("len: {}", stats.len);
            println!("height: {}", stats.height);
            println!("node_count: {}", stats.node_count);
        }

        "export" => match index.export_tree() {
            Some(tree) => match serde_json::to_string_pretty(&tree) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("ERROR: {e}");
                    exit(1);
                }
            },
            None => println!("null"),
        },

        "bulk_insert" => {
            if args.len() < 4 {
                eprintln!("Usage: bptree_cli <file> bulk_insert <count>");
                exit(1);
            }
            let count: usize = match args[3].parse() {
                Ok(n) => n,
                Err(_) => {
                    eprintln!("ERROR: Invalid count");
                    exit(1);
                }
            };

            let start = std::time::Instant::now();
            for i in 0..count {
                let key = format!("key_{i:08}");
                let value = format!("value_{i}");
                index.insert(key, value);
            }
            let elapsed = start.elapsed();
            save(&index, path);

            let ops_per_sec = count as f64 / elapsed.as_secs_f64();
            println!("INSERTED: {count}");
            println!("TIME_MS: {}", elapsed.as_millis());
            println!("OPS_PER_SEC: {ops_per_sec:.0}");
        }

        _ => {
            eprintln!("Unknown command: {command}");
            exit(1);
        }
    }
}
