use anyhow::{Context, Result, bail};
use stepmap_config::Config;
use stepmap_engine::{
    Document, NodeId, StepsTranslator, TextPositionFilter, TreeRange, io, paragraphs_in_range,
    text_nodes_in_range,
};
use std::{env, path::PathBuf, process};

const USAGE: &str = "Usage: stepmap [-f <file.md>] <command>

Commands:
  count                  total number of steps
  locate <step>          tree position of a step
  table                  every step with its position
  select <from> <to>     paragraphs and text nodes between two steps";

#[derive(Debug, PartialEq)]
enum Command {
    Count,
    Locate(usize),
    Table,
    Select(usize, usize),
}

#[derive(Debug, PartialEq)]
struct Args {
    file: Option<PathBuf>,
    command: Command,
}

fn parse_step(value: Option<&String>) -> Result<usize> {
    let value = value.context("missing step argument")?;
    value
        .parse()
        .with_context(|| format!("'{value}' is not a step index"))
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut file = None;
    let mut rest = args;
    if let [flag, path, tail @ ..] = rest
        && flag == "-f"
    {
        file = Some(PathBuf::from(path));
        rest = tail;
    }
    let command = match rest {
        [name] if name == "count" => Command::Count,
        [name] if name == "table" => Command::Table,
        [name, step] if name == "locate" => Command::Locate(parse_step(Some(step))?),
        [name, tail @ ..] if name == "select" => {
            Command::Select(parse_step(tail.first())?, parse_step(tail.get(1))?)
        }
        _ => bail!("unrecognised arguments"),
    };
    Ok(Args { file, command })
}

fn describe(doc: &Document, node: NodeId) -> String {
    match doc.text(node) {
        Some(text) => format!("{node:?} {text:?}"),
        None => format!("{node:?} <{}>", doc.name(node).unwrap_or_default()),
    }
}

fn run(args: Args, config: Config) -> Result<()> {
    let file = args
        .file
        .or_else(|| config.default_document.clone())
        .context("no document given and no default_document in the config file")?;
    let doc = io::read_document(&file)
        .with_context(|| format!("failed to load '{}'", file.display()))?;
    let filter = TextPositionFilter::new(config.paragraphs.iter().map(String::as_str));
    let mut translator = StepsTranslator::new(&doc, filter.clone(), config.bucket_size);
    log::info!("Loaded {} with bucket size {}", file.display(), config.bucket_size);

    match args.command {
        Command::Count => println!("{}", translator.step_count(&doc)),
        Command::Locate(step) => {
            let position = translator.steps_to_position(&doc, step)?;
            println!("{} offset {}", describe(&doc, position.node), position.offset);
        }
        Command::Table => {
            translator.prime(&doc);
            let total = translator.step_count(&doc);
            for step in 0..total {
                let position = translator.steps_to_position(&doc, step)?;
                let back = translator.position_to_steps(&doc, position.node, position.offset, None)?;
                if back != step {
                    bail!("step {step} maps back to {back}");
                }
                println!(
                    "{step:>6}  {} offset {}",
                    describe(&doc, position.node),
                    position.offset
                );
            }
            log::debug!("{} bookmarks cached", translator.cache().len());
        }
        Command::Select(from, to) => {
            let start = translator.steps_to_position(&doc, from.min(to))?;
            let end = translator.steps_to_position(&doc, from.max(to))?;
            let range = TreeRange::new(start, end);
            println!("paragraphs:");
            for node in paragraphs_in_range(&doc, range, &filter) {
                println!("  {}", describe(&doc, node));
            }
            println!("text nodes:");
            for node in text_nodes_in_range(&doc, range) {
                println!("  {}", describe(&doc, node));
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let args = match parse_args(&args) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("{USAGE}");
            process::exit(1);
        }
    };

    let config_path = Config::config_path();
    log::info!("Config path: {}", config_path.display());
    let config = match Config::load() {
        Ok(Some(config)) => config,
        Ok(None) => Config::default(),
        Err(e) => {
            eprintln!("Error: Failed to load config file: {e}");
            process::exit(1);
        }
    };

    run(args, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse_args(&args(&["count"])).unwrap(),
            Args {
                file: None,
                command: Command::Count
            }
        );
        assert_eq!(
            parse_args(&args(&["-f", "notes.md", "locate", "12"])).unwrap(),
            Args {
                file: Some(PathBuf::from("notes.md")),
                command: Command::Locate(12)
            }
        );
        assert_eq!(
            parse_args(&args(&["select", "3", "9"])).unwrap().command,
            Command::Select(3, 9)
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["locate", "-1"])).is_err());
        assert!(parse_args(&args(&["select", "3"])).is_err());
        assert!(parse_args(&args(&["-f", "notes.md"])).is_err());
    }
}
