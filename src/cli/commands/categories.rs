//! Category rule management.

use anyhow::{Result, bail};
use console::style;
use indexmap::IndexMap;

use crate::cli::{CategoryAction, Context};

pub fn run(ctx: &Context, action: CategoryAction) -> Result<()> {
    let engine = ctx.engine()?;

    match action {
        CategoryAction::List { json } => {
            let rules = engine.rules();
            if json {
                let map: IndexMap<String, Vec<String>> = rules.to_map();
                println!("{}", serde_json::to_string_pretty(&map)?);
                return Ok(());
            }
            for (name, extensions) in rules.categories() {
                let list: Vec<&str> = extensions.iter().map(String::as_str).collect();
                println!("{:<16} {}", style(name).bold(), list.join(" "));
            }
            println!(
                "{:<16} {}",
                style(rules.fallback()).bold(),
                style("(everything else)").dim()
            );
            return Ok(());
        }

        CategoryAction::Add { name, extensions } => {
            engine.add_category(&name, &extensions)?;
            println!("Added category {name}");
        }

        CategoryAction::Remove { name } => {
            if !engine.remove_category(&name)? {
                bail!("unknown category '{name}'");
            }
            println!("Removed category {name}");
        }

        CategoryAction::AddExt {
            category,
            extensions,
        } => {
            for ext in &extensions {
                engine.add_extension(&category, ext)?;
            }
            println!("Updated {category}");
        }

        CategoryAction::RemoveExt {
            category,
            extensions,
        } => {
            for ext in &extensions {
                if !engine.remove_extension(&category, ext)? {
                    println!("{} {ext} was not in {category}", style("note").yellow());
                }
            }
            println!("Updated {category}");
        }
    }

    ctx.save(&engine)
}
