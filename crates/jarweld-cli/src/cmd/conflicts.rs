//! Conflicts command

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use crossterm::style::Stylize;
use jarweld_core::detect::scan;
use serde::Serialize;

use crate::split_labelled;
use crate::ui::Theme;

#[derive(Debug, Serialize)]
struct ConflictView<'a> {
    path: &'a str,
    variants: Vec<VariantView<'a>>,
}

#[derive(Debug, Serialize)]
struct VariantView<'a> {
    hash: String,
    owners: Vec<&'a str>,
}

/// Report the paths whose content differs between archives.
pub fn conflicts(args: &[String], json: bool) -> Result<()> {
    let mut labels: Vec<String> = Vec::with_capacity(args.len());
    let mut paths: Vec<PathBuf> = Vec::with_capacity(args.len());
    for arg in args {
        let (label, path) = split_labelled(arg);
        let label = label.map_or_else(
            || {
                path.file_stem()
                    .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned())
            },
            str::to_string,
        );
        if labels.contains(&label) {
            bail!("Archive name '{label}' is given more than once");
        }
        if !path.is_file() {
            bail!("Archive not found: {}", path.display());
        }
        labels.push(label);
        paths.push(path.to_path_buf());
    }

    let report = scan(&paths).context("Failed to scan archives")?;
    let views: Vec<ConflictView<'_>> = report
        .conflicts()
        .map(|group| ConflictView {
            path: &group.path,
            variants: group
                .variants
                .iter()
                .map(|v| VariantView {
                    hash: v.hash.to_hex(),
                    owners: v.owners.iter().map(|&i| labels[i].as_str()).collect(),
                })
                .collect(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }

    let theme = Theme::default();
    println!();
    if views.is_empty() {
        println!(
            "{}",
            format!("No conflicts across {} archives", labels.len()).dark_grey()
        );
        return Ok(());
    }
    println!(
        "{}",
        format!(
            "{} conflicting paths across {} archives",
            views.len(),
            labels.len()
        )
        .dark_grey()
    );
    println!();
    for view in &views {
        println!("  {}", view.path.white().bold());
        for variant in &view.variants {
            let short = &variant.hash[..12];
            println!(
                "    {}  {}",
                short.with(theme.colors.secondary),
                variant.owners.join(", ").with(theme.colors.label)
            );
        }
    }
    println!();
    Ok(())
}
