use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail, ensure};
use bvh_formats::{BvhFile, Joint, Skeleton};
use clap::Parser;
use serde::Serialize;
use walkdir::WalkDir;

/// Inspect a BVH motion-capture file: joint hierarchy, motion statistics,
/// and any diagnostics the tolerant parser recorded.
#[derive(Parser, Debug)]
struct Args {
    /// Path to the `.bvh` file to inspect
    path: Option<PathBuf>,

    /// Emit the parsed structure as pretty JSON instead of text
    #[arg(long)]
    json: bool,

    /// Walk a directory tree and print a one-line summary per .bvh file
    #[arg(long)]
    scan: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::init();

    if let Some(root) = args.scan.as_deref() {
        ensure!(args.path.is_none(), "--scan does not take a file path");
        ensure!(!args.json, "--json cannot be combined with --scan");
        return scan_directory(root);
    }

    let path = match args.path.as_deref() {
        Some(path) => path,
        None => bail!("pass a .bvh file to inspect, or use --scan <dir>"),
    };

    let file = BvhFile::load(path)?;

    if args.json {
        let export = ExportFile::from(&file);
        let json =
            serde_json::to_string_pretty(&export).context("serializing BVH structure to JSON")?;
        println!("{json}");
        return Ok(());
    }

    print_summary(path, &file);
    Ok(())
}

fn print_summary(path: &Path, file: &BvhFile) {
    let animated = file
        .skeleton
        .joints
        .iter()
        .filter(|joint| !joint.children.is_empty() && joint.channel_count() > 0)
        .count();
    println!(
        "{}: {} joints ({} animated), {} channels declared",
        path.display(),
        file.skeleton.joints.len(),
        animated,
        file.skeleton.channel_count()
    );

    let motion = &file.motion;
    if motion.is_empty() {
        println!("motion: none");
    } else {
        let fps = if motion.frame_time() > 0.0 {
            1.0 / motion.frame_time()
        } else {
            0.0
        };
        println!(
            "motion: {} frames @ {:.6}s ({fps:.1} fps), row width {}",
            motion.frame_count(),
            motion.frame_time(),
            motion.channels_per_frame()
        );
    }

    println!("warnings: {}", file.warnings.len());
    for warning in &file.warnings {
        println!("  ! {warning}");
    }

    if !file.skeleton.joints.is_empty() {
        println!();
        print_joint(&file.skeleton, 0, 0);
    }
}

fn print_joint(skeleton: &Skeleton, index: usize, depth: usize) {
    let joint = &skeleton.joints[index];
    let offset = format!(
        "[{:.3}, {:.3}, {:.3}]",
        joint.offset[0], joint.offset[1], joint.offset[2]
    );
    if joint.channel_count() == 0 {
        println!("{:indent$}{}  {offset}", "", joint.name, indent = depth * 2);
    } else {
        let labels = joint
            .channels
            .iter()
            .map(|channel| channel.label())
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            "{:indent$}{}  {offset}  {} channels: {labels}",
            "",
            joint.name,
            joint.channel_count(),
            indent = depth * 2
        );
    }
    for &child in &joint.children {
        print_joint(skeleton, child, depth + 1);
    }
}

fn scan_directory(root: &Path) -> Result<()> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let is_bvh = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("bvh"))
            .unwrap_or(false);
        if is_bvh {
            paths.push(path.to_path_buf());
        }
    }
    paths.sort();

    if paths.is_empty() {
        println!("no .bvh files under {}", root.display());
        return Ok(());
    }

    for path in paths {
        match BvhFile::load(&path) {
            Ok(file) => println!(
                "{}  {} joints  {} frames  {} warning(s)",
                path.display(),
                file.skeleton.joints.len(),
                file.motion.frame_count(),
                file.warnings.len()
            ),
            Err(err) => eprintln!("{}: {err:?}", path.display()),
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct ExportFile<'a> {
    joints: &'a [Joint],
    frame_count: usize,
    channels_per_frame: usize,
    frame_time: f32,
    warnings: &'a [String],
}

impl<'a> From<&'a BvhFile> for ExportFile<'a> {
    fn from(file: &'a BvhFile) -> Self {
        ExportFile {
            joints: &file.skeleton.joints,
            frame_count: file.motion.frame_count(),
            channels_per_frame: file.motion.channels_per_frame(),
            frame_time: file.motion.frame_time(),
            warnings: &file.warnings,
        }
    }
}
