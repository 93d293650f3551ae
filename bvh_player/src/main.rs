use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use bvh_formats::{BvhFile, Skeleton};
use bvh_player::{Direction, Playback};
use clap::Parser;
use serde::Serialize;

/// Step through a BVH file headlessly and print the bound pose.
#[derive(Parser, Debug)]
#[command(about = "Loads a BVH file and prints bound joint values", version)]
struct Args {
    /// BVH file to play
    path: PathBuf,

    /// Frame to bind before printing (clamped to the last frame)
    #[arg(long, default_value_t = 0)]
    frame: usize,

    /// Step through every frame, printing one summary line per frame
    #[arg(long)]
    walk: bool,

    /// Restrict text output to the joint with this name
    #[arg(long)]
    joint: Option<String>,

    /// Emit the bound pose as pretty JSON instead of text
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::init();

    ensure!(
        !(args.json && args.walk),
        "--json cannot be combined with --walk"
    );

    let file = BvhFile::load(&args.path)?;
    let warning_count = file.warnings.len();
    let mut playback = Playback::new(file);

    if args.walk {
        walk_frames(&mut playback, args.joint.as_deref());
        return Ok(());
    }

    playback.apply_frame(args.frame);

    if args.json {
        let pose = PoseExport::from_playback(&playback);
        let json = serde_json::to_string_pretty(&pose).context("serializing pose to JSON")?;
        println!("{json}");
        return Ok(());
    }

    println!(
        "{}: {} joints, {} frames @ {:.6}s, {} warning(s)",
        args.path.display(),
        playback.skeleton().joints.len(),
        playback.frame_count(),
        playback.frame_time(),
        warning_count
    );
    println!(
        "frame {}/{}",
        playback.current_frame(),
        playback.frame_count()
    );
    print_pose(playback.skeleton(), args.joint.as_deref());

    Ok(())
}

fn walk_frames(playback: &mut Playback, filter: Option<&str>) {
    let frames = playback.frame_count();
    if frames == 0 {
        println!("no frames to walk");
        return;
    }
    for _ in 0..frames {
        println!(
            "frame {:>4}: {}",
            playback.current_frame(),
            summarize_pose(playback.skeleton(), filter)
        );
        playback.advance(Direction::Forward);
    }
}

fn summarize_pose(skeleton: &Skeleton, filter: Option<&str>) -> String {
    let joint = match filter {
        Some(name) => skeleton
            .joints
            .iter()
            .find(|joint| joint.name.eq_ignore_ascii_case(name)),
        None => skeleton.root(),
    };
    match joint {
        Some(joint) => {
            let values = joint
                .channel_values
                .iter()
                .map(|value| format!("{value:.3}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{} [{values}]", joint.name)
        }
        None => String::from("joint not found"),
    }
}

fn print_pose(skeleton: &Skeleton, filter: Option<&str>) {
    for joint in &skeleton.joints {
        if let Some(name) = filter {
            if !joint.name.eq_ignore_ascii_case(name) {
                continue;
            }
        }
        if joint.channel_values.is_empty() {
            continue;
        }
        let values = joint
            .channel_values
            .iter()
            .map(|value| format!("{value:>10.4}"))
            .collect::<Vec<_>>()
            .join(" ");
        println!("  {:<16} {values}", joint.name);
    }
}

#[derive(Debug, Serialize)]
struct PoseExport {
    frame: usize,
    frame_count: usize,
    frame_time: f32,
    joints: Vec<JointPose>,
}

#[derive(Debug, Serialize)]
struct JointPose {
    name: String,
    parent: Option<usize>,
    offset: [f32; 3],
    channels: Vec<String>,
    values: Vec<f32>,
}

impl PoseExport {
    fn from_playback(playback: &Playback) -> Self {
        PoseExport {
            frame: playback.current_frame(),
            frame_count: playback.frame_count(),
            frame_time: playback.frame_time(),
            joints: playback
                .skeleton()
                .joints
                .iter()
                .map(|joint| JointPose {
                    name: joint.name.clone(),
                    parent: joint.parent,
                    offset: joint.offset,
                    channels: joint
                        .channels
                        .iter()
                        .map(|channel| channel.label().to_string())
                        .collect(),
                    values: joint.channel_values.clone(),
                })
                .collect(),
        }
    }
}
