use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use map_bridge::{
    bridge_config_schema, collect_replies, load_bridge_config_from_env, BridgeChannels,
    BridgeConfig, Feature, HeadlessEngine, MapController, MethodCall, MoveGesture,
    ScreenCoordinate, UserLocation,
};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Replays scripted method calls against a headless map",
    long_about = None
)]
struct Args {
    /// Path to the script JSON file
    #[arg(long, required_unless_present = "print_schema")]
    script: Option<PathBuf>,

    /// Bridge config file (defaults to MAP_BRIDGE_CONFIG_PATH, then the builtin)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the bridge config JSON schema and exit
    #[arg(long)]
    print_schema: bool,

    /// Print the headless engine's call log after the script
    #[arg(long)]
    call_log: bool,
}

#[derive(Debug, Deserialize)]
struct Script {
    #[serde(default = "default_viewport")]
    viewport: [f64; 2],
    steps: Vec<Step>,
}

fn default_viewport() -> [f64; 2] {
    [800.0, 600.0]
}

#[derive(Debug, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
enum Step {
    Call {
        method: String,
        #[serde(default)]
        arguments: JsonValue,
        id: Option<u64>,
    },
    MapReady,
    StyleLoaded,
    MapIdle,
    CameraChanged,
    Click {
        x: f64,
        y: f64,
    },
    LongClick {
        x: f64,
        y: f64,
    },
    MoveBegin {
        x: f64,
        y: f64,
    },
    Move {
        x: f64,
        y: f64,
        #[serde(default = "single_pointer")]
        pointers: u32,
    },
    MoveEnd {
        x: f64,
        y: f64,
    },
    Location {
        location: UserLocation,
    },
    /// Draws a feature on a layer so hit-tests can find it.
    Place {
        layer: String,
        /// left, top, right, bottom in physical pixels
        rect: [f64; 4],
        feature: JsonValue,
    },
    Settle,
    Interrupt,
}

fn single_pointer() -> u32 {
    1
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    if args.print_schema {
        println!("{}", serde_json::to_string_pretty(&bridge_config_schema())?);
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => BridgeConfig::from_file(path)
            .with_context(|| format!("Failed to load bridge config at {}", path.display()))?,
        None => load_bridge_config_from_env().0,
    };
    let script_path = args
        .script
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("--script is required"))?;
    let script_json = fs::read_to_string(script_path)
        .with_context(|| format!("Failed to read script at {}", script_path.display()))?;
    let script: Script = serde_json::from_str(&script_json)
        .with_context(|| format!("Failed to parse script JSON at {}", script_path.display()))?;

    let engine = HeadlessEngine::new(script.viewport[0], script.viewport[1]);
    let (mut controller, channels) = MapController::new(engine, config);
    info!(steps = script.steps.len(), "harness.script_loaded");

    let mut next_id = 1u64;
    for (index, step) in script.steps.into_iter().enumerate() {
        run_step(&mut controller, step, &mut next_id)
            .with_context(|| format!("Step {} failed", index))?;
        print_outputs(index, &channels)?;
    }

    if args.call_log {
        println!("=== call log ===");
        for entry in controller.engine().call_log() {
            println!("{entry}");
        }
    }
    Ok(())
}

fn run_step(
    controller: &mut MapController<HeadlessEngine>,
    step: Step,
    next_id: &mut u64,
) -> Result<()> {
    match step {
        Step::Call {
            method,
            arguments,
            id,
        } => {
            let id = id.unwrap_or(*next_id);
            *next_id = id + 1;
            let call = MethodCall::from_parts(method.as_str(), arguments)
                .with_context(|| format!("Invalid arguments for '{}'", method))?
                .with_id(id);
            controller.handle(call);
        }
        Step::MapReady => controller.on_map_ready(),
        Step::StyleLoaded => controller.on_style_loaded(),
        Step::MapIdle => controller.on_map_idle(),
        Step::CameraChanged => controller.on_camera_changed(),
        Step::Click { x, y } => controller.on_map_click(ScreenCoordinate::new(x, y)),
        Step::LongClick { x, y } => controller.on_map_long_click(ScreenCoordinate::new(x, y)),
        Step::MoveBegin { x, y } => {
            controller.on_move_begin(MoveGesture::single(ScreenCoordinate::new(x, y)));
        }
        Step::Move { x, y, pointers } => {
            controller.on_move(MoveGesture {
                pointer_count: pointers,
                ..MoveGesture::single(ScreenCoordinate::new(x, y))
            });
        }
        Step::MoveEnd { x, y } => {
            controller.on_move_end(MoveGesture::single(ScreenCoordinate::new(x, y)))
        }
        Step::Location { location } => controller.on_user_location(location),
        Step::Place {
            layer,
            rect,
            feature,
        } => {
            let feature = Feature::from_value(feature)
                .with_context(|| format!("Invalid feature placed on '{}'", layer))?;
            controller.engine_mut().place_feature(
                &layer,
                ScreenCoordinate::new(rect[0], rect[1]),
                ScreenCoordinate::new(rect[2], rect[3]),
                feature,
            );
        }
        Step::Settle => {
            controller.engine_mut().settle();
        }
        Step::Interrupt => controller.engine_mut().interrupt(),
    }
    Ok(())
}

fn print_outputs(index: usize, channels: &BridgeChannels) -> Result<()> {
    let replies = collect_replies(&channels.replies);
    let events: Vec<_> = channels.events.try_iter().collect();
    if replies.is_empty() && events.is_empty() {
        return Ok(());
    }
    let output = json!({
        "step": index,
        "replies": replies.iter().map(|reply| reply.to_json()).collect::<Vec<_>>(),
        "events": events.iter().map(|event| event.to_json()).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
