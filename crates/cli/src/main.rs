use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use phosphene::api::{
    align, region_props, thresholded_image, FeatureRow, ModelCfg, ParamUpdate, Prediction,
    ProjectDirect, ProjectThenDisplace, RetinalGridStrategy, Simulation, SimulationCfg,
    SpatialModel, SrdLoss, Threshold,
};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::SubscriberBuilder;

mod config;
mod provenance;
mod table;

use provenance::{ensure_parent, write_sidecar, Payload};

#[derive(Parser)]
#[command(name = "phosphene")]
#[command(about = "Phosphene simulation and shape matching for retinal implants")]
struct Cmd {
    #[command(subcommand)]
    action: Action,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModelKind {
    /// Linear visual field to retina projection
    A,
    /// Projection followed by the displacement transform
    B,
}

#[derive(Subcommand)]
enum Action {
    /// Simulate the percept of one stimulus and write a JSON summary
    Simulate {
        /// Simulation config (JSON); defaults when omitted
        #[arg(long)]
        config: Option<PathBuf>,
        /// Electrode or `_`-joined electrodes, e.g. A1_B2
        #[arg(long)]
        stim: String,
        #[arg(long, default_value_t = 1.0)]
        amp: f64,
        /// Threshold for the summary region properties
        #[arg(long, default_value_t = 0.1)]
        thresh: f64,
        #[arg(long)]
        out: PathBuf,
        /// Also write the percept as a numeric CSV matrix
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Fit a model on a table of stimuli and write per-row drawing properties
    Predict {
        /// Model config (JSON); defaults when omitted
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = ModelKind::A)]
        model: ModelKind,
        /// Parameter override applied after loading the config
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Register a candidate drawing onto a reference and print the SRD loss
    ScoreImages {
        #[arg(long)]
        reference: PathBuf,
        #[arg(long)]
        candidate: PathBuf,
        /// Model config (JSON) supplying the loss weights
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print a small provenance JSON block
    Report,
}

fn main() -> Result<()> {
    SubscriberBuilder::default().with_target(false).init();
    let cmd = Cmd::parse();
    match cmd.action {
        Action::Simulate {
            config,
            stim,
            amp,
            thresh,
            out,
            image,
        } => simulate(config.as_deref(), &stim, amp, thresh, &out, image.as_deref()).map(|_| ()),
        Action::Predict {
            config,
            model,
            overrides,
            input,
            out,
        } => predict(config.as_deref(), model, &overrides, &input, &out).map(|_| ()),
        Action::ScoreImages {
            reference,
            candidate,
            config,
        } => {
            let doc = score_images(&reference, &candidate, config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&doc)?);
            Ok(())
        }
        Action::Report => report(),
    }
}

fn props_json(img: &phosphene::ShapeImage, thresh: f64) -> Value {
    let p = region_props(img, thresh);
    json!({
        "area": p.area,
        "x_center": p.x_center,
        "y_center": p.y_center,
        "orientation": p.orientation,
        "major_axis_length": p.major_axis_length,
        "minor_axis_length": p.minor_axis_length
    })
}

fn simulate(
    config: Option<&Path>,
    stim: &str,
    amp: f64,
    thresh: f64,
    out: &Path,
    image: Option<&Path>,
) -> Result<Value> {
    let cfg: SimulationCfg = config::load(config)?;
    tracing::info!(stim, amp, spread = ?cfg.spread, "simulate");
    let mut sim = Simulation::new(cfg)?;
    let percept = sim.percept(stim, amp)?;

    let binary = thresholded_image(&percept.image, Threshold::Fixed(thresh), None);
    let doc = json!({
        "stimulus": stim,
        "amp": amp,
        "shape": [percept.image.nrows(), percept.image.ncols()],
        "peak": percept.image.max(),
        "thresh": thresh,
        "props": props_json(&binary, 0.0),
        "degeneracies": percept
            .degeneracies
            .iter()
            .map(|d| format!("{d:?}"))
            .collect::<Vec<_>>(),
    });
    ensure_parent(out)?;
    fs::write(out, serde_json::to_vec_pretty(&doc)?)?;

    let mut payload = Payload::new(json!({
        "stim": stim,
        "amp": amp,
        "thresh": thresh,
        "config": serde_json::to_value(cfg)?,
    }));
    if let Some(path) = config {
        payload = payload.with_input(path);
    }
    write_sidecar(out, payload)?;
    if let Some(path) = image {
        table::write_image(path, &percept.image)?;
    }
    Ok(doc)
}

fn fit_predict<G: RetinalGridStrategy + Default>(
    cfg: ModelCfg,
    overrides: &[String],
    rows: &[FeatureRow],
) -> Result<(ModelCfg, Vec<Prediction>)> {
    let mut model = SpatialModel::<G, SrdLoss>::new(cfg)?;
    for assignment in overrides {
        model.set_param(ParamUpdate::parse_assignment(assignment)?)?;
    }
    model.fit(rows)?;
    let predictions = model.predict(rows)?;
    Ok((*model.cfg(), predictions))
}

fn predict(
    config: Option<&Path>,
    kind: ModelKind,
    overrides: &[String],
    input: &Path,
    out: &Path,
) -> Result<Vec<Prediction>> {
    let cfg: ModelCfg = config::load(config)?;
    let rows = table::read_features(input)?;
    tracing::info!(rows = rows.len(), model = ?kind, "predict");
    let (cfg, predictions) = match kind {
        ModelKind::A => fit_predict::<ProjectDirect>(cfg, overrides, &rows)?,
        ModelKind::B => fit_predict::<ProjectThenDisplace>(cfg, overrides, &rows)?,
    };
    table::write_predictions(out, &predictions)?;

    let payload = Payload::new(json!({
        "model": format!("{kind:?}"),
        "overrides": overrides,
        "config": serde_json::to_value(cfg)?,
    }))
    .with_input(input);
    write_sidecar(out, payload)?;
    Ok(predictions)
}

fn score_images(reference: &Path, candidate: &Path, config: Option<&Path>) -> Result<Value> {
    let cfg: ModelCfg = config::load(config)?;
    let reference_img = table::read_image(reference)?;
    let candidate_img = table::read_image(candidate)?;
    let reg = align(&reference_img, &candidate_img)?;
    Ok(json!({
        "reference": reference.to_string_lossy(),
        "candidate": candidate.to_string_lossy(),
        "scale": reg.params.scale,
        "angle": reg.params.angle,
        "dice": reg.params.dice,
        "loss": reg.loss(&cfg.weights),
        "degenerate": reg.degenerate.map(|d| format!("{d:?}")),
    }))
}

fn report() -> Result<()> {
    let block = provenance::block(&Payload::new(json!({})), &[]);
    println!("{}", serde_json::to_string_pretty(&block)?);
    Ok(())
}
