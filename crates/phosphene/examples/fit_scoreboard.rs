//! Scoreboard radius scan against synthetic ground truth.
//!
//! Purpose
//! - Show the fit / predict / score loop end to end: drawings predicted at a
//!   known radius serve as targets, and the SRD loss is evaluated for a few
//!   candidate radii. The minimum should sit at the true radius.
//!
//! Run: `cargo run -p phosphene --example fit_scoreboard --release`

use phosphene::api::{FeatureRow, GridCfg, ModelA, ModelCfg, ParallelCfg, TargetRow};

fn main() -> phosphene::Result<()> {
    let cfg = ModelCfg {
        grid: GridCfg {
            xrange: (-12.0, 12.0),
            yrange: (-8.0, 8.0),
            step: 0.25,
        },
        parallel: ParallelCfg::default(),
        ..ModelCfg::default()
    };
    let rows: Vec<FeatureRow> = ["A1", "B4", "C6", "D9", "F2"]
        .iter()
        .enumerate()
        .map(|(i, e)| FeatureRow::new(format!("trial{i}"), *e))
        .collect();

    let true_rho = 250.0;
    let mut truth = ModelA::new(ModelCfg { rho: true_rho, ..cfg })?;
    truth.fit(&rows)?;
    let targets: Vec<TargetRow> = truth
        .predict(&rows)?
        .into_iter()
        .map(|p| TargetRow {
            id: p.id,
            image: p.image,
        })
        .collect();

    println!("true_rho={true_rho}");
    let mut model = ModelA::new(cfg)?;
    model.fit(&rows)?;
    for rho in [100.0, 175.0, 250.0, 325.0, 400.0] {
        model.set_param_str("rho", &rho.to_string())?;
        let loss = model.score(&rows, &targets)?;
        println!("rho={rho:>6.1} loss={loss:.4}");
    }
    Ok(())
}
