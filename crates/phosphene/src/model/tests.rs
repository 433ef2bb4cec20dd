use super::*;
use crate::geom::GridCfg;
use crate::parallel::ParallelCfg;

fn small_cfg() -> ModelCfg {
    ModelCfg {
        grid: GridCfg {
            xrange: (-10.0, 10.0),
            yrange: (-8.0, 8.0),
            step: 0.5,
        },
        rho: 300.0,
        parallel: ParallelCfg::threads(2),
        ..ModelCfg::default()
    }
}

fn rows(electrodes: &[&str]) -> Vec<FeatureRow> {
    electrodes
        .iter()
        .enumerate()
        .map(|(i, e)| FeatureRow::new(format!("r{i}"), *e))
        .collect()
}

fn is_binary(img: &ShapeImage) -> bool {
    img.iter().all(|&v| v == 0.0 || v == 1.0)
}

#[test]
fn predict_and_score_require_fit() {
    let mut model = ModelA::new(small_cfg()).unwrap();
    let x = rows(&["A1"]);
    assert!(matches!(
        model.predict(&x),
        Err(PhospheneError::NotFitted { method: "predict" })
    ));
    let y = vec![TargetRow {
        id: "r0".into(),
        image: ShapeImage::zeros(3, 3),
    }];
    assert!(matches!(
        model.score(&x, &y),
        Err(PhospheneError::NotFitted { .. })
    ));
}

#[test]
fn fit_then_predict_returns_binary_images() {
    let mut model = ModelA::new(small_cfg()).unwrap();
    let x = rows(&["A1", "C05", "F10", "A01"]);
    model.fit(&x).unwrap();
    assert!(model.is_fitted());
    assert_eq!(model.cache().len(), 3);

    let preds = model.predict(&x).unwrap();
    assert_eq!(preds.len(), 4);
    let shape = model.grid().unwrap().shape();
    assert_eq!(shape, small_cfg().grid.shape());
    for (p, row) in preds.iter().zip(&x) {
        assert_eq!(p.id, row.id);
        assert_eq!(p.image.shape(), shape);
        assert!(is_binary(&p.image));
        assert!(p.image.sum() > 0.0);
    }
    assert_eq!(preds[0].image, preds[3].image);
    assert_ne!(preds[0].image, preds[1].image);
    // Prediction reused every cached map.
    assert_eq!(model.cache().len(), 3);
}

#[test]
fn rows_with_known_drawing_shape_are_resized() {
    let mut model = ModelA::new(small_cfg()).unwrap();
    let mut x = rows(&["B3"]);
    x[0].img_shape = Some((48, 64));
    model.fit(&x).unwrap();
    let preds = model.predict(&x).unwrap();
    assert_eq!(preds[0].image.shape(), (48, 64));
    assert!(is_binary(&preds[0].image));
}

#[test]
fn missing_electrodes_are_reported() {
    let mut model = ModelA::new(small_cfg()).unwrap();
    let err = model.fit(&rows(&["A1", "G1"]));
    assert!(matches!(err, Err(PhospheneError::ElectrodeNotFound { .. })));
    assert!(!model.is_fitted());
    assert!(model.cache().is_empty());

    model.fit(&rows(&["A1"])).unwrap();
    assert!(matches!(
        model.predict(&rows(&["Q1"])),
        Err(PhospheneError::ElectrodeNotFound { .. })
    ));
    assert!(matches!(
        model.predict(&rows(&["A-1"])),
        Err(PhospheneError::InvalidElectrodeName { .. })
    ));
}

#[test]
fn unseen_electrodes_are_computed_lazily() {
    let mut model = ModelA::new(small_cfg()).unwrap();
    model.fit(&rows(&["A1"])).unwrap();
    assert_eq!(model.cache().len(), 1);
    let preds = model.predict(&rows(&["D4", "A1"])).unwrap();
    assert_eq!(preds.len(), 2);
    assert_eq!(model.cache().len(), 2);
}

#[test]
fn multi_electrode_rows_use_the_amplitude() {
    let mut model = ModelA::new(small_cfg()).unwrap();
    let mut x = rows(&["A1_B2", "A1"]);
    x[0].amp = Some(2.0);
    model.fit(&x).unwrap();
    let preds = model.predict(&x).unwrap();
    assert!(is_binary(&preds[0].image));
    // The pair covers more area than A1 alone.
    assert!(preds[0].image.sum() > preds[1].image.sum());
    assert!(preds[0].degeneracies.is_empty());

    x[0].amp = Some(0.0);
    let preds = model.predict(&x).unwrap();
    assert_eq!(preds[0].image.sum(), 0.0);
    assert!(matches!(
        preds[0].degeneracies[..],
        [Degeneracy::ZeroAmplitude { .. }]
    ));
}

#[test]
fn scoring_against_own_predictions_is_perfect() {
    let mut model = ModelA::new(small_cfg()).unwrap();
    let x = rows(&["A1", "C5", "E8"]);
    model.fit(&x).unwrap();
    let y: Vec<TargetRow> = model
        .predict(&x)
        .unwrap()
        .into_iter()
        .map(|p| TargetRow {
            id: p.id,
            image: p.image,
        })
        .collect();
    assert!(model.score(&x, &y).unwrap() < 1e-9);

    let mut shuffled = y.clone();
    shuffled.swap(0, 2);
    assert!(matches!(
        model.score(&x, &shuffled),
        Err(PhospheneError::DataShape { .. })
    ));
    assert!(matches!(
        model.score(&x, &y[..2]),
        Err(PhospheneError::DataShape { .. })
    ));
}

#[test]
fn parameter_updates_invalidate_maps() {
    let mut model = ModelA::new(small_cfg()).unwrap();
    let x = rows(&["A1", "B1"]);
    model.fit(&x).unwrap();
    let before = model.predict(&x).unwrap();

    model.set_param_str("img_thresh", "0.5").unwrap();
    assert_eq!(model.cache().len(), 2);

    model.set_param(ParamUpdate::Rho(500.0)).unwrap();
    assert!(model.cache().is_empty());
    assert!(model.is_fitted());
    let after = model.predict(&x).unwrap();
    assert_ne!(before[0].image, after[0].image);

    model.set_param_str("xrange", "-5,5").unwrap();
    assert_eq!(model.grid().unwrap().shape().1, 22);

    assert!(matches!(
        model.set_param_str("csmode", "gaussian"),
        Err(PhospheneError::Configuration { .. })
    ));
    assert!(model.set_param(ParamUpdate::Rho(-1.0)).is_err());
    assert_eq!(model.cfg().rho, 500.0);
    assert!(model.set_param(ParamUpdate::ImplantX(f64::INFINITY)).is_err());
    assert_eq!(model.cfg().implant.x, 0.0);

    model.reset();
    assert!(!model.is_fitted());
    assert!(model.cache().is_empty());
}

#[test]
fn parameter_keys_parse() {
    assert_eq!(
        ParamUpdate::parse("xrange", "-5, 5").unwrap(),
        ParamUpdate::XRange((-5.0, 5.0))
    );
    assert_eq!(
        ParamUpdate::parse_assignment("rho=150").unwrap(),
        ParamUpdate::Rho(150.0)
    );
    assert_eq!(
        ParamUpdate::parse("n_jobs", "all").unwrap(),
        ParamUpdate::NJobs(None)
    );
    assert!(ParamUpdate::parse("rho", "wide").is_err());
    assert!(ParamUpdate::parse("yrange", "3").is_err());
    assert!(ParamUpdate::parse_assignment("rho").is_err());
    assert!(ParamUpdate::parse("implant_type", "ArgusIII").is_err());
}

#[test]
fn displaced_grid_differs_from_linear_grid() {
    let x = rows(&["C5"]);
    let mut a = ModelA::new(small_cfg()).unwrap();
    let mut b = ModelB::new(small_cfg()).unwrap();
    a.fit(&x).unwrap();
    b.fit(&x).unwrap();
    let (ga, gb) = (a.grid().unwrap(), b.grid().unwrap());
    assert_eq!(ga.shape(), gb.shape());
    assert_eq!(ga.xdva, gb.xdva);
    assert_ne!(ga.xret, gb.xret);
    let pb = b.predict(&x).unwrap();
    assert!(is_binary(&pb[0].image));
}

#[test]
fn left_eye_cannot_be_displaced() {
    let mut cfg = small_cfg();
    cfg.implant.eye = crate::geom::Eye::Left;
    let mut model = ModelB::new(cfg).unwrap();
    assert!(matches!(
        model.fit(&rows(&["A1"])),
        Err(PhospheneError::UnsupportedConfiguration { .. })
    ));
}
