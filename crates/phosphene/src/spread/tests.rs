use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::error::Degeneracy;
use crate::geom::{Eye, GridCfg, ProjectDirect, RetinalGridStrategy, RetinalPoint};
use crate::implant::{parse_stimulus, ElectrodeArray, ElectrodeName, ImplantCfg};
use crate::parallel::{Executor, ParallelCfg};

fn array_grid() -> RetinalGrid {
    let cfg = GridCfg {
        xrange: (-12.0, 12.0),
        yrange: (-8.0, 8.0),
        step: 1.0,
    };
    ProjectDirect.build(&cfg, Eye::Right).unwrap()
}

fn names(list: &[&str]) -> Vec<ElectrodeName> {
    list.iter().map(|s| ElectrodeName::parse(s).unwrap()).collect()
}

fn origin_electrode() -> Electrode {
    Electrode {
        name: ElectrodeName::parse("A1").unwrap(),
        center: RetinalPoint::new(0.0, 0.0),
        radius: 100.0,
    }
}

#[derive(Debug, Default)]
struct CountingSpread {
    calls: AtomicUsize,
}

impl CurrentSpread for CountingSpread {
    fn map_for(&self, electrode: &Electrode, grid: &RetinalGrid) -> Result<CurrentMap> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Scoreboard::new(300.0)?.map_for(electrode, grid)
    }
}

#[derive(Debug)]
struct SquaringPhysiology;

impl AxonalPhysiology for SquaringPhysiology {
    fn current_spread(&self, electrode: &Electrode, grid: &RetinalGrid) -> Result<CurrentMap> {
        Gaussian::new(200.0)?.map_for(electrode, grid)
    }

    fn provides_effective_current(&self) -> bool {
        true
    }

    fn effective_current(&self, spread: &CurrentMap, _grid: &RetinalGrid) -> Result<CurrentMap> {
        Ok(spread.map(|v| v * v))
    }
}

#[test]
fn scoreboard_peaks_at_the_electrode() {
    let cfg = GridCfg {
        xrange: (-3.0, 3.0),
        yrange: (-2.0, 2.0),
        step: 1.0,
    };
    let grid = ProjectDirect.build(&cfg, Eye::Right).unwrap();
    let map = Scoreboard::new(100.0)
        .unwrap()
        .map_for(&origin_electrode(), &grid)
        .unwrap();
    assert_eq!(map.shape(), grid.shape());
    assert_eq!(map[(2, 3)], 1.0);
    // One dva to the right is 280 µm away.
    assert!((map[(2, 4)] - (-280.0f64 * 280.0 / 20_000.0).exp()).abs() < 1e-12);
    assert!(map.iter().all(|&v| (0.0..=1.0).contains(&v)));
}

#[test]
fn invalid_spread_parameters_are_rejected() {
    assert!(matches!(Gaussian::new(0.0), Err(PhospheneError::Configuration { .. })));
    assert!(Scoreboard::new(-5.0).is_err());
    assert!(Scoreboard::new(f64::NAN).is_err());
    assert!(matches!(
        "nanduri".parse::<SpreadKind>(),
        Err(PhospheneError::Configuration { .. })
    ));
    assert_eq!("AHUJA".parse::<SpreadKind>().unwrap(), SpreadKind::Ahuja);
    assert!(matches!(
        SpreadKind::Ahuja.build(0.0, true),
        Err(PhospheneError::Configuration { .. })
    ));
    assert!(SpreadKind::Ahuja.build(0.0, false).is_ok());
    assert!(SpreadKind::Gaussian.build(-1.0, false).is_err());
}

#[test]
fn ahuja_is_flat_under_the_disk_and_decays_outside() {
    let grid = array_grid();
    let e = origin_electrode();
    let map = Anatomical::new(Arc::new(AhujaSpread::default()), false)
        .unwrap()
        .map_for(&e, &grid)
        .unwrap();
    // Grid center is the electrode center.
    assert_eq!(map[(8, 12)], 1.0);
    let next = map[(8, 13)];
    let expected = 14000.0 / (14000.0 + (280.0f64 - 100.0).powf(1.69));
    assert!((next - expected).abs() < 1e-12);
    assert!(map[(8, 20)] < next);
}

#[test]
fn anatomical_applies_effective_current_when_requested() {
    let grid = array_grid();
    let e = origin_electrode();
    let raw = Anatomical::new(Arc::new(SquaringPhysiology), false)
        .unwrap()
        .map_for(&e, &grid)
        .unwrap();
    let ofl = Anatomical::new(Arc::new(SquaringPhysiology), true)
        .unwrap()
        .map_for(&e, &grid)
        .unwrap();
    assert_eq!(ofl, raw.map(|v| v * v));
}

#[test]
fn cached_electrodes_are_not_recomputed() {
    let grid = array_grid();
    let array = ImplantCfg::default().instantiate().unwrap();
    let spread = CountingSpread::default();
    let exec = ParallelCfg::threads(2).executor().unwrap();
    let mut cache = CurrentMapCache::new();

    let first = names(&["A1", "B02", "B2"]);
    assert_eq!(cache.ensure(&first, &array, &grid, &spread, &exec).unwrap(), 2);
    assert_eq!(spread.calls.load(Ordering::SeqCst), 2);

    let second = names(&["B2", "A01"]);
    assert_eq!(cache.ensure(&second, &array, &grid, &spread, &exec).unwrap(), 0);
    assert_eq!(spread.calls.load(Ordering::SeqCst), 2);

    assert_eq!(cache.ensure(&names(&["C3"]), &array, &grid, &spread, &exec).unwrap(), 1);
    assert_eq!(spread.calls.load(Ordering::SeqCst), 3);
    assert_eq!(cache.len(), 3);

    cache.clear();
    assert!(cache.is_empty());
    cache.ensure(&second, &array, &grid, &spread, &exec).unwrap();
    assert_eq!(spread.calls.load(Ordering::SeqCst), 5);
}

#[test]
fn unknown_electrodes_fail_the_batch() {
    let grid = array_grid();
    let array = ImplantCfg::default().instantiate().unwrap();
    let spread = CountingSpread::default();
    let mut cache = CurrentMapCache::new();
    let err = cache.ensure(&names(&["A1", "Z9"]), &array, &grid, &spread, &Executor::serial());
    assert!(matches!(err, Err(PhospheneError::ElectrodeNotFound { .. })));
    assert!(cache.is_empty());
}

#[test]
fn duplicate_inserts_fail_loudly() {
    let mut cache = CurrentMapCache::new();
    let a1 = ElectrodeName::parse("A1").unwrap();
    cache
        .insert_batch(vec![(a1.clone(), CurrentMap::zeros(2, 2))])
        .unwrap();
    let again = cache.insert_batch(vec![
        (ElectrodeName::parse("B1").unwrap(), CurrentMap::zeros(2, 2)),
        (ElectrodeName::parse("A01").unwrap(), CurrentMap::zeros(2, 2)),
    ]);
    assert!(matches!(again, Err(PhospheneError::DuplicateCacheEntry { .. })));
    assert_eq!(cache.len(), 1);

    let twice = cache.insert_batch(vec![
        (ElectrodeName::parse("C1").unwrap(), CurrentMap::zeros(2, 2)),
        (ElectrodeName::parse("C01").unwrap(), CurrentMap::zeros(2, 2)),
    ]);
    assert!(twice.is_err());
    assert!(!cache.contains(&ElectrodeName::parse("C1").unwrap()));
    assert_eq!(cache.missing(&names(&["C1", "A1", "B1", "C1"])), names(&["B1", "C1"]));
}

#[test]
fn multi_electrode_field_peaks_at_the_amplitude() {
    let grid = array_grid();
    let array: ElectrodeArray = ImplantCfg::default().instantiate().unwrap();
    let electrodes = parse_stimulus("A1_B2").unwrap();
    let mut cache = CurrentMapCache::new();
    cache
        .ensure(&electrodes, &array, &grid, &Scoreboard::new(400.0).unwrap(), &Executor::serial())
        .unwrap();
    let out = stimulus_field("A1_B2", &electrodes, 2.5, &cache).unwrap();
    assert!((out.field.max() - 2.5).abs() < 1e-12);
    assert!(out.degeneracies.is_empty());

    let zero = stimulus_field("A1_B2", &electrodes, 0.0, &cache).unwrap();
    assert_eq!(zero.field.max(), 0.0);
    assert!(matches!(zero.degeneracies[..], [Degeneracy::ZeroAmplitude { .. }]));

    assert!(stimulus_field("A1", &electrodes, -1.0, &cache).is_err());
    assert!(matches!(
        stimulus_field("D7", &names(&["D7"]), 1.0, &cache),
        Err(PhospheneError::DataShape { .. })
    ));
}

#[test]
fn zero_peak_skips_scaling() {
    let mut cache = CurrentMapCache::new();
    let dark = names(&["A1"]);
    cache
        .insert_batch(vec![(dark[0].clone(), CurrentMap::zeros(3, 4))])
        .unwrap();
    let out = stimulus_field("A1", &dark, 1.0, &cache).unwrap();
    assert_eq!(out.field, CurrentMap::zeros(3, 4));
    assert!(matches!(out.degeneracies[..], [Degeneracy::ZeroPeak { .. }]));
}
