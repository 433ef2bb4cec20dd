use super::*;
use proptest::prelude::*;

#[test]
fn displacement_matches_reference_values() {
    // Closed-form values of the curve at a few eccentricities.
    assert!((calc_displacement(0.0, Meridian::Temporal) - 0.495_750_647).abs() < 1e-8);
    assert!((calc_displacement(3.0, Meridian::Temporal) - 1.975_281_820).abs() < 1e-8);
    assert!((calc_displacement(3.0, Meridian::Nasal) - 1.815_803_787).abs() < 1e-8);
    assert!((calc_displacement(10.0, Meridian::Nasal) - 0.505_015_548).abs() < 1e-8);
}

#[test]
fn meridian_boundary_is_nasal() {
    assert_eq!(Meridian::of_x(-1e-12), Meridian::Temporal);
    assert_eq!(Meridian::of_x(0.0), Meridian::Nasal);
    assert_eq!(Meridian::of_x(4.0), Meridian::Nasal);
}

#[test]
fn to_retinal_uses_meridian_constants_by_sign_of_x() {
    let pts = [
        VisualFieldPoint::new(-3.0, 0.0),
        VisualFieldPoint::new(3.0, 0.0),
        VisualFieldPoint::new(0.0, 3.0),
    ];
    let ret = to_retinal(&pts, Eye::Right).unwrap();
    let temporal = 3.0 + calc_displacement(3.0, Meridian::Temporal);
    let nasal = 3.0 + calc_displacement(3.0, Meridian::Nasal);
    assert!((ret[0].x + dva2ret(temporal)).abs() < 1e-9);
    assert!(ret[0].y.abs() < 1e-9);
    assert!((ret[1].x - dva2ret(nasal)).abs() < 1e-9);
    // On the vertical meridian x = 0 counts as nasal.
    assert!((ret[2].y - dva2ret(nasal)).abs() < 1e-9);
    assert!(ret[2].x.abs() < 1e-9);
}

#[test]
fn left_eye_is_unsupported() {
    let pts = [VisualFieldPoint::new(1.0, 1.0)];
    assert!(matches!(
        to_retinal(&pts, Eye::Left),
        Err(crate::PhospheneError::UnsupportedConfiguration { .. })
    ));
    let inv = InverseDisplacement::new();
    let ret = [RetinalPoint::new(100.0, 0.0)];
    assert!(inv.to_visual(&ret, Eye::Left).is_err());
}

#[test]
fn inverse_is_undefined_outside_sampled_range() {
    let inv = InverseDisplacement::new();
    for m in [Meridian::Temporal, Meridian::Nasal] {
        let (lo, hi) = inv.displaced_range(m);
        assert!(inv.radius(lo - 1e-6, m).is_none());
        assert!(inv.radius(hi + 1e-6, m).is_none());
        assert!(inv.radius(f64::NAN, m).is_none());
        assert!(inv.radius(lo, m).unwrap().abs() < 1e-12);
    }
    // 40 dva lies far beyond the tabulated [0, 30) radius.
    let far = [RetinalPoint::new(dva2ret(40.0), 0.0)];
    assert_eq!(inv.to_visual(&far, Eye::Right).unwrap(), vec![None]);
}

#[test]
fn grid_shape_follows_ranges_and_step() {
    let cfg = GridCfg {
        xrange: (-3.0, 3.0),
        yrange: (-2.0, 2.0),
        step: 1.0,
    };
    assert_eq!(cfg.shape(), (5, 7));
    let g = ProjectDirect.build(&cfg, Eye::Right).unwrap();
    assert_eq!(g.shape(), (5, 7));
    assert_eq!(g.xdva[(0, 0)], -3.0);
    assert_eq!(g.xdva[(4, 6)], 3.0);
    assert_eq!(g.ydva[(0, 3)], -2.0);
    assert_eq!(g.ydva[(4, 3)], 2.0);
    assert_eq!(g.xret[(2, 6)], dva2ret(3.0));
}

#[test]
fn displaced_grid_matches_pointwise_transform() {
    let cfg = GridCfg {
        xrange: (-4.0, 4.0),
        yrange: (-3.0, 3.0),
        step: 0.5,
    };
    let g = ProjectThenDisplace.build(&cfg, Eye::Right).unwrap();
    let (ny, nx) = cfg.shape();
    assert_eq!(g.shape(), (ny, nx));
    assert_eq!(g.yret.shape(), (ny, nx));
    for &(r, c) in &[(0usize, 0usize), (3, 11), (ny - 1, nx - 1)] {
        let p = VisualFieldPoint::new(g.xdva[(r, c)], g.ydva[(r, c)]);
        let expected = to_retinal(&[p], Eye::Right).unwrap()[0];
        assert!((g.xret[(r, c)] - expected.x).abs() < 1e-9);
        assert!((g.yret[(r, c)] - expected.y).abs() < 1e-9);
    }
}

#[test]
fn invalid_grid_configs_are_rejected() {
    let bad_step = GridCfg {
        step: 0.0,
        ..GridCfg::default()
    };
    assert!(ProjectDirect.build(&bad_step, Eye::Right).is_err());
    let flipped = GridCfg {
        xrange: (5.0, -5.0),
        ..GridCfg::default()
    };
    assert!(ProjectThenDisplace.build(&flipped, Eye::Right).is_err());
    assert!(ProjectThenDisplace
        .build(&GridCfg::default(), Eye::Left)
        .is_err());
}

proptest! {
    #[test]
    fn round_trip_recovers_points_inside_sampled_domain(
        theta in -std::f64::consts::PI..std::f64::consts::PI,
        rho in 0.05f64..29.8,
    ) {
        let p = VisualFieldPoint::new(rho * theta.cos(), rho * theta.sin());
        let ret = to_retinal(&[p], Eye::Right).unwrap();
        let back = InverseDisplacement::new().to_visual(&ret, Eye::Right).unwrap()[0];
        let back = back.expect("inside the tabulated range");
        prop_assert!((back.x - p.x).abs() < 1e-2);
        prop_assert!((back.y - p.y).abs() < 1e-2);
    }

    #[test]
    fn displacement_is_positive_and_finite(r in 0.0f64..60.0) {
        for m in [Meridian::Temporal, Meridian::Nasal] {
            let d = calc_displacement(r, m);
            prop_assert!(d.is_finite());
            prop_assert!(d > 0.0);
        }
    }
}
