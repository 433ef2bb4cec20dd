//! Mean images: one canonical shape from several trial drawings.
//!
//! Purpose
//! - Turn the drawings a subject made for one (amplitude, electrode) into a
//!   single target shape, refusing groups whose drawings disagree so much that
//!   their average is a scatter instead of a shape.
//!
//! Two variants
//! - `aggregate`: recenter, sum, normalize, optional Otsu, move back to the
//!   mean trial center, reject when the result is much larger than a trial.
//! - `aggregate_registered`: recenter, register every trial onto the first
//!   with SRD, sum (seed included), Otsu, then rotate to the mean trial
//!   orientation and scale to the mean trial area.
//!
//! Code cross-refs: `crate::srd::align`, `crate::imgproc`.

use std::collections::BTreeMap;

use crate::error::{Degeneracy, PhospheneError, Result};
use crate::imgproc::{
    axial_mean, binarize, binarize_otsu, center_phosphene, ensure_same_shape, region_props,
    warp_similarity, ShapeImage,
};
use crate::implant::ElectrodeName;
use crate::parallel::Executor;
use crate::srd::{align, apply_alignment};

/// Result of `aggregate`.
#[derive(Clone, Debug, PartialEq)]
pub enum Aggregate {
    Mean(ShapeImage),
    /// Mean image area exceeded `limit` (= ratio × mean trial area).
    Rejected { area: f64, limit: f64 },
}

impl Aggregate {
    pub fn into_image(self) -> Option<ShapeImage> {
        match self {
            Aggregate::Mean(img) => Some(img),
            Aggregate::Rejected { .. } => None,
        }
    }
}

fn check_trials(images: &[ShapeImage]) -> Result<&ShapeImage> {
    let first = images
        .first()
        .ok_or_else(|| PhospheneError::shape("no trial images to aggregate"))?;
    for img in &images[1..] {
        ensure_same_shape(first, img, "aggregate")?;
    }
    Ok(first)
}

/// Foreground centroid `(x, y)` of every image.
pub fn trial_centers(images: &[ShapeImage]) -> Vec<(f64, f64)> {
    images.iter().map(|img| region_props(img, 0.0).centroid()).collect()
}

/// Average `images` into one shape.
///
/// `centers` are the trial centroids `(x, y)`; the result is moved to their
/// mean. The result is `Rejected` when its region area (pixels above zero)
/// exceeds `max_area_ratio` times the mean trial area.
pub fn aggregate(
    images: &[ShapeImage],
    centers: &[(f64, f64)],
    threshold: bool,
    max_area_ratio: f64,
) -> Result<Aggregate> {
    let first = check_trials(images)?;
    if centers.len() != images.len() {
        return Err(PhospheneError::shape(format!(
            "{} centers for {} images",
            centers.len(),
            images.len()
        )));
    }
    if !(max_area_ratio.is_finite() && max_area_ratio > 0.0) {
        return Err(PhospheneError::config(format!(
            "max_area_ratio must be positive, got {max_area_ratio}"
        )));
    }
    let (rows, cols) = first.shape();
    let mut sum = ShapeImage::zeros(rows, cols);
    for img in images {
        sum += center_phosphene(img, None);
    }
    let peak = sum.max();
    if peak > 0.0 {
        sum /= peak;
    } else {
        Degeneracy::EmptyImage { context: "aggregate" }.report();
    }
    let avg = if threshold { binarize_otsu(&sum) } else { sum };

    let n = centers.len() as f64;
    let target = centers
        .iter()
        .fold((0.0, 0.0), |(x, y), c| (x + c.0 / n, y + c.1 / n));
    let avg = center_phosphene(&avg, Some(target));

    let mean_area = images
        .iter()
        .map(|img| region_props(img, 0.0).area)
        .sum::<f64>()
        / n;
    let area = region_props(&avg, 0.0).area;
    let limit = max_area_ratio * mean_area;
    if area > limit {
        return Ok(Aggregate::Rejected { area, limit });
    }
    Ok(Aggregate::Mean(avg))
}

/// Registration-based mean image; the first non-blank trial is the seed every
/// other non-blank trial is registered onto.
pub fn aggregate_registered(images: &[ShapeImage]) -> Result<ShapeImage> {
    check_trials(images)?;
    let centered: Vec<ShapeImage> = images
        .iter()
        .map(|img| binarize(&center_phosphene(img, None), 0.0))
        .collect();
    let props: Vec<_> = centered.iter().map(|img| region_props(img, 0.0)).collect();
    if centered.len() == 1 {
        return Ok(centered[0].clone());
    }

    let Some(seed_idx) = props.iter().position(|p| !p.is_empty()) else {
        Degeneracy::EmptyImage {
            context: "registered aggregate",
        }
        .report();
        return Ok(centered[0].clone());
    };
    let seed = &centered[seed_idx];
    let seed_center = props[seed_idx].centroid();
    let mut sum = seed.clone();
    for (i, (img, p)) in centered.iter().zip(&props).enumerate() {
        if i == seed_idx || p.is_empty() {
            continue;
        }
        let reg = align(seed, img)?;
        if reg.degenerate.is_some() {
            continue;
        }
        sum += apply_alignment(img, p, seed_center, reg.params.scale, reg.params.angle);
    }
    let mask = binarize_otsu(&sum);
    let mp = region_props(&mask, 0.0);
    if mp.is_empty() {
        Degeneracy::EmptyImage {
            context: "registered aggregate",
        }
        .report();
        return Ok(mask);
    }

    let trials: Vec<_> = props.iter().filter(|p| !p.is_empty()).collect();
    let orientations: Vec<f64> = trials.iter().map(|p| p.orientation).collect();
    let mean_area = trials.iter().map(|p| p.area).sum::<f64>() / trials.len().max(1) as f64;
    let turn = (axial_mean(&orientations) - mp.orientation).to_degrees();
    let scale = if mean_area > 0.0 {
        (mean_area / mp.area).sqrt()
    } else {
        1.0
    };
    let pivot = mp.centroid();
    Ok(binarize(
        &warp_similarity(&mask, pivot, pivot, scale, turn),
        0.5,
    ))
}

/// Grouping key of `mean_images`.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupKey {
    pub subject: String,
    pub amp: f64,
    pub electrode: ElectrodeName,
}

/// One trial drawing.
#[derive(Clone, Debug, PartialEq)]
pub struct Trial {
    pub subject: String,
    pub amp: f64,
    pub electrode: ElectrodeName,
    pub image: ShapeImage,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeanImageCfg {
    /// Use `aggregate_registered` instead of `aggregate`.
    pub registered: bool,
    /// Otsu-binarize the mean (`aggregate` only).
    pub threshold: bool,
    pub max_area_ratio: f64,
}

impl Default for MeanImageCfg {
    fn default() -> Self {
        Self {
            registered: false,
            threshold: true,
            max_area_ratio: 1.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MeanImage {
    pub key: GroupKey,
    pub n_trials: usize,
    pub image: ShapeImage,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeanImages {
    pub accepted: Vec<MeanImage>,
    pub rejected: Vec<GroupKey>,
}

/// Group `trials` by (subject, amplitude, electrode) and aggregate each group
/// on `exec`. Groups are reported in key order.
pub fn mean_images(trials: &[Trial], cfg: &MeanImageCfg, exec: &Executor) -> Result<MeanImages> {
    let mut groups: BTreeMap<(String, u64, ElectrodeName), Vec<&Trial>> = BTreeMap::new();
    for t in trials {
        if !(t.amp.is_finite() && t.amp >= 0.0) {
            return Err(PhospheneError::shape(format!(
                "trial amplitude must be finite and non-negative, got {}",
                t.amp
            )));
        }
        // Non-negative floats order like their bit patterns; +0.0 folds -0.0.
        let amp_key = (t.amp + 0.0).to_bits();
        groups
            .entry((t.subject.clone(), amp_key, t.electrode.clone()))
            .or_default()
            .push(t);
    }
    let groups: Vec<Vec<&Trial>> = groups.into_values().collect();
    let outcomes = exec.map(&groups, |group| {
        let images: Vec<ShapeImage> = group.iter().map(|t| t.image.clone()).collect();
        let out = if cfg.registered {
            Aggregate::Mean(aggregate_registered(&images)?)
        } else {
            aggregate(
                &images,
                &trial_centers(&images),
                cfg.threshold,
                cfg.max_area_ratio,
            )?
        };
        Ok((group.len(), out))
    })?;

    let mut result = MeanImages::default();
    for (group, (n_trials, out)) in groups.iter().zip(outcomes) {
        let t = group[0];
        let key = GroupKey {
            subject: t.subject.clone(),
            amp: t.amp,
            electrode: t.electrode.clone(),
        };
        match out {
            Aggregate::Mean(image) => result.accepted.push(MeanImage {
                key,
                n_trials,
                image,
            }),
            Aggregate::Rejected { area, limit } => {
                tracing::info!(
                    subject = %key.subject,
                    amp = key.amp,
                    electrode = %key.electrode,
                    area,
                    limit,
                    "mean image rejected"
                );
                result.rejected.push(key);
            }
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{draw_disk, draw_ellipse, draw_trials, EllipseSpec, TrialJitter};

    fn two_disks(a: (f64, f64), b: (f64, f64)) -> ShapeImage {
        draw_disk((64, 64), a, 4.0) + draw_disk((64, 64), b, 4.0)
    }

    fn ellipse() -> ShapeImage {
        draw_ellipse(
            (64, 64),
            EllipseSpec {
                center: (22.0, 27.0),
                semi_major: 14.0,
                semi_minor: 6.0,
                orientation: 0.6,
            },
        )
    }

    #[test]
    fn identical_copies_average_to_themselves() {
        let img = ellipse();
        let copies = vec![img.clone(); 5];
        let centers = trial_centers(&copies);
        for threshold in [true, false] {
            let out = aggregate(&copies, &centers, threshold, 1.5).unwrap();
            assert_eq!(out, Aggregate::Mean(img.clone()));
        }
        // The registered variant stays centered.
        assert_eq!(
            aggregate_registered(&copies).unwrap(),
            center_phosphene(&img, None)
        );
    }

    #[test]
    fn scattered_trials_are_rejected() {
        let trials = vec![
            two_disks((10.0, 32.0), (54.0, 32.0)),
            two_disks((32.0, 10.0), (32.0, 54.0)),
        ];
        let centers = trial_centers(&trials);
        for threshold in [true, false] {
            match aggregate(&trials, &centers, threshold, 1.5).unwrap() {
                Aggregate::Rejected { area, limit } => {
                    let disk = draw_disk((64, 64), (32.0, 32.0), 4.0).sum();
                    assert_eq!(area, 4.0 * disk);
                    assert_eq!(limit, 1.5 * 2.0 * disk);
                }
                other => panic!("expected rejection, got {other:?}"),
            }
        }
        // A generous ratio keeps the same group.
        assert!(matches!(
            aggregate(&trials, &centers, true, 2.5).unwrap(),
            Aggregate::Mean(_)
        ));
    }

    #[test]
    fn crossed_trials_are_rejected_without_threshold() {
        let bar = |orientation| {
            draw_ellipse(
                (64, 64),
                EllipseSpec {
                    center: (32.0, 32.0),
                    semi_major: 20.0,
                    semi_minor: 3.0,
                    orientation,
                },
            )
        };
        let trials = vec![bar(0.0), bar(std::f64::consts::FRAC_PI_2)];
        let centers = trial_centers(&trials);
        let trial_area = region_props(&trials[0], 0.0).area;
        match aggregate(&trials, &centers, false, 1.5).unwrap() {
            Aggregate::Rejected { area, limit } => {
                // The union of both bars counts, not the summed intensity.
                assert!(area > 1.5 * trial_area, "{area} vs {trial_area}");
                assert!((limit - 1.5 * trial_area).abs() < 1e-9);
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn malformed_inputs_are_data_shape_errors() {
        let img = ellipse();
        assert!(matches!(
            aggregate(&[], &[], true, 1.5),
            Err(PhospheneError::DataShape { .. })
        ));
        assert!(matches!(
            aggregate(&[img.clone(), img.clone()], &[(0.0, 0.0)], true, 1.5),
            Err(PhospheneError::DataShape { .. })
        ));
        assert!(matches!(
            aggregate(&[img.clone(), ShapeImage::zeros(3, 3)], &[(0.0, 0.0); 2], true, 1.5),
            Err(PhospheneError::DataShape { .. })
        ));
        assert!(aggregate_registered(&[]).is_err());
    }

    #[test]
    fn registered_mean_keeps_mean_area_and_orientation() {
        let base = EllipseSpec {
            center: (32.0, 32.0),
            semi_major: 16.0,
            semi_minor: 7.0,
            orientation: 0.4,
        };
        let trials = draw_trials((64, 64), base, TrialJitter::default(), 11, 6);
        let props: Vec<_> = trials.iter().map(|t| region_props(t, 0.0)).collect();
        let mean_area = props.iter().map(|p| p.area).sum::<f64>() / 6.0;
        let mean_orient = axial_mean(&props.iter().map(|p| p.orientation).collect::<Vec<_>>());

        let out = aggregate_registered(&trials).unwrap();
        let p = region_props(&out, 0.0);
        assert!((p.area - mean_area).abs() / mean_area < 0.05, "{} vs {mean_area}", p.area);
        assert!((p.orientation - mean_orient).abs() < 0.05);
        assert!(out.iter().all(|&v| v == 0.0 || v == 1.0));
    }

    #[test]
    fn registered_mean_skips_blank_trials() {
        let disks: Vec<ShapeImage> = [(30.0, 34.0), (33.0, 31.0), (29.5, 30.5)]
            .iter()
            .map(|&c| draw_disk((64, 64), c, 8.0))
            .collect();
        let mut with_blank = vec![ShapeImage::zeros(64, 64)];
        with_blank.extend(disks.iter().cloned());

        let out = aggregate_registered(&with_blank).unwrap();
        let area = region_props(&out, 0.0).area;
        let disk_area = disks.iter().map(|d| region_props(d, 0.0).area).sum::<f64>() / 3.0;
        assert!(area > 0.0);
        assert!((area - disk_area).abs() / disk_area < 0.05, "{area} vs {disk_area}");
        assert_eq!(out, aggregate_registered(&disks).unwrap());

        let blank = vec![ShapeImage::zeros(64, 64); 3];
        assert_eq!(aggregate_registered(&blank).unwrap(), ShapeImage::zeros(64, 64));
    }

    #[test]
    fn mean_images_groups_and_reports_rejections() {
        let e = |s: &str| ElectrodeName::parse(s).unwrap();
        let good = ellipse();
        let mut trials = Vec::new();
        for _ in 0..3 {
            trials.push(Trial {
                subject: "S1".into(),
                amp: 2.0,
                electrode: e("A01"),
                image: good.clone(),
            });
        }
        trials.push(Trial {
            subject: "S1".into(),
            amp: 2.0,
            electrode: e("B2"),
            image: two_disks((10.0, 32.0), (54.0, 32.0)),
        });
        trials.push(Trial {
            subject: "S1".into(),
            amp: 2.0,
            electrode: e("B2"),
            image: two_disks((32.0, 10.0), (32.0, 54.0)),
        });
        let out = mean_images(&trials, &MeanImageCfg::default(), &Executor::serial()).unwrap();
        assert_eq!(out.accepted.len(), 1);
        assert_eq!(out.accepted[0].key.electrode.as_str(), "A1");
        assert_eq!(out.accepted[0].n_trials, 3);
        assert_eq!(out.accepted[0].image, good);
        assert_eq!(out.rejected.len(), 1);
        assert_eq!(out.rejected[0].electrode.as_str(), "B2");
    }
}
