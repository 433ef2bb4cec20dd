//! CSV tables in and out of the CLI (polars).

use anyhow::{Context, Result};
use phosphene::api::{region_props, FeatureRow, Prediction, ShapeImage};
use phosphene::PhospheneError;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

use crate::provenance::ensure_parent;

fn data_shape(reason: String) -> PhospheneError {
    PhospheneError::DataShape { reason }
}

fn read_csv(path: &Path, has_header: bool) -> Result<DataFrame> {
    LazyCsvReader::new(path)
        .with_has_header(has_header)
        .with_infer_schema_length(Some(100))
        .finish()
        .and_then(|lf| lf.collect())
        .with_context(|| format!("reading {}", path.display()))
}

fn optional_f64(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<f64>>>> {
    let Ok(col) = df.column(name) else {
        return Ok(None);
    };
    let col = col.cast(&DataType::Float64)?;
    Ok(Some(col.f64()?.into_iter().collect()))
}

fn optional_i64(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<i64>>>> {
    let Ok(col) = df.column(name) else {
        return Ok(None);
    };
    let col = col.cast(&DataType::Int64)?;
    Ok(Some(col.i64()?.into_iter().collect()))
}

fn drawing_shape(rows: Option<i64>, cols: Option<i64>, line: usize) -> Result<Option<(usize, usize)>> {
    match (rows, cols) {
        (None, None) => Ok(None),
        (Some(r), Some(c)) if r > 0 && c > 0 => Ok(Some((r as usize, c as usize))),
        (r, c) => Err(data_shape(format!(
            "row {line}: drawing shape needs two positive sizes, got img_rows={r:?} img_cols={c:?}"
        ))
        .into()),
    }
}

/// Feature rows from a CSV with a required `electrode` column and optional
/// `id`, `amp`, `img_rows` and `img_cols` columns.
pub fn read_features(path: &Path) -> Result<Vec<FeatureRow>> {
    let df = read_csv(path, true)?;
    let electrodes = df
        .column("electrode")
        .map_err(|_| data_shape(format!("{} has no 'electrode' column", path.display())))?
        .cast(&DataType::String)?;
    let electrodes = electrodes.str()?;

    let ids: Vec<Option<String>> = match df.column("id") {
        Ok(col) => {
            let col = col.cast(&DataType::String)?;
            let ids = col.str()?.into_iter().map(|v| v.map(str::to_string)).collect();
            ids
        }
        Err(_) => vec![None; df.height()],
    };
    let amps = optional_f64(&df, "amp")?;
    let img_rows = optional_i64(&df, "img_rows")?;
    let img_cols = optional_i64(&df, "img_cols")?;
    if img_rows.is_some() != img_cols.is_some() {
        return Err(data_shape(format!(
            "{}: 'img_rows' and 'img_cols' must be given together",
            path.display()
        ))
        .into());
    }

    let mut rows = Vec::with_capacity(df.height());
    for (i, electrode) in electrodes.into_iter().enumerate() {
        let electrode =
            electrode.ok_or_else(|| data_shape(format!("row {i}: empty 'electrode' value")))?;
        let id = ids[i].clone().unwrap_or_else(|| i.to_string());
        let mut row = FeatureRow::new(id, electrode);
        row.amp = amps.as_ref().and_then(|a| a[i]);
        row.img_shape = drawing_shape(
            img_rows.as_ref().and_then(|r| r[i]),
            img_cols.as_ref().and_then(|c| c[i]),
            i,
        )?;
        rows.push(row);
    }
    tracing::debug!(rows = rows.len(), path = %path.display(), "feature rows read");
    Ok(rows)
}

/// A header-less numeric CSV as an image (one CSV row per image row).
pub fn read_image(path: &Path) -> Result<ShapeImage> {
    let df = read_csv(path, false)?;
    let (rows, cols) = df.shape();
    if rows == 0 || cols == 0 {
        return Err(data_shape(format!("{} holds no pixels", path.display())).into());
    }
    let mut data = Vec::with_capacity(rows * cols);
    for col in df.get_columns() {
        let col = col.cast(&DataType::Float64)?;
        for v in col.f64()?.into_iter() {
            data.push(v.ok_or_else(|| {
                data_shape(format!("{}: missing or non-numeric pixel", path.display()))
            })?);
        }
    }
    // Column-major, like the frame.
    Ok(ShapeImage::from_vec(rows, cols, data))
}

fn write_frame(path: &Path, df: &mut DataFrame, header: bool) -> Result<()> {
    ensure_parent(path)?;
    let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(header)
        .finish(df)
        .with_context(|| format!("writing {}", path.display()))
}

/// Inverse of `read_image`.
pub fn write_image(path: &Path, img: &ShapeImage) -> Result<()> {
    let columns: Vec<Series> = img
        .column_iter()
        .enumerate()
        .map(|(c, col)| {
            let name = format!("c{c}");
            Series::new(name.as_str().into(), col.iter().copied().collect::<Vec<f64>>())
        })
        .collect();
    let mut df = DataFrame::new(columns)?;
    write_frame(path, &mut df, false)
}

/// One line per prediction with the region properties of its drawing.
pub fn write_predictions(path: &Path, predictions: &[Prediction]) -> Result<()> {
    let props: Vec<_> = predictions
        .iter()
        .map(|p| region_props(&p.image, 0.0))
        .collect();
    let mut df = df!(
        "id" => predictions.iter().map(|p| p.id.clone()).collect::<Vec<_>>(),
        "rows" => predictions.iter().map(|p| p.image.nrows() as u64).collect::<Vec<_>>(),
        "cols" => predictions.iter().map(|p| p.image.ncols() as u64).collect::<Vec<_>>(),
        "area" => props.iter().map(|p| p.area).collect::<Vec<_>>(),
        "x_center" => props.iter().map(|p| p.x_center).collect::<Vec<_>>(),
        "y_center" => props.iter().map(|p| p.y_center).collect::<Vec<_>>(),
        "orientation" => props.iter().map(|p| p.orientation).collect::<Vec<_>>(),
        "major_axis_length" => props.iter().map(|p| p.major_axis_length).collect::<Vec<_>>(),
        "minor_axis_length" => props.iter().map(|p| p.minor_axis_length).collect::<Vec<_>>(),
        "degenerate" => predictions.iter().map(|p| !p.degeneracies.is_empty()).collect::<Vec<_>>()
    )?;
    write_frame(path, &mut df, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn features_with_optional_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        fs::write(
            &path,
            "id,electrode,amp,img_rows,img_cols\ns1,A1,2.0,48,64\ns2,B3_C4,,,\n",
        )
        .unwrap();
        let rows = read_features(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "s1");
        assert_eq!(rows[0].amp, Some(2.0));
        assert_eq!(rows[0].img_shape, Some((48, 64)));
        assert_eq!(rows[1].electrode, "B3_C4");
        assert_eq!(rows[1].amp, None);
        assert_eq!(rows[1].img_shape, None);
    }

    #[test]
    fn ids_default_to_row_numbers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        fs::write(&path, "electrode\nA1\nF10\n").unwrap();
        let rows = read_features(&path).unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["0", "1"]);
    }

    #[test]
    fn missing_electrode_column_is_a_shape_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        fs::write(&path, "id,amp\na,1.0\n").unwrap();
        let err = read_features(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PhospheneError>(),
            Some(PhospheneError::DataShape { .. })
        ));
    }

    #[test]
    fn half_a_drawing_shape_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        fs::write(&path, "electrode,img_rows\nA1,10\n").unwrap();
        assert!(read_features(&path).is_err());
    }

    #[test]
    fn image_files_keep_row_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("img.csv");
        fs::write(&path, "0,0,1\n0,1,1\n").unwrap();
        let img = read_image(&path).unwrap();
        assert_eq!(img.shape(), (2, 3));
        assert_eq!(img[(0, 2)], 1.0);
        assert_eq!(img[(1, 0)], 0.0);
        assert_eq!(img.sum(), 3.0);

        let copy = dir.path().join("copy.csv");
        write_image(&copy, &img).unwrap();
        assert_eq!(read_image(&copy).unwrap(), img);
    }
}
