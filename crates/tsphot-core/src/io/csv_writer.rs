use std::path::Path;

use crate::error::Result;
use crate::photometry::{LightCurve, LightCurveRow};

/// Write a light curve as CSV, one header line then one row per epoch.
pub fn write_light_curve(curve: &LightCurve, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in &curve.rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read back a light curve CSV written by [`write_light_curve`].
pub fn read_light_curve(path: &Path) -> Result<Vec<LightCurveRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<LightCurveRow>, _>>()?;
    Ok(rows)
}
