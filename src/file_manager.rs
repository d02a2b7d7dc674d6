// src/file_manager.rs - Measurement files and key scripts
use std::path::Path;
use thiserror::Error;
use tokio::fs;

use crate::gcode::format_coord;
use crate::motion::Position;

/// Written in every column of a scan point that was never saved.
pub const UNSET_SENTINEL: &str = "NaN";

pub const HEADER: [&str; 3] = ["X", "Y", "Z"];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Write `X,Y,Z` rows with a header. Unset rows are written as the sentinel.
///
/// Returns the number of data rows written.
pub async fn write_datapoints(
    path: &Path,
    rows: &[Option<Position>],
) -> Result<usize, StoreError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(HEADER)?;
    for row in rows {
        match row {
            Some(p) => wtr.write_record([format_coord(p.x), format_coord(p.y), format_coord(p.z)])?,
            None => wtr.write_record([UNSET_SENTINEL; 3])?,
        }
    }
    let data = wtr.into_inner().map_err(|e| e.into_error())?;

    tracing::info!("Writing {} datapoints to {}", rows.len(), path.display());
    fs::write(path, data).await?;
    Ok(rows.len())
}

/// Read a file written by [`write_datapoints`]. Sentinel rows come back as `None`.
pub async fn read_datapoints(path: &Path) -> Result<Vec<Option<Position>>, StoreError> {
    let content = fs::read(path).await?;
    let mut rdr = csv::Reader::from_reader(content.as_slice());
    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let values: Vec<Option<f64>> = record
            .iter()
            .map(|field| field.parse::<f64>().ok().filter(|v| v.is_finite()))
            .collect();
        rows.push(match values.as_slice() {
            [Some(x), Some(y), Some(z)] => Some(Position::new(*x, *y, *z)),
            _ => None,
        });
    }
    Ok(rows)
}

/// Load a key script: every non-whitespace character is one key press,
/// `#` starts a comment running to the end of the line.
pub async fn read_key_script(path: &Path) -> Result<Vec<char>, StoreError> {
    tracing::info!("Reading key script: {}", path.display());
    let content = fs::read_to_string(path).await?;
    let keys: Vec<char> = content
        .lines()
        .map(|line| line.split('#').next().unwrap_or(""))
        .flat_map(|line| line.chars())
        .filter(|c| !c.is_whitespace())
        .collect();
    tracing::info!("Loaded {} keys from {}", keys.len(), path.display());
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_write_with_sentinel_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scan.csv");
        let rows = vec![Some(Position::new(0.0, 50.0, 4.8)), None];
        assert_eq!(write_datapoints(&path, &rows).await.unwrap(), 2);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "X,Y,Z\n0,50,4.8\nNaN,NaN,NaN\n");
        assert_eq!(read_datapoints(&path).await.unwrap(), rows);
    }

    #[tokio::test]
    async fn test_empty_rows_write_header_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        assert_eq!(write_datapoints(&path, &[]).await.unwrap(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "X,Y,Z\n");
    }

    #[tokio::test]
    async fn test_key_script_comments() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.txt");
        std::fs::write(&path, "z  # rectangle mode\neeeee y\n# nothing here\nd d\n").unwrap();
        let keys = read_key_script(&path).await.unwrap();
        assert_eq!(keys.iter().collect::<String>(), "zeeeeeydd");
    }
}
