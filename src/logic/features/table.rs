//! Feature rows as CSV.
//!
//! The header is the feature layout itself. Any other header (missing,
//! reordered or extra columns) is a configuration mismatch, because the
//! scaler and model are tied to column position.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use super::layout::{header_matches, FEATURE_COUNT, FEATURE_LAYOUT};
use super::vector::FeatureVector;
use crate::logic::error::{Result, SentinelError};

/// Write feature rows with the layout header
pub fn write_features_csv(vectors: &[FeatureVector], path: &Path) -> Result<usize> {
    for vector in vectors {
        vector.validate()?;
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "{}", FEATURE_LAYOUT.join(","))?;

    for vector in vectors {
        let row: Vec<String> = vector.values.iter().map(|v| v.to_string()).collect();
        writeln!(out, "{}", row.join(","))?;
    }

    out.flush()?;
    log::info!("Wrote {} feature rows to {}", vectors.len(), path.display());
    Ok(vectors.len())
}

/// Read feature rows, rejecting any header that is not the current layout
pub fn read_features_csv(path: &Path) -> Result<Vec<FeatureVector>> {
    let file = File::open(path)
        .map_err(|e| SentinelError::Input(format!("Cannot open feature file {}: {}", path.display(), e)))?;
    let mut lines = BufReader::new(file).lines();

    let header = match lines.next() {
        Some(line) => line?,
        None => {
            return Err(SentinelError::Input(format!("Feature file {} is empty", path.display())));
        }
    };

    let columns: Vec<&str> = header.split(',').map(str::trim).collect();
    if !header_matches(&columns) {
        return Err(SentinelError::ConfigMismatch(format!(
            "Feature columns [{}] do not match layout [{}]",
            columns.join(","),
            FEATURE_LAYOUT.join(",")
        )));
    }

    let mut vectors = Vec::new();
    for (idx, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let line_no = idx + 2;
        vectors.push(parse_row(&line).map_err(|msg| {
            SentinelError::Input(format!("{}:{}: {}", path.display(), line_no, msg))
        })?);
    }

    log::debug!("Read {} feature rows from {}", vectors.len(), path.display());
    Ok(vectors)
}

fn parse_row(line: &str) -> std::result::Result<FeatureVector, String> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != FEATURE_COUNT {
        return Err(format!("expected {} fields, got {}", FEATURE_COUNT, fields.len()));
    }

    let mut values = [0.0f32; FEATURE_COUNT];
    for (i, (field, name)) in fields.iter().zip(FEATURE_LAYOUT.iter()).enumerate() {
        values[i] = match field.parse::<f32>() {
            Ok(v) if v.is_finite() => v,
            _ => return Err(format!("bad {} value {:?}", name, field)),
        };
    }

    Ok(FeatureVector::from_values(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_and_read_features() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("features.csv");

        let rows = vec![
            FeatureVector::from_values([1.0, 4.0, 1000.0, 250.0, 1000.0, 4.0, 1.0]),
            FeatureVector::from_values([0.0, 1.0, 60.0, 60.0, 60.0, 1.0, 2.0]),
        ];
        assert_eq!(write_features_csv(&rows, &path).unwrap(), 2);

        let first_line = std::fs::read_to_string(&path).unwrap().lines().next().unwrap().to_string();
        assert_eq!(first_line, FEATURE_LAYOUT.join(","));

        assert_eq!(read_features_csv(&path).unwrap(), rows);
    }

    #[test]
    fn test_reordered_header_is_config_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("features.csv");
        std::fs::write(
            &path,
            "packet_count,duration,total_bytes,avg_pkt_size,bytes_per_sec,pkts_per_sec,proto_num\n1,1,1,1,1,1,1\n",
        )
        .unwrap();

        let err = read_features_csv(&path).unwrap_err();
        assert!(matches!(err, SentinelError::ConfigMismatch(_)));
    }

    #[test]
    fn test_extra_column_is_config_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("features.csv");
        std::fs::write(&path, format!("{},label\n", FEATURE_LAYOUT.join(","))).unwrap();

        assert!(matches!(read_features_csv(&path), Err(SentinelError::ConfigMismatch(_))));
    }

    #[test]
    fn test_bad_value_reports_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("features.csv");
        std::fs::write(
            &path,
            format!("{}\n1,1,1,1,1,1,1\n1,1,abc,1,1,1,1\n", FEATURE_LAYOUT.join(",")),
        )
        .unwrap();

        let err = read_features_csv(&path).unwrap_err();
        assert!(matches!(err, SentinelError::Input(_)));
        assert!(err.to_string().contains(":3:"));
        assert!(err.to_string().contains("total_bytes"));
    }

    #[test]
    fn test_empty_file_is_input_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("features.csv");
        std::fs::write(&path, "").unwrap();

        assert!(matches!(read_features_csv(&path), Err(SentinelError::Input(_))));
    }
}
