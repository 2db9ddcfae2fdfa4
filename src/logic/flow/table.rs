//! Flow rows as CSV.
//!
//! Column order: `src,sport,dst,dport,proto,start,end,duration,total_bytes,packet_count,avg_pkt_size`

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::net::IpAddr;
use std::path::Path;

use super::key::{FlowKey, Protocol};
use super::record::FlowRecord;
use crate::logic::error::{Result, SentinelError};

pub const FLOW_COLUMNS: &[&str] = &[
    "src", "sport", "dst", "dport", "proto", "start", "end", "duration",
    "total_bytes", "packet_count", "avg_pkt_size",
];

/// Write flow rows. An empty set writes nothing and returns 0.
pub fn write_flows_csv(flows: &[FlowRecord], path: &Path) -> Result<usize> {
    if flows.is_empty() {
        log::info!("No flows extracted, {} not written", path.display());
        return Ok(0);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "{}", FLOW_COLUMNS.join(","))?;

    for f in flows {
        writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{},{}",
            f.key.src,
            f.key.sport,
            f.key.dst,
            f.key.dport,
            f.key.protocol.label(),
            f.start,
            f.end,
            f.duration,
            f.total_bytes,
            f.packet_count,
            f.avg_pkt_size,
        )?;
    }

    out.flush()?;
    log::info!("Wrote {} flows to {}", flows.len(), path.display());
    Ok(flows.len())
}

/// Read flow rows written by [`write_flows_csv`] (or any CSV with the same header)
pub fn read_flows_csv(path: &Path) -> Result<Vec<FlowRecord>> {
    let file = File::open(path)
        .map_err(|e| SentinelError::Input(format!("Cannot open flow file {}: {}", path.display(), e)))?;
    let mut lines = BufReader::new(file).lines();

    let header = match lines.next() {
        Some(line) => line?,
        None => return Ok(Vec::new()),
    };
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();
    if columns != FLOW_COLUMNS {
        return Err(SentinelError::Input(format!(
            "Unexpected flow header in {}: {}",
            path.display(),
            header
        )));
    }

    let mut flows = Vec::new();
    for (idx, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        // Header is line 1
        let line_no = idx + 2;
        flows.push(parse_row(&line).map_err(|msg| {
            SentinelError::Input(format!("{}:{}: {}", path.display(), line_no, msg))
        })?);
    }

    Ok(flows)
}

fn parse_row(line: &str) -> std::result::Result<FlowRecord, String> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != FLOW_COLUMNS.len() {
        return Err(format!("expected {} fields, got {}", FLOW_COLUMNS.len(), fields.len()));
    }

    let src: IpAddr = fields[0].parse().map_err(|_| format!("bad src address {:?}", fields[0]))?;
    let sport = parse_port(fields[1])?;
    let dst: IpAddr = fields[2].parse().map_err(|_| format!("bad dst address {:?}", fields[2]))?;
    let dport = parse_port(fields[3])?;
    let protocol: Protocol = fields[4].parse().map_err(|e: SentinelError| e.to_string())?;

    let start = parse_f64(fields[5], "start")?;
    let end = parse_f64(fields[6], "end")?;
    let duration = parse_f64(fields[7], "duration")?;
    let total_bytes = parse_count(fields[8], "total_bytes")?;
    let packet_count = parse_count(fields[9], "packet_count")?;
    let avg_pkt_size = parse_f64(fields[10], "avg_pkt_size")?;

    if packet_count == 0 {
        return Err("packet_count must be at least 1".to_string());
    }
    if duration < 0.0 {
        return Err(format!("negative duration {}", duration));
    }

    Ok(FlowRecord {
        key: FlowKey::new(src, sport, dst, dport, protocol),
        start,
        end,
        duration,
        total_bytes,
        packet_count,
        avg_pkt_size,
    })
}

fn parse_port(s: &str) -> std::result::Result<u16, String> {
    s.parse().map_err(|_| format!("bad port {:?}", s))
}

fn parse_f64(s: &str, name: &str) -> std::result::Result<f64, String> {
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(format!("bad {} value {:?}", name, s)),
    }
}

/// Integer counts, tolerating a trailing ".0" from float-formatted exports
fn parse_count(s: &str, name: &str) -> std::result::Result<u64, String> {
    if let Ok(v) = s.parse::<u64>() {
        return Ok(v);
    }
    match s.parse::<f64>() {
        Ok(v) if v >= 0.0 && v.fract() == 0.0 => Ok(v as u64),
        _ => Err(format!("bad {} value {:?}", name, s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_flow() -> FlowRecord {
        FlowRecord::from_totals(
            FlowKey::new(
                "1.1.1.1".parse().unwrap(),
                1234,
                "2.2.2.2".parse().unwrap(),
                80,
                Protocol::Tcp,
            ),
            0.0,
            1.0,
            1000,
            4,
        )
    }

    #[test]
    fn test_write_and_read_flows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flows.csv");

        let icmp = FlowRecord::from_totals(
            FlowKey::new("10.0.0.1".parse().unwrap(), 0, "10.0.0.2".parse().unwrap(), 0, Protocol::Other(1)),
            5.0,
            5.0,
            98,
            1,
        );

        assert_eq!(write_flows_csv(&[sample_flow(), icmp.clone()], &path).unwrap(), 2);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("src,sport,dst,dport,proto,start,end"));

        let flows = read_flows_csv(&path).unwrap();
        assert_eq!(flows, vec![sample_flow(), icmp]);
    }

    #[test]
    fn test_empty_flows_write_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flows.csv");

        assert_eq!(write_flows_csv(&[], &path).unwrap(), 0);
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_file_is_input_error() {
        let dir = tempdir().unwrap();
        let err = read_flows_csv(&dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, SentinelError::Input(_)));
    }

    #[test]
    fn test_malformed_row_reports_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flows.csv");
        std::fs::write(
            &path,
            format!("{}\n1.1.1.1,1,2.2.2.2,2,TCP,0,1,1,10,0,0\n", FLOW_COLUMNS.join(",")),
        )
        .unwrap();

        let err = read_flows_csv(&path).unwrap_err();
        assert!(err.to_string().contains(":2:"));
    }

    #[test]
    fn test_float_formatted_counts_accepted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flows.csv");
        std::fs::write(
            &path,
            format!("{}\n1.1.1.1,1,2.2.2.2,2,UDP,0,2,2,300.0,3.0,100.0\n", FLOW_COLUMNS.join(",")),
        )
        .unwrap();

        let flows = read_flows_csv(&path).unwrap();
        assert_eq!(flows[0].total_bytes, 300);
        assert_eq!(flows[0].packet_count, 3);
    }
}
