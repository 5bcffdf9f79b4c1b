//! Open ports per host from an archive of Nmap results.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::net::Ipv4Addr;

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::errors::Result;
use crate::utils::upload::{extension_of, is_path_traversal};

pub const FILTERED: &str = "Filtered";
/// Host cell used to pad the last pair of an odd host list.
pub const PLACEHOLDER_HOST: &str = "-";
pub const HEADER: [&str; 6] = ["HOST", "PORT", "SERVICE", "HOST", "PORT", "SERVICE"];

static HOST_RE: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"Nmap scan report for (?:[a-zA-Z0-9.-]+ )?\(?(\d+\.\d+\.\d+\.\d+)\)?")
        .case_insensitive(true)
        .build()
        .expect("static regex compile")
});

static PORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)/(tcp|udp)\s+(open|filtered|closed|unfiltered)\s+([\w-]*)")
        .expect("static regex compile")
});

static FILTERED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Not shown: (\d+) filtered tcp ports").expect("static regex compile"));

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostPorts {
    pub host: String,
    /// `(port, service)` in first-seen order, without duplicates.
    pub ports: Vec<(String, String)>,
    /// Whether the scan reported a block of filtered ports for the host.
    pub filtered: bool,
}

impl HostPorts {
    fn add(&mut self, port: String, service: String) {
        if !self.ports.iter().any(|(p, s)| *p == port && *s == service) {
            self.ports.push((port, service));
        }
    }

    /// Ports to display; a host with none shows as filtered.
    #[must_use]
    pub fn display_ports(&self) -> Vec<(String, String)> {
        if self.ports.is_empty() {
            vec![(FILTERED.to_string(), FILTERED.to_string())]
        } else {
            self.ports.clone()
        }
    }
}

/// One row of the side-by-side Nmap sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NmapRow {
    pub cells: [String; 6],
    pub is_header: bool,
}

impl NmapRow {
    fn header() -> Self {
        Self {
            cells: HEADER.map(str::to_string),
            is_header: true,
        }
    }
}

/// Everything found in an Nmap upload.
#[derive(Debug, Clone, Default)]
pub struct NmapScan {
    hosts: HashMap<String, HostPorts>,
}

impl NmapScan {
    fn host_mut(&mut self, host: &str) -> &mut HostPorts {
        self.hosts.entry(host.to_string()).or_insert_with(|| HostPorts {
            host: host.to_string(),
            ..HostPorts::default()
        })
    }

    /// Parses plain `nmap -oN` output.
    pub fn add_text(&mut self, text: &str) {
        let mut current: Option<String> = None;
        for line in text.lines() {
            if let Some(caps) = HOST_RE.captures(line) {
                let ip = caps[1].to_string();
                self.host_mut(&ip);
                current = Some(ip);
                continue;
            }
            let Some(host) = current.as_deref() else {
                continue;
            };
            if FILTERED_RE.is_match(line) {
                self.host_mut(host).filtered = true;
            } else if let Some(caps) = PORT_RE.captures(line) {
                let port = format!("{}/{}", &caps[1], &caps[2]);
                let service = if caps[4].is_empty() { &caps[3] } else { &caps[4] };
                self.host_mut(host).add(port, service.to_string());
            }
        }
    }

    /// Parses a CSV export with `host`, `port` and `service` columns.
    pub fn add_csv(&mut self, data: &[u8]) -> Result<()> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(data);
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();
        let col = |name: &str| headers.iter().position(|h| h == name);
        let (Some(host_col), Some(port_col), Some(service_col)) = (col("host"), col("port"), col("service")) else {
            warn!("Nmap CSV is missing host/port/service columns");
            return Ok(());
        };

        for record in reader.records() {
            let record = record?;
            let host = record.get(host_col).unwrap_or("").trim();
            if host.is_empty() {
                continue;
            }
            let port = record.get(port_col).unwrap_or("").trim().to_string();
            let service = record.get(service_col).unwrap_or("").trim().to_string();
            let entry = self.host_mut(host);
            if !port.is_empty() {
                entry.add(port, service);
            }
        }
        Ok(())
    }

    /// Hosts in ascending address order.
    #[must_use]
    pub fn hosts(&self) -> Vec<&HostPorts> {
        let mut hosts: Vec<&HostPorts> = self.hosts.values().collect();
        hosts.sort_by(|a, b| host_key(&a.host).cmp(&host_key(&b.host)));
        hosts
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Rows of the two-hosts-per-block layout.
    ///
    /// Every block starts with the `HOST PORT SERVICE HOST PORT SERVICE`
    /// header, followed by as many rows as the longer side has ports. The
    /// host cell repeats on each of its rows and the shorter side is padded
    /// with empty port and service cells.
    #[must_use]
    pub fn paired_rows(&self) -> Vec<NmapRow> {
        let hosts = self.hosts();
        let mut rows = Vec::new();

        for pair in hosts.chunks(2) {
            let left = pair[0];
            let left_ports = left.display_ports();
            let (right_host, right_ports) = match pair.get(1) {
                Some(right) => (right.host.as_str(), right.display_ports()),
                None => (PLACEHOLDER_HOST, Vec::new()),
            };

            rows.push(NmapRow::header());
            let height = left_ports.len().max(right_ports.len()).max(1);
            for i in 0..height {
                let (lp, ls) = left_ports.get(i).cloned().unwrap_or_default();
                let (rp, rs) = right_ports.get(i).cloned().unwrap_or_default();
                rows.push(NmapRow {
                    cells: [left.host.clone(), lp, ls, right_host.to_string(), rp, rs],
                    is_header: false,
                });
            }
        }
        rows
    }
}

fn host_key(host: &str) -> (u8, Option<Ipv4Addr>, &str) {
    match host.parse::<Ipv4Addr>() {
        Ok(ip) => (0, Some(ip), host),
        Err(_) => (1, None, host),
    }
}

/// Reads every file of an Nmap upload; `.csv` entries are parsed as CSV and
/// everything else as Nmap text output.
///
/// # Errors
///
/// Fails when the archive itself cannot be opened. Unreadable entries are
/// logged and skipped.
#[tracing::instrument(level = "info", skip_all)]
pub fn parse_nmap_archive(zip_bytes: &[u8]) -> Result<NmapScan> {
    let mut archive = ZipArchive::new(Cursor::new(zip_bytes))?;
    let mut scan = NmapScan::default();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();
        if entry.is_dir() || is_path_traversal(&name) || name.starts_with("__MACOSX/") {
            continue;
        }
        let mut data = Vec::with_capacity(entry.size() as usize);
        if let Err(e) = entry.read_to_end(&mut data) {
            warn!(entry = %name, "Failed to read Nmap entry: {}", e);
            continue;
        }

        if extension_of(&name).as_deref() == Some("csv") {
            if let Err(e) = scan.add_csv(&data) {
                warn!(entry = %name, "Failed to parse Nmap CSV: {}", e);
            }
        } else {
            scan.add_text(&String::from_utf8_lossy(&data));
        }
        debug!(entry = %name, "Parsed Nmap entry");
    }

    info!(hosts = scan.hosts.len(), "Parsed Nmap archive");
    Ok(scan)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Nmap scan report for gw.example.in (203.0.113.10)
Not shown: 998 filtered tcp ports (no-response)
PORT    STATE SERVICE
443/tcp open  https
80/tcp  open  http
443/tcp open  https

Nmap scan report for 203.0.113.2
Not shown: 1000 filtered tcp ports (no-response)
";

    #[test]
    fn text_output_is_grouped_per_host() {
        let mut scan = NmapScan::default();
        scan.add_text(SAMPLE);
        let hosts = scan.hosts();
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts[0].host, "203.0.113.2");
        assert!(hosts[0].filtered);
        assert_eq!(hosts[1].ports.len(), 2);
        assert_eq!(hosts[1].ports[0], ("443/tcp".to_string(), "https".to_string()));
    }

    #[test]
    fn odd_host_count_is_padded() {
        let mut scan = NmapScan::default();
        scan.add_text(SAMPLE);
        scan.add_text("Nmap scan report for 198.51.100.7\n22/tcp open ssh\n");
        let rows = scan.paired_rows();
        // header + 1 row, then header + 2 rows
        assert_eq!(rows.len(), 5);
        assert!(rows[0].is_header);
        assert_eq!(rows[1].cells[0], "198.51.100.7");
        assert_eq!(rows[1].cells[3], "203.0.113.2");
        assert_eq!(rows[1].cells[4], FILTERED);
        assert_eq!(rows[4].cells[3], PLACEHOLDER_HOST);
        assert_eq!(rows[4].cells[4], "");
    }
}
