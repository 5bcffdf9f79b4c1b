#![allow(dead_code)]

use std::io::{Cursor, Write};

use rust_xlsxwriter::{Image, Workbook};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// A 2x2 red PNG.
pub const PNG: [u8; 73] = [
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52, 0x00, 0x00,
    0x00, 0x02, 0x00, 0x00, 0x00, 0x02, 0x08, 0x02, 0x00, 0x00, 0x00, 0xfd, 0xd4, 0x9a, 0x73, 0x00, 0x00, 0x00,
    0x10, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0xf8, 0xcf, 0xc0, 0x00, 0x44, 0x0c, 0x10, 0x0a, 0x00, 0x1f,
    0xee, 0x03, 0xfd, 0x8b, 0x5f, 0x14, 0xd4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60,
    0x82,
];

pub fn zip_of(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Workbook with one sheet per `(name, rows)`; every cell is a string.
pub fn xlsx_of(sheets: &[(&str, Vec<Vec<&str>>)]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    for (name, rows) in sheets {
        let sheet = workbook.add_worksheet();
        sheet.set_name(*name).unwrap();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                if !value.is_empty() {
                    sheet.write_string(r as u32, c as u16, *value).unwrap();
                }
            }
        }
    }
    workbook.save_to_buffer().unwrap()
}

/// Single-sheet workbook of string cells with the test PNG anchored at each
/// `(row, col)` of `images`.
pub fn xlsx_with_images(name: &str, rows: Vec<Vec<&str>>, images: &[(u32, u16)]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(name).unwrap();
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            if !value.is_empty() {
                sheet.write_string(r as u32, c as u16, *value).unwrap();
            }
        }
    }
    for (row, col) in images {
        let image = Image::new_from_buffer(&PNG).unwrap();
        sheet.insert_image(*row, *col, &image).unwrap();
    }
    workbook.save_to_buffer().unwrap()
}

pub const CATALOG_HEADERS: [&str; 12] = [
    "Sr No",
    "Name of Vulnerability",
    "Risk Factor",
    "CVE ID",
    "CVSS",
    "Audit Observation",
    "Impact",
    "Recommendation/Countermeasure",
    "Affected System",
    "Reference Link",
    "Vulnerabilities in this group",
    "Time_stamp",
];

/// Catalog with a TLS group and an SSH group.
pub fn catalog_xlsx() -> Vec<u8> {
    xlsx_of(&[(
        "Catalog",
        vec![
            CATALOG_HEADERS.to_vec(),
            vec![
                "1",
                "SSL/TLS Weaknesses",
                "Medium",
                "CWE-295",
                "6.5",
                "Weak TLS configuration observed.",
                "Traffic may be intercepted.",
                "Use trusted certificates.",
                "",
                "https://example.test/tls",
                "SSL Certificate Cannot Be Trusted\nSSL Self-Signed Certificate",
                "",
            ],
            vec![
                "2",
                "SSH Weak Algorithms",
                "Low",
                "",
                "2.6",
                "Weak SSH algorithms enabled.",
                "Sessions may be downgraded.",
                "Disable weak algorithms.",
                "",
                "",
                "SSH Weak Algorithms Supported",
                "",
            ],
        ],
    )])
}

pub const NESSUS_CSV: &[u8] = b"Plugin ID,CVE,Risk,Host,Protocol,Port,Name\n\
51192,,Medium,203.0.113.10,tcp,443,SSL Certificate Cannot Be Trusted\n\
57582,,Medium,203.0.113.11,tcp,443,SSL Self-Signed Certificate\n\
90317,,Low,203.0.113.10,tcp,22,SSH Weak Algorithms Supported\n\
10863,,None,203.0.113.10,tcp,443,SSL Certificate Information\n\
99999,,High,203.0.113.11,tcp,8080,Apache Tomcat Default Files\n";

pub const NMAP_TEXT: &[u8] = b"Nmap scan report for 203.0.113.10\n\
PORT    STATE SERVICE\n\
22/tcp  open  ssh\n\
443/tcp open  https\n\
\n\
Nmap scan report for 203.0.113.11\n\
PORT     STATE SERVICE\n\
443/tcp  open  https\n\
8080/tcp open  http-proxy\n";

pub fn nessus_zip() -> Vec<u8> {
    zip_of(&[("scan/public_ip.csv", NESSUS_CSV)])
}

pub fn nmap_zip() -> Vec<u8> {
    zip_of(&[("scan/public_ip.nmap", NMAP_TEXT)])
}

/// Previous follow-up sheet with one still-open and one fixed finding.
pub fn old_report_xlsx() -> Vec<u8> {
    xlsx_of(&[(
        "Public_IP_VAPT",
        vec![
            vec!["Sr No", "Name of Vulnerability", "Risk Factor", "Affected Systems", "Status"],
            vec!["1", "SSL/TLS Weaknesses", "Medium", "203.0.113.10", "Open"],
            vec!["2", "Outdated PHP Version", "High", "203.0.113.12", "Open"],
        ],
    )])
}

/// Previous follow-up sheet with a screenshot in the POC block of each row.
pub fn old_report_with_images_xlsx() -> Vec<u8> {
    xlsx_with_images(
        "Public_IP_VAPT",
        vec![
            vec!["Sr No", "Name of Vulnerability", "Risk Factor", "Affected Systems", "Status", "POC"],
            vec!["1", "SSL/TLS Weaknesses", "Medium", "203.0.113.10", "Open"],
            vec!["2", "Outdated PHP Version", "High", "203.0.113.12", "Open"],
        ],
        &[(1, 6), (2, 5)],
    )
}

fn paragraph(text: &str) -> String {
    format!(r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#, text)
}

/// Minimal Word package whose body holds one paragraph per entry.
pub fn docx_template(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs.iter().map(|p| paragraph(p)).collect();
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body>{}<w:sectPr/></w:body></w:document>"#,
        body
    );
    let content_types = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;
    let root_rels = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;
    let document_rels = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"></Relationships>"#;
    zip_of(&[
        ("[Content_Types].xml", content_types.as_bytes()),
        ("_rels/.rels", root_rels.as_bytes()),
        ("word/document.xml", document.as_bytes()),
        ("word/_rels/document.xml.rels", document_rels.as_bytes()),
    ])
}
