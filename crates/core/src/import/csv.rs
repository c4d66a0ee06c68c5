//! Minimal RFC 4180 reader.
//!
//! Handles quoted fields, doubled quotes, quoted line breaks, CRLF and a
//! leading UTF-8 BOM. Each record remembers the physical line it starts on
//! so row outcomes can point back into the file. Blank lines are skipped.

/// One data record and the line it starts on (the header is line 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRecord {
    pub line: usize,
    pub values: Vec<String>,
}

/// A parsed file: normalised (trimmed, lowercased) headers plus records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub records: Vec<CsvRecord>,
}

/// Parse raw CSV bytes into a header row and data records.
pub fn parse_csv(data: &[u8]) -> Result<CsvTable, String> {
    let text = std::str::from_utf8(data).map_err(|e| format!("Invalid UTF-8: {e}"))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut records = split_records(text)?;
    if records.is_empty() {
        return Err("CSV is empty".into());
    }

    let header = records.remove(0);
    let headers: Vec<String> = header
        .values
        .iter()
        .map(|h| h.trim().to_ascii_lowercase())
        .collect();

    Ok(CsvTable { headers, records })
}

fn split_records(text: &str) -> Result<Vec<CsvRecord>, String> {
    let mut records = Vec::new();
    let mut values: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut quote_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    // Escaped quote.
                    current.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    current.push(ch);
                }
                _ => current.push(ch),
            }
            continue;
        }

        match ch {
            '"' => {
                in_quotes = true;
                quote_line = line;
            }
            ',' => values.push(std::mem::take(&mut current)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                values.push(std::mem::take(&mut current));
                push_record(&mut records, record_line, std::mem::take(&mut values));
                line += 1;
                record_line = line;
            }
            _ => current.push(ch),
        }
    }

    if in_quotes {
        return Err(format!(
            "Unterminated quoted field starting on line {quote_line}"
        ));
    }

    if !current.is_empty() || !values.is_empty() {
        values.push(current);
        push_record(&mut records, record_line, values);
    }

    Ok(records)
}

fn push_record(records: &mut Vec<CsvRecord>, line: usize, values: Vec<String>) {
    if values.iter().all(|v| v.trim().is_empty()) {
        return;
    }
    records.push(CsvRecord { line, values });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_records_with_line_numbers() {
        let table = parse_csv(b"Name, Slug \nCentral Park,central-park\nHyde Park,hyde-park\n").unwrap();
        assert_eq!(table.headers, vec!["name", "slug"]);
        assert_eq!(table.records.len(), 2);
        assert_eq!(table.records[0].line, 2);
        assert_eq!(table.records[1].line, 3);
        assert_eq!(table.records[1].values, vec!["Hyde Park", "hyde-park"]);
    }

    #[test]
    fn quoted_fields_keep_commas_quotes_and_newlines() {
        let data = "name,description\n\"Louvre, Paris\",\"The \"\"big\"\" one\nwith glass\"\nNext,x\n";
        let table = parse_csv(data.as_bytes()).unwrap();
        assert_eq!(table.records[0].values[0], "Louvre, Paris");
        assert_eq!(table.records[0].values[1], "The \"big\" one\nwith glass");
        assert_eq!(table.records[0].line, 2);
        // The quoted newline pushes the next record onto line 4.
        assert_eq!(table.records[1].line, 4);
    }

    #[test]
    fn crlf_bom_and_blank_lines() {
        let data = "\u{feff}name,slug\r\n\r\nA,a\r\n,\r\nB,b";
        let table = parse_csv(data.as_bytes()).unwrap();
        assert_eq!(table.headers, vec!["name", "slug"]);
        let lines: Vec<usize> = table.records.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![3, 5]);
        assert_eq!(table.records[1].values, vec!["B", "b"]);
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        let err = parse_csv(b"name\n\"open").unwrap_err();
        assert!(err.contains("line 2"));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(parse_csv(b"").is_err());
        assert!(parse_csv(b"\n\n").is_err());
    }

    #[test]
    fn invalid_utf8_is_an_error() {
        assert!(parse_csv(&[0xff, 0xfe, b'a']).unwrap_err().contains("UTF-8"));
    }

    #[test]
    fn headers_are_trimmed_and_lowercased() {
        let table = parse_csv(b"  LATITUDE ,name\n1,x\n").unwrap();
        assert_eq!(table.headers, vec!["latitude".to_string(), "name".to_string()]);
    }
}
