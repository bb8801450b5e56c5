//! The persisted calibration table.
//!
//! The text format is one `scale_info:` header followed by one
//! `tensor_name scale_value` line per entry. Some writers append the first
//! entry directly after the header colon instead of a newline; the parser
//! accepts both shapes.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use tracing::info;

use crate::error::{QuantError, Result};

/// Header marking a calibration table file.
const HEADER: &str = "scale_info:";

/// Ordered per-tensor calibration scales.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationTable {
    scales: BTreeMap<String, f32>,
}

impl CalibrationTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the scale for a tensor.
    ///
    /// Scales must be positive and finite; symmetric quantization cannot
    /// divide by anything else.
    pub fn insert(&mut self, name: impl Into<String>, scale: f32) -> Result<()> {
        let name = name.into();
        if !scale.is_finite() || scale <= 0.0 {
            return Err(QuantError::InvalidScale { name, value: scale }.into());
        }
        self.scales.insert(name, scale);
        Ok(())
    }

    /// Look up the scale for a tensor.
    pub fn scale(&self, name: &str) -> Option<f32> {
        self.scales.get(name).copied()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.scales.len()
    }

    /// Whether the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.scales.is_empty()
    }

    /// Entries in tensor-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> + '_ {
        self.scales.iter().map(|(name, &scale)| (name.as_str(), scale))
    }

    /// Render the table in its text format.
    pub fn to_text(&self) -> String {
        let mut text = String::from(HEADER);
        text.push('\n');
        for (name, scale) in &self.scales {
            text.push_str(&format!("{name} {scale}\n"));
        }
        text
    }

    /// Parse a table from its text format.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines().enumerate();
        let (header_number, header) = loop {
            match lines.next() {
                Some((index, line)) if !line.trim().is_empty() => break (index + 1, line.trim()),
                Some(_) => continue,
                None => return Err(QuantError::MissingHeader.into()),
            }
        };
        let run_on = header
            .strip_prefix(HEADER)
            .ok_or(QuantError::MissingHeader)?;

        let mut table = Self::new();
        if !run_on.trim().is_empty() {
            table.parse_entry(run_on.trim(), header_number)?;
        }
        for (index, line) in lines {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            table.parse_entry(line, index + 1)?;
        }
        Ok(table)
    }

    fn parse_entry(&mut self, line: &str, number: usize) -> Result<()> {
        let malformed = || QuantError::MalformedLine {
            line: number,
            content: line.to_string(),
        };
        let mut parts = line.split_whitespace();
        let (Some(name), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(malformed().into());
        };
        let scale: f32 = value.parse().map_err(|_| malformed())?;
        self.insert(name, scale)
    }

    /// Write the table to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_text())
            .with_context(|| format!("failed to write calibration table to {}", path.display()))?;
        info!(path = %path.display(), entries = self.len(), "saved calibration table");
        Ok(())
    }

    /// Read a table from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read calibration table from {}", path.display()))?;
        Self::parse(&text)
            .with_context(|| format!("invalid calibration table in {}", path.display()))
    }
}
