// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Memory usage reports.
//!
//! A [`MemoryReport`] is a point-in-time copy of the tracker: one row per
//! live label, in label order, followed by the aggregate totals. Its
//! `Display` impl renders the fixed-width table printed by
//! [`DualMemoryManager::report_memory_usage`](crate::DualMemoryManager::report_memory_usage).

use crate::AllocationTracker;
use std::fmt;

const LABEL_HEADER: &str = "Array Label";
const SIZE_HEADER: &str = "Size (bytes)";
const ON_DEVICE_HEADER: &str = "On Device";

/// One tracked allocation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ReportRow {
    pub label: String,
    pub size_bytes: usize,
    pub on_device: bool,
}

/// Snapshot of everything a manager is tracking.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MemoryReport {
    /// Component name shown in the title line.
    pub component: String,
    pub rows: Vec<ReportRow>,
    pub host_total: usize,
    pub device_total: usize,
    pub peak_host: usize,
    pub peak_device: usize,
}

impl MemoryReport {
    /// Captures the current contents of `tracker`.
    pub fn from_tracker(tracker: &AllocationTracker, component: &str) -> Self {
        let rows = tracker
            .enumerate()
            .map(|(label, entry)| ReportRow {
                label: label.to_string(),
                size_bytes: entry.size_bytes,
                on_device: entry.on_device,
            })
            .collect();
        let (host_total, device_total) = tracker.snapshot();
        let (peak_host, peak_device) = tracker.peak();

        Self {
            component: component.to_string(),
            rows,
            host_total,
            device_total,
            peak_host,
            peak_device,
        }
    }

    /// Iterates over the reported labels in order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|row| row.label.as_str())
    }
}

impl fmt::Display for MemoryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label_w = self
            .rows
            .iter()
            .map(|row| row.label.chars().count())
            .fold(LABEL_HEADER.len(), usize::max)
            + 4;
        let size_w = (SIZE_HEADER.len() + 4).max(10);
        let device_w = ON_DEVICE_HEADER.len().max(10);

        let total_w = label_w + size_w + device_w;
        let big = "=".repeat(total_w);
        let small = "-".repeat(total_w);

        writeln!(f)?;
        writeln!(f, "{big}")?;
        writeln!(f, "{} Report:", self.component)?;
        writeln!(f, "{big}")?;
        writeln!(
            f,
            "{LABEL_HEADER:<label_w$}{SIZE_HEADER:<size_w$}{ON_DEVICE_HEADER:<device_w$}"
        )?;
        writeln!(f, "{small}")?;

        for row in &self.rows {
            let on_device = if row.on_device { "yes" } else { "no" };
            writeln!(
                f,
                "{:<label_w$}{:<size_w$}{on_device:<device_w$}",
                row.label, row.size_bytes
            )?;
        }
        writeln!(f, "{big}")?;

        writeln!(f, "Total host memory used: {} bytes", self.host_total)?;
        writeln!(f, "Total device memory used: {} bytes", self.device_total)?;
        writeln!(f, "Peak host memory used: {} bytes", self.peak_host)?;
        writeln!(f, "Peak device memory used: {} bytes", self.peak_device)?;
        writeln!(f, "{big}")?;
        writeln!(f)
    }
}
