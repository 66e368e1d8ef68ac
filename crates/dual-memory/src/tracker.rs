// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Label-indexed registry of live allocations.
//!
//! The [`AllocationTracker`] records, for every live dual object, its byte
//! size and whether it has a device mirror. It owns the two aggregate
//! counters and keeps them equal to the sums over its entries:
//!
//! ```text
//! host_total   = Σ size_bytes                 (all entries)
//! device_total = Σ size_bytes | on_device     (device-resident entries)
//! ```
//!
//! Mutation happens only through [`register`](AllocationTracker::register)
//! and [`unregister`](AllocationTracker::unregister). Both report misuse as
//! a boolean and leave the tracker untouched on that path; the manager
//! decides what to do about it.

use std::collections::BTreeMap;

/// Size and residency of one tracked allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct TrackerEntry {
    pub size_bytes: usize,
    pub on_device: bool,
}

/// Registry of live allocations, ordered by label.
#[derive(Debug, Clone, Default)]
pub struct AllocationTracker {
    entries: BTreeMap<String, TrackerEntry>,
    host_total: usize,
    device_total: usize,
    peak_host: usize,
    peak_device: usize,
}

impl AllocationTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new allocation.
    ///
    /// Returns `true` if `label` was already registered, in which case
    /// nothing changes. Returns `false` once the entry is inserted and the
    /// totals updated.
    pub fn register(&mut self, label: &str, size_bytes: usize, on_device: bool) -> bool {
        if self.entries.contains_key(label) {
            return true;
        }

        self.entries.insert(
            label.to_string(),
            TrackerEntry {
                size_bytes,
                on_device,
            },
        );
        self.host_total += size_bytes;
        self.peak_host = self.peak_host.max(self.host_total);
        if on_device {
            self.device_total += size_bytes;
            self.peak_device = self.peak_device.max(self.device_total);
        }

        tracing::debug!(label, size_bytes, on_device, "registered allocation");
        false
    }

    /// Removes an allocation.
    ///
    /// Returns `true` if `label` was not registered, in which case nothing
    /// changes. Returns `false` once the entry is removed and the totals
    /// updated.
    pub fn unregister(&mut self, label: &str) -> bool {
        let Some(entry) = self.entries.remove(label) else {
            return true;
        };

        self.host_total -= entry.size_bytes;
        if entry.on_device {
            self.device_total -= entry.size_bytes;
        }

        tracing::debug!(
            label,
            size_bytes = entry.size_bytes,
            on_device = entry.on_device,
            "unregistered allocation"
        );
        false
    }

    /// Returns `(host_total, device_total)` in bytes.
    pub fn snapshot(&self) -> (usize, usize) {
        (self.host_total, self.device_total)
    }

    /// Returns the highest `(host_total, device_total)` seen so far.
    pub fn peak(&self) -> (usize, usize) {
        (self.peak_host, self.peak_device)
    }

    /// Iterates over live entries in label order.
    ///
    /// Each call starts a fresh pass.
    pub fn enumerate(&self) -> impl Iterator<Item = (&str, TrackerEntry)> + '_ {
        self.entries
            .iter()
            .map(|(label, entry)| (label.as_str(), *entry))
    }

    /// Returns the entry for `label`, if tracked.
    pub fn get(&self, label: &str) -> Option<TrackerEntry> {
        self.entries.get(label).copied()
    }

    /// Returns `true` if `label` is tracked.
    pub fn contains(&self, label: &str) -> bool {
        self.entries.contains_key(label)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
