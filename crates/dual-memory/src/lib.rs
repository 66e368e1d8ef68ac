// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # dual-memory
//!
//! Paired host/accelerator allocations ("dual objects") with label tracking,
//! explicit synchronisation and fail-fast misuse detection.
//!
//! # Key Components
//!
//! - [`DualMemoryManager`]: entry point that allocates, frees, synchronises and
//!   reports dual objects.
//! - [`DualArray`] / [`DualScalar`]: move-only values owning one host
//!   buffer and at most one device mirror.
//! - [`AllocationTracker`]: label → (size, residency) registry backing the
//!   host and device usage totals.
//! - [`Accelerator`]: the device adapter boundary, with
//!   [`SimulatedAccelerator`] as the in-tree implementation.
//! - [`abort`]: the single fail-fast error path.
//!
//! # Lifecycle
//!
//! ```text
//! allocate ──► register label ──► copy_host_to_device ──► kernel
//!                                                          │
//!   free ◄── unregister label ◄── copy_device_to_host ◄────┘
//! ```
//!
//! # Example
//! ```
//! use dual_memory::{DualMemoryManager, KernelPtr, SimulatedAccelerator};
//!
//! let device = SimulatedAccelerator::new();
//! let mut manager = DualMemoryManager::with_accelerator(Box::new(device.clone()));
//!
//! let mut arr = manager.allocate::<i32>("arr", 5, true);
//! arr.host_mut().copy_from_slice(&[1, 2, 3, 4, 5]);
//! manager.copy_host_to_device(&arr, 0, 5);
//!
//! // An accelerator kernel scales the device copy.
//! if let KernelPtr::Device(Some(ptr)) = manager.kernel_ptr(&mut arr) {
//!     device.with_elements_mut::<i32, _>(ptr, 5, |v| v.iter_mut().for_each(|x| *x *= 10));
//! }
//!
//! manager.copy_device_to_host(&mut arr, 0, 5);
//! assert_eq!(arr.host(), &[10, 20, 30, 40, 50]);
//!
//! manager.free(&mut arr);
//! assert_eq!(manager.return_total_memory_usage(), (0, 0));
//! ```

pub mod abort;
mod accelerator;
mod capacity;
mod config;
mod dual;
mod element;
mod error;
mod manager;
mod report;
mod tracker;

pub use accelerator::{Accelerator, DevicePtr, SimulatedAccelerator};
pub use capacity::DeviceCapacity;
pub use config::{AcceleratorMode, ManagerConfig};
pub use dual::{DualArray, DualScalar, KernelPtr, KernelValue};
pub use element::{as_bytes, as_bytes_mut, Element};
pub use error::{ConfigError, DualMemError, MemorySide};
pub use manager::DualMemoryManager;
pub use report::{MemoryReport, ReportRow};
pub use tracker::{AllocationTracker, TrackerEntry};
