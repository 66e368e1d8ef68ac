// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The dual memory manager.
//!
//! [`DualMemoryManager`] composes an optional [`Accelerator`] with an
//! [`AllocationTracker`] to allocate, synchronise and release dual objects.
//!
//! Every operation comes in two forms:
//!
//! - `try_<op>` returns `Result<_, DualMemError>`. On `Err` the operation
//!   has already undone its own intermediate allocations, so nothing is left
//!   untracked or leaked.
//! - `<op>` runs `try_<op>` and sends any error through
//!   [`abort::fail_fast`](crate::abort::fail_fast), terminating the process.
//!
//! # Capability Flag
//! Whether an accelerator is attached is fixed at construction and checked
//! the same way by every operation. Without one, device requests are
//! configuration errors, device pointers are always `None`, and transfers
//! are no-ops.
//!
//! # Concurrency
//! A manager is single-threaded state with no internal locking; all methods
//! that mutate take `&mut self`. Independent managers share nothing.

use crate::element::{as_bytes, as_bytes_mut};
use crate::{
    abort, Accelerator, AcceleratorMode, AllocationTracker, ConfigError, DevicePtr, DualArray,
    DualMemError, DualScalar, Element, KernelPtr, KernelValue, ManagerConfig, MemoryReport,
    MemorySide, SimulatedAccelerator,
};
use std::fmt;
use std::io::Write;
use std::mem;

/// Allocates, tracks and synchronises dual objects.
///
/// # Example
/// ```
/// use dual_memory::{DualMemoryManager, SimulatedAccelerator};
///
/// let mut manager = DualMemoryManager::with_accelerator(Box::new(SimulatedAccelerator::new()));
///
/// let mut a = manager.allocate::<i32>("a", 10, true);
/// assert_eq!(manager.return_total_memory_usage(), (40, 40));
///
/// a.host_mut().copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
/// manager.copy_host_to_device(&a, 0, 10);
///
/// manager.free(&mut a);
/// assert_eq!(manager.return_total_memory_usage(), (0, 0));
/// ```
pub struct DualMemoryManager {
    tracker: AllocationTracker,
    accelerator: Option<Box<dyn Accelerator>>,
    component: String,
}

impl DualMemoryManager {
    /// Creates a host-only manager.
    pub fn new() -> Self {
        tracing::info!("dual memory manager created without accelerator");
        Self {
            tracker: AllocationTracker::new(),
            accelerator: None,
            component: abort::DEFAULT_COMPONENT.to_string(),
        }
    }

    /// Creates a manager that mirrors device allocations on `accelerator`.
    pub fn with_accelerator(accelerator: Box<dyn Accelerator>) -> Self {
        tracing::info!(
            "dual memory manager created with accelerator '{}'",
            accelerator.name()
        );
        Self {
            tracker: AllocationTracker::new(),
            accelerator: Some(accelerator),
            component: abort::DEFAULT_COMPONENT.to_string(),
        }
    }

    /// Builds a manager as described by `config`.
    pub fn from_config(config: &ManagerConfig) -> Result<Self, ConfigError> {
        let capacity = config.parse_capacity()?;
        let manager = match config.accelerator {
            AcceleratorMode::Disabled => {
                if capacity.is_some() {
                    tracing::warn!("device_capacity ignored: accelerator is disabled");
                }
                Self::new()
            }
            AcceleratorMode::Simulated => {
                let device = match capacity {
                    Some(capacity) => {
                        tracing::info!("simulated device capacity: {capacity}");
                        SimulatedAccelerator::with_capacity(capacity)
                    }
                    None => SimulatedAccelerator::new(),
                };
                Self::with_accelerator(Box::new(device))
            }
        };
        Ok(manager.with_component_name(&config.component_name))
    }

    /// Sets the component name used on abort lines and report titles.
    pub fn with_component_name(mut self, name: &str) -> Self {
        self.component = name.to_string();
        self
    }

    /// Name printed on abort lines and report titles.
    pub fn component_name(&self) -> &str {
        &self.component
    }

    /// Returns `true` if an accelerator is attached.
    pub fn is_accelerated(&self) -> bool {
        self.accelerator.is_some()
    }

    /// Name of the attached accelerator, if any.
    pub fn accelerator_name(&self) -> Option<&str> {
        self.accelerator.as_deref().map(|acc| acc.name())
    }

    /// Read-only view of the allocation registry.
    pub fn tracker(&self) -> &AllocationTracker {
        &self.tracker
    }

    fn or_abort<T>(&self, result: Result<T, DualMemError>) -> T {
        abort::or_abort(&self.component, result)
    }

    // ── Arrays ─────────────────────────────────────────────────

    /// Allocates `count` elements on the host and, if `on_device`, on the
    /// accelerator, tracked under `label`.
    pub fn try_allocate<T: Element>(
        &mut self,
        label: &str,
        count: usize,
        on_device: bool,
    ) -> Result<DualArray<T>, DualMemError> {
        if on_device && !self.is_accelerated() {
            return Err(DualMemError::Configuration {
                label: label.to_string(),
            });
        }

        let size_bytes = count
            .checked_mul(mem::size_of::<T>())
            .ok_or_else(|| DualMemError::AllocationFailure {
                label: label.to_string(),
                side: MemorySide::Host,
            })?;

        let host = allocate_host::<T>(label, count)?;

        let dev_ptr = if on_device {
            match self.device_alloc(size_bytes) {
                Some(ptr) => Some(ptr),
                None => {
                    tracing::warn!(label, size_bytes, "device allocation failed, releasing host buffer");
                    drop(host);
                    return Err(DualMemError::AllocationFailure {
                        label: label.to_string(),
                        side: MemorySide::Device,
                    });
                }
            }
        } else {
            None
        };

        if self.tracker.register(label, size_bytes, on_device) {
            tracing::warn!(label, "duplicate label, releasing buffers allocated for it");
            drop(host);
            if let Some(ptr) = dev_ptr {
                self.device_free(ptr);
            }
            return Err(DualMemError::DuplicateLabel {
                label: label.to_string(),
            });
        }

        tracing::debug!(label, count, size_bytes, on_device, "allocated dual array");
        Ok(DualArray::new(label.to_string(), host, dev_ptr))
    }

    /// Aborting form of [`try_allocate`](Self::try_allocate).
    pub fn allocate<T: Element>(&mut self, label: &str, count: usize, on_device: bool) -> DualArray<T> {
        let result = self.try_allocate(label, count, on_device);
        self.or_abort(result)
    }

    /// Releases both buffers of `array` and stops tracking its label.
    ///
    /// The tracker is checked before anything is released, so on
    /// `UntrackedRelease` the array is left intact.
    pub fn try_free<T: Element>(&mut self, array: &mut DualArray<T>) -> Result<(), DualMemError> {
        if !array.is_live() {
            return Err(DualMemError::DanglingPointer {
                label: array.label().to_string(),
                side: MemorySide::Host,
            });
        }

        if self.tracker.unregister(array.label()) {
            return Err(DualMemError::UntrackedRelease {
                label: array.label().to_string(),
            });
        }

        if let Some(ptr) = array.release() {
            self.device_free(ptr);
        }

        tracing::debug!(label = array.label(), size_bytes = array.size_bytes(), "freed dual array");
        Ok(())
    }

    /// Aborting form of [`try_free`](Self::try_free).
    pub fn free<T: Element>(&mut self, array: &mut DualArray<T>) {
        let result = self.try_free(array);
        self.or_abort(result)
    }

    /// Copies `count` elements starting at element `offset` from the host
    /// buffer to the device mirror. A no-op without an accelerator.
    pub fn try_copy_host_to_device<T: Element>(
        &mut self,
        array: &DualArray<T>,
        offset: usize,
        count: usize,
    ) -> Result<(), DualMemError> {
        if !self.is_accelerated() {
            return Ok(());
        }

        let (dev_ptr, range) = transfer_window(array, offset, count)?;
        let src = array
            .host_buffer()
            .map(|host| &as_bytes(host)[range.clone()])
            .ok_or_else(|| dangling(array.label(), MemorySide::Host))?;

        if let Some(acc) = self.accelerator.as_deref_mut() {
            acc.copy_to_device(dev_ptr.byte_add(range.start), src);
        }

        tracing::debug!(label = array.label(), offset, count, bytes = range.len(), "host → device");
        Ok(())
    }

    /// Aborting form of [`try_copy_host_to_device`](Self::try_copy_host_to_device).
    pub fn copy_host_to_device<T: Element>(&mut self, array: &DualArray<T>, offset: usize, count: usize) {
        let result = self.try_copy_host_to_device(array, offset, count);
        self.or_abort(result)
    }

    /// Copies `count` elements starting at element `offset` from the device
    /// mirror back into the host buffer. A no-op without an accelerator.
    pub fn try_copy_device_to_host<T: Element>(
        &mut self,
        array: &mut DualArray<T>,
        offset: usize,
        count: usize,
    ) -> Result<(), DualMemError> {
        if !self.is_accelerated() {
            return Ok(());
        }

        let (dev_ptr, range) = transfer_window(array, offset, count)?;
        let bytes = range.len();
        let label = array.label().to_string();
        let dst = array
            .host_buffer_mut()
            .map(|host| &mut as_bytes_mut(host)[range.clone()])
            .ok_or_else(|| dangling(&label, MemorySide::Host))?;

        if let Some(acc) = self.accelerator.as_deref_mut() {
            acc.copy_from_device(dst, dev_ptr.byte_add(range.start));
        }

        tracing::debug!(label = label.as_str(), offset, count, bytes, "device → host");
        Ok(())
    }

    /// Aborting form of [`try_copy_device_to_host`](Self::try_copy_device_to_host).
    pub fn copy_device_to_host<T: Element>(&mut self, array: &mut DualArray<T>, offset: usize, count: usize) {
        let result = self.try_copy_device_to_host(array, offset, count);
        self.or_abort(result)
    }

    /// Returns the pointer kernel code should use for `array`: the device
    /// mirror when an accelerator is attached, else the host buffer.
    pub fn kernel_ptr<T: Element>(&self, array: &mut DualArray<T>) -> KernelPtr<T> {
        array.select_ptr(self.is_accelerated())
    }

    // ── Scalars ────────────────────────────────────────────────

    /// Creates a scalar holding `value`, mirrored on the device if
    /// `on_device`. Failure handling matches [`try_allocate`](Self::try_allocate).
    pub fn try_create_scalar<T: Element>(
        &mut self,
        label: &str,
        value: T,
        on_device: bool,
    ) -> Result<DualScalar<T>, DualMemError> {
        if on_device && !self.is_accelerated() {
            return Err(DualMemError::Configuration {
                label: label.to_string(),
            });
        }

        let size_bytes = mem::size_of::<T>();
        let dev_ptr = if on_device {
            let ptr = self
                .device_alloc(size_bytes)
                .ok_or_else(|| DualMemError::AllocationFailure {
                    label: label.to_string(),
                    side: MemorySide::Device,
                })?;
            if let Some(acc) = self.accelerator.as_deref_mut() {
                acc.copy_to_device(ptr, as_bytes(std::slice::from_ref(&value)));
            }
            Some(ptr)
        } else {
            None
        };

        if self.tracker.register(label, size_bytes, on_device) {
            tracing::warn!(label, "duplicate label, releasing scalar mirror");
            if let Some(ptr) = dev_ptr {
                self.device_free(ptr);
            }
            return Err(DualMemError::DuplicateLabel {
                label: label.to_string(),
            });
        }

        tracing::debug!(label, size_bytes, on_device, "created dual scalar");
        Ok(DualScalar::new(label.to_string(), value, dev_ptr))
    }

    /// Aborting form of [`try_create_scalar`](Self::try_create_scalar).
    pub fn create_scalar<T: Element>(&mut self, label: &str, value: T, on_device: bool) -> DualScalar<T> {
        let result = self.try_create_scalar(label, value, on_device);
        self.or_abort(result)
    }

    /// Writes `value` to the device mirror if `on_device`, else to the host
    /// copy. The other copy is left as it was. Never touches the tracker.
    pub fn try_set_scalar_value<T: Element>(
        &mut self,
        scalar: &mut DualScalar<T>,
        value: T,
        on_device: bool,
    ) -> Result<(), DualMemError> {
        if !on_device {
            scalar.set_host_value(value);
            return Ok(());
        }

        let ptr = scalar
            .dev_ptr()
            .ok_or_else(|| dangling(scalar.label(), MemorySide::Device))?;
        if let Some(acc) = self.accelerator.as_deref_mut() {
            acc.copy_to_device(ptr, as_bytes(std::slice::from_ref(&value)));
        }
        Ok(())
    }

    /// Aborting form of [`try_set_scalar_value`](Self::try_set_scalar_value).
    pub fn set_scalar_value<T: Element>(&mut self, scalar: &mut DualScalar<T>, value: T, on_device: bool) {
        let result = self.try_set_scalar_value(scalar, value, on_device);
        self.or_abort(result)
    }

    /// Pushes the host value to the device mirror. A no-op without an
    /// accelerator.
    pub fn try_update_scalar_host_to_device<T: Element>(
        &mut self,
        scalar: &DualScalar<T>,
    ) -> Result<(), DualMemError> {
        let Some(acc) = self.accelerator.as_deref_mut() else {
            return Ok(());
        };
        let ptr = scalar
            .dev_ptr()
            .ok_or_else(|| dangling(scalar.label(), MemorySide::Device))?;

        let value = scalar.host_value();
        acc.copy_to_device(ptr, as_bytes(std::slice::from_ref(&value)));
        Ok(())
    }

    /// Aborting form of [`try_update_scalar_host_to_device`](Self::try_update_scalar_host_to_device).
    pub fn update_scalar_host_to_device<T: Element>(&mut self, scalar: &DualScalar<T>) {
        let result = self.try_update_scalar_host_to_device(scalar);
        self.or_abort(result)
    }

    /// Pulls the device mirror into the host value. A no-op without an
    /// accelerator.
    pub fn try_update_scalar_device_to_host<T: Element>(
        &mut self,
        scalar: &mut DualScalar<T>,
    ) -> Result<(), DualMemError> {
        let Some(acc) = self.accelerator.as_deref_mut() else {
            return Ok(());
        };
        let ptr = scalar
            .dev_ptr()
            .ok_or_else(|| dangling(scalar.label(), MemorySide::Device))?;

        acc.copy_from_device(
            as_bytes_mut(std::slice::from_mut(scalar.host_value_mut())),
            ptr,
        );
        Ok(())
    }

    /// Aborting form of [`try_update_scalar_device_to_host`](Self::try_update_scalar_device_to_host).
    pub fn update_scalar_device_to_host<T: Element>(&mut self, scalar: &mut DualScalar<T>) {
        let result = self.try_update_scalar_device_to_host(scalar);
        self.or_abort(result)
    }

    /// Stops tracking `scalar` and releases its device mirror.
    pub fn try_destroy_scalar<T: Element>(&mut self, scalar: &mut DualScalar<T>) -> Result<(), DualMemError> {
        if !scalar.is_live() {
            return Err(dangling(scalar.label(), MemorySide::Host));
        }

        if self.tracker.unregister(scalar.label()) {
            return Err(DualMemError::UntrackedRelease {
                label: scalar.label().to_string(),
            });
        }

        if let Some(ptr) = scalar.release() {
            self.device_free(ptr);
        }

        tracing::debug!(label = scalar.label(), "destroyed dual scalar");
        Ok(())
    }

    /// Aborting form of [`try_destroy_scalar`](Self::try_destroy_scalar).
    pub fn destroy_scalar<T: Element>(&mut self, scalar: &mut DualScalar<T>) {
        let result = self.try_destroy_scalar(scalar);
        self.or_abort(result)
    }

    /// Returns the value kernel code should use for `scalar`: the device
    /// mirror when an accelerator is attached, else the host value.
    pub fn kernel_value<'a, T: Element>(&self, scalar: &'a mut DualScalar<T>) -> KernelValue<'a, T> {
        scalar.select_value(self.is_accelerated())
    }

    // ── Reporting ──────────────────────────────────────────────

    /// Returns `(host_total, device_total)` in bytes.
    pub fn return_total_memory_usage(&self) -> (usize, usize) {
        self.tracker.snapshot()
    }

    /// Captures the current tracker contents.
    pub fn report(&self) -> MemoryReport {
        MemoryReport::from_tracker(&self.tracker, &self.component)
    }

    /// Prints the usage table to standard output.
    pub fn report_memory_usage(&self) {
        let report = self.report();
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = write!(stdout, "{report}").and_then(|()| stdout.flush()) {
            tracing::warn!("failed to write memory report: {e}");
        }
    }

    // ── Adapter plumbing ───────────────────────────────────────

    fn device_alloc(&mut self, bytes: usize) -> Option<DevicePtr> {
        self.accelerator.as_deref_mut()?.device_alloc(bytes)
    }

    fn device_free(&mut self, ptr: DevicePtr) {
        match self.accelerator.as_deref_mut() {
            Some(acc) => acc.device_free(ptr),
            None => tracing::warn!(%ptr, "device pointer without accelerator dropped"),
        }
    }
}

impl Default for DualMemoryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DualMemoryManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (host, device) = self.tracker.snapshot();
        f.debug_struct("DualMemoryManager")
            .field("component", &self.component)
            .field("accelerator", &self.accelerator_name())
            .field("tracked", &self.tracker.len())
            .field("host_total", &host)
            .field("device_total", &device)
            .finish()
    }
}

fn dangling(label: &str, side: MemorySide) -> DualMemError {
    DualMemError::DanglingPointer {
        label: label.to_string(),
        side,
    }
}

/// Reserves and zero-fills a host buffer, reporting allocator failure
/// instead of aborting inside the global allocator.
fn allocate_host<T: Element>(label: &str, count: usize) -> Result<Vec<T>, DualMemError> {
    let mut host = Vec::new();
    host.try_reserve_exact(count)
        .map_err(|_| DualMemError::AllocationFailure {
            label: label.to_string(),
            side: MemorySide::Host,
        })?;
    host.resize(count, T::default());
    Ok(host)
}

/// Validates a transfer of `count` elements at `offset` and returns the
/// device pointer plus the matching byte range.
fn transfer_window<T: Element>(
    array: &DualArray<T>,
    offset: usize,
    count: usize,
) -> Result<(DevicePtr, std::ops::Range<usize>), DualMemError> {
    if !array.is_live() {
        return Err(dangling(array.label(), MemorySide::Host));
    }
    let dev_ptr = array
        .dev_ptr()
        .ok_or_else(|| dangling(array.label(), MemorySide::Device))?;

    let end = offset.checked_add(count).filter(|&end| end <= array.len());
    let Some(end) = end else {
        return Err(DualMemError::OutOfBounds {
            label: array.label().to_string(),
            offset,
            count,
            len: array.len(),
        });
    };

    let elem = mem::size_of::<T>();
    Ok((dev_ptr, offset * elem..end * elem))
}
