// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The accelerator adapter boundary.
//!
//! [`Accelerator`] is the narrow surface the manager needs from a device
//! runtime: allocate, free, and blocking byte copies in each direction.
//! Device memory is addressed through opaque [`DevicePtr`]s that the host
//! never dereferences.
//!
//! [`SimulatedAccelerator`] backs "device" buffers with host RAM. It is the
//! in-tree adapter used by tests and examples, and it can enforce a
//! [`DeviceCapacity`] so allocation failure paths are reachable.
//!
//! # Thread Safety
//! A `SimulatedAccelerator` is a cheap handle: clones share one device.
//! This lets a caller keep a handle for running "kernels" after giving
//! another clone to a [`DualMemoryManager`](crate::DualMemoryManager).

use crate::element::{as_bytes, as_bytes_mut};
use crate::{DeviceCapacity, Element};
use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroU64;
use std::sync::{Arc, Mutex, MutexGuard};

/// An address in accelerator memory. Never null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DevicePtr(NonZeroU64);

impl DevicePtr {
    /// Wraps a raw device address, returning `None` for null.
    pub fn new(addr: u64) -> Option<Self> {
        NonZeroU64::new(addr).map(Self)
    }

    /// Raw device address.
    pub fn addr(self) -> u64 {
        self.0.get()
    }

    /// Returns the address `bytes` past this one.
    pub fn byte_add(self, bytes: usize) -> Self {
        Self(self.0.saturating_add(bytes as u64))
    }
}

impl fmt::Display for DevicePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0.get())
    }
}

/// Primitive operations on an attached compute device.
///
/// All copies are blocking: the call returns once the transfer is complete.
pub trait Accelerator: Send + fmt::Debug {
    /// Human-readable device name, used in logs.
    fn name(&self) -> &str;

    /// Allocates `bytes` of device memory. `None` means the device is out
    /// of memory.
    fn device_alloc(&mut self, bytes: usize) -> Option<DevicePtr>;

    /// Releases an allocation previously returned by `device_alloc`.
    fn device_free(&mut self, ptr: DevicePtr);

    /// Copies `src` into device memory starting at `dst`.
    fn copy_to_device(&mut self, dst: DevicePtr, src: &[u8]);

    /// Copies `dst.len()` bytes of device memory starting at `src` into `dst`.
    fn copy_from_device(&mut self, dst: &mut [u8], src: DevicePtr);
}

/// First address handed out by a simulated device.
const BASE_ADDRESS: u64 = 0x1000_0000;

/// Allocation granularity of a simulated device.
const ALIGNMENT: u64 = 256;

#[derive(Debug, Default)]
struct DeviceState {
    /// Base address → backing storage.
    buffers: BTreeMap<u64, Vec<u8>>,
    live_bytes: usize,
    next_addr: u64,
}

impl DeviceState {
    /// Finds the allocation containing `[addr, addr + len)`.
    ///
    /// # Panics
    /// Panics if the range is not inside a live allocation; on real
    /// hardware this would be an illegal memory access.
    fn resolve_mut(&mut self, addr: u64, len: usize) -> &mut [u8] {
        let (base, buffer) = self
            .buffers
            .range_mut(..=addr)
            .next_back()
            .unwrap_or_else(|| panic!("device address {addr:#x} is not allocated"));
        let start = (addr - *base) as usize;
        let end = start + len;
        assert!(
            end <= buffer.len(),
            "device access {addr:#x}+{len} overruns allocation at {base:#x} ({} bytes)",
            buffer.len()
        );
        &mut buffer[start..end]
    }
}

/// A host-RAM-backed stand-in for an accelerator.
///
/// # Example
/// ```
/// use dual_memory::{Accelerator, DeviceCapacity, SimulatedAccelerator};
///
/// let mut device = SimulatedAccelerator::with_capacity(DeviceCapacity::from_bytes(64));
/// let ptr = device.device_alloc(48).unwrap();
/// assert!(device.device_alloc(32).is_none()); // over capacity
///
/// device.copy_to_device(ptr, &[1, 2, 3]);
/// let mut back = [0u8; 3];
/// device.copy_from_device(&mut back, ptr);
/// assert_eq!(back, [1, 2, 3]);
///
/// device.device_free(ptr);
/// assert_eq!(device.live_bytes(), 0);
/// ```
#[derive(Clone)]
pub struct SimulatedAccelerator {
    state: Arc<Mutex<DeviceState>>,
    capacity: Option<DeviceCapacity>,
}

impl SimulatedAccelerator {
    /// Creates a simulated device with unlimited memory.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(DeviceState {
                next_addr: BASE_ADDRESS,
                ..DeviceState::default()
            })),
            capacity: None,
        }
    }

    /// Creates a simulated device that refuses allocations beyond `capacity`.
    pub fn with_capacity(capacity: DeviceCapacity) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::new()
        }
    }

    /// Memory ceiling, or `None` if unlimited.
    pub fn capacity(&self) -> Option<DeviceCapacity> {
        self.capacity
    }

    /// Bytes currently allocated on the device.
    pub fn live_bytes(&self) -> usize {
        self.lock().live_bytes
    }

    /// Number of live device allocations.
    pub fn live_allocations(&self) -> usize {
        self.lock().buffers.len()
    }

    /// Reads `count` elements of type `T` starting at `ptr`.
    pub fn read_elements<T: Element>(&self, ptr: DevicePtr, count: usize) -> Vec<T> {
        let mut out = vec![T::default(); count];
        let bytes = as_bytes_mut(&mut out);
        let len = bytes.len();
        bytes.copy_from_slice(self.lock().resolve_mut(ptr.addr(), len));
        out
    }

    /// Runs `kernel` over `count` elements of device memory at `ptr`,
    /// writing the result back. Stands in for an accelerator compute region.
    pub fn with_elements_mut<T: Element, R>(
        &self,
        ptr: DevicePtr,
        count: usize,
        kernel: impl FnOnce(&mut [T]) -> R,
    ) -> R {
        let mut values = self.read_elements::<T>(ptr, count);
        let result = kernel(&mut values);
        let bytes = as_bytes(&values);
        self.lock()
            .resolve_mut(ptr.addr(), bytes.len())
            .copy_from_slice(bytes);
        result
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        // A panic inside a kernel closure cannot leave the byte map torn.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SimulatedAccelerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accelerator for SimulatedAccelerator {
    fn name(&self) -> &str {
        "simulated"
    }

    fn device_alloc(&mut self, bytes: usize) -> Option<DevicePtr> {
        let mut state = self.lock();
        if let Some(capacity) = self.capacity {
            if state.live_bytes.checked_add(bytes)? > capacity.as_bytes() {
                tracing::debug!(
                    requested = bytes,
                    live = state.live_bytes,
                    capacity = capacity.as_bytes(),
                    "simulated device out of memory"
                );
                return None;
            }
        }

        let addr = state.next_addr;
        let span = (bytes as u64).max(1).div_ceil(ALIGNMENT) * ALIGNMENT;
        state.next_addr = addr.checked_add(span)?;
        state.buffers.insert(addr, vec![0u8; bytes]);
        state.live_bytes += bytes;
        DevicePtr::new(addr)
    }

    fn device_free(&mut self, ptr: DevicePtr) {
        let mut state = self.lock();
        match state.buffers.remove(&ptr.addr()) {
            Some(buffer) => state.live_bytes -= buffer.len(),
            None => tracing::warn!(%ptr, "free of unknown device address ignored"),
        }
    }

    fn copy_to_device(&mut self, dst: DevicePtr, src: &[u8]) {
        self.lock()
            .resolve_mut(dst.addr(), src.len())
            .copy_from_slice(src);
    }

    fn copy_from_device(&mut self, dst: &mut [u8], src: DevicePtr) {
        let len = dst.len();
        dst.copy_from_slice(self.lock().resolve_mut(src.addr(), len));
    }
}

impl fmt::Debug for SimulatedAccelerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedAccelerator")
            .field("capacity", &self.capacity)
            .field("live_bytes", &self.live_bytes())
            .field("live_allocations", &self.live_allocations())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_free() {
        let mut dev = SimulatedAccelerator::new();
        let a = dev.device_alloc(100).unwrap();
        let b = dev.device_alloc(40).unwrap();
        assert_ne!(a, b);
        assert_eq!(dev.live_bytes(), 140);
        assert_eq!(dev.live_allocations(), 2);

        dev.device_free(a);
        assert_eq!(dev.live_bytes(), 40);
        dev.device_free(b);
        assert_eq!(dev.live_allocations(), 0);
    }

    #[test]
    fn test_capacity_limit() {
        let mut dev = SimulatedAccelerator::with_capacity(DeviceCapacity::from_bytes(128));
        let a = dev.device_alloc(100).unwrap();
        assert!(dev.device_alloc(29).is_none());
        assert!(dev.device_alloc(28).is_some());
        dev.device_free(a);
        assert!(dev.device_alloc(100).is_some());
    }

    #[test]
    fn test_zero_byte_allocations_are_distinct() {
        let mut dev = SimulatedAccelerator::new();
        let a = dev.device_alloc(0).unwrap();
        let b = dev.device_alloc(0).unwrap();
        assert_ne!(a, b);
        assert_eq!(dev.live_bytes(), 0);
    }

    #[test]
    fn test_copy_with_offset() {
        let mut dev = SimulatedAccelerator::new();
        let ptr = dev.device_alloc(8).unwrap();
        dev.copy_to_device(ptr.byte_add(4), &[9, 9, 9, 9]);

        let mut all = [0u8; 8];
        dev.copy_from_device(&mut all, ptr);
        assert_eq!(all, [0, 0, 0, 0, 9, 9, 9, 9]);
    }

    #[test]
    fn test_clones_share_device() {
        let dev = SimulatedAccelerator::new();
        let mut handle = dev.clone();
        let ptr = handle.device_alloc(4 * 3).unwrap();
        handle.copy_to_device(ptr, as_bytes(&[1i32, 2, 3]));

        dev.with_elements_mut::<i32, _>(ptr, 3, |v| v.iter_mut().for_each(|x| *x *= 10));
        assert_eq!(dev.read_elements::<i32>(ptr, 3), vec![10, 20, 30]);
    }

    #[test]
    #[should_panic(expected = "overruns allocation")]
    fn test_overrun_panics() {
        let mut dev = SimulatedAccelerator::new();
        let ptr = dev.device_alloc(4).unwrap();
        dev.copy_to_device(ptr, &[0u8; 8]);
    }

    #[test]
    fn test_device_ptr_display() {
        let p = DevicePtr::new(0x100).unwrap();
        assert_eq!(p.to_string(), "0x100");
        assert_eq!(p.byte_add(16).addr(), 0x110);
        assert!(DevicePtr::new(0).is_none());
    }
}
