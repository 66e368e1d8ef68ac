// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Dual objects: values that exist on the host and, optionally, on the
//! accelerator.
//!
//! [`DualArray`] and [`DualScalar`] are created only by
//! [`DualMemoryManager`](crate::DualMemoryManager). They are move-only: there
//! is exactly one owner of each host buffer and device mirror, and releasing
//! through the manager invalidates the value in place so a second release is
//! reported as a dangling pointer instead of double-freeing.
//!
//! # Ownership Model
//!
//! ```text
//! manager.allocate("x", n, true)
//!       │
//!       ▼
//!   DualArray { host: Some(Vec<T>), dev_ptr: Some(DevicePtr) }
//!       │
//!       │  manager.free(&mut array)
//!       ▼
//!   DualArray { host: None, dev_ptr: None }   ← still owned, no longer live
//! ```
//!
//! Dropping a live dual object frees its host buffer but leaves the label
//! tracked and any device mirror allocated; it shows up in the usage report
//! as a leak.

use crate::{DevicePtr, Element};

/// Selects the buffer a compute kernel should address.
///
/// Returned by [`DualArray::select_ptr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelPtr<T> {
    /// Host memory; used when no accelerator is attached.
    Host(*mut T),
    /// Device memory; `None` if the array has no device mirror.
    Device(Option<DevicePtr>),
}

/// Selects the value a compute kernel should address.
///
/// Returned by [`DualScalar::select_value`].
#[derive(Debug, PartialEq, Eq)]
pub enum KernelValue<'a, T> {
    Host(&'a mut T),
    Device(Option<DevicePtr>),
}

/// An array with a host buffer and an optional device mirror.
#[must_use = "a dual array must be released with DualMemoryManager::free"]
#[derive(Debug)]
pub struct DualArray<T: Element> {
    label: String,
    /// `None` once released.
    host: Option<Vec<T>>,
    dev_ptr: Option<DevicePtr>,
    len: usize,
}

impl<T: Element> DualArray<T> {
    pub(crate) fn new(label: String, host: Vec<T>, dev_ptr: Option<DevicePtr>) -> Self {
        let len = host.len();
        Self {
            label,
            host: Some(host),
            dev_ptr,
            len,
        }
    }

    /// Label the array is tracked under.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the array holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of one buffer in bytes (`len × size_of::<T>()`).
    pub fn size_bytes(&self) -> usize {
        self.len * std::mem::size_of::<T>()
    }

    /// Returns `true` until the array is released.
    pub fn is_live(&self) -> bool {
        self.host.is_some()
    }

    /// Returns `true` if the array has a device mirror.
    pub fn is_on_device(&self) -> bool {
        self.dev_ptr.is_some()
    }

    /// Device mirror address, if any.
    pub fn dev_ptr(&self) -> Option<DevicePtr> {
        self.dev_ptr
    }

    /// Returns the host buffer.
    ///
    /// # Panics
    /// Panics if the array has been released.
    pub fn host(&self) -> &[T] {
        self.host.as_deref().expect("dual array already released")
    }

    /// Returns the host buffer mutably.
    ///
    /// # Panics
    /// Panics if the array has been released.
    pub fn host_mut(&mut self) -> &mut [T] {
        self.host.as_deref_mut().expect("dual array already released")
    }

    /// Returns the device pointer when `accelerated`, else the host pointer.
    ///
    /// Kernel code written against the result works unchanged whether or
    /// not an accelerator is present. A released array yields a null host
    /// pointer.
    pub fn select_ptr(&mut self, accelerated: bool) -> KernelPtr<T> {
        if accelerated {
            KernelPtr::Device(self.dev_ptr)
        } else {
            KernelPtr::Host(
                self.host
                    .as_mut()
                    .map_or(std::ptr::null_mut(), |host| host.as_mut_ptr()),
            )
        }
    }

    pub(crate) fn host_buffer(&self) -> Option<&[T]> {
        self.host.as_deref()
    }

    pub(crate) fn host_buffer_mut(&mut self) -> Option<&mut [T]> {
        self.host.as_deref_mut()
    }

    /// Drops the host buffer and hands back the device mirror, if any.
    pub(crate) fn release(&mut self) -> Option<DevicePtr> {
        self.host = None;
        self.dev_ptr.take()
    }
}

/// A single value held on the host with an optional device mirror.
#[must_use = "a dual scalar must be released with DualMemoryManager::destroy_scalar"]
#[derive(Debug)]
pub struct DualScalar<T: Element> {
    label: String,
    host_value: T,
    dev_ptr: Option<DevicePtr>,
    live: bool,
}

impl<T: Element> DualScalar<T> {
    pub(crate) fn new(label: String, host_value: T, dev_ptr: Option<DevicePtr>) -> Self {
        Self {
            label,
            host_value,
            dev_ptr,
            live: true,
        }
    }

    /// Label the scalar is tracked under.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The host copy of the value.
    pub fn host_value(&self) -> T {
        self.host_value
    }

    /// Mutable access to the host copy. The device mirror is not updated.
    pub fn host_value_mut(&mut self) -> &mut T {
        &mut self.host_value
    }

    /// Device mirror address, if any.
    pub fn dev_ptr(&self) -> Option<DevicePtr> {
        self.dev_ptr
    }

    /// Returns `true` if the scalar has a device mirror.
    pub fn is_on_device(&self) -> bool {
        self.dev_ptr.is_some()
    }

    /// Returns `true` until the scalar is destroyed.
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Size of the value in bytes.
    pub fn size_bytes(&self) -> usize {
        std::mem::size_of::<T>()
    }

    /// Returns the device mirror when `accelerated`, else the host value.
    pub fn select_value(&mut self, accelerated: bool) -> KernelValue<'_, T> {
        if accelerated {
            KernelValue::Device(self.dev_ptr)
        } else {
            KernelValue::Host(&mut self.host_value)
        }
    }

    pub(crate) fn set_host_value(&mut self, value: T) {
        self.host_value = value;
    }

    pub(crate) fn release(&mut self) -> Option<DevicePtr> {
        self.live = false;
        self.dev_ptr.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_accessors() {
        let ptr = DevicePtr::new(0x2000);
        let mut a = DualArray::new("a".into(), vec![0i32; 10], ptr);
        assert_eq!(a.label(), "a");
        assert_eq!(a.len(), 10);
        assert_eq!(a.size_bytes(), 40);
        assert!(a.is_live());
        assert!(a.is_on_device());

        a.host_mut()[3] = 7;
        assert_eq!(a.host()[3], 7);
    }

    #[test]
    fn test_release_invalidates() {
        let mut a = DualArray::new("a".into(), vec![1u8; 4], DevicePtr::new(0x40));
        assert_eq!(a.release(), DevicePtr::new(0x40));
        assert!(!a.is_live());
        assert!(a.dev_ptr().is_none());
        assert!(a.host_buffer().is_none());
        // metadata survives release
        assert_eq!(a.len(), 4);
        assert_eq!(a.release(), None);
    }

    #[test]
    #[should_panic(expected = "already released")]
    fn test_host_after_release_panics() {
        let mut a = DualArray::new("a".into(), vec![0f32; 2], None);
        a.release();
        let _ = a.host();
    }

    #[test]
    fn test_select_ptr() {
        let dev = DevicePtr::new(0x1000);
        let mut a = DualArray::new("a".into(), vec![0u64; 3], dev);
        assert_eq!(a.select_ptr(true), KernelPtr::Device(dev));

        let expected = a.host_mut().as_mut_ptr();
        assert_eq!(a.select_ptr(false), KernelPtr::Host(expected));

        a.release();
        assert_eq!(a.select_ptr(false), KernelPtr::Host(std::ptr::null_mut()));
        assert_eq!(a.select_ptr(true), KernelPtr::Device(None));
    }

    #[test]
    fn test_scalar_select_value() {
        let mut s = DualScalar::new("s".into(), 5i32, None);
        if let KernelValue::Host(v) = s.select_value(false) {
            *v += 5;
        }
        assert_eq!(s.host_value(), 10);
        assert_eq!(s.select_value(true), KernelValue::Device(None));
        assert_eq!(s.size_bytes(), 4);
    }
}
