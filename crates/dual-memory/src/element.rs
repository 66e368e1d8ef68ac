// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Element types that can live in a dual object.
//!
//! Host↔device transfers are plain byte copies, so an element type must be
//! valid for any byte pattern the device hands back.

use std::mem;

/// A type that can be mirrored on an accelerator by bitwise copy.
///
/// # Safety
/// Implementors must be plain data: no padding, no pointers or references,
/// and every bit pattern of `size_of::<Self>()` bytes must be a valid value.
pub unsafe trait Element: Copy + Default + Send + 'static {}

macro_rules! impl_element {
    ($($t:ty),* $(,)?) => {
        $(unsafe impl Element for $t {})*
    };
}

impl_element!(u8, i8, u16, i16, u32, i32, u64, i64, u128, i128, usize, isize, f32, f64);

/// Views a slice of elements as raw bytes.
pub fn as_bytes<T: Element>(values: &[T]) -> &[u8] {
    // SAFETY: `Element` types have no padding, and `u8` has alignment 1.
    unsafe { std::slice::from_raw_parts(values.as_ptr().cast::<u8>(), mem::size_of_val(values)) }
}

/// Views a mutable slice of elements as raw bytes.
pub fn as_bytes_mut<T: Element>(values: &mut [T]) -> &mut [u8] {
    // SAFETY: as above; any byte pattern written back is a valid `T`.
    unsafe {
        std::slice::from_raw_parts_mut(values.as_mut_ptr().cast::<u8>(), mem::size_of_val(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_bytes_len() {
        let v = [1i32, 2, 3];
        assert_eq!(as_bytes(&v).len(), 12);
        assert_eq!(as_bytes::<f64>(&[]).len(), 0);
    }

    #[test]
    fn test_as_bytes_mut_writes_through() {
        let mut v = [0u32; 2];
        as_bytes_mut(&mut v)[..4].copy_from_slice(&7u32.to_ne_bytes());
        assert_eq!(v, [7, 0]);
    }
}
