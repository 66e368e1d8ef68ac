// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Example: element-wise product of two arrays on a (simulated) accelerator.
//!
//! Shows the full dual object lifecycle: allocate on both sides, fill on the
//! host, push to the device, run a kernel against the device buffers, pull
//! the result back, then release everything. A dual scalar scales the
//! result on the device and is read back afterwards.
//!
//! ```bash
//! cargo run -p dual-memory --example scalar_product
//! ```

use dual_memory::{DualMemoryManager, KernelPtr, KernelValue, SimulatedAccelerator};

const DIM: usize = 10;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing.
    tracing_subscriber::fmt().with_env_filter("info").init();

    let device = SimulatedAccelerator::new();
    let mut manager = DualMemoryManager::with_accelerator(Box::new(device.clone()));

    let mut a = manager.allocate::<i32>("dual_array_1", DIM, true);
    let mut b = manager.allocate::<i32>("dual_array_2", DIM, true);
    let mut res = manager.allocate::<i32>("dual_array_res", DIM, true);
    let mut factor = manager.create_scalar("factor", 2i32, true);

    manager.report_memory_usage();

    for i in 0..DIM {
        a.host_mut()[i] = i as i32;
        b.host_mut()[i] = 10 * i as i32;
    }

    manager.copy_host_to_device(&a, 0, a.len());
    manager.copy_host_to_device(&b, 0, b.len());

    // Compute region: res = a * b * factor, then factor += 5.
    let (KernelPtr::Device(Some(pa)), KernelPtr::Device(Some(pb)), KernelPtr::Device(Some(pr))) = (
        manager.kernel_ptr(&mut a),
        manager.kernel_ptr(&mut b),
        manager.kernel_ptr(&mut res),
    ) else {
        return Err("arrays are not resident on the device".into());
    };
    let KernelValue::Device(Some(pf)) = manager.kernel_value(&mut factor) else {
        return Err("factor is not resident on the device".into());
    };

    let lhs = device.read_elements::<i32>(pa, DIM);
    let rhs = device.read_elements::<i32>(pb, DIM);
    let scale = device.with_elements_mut::<i32, _>(pf, 1, |f| {
        let current = f[0];
        f[0] += 5;
        current
    });
    device.with_elements_mut::<i32, _>(pr, DIM, |out| {
        for (o, (l, r)) in out.iter_mut().zip(lhs.iter().zip(&rhs)) {
            *o = l * r * scale;
        }
    });

    let res_len = res.len();
    manager.copy_device_to_host(&mut res, 0, res_len);
    manager.update_scalar_device_to_host(&mut factor);

    let rendered: Vec<String> = res.host().iter().map(|v| v.to_string()).collect();
    println!("Result array:  [{}]", rendered.join(",  "));
    println!("Result scalar: {}", factor.host_value());

    manager.free(&mut a);
    manager.free(&mut b);
    manager.free(&mut res);
    manager.destroy_scalar(&mut factor);

    manager.report_memory_usage();
    Ok(())
}
