// This file is part of resid-rs.
// Copyright (c) 2017-2019 Sebastian Jastrzebski <sebby2k@gmail.com>. All rights reserved.
// Portions (c) 2004 Dag Lem <resid@nimrod.no>
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

//! Float math for `no_std` builds.
//!
//! Core does not provide the transcendental `f64` methods, so table
//! generation routes through `libm` via this extension trait when the `std`
//! feature is disabled. With `std` enabled the inherent methods are used and
//! this module is not compiled.

pub trait F64Ext {
    fn abs(self) -> f64;
    fn sqrt(self) -> f64;
    fn sin(self) -> f64;
    fn exp(self) -> f64;
    fn ln(self) -> f64;
    fn log10(self) -> f64;
    fn log2(self) -> f64;
    fn ceil(self) -> f64;
    fn powi(self, n: i32) -> f64;
}

impl F64Ext for f64 {
    fn abs(self) -> f64 {
        libm::fabs(self)
    }

    fn sqrt(self) -> f64 {
        libm::sqrt(self)
    }

    fn sin(self) -> f64 {
        libm::sin(self)
    }

    fn exp(self) -> f64 {
        libm::exp(self)
    }

    fn ln(self) -> f64 {
        libm::log(self)
    }

    fn log10(self) -> f64 {
        libm::log10(self)
    }

    fn log2(self) -> f64 {
        libm::log2(self)
    }

    fn ceil(self) -> f64 {
        libm::ceil(self)
    }

    fn powi(self, n: i32) -> f64 {
        libm::pow(self, n as f64)
    }
}
