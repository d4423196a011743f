// Copyright 2026 The Parley Project
// SPDX-License-Identifier: Apache-2.0

pub mod completion;
pub mod config;
pub mod gateway;
pub mod history;
pub mod message;
pub mod persona;
pub mod session;
pub mod stream;
pub mod upstream;
