// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod loader;

pub use loader::{load_engine_config, DomainConfig, EngineConfig, LayerOptions};
