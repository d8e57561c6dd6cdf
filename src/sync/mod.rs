//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了修改缓存状态的两个引擎：失效与预热。

pub mod invalidation;
pub mod preheat;

pub use invalidation::{InvalidationEngine, InvalidationMode, InvalidationReport};
pub use preheat::{PreheatEngine, PreheatReport, DEFAULT_PREHEAT_BATCH_SIZE};
