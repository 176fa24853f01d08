// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the scholar CLI

pub mod config;
pub mod profile;
pub mod record;
pub mod replay;
pub mod tree;
pub mod update;

pub use self::config::ConfigCommand;
pub use self::profile::ProfileCommand;
pub use self::record::RecordCommand;
pub use self::replay::ReplayCommand;
pub use self::tree::TreeCommand;
pub use self::update::UpdateCommand;
