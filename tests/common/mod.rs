// Common test utilities and mock infrastructure
//
// - Mock lsblk/df command runner
// - Fake sysfs and /dev trees
#![allow(dead_code)]

pub mod mock_commands;
pub mod mock_sysfs;
