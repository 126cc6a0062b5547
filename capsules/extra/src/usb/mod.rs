// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

pub mod bulk_echo;
pub mod cdc;
pub mod descriptors;
pub mod usbc_client_ctrl;
