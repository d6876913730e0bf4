// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod api_tests;
pub mod cache_contract_test;
pub mod engine_test;
pub mod registry_contract_test;
