// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod dsp_client;
pub mod traits;

pub use dsp_client::{BasicAuthProvider, CredentialProvider, DspCatalogClient, StaticTokenProvider};
pub use traits::{CatalogFetcher, FetchError, RawCatalog};
