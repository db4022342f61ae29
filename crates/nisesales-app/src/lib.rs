// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod bulk;
pub mod drag;
pub mod error;
pub mod filter;
pub mod forms;
pub mod ids;
pub mod import;
pub mod model;
pub mod persistence;
pub mod selection;
pub mod store;
pub mod validation;
pub mod workspace;

pub use bulk::*;
pub use drag::*;
pub use error::*;
pub use filter::*;
pub use forms::*;
pub use ids::*;
pub use import::*;
pub use model::*;
pub use persistence::*;
pub use selection::*;
pub use store::*;
pub use validation::*;
pub use workspace::*;
