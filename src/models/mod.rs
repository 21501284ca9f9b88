mod dataset;
mod pipeline_definition;
mod predictions;

pub use self::dataset::*;
pub use self::pipeline_definition::*;
pub use self::predictions::*;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
pub struct ModelVersion {
    pub model_version: String,
}

/// Weights a trainable component starts from
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSource {
    Fresh,
    Pretrained(PathBuf),
}

impl Default for ModelSource {
    fn default() -> Self {
        ModelSource::Fresh
    }
}
