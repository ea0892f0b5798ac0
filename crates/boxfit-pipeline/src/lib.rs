//! Per-instance 3D box decoding.
//!
//! Given the class ids and the 9 observed box points of every detected object
//! in a frame, the decoder fits one box per instance by minimizing the
//! reprojection error under the default box bounds, applies the acceptance
//! threshold and collects accepted fits into a column-aligned
//! [`BoxFieldList`].
//!
//! ```no_run
//! use boxfit_pipeline::{decode_input, DecodeInput, DecoderConfig};
//! # fn main() -> anyhow::Result<()> {
//! let input = DecodeInput::from_json_file("frame.json".as_ref())?;
//! let boxes = decode_input(&input, &DecoderConfig::default())?;
//! println!("{}", serde_json::to_string_pretty(&boxes)?);
//! # Ok(())
//! # }
//! ```

use boxfit_core::{IntrinsicsError, Real};
use thiserror::Error;

pub mod config;
pub mod decoder;
pub mod instance;
pub mod output;

pub use config::DecoderConfig;
pub use decoder::{accepts, decode_boxes, decode_input, BoxDecoder};
pub use instance::{DecodeInput, DimensionPriors, FitResult, Instance};
pub use output::{BoxFieldList, BoxRow};

/// Input validation failures. Raised before any instance is solved.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("got {classes} class ids but {correspondences} correspondence sets")]
    LengthMismatch {
        classes: usize,
        correspondences: usize,
    },
    #[error("instance {instance}: expected 9 correspondences, got {got}")]
    WrongCorrespondenceCount { instance: usize, got: usize },
    #[error("instance {instance}: correspondence {point} is not finite")]
    NonFiniteCorrespondence { instance: usize, point: usize },
    #[error("instance {instance}: no dimension prior for class {class}")]
    UnknownClass { instance: usize, class: usize },
    #[error("class {class}: prior dimension {hwl:?} must be finite and positive")]
    InvalidPrior { class: usize, hwl: [Real; 3] },
    #[error("location prior {0:?} is not finite")]
    InvalidLocationPrior([Real; 3]),
    #[error(transparent)]
    Intrinsics(#[from] IntrinsicsError),
    #[error("invalid decoder config: {0}")]
    InvalidConfig(String),
}
