pub mod analyzer;
pub mod normalizer;
pub mod prompt;
pub mod validator;

pub use crate::domain::model::{EmotionRequest, EmotionResult, ImageSource, InputType};
pub use crate::domain::ports::{EmotionModel, TokenProvider};
pub use crate::utils::error::Result;
