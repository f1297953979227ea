//! 数据模型

mod api;

pub use api::{GeneratePostRequest, SuggestionsRequest, SuggestionsResponse};
pub use crate::services::GenerationResult as GeneratePostResponse;
