//! 服务层模块

mod generation_service;
mod llm_service;
mod prompt_service;
mod response_parser;
mod suggestion_service;

pub use generation_service::{GenerateError, GenerationService};
pub use llm_service::LlmService;
pub use prompt_service::Style;
pub use response_parser::GenerationResult;
pub use suggestion_service::SuggestionService;
